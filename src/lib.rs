use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post, put},
};

use http::{Method, header};
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

pub mod config;
pub mod error;
pub mod state;

pub mod models {
    pub mod coordinate;
    pub mod device;
    pub mod session;
    pub mod wire;
}

pub mod repositories {
    pub mod directory;
}

pub mod services {
    pub mod devices;
    pub mod sessions;
}

pub mod handlers {
    pub mod devices;
    pub mod emergency;
    pub mod sessions;
}

pub mod middleware_layer {
    pub mod auth;
}

pub mod validation {
    pub mod sessions;
    pub mod settings;
}

pub mod client;

use state::AppState;

/// Builds the full API router over the given state.
///
/// Three auth tiers: open device-ingest endpoints, `x-api-key` guarded
/// device-control endpoints, and bearer-token user endpoints.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            "x-api-key".parse().unwrap(),
        ])
        .max_age(Duration::from_secs(86400));

    // Device ingest path: the wearable carries no user credentials, so
    // start and coordinate uploads stay open.
    let ingest_routes = Router::new()
        .route("/api/sessions/start", post(handlers::sessions::start_trigger))
        .route(
            "/api/sessions/coordinates",
            post(handlers::sessions::add_coordinates),
        )
        .with_state(state.clone());

    // Fleet-control path: static key in `x-api-key`.
    let keyed_routes = Router::new()
        .route("/api/sessions/stop", post(handlers::sessions::stop_trigger))
        .route("/api/device/create", post(handlers::devices::create_device))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_api_key,
        ))
        .with_state(state.clone());

    // User-facing path: bearer token resolved through the auth registry.
    let protected_routes = Router::new()
        .route(
            "/api/sessions/status/{device_id}",
            get(handlers::sessions::session_status),
        )
        .route(
            "/api/sessions/history",
            get(handlers::sessions::session_history),
        )
        .route(
            "/api/sessions/active",
            get(handlers::sessions::active_sessions),
        )
        .route(
            "/api/sessions/current-location/{device_id}",
            get(handlers::sessions::current_location),
        )
        .route(
            "/api/sessions/{session_id}",
            get(handlers::sessions::session_details),
        )
        .route("/api/device/link", post(handlers::devices::link_device))
        .route("/api/device/{device_id}", get(handlers::devices::get_device))
        .route(
            "/api/device/{device_id}/emergency-contacts",
            put(handlers::devices::update_emergency_contacts),
        )
        .route(
            "/api/device/{device_id}/trigger-words",
            put(handlers::devices::update_trigger_words),
        )
        .route(
            "/api/update-emergency-data",
            post(handlers::emergency::update_emergency_data),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_auth,
        ))
        .with_state(state.clone());

    // Responder path: no credentials, read-only, minimal surface.
    let public_routes = Router::new()
        .route(
            "/api/device/{device_id}/public-contacts",
            get(handlers::devices::public_emergency_contacts),
        )
        .route(
            "/api/emergency-data",
            get(handlers::emergency::get_emergency_data),
        )
        .route("/health", get(handlers::emergency::health))
        .with_state(state);

    Router::new()
        .merge(ingest_routes)
        .merge(keyed_routes)
        .merge(protected_routes)
        .merge(public_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default())
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState::new(config::Config {
            api_key: "router-test-key".to_string(),
            port: 0,
            history_page_size: 10,
            emergency_file: std::env::temp_dir().join("router-test-emergency.txt"),
        })
    }

    #[tokio::test]
    async fn health_is_open() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn user_routes_reject_missing_token() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/sessions/active")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn keyed_routes_reject_missing_api_key() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/sessions/stop")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"deviceId":"D1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn ingest_routes_validate_before_touching_state() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/sessions/start")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"deviceId":"D1","initialLocation":{"latitude":95.0,"longitude":10.0}}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
