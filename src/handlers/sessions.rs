use axum::{
    Extension,
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::Result,
    middleware_layer::auth::AuthUser,
    models::session::SessionStatus,
    models::wire::{
        ActiveSessionView, ActiveSessionsResponse, AddCoordinatesRequest,
        AddCoordinatesResponse, Pagination, SessionDetail, SessionDetailsResponse,
        SessionHistoryResponse, SessionStatusResponse, StartTriggerRequest,
        StartTriggerResponse, StopTriggerRequest, StopTriggerResponse,
    },
    repositories::directory::StopOutcome,
    services::sessions as session_service,
    state::AppState,
    validation::sessions as session_validation,
};

/// The query parameters for the session history listing.
#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(default, rename = "deviceId")]
    pub device_id: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Starts a trigger session. Device-initiated, unauthenticated.
#[axum::debug_handler]
pub async fn start_trigger(
    State(state): State<AppState>,
    Json(req): Json<StartTriggerRequest>,
) -> Result<Response> {
    session_validation::validate_device_id(&req.device_id)?;
    if let Some(location) = &req.initial_location {
        session_validation::validate_coordinate(location)?;
    }

    let session =
        session_service::start_trigger(&state, &req.device_id, req.initial_location).await?;

    let response = sonic_rs::to_string(&StartTriggerResponse {
        success: true,
        message: "Trigger session started".to_string(),
        session_id: session.session_id,
        start_time: session.start_time,
        trigger_start_location: session.trigger_start_location,
    })
    .unwrap();

    Ok((StatusCode::CREATED, response).into_response())
}

/// Appends a coordinate to the device's active session.
#[axum::debug_handler]
pub async fn add_coordinates(
    State(state): State<AppState>,
    Json(req): Json<AddCoordinatesRequest>,
) -> Result<Response> {
    session_validation::validate_device_id(&req.device_id)?;
    session_validation::validate_coordinate(&req.coordinate)?;

    let (session_id, count, latest) =
        session_service::append_coordinates(&state, &req.device_id, req.coordinate).await?;

    let response = sonic_rs::to_string(&AddCoordinatesResponse {
        success: true,
        message: "Coordinates added to session".to_string(),
        session_id,
        coordinates_count: count,
        latest_location: latest,
    })
    .unwrap();

    Ok((StatusCode::OK, response).into_response())
}

/// Stops the device's active session. Guarded by the `x-api-key`
/// middleware; idempotent when the device is already idle.
#[axum::debug_handler]
pub async fn stop_trigger(
    State(state): State<AppState>,
    Json(req): Json<StopTriggerRequest>,
) -> Result<Response> {
    session_validation::validate_device_id(&req.device_id)?;

    let outcome =
        session_service::stop_trigger(&state, &req.device_id, req.manual_stop).await?;

    let body = match outcome {
        StopOutcome::Stopped(session) => StopTriggerResponse {
            success: true,
            message: "Trigger session stopped".to_string(),
            is_active: false,
            session_id: Some(session.session_id),
            start_time: Some(session.start_time),
            end_time: session.end_time,
            coordinates_count: Some(session.coordinates.len()),
            duration: session.duration_secs(),
        },
        StopOutcome::AlreadyIdle => StopTriggerResponse {
            success: true,
            message: "Device already idle".to_string(),
            is_active: false,
            session_id: None,
            start_time: None,
            end_time: None,
            coordinates_count: None,
            duration: None,
        },
    };

    Ok((StatusCode::OK, sonic_rs::to_string(&body).unwrap()).into_response())
}

/// The cheap status poll a dashboard gates its Stop button on.
#[axum::debug_handler]
pub async fn session_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(device_id): Path<String>,
) -> Result<Response> {
    let status = session_service::session_status(&state, &device_id, user.user_id).await?;

    let body = SessionStatusResponse {
        is_active: status.is_active,
        session_id: status.session_id,
        start_time: status.start_time,
        coordinates_count: status.coordinates_count,
        last_update: status.last_update,
        message: (!status.is_active).then(|| "No active session".to_string()),
    };

    Ok((StatusCode::OK, sonic_rs::to_string(&body).unwrap()).into_response())
}

/// Full session detail, including the complete coordinate list.
#[axum::debug_handler]
pub async fn session_details(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<Uuid>,
) -> Result<Response> {
    let session = session_service::session_details(&state, session_id, user.user_id).await?;
    let duration = session.duration_secs();

    let body = SessionDetailsResponse {
        session: SessionDetail {
            id: session.session_id,
            device_id: session.device_id,
            start_time: session.start_time,
            end_time: session.end_time,
            status: session.status,
            duration,
            coordinates: session.coordinates,
            trigger_start_location: session.trigger_start_location,
            manual_stop: session.manual_stop,
        },
    };

    Ok((StatusCode::OK, sonic_rs::to_string(&body).unwrap()).into_response())
}

/// Paginated session history, most recent first.
#[axum::debug_handler]
pub async fn session_history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<HistoryQuery>,
) -> Result<Response> {
    let history = session_service::session_history(
        &state,
        user.user_id,
        query.device_id.as_deref(),
        query.page,
        query.limit,
    )
    .await?;

    let body = SessionHistoryResponse {
        sessions: history.sessions,
        pagination: Pagination {
            total: history.total,
            page: history.page,
            limit: history.limit,
            total_pages: history.total_pages,
        },
    };

    Ok((StatusCode::OK, sonic_rs::to_string(&body).unwrap()).into_response())
}

/// All active sessions for the requesting user.
#[axum::debug_handler]
pub async fn active_sessions(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Response> {
    let sessions = session_service::active_sessions(&state, user.user_id).await?;

    let body = ActiveSessionsResponse {
        active_sessions: sessions
            .into_iter()
            .filter(|s| s.status == SessionStatus::Active)
            .map(|s| ActiveSessionView {
                session_id: s.session_id,
                device_id: s.device_id,
                start_time: s.start_time,
                coordinates: s.coordinates,
                trigger_start_location: s.trigger_start_location,
            })
            .collect(),
    };

    Ok((StatusCode::OK, sonic_rs::to_string(&body).unwrap()).into_response())
}

/// Last recorded coordinate of the device's active session.
#[axum::debug_handler]
pub async fn current_location(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(device_id): Path<String>,
) -> Result<Response> {
    let location = session_service::current_location(&state, &device_id, user.user_id).await?;
    Ok((StatusCode::OK, sonic_rs::to_string(&location).unwrap()).into_response())
}
