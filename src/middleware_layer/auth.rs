use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

/// The authenticated caller, inserted into request extensions by
/// [`require_auth`].
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
}

/// Extracts the bearer token from the Authorization header.
fn extract_bearer_token(request: &Request<Body>) -> Option<&str> {
    request
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// A middleware that requires a valid bearer token.
///
/// Tokens are resolved through the `AuthRegistry`; issuance lives in the
/// auth subsystem outside this crate. Any failure here is a 401, which
/// clients treat as a forced logout.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(&request).ok_or_else(|| {
        tracing::debug!("Missing bearer token");
        AppError::Unauthorized("Missing authentication token".to_string())
    })?;

    let user_id = state.auth.resolve(token).await.ok_or_else(|| {
        tracing::warn!("Unknown or revoked token");
        AppError::Unauthorized("Invalid or expired token".to_string())
    })?;

    request.extensions_mut().insert(AuthUser { user_id });

    Ok(next.run(request).await)
}

/// A middleware that requires the static device API key in `x-api-key`.
///
/// Used by the stop endpoint and fleet provisioning. A mismatch is a 401
/// and never mutates state.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let presented = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok());

    if presented != Some(state.config.api_key.as_str()) {
        tracing::warn!("Invalid API key");
        return Err(AppError::Unauthorized("Invalid API key".to_string()));
    }

    Ok(next.run(request).await)
}
