use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    error::Result,
    models::wire::EmergencyDataPayload,
    state::AppState,
};

/// Persists the canonical combined payload (phones + trigger words) that
/// devices read back over the transport. Written pretty-printed, the same
/// text form the settings bridge pushes over the device channel.
#[axum::debug_handler]
pub async fn update_emergency_data(
    State(state): State<AppState>,
    Json(payload): Json<EmergencyDataPayload>,
) -> Result<Response> {
    let path = &state.config.emergency_file;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let content = sonic_rs::to_string_pretty(&payload)
        .map_err(|e| crate::error::AppError::Internal(format!("Serialize failed: {}", e)))?;
    tokio::fs::write(path, content).await?;

    tracing::info!(path = %path.display(), "Emergency data file updated");
    Ok((StatusCode::OK, r#"{"success":true}"#).into_response())
}

/// Serves the raw canonical payload back. Empty object when nothing has
/// been written yet.
#[axum::debug_handler]
pub async fn get_emergency_data(State(state): State<AppState>) -> Result<Response> {
    let content = match tokio::fs::read_to_string(&state.config.emergency_file).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => "{}".to_string(),
        Err(e) => return Err(e.into()),
    };

    Ok((StatusCode::OK, content).into_response())
}

/// Liveness probe.
pub async fn health() -> Response {
    let body = sonic_rs::to_string(&sonic_rs::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
    .unwrap_or_else(|_| r#"{"status":"ok"}"#.to_string());

    (StatusCode::OK, body).into_response()
}
