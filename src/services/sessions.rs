use uuid::Uuid;

use crate::{
    error::Result,
    models::coordinate::{CoordinateIngest, CoordinateRecord},
    models::session::TriggerSession,
    repositories::directory::{DeviceStatus, HistoryPage, StopOutcome},
    state::AppState,
};

/// Starts a trigger session for a device.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `device_id` - The device entering the triggered state.
/// * `initial_location` - Location carried by the start event, if any.
///
/// # Returns
///
/// A `Result` containing the freshly allocated `TriggerSession`.
pub async fn start_trigger(
    state: &AppState,
    device_id: &str,
    initial_location: Option<CoordinateIngest>,
) -> Result<TriggerSession> {
    state.directory.start_trigger(device_id, initial_location).await
}

/// Appends a coordinate to the device's active session.
pub async fn append_coordinates(
    state: &AppState,
    device_id: &str,
    ingest: CoordinateIngest,
) -> Result<(Uuid, usize, CoordinateRecord)> {
    state.directory.append_coordinates(device_id, ingest).await
}

/// Stops the device's active session, if one exists.
pub async fn stop_trigger(
    state: &AppState,
    device_id: &str,
    manual_stop: bool,
) -> Result<StopOutcome> {
    state.directory.stop_trigger(device_id, manual_stop).await
}

/// The cheap status poll for a device.
pub async fn session_status(
    state: &AppState,
    device_id: &str,
    user_id: Uuid,
) -> Result<DeviceStatus> {
    state.directory.device_status(device_id, user_id).await
}

/// Full session snapshot scoped to the requesting user.
pub async fn session_details(
    state: &AppState,
    session_id: Uuid,
    user_id: Uuid,
) -> Result<TriggerSession> {
    state.directory.session_details(session_id, user_id).await
}

/// Paginated session history, most recent first.
pub async fn session_history(
    state: &AppState,
    user_id: Uuid,
    device_id: Option<&str>,
    page: Option<u32>,
    limit: Option<u32>,
) -> Result<HistoryPage> {
    let limit = limit.unwrap_or(state.config.history_page_size);
    state
        .directory
        .session_history(user_id, device_id, page.unwrap_or(1), limit)
        .await
}

/// All currently active sessions for a user.
pub async fn active_sessions(state: &AppState, user_id: Uuid) -> Result<Vec<TriggerSession>> {
    state.directory.active_sessions(user_id).await
}

/// Last recorded coordinate of a device's active session.
pub async fn current_location(
    state: &AppState,
    device_id: &str,
    user_id: Uuid,
) -> Result<CoordinateRecord> {
    state.directory.current_location(device_id, user_id).await
}
