use uuid::Uuid;

use crate::{
    error::Result,
    models::coordinate::CoordinateRecord,
    models::device::{DeviceState, EmergencyContact},
    state::AppState,
};

/// Registers a new device in the fleet registry.
pub async fn register_device(state: &AppState, device_id: &str) -> Result<DeviceState> {
    state.directory.register_device(device_id).await
}

/// Links a device to the requesting user.
pub async fn link_device(state: &AppState, device_id: &str, user_id: Uuid) -> Result<DeviceState> {
    state.directory.link_device(device_id, user_id).await
}

/// The device record plus its current location when triggered.
pub async fn device_info(
    state: &AppState,
    device_id: &str,
    user_id: Uuid,
) -> Result<(DeviceState, Option<CoordinateRecord>)> {
    state.directory.device_info(device_id, user_id).await
}

/// Replaces the device's emergency contacts.
pub async fn update_emergency_contacts(
    state: &AppState,
    device_id: &str,
    user_id: Uuid,
    contacts: Vec<EmergencyContact>,
) -> Result<Vec<EmergencyContact>> {
    state
        .directory
        .update_emergency_contacts(device_id, user_id, contacts)
        .await
}

/// Replaces the device's trigger words.
pub async fn update_trigger_words(
    state: &AppState,
    device_id: &str,
    user_id: Uuid,
    words: Vec<String>,
) -> Result<Vec<String>> {
    state
        .directory
        .update_trigger_words(device_id, user_id, words)
        .await
}

/// Emergency contact phone numbers, without auth scoping.
pub async fn public_emergency_contacts(
    state: &AppState,
    device_id: &str,
) -> Result<Vec<String>> {
    state.directory.public_emergency_contacts(device_id).await
}
