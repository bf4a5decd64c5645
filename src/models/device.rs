use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An emergency contact attached to a device. At most three per device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
}

/// Denormalized cache of the most recent coordinate of the active session.
///
/// Kept on the device record so status polls stay cheap. This is a
/// read-through cache that may lag the session's coordinate list by one
/// write; a full session fetch is the source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastUpdate {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    pub tag: String,
}

/// Per-device status owned exclusively by the session directory.
///
/// Invariant: `is_triggered == true` exactly when `active_session_id`
/// references a session with `status == Active`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceState {
    /// The device's external identifier.
    pub device_id: String,
    /// The user the device is linked to, if any.
    pub owner_id: Option<Uuid>,
    /// Whether the device is currently in the triggered (SOS) state.
    pub is_triggered: bool,
    /// The active session, if one exists.
    pub active_session_id: Option<Uuid>,
    /// Last time the device touched the directory.
    pub last_active: DateTime<Utc>,
    /// Cache of the latest coordinate, see [`LastUpdate`].
    pub last_update: Option<LastUpdate>,
    /// Emergency contacts, at most three.
    pub emergency_contacts: Vec<EmergencyContact>,
    /// Trigger words, unique as entered (case-sensitive).
    pub trigger_words: Vec<String>,
}

impl DeviceState {
    /// Creates a fresh, idle device record.
    pub fn new(device_id: String) -> Self {
        Self {
            device_id,
            owner_id: None,
            is_triggered: false,
            active_session_id: None,
            last_active: Utc::now(),
            last_update: None,
            emergency_contacts: Vec::new(),
            trigger_words: Vec::new(),
        }
    }
}
