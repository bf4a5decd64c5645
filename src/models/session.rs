use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::coordinate::CoordinateRecord;

/// The lifecycle state of a trigger session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// The session is live and accepting coordinate appends.
    Active,
    /// The session has been stopped and is immutable.
    Ended,
}

/// An SOS trigger session: an ordered, append-only run of coordinates
/// bounded by a start event and an optional end event.
///
/// Invariant: `status == Active` exactly when `end_time` is `None`, and at
/// most one active session exists per device at any instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerSession {
    /// The session's unique identifier.
    pub session_id: Uuid,
    /// The device this session belongs to.
    pub device_id: String,
    /// The owner of the device at the time the session started, if linked.
    pub user_id: Option<Uuid>,
    /// When the trigger fired.
    pub start_time: DateTime<Utc>,
    /// When the trigger was stopped. `None` while active.
    pub end_time: Option<DateTime<Utc>>,
    /// The session's lifecycle state.
    pub status: SessionStatus,
    /// The location carried by the start event, if any.
    pub trigger_start_location: Option<CoordinateRecord>,
    /// Whether the session was ended by an explicit stop request.
    pub manual_stop: bool,
    /// The recorded fixes, in arrival order.
    pub coordinates: Vec<CoordinateRecord>,
}

impl TriggerSession {
    /// Session duration in seconds. `None` while the session is active.
    pub fn duration_secs(&self) -> Option<i64> {
        self.end_time
            .map(|end| (end - self.start_time).num_seconds())
    }
}

/// A compact per-session row for history listings. Carries counts instead
/// of the full coordinate list so idle dashboards stay cheap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    #[serde(rename = "sessionId")]
    pub session_id: Uuid,
    #[serde(rename = "deviceId")]
    pub device_id: String,
    #[serde(rename = "startTime")]
    pub start_time: DateTime<Utc>,
    #[serde(rename = "endTime")]
    pub end_time: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    #[serde(rename = "coordinatesCount")]
    pub coordinates_count: usize,
    #[serde(rename = "manualStop")]
    pub manual_stop: bool,
}

impl From<&TriggerSession> for SessionSummary {
    fn from(session: &TriggerSession) -> Self {
        Self {
            session_id: session.session_id,
            device_id: session.device_id.clone(),
            start_time: session.start_time,
            end_time: session.end_time,
            status: session.status,
            coordinates_count: session.coordinates.len(),
            manual_stop: session.manual_stop,
        }
    }
}
