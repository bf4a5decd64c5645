//! Request/response bodies for the HTTP contract. Shared between the
//! server handlers and the client so both sides agree on field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::coordinate::{CoordinateIngest, CoordinateRecord};
use crate::models::device::{EmergencyContact, LastUpdate};
use crate::models::session::{SessionStatus, SessionSummary};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTriggerRequest {
    pub device_id: String,
    #[serde(default)]
    pub initial_location: Option<CoordinateIngest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTriggerResponse {
    pub success: bool,
    pub message: String,
    pub session_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub trigger_start_location: Option<CoordinateRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCoordinatesRequest {
    pub device_id: String,
    #[serde(flatten)]
    pub coordinate: CoordinateIngest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCoordinatesResponse {
    pub success: bool,
    pub message: String,
    pub session_id: Uuid,
    pub coordinates_count: usize,
    pub latest_location: CoordinateRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopTriggerRequest {
    pub device_id: String,
    #[serde(default = "default_true")]
    pub manual_stop: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopTriggerResponse {
    pub success: bool,
    pub message: String,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates_count: Option<usize>,
    /// Session duration in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    pub coordinates_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update: Option<LastUpdate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetail {
    pub id: Uuid,
    pub device_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub coordinates: Vec<CoordinateRecord>,
    pub trigger_start_location: Option<CoordinateRecord>,
    pub manual_stop: bool,
    /// Session duration in seconds, present once ended.
    pub duration: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDetailsResponse {
    pub session: SessionDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: usize,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionHistoryResponse {
    pub sessions: Vec<SessionSummary>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSessionView {
    pub session_id: Uuid,
    pub device_id: String,
    pub start_time: DateTime<Utc>,
    pub coordinates: Vec<CoordinateRecord>,
    pub trigger_start_location: Option<CoordinateRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSessionsResponse {
    pub active_sessions: Vec<ActiveSessionView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub device_id: String,
    pub emergency_contacts: Vec<EmergencyContact>,
    pub trigger_words: Vec<String>,
    pub is_triggered: bool,
    pub last_active: DateTime<Utc>,
    pub current_location: Option<CoordinateRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceResponse {
    pub success: bool,
    pub device: DeviceRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContactsRequest {
    pub emergency_contacts: Vec<EmergencyContact>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContactsResponse {
    pub success: bool,
    pub message: String,
    pub emergency_contacts: Vec<EmergencyContact>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTriggerWordsRequest {
    pub trigger_words: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTriggerWordsResponse {
    pub success: bool,
    pub message: String,
    pub trigger_words: Vec<String>,
}

/// The canonical combined payload persisted for device-side consumption
/// and mirrored over the device transport. Field names are the device
/// firmware's, not ours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyDataPayload {
    pub emergency_contact: Vec<String>,
    pub trigger_word: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeviceRequest {
    pub device_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkDeviceRequest {
    pub device_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAck {
    pub success: bool,
    pub message: String,
    pub device_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicContact {
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicContactsResponse {
    pub success: bool,
    pub emergency_contacts: Vec<PublicContact>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
}

/// The error body every failing endpoint returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
}
