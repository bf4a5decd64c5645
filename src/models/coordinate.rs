use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored coordinate sample. Records are kept in arrival order; the
/// timestamp is client-reported metadata, never a sort key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinateRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// A coordinate as submitted by a device, before the server stamps it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinateIngest {
    pub latitude: f64,
    pub longitude: f64,
    /// Client clock reading, taken as-is when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl CoordinateIngest {
    /// Promotes the submission to a stored record, stamping server time
    /// when the client sent no timestamp.
    pub fn into_record(self) -> CoordinateRecord {
        CoordinateRecord {
            latitude: self.latitude,
            longitude: self.longitude,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            accuracy: self.accuracy,
            speed: self.speed,
            tag: self.tag,
        }
    }
}
