use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::coordinate::{CoordinateIngest, CoordinateRecord};
use crate::models::device::{DeviceState, EmergencyContact, LastUpdate};
use crate::models::session::{SessionStatus, SessionSummary, TriggerSession};

/// Result of a stop request.
#[derive(Debug, Clone)]
pub enum StopOutcome {
    /// The active session was finalized; carries its immutable snapshot.
    Stopped(TriggerSession),
    /// The device had no active session. Stopping an idle device is a no-op.
    AlreadyIdle,
}

/// The cheap status view served to polling clients.
#[derive(Debug, Clone)]
pub struct DeviceStatus {
    pub is_active: bool,
    pub session_id: Option<Uuid>,
    pub start_time: Option<DateTime<Utc>>,
    pub coordinates_count: usize,
    pub last_update: Option<LastUpdate>,
}

/// A page of session history, most recent first.
#[derive(Debug, Clone)]
pub struct HistoryPage {
    pub sessions: Vec<SessionSummary>,
    pub total: usize,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

/// The backend-side registry resolving device -> active session,
/// session id -> session, and device -> history.
///
/// The per-device mutex is the single serialization point for
/// start/append/stop; the at-most-one-active-session invariant holds
/// because every transition runs under it. Operations on different
/// devices never contend on a write lock. Finalized sessions are
/// immutable and only read-shared.
pub struct SessionDirectory {
    devices: RwLock<HashMap<String, Arc<Mutex<DeviceState>>>>,
    sessions: RwLock<HashMap<Uuid, Arc<RwLock<TriggerSession>>>>,
}

impl SessionDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    async fn device_handle(&self, device_id: &str) -> Result<Arc<Mutex<DeviceState>>> {
        self.devices
            .read()
            .await
            .get(device_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Device not found".to_string()))
    }

    async fn owned_device_handle(
        &self,
        device_id: &str,
        owner_id: Uuid,
    ) -> Result<Arc<Mutex<DeviceState>>> {
        let handle = self.device_handle(device_id).await?;
        // Ownership mismatches surface as NotFound, same as scoped queries.
        let owned = handle.lock().await.owner_id == Some(owner_id);
        if !owned {
            return Err(AppError::NotFound("Device not found".to_string()));
        }
        Ok(handle)
    }

    /// Registers a new device in the fleet.
    pub async fn register_device(&self, device_id: &str) -> Result<DeviceState> {
        let mut devices = self.devices.write().await;
        if devices.contains_key(device_id) {
            return Err(AppError::Conflict("Device ID already exists".to_string()));
        }
        let device = DeviceState::new(device_id.to_string());
        devices.insert(
            device_id.to_string(),
            Arc::new(Mutex::new(device.clone())),
        );
        tracing::info!(device_id, "Device registered");
        Ok(device)
    }

    /// Links a device to a user. Linking is idempotent for the same user
    /// and rejected when the device belongs to someone else.
    pub async fn link_device(&self, device_id: &str, user_id: Uuid) -> Result<DeviceState> {
        let handle = self.device_handle(device_id).await?;
        let mut device = handle.lock().await;

        match device.owner_id {
            Some(owner) if owner != user_id => {
                return Err(AppError::Conflict(
                    "Device already linked to another user".to_string(),
                ));
            }
            Some(_) => {}
            None => {
                device.owner_id = Some(user_id);
                tracing::info!(device_id, %user_id, "Device linked");
            }
        }

        Ok(device.clone())
    }

    /// Idle -> Triggered: allocates a fresh session and flips the device
    /// into the triggered state. Rejected with `Conflict` when an active
    /// session already exists; the existing session's identity is never
    /// overwritten.
    pub async fn start_trigger(
        &self,
        device_id: &str,
        initial_location: Option<CoordinateIngest>,
    ) -> Result<TriggerSession> {
        let handle = self.device_handle(device_id).await?;
        let mut device = handle.lock().await;

        if device.is_triggered {
            return Err(AppError::Conflict(
                "Device already has an active session".to_string(),
            ));
        }

        let now = Utc::now();
        let initial = initial_location.map(|loc| loc.into_record());

        let session = TriggerSession {
            session_id: Uuid::new_v4(),
            device_id: device_id.to_string(),
            user_id: device.owner_id,
            start_time: now,
            end_time: None,
            status: SessionStatus::Active,
            trigger_start_location: initial.clone(),
            manual_stop: false,
            coordinates: initial.clone().into_iter().collect(),
        };

        device.is_triggered = true;
        device.active_session_id = Some(session.session_id);
        device.last_active = now;
        if let Some(record) = &initial {
            device.last_update = Some(last_update_of(record));
        }

        self.sessions.write().await.insert(
            session.session_id,
            Arc::new(RwLock::new(session.clone())),
        );

        tracing::info!(device_id, session_id = %session.session_id, "Trigger session started");
        Ok(session)
    }

    /// Triggered -> Triggered: appends a coordinate to the active session
    /// in arrival order and refreshes the device's last-update cache.
    /// Signals `InvalidState` when the device has no active session.
    pub async fn append_coordinates(
        &self,
        device_id: &str,
        ingest: CoordinateIngest,
    ) -> Result<(Uuid, usize, CoordinateRecord)> {
        let handle = self.device_handle(device_id).await?;
        let mut device = handle.lock().await;

        let session_id = device.active_session_id.ok_or_else(|| {
            AppError::InvalidState("No active session found for device".to_string())
        })?;

        let session_handle = self
            .sessions
            .read()
            .await
            .get(&session_id)
            .cloned()
            .ok_or_else(|| {
                AppError::InvalidState("No active session found for device".to_string())
            })?;

        let record = ingest.into_record();

        // The device mutex is still held here, serializing the append
        // against concurrent stop/start for this device.
        let count = {
            let mut session = session_handle.write().await;
            session.coordinates.push(record.clone());
            session.coordinates.len()
        };

        device.last_active = Utc::now();
        device.last_update = Some(last_update_of(&record));

        tracing::debug!(device_id, %session_id, count, "Coordinate appended");
        Ok((session_id, count, record))
    }

    /// Triggered -> Idle: finalizes the active session. Stopping an idle
    /// device is an idempotent no-op reported as `AlreadyIdle`.
    pub async fn stop_trigger(&self, device_id: &str, manual_stop: bool) -> Result<StopOutcome> {
        let handle = self.device_handle(device_id).await?;
        let mut device = handle.lock().await;

        let Some(session_id) = device.active_session_id else {
            tracing::debug!(device_id, "Stop requested on idle device");
            return Ok(StopOutcome::AlreadyIdle);
        };

        let session_handle = self
            .sessions
            .read()
            .await
            .get(&session_id)
            .cloned()
            .ok_or_else(|| AppError::Internal("Active session missing from registry".to_string()))?;

        let snapshot = {
            let mut session = session_handle.write().await;
            session.end_time = Some(Utc::now());
            session.status = SessionStatus::Ended;
            session.manual_stop = manual_stop;
            session.clone()
        };

        device.is_triggered = false;
        device.active_session_id = None;
        device.last_active = Utc::now();

        tracing::info!(device_id, %session_id, "Trigger session stopped");
        Ok(StopOutcome::Stopped(snapshot))
    }

    /// The cheap status poll. Serves the denormalized last-update cache
    /// off the device record; consistent with the latest transition
    /// because it reads under the same device mutex the writers take.
    pub async fn device_status(&self, device_id: &str, owner_id: Uuid) -> Result<DeviceStatus> {
        let handle = self.owned_device_handle(device_id, owner_id).await?;
        let device = handle.lock().await;

        let Some(session_id) = device.active_session_id else {
            return Ok(DeviceStatus {
                is_active: false,
                session_id: None,
                start_time: None,
                coordinates_count: 0,
                last_update: None,
            });
        };

        let session_handle = self.sessions.read().await.get(&session_id).cloned();
        let (start_time, coordinates_count) = match session_handle {
            Some(s) => {
                let session = s.read().await;
                (Some(session.start_time), session.coordinates.len())
            }
            None => (None, 0),
        };

        Ok(DeviceStatus {
            is_active: true,
            session_id: Some(session_id),
            start_time,
            coordinates_count,
            last_update: device.last_update.clone(),
        })
    }

    /// Full session snapshot, scoped to the owner.
    pub async fn session_details(
        &self,
        session_id: Uuid,
        owner_id: Uuid,
    ) -> Result<TriggerSession> {
        let session_handle = self
            .sessions
            .read()
            .await
            .get(&session_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;

        let session = session_handle.read().await.clone();
        if session.user_id != Some(owner_id) {
            return Err(AppError::NotFound("Session not found".to_string()));
        }
        Ok(session)
    }

    /// Paginated history of a user's sessions, most recent first,
    /// optionally filtered to one device.
    pub async fn session_history(
        &self,
        owner_id: Uuid,
        device_id: Option<&str>,
        page: u32,
        limit: u32,
    ) -> Result<HistoryPage> {
        let page = page.max(1);
        let limit = limit.max(1);

        let mut summaries = Vec::new();
        for handle in self.sessions.read().await.values() {
            let session = handle.read().await;
            if session.user_id != Some(owner_id) {
                continue;
            }
            if let Some(filter) = device_id {
                if session.device_id != filter {
                    continue;
                }
            }
            summaries.push(SessionSummary::from(&*session));
        }
        summaries.sort_by(|a, b| b.start_time.cmp(&a.start_time));

        let total = summaries.len();
        let total_pages = (total as u32).div_ceil(limit).max(1);
        // page and limit come straight from query parameters; keep the
        // offset arithmetic overflow-safe.
        let skip = (page as usize - 1).saturating_mul(limit as usize);
        let sessions = summaries
            .into_iter()
            .skip(skip)
            .take(limit as usize)
            .collect();

        Ok(HistoryPage {
            sessions,
            total,
            page,
            limit,
            total_pages,
        })
    }

    /// All currently active sessions for a user.
    pub async fn active_sessions(&self, owner_id: Uuid) -> Result<Vec<TriggerSession>> {
        let mut active = Vec::new();
        for handle in self.sessions.read().await.values() {
            let session = handle.read().await;
            if session.user_id == Some(owner_id) && session.status == SessionStatus::Active {
                active.push(session.clone());
            }
        }
        active.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(active)
    }

    /// Last recorded coordinate of the device's active session.
    pub async fn current_location(
        &self,
        device_id: &str,
        owner_id: Uuid,
    ) -> Result<CoordinateRecord> {
        let handle = self.owned_device_handle(device_id, owner_id).await?;
        let session_id = handle.lock().await.active_session_id.ok_or_else(|| {
            AppError::NotFound("No active session found for device".to_string())
        })?;

        let session_handle = self
            .sessions
            .read()
            .await
            .get(&session_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("No active session found for device".to_string()))?;

        let session = session_handle.read().await;
        session
            .coordinates
            .last()
            .cloned()
            .ok_or_else(|| AppError::NotFound("No location recorded yet".to_string()))
    }

    /// The device record plus its current location when triggered.
    pub async fn device_info(
        &self,
        device_id: &str,
        owner_id: Uuid,
    ) -> Result<(DeviceState, Option<CoordinateRecord>)> {
        let handle = self.owned_device_handle(device_id, owner_id).await?;
        let device = handle.lock().await.clone();

        let current_location = if device.is_triggered {
            self.current_location(device_id, owner_id).await.ok()
        } else {
            None
        };

        Ok((device, current_location))
    }

    /// Replaces the device's emergency contacts. Idempotent per-field
    /// write; callers re-submit only this piece after a partial failure.
    pub async fn update_emergency_contacts(
        &self,
        device_id: &str,
        owner_id: Uuid,
        contacts: Vec<EmergencyContact>,
    ) -> Result<Vec<EmergencyContact>> {
        let handle = self.owned_device_handle(device_id, owner_id).await?;
        let mut device = handle.lock().await;
        device.emergency_contacts = contacts;
        tracing::info!(device_id, "Emergency contacts updated");
        Ok(device.emergency_contacts.clone())
    }

    /// Replaces the device's trigger words. Idempotent per-field write.
    pub async fn update_trigger_words(
        &self,
        device_id: &str,
        owner_id: Uuid,
        words: Vec<String>,
    ) -> Result<Vec<String>> {
        let handle = self.owned_device_handle(device_id, owner_id).await?;
        let mut device = handle.lock().await;
        device.trigger_words = words;
        tracing::info!(device_id, "Trigger words updated");
        Ok(device.trigger_words.clone())
    }

    /// Phone numbers of a device's emergency contacts, no auth scoping.
    /// Consumed by the device itself during an emergency.
    pub async fn public_emergency_contacts(&self, device_id: &str) -> Result<Vec<String>> {
        let handle = self.device_handle(device_id).await?;
        let device = handle.lock().await;
        Ok(device
            .emergency_contacts
            .iter()
            .map(|c| c.phone.clone())
            .collect())
    }
}

impl Default for SessionDirectory {
    fn default() -> Self {
        Self::new()
    }
}

fn last_update_of(record: &CoordinateRecord) -> LastUpdate {
    LastUpdate {
        latitude: record.latitude,
        longitude: record.longitude,
        timestamp: record.timestamp,
        tag: record.tag.clone().unwrap_or_else(|| "Emergency".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingest(lat: f64, lng: f64) -> CoordinateIngest {
        CoordinateIngest {
            latitude: lat,
            longitude: lng,
            timestamp: None,
            accuracy: None,
            speed: None,
            tag: None,
        }
    }

    async fn linked_device(dir: &SessionDirectory, device_id: &str) -> Uuid {
        let user_id = Uuid::new_v4();
        dir.register_device(device_id).await.unwrap();
        dir.link_device(device_id, user_id).await.unwrap();
        user_id
    }

    #[tokio::test]
    async fn start_allocates_session_and_flips_device_state() {
        let dir = SessionDirectory::new();
        let user = linked_device(&dir, "D1").await;

        let session = dir
            .start_trigger("D1", Some(ingest(28.1, 77.2)))
            .await
            .unwrap();
        assert_eq!(session.status, SessionStatus::Active);
        assert!(session.end_time.is_none());
        assert_eq!(session.coordinates.len(), 1);

        let status = dir.device_status("D1", user).await.unwrap();
        assert!(status.is_active);
        assert_eq!(status.session_id, Some(session.session_id));
        assert_eq!(status.coordinates_count, 1);
        let last = status.last_update.unwrap();
        assert_eq!(last.latitude, 28.1);
        assert_eq!(last.tag, "Emergency");
    }

    #[tokio::test]
    async fn second_start_conflicts_without_touching_active_session() {
        let dir = SessionDirectory::new();
        linked_device(&dir, "D1").await;

        let first = dir.start_trigger("D1", None).await.unwrap();
        let err = dir.start_trigger("D1", None).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let device = dir.link_device("D1", first.user_id.unwrap()).await.unwrap();
        assert_eq!(device.active_session_id, Some(first.session_id));
    }

    #[tokio::test]
    async fn append_preserves_submission_order() {
        let dir = SessionDirectory::new();
        let user = linked_device(&dir, "D1").await;
        let session = dir.start_trigger("D1", None).await.unwrap();

        for i in 0..5 {
            dir.append_coordinates("D1", ingest(10.0 + i as f64, 20.0))
                .await
                .unwrap();
        }

        let details = dir.session_details(session.session_id, user).await.unwrap();
        assert_eq!(details.coordinates.len(), 5);
        for (i, record) in details.coordinates.iter().enumerate() {
            assert_eq!(record.latitude, 10.0 + i as f64);
        }
    }

    #[tokio::test]
    async fn append_without_active_session_is_invalid_state() {
        let dir = SessionDirectory::new();
        linked_device(&dir, "D1").await;

        let err = dir
            .append_coordinates("D1", ingest(1.0, 2.0))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn stop_finalizes_and_is_idempotent() {
        let dir = SessionDirectory::new();
        let user = linked_device(&dir, "D1").await;
        let session = dir.start_trigger("D1", None).await.unwrap();

        let outcome = dir.stop_trigger("D1", true).await.unwrap();
        let snapshot = match outcome {
            StopOutcome::Stopped(s) => s,
            StopOutcome::AlreadyIdle => panic!("expected a stopped session"),
        };
        assert_eq!(snapshot.status, SessionStatus::Ended);
        assert!(snapshot.end_time.unwrap() >= snapshot.start_time);
        assert!(snapshot.manual_stop);

        // Second stop is a defined no-op.
        assert!(matches!(
            dir.stop_trigger("D1", true).await.unwrap(),
            StopOutcome::AlreadyIdle
        ));

        let status = dir.device_status("D1", user).await.unwrap();
        assert!(!status.is_active);

        // The finalized snapshot stays immutable and queryable.
        let details = dir.session_details(session.session_id, user).await.unwrap();
        assert_eq!(details.status, SessionStatus::Ended);
    }

    #[tokio::test]
    async fn concurrent_starts_admit_exactly_one_active_session() {
        let dir = Arc::new(SessionDirectory::new());
        linked_device(&dir, "D1").await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let dir = dir.clone();
            handles.push(tokio::spawn(async move {
                dir.start_trigger("D1", None).await.is_ok()
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn history_is_most_recent_first_and_paginated() {
        let dir = SessionDirectory::new();
        let user = linked_device(&dir, "D1").await;

        let mut ids = Vec::new();
        for _ in 0..3 {
            let session = dir.start_trigger("D1", None).await.unwrap();
            ids.push(session.session_id);
            dir.stop_trigger("D1", false).await.unwrap();
        }

        let history = dir.session_history(user, Some("D1"), 1, 2).await.unwrap();
        assert_eq!(history.total, 3);
        assert_eq!(history.total_pages, 2);
        assert_eq!(history.sessions.len(), 2);
        // Most recent first: the last started session leads the page.
        assert_eq!(history.sessions[0].session_id, *ids.last().unwrap());
        assert_eq!(history.sessions[0].status, SessionStatus::Ended);
    }

    #[tokio::test]
    async fn absurd_pagination_values_yield_an_empty_page() {
        let dir = SessionDirectory::new();
        let user = linked_device(&dir, "D1").await;
        dir.start_trigger("D1", None).await.unwrap();
        dir.stop_trigger("D1", true).await.unwrap();

        let history = dir
            .session_history(user, None, u32::MAX, u32::MAX)
            .await
            .unwrap();
        assert!(history.sessions.is_empty());
        assert_eq!(history.total, 1);
    }

    #[tokio::test]
    async fn foreign_owner_sees_not_found() {
        let dir = SessionDirectory::new();
        let user = linked_device(&dir, "D1").await;
        let session = dir.start_trigger("D1", None).await.unwrap();

        let stranger = Uuid::new_v4();
        assert!(matches!(
            dir.device_status("D1", stranger).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            dir.session_details(session.session_id, stranger)
                .await
                .unwrap_err(),
            AppError::NotFound(_)
        ));

        // The real owner still resolves everything.
        assert!(dir.device_status("D1", user).await.is_ok());
    }

    #[tokio::test]
    async fn linking_to_second_user_conflicts() {
        let dir = SessionDirectory::new();
        linked_device(&dir, "D1").await;

        let err = dir.link_device("D1", Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
