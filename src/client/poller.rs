use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use crate::client::api::ApiClient;
use crate::error::{AppError, Result};
use crate::models::coordinate::CoordinateRecord;
use crate::models::device::LastUpdate;
use crate::models::session::SessionSummary;
use crate::models::wire::{
    DeviceRecord, DeviceResponse, SessionDetailsResponse, SessionHistoryResponse,
    SessionStatusResponse,
};

/// The reconciled local view of one device: a possibly-stale read replica
/// of directory state, refreshed on demand.
#[derive(Debug, Clone, Default)]
pub struct DeviceView {
    pub device: Option<DeviceRecord>,
    pub history: Vec<SessionSummary>,
    pub is_triggered: bool,
    pub current_session_id: Option<Uuid>,
    /// Coordinates of the active session, in append order.
    pub session_locations: Vec<CoordinateRecord>,
    /// Best-effort latest position; a hint, not a source of truth.
    pub current_location: Option<LastUpdate>,
    /// Error banners from the last refresh; successes alongside failures
    /// are kept (partial-failure tolerant, not transactional).
    pub errors: Vec<String>,
}

/// The raw results of one polling round, before merging.
struct FetchOutcome {
    device: Result<DeviceResponse>,
    history: Result<SessionHistoryResponse>,
    status: Result<SessionStatusResponse>,
    detail: Option<Result<SessionDetailsResponse>>,
}

/// The frontend's reconciliation loop for one device.
///
/// Refresh is explicit (mount, user action, settings update); there is no
/// background interval. Three parallel reads, then a conditional detail
/// fetch only when the status poll reports an active session. A
/// generation counter discards responses from superseded refreshes.
pub struct DevicePoller {
    api: ApiClient,
    device_id: String,
    view: Mutex<DeviceView>,
    generation: AtomicU64,
}

impl DevicePoller {
    pub fn new(api: ApiClient, device_id: impl Into<String>) -> Self {
        Self {
            api,
            device_id: device_id.into(),
            view: Mutex::new(DeviceView::default()),
            generation: AtomicU64::new(0),
        }
    }

    /// The current view snapshot without refreshing.
    pub fn view(&self) -> DeviceView {
        self.view.lock().unwrap().clone()
    }

    /// The API client driving this poller.
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Runs one reconciliation round and returns the merged snapshot.
    pub async fn refresh(&self) -> DeviceView {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        // Three independent reads; completion order is not guaranteed.
        let (device, history, status) = tokio::join!(
            self.api.get_device(&self.device_id),
            self.api.get_session_history(Some(&self.device_id), None),
            self.api.get_session_status(&self.device_id),
        );

        // Two-phase fetch: only pull the (potentially large) coordinate
        // list when the cheap status poll says there is one to pull.
        let detail = match &status {
            Ok(s) if s.is_active => match s.session_id {
                Some(session_id) => Some(self.api.get_session_details(session_id).await),
                None => None,
            },
            _ => None,
        };

        let outcome = FetchOutcome {
            device,
            history,
            status,
            detail,
        };

        let mut view = self.view.lock().unwrap();
        if self.generation.load(Ordering::SeqCst) != generation {
            // Superseded by a newer refresh; discard these responses.
            tracing::debug!(generation, "Discarding stale poll responses");
            return view.clone();
        }

        apply_fetch(&mut view, outcome);
        view.clone()
    }
}

/// Merges one polling round into the view. The freshest successful
/// response for each slice overwrites that slice; a failed read leaves
/// its slice untouched and surfaces a banner instead.
fn apply_fetch(view: &mut DeviceView, outcome: FetchOutcome) {
    view.errors.clear();

    match outcome.device {
        Ok(response) => view.device = Some(response.device),
        Err(e) => view.errors.push(e.to_string()),
    }

    match outcome.history {
        Ok(response) => view.history = response.sessions,
        Err(e) => view.errors.push(e.to_string()),
    }

    let status_last_update = match outcome.status {
        Ok(status) => {
            view.is_triggered = status.is_active;
            view.current_session_id = status.session_id;
            if !status.is_active {
                view.session_locations.clear();
                view.current_location = None;
            }
            status.last_update
        }
        Err(e) => {
            view.errors.push(e.to_string());
            None
        }
    };

    match outcome.detail {
        Some(Ok(response)) => {
            if let Some(last) = response.session.coordinates.last() {
                view.current_location = Some(LastUpdate {
                    latitude: last.latitude,
                    longitude: last.longitude,
                    timestamp: last.timestamp,
                    tag: "Latest Location".to_string(),
                });
            }
            view.session_locations = response.session.coordinates;
        }
        // Status said active but the detail fetch raced a stop: keep the
        // previous best-effort data rather than treating it as a hard
        // failure.
        Some(Err(AppError::NotFound(_))) => {
            tracing::debug!("Active session vanished between status and detail fetch");
        }
        Some(Err(e)) => view.errors.push(e.to_string()),
        None => {}
    }

    // The denormalized status cache may be one write ahead of the detail
    // snapshot; prefer it for the marker position while triggered.
    if view.is_triggered {
        if let Some(last_update) = status_last_update {
            view.current_location = Some(last_update);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(lat: f64, lng: f64) -> CoordinateRecord {
        CoordinateRecord {
            latitude: lat,
            longitude: lng,
            timestamp: Utc::now(),
            accuracy: None,
            speed: None,
            tag: None,
        }
    }

    fn active_status(session_id: Uuid, count: usize) -> SessionStatusResponse {
        SessionStatusResponse {
            is_active: true,
            session_id: Some(session_id),
            start_time: Some(Utc::now()),
            coordinates_count: count,
            last_update: Some(LastUpdate {
                latitude: 28.2,
                longitude: 77.3,
                timestamp: Utc::now(),
                tag: "Emergency".to_string(),
            }),
            message: None,
        }
    }

    fn detail_with(session_id: Uuid, coordinates: Vec<CoordinateRecord>) -> SessionDetailsResponse {
        SessionDetailsResponse {
            session: crate::models::wire::SessionDetail {
                id: session_id,
                device_id: "D1".to_string(),
                start_time: Utc::now(),
                end_time: None,
                status: crate::models::session::SessionStatus::Active,
                coordinates,
                trigger_start_location: None,
                manual_stop: false,
                duration: None,
            },
        }
    }

    #[test]
    fn failed_read_keeps_other_slices() {
        let mut view = DeviceView::default();
        let session_id = Uuid::new_v4();

        apply_fetch(
            &mut view,
            FetchOutcome {
                device: Err(AppError::Internal("device fetch failed".to_string())),
                history: Ok(SessionHistoryResponse {
                    sessions: Vec::new(),
                    pagination: crate::models::wire::Pagination {
                        total: 0,
                        page: 1,
                        limit: 10,
                        total_pages: 1,
                    },
                }),
                status: Ok(active_status(session_id, 1)),
                detail: Some(Ok(detail_with(session_id, vec![record(28.1, 77.2)]))),
            },
        );

        assert_eq!(view.errors.len(), 1);
        assert!(view.is_triggered);
        assert_eq!(view.session_locations.len(), 1);
        // The status cache overlays the marker position.
        assert_eq!(view.current_location.as_ref().unwrap().latitude, 28.2);
    }

    #[test]
    fn detail_not_found_is_a_transient_race_not_an_error() {
        let mut view = DeviceView::default();
        view.session_locations = vec![record(1.0, 2.0)];
        let session_id = Uuid::new_v4();

        apply_fetch(
            &mut view,
            FetchOutcome {
                device: Err(AppError::Internal("offline".to_string())),
                history: Err(AppError::Internal("offline".to_string())),
                status: Ok(active_status(session_id, 1)),
                detail: Some(Err(AppError::NotFound("Session not found".to_string()))),
            },
        );

        // Best-effort: previous locations survive and no extra banner is
        // raised for the race.
        assert_eq!(view.session_locations.len(), 1);
        assert_eq!(view.errors.len(), 2);
        assert!(view.is_triggered);
    }

    #[tokio::test]
    async fn superseded_refresh_never_overwrites_the_newer_view() {
        use std::sync::Arc;
        use std::sync::atomic::AtomicU32;

        use axum::routing::get;

        fn device_body(word: &str) -> String {
            sonic_rs::to_string(&DeviceResponse {
                success: true,
                device: DeviceRecord {
                    device_id: "D1".to_string(),
                    emergency_contacts: Vec::new(),
                    trigger_words: vec![word.to_string()],
                    is_triggered: false,
                    last_active: Utc::now(),
                    current_location: None,
                },
            })
            .unwrap()
        }

        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let app = axum::Router::new()
            .route(
                "/api/device/{device_id}",
                get(move || {
                    let counter = counter.clone();
                    async move {
                        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                            // First round stalls so a second can overtake it.
                            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
                            device_body("stale")
                        } else {
                            device_body("fresh")
                        }
                    }
                }),
            )
            .route(
                "/api/sessions/history",
                get(|| async {
                    sonic_rs::to_string(&SessionHistoryResponse {
                        sessions: Vec::new(),
                        pagination: crate::models::wire::Pagination {
                            total: 0,
                            page: 1,
                            limit: 10,
                            total_pages: 1,
                        },
                    })
                    .unwrap()
                }),
            )
            .route(
                "/api/sessions/status/{device_id}",
                get(|| async {
                    sonic_rs::to_string(&SessionStatusResponse {
                        is_active: false,
                        session_id: None,
                        start_time: None,
                        coordinates_count: 0,
                        last_update: None,
                        message: Some("No active session".to_string()),
                    })
                    .unwrap()
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let poller = Arc::new(DevicePoller::new(ApiClient::new(base_url), "D1"));

        let slow = {
            let poller = poller.clone();
            tokio::spawn(async move { poller.refresh().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let fast = poller.refresh().await;
        assert_eq!(fast.device.as_ref().unwrap().trigger_words, vec!["fresh"]);

        // The overtaken round hands back the newer snapshot, not its own
        // stale responses.
        let slow = slow.await.unwrap();
        assert_eq!(slow.device.as_ref().unwrap().trigger_words, vec!["fresh"]);
        assert_eq!(poller.view().device.unwrap().trigger_words, vec!["fresh"]);
    }

    #[test]
    fn idle_status_clears_live_location_state() {
        let mut view = DeviceView::default();
        view.is_triggered = true;
        view.session_locations = vec![record(1.0, 2.0)];
        view.current_location = Some(LastUpdate {
            latitude: 1.0,
            longitude: 2.0,
            timestamp: Utc::now(),
            tag: "Emergency".to_string(),
        });

        apply_fetch(
            &mut view,
            FetchOutcome {
                device: Err(AppError::Internal("offline".to_string())),
                history: Err(AppError::Internal("offline".to_string())),
                status: Ok(SessionStatusResponse {
                    is_active: false,
                    session_id: None,
                    start_time: None,
                    coordinates_count: 0,
                    last_update: None,
                    message: Some("No active session".to_string()),
                }),
                detail: None,
            },
        );

        assert!(!view.is_triggered);
        assert!(view.session_locations.is_empty());
        assert!(view.current_location.is_none());
    }
}
