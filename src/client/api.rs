use std::sync::{Arc, RwLock};

use http::StatusCode;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::coordinate::CoordinateIngest;
use crate::models::device::EmergencyContact;
use crate::models::wire::{
    ActiveSessionsResponse, AddCoordinatesRequest, AddCoordinatesResponse, CreateDeviceRequest,
    DeviceAck, DeviceResponse, EmergencyDataPayload, ErrorBody, LinkDeviceRequest,
    SessionDetailsResponse, SessionHistoryResponse, SessionStatusResponse, StartTriggerRequest,
    StartTriggerResponse, StopTriggerRequest, StopTriggerResponse, UpdateContactsRequest,
    UpdateContactsResponse, UpdateTriggerWordsRequest, UpdateTriggerWordsResponse,
};

/// Process-wide authentication context.
///
/// Lifecycle: unauthenticated -> authenticated(token) -> unauthenticated,
/// mutated only by login/logout and the 401 handler in [`ApiClient`].
#[derive(Default)]
pub struct AuthContext {
    token: RwLock<Option<String>>,
}

impl AuthContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().unwrap().clone()
    }

    pub fn set_token(&self, token: String) {
        *self.token.write().unwrap() = Some(token);
    }

    /// Purges the cached token. The caller is logged out from this point.
    pub fn clear_token(&self) {
        *self.token.write().unwrap() = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.read().unwrap().is_some()
    }
}

/// The frontend's HTTP wrapper around the session directory contract.
///
/// Backend-reported errors pass through verbatim; any 401 purges the
/// cached token before the error propagates, regardless of which call
/// produced it.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth: Arc<AuthContext>,
}

impl ApiClient {
    /// Creates a client against a server base URL (no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            auth: Arc::new(AuthContext::new()),
        }
    }

    /// The shared authentication context.
    pub fn auth(&self) -> &Arc<AuthContext> {
        &self.auth
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn with_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<ErrorBody>()
            .await
            .map(|body| body.message)
            .unwrap_or_else(|_| status.to_string());

        if status == StatusCode::UNAUTHORIZED {
            // Forced logout: a 401 anywhere invalidates the cached token.
            self.auth.clear_token();
            tracing::warn!("401 received, purging cached token");
            return Err(AppError::Unauthorized(message));
        }

        Err(match status {
            StatusCode::NOT_FOUND => AppError::NotFound(message),
            StatusCode::CONFLICT => AppError::Conflict(message),
            StatusCode::BAD_REQUEST => AppError::Validation(message),
            _ => AppError::Internal(message),
        })
    }

    // ---------------- sessions ----------------

    pub async fn start_trigger(
        &self,
        device_id: &str,
        initial_location: Option<CoordinateIngest>,
    ) -> Result<StartTriggerResponse> {
        let response = self
            .with_auth(self.http.post(self.url("/api/sessions/start")))
            .json(&StartTriggerRequest {
                device_id: device_id.to_string(),
                initial_location,
            })
            .send()
            .await?;
        Ok(self.check(response).await?.json().await?)
    }

    pub async fn add_coordinates(
        &self,
        device_id: &str,
        coordinate: CoordinateIngest,
    ) -> Result<AddCoordinatesResponse> {
        let response = self
            .with_auth(self.http.post(self.url("/api/sessions/coordinates")))
            .json(&AddCoordinatesRequest {
                device_id: device_id.to_string(),
                coordinate,
            })
            .send()
            .await?;
        Ok(self.check(response).await?.json().await?)
    }

    pub async fn stop_trigger(&self, device_id: &str, api_key: &str) -> Result<StopTriggerResponse> {
        let response = self
            .with_auth(self.http.post(self.url("/api/sessions/stop")))
            .header("x-api-key", api_key)
            .json(&StopTriggerRequest {
                device_id: device_id.to_string(),
                manual_stop: true,
            })
            .send()
            .await?;
        Ok(self.check(response).await?.json().await?)
    }

    pub async fn get_session_status(&self, device_id: &str) -> Result<SessionStatusResponse> {
        let url = self.url(&format!("/api/sessions/status/{}", device_id));
        let response = self.with_auth(self.http.get(url)).send().await?;
        Ok(self.check(response).await?.json().await?)
    }

    pub async fn get_session_details(&self, session_id: Uuid) -> Result<SessionDetailsResponse> {
        let url = self.url(&format!("/api/sessions/{}", session_id));
        let response = self.with_auth(self.http.get(url)).send().await?;
        Ok(self.check(response).await?.json().await?)
    }

    pub async fn get_session_history(
        &self,
        device_id: Option<&str>,
        page: Option<u32>,
    ) -> Result<SessionHistoryResponse> {
        let mut request = self.with_auth(self.http.get(self.url("/api/sessions/history")));
        if let Some(device_id) = device_id {
            request = request.query(&[("deviceId", device_id)]);
        }
        if let Some(page) = page {
            request = request.query(&[("page", page)]);
        }
        let response = request.send().await?;
        Ok(self.check(response).await?.json().await?)
    }

    pub async fn get_active_sessions(&self) -> Result<ActiveSessionsResponse> {
        let response = self
            .with_auth(self.http.get(self.url("/api/sessions/active")))
            .send()
            .await?;
        Ok(self.check(response).await?.json().await?)
    }

    pub async fn get_current_location(
        &self,
        device_id: &str,
    ) -> Result<crate::models::coordinate::CoordinateRecord> {
        let url = self.url(&format!("/api/sessions/current-location/{}", device_id));
        let response = self.with_auth(self.http.get(url)).send().await?;
        Ok(self.check(response).await?.json().await?)
    }

    // ---------------- devices ----------------

    pub async fn create_device(&self, device_id: &str, api_key: &str) -> Result<DeviceAck> {
        let response = self
            .with_auth(self.http.post(self.url("/api/device/create")))
            .header("x-api-key", api_key)
            .json(&CreateDeviceRequest {
                device_id: device_id.to_string(),
            })
            .send()
            .await?;
        Ok(self.check(response).await?.json().await?)
    }

    pub async fn link_device(&self, device_id: &str) -> Result<DeviceAck> {
        let response = self
            .with_auth(self.http.post(self.url("/api/device/link")))
            .json(&LinkDeviceRequest {
                device_id: device_id.to_string(),
            })
            .send()
            .await?;
        Ok(self.check(response).await?.json().await?)
    }

    pub async fn get_device(&self, device_id: &str) -> Result<DeviceResponse> {
        let url = self.url(&format!("/api/device/{}", device_id));
        let response = self.with_auth(self.http.get(url)).send().await?;
        Ok(self.check(response).await?.json().await?)
    }

    pub async fn update_emergency_contacts(
        &self,
        device_id: &str,
        contacts: Vec<EmergencyContact>,
    ) -> Result<UpdateContactsResponse> {
        let url = self.url(&format!("/api/device/{}/emergency-contacts", device_id));
        let response = self
            .with_auth(self.http.put(url))
            .json(&UpdateContactsRequest {
                emergency_contacts: contacts,
            })
            .send()
            .await?;
        Ok(self.check(response).await?.json().await?)
    }

    pub async fn update_trigger_words(
        &self,
        device_id: &str,
        words: Vec<String>,
    ) -> Result<UpdateTriggerWordsResponse> {
        let url = self.url(&format!("/api/device/{}/trigger-words", device_id));
        let response = self
            .with_auth(self.http.put(url))
            .json(&UpdateTriggerWordsRequest {
                trigger_words: words,
            })
            .send()
            .await?;
        Ok(self.check(response).await?.json().await?)
    }

    pub async fn update_emergency_data(&self, payload: &EmergencyDataPayload) -> Result<()> {
        let response = self
            .with_auth(self.http.post(self.url("/api/update-emergency-data")))
            .json(payload)
            .send()
            .await?;
        self.check(response).await?;
        Ok(())
    }
}
