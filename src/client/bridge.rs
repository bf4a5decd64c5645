use crate::client::api::ApiClient;
use crate::client::transport::{RetryPolicy, SettingsTransport, send_with_retry};
use crate::error::{AppError, Result};
use crate::models::device::EmergencyContact;
use crate::models::wire::EmergencyDataPayload;
use crate::validation::settings as settings_validation;

/// An edited settings pair headed for the backend and, optionally, a
/// connected physical device.
#[derive(Debug, Clone)]
pub struct DeviceSettings {
    pub emergency_contacts: Vec<EmergencyContact>,
    pub trigger_words: Vec<String>,
}

impl DeviceSettings {
    /// The canonical combined payload consumed by device firmware.
    pub fn canonical_payload(&self) -> EmergencyDataPayload {
        EmergencyDataPayload {
            emergency_contact: self
                .emergency_contacts
                .iter()
                .map(|c| c.phone.clone())
                .collect(),
            trigger_word: self.trigger_words.clone(),
        }
    }

    /// The text form written over the device transport: the canonical
    /// payload, pretty-printed.
    pub fn device_text(&self) -> Result<String> {
        sonic_rs::to_string_pretty(&self.canonical_payload())
            .map_err(|e| AppError::Internal(format!("Serialize failed: {}", e)))
    }
}

/// Pushes settings edits to the backend record and to an optionally
/// connected device, treating the two as independent, non-transactional
/// writes.
pub struct SettingsSyncBridge<'a> {
    api: &'a ApiClient,
    device_id: String,
    policy: RetryPolicy,
}

impl<'a> SettingsSyncBridge<'a> {
    pub fn new(api: &'a ApiClient, device_id: impl Into<String>) -> Self {
        Self {
            api,
            device_id: device_id.into(),
            policy: RetryPolicy::default(),
        }
    }

    /// Overrides the device-path retry policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Applies the settings to the backend: two independent per-field
    /// updates plus the canonical payload push. A partial failure is
    /// surfaced but nothing is rolled back; the caller re-submits only
    /// the failed piece. Backend calls are never retried here.
    pub async fn apply_backend(&self, settings: &DeviceSettings) -> Result<()> {
        settings_validation::validate_device_settings(
            &settings.emergency_contacts,
            &settings.trigger_words,
        )?;

        let (contacts_result, words_result) = tokio::join!(
            self.api
                .update_emergency_contacts(&self.device_id, settings.emergency_contacts.clone()),
            self.api
                .update_trigger_words(&self.device_id, settings.trigger_words.clone()),
        );

        match (contacts_result, words_result) {
            (Ok(_), Ok(_)) => {}
            (Err(e), Ok(_)) => {
                tracing::warn!("Emergency contacts update failed, trigger words saved: {}", e);
                return Err(e);
            }
            (Ok(_), Err(e)) => {
                tracing::warn!("Trigger words update failed, emergency contacts saved: {}", e);
                return Err(e);
            }
            (Err(contacts_err), Err(words_err)) => {
                return Err(AppError::Internal(format!(
                    "Both settings writes failed: {}; {}",
                    contacts_err, words_err
                )));
            }
        }

        self.api
            .update_emergency_data(&settings.canonical_payload())
            .await
    }

    /// Serializes the canonical payload and writes it over the device
    /// transport with the bridge's bounded retry policy.
    pub async fn push_to_device<T: SettingsTransport>(
        &self,
        transport: &mut T,
        settings: &DeviceSettings,
    ) -> Result<()> {
        settings_validation::validate_device_settings(
            &settings.emergency_contacts,
            &settings.trigger_words,
        )?;

        let text = settings.device_text()?;
        send_with_retry(transport, text.as_bytes(), self.policy).await
    }

    /// Full sync: backend first, then the device if a live connection
    /// handle was supplied.
    pub async fn apply<T: SettingsTransport>(
        &self,
        settings: &DeviceSettings,
        transport: Option<&mut T>,
    ) -> Result<()> {
        self.apply_backend(settings).await?;
        if let Some(transport) = transport {
            self.push_to_device(transport, settings).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SinkTransport {
        written: Vec<Vec<u8>>,
    }

    impl SettingsTransport for SinkTransport {
        async fn write_settings(&mut self, payload: &[u8]) -> Result<()> {
            self.written.push(payload.to_vec());
            Ok(())
        }
    }

    fn settings() -> DeviceSettings {
        DeviceSettings {
            emergency_contacts: vec![EmergencyContact {
                name: "Asha".to_string(),
                phone: "+91 93100 22664".to_string(),
            }],
            trigger_words: vec!["help".to_string(), "bachao".to_string()],
        }
    }

    #[test]
    fn canonical_payload_carries_phones_and_words() {
        let payload = settings().canonical_payload();
        assert_eq!(payload.emergency_contact, vec!["+91 93100 22664"]);
        assert_eq!(payload.trigger_word, vec!["help", "bachao"]);
    }

    #[tokio::test]
    async fn validation_fails_before_any_network_call() {
        // Nothing listens on this address; a network attempt would fail
        // with a different error than the expected validation one.
        let api = ApiClient::new("http://127.0.0.1:1");
        let bridge = SettingsSyncBridge::new(&api, "D1");

        let mut bad = settings();
        bad.trigger_words.push("help".to_string());

        let err = bridge.apply_backend(&bad).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn backend_partial_failure_surfaces_and_keeps_the_other_write() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};

        use axum::routing::put;

        let words_saved = Arc::new(AtomicBool::new(false));
        let flag = words_saved.clone();

        // Contacts write fails at the store; trigger words go through.
        let app = axum::Router::new()
            .route(
                "/api/device/{device_id}/emergency-contacts",
                put(|| async {
                    (
                        http::StatusCode::INTERNAL_SERVER_ERROR,
                        r#"{"success":false,"message":"contact store offline"}"#,
                    )
                }),
            )
            .route(
                "/api/device/{device_id}/trigger-words",
                put(move || {
                    let flag = flag.clone();
                    async move {
                        flag.store(true, Ordering::SeqCst);
                        sonic_rs::to_string(&crate::models::wire::UpdateTriggerWordsResponse {
                            success: true,
                            message: "Trigger words updated successfully".to_string(),
                            trigger_words: vec!["help".to_string(), "bachao".to_string()],
                        })
                        .unwrap()
                    }
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let api = ApiClient::new(format!("http://{}", addr));
        let bridge = SettingsSyncBridge::new(&api, "D1");

        let err = bridge.apply_backend(&settings()).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert!(err.to_string().contains("contact store offline"));

        // The successful half is not rolled back.
        assert!(words_saved.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn device_push_writes_pretty_json_payload() {
        let api = ApiClient::new("http://127.0.0.1:1");
        let bridge = SettingsSyncBridge::new(&api, "D1");
        let mut transport = SinkTransport { written: Vec::new() };

        bridge.push_to_device(&mut transport, &settings()).await.unwrap();

        assert_eq!(transport.written.len(), 1);
        let text = String::from_utf8(transport.written[0].clone()).unwrap();
        let parsed: EmergencyDataPayload = sonic_rs::from_str(&text).unwrap();
        assert_eq!(parsed, settings().canonical_payload());
        // Pretty-printed, as the firmware-facing emergency file is.
        assert!(text.contains('\n'));
    }
}
