use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::Config;
use crate::repositories::directory::SessionDirectory;

/// Resolves opaque bearer tokens to user ids.
///
/// Token issuance belongs to the auth subsystem outside this crate; the
/// registry is the boundary it writes through. Everything here only ever
/// resolves or revokes.
#[derive(Clone, Default)]
pub struct AuthRegistry {
    tokens: Arc<RwLock<HashMap<String, Uuid>>>,
}

impl AuthRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a fresh opaque token for a user.
    pub async fn issue(&self, user_id: Uuid) -> String {
        let token = Uuid::new_v4().to_string();
        self.tokens.write().await.insert(token.clone(), user_id);
        token
    }

    /// Resolves a token to its user, if the token is known.
    pub async fn resolve(&self, token: &str) -> Option<Uuid> {
        self.tokens.read().await.get(token).copied()
    }

    /// Revokes a token. Resolving it afterwards fails.
    pub async fn revoke(&self, token: &str) {
        self.tokens.write().await.remove(token);
    }
}

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The in-memory device/session registry.
    pub directory: Arc<SessionDirectory>,
    /// Bearer-token resolution for user-facing endpoints.
    pub auth: AuthRegistry,
    /// The application's configuration.
    pub config: Config,
}

impl AppState {
    /// Creates a new `AppState`.
    pub fn new(config: Config) -> Self {
        let directory = Arc::new(SessionDirectory::new());
        tracing::info!("Session directory initialized");

        Self {
            directory,
            auth: AuthRegistry::new(),
            config,
        }
    }
}
