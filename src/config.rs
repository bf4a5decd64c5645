use std::env;
use std::path::PathBuf;
use anyhow::{Context, Result};

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The static API key presented by devices on privileged endpoints.
    pub api_key: String,
    /// The port the server listens on.
    pub port: u16,
    /// Default page size for session history queries.
    pub history_page_size: u32,
    /// Path of the canonical emergency payload file consumed by devices.
    pub emergency_file: PathBuf,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_key: env::var("API_KEY").context("API_KEY must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .context("Invalid PORT")?,
            history_page_size: env::var("HISTORY_PAGE_SIZE")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid HISTORY_PAGE_SIZE")?,
            emergency_file: env::var("EMERGENCY_FILE")
                .unwrap_or_else(|_| "data/emergency.txt".to_string())
                .into(),
        })
    }
}
