//! Remote store configuration.
//!
//! One [`DriveConfig`] is built per run and injected into the client; there
//! is no process-wide credential state.

use thiserror::Error;

/// Drive v3 REST endpoint.
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/drive/v3";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("GATHER_DRIVE_TOKEN is not set — provide a read-scoped OAuth access token")]
    MissingToken,
}

/// Configuration for [`crate::DriveClient`].
#[derive(Debug, Clone)]
pub struct DriveConfig {
    /// OAuth access token with read-only Drive scope.
    pub access_token: String,
    /// API base URL (override for testing against a local server).
    pub api_base: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl DriveConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Load configuration from `GATHER_DRIVE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let access_token =
            std::env::var("GATHER_DRIVE_TOKEN").map_err(|_| ConfigError::MissingToken)?;

        Ok(Self {
            access_token,
            api_base: std::env::var("GATHER_DRIVE_API_BASE")
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            timeout_secs: env_u64("GATHER_DRIVE_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS),
        })
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
