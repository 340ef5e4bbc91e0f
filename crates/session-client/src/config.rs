//! Client configuration.
//!
//! Loaded from environment variables with sensible defaults; every
//! tuning knob can also be set directly for tests and embedders.

use crate::errors::ClientError;
use common::types::MeetingId;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Default backend streaming endpoint base.
pub const DEFAULT_ENDPOINT_BASE: &str = "ws://localhost:8000";

/// Default channel-open handshake timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default maximum consecutive reconnect attempts.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Default initial reconnect backoff delay.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Default reconnect backoff ceiling.
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Default conferencing provider domain.
pub const DEFAULT_PROVIDER_DOMAIN: &str = "meet.jit.si";

/// Default maximum join retries after a retryable provider error.
pub const DEFAULT_MAX_JOIN_ATTEMPTS: u32 = 3;

/// Default delay before rejoining under a fresh room identity.
///
/// Fixed, not exponential: identity, not timing, is the suspected
/// cause of a room rejection.
pub const DEFAULT_JOIN_RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Streaming transport configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Backend endpoint base, e.g. `ws://localhost:8000`.
    pub endpoint_base: String,
    /// Channel-open handshake timeout.
    pub connect_timeout: Duration,
    /// Maximum consecutive reconnect attempts before giving up.
    pub max_reconnect_attempts: u32,
    /// Initial reconnect backoff delay.
    pub backoff_base: Duration,
    /// Reconnect backoff ceiling.
    pub backoff_max: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint_base: DEFAULT_ENDPOINT_BASE.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_max: DEFAULT_BACKOFF_MAX,
        }
    }
}

impl TransportConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for unparsable numeric
    /// values. Missing variables fall back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for unparsable numeric values.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let endpoint_base = vars
            .get("COMPANION_WS_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_ENDPOINT_BASE.to_string());

        let connect_timeout = parse_seconds(vars, "COMPANION_CONNECT_TIMEOUT_SECONDS")?
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT);

        let max_reconnect_attempts = parse_u32(vars, "COMPANION_MAX_RECONNECT_ATTEMPTS")?
            .unwrap_or(DEFAULT_MAX_RECONNECT_ATTEMPTS);

        let backoff_base =
            parse_seconds(vars, "COMPANION_BACKOFF_BASE_SECONDS")?.unwrap_or(DEFAULT_BACKOFF_BASE);

        let backoff_max =
            parse_seconds(vars, "COMPANION_BACKOFF_MAX_SECONDS")?.unwrap_or(DEFAULT_BACKOFF_MAX);

        Ok(Self {
            endpoint_base,
            connect_timeout,
            max_reconnect_attempts,
            backoff_base,
            backoff_max,
        })
    }

    /// Derive the intelligence-stream URL for a meeting.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` if the combined URL is invalid.
    pub fn meeting_url(&self, meeting_id: &MeetingId) -> Result<Url, ClientError> {
        self.endpoint_url("ws/meeting", meeting_id)
    }

    /// Derive the notes-sync URL for a meeting.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` if the combined URL is invalid.
    pub fn notes_url(&self, meeting_id: &MeetingId) -> Result<Url, ClientError> {
        self.endpoint_url("ws/notes", meeting_id)
    }

    fn endpoint_url(&self, path: &str, meeting_id: &MeetingId) -> Result<Url, ClientError> {
        let base = self.endpoint_base.trim_end_matches('/');
        let raw = format!("{base}/{path}/{meeting_id}");
        Url::parse(&raw).map_err(|e| ClientError::Config(format!("invalid endpoint URL {raw}: {e}")))
    }
}

/// Conference join-negotiation configuration.
#[derive(Debug, Clone)]
pub struct ConferenceConfig {
    /// Conferencing provider domain.
    pub domain: String,
    /// Maximum join retries after a retryable provider error.
    pub max_join_attempts: u32,
    /// Fixed delay before each rejoin attempt.
    pub retry_delay: Duration,
}

impl Default for ConferenceConfig {
    fn default() -> Self {
        Self {
            domain: DEFAULT_PROVIDER_DOMAIN.to_string(),
            max_join_attempts: DEFAULT_MAX_JOIN_ATTEMPTS,
            retry_delay: DEFAULT_JOIN_RETRY_DELAY,
        }
    }
}

impl ConferenceConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for unparsable numeric values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for unparsable numeric values.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let domain = vars
            .get("COMPANION_CONFERENCE_DOMAIN")
            .cloned()
            .unwrap_or_else(|| DEFAULT_PROVIDER_DOMAIN.to_string());

        let max_join_attempts = parse_u32(vars, "COMPANION_MAX_JOIN_ATTEMPTS")?
            .unwrap_or(DEFAULT_MAX_JOIN_ATTEMPTS);

        let retry_delay = parse_seconds(vars, "COMPANION_JOIN_RETRY_DELAY_SECONDS")?
            .unwrap_or(DEFAULT_JOIN_RETRY_DELAY);

        Ok(Self {
            domain,
            max_join_attempts,
            retry_delay,
        })
    }
}

fn parse_u32(vars: &HashMap<String, String>, key: &str) -> Result<Option<u32>, ConfigError> {
    vars.get(key)
        .map(|raw| {
            raw.parse()
                .map_err(|_| ConfigError::InvalidValue(format!("{key}={raw}")))
        })
        .transpose()
}

fn parse_seconds(
    vars: &HashMap<String, String>,
    key: &str,
) -> Result<Option<Duration>, ConfigError> {
    Ok(parse_u32(vars, key)?.map(|secs| Duration::from_secs(u64::from(secs))))
}
