//! Client error types.
//!
//! Transports never raise out of event-callback code; these errors
//! surface only from the explicit `connect`/`join` calls and from the
//! seams (socket connector, conferencing provider) feeding them.

use std::time::Duration;
use thiserror::Error;

/// Session client error type.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration error (bad endpoint URL, unparsable tuning value).
    #[error("Configuration error: {0}")]
    Config(String),

    /// The channel-open handshake did not complete in time.
    #[error("Connection timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// Socket-level failure (connect refused, TLS, protocol error).
    #[error("Socket error: {0}")]
    Socket(String),

    /// The conferencing provider's client library failed to load.
    #[error("Provider library load failed: {0}")]
    ProviderLoad(String),

    /// The conferencing provider refused to create or join a room.
    #[error("Join failed: {0}")]
    JoinFailed(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}
