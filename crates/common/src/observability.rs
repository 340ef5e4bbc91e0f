//! Tracing subscriber setup shared by embedding applications and tests.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level filter (trace, debug, info, warn, error)
    pub log_level: String,
    /// Enable JSON-formatted logs
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "session_client=debug,info".to_string(),
            json_logs: false,
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` overrides the configured level filter. Calling this more
/// than once is a no-op after the first successful init (the second
/// `init` would panic, so `try_init` is used and the error discarded).
pub fn init_tracing(config: &ObservabilityConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.log_level.clone().into());

    let registry = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        let _ = registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init();
    } else {
        let _ = registry.with(tracing_subscriber::fmt::layer()).try_init();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_does_not_panic() {
        let config = ObservabilityConfig::default();
        init_tracing(&config);
        init_tracing(&config);

        let json = ObservabilityConfig {
            json_logs: true,
            ..ObservabilityConfig::default()
        };
        init_tracing(&json);
    }
}
