//! Structured logging and tracing configuration.
//!
//! Sets up the `tracing` subscriber with an environment-driven filter and
//! either plain-text or JSON output. Request spans come from the
//! `TraceLayer` in `app.rs`.

use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Registry,
};

/// Tracing configuration options.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable JSON output format
    pub json: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Initialize tracing with the given level and output format.
///
/// `RUST_LOG` wins over `level` when set, so individual targets can be
/// tuned without a config change.
///
/// # Panics
///
/// Panics if a tracing subscriber has already been initialized in this
/// process.
pub fn init_tracing(level: &str, json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        let json_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true);

        Registry::default().with(env_filter).with(json_layer).init();
    } else {
        let fmt_layer = fmt::layer().with_target(true);

        Registry::default().with(env_filter).with(fmt_layer).init();
    }

    tracing::debug!("Tracing initialized: level={}, json={}", level, json);
}

/// Read tracing configuration from `FINDEX_LOG_LEVEL` / `FINDEX_LOG_JSON`.
#[must_use]
pub fn config_from_env() -> TracingConfig {
    let level = std::env::var("FINDEX_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let json = std::env::var("FINDEX_LOG_JSON")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false);

    TracingConfig { level, json }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_config_default() {
        let config = TracingConfig::default();
        assert_eq!(config.level, "info");
        assert!(!config.json);
    }

    #[test]
    fn test_tracing_config_custom() {
        let config = TracingConfig {
            level: "debug".to_string(),
            json: true,
        };
        assert_eq!(config.level, "debug");
        assert!(config.json);
    }
}
