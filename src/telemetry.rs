//! Logging setup
//!
//! Structured logging through tracing and tracing-subscriber.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Default filter directives for a log level
///
/// HTTP request traces from tower-http stay at debug so `RUST_LOG` can
/// silence them independently of promgate's own events.
pub fn default_directives(level: &str) -> String {
    format!("promgate={},tower_http=debug", level)
}

/// Initialize the tracing subscriber
///
/// Only the first call per process installs a subscriber; later calls are
/// ignored. `RUST_LOG` takes precedence over `default_level`.
///
/// # Examples
///
/// ```no_run
/// promgate::telemetry::init("info");
/// tracing::info!("Application started");
/// ```
pub fn init(default_level: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directives(default_level)));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_scope_level_to_crate() {
        assert_eq!(default_directives("warn"), "promgate=warn,tower_http=debug");
    }

    #[test]
    fn test_default_directives_parse_as_filter() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            let filter: Result<EnvFilter, _> = default_directives(level).parse();
            assert!(filter.is_ok(), "level {} should produce a valid filter", level);
        }
    }
}
