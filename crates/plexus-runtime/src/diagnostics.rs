//! Diagnostics - tracing subscriber setup
//!
//! Per-context verbose/error logging lives in [`Diagnostics`]; this module
//! installs the process-wide subscriber that renders it.

use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

pub use plexus_core::Diagnostics;

use crate::{LogFormat, RuntimeConfig};

/// Parse `directive`, falling back to `info` and returning the rejection
fn build_filter(directive: &str) -> (EnvFilter, Option<ParseError>) {
    match EnvFilter::try_new(directive) {
        Ok(filter) => (filter, None),
        Err(e) => (EnvFilter::new("info"), Some(e)),
    }
}

/// Install the global fmt subscriber.
///
/// Returns `false` if a global subscriber was already set, in which case
/// nothing changes. An unparsable filter falls back to `info`.
pub fn init_tracing(config: &RuntimeConfig) -> bool {
    let (filter, rejected) = build_filter(&config.log_filter);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_ids(true)
        .with_thread_names(true);

    let installed = match config.log_format {
        LogFormat::Pretty => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    };

    if installed {
        tracing::debug!(filter = %config.log_filter, format = ?config.log_format, "tracing initialized");
        if let Some(e) = rejected {
            tracing::warn!(filter = %config.log_filter, error = %e, "invalid log filter, using info");
        }
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_invalid_filter_falls_back_to_info() {
        let (filter, rejected) = build_filter("not a [valid filter");
        assert!(rejected.is_some());
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn test_valid_filter_is_kept() {
        let (filter, rejected) = build_filter("debug");
        assert!(rejected.is_none());
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
    }

    // The only test in this crate that installs the global subscriber
    #[test]
    fn test_init_is_idempotent() {
        let config = RuntimeConfig::default().with_log_filter("not a [valid filter");
        assert!(init_tracing(&config));
        assert!(!init_tracing(&config));
        assert!(tracing::enabled!(tracing::Level::INFO));
        assert!(!tracing::enabled!(tracing::Level::DEBUG));
    }
}
