//! Runtime configuration

use std::env;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use plexus_transport::{Namespace, DEFAULT_ROOT};

/// Environment variable overriding [`RuntimeConfig::root`]
pub const ENV_ROOT: &str = "PLEXUS_ROOT";
/// Environment variable overriding [`RuntimeConfig::verbose`]
pub const ENV_VERBOSE: &str = "PLEXUS_VERBOSE";
/// Environment variable overriding [`RuntimeConfig::log_filter`]
pub const ENV_LOG: &str = "PLEXUS_LOG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Log output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Plexus runtime configuration
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Namespace root under which endpoints are created
    pub root: String,
    /// Emit verbose per-context diagnostics
    pub verbose: bool,
    /// `EnvFilter` directive for the tracing subscriber
    pub log_filter: String,
    pub log_format: LogFormat,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            root: DEFAULT_ROOT.to_string(),
            verbose: false,
            log_filter: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl RuntimeConfig {
    /// Parse a JSON document; missing fields keep their defaults
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Defaults overridden by `PLEXUS_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|var| env::var(var).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(root) = lookup(ENV_ROOT) {
            self.root = root;
        }
        if let Some(value) = lookup(ENV_VERBOSE) {
            self.verbose = parse_flag(&value).ok_or(ConfigError::InvalidEnv {
                var: ENV_VERBOSE,
                value,
            })?;
        }
        if let Some(filter) = lookup(ENV_LOG) {
            self.log_filter = filter;
        }
        Ok(self)
    }

    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Fresh namespace rooted at [`RuntimeConfig::root`]
    pub fn namespace(&self) -> Arc<Namespace> {
        Namespace::new(self.root.clone())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.root, "plexus");
        assert!(!config.verbose);
        assert_eq!(config.log_filter, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_partial_json() {
        let config =
            RuntimeConfig::from_json_str(r#"{"verbose": true, "log_format": "json"}"#).unwrap();
        assert!(config.verbose);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.root, "plexus");
    }

    #[test]
    fn test_bad_json() {
        assert!(matches!(
            RuntimeConfig::from_json_str(r#"{"verbose": "loud"}"#),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let config = RuntimeConfig::default()
            .with_overrides(vars(&[
                ("PLEXUS_ROOT", "game"),
                ("PLEXUS_VERBOSE", "On"),
                ("PLEXUS_LOG", "plexus_state=trace"),
            ]))
            .unwrap();

        assert_eq!(config.root, "game");
        assert!(config.verbose);
        assert_eq!(config.log_filter, "plexus_state=trace");
    }

    #[test]
    fn test_invalid_verbose_flag() {
        let result = RuntimeConfig::default().with_overrides(vars(&[("PLEXUS_VERBOSE", "maybe")]));
        match result {
            Err(ConfigError::InvalidEnv { var, value }) => {
                assert_eq!(var, ENV_VERBOSE);
                assert_eq!(value, "maybe");
            }
            other => panic!("expected InvalidEnv, got {other:?}"),
        }
    }

    #[test]
    fn test_builder() {
        let config = RuntimeConfig::default()
            .with_root("arena")
            .with_verbose(true)
            .with_log_filter("debug")
            .with_log_format(LogFormat::Json);

        assert_eq!(config.namespace().root(), "arena");
        assert!(config.verbose);
        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.log_format, LogFormat::Json);
    }
}
