//! Monitoring setup for ScopeKV hosts.
//!
//! The store crates only emit `tracing` events; a host that wants to see
//! them installs a subscriber through [`init_logging`].

use serde::{Deserialize, Serialize};
use std::env;

pub mod logging;
pub use logging::init_logging;

/// Configuration for initializing logging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Service name attached to the startup log line
    pub service_name: String,
    /// Log level filter (e.g., "info,scopekv=debug")
    pub log_filter: String,
    /// Emit JSON lines instead of human-readable output
    pub enable_json_logging: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            service_name: "scopekv".to_string(),
            log_filter: "info".to_string(),
            enable_json_logging: false,
        }
    }
}

impl MonitoringConfig {
    /// Load configuration from `SCOPEKV_LOG_FILTER` and `SCOPEKV_LOG_JSON`
    pub fn load() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(filter) = lookup("SCOPEKV_LOG_FILTER") {
            if !filter.trim().is_empty() {
                config.log_filter = filter;
            }
        }

        if let Some(json) = lookup("SCOPEKV_LOG_JSON") {
            config.enable_json_logging = matches!(json.to_lowercase().as_str(), "true" | "1");
        }

        config
    }
}
