//! Configuration for the in-memory store
//!
//! Values start from defaults and are overridden by environment variables.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::warn;

use scopekv_core::{KvError, KvResult, MEMORY_SCHEME};

/// Store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvStoreConfig {
    /// URL selecting the store backend
    #[serde(default = "default_store_url")]
    pub store_url: String,

    /// Period of the expiration sweeper in milliseconds
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,

    /// Whether the expiration sweeper is started with the store
    #[serde(default = "default_sweeper_enabled")]
    pub sweeper_enabled: bool,

    /// How long a one-shot wait for an event may block, in seconds
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
}

fn default_store_url() -> String {
    format!("{}local", MEMORY_SCHEME)
}

fn default_sweep_interval_ms() -> u64 {
    1000
}

fn default_sweeper_enabled() -> bool {
    true
}

fn default_wait_timeout_secs() -> u64 {
    30
}

impl Default for KvStoreConfig {
    fn default() -> Self {
        Self {
            store_url: default_store_url(),
            sweep_interval_ms: default_sweep_interval_ms(),
            sweeper_enabled: default_sweeper_enabled(),
            wait_timeout_secs: default_wait_timeout_secs(),
        }
    }
}

impl KvStoreConfig {
    /// Load configuration from environment variables
    pub fn load() -> KvResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source
    ///
    /// Recognised variables: `SCOPEKV_STORE_URL`, `SCOPEKV_SWEEP_INTERVAL_MS`,
    /// `SCOPEKV_SWEEPER_ENABLED`, `SCOPEKV_WAIT_TIMEOUT_SECS`. Unparseable
    /// numbers are ignored with a warning.
    pub fn from_lookup<F>(lookup: F) -> KvResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("SCOPEKV_STORE_URL") {
            config.store_url = url;
        }

        if let Some(interval) = lookup("SCOPEKV_SWEEP_INTERVAL_MS") {
            match interval.parse::<u64>() {
                Ok(ms) => config.sweep_interval_ms = ms,
                Err(_) => warn!("Invalid SCOPEKV_SWEEP_INTERVAL_MS value: {}", interval),
            }
        }

        if let Some(enabled) = lookup("SCOPEKV_SWEEPER_ENABLED") {
            config.sweeper_enabled = enabled.to_lowercase() == "true" || enabled == "1";
        }

        if let Some(timeout) = lookup("SCOPEKV_WAIT_TIMEOUT_SECS") {
            match timeout.parse::<u64>() {
                Ok(secs) => config.wait_timeout_secs = secs,
                Err(_) => warn!("Invalid SCOPEKV_WAIT_TIMEOUT_SECS value: {}", timeout),
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the store cannot run with
    pub fn validate(&self) -> KvResult<()> {
        if self.sweep_interval_ms == 0 {
            return Err(KvError::Configuration(
                "sweep_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.store_url.is_empty() {
            return Err(KvError::Configuration("store_url must not be empty".to_string()));
        }
        Ok(())
    }

    /// Sweeper period
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Deadline for one-shot event waits
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}
