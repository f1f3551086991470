//! In-memory scoped key-value store for ScopeKV
//!
//! This crate provides the in-memory implementation of the `ScopedKvStore`
//! interface defined in scopekv-core, together with its expiration sweeper.
//! State lives for the lifetime of the process only.

use std::sync::Arc;
use tracing::warn;

use scopekv_core::{create_store_factory, KvError, ScopedKvStore};

pub mod config;
pub use config::KvStoreConfig;

pub mod store;
pub use store::InMemoryKvStore;

pub mod sweeper;
pub use sweeper::ExpirationSweeper;

pub mod wait;
pub use wait::wait_for_event;

/// Build a store factory backed by in-memory stores
///
/// Stores created for `memory://` URLs start their sweeper when the
/// configuration enables it and a tokio runtime is available; other URLs
/// are rejected.
pub fn store_factory(
    config: KvStoreConfig,
) -> impl Fn(&str) -> Result<Arc<dyn ScopedKvStore>, KvError> + Send + Sync {
    create_store_factory(move || {
        let store = InMemoryKvStore::with_config(config.clone());
        if config.sweeper_enabled {
            if let Err(e) = store.start_sweeper() {
                warn!("Store created without expiration sweeper: {}", e);
            }
        }
        Arc::new(store)
    })
}

/// Build the store selected by `config.store_url`
pub fn open_store(config: KvStoreConfig) -> Result<Arc<dyn ScopedKvStore>, KvError> {
    config.validate()?;
    let url = config.store_url.clone();
    store_factory(config)(&url)
}
