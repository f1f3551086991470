//! Factory for creating scoped key-value stores
//!
//! This module provides a factory function for creating stores based on a
//! configuration URL.

use std::sync::Arc;
use tracing::{error, info};

use crate::domain::store::ScopedKvStore;
use crate::KvError;

/// URL scheme served by the in-memory store
pub const MEMORY_SCHEME: &str = "memory://";

/// Create a store factory function
///
/// The returned function takes a store URL and builds a store for it. Only
/// `memory://` URLs are supported; anything else is a configuration error.
///
/// # Arguments
///
/// * `in_memory_factory` - Function to create an in-memory store
pub fn create_store_factory<F, S>(
    in_memory_factory: F,
) -> impl Fn(&str) -> Result<Arc<dyn ScopedKvStore>, KvError> + Send + Sync
where
    F: Fn() -> Arc<S> + Send + Sync + 'static,
    S: ScopedKvStore + 'static,
{
    move |url: &str| -> Result<Arc<dyn ScopedKvStore>, KvError> {
        if url.starts_with(MEMORY_SCHEME) {
            info!(url, "Creating in-memory scoped key-value store");
            let store: Arc<dyn ScopedKvStore> = in_memory_factory();
            Ok(store)
        } else {
            error!("Unsupported store URL: {}", url);
            Err(KvError::Configuration(format!("Unsupported store URL: {}", url)))
        }
    }
}
