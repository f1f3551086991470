//! Scoped key-value store interface
//!
//! This module defines the operations a host calls on the store, and the
//! read-only views returned by the listing operations.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::events::{EventFilter, KvEvent};
use crate::domain::listener::{EventListener, SubscriptionId};
use crate::types::Scope;
use crate::KvResult;

/// Key/value pairs of one (scope, specifier), in insertion order
pub type ScopeEntries = IndexMap<String, String>;

/// Every stored entry grouped by `"<SCOPE>-<specifier>"`
pub type AllScopesView = IndexMap<String, ScopeGroup>;

/// The entries stored under one (scope, specifier) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeGroup {
    /// Scope of the group
    pub scope: Scope,
    /// Specifier of the group
    pub specifier: String,
    /// Key/value pairs in insertion order
    pub entries: ScopeEntries,
}

/// Counters describing the store's current contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMetrics {
    /// Number of stored keys
    pub total_keys: usize,
    /// Keys written with a TTL and not yet evicted
    pub keys_with_ttl: usize,
    /// Keys past their expiry that the sweeper has not processed yet
    pub expired_pending: usize,
    /// Number of listener registrations
    pub listeners: usize,
    /// Whether the expiration sweeper task is running
    pub sweeper_running: bool,
}

/// A store whose keys live in scopes and whose mutations are observable
#[async_trait]
pub trait ScopedKvStore: Send + Sync {
    /// Get the value of a key, `None` when absent
    async fn get_value(&self, key: &str, scope: Scope, specifier: &str)
        -> KvResult<Option<String>>;

    /// Set a value, optionally expiring after `ttl_seconds`
    ///
    /// Returns the event that was dispatched to listeners.
    async fn set_value(
        &self,
        key: &str,
        value: &str,
        scope: Scope,
        specifier: &str,
        ttl_seconds: Option<u64>,
    ) -> KvResult<KvEvent>;

    /// Increment a numeric value by one, treating absent or non-numeric values as zero
    async fn increment_value(
        &self,
        key: &str,
        scope: Scope,
        specifier: &str,
        ttl_seconds: Option<u64>,
    ) -> KvResult<i64>;

    /// Delete a key, returning whether it existed
    ///
    /// A `deleted` event is dispatched even when the key was absent.
    async fn delete_key(&self, key: &str, scope: Scope, specifier: &str) -> KvResult<bool>;

    /// Keys stored under exactly `(scope, specifier)`, in insertion order
    async fn list_keys_in_scope(&self, scope: Scope, specifier: &str) -> KvResult<Vec<String>>;

    /// Key/value pairs stored under exactly `(scope, specifier)`
    async fn list_key_values_in_scope(
        &self,
        scope: Scope,
        specifier: &str,
    ) -> KvResult<ScopeEntries>;

    /// Every stored entry, grouped by scope and specifier
    async fn list_key_values_in_all_scopes(&self) -> KvResult<AllScopesView>;

    /// Register a listener that only receives operations accepted by `filter`
    fn add_filtered_listener(
        &self,
        scope: Scope,
        specifier: &str,
        filter: EventFilter,
        listener: Arc<dyn EventListener>,
    ) -> KvResult<SubscriptionId>;

    /// Register a listener for every operation
    fn add_listener(
        &self,
        scope: Scope,
        specifier: &str,
        listener: Arc<dyn EventListener>,
    ) -> KvResult<SubscriptionId> {
        self.add_filtered_listener(scope, specifier, EventFilter::Any, listener)
    }

    /// Unregister a listener; unknown ids are ignored and return `false`
    fn remove_listener(&self, subscription: SubscriptionId) -> bool;

    /// Get metrics about the store
    async fn metrics(&self) -> KvResult<StoreMetrics> {
        tracing::debug!("Using default metrics implementation (returns empty metrics)");
        Ok(StoreMetrics::default())
    }

    /// Health check for the store
    async fn health_check(&self) -> KvResult<bool> {
        Ok(true)
    }
}
