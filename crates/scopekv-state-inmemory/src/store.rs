//! In-memory implementation of the ScopedKvStore interface
//!
//! Entries and their expiry instants live together behind one lock. Every
//! mutation first takes the dispatch gate, then the state lock; it captures
//! its listeners under the state lock and delivers the event after releasing
//! it. Nothing is awaited between applying a mutation and delivering its
//! event, so a cancelled caller either changes nothing or has its event
//! delivered, and listeners see events in mutation order.

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tracing::{debug, info};

use scopekv_core::{
    now_millis, AllScopesView, EventFilter, EventListener, KvError, KvEvent, KvResult,
    ListenerRegistry, Scope, ScopeEntries, ScopeGroup, ScopedKey, ScopedKvStore, StoreMetrics,
    SubscriptionId,
};

use crate::config::KvStoreConfig;
use crate::sweeper::ExpirationSweeper;

#[derive(Default)]
struct StoreState {
    /// Values in insertion order
    entries: IndexMap<ScopedKey, String>,
    /// Expiry instants (epoch millis) of keys written with a TTL
    expirations: IndexMap<ScopedKey, i64>,
}

/// Shared part of the store, also reached by the sweeper task
pub(crate) struct StoreInner {
    state: RwLock<StoreState>,
    registry: ListenerRegistry,
    /// Held from before a mutation until its listeners have run
    dispatch_gate: AsyncMutex<()>,
}

impl StoreInner {
    fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            registry: ListenerRegistry::new(),
            dispatch_gate: AsyncMutex::new(()),
        }
    }

    /// Write a key, deriving the new value from the current one
    async fn write_with<T, F>(
        &self,
        scoped: ScopedKey,
        ttl_seconds: Option<u64>,
        compute: F,
    ) -> (KvEvent, T)
    where
        F: FnOnce(Option<&str>) -> (String, T),
    {
        let gate = self.dispatch_gate.lock().await;
        let mut state = self.state.write().await;

        let expires_at = ttl_seconds.map(expiry_from_now);
        if let Some(at) = expires_at {
            state.expirations.insert(scoped.clone(), at);
        }

        let (value, output) = compute(state.entries.get(&scoped).map(String::as_str));
        let old_value = state.entries.insert(scoped.clone(), value.clone());
        let event = KvEvent::written(&scoped, value, old_value, expires_at);

        debug!(
            operation = %event.operation,
            scope = %scoped.scope,
            specifier = %scoped.specifier,
            key = %scoped.key,
            expires_at = ?expires_at,
            "Stored value"
        );

        let delivery = self.registry.prepare(event.clone());
        drop(state);
        delivery.deliver();
        drop(gate);

        (event, output)
    }

    /// Remove a key and dispatch a `deleted` event
    ///
    /// With `expired_by` set, the key is only removed if its expiry is still at
    /// or before that instant; otherwise nothing happens and `None` is returned.
    async fn remove(&self, scoped: ScopedKey, expired_by: Option<i64>) -> Option<bool> {
        let gate = self.dispatch_gate.lock().await;
        let mut state = self.state.write().await;

        if let Some(now) = expired_by {
            match state.expirations.get(&scoped) {
                Some(at) if *at <= now => {}
                // Rewritten with a later TTL, or already gone, since the sweep began
                _ => return None,
            }
        }

        let removed_value = state.entries.shift_remove(&scoped);
        state.expirations.shift_remove(&scoped);
        let removed = removed_value.is_some();
        let event = KvEvent::deleted(&scoped, removed_value);

        debug!(
            scope = %scoped.scope,
            specifier = %scoped.specifier,
            key = %scoped.key,
            removed,
            expired = expired_by.is_some(),
            "Deleted key"
        );

        let delivery = self.registry.prepare(event);
        drop(state);
        delivery.deliver();
        drop(gate);

        Some(removed)
    }

    /// Evict every key whose expiry is at or before `now`, returning how many were evicted
    pub(crate) async fn sweep_expired_at(&self, now: i64) -> usize {
        let expired: Vec<ScopedKey> = {
            let state = self.state.read().await;
            debug!(tracked = state.expirations.len(), "Scanning expirations");
            state
                .expirations
                .iter()
                .filter(|(_, at)| **at <= now)
                .map(|(key, _)| key.clone())
                .collect()
        };

        let mut evicted = 0;
        for scoped in expired {
            if self.remove(scoped, Some(now)).await.is_some() {
                evicted += 1;
            }
        }
        evicted
    }
}

/// Expiry instant for a TTL given in seconds
fn expiry_from_now(ttl_seconds: u64) -> i64 {
    let ttl_ms = i64::try_from(ttl_seconds)
        .unwrap_or(i64::MAX)
        .saturating_mul(1000);
    now_millis().saturating_add(ttl_ms)
}

/// Key in a storable scope, or an error for the ALL wildcard
fn storable_key(key: &str, scope: Scope, specifier: &str) -> KvResult<ScopedKey> {
    if !scope.is_storable() {
        return Err(KvError::WildcardScope(key.to_string()));
    }
    Ok(ScopedKey::new(key, scope, specifier))
}

/// In-memory scoped key-value store
pub struct InMemoryKvStore {
    inner: Arc<StoreInner>,
    sweeper: Mutex<Option<ExpirationSweeper>>,
    config: KvStoreConfig,
}

impl InMemoryKvStore {
    /// Create a store with default configuration and no sweeper running
    pub fn new() -> Self {
        Self::with_config(KvStoreConfig::default())
    }

    /// Create a store with the given configuration and no sweeper running
    pub fn with_config(config: KvStoreConfig) -> Self {
        info!(
            sweep_interval_ms = config.sweep_interval_ms,
            "Creating new InMemoryKvStore"
        );
        Self {
            inner: Arc::new(StoreInner::new()),
            sweeper: Mutex::new(None),
            config,
        }
    }

    /// Create a store and start its sweeper when the configuration enables it
    ///
    /// Must be called from within a tokio runtime when the sweeper is enabled.
    pub fn start(config: KvStoreConfig) -> KvResult<Self> {
        config.validate()?;
        let store = Self::with_config(config);
        if store.config.sweeper_enabled {
            store.start_sweeper()?;
        }
        Ok(store)
    }

    /// Configuration the store was built with
    pub fn config(&self) -> &KvStoreConfig {
        &self.config
    }

    /// Start the background expiration sweeper
    pub fn start_sweeper(&self) -> KvResult<()> {
        let mut slot = self.sweeper.lock();
        if slot.as_ref().is_some_and(ExpirationSweeper::is_running) {
            return Err(KvError::SweeperAlreadyRunning);
        }

        let sweeper =
            ExpirationSweeper::spawn(Arc::downgrade(&self.inner), self.config.sweep_interval())?;
        *slot = Some(sweeper);
        Ok(())
    }

    /// Stop the sweeper and wait for its task to finish
    ///
    /// Returns `false` when no sweeper was running.
    pub async fn stop_sweeper(&self) -> bool {
        let sweeper = self.sweeper.lock().take();
        match sweeper {
            Some(sweeper) => {
                sweeper.stop().await;
                true
            }
            None => false,
        }
    }

    /// Whether the background sweeper is running
    pub fn is_sweeper_running(&self) -> bool {
        self.sweeper
            .lock()
            .as_ref()
            .is_some_and(ExpirationSweeper::is_running)
    }

    /// Run one sweep immediately, returning the number of evicted keys
    pub async fn sweep_expired(&self) -> usize {
        self.inner.sweep_expired_at(now_millis()).await
    }

    /// Wait for the next matching event, giving up after `wait_timeout_secs`
    pub async fn wait_for_event(
        &self,
        scope: Scope,
        specifier: &str,
        filter: EventFilter,
    ) -> KvResult<KvEvent> {
        crate::wait::wait_for_event(self, scope, specifier, filter, self.config.wait_timeout())
            .await
    }
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScopedKvStore for InMemoryKvStore {
    async fn get_value(
        &self,
        key: &str,
        scope: Scope,
        specifier: &str,
    ) -> KvResult<Option<String>> {
        debug!(key, scope = %scope, specifier, "get_value");
        if !scope.is_storable() {
            return Ok(None);
        }

        let scoped = ScopedKey::new(key, scope, specifier);
        let state = self.inner.state.read().await;
        Ok(state.entries.get(&scoped).cloned())
    }

    async fn set_value(
        &self,
        key: &str,
        value: &str,
        scope: Scope,
        specifier: &str,
        ttl_seconds: Option<u64>,
    ) -> KvResult<KvEvent> {
        let scoped = storable_key(key, scope, specifier)?;
        let (event, ()) = self
            .inner
            .write_with(scoped, ttl_seconds, |_| (value.to_string(), ()))
            .await;
        Ok(event)
    }

    async fn increment_value(
        &self,
        key: &str,
        scope: Scope,
        specifier: &str,
        ttl_seconds: Option<u64>,
    ) -> KvResult<i64> {
        let scoped = storable_key(key, scope, specifier)?;
        let (_, next) = self
            .inner
            .write_with(scoped, ttl_seconds, |current| {
                let next = current
                    .and_then(|v| v.trim().parse::<i64>().ok())
                    .unwrap_or(0)
                    .saturating_add(1);
                (next.to_string(), next)
            })
            .await;
        Ok(next)
    }

    async fn delete_key(&self, key: &str, scope: Scope, specifier: &str) -> KvResult<bool> {
        let scoped = storable_key(key, scope, specifier)?;
        Ok(self.inner.remove(scoped, None).await.unwrap_or(false))
    }

    async fn list_keys_in_scope(&self, scope: Scope, specifier: &str) -> KvResult<Vec<String>> {
        debug!(scope = %scope, specifier, "list_keys_in_scope");
        let state = self.inner.state.read().await;
        Ok(state
            .entries
            .keys()
            .filter(|scoped| scoped.in_scope(scope, specifier))
            .map(|scoped| scoped.key.clone())
            .collect())
    }

    async fn list_key_values_in_scope(
        &self,
        scope: Scope,
        specifier: &str,
    ) -> KvResult<ScopeEntries> {
        debug!(scope = %scope, specifier, "list_key_values_in_scope");
        let state = self.inner.state.read().await;
        Ok(state
            .entries
            .iter()
            .filter(|(scoped, _)| scoped.in_scope(scope, specifier))
            .map(|(scoped, value)| (scoped.key.clone(), value.clone()))
            .collect())
    }

    async fn list_key_values_in_all_scopes(&self) -> KvResult<AllScopesView> {
        debug!("list_key_values_in_all_scopes");
        let state = self.inner.state.read().await;

        let mut view = AllScopesView::new();
        for (scoped, value) in state.entries.iter().filter(|(k, _)| k.scope.is_storable()) {
            view.entry(scoped.group_label())
                .or_insert_with(|| ScopeGroup {
                    scope: scoped.scope,
                    specifier: scoped.specifier.clone(),
                    entries: ScopeEntries::new(),
                })
                .entries
                .insert(scoped.key.clone(), value.clone());
        }
        Ok(view)
    }

    fn add_filtered_listener(
        &self,
        scope: Scope,
        specifier: &str,
        filter: EventFilter,
        listener: Arc<dyn EventListener>,
    ) -> KvResult<SubscriptionId> {
        self.inner.registry.add(scope, specifier, filter, listener)
    }

    fn remove_listener(&self, subscription: SubscriptionId) -> bool {
        self.inner.registry.remove(subscription)
    }

    async fn metrics(&self) -> KvResult<StoreMetrics> {
        let now = now_millis();
        let state = self.inner.state.read().await;

        Ok(StoreMetrics {
            total_keys: state.entries.len(),
            keys_with_ttl: state.expirations.len(),
            expired_pending: state.expirations.values().filter(|at| **at <= now).count(),
            listeners: self.inner.registry.len(),
            sweeper_running: self.is_sweeper_running(),
        })
    }
}

impl Drop for InMemoryKvStore {
    fn drop(&mut self) {
        if self.sweeper.get_mut().take().is_some() {
            debug!("InMemoryKvStore dropped, stopping its sweeper");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scopekv_core::EventOperation;

    #[tokio::test]
    async fn test_basic_operations() {
        let store = InMemoryKvStore::new();

        // Empty store
        let keys = store.list_keys_in_scope(Scope::Instance, "local").await.unwrap();
        assert!(keys.is_empty());

        // Set and get
        store
            .set_value("test_key", "test_value", Scope::Instance, "local", None)
            .await
            .unwrap();
        let value = store.get_value("test_key", Scope::Instance, "local").await.unwrap();
        assert_eq!(value.as_deref(), Some("test_value"));

        // List
        let keys = store.list_keys_in_scope(Scope::Instance, "local").await.unwrap();
        assert_eq!(keys, vec!["test_key".to_string()]);

        // Delete
        assert!(store.delete_key("test_key", Scope::Instance, "local").await.unwrap());
        let value = store.get_value("test_key", Scope::Instance, "local").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_set_reports_added_then_edited() {
        let store = InMemoryKvStore::new();

        let first = store.set_value("k", "v1", Scope::Execution, "e1", None).await.unwrap();
        assert_eq!(first.operation, EventOperation::Added);
        assert_eq!(first.old_value, None);

        let second = store.set_value("k", "v2", Scope::Execution, "e1", None).await.unwrap();
        assert_eq!(second.operation, EventOperation::Edited);
        assert_eq!(second.old_value.as_deref(), Some("v1"));
        assert_eq!(second.value, "v2");
    }

    #[tokio::test]
    async fn test_ttl_sets_expiry_on_event() {
        let store = InMemoryKvStore::new();

        let before = now_millis();
        let event = store.set_value("k", "v", Scope::Instance, "", Some(60)).await.unwrap();
        let expires_at = event.expires_at.unwrap();
        assert!(expires_at >= before + 60_000);
        assert!(expires_at <= now_millis() + 60_000);

        let metrics = store.metrics().await.unwrap();
        assert_eq!(metrics.total_keys, 1);
        assert_eq!(metrics.keys_with_ttl, 1);
        assert_eq!(metrics.expired_pending, 0);
    }

    #[tokio::test]
    async fn test_increment_treats_garbage_as_zero() {
        let store = InMemoryKvStore::new();

        store.set_value("n", "not a number", Scope::Instance, "", None).await.unwrap();
        assert_eq!(store.increment_value("n", Scope::Instance, "", None).await.unwrap(), 1);

        store.set_value("m", "41", Scope::Instance, "", None).await.unwrap();
        assert_eq!(store.increment_value("m", Scope::Instance, "", None).await.unwrap(), 42);
        assert_eq!(
            store.get_value("m", Scope::Instance, "").await.unwrap().as_deref(),
            Some("42")
        );
    }

    #[tokio::test]
    async fn test_wildcard_scope_rejects_writes() {
        let store = InMemoryKvStore::new();

        let set = store.set_value("k", "v", Scope::All, "", None).await;
        assert_eq!(set.unwrap_err(), KvError::WildcardScope("k".to_string()));

        assert!(store.increment_value("k", Scope::All, "", None).await.is_err());
        assert!(store.delete_key("k", Scope::All, "").await.is_err());
        assert_eq!(store.get_value("k", Scope::All, "").await.unwrap(), None);
        assert!(store.list_keys_in_scope(Scope::All, "").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overwrite_keeps_insertion_position() {
        let store = InMemoryKvStore::new();

        for key in ["a", "b", "c"] {
            store.set_value(key, "1", Scope::Workflow, "3", None).await.unwrap();
        }
        store.set_value("a", "2", Scope::Workflow, "3", None).await.unwrap();
        store.delete_key("b", Scope::Workflow, "3").await.unwrap();
        store.set_value("b", "3", Scope::Workflow, "3", None).await.unwrap();

        let keys = store.list_keys_in_scope(Scope::Workflow, "3").await.unwrap();
        assert_eq!(keys, vec!["a".to_string(), "c".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_sweep_skips_keys_rewritten_with_later_ttl() {
        let store = InMemoryKvStore::new();

        store.set_value("k", "old", Scope::Instance, "", Some(0)).await.unwrap();
        let past = now_millis();
        store.set_value("k", "new", Scope::Instance, "", Some(60)).await.unwrap();

        // The expiry recorded at `past` was replaced by a later one
        assert_eq!(store.inner.sweep_expired_at(past).await, 0);
        assert_eq!(
            store.get_value("k", Scope::Instance, "").await.unwrap().as_deref(),
            Some("new")
        );
    }

    #[tokio::test]
    async fn test_start_sweeper_twice_fails() {
        let store = InMemoryKvStore::new();

        store.start_sweeper().unwrap();
        assert!(store.is_sweeper_running());
        assert_eq!(store.start_sweeper().unwrap_err(), KvError::SweeperAlreadyRunning);

        assert!(store.stop_sweeper().await);
        assert!(!store.is_sweeper_running());
        assert!(!store.stop_sweeper().await);

        // Can be restarted after stopping
        store.start_sweeper().unwrap();
        assert!(store.stop_sweeper().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancelled_write_is_not_applied_without_event() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::time::Duration;

        let store = Arc::new(InMemoryKvStore::new());
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let slow_started = Arc::new(AtomicBool::new(false));

        let sink = seen.clone();
        let started = slow_started.clone();
        store
            .add_listener(
                Scope::All,
                "",
                Arc::new(move |event: &KvEvent| {
                    sink.lock().push(event.key.clone());
                    if event.key == "slow" {
                        started.store(true, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(300));
                    }
                }),
            )
            .unwrap();

        let writer = store.clone();
        let slow = tokio::spawn(async move {
            writer.set_value("slow", "x", Scope::Instance, "", None).await.unwrap();
        });
        while !slow_started.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        // Gives up while the slow listener still holds up dispatch
        let fast = tokio::time::timeout(
            Duration::from_millis(50),
            store.set_value("fast", "y", Scope::Instance, "", None),
        )
        .await;
        assert!(fast.is_err());

        slow.await.unwrap();
        assert_eq!(store.get_value("fast", Scope::Instance, "").await.unwrap(), None);
        assert_eq!(*seen.lock(), vec!["slow".to_string()]);
    }

    #[tokio::test]
    async fn test_wait_for_event_uses_configured_timeout() {
        let store = Arc::new(InMemoryKvStore::with_config(KvStoreConfig {
            wait_timeout_secs: 5,
            ..KvStoreConfig::default()
        }));

        let waiter = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .wait_for_event(Scope::Execution, "", EventFilter::Any)
                    .await
            })
        };
        while store.metrics().await.unwrap().listeners == 0 {
            tokio::task::yield_now().await;
        }

        store.set_value("k", "v", Scope::Execution, "e1", None).await.unwrap();

        let event = waiter.await.unwrap().unwrap();
        assert_eq!(event.key, "k");
        assert_eq!(event.operation, EventOperation::Added);
        assert_eq!(store.metrics().await.unwrap().listeners, 0);
    }

    #[tokio::test]
    async fn test_wait_for_event_times_out_after_configured_deadline() {
        let store = InMemoryKvStore::with_config(KvStoreConfig {
            wait_timeout_secs: 0,
            ..KvStoreConfig::default()
        });

        let result = store.wait_for_event(Scope::Instance, "", EventFilter::Any).await;
        assert!(matches!(result, Err(KvError::Timeout(_))));
    }
}
