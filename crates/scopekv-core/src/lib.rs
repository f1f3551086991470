//!
//! ScopeKV Core - domain model for the scoped key-value store
//!
//! This crate defines scopes, the scoped key codec, change events, the
//! listener registry that fans those events out, and the `ScopedKvStore`
//! interface implemented by concrete stores.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - keys, events, listeners and the store interface
pub mod domain;

/// Application services - dispatch and store construction
pub mod application;

/// Core types
pub mod types;

/// Error types
pub mod error;

// Re-export key types
pub use application::dispatcher::{Delivery, ListenerRegistry};
pub use application::store_factory::{create_store_factory, MEMORY_SCHEME};
pub use domain::events::{EventFilter, KvEvent};
pub use domain::listener::{parse_workflow_ids, EventListener, ListenerTarget, SubscriptionId};
pub use domain::scoped_key::{ScopedKey, UNPARSEABLE_KEY};
pub use domain::store::{AllScopesView, ScopeEntries, ScopeGroup, ScopedKvStore, StoreMetrics};
pub use error::{KvError, KvResult};
pub use types::{now_millis, EventOperation, Scope};
