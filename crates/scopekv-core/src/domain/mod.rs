/// Scope-qualified key codec
pub mod scoped_key;

/// Change events and event filters
pub mod events;

/// Listener trait and subscription handles
pub mod listener;

/// Store interface and listing views
pub mod store;
