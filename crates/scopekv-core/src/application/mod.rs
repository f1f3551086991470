/// Listener registry and event dispatch
pub mod dispatcher;

/// Factory for creating stores from a URL
pub mod store_factory;
