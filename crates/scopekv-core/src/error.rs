use thiserror::Error;

/// Core error type for the ScopeKV store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KvError {
    /// A scoped key string did not follow the `scope:<SCOPE>-<specifier>:<key>` layout
    #[error("Malformed scoped key: {0}")]
    MalformedScopedKey(String),

    /// A scope name that is not one of ALL, EXECUTION, WORKFLOW, INSTANCE
    #[error("Unknown scope: {0}")]
    UnknownScope(String),

    /// A mutation was addressed to the ALL scope, which is query-only
    #[error("Scope ALL is a query wildcard and cannot hold keys (key: {0})")]
    WildcardScope(String),

    /// A workflow specifier contained a non-numeric identifier
    #[error("Invalid workflow id: {0}")]
    InvalidWorkflowId(String),

    /// The expiration sweeper was started while already running
    #[error("Expiration sweeper is already running")]
    SweeperAlreadyRunning,

    /// Waiting for an event exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Convenience result alias used across the store
pub type KvResult<T> = Result<T, KvError>;

impl From<serde_json::Error> for KvError {
    fn from(err: serde_json::Error) -> Self {
        KvError::Other(format!("Serialization error: {}", err))
    }
}

impl From<String> for KvError {
    fn from(err: String) -> Self {
        KvError::Other(err)
    }
}

impl From<&str> for KvError {
    fn from(err: &str) -> Self {
        KvError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let errors = vec![
            (KvError::MalformedScopedKey("abc".to_string()), "Malformed scoped key: abc"),
            (KvError::UnknownScope("GLOBAL".to_string()), "Unknown scope: GLOBAL"),
            (
                KvError::WildcardScope("counter".to_string()),
                "Scope ALL is a query wildcard and cannot hold keys (key: counter)",
            ),
            (KvError::InvalidWorkflowId("x1".to_string()), "Invalid workflow id: x1"),
            (KvError::SweeperAlreadyRunning, "Expiration sweeper is already running"),
            (KvError::Timeout("30s".to_string()), "Timed out: 30s"),
            (KvError::Configuration("bad".to_string()), "Configuration error: bad"),
            (KvError::Other("other_err".to_string()), "other_err"),
        ];

        for (error, expected_msg) in errors {
            assert_eq!(error.to_string(), expected_msg);
        }
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_error = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let error: KvError = json_error.into();

        match error {
            KvError::Other(msg) => {
                assert!(msg.starts_with("Serialization error"));
            }
            _ => panic!("Expected Other variant"),
        }
    }

    #[test]
    fn test_from_str_and_string() {
        let from_str: KvError = "boom".into();
        let from_string: KvError = "boom".to_string().into();
        assert_eq!(from_str, from_string);
        assert_eq!(from_str, KvError::Other("boom".to_string()));
    }
}
