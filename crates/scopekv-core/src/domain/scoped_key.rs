//! Scope-qualified keys
//!
//! Keys are held as structured values inside the store. The flat string form
//! `scope:<SCOPE>-<specifier>:<key>` only exists at the boundary, for
//! introspection output and for callers that still exchange encoded keys.

use std::fmt;
use std::str::FromStr;

use crate::types::Scope;
use crate::{KvError, KvResult};

/// Prefix shared by every encoded key
pub const SCOPED_KEY_PREFIX: &str = "scope:";

/// Key reported by [`ScopedKey::decode_key_lossy`] when the input cannot be parsed
pub const UNPARSEABLE_KEY: &str = "EMPTY";

/// A key qualified by the scope and specifier it lives in
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopedKey {
    /// Scope the key belongs to
    pub scope: Scope,
    /// Concrete identifier inside the scope (execution id, workflow id, ...)
    pub specifier: String,
    /// The caller-visible key
    pub key: String,
}

impl ScopedKey {
    /// Compose a scoped key from its parts
    pub fn new(key: impl Into<String>, scope: Scope, specifier: impl Into<String>) -> Self {
        Self {
            scope,
            specifier: specifier.into(),
            key: key.into(),
        }
    }

    /// Whether this key lives exactly in `(scope, specifier)`
    pub fn in_scope(&self, scope: Scope, specifier: &str) -> bool {
        self.scope == scope && self.specifier == specifier
    }

    /// Label used to group keys in the all-scopes view, e.g. `WORKFLOW-7`
    pub fn group_label(&self) -> String {
        format!("{}-{}", self.scope, self.specifier)
    }

    /// Encode into the flat string form
    ///
    /// `ALL` has no specifier segment: `scope:ALL:<key>`. Every other scope
    /// encodes as `scope:<SCOPE>-<specifier>:<key>`.
    pub fn encode(&self) -> String {
        match self.scope {
            Scope::All => format!("{}{}:{}", SCOPED_KEY_PREFIX, self.scope, self.key),
            Scope::Execution | Scope::Workflow | Scope::Instance => format!(
                "{}{}-{}:{}",
                SCOPED_KEY_PREFIX, self.scope, self.specifier, self.key
            ),
        }
    }

    /// Parse the flat string form
    ///
    /// The scope runs up to the first `-`, the specifier up to the last `:`,
    /// and the key is whatever follows that colon. A key containing `:` is
    /// therefore split inside the key; such keys do not round-trip.
    pub fn decode(encoded: &str) -> KvResult<Self> {
        let malformed = || KvError::MalformedScopedKey(encoded.to_string());

        let rest = encoded.strip_prefix(SCOPED_KEY_PREFIX).ok_or_else(malformed)?;

        if let Some(key) = rest.strip_prefix("ALL:") {
            return Ok(Self::new(key, Scope::All, ""));
        }

        let (scope_name, qualified) = rest.split_once('-').ok_or_else(malformed)?;
        if scope_name.is_empty()
            || !scope_name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(malformed());
        }
        let scope = scope_name.parse::<Scope>()?;
        if scope == Scope::All {
            return Err(malformed());
        }

        let (specifier, key) = qualified.rsplit_once(':').ok_or_else(malformed)?;
        Ok(Self::new(key, scope, specifier))
    }

    /// Extract only the key, degrading to [`UNPARSEABLE_KEY`] on malformed input
    pub fn decode_key_lossy(encoded: &str) -> String {
        Self::decode(encoded)
            .map(|scoped| scoped.key)
            .unwrap_or_else(|_| UNPARSEABLE_KEY.to_string())
    }
}

impl fmt::Display for ScopedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for ScopedKey {
    type Err = KvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}
