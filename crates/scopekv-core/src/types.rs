use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::KvError;

/// Namespace dimension for keys
///
/// `All` is a query wildcard: listeners registered for it receive every
/// event, but no key is ever stored under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Scope {
    /// Every scope (listen/query only)
    All,
    /// Keys belonging to a single execution
    Execution,
    /// Keys belonging to a workflow, specifier is the numeric workflow id
    Workflow,
    /// Keys shared by the whole instance
    Instance,
}

impl Scope {
    /// Every scope in declaration order
    pub const VARIANTS: [Scope; 4] = [Scope::All, Scope::Execution, Scope::Workflow, Scope::Instance];

    /// The upper-case wire name of the scope
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::All => "ALL",
            Scope::Execution => "EXECUTION",
            Scope::Workflow => "WORKFLOW",
            Scope::Instance => "INSTANCE",
        }
    }

    /// Whether keys can be stored under this scope
    pub fn is_storable(&self) -> bool {
        !matches!(self, Scope::All)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = KvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ALL" => Ok(Scope::All),
            "EXECUTION" => Ok(Scope::Execution),
            "WORKFLOW" => Ok(Scope::Workflow),
            "INSTANCE" => Ok(Scope::Instance),
            other => Err(KvError::UnknownScope(other.to_string())),
        }
    }
}

/// Kind of mutation carried by an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOperation {
    /// Key did not exist before the write
    Added,
    /// Key existed and its value was overwritten
    Edited,
    /// Key was deleted, explicitly or by expiry
    Deleted,
}

impl EventOperation {
    /// The lower-case wire name of the operation
    pub fn as_str(&self) -> &'static str {
        match self {
            EventOperation::Added => "added",
            EventOperation::Edited => "edited",
            EventOperation::Deleted => "deleted",
        }
    }
}

impl fmt::Display for EventOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventOperation {
    type Err = KvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "added" => Ok(EventOperation::Added),
            // Trigger configurations call this "updated"
            "edited" | "updated" => Ok(EventOperation::Edited),
            "deleted" => Ok(EventOperation::Deleted),
            other => Err(KvError::Other(format!("Unknown event operation: {}", other))),
        }
    }
}

/// Milliseconds since the Unix epoch, the clock used for timestamps and expiry
#[inline]
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
