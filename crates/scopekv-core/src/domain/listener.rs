//! Listener registration types

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::events::KvEvent;
use crate::types::Scope;
use crate::{KvError, KvResult};

/// Receives change events from the store
///
/// Listeners run synchronously on the writer's task, in registration order.
/// Any `Fn(&KvEvent) + Send + Sync` closure is a listener.
pub trait EventListener: Send + Sync {
    /// Handle one event
    fn on_event(&self, event: &KvEvent);
}

impl<F> EventListener for F
where
    F: Fn(&KvEvent) + Send + Sync,
{
    fn on_event(&self, event: &KvEvent) {
        self(event)
    }
}

/// Handle returned when a listener is registered, used to unregister it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub Uuid);

impl SubscriptionId {
    /// Generate a fresh subscription id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a listener is attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerTarget {
    /// Receives every event
    All,
    /// Receives events of the EXECUTION scope
    Execution,
    /// Receives events of the INSTANCE scope
    Instance,
    /// Receives WORKFLOW events whose specifier is one of these ids
    Workflow(Vec<u64>),
}

impl ListenerTarget {
    /// Resolve the target for a scope and its raw specifier
    ///
    /// Only WORKFLOW looks at the specifier, which is a comma-separated list of
    /// numeric workflow ids such as `"41, 42,43"`.
    pub fn resolve(scope: Scope, specifier: &str) -> KvResult<Self> {
        match scope {
            Scope::All => Ok(ListenerTarget::All),
            Scope::Execution => Ok(ListenerTarget::Execution),
            Scope::Instance => Ok(ListenerTarget::Instance),
            Scope::Workflow => parse_workflow_ids(specifier).map(ListenerTarget::Workflow),
        }
    }
}

/// Parse a comma-separated list of workflow ids
///
/// Whitespace around ids is trimmed and empty pieces are skipped.
pub fn parse_workflow_ids(specifier: &str) -> KvResult<Vec<u64>> {
    specifier
        .split(',')
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(|piece| {
            piece
                .parse::<u64>()
                .map_err(|_| KvError::InvalidWorkflowId(piece.to_string()))
        })
        .collect()
}
