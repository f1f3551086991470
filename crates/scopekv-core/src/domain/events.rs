use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::domain::scoped_key::ScopedKey;
use crate::types::{now_millis, EventOperation, Scope};

/// Change notification produced once per mutating store operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KvEvent {
    /// What happened to the key
    pub operation: EventOperation,
    /// Scope of the affected key
    pub scope: Scope,
    /// Specifier of the affected key
    pub specifier: String,
    /// The affected key, without scope qualification
    pub key: String,
    /// Value after the write, or the removed value for deletions
    pub value: String,
    /// Previous value, only present for edits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<String>,
    /// Epoch milliseconds at which the event was produced
    pub timestamp: i64,
    /// Epoch milliseconds at which the key expires, when written with a TTL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl KvEvent {
    /// Event for a write, `added` when there was no previous value and `edited` otherwise
    pub fn written(
        scoped_key: &ScopedKey,
        value: impl Into<String>,
        old_value: Option<String>,
        expires_at: Option<i64>,
    ) -> Self {
        let operation = if old_value.is_some() {
            EventOperation::Edited
        } else {
            EventOperation::Added
        };

        Self {
            operation,
            scope: scoped_key.scope,
            specifier: scoped_key.specifier.clone(),
            key: scoped_key.key.clone(),
            value: value.into(),
            old_value,
            timestamp: now_millis(),
            expires_at,
        }
    }

    /// Event for a delete attempt; `removed_value` is empty when nothing was removed
    pub fn deleted(scoped_key: &ScopedKey, removed_value: Option<String>) -> Self {
        Self {
            operation: EventOperation::Deleted,
            scope: scoped_key.scope,
            specifier: scoped_key.specifier.clone(),
            key: scoped_key.key.clone(),
            value: removed_value.unwrap_or_default(),
            old_value: None,
            timestamp: now_millis(),
            expires_at: None,
        }
    }
}

/// Selects which event operations a listener wants to receive
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EventFilter {
    /// Every operation
    #[default]
    Any,
    /// Only the listed operations
    Only(HashSet<EventOperation>),
}

impl EventFilter {
    /// Filter accepting only the given operations
    ///
    /// An empty list is treated as [`EventFilter::Any`].
    pub fn only(operations: impl IntoIterator<Item = EventOperation>) -> Self {
        let set: HashSet<EventOperation> = operations.into_iter().collect();
        if set.is_empty() {
            EventFilter::Any
        } else {
            EventFilter::Only(set)
        }
    }

    /// Whether an event with the given operation passes this filter
    pub fn accepts(&self, operation: EventOperation) -> bool {
        match self {
            EventFilter::Any => true,
            EventFilter::Only(set) => set.contains(&operation),
        }
    }
}
