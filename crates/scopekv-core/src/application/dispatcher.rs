//! Listener registry and event dispatch
//!
//! Listeners are kept per scope: one list for ALL, one for INSTANCE, one for
//! EXECUTION, and one list per numeric workflow id for WORKFLOW. Dispatch
//! delivers to the ALL list first and then to the list matching the event's
//! scope, each in registration order.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::domain::events::{EventFilter, KvEvent};
use crate::domain::listener::{EventListener, ListenerTarget, SubscriptionId};
use crate::types::Scope;
use crate::KvResult;

#[derive(Clone)]
struct Registration {
    id: SubscriptionId,
    filter: EventFilter,
    listener: Arc<dyn EventListener>,
}

#[derive(Default)]
struct Listeners {
    all: Vec<Registration>,
    instance: Vec<Registration>,
    execution: Vec<Registration>,
    workflow: HashMap<u64, Vec<Registration>>,
}

/// Registry of listeners with synchronous fan-out
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<Listeners>,
}

impl ListenerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for `scope`
    ///
    /// For WORKFLOW the specifier is a comma-separated list of workflow ids and
    /// the listener is appended to each id's list. The same listener may be
    /// registered any number of times; each registration gets its own id.
    pub fn add(
        &self,
        scope: Scope,
        specifier: &str,
        filter: EventFilter,
        listener: Arc<dyn EventListener>,
    ) -> KvResult<SubscriptionId> {
        let target = ListenerTarget::resolve(scope, specifier)?;
        let registration = Registration {
            id: SubscriptionId::new(),
            filter,
            listener,
        };
        let id = registration.id;

        let mut listeners = self.listeners.write();
        match target {
            ListenerTarget::All => listeners.all.push(registration),
            ListenerTarget::Instance => listeners.instance.push(registration),
            ListenerTarget::Execution => listeners.execution.push(registration),
            ListenerTarget::Workflow(ids) => {
                if ids.is_empty() {
                    warn!(
                        subscription = %id,
                        "Workflow listener registered without any workflow id; it will never fire"
                    );
                }
                for workflow_id in ids {
                    listeners
                        .workflow
                        .entry(workflow_id)
                        .or_default()
                        .push(registration.clone());
                }
            }
        }

        debug!(subscription = %id, scope = %scope, specifier, "Listener added");
        Ok(id)
    }

    /// Remove every list entry belonging to `subscription`
    ///
    /// Returns `false` when the subscription was unknown or already removed.
    pub fn remove(&self, subscription: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let mut removed = false;

        let mut retain = |list: &mut Vec<Registration>| {
            let before = list.len();
            list.retain(|r| r.id != subscription);
            removed |= list.len() != before;
        };

        retain(&mut listeners.all);
        retain(&mut listeners.instance);
        retain(&mut listeners.execution);
        for list in listeners.workflow.values_mut() {
            retain(list);
        }
        listeners.workflow.retain(|_, list| !list.is_empty());

        debug!(subscription = %subscription, removed, "Listener removal requested");
        removed
    }

    /// Number of distinct registrations
    pub fn len(&self) -> usize {
        let listeners = self.listeners.read();
        let workflow: HashSet<SubscriptionId> = listeners
            .workflow
            .values()
            .flatten()
            .map(|r| r.id)
            .collect();
        listeners.all.len() + listeners.instance.len() + listeners.execution.len() + workflow.len()
    }

    /// Whether no listener is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Capture the listeners that should see `event`, without invoking them
    ///
    /// The store calls this while it still holds its own lock, so the set of
    /// recipients is fixed at mutation time, then delivers after releasing it.
    pub fn prepare(&self, event: KvEvent) -> Delivery {
        let listeners = self.listeners.read();
        let mut recipients: Vec<Arc<dyn EventListener>> = Vec::new();

        let mut collect = |list: &[Registration]| {
            recipients.extend(
                list.iter()
                    .filter(|r| r.filter.accepts(event.operation))
                    .map(|r| r.listener.clone()),
            );
        };

        collect(&listeners.all);
        match event.scope {
            Scope::Instance => collect(&listeners.instance),
            Scope::Execution => collect(&listeners.execution),
            Scope::Workflow => {
                if let Some(list) = workflow_id_of(&event.specifier)
                    .and_then(|workflow_id| listeners.workflow.get(&workflow_id))
                {
                    collect(list);
                }
            }
            Scope::All => {}
        }

        drop(listeners);
        Delivery { event, recipients }
    }

    /// Prepare and immediately deliver `event`, returning the number of listeners invoked
    pub fn dispatch(&self, event: &KvEvent) -> usize {
        self.prepare(event.clone()).deliver()
    }
}

/// An event together with the listeners it will be delivered to
pub struct Delivery {
    event: KvEvent,
    recipients: Vec<Arc<dyn EventListener>>,
}

impl Delivery {
    /// The event being delivered
    pub fn event(&self) -> &KvEvent {
        &self.event
    }

    /// Number of listeners that will receive the event
    pub fn recipient_count(&self) -> usize {
        self.recipients.len()
    }

    /// Invoke each listener in order
    ///
    /// A panicking listener is logged and skipped; the remaining listeners
    /// still receive the event.
    pub fn deliver(self) -> usize {
        let mut delivered = 0;
        for listener in &self.recipients {
            let outcome = catch_unwind(AssertUnwindSafe(|| listener.on_event(&self.event)));
            match outcome {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    let reason = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!(
                        operation = %self.event.operation,
                        scope = %self.event.scope,
                        specifier = %self.event.specifier,
                        key = %self.event.key,
                        "Listener panicked during dispatch: {}",
                        reason
                    );
                }
            }
        }
        delivered
    }
}

/// Workflow id whose decimal form is exactly `specifier`
fn workflow_id_of(specifier: &str) -> Option<u64> {
    specifier
        .parse::<u64>()
        .ok()
        .filter(|id| id.to_string() == specifier)
}
