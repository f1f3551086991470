//! Waiting for a single change event
//!
//! Hosts that run a subscription manually (rather than listening
//! indefinitely) register a listener, take the first matching event, and
//! unregister again, giving up after a deadline.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

use scopekv_core::{
    EventFilter, KvError, KvEvent, KvResult, Scope, ScopedKvStore, SubscriptionId,
};

/// Removes a temporary listener when dropped, including on cancellation
struct Registration<'a, S: ScopedKvStore + ?Sized> {
    store: &'a S,
    subscription: SubscriptionId,
}

impl<S: ScopedKvStore + ?Sized> Drop for Registration<'_, S> {
    fn drop(&mut self) {
        if self.store.remove_listener(self.subscription) {
            debug!(subscription = %self.subscription, "Stopped waiting for event");
        }
    }
}

/// Wait for the next event in `(scope, specifier)` accepted by `filter`
///
/// The temporary listener is removed before returning, whether an event
/// arrived or the wait timed out, and also when the returned future is
/// dropped before completing.
pub async fn wait_for_event<S>(
    store: &S,
    scope: Scope,
    specifier: &str,
    filter: EventFilter,
    timeout: Duration,
) -> KvResult<KvEvent>
where
    S: ScopedKvStore + ?Sized,
{
    let (tx, rx) = oneshot::channel::<KvEvent>();
    let sender = Arc::new(Mutex::new(Some(tx)));

    let subscription = store.add_filtered_listener(
        scope,
        specifier,
        filter,
        Arc::new(move |event: &KvEvent| {
            if let Some(tx) = sender.lock().take() {
                let _ = tx.send(event.clone());
            }
        }),
    )?;
    let registration = Registration {
        store,
        subscription,
    };
    debug!(subscription = %subscription, scope = %scope, specifier, "Waiting for event");

    let outcome = tokio::time::timeout(timeout, rx).await;
    drop(registration);

    match outcome {
        Ok(Ok(event)) => Ok(event),
        Ok(Err(_)) => Err(KvError::Other(
            "Event listener was dropped before an event arrived".to_string(),
        )),
        Err(_) => Err(KvError::Timeout(format!(
            "no event received within {}ms",
            timeout.as_millis()
        ))),
    }
}
