//! Background eviction of expired keys

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info};

use scopekv_core::{now_millis, KvError, KvResult};

use crate::store::StoreInner;

/// Handle to the periodic sweeper task
///
/// Each tick evicts every key whose expiry has passed, through the same path
/// as an explicit delete, so listeners see a normal `deleted` event. The task
/// ends when [`ExpirationSweeper::stop`] is called, when the handle is
/// dropped, or when the store it sweeps is dropped.
pub struct ExpirationSweeper {
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
    running: Arc<AtomicBool>,
}

impl ExpirationSweeper {
    /// Spawn the sweeper on the current tokio runtime
    pub(crate) fn spawn(store: Weak<StoreInner>, period: Duration) -> KvResult<Self> {
        let runtime = Handle::try_current().map_err(|e| {
            KvError::Configuration(format!("Expiration sweeper needs a tokio runtime: {}", e))
        })?;

        let (shutdown, mut shutdown_rx) = oneshot::channel::<()>();
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();

        let handle = runtime.spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(period_ms = period.as_millis() as u64, "Expiration sweeper started");

            loop {
                tokio::select! {
                    // Fires on explicit stop and when the handle is dropped
                    _ = &mut shutdown_rx => {
                        debug!("Expiration sweeper stop requested");
                        break;
                    }
                    _ = interval.tick() => {
                        let Some(inner) = store.upgrade() else {
                            debug!("Store dropped, expiration sweeper exiting");
                            break;
                        };
                        let evicted = inner.sweep_expired_at(now_millis()).await;
                        if evicted > 0 {
                            info!(evicted, "Expiration sweep evicted keys");
                        }
                    }
                }
            }

            flag.store(false, Ordering::SeqCst);
            info!("Expiration sweeper stopped");
        });

        Ok(Self {
            shutdown: Some(shutdown),
            handle,
            running,
        })
    }

    /// Whether the sweeper task is still looping
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.handle.is_finished()
    }

    /// Ask the task to stop and wait until it has finished
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            // The task may already have exited on its own
            let _ = shutdown.send(());
        }
        if let Err(e) = (&mut self.handle).await {
            error!("Expiration sweeper task failed: {}", e);
        }
    }
}
