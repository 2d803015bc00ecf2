use std::sync::Arc;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};
use tracing::{error, info, warn};

use crate::config::ShoppingListConfig;
use crate::refresh::RefreshService;

/// Read side of the worker's stop flag.
#[derive(Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once stop has been requested or the sender is gone.
    pub async fn stopped(&self) {
        let mut rx = self.rx.clone();
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

pub fn stop_channel() -> (watch::Sender<bool>, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (tx, StopSignal { rx })
}

/// Background task refreshing every shopping list on a timer or on demand.
pub struct RefreshWorker {
    stop: watch::Sender<bool>,
    trigger: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl RefreshWorker {
    pub fn spawn(
        service: Arc<RefreshService>,
        lists: Vec<ShoppingListConfig>,
        interval: Duration,
    ) -> Self {
        let (stop, signal) = stop_channel();
        let trigger = Arc::new(Notify::new());
        let notify = trigger.clone();

        let handle = tokio::spawn(async move {
            loop {
                info!("Refresh cycle: {} lists", lists.len());
                for list in &lists {
                    if signal.is_stopped() {
                        break;
                    }
                    let summary = service.refresh_list(list, &signal).await;
                    if summary.cancelled {
                        break;
                    }
                    match service.compare_list(list).await {
                        Ok(basket) => info!(
                            "Basket '{}': {}",
                            list.name,
                            serde_json::to_string(&basket).unwrap_or_default()
                        ),
                        Err(e) => warn!("Basket comparison for '{}' failed: {}", list.name, e),
                    }
                }

                info!(
                    "Waiting for timer ({}s) or manual refresh...",
                    interval.as_secs()
                );
                tokio::select! {
                    _ = sleep(interval) => {
                        info!("Timer triggered.");
                    }
                    _ = notify.notified() => {
                        info!("Manual refresh triggered.");
                    }
                    _ = signal.stopped() => {
                        break;
                    }
                }
            }
            info!("Refresh worker stopped");
        });

        Self {
            stop,
            trigger,
            handle,
        }
    }

    /// Starts a cycle now instead of waiting for the timer.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    /// Cancels in-flight searches and waits for the task to finish.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.handle.await {
            error!("Refresh worker ended abnormally: {}", e);
        }
    }
}
