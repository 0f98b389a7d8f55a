use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use maturity_storage::BoxFuture;

use crate::tracker::ActiveEditTracker;

/// One scheduled pass. Returns `false` to stop the schedule.
pub type Tick = Arc<dyn Fn() -> BoxFuture<'static, bool> + Send + Sync>;

/// Runs folder imports on the tracker's adaptive cadence.
///
/// The interval is re-read before every sleep, so the cadence follows the
/// edit state. Stopping only takes effect between passes.
#[derive(Default)]
pub struct SyncScheduler {
    stop: Mutex<Option<watch::Sender<bool>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SyncScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the periodic task, replacing any running one.
    pub fn start(&self, tracker: Arc<ActiveEditTracker>, tick: Tick) {
        self.stop();
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            loop {
                let interval = tracker.poll_interval();
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = stop_rx.changed() => break,
                }
                if *stop_rx.borrow() {
                    break;
                }
                if !tick().await {
                    debug!("sync schedule ended by pass");
                    break;
                }
            }
            debug!("sync scheduler stopped");
        });
        *lock(&self.stop) = Some(stop_tx);
        *lock(&self.task) = Some(handle);
        info!("sync scheduler started");
    }

    /// Signal the task to stop. A pass already running completes.
    pub fn stop(&self) -> Option<JoinHandle<()>> {
        if let Some(stop) = lock(&self.stop).take() {
            let _ = stop.send(true);
        }
        lock(&self.task).take()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.task).as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        if let Some(stop) = lock(&self.stop).take() {
            let _ = stop.send(true);
        }
    }
}
