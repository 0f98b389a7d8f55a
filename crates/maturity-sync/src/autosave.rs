use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use maturity_core::Assessment;
use maturity_storage::BoxFuture;

use crate::error::SyncError;

/// Default quiet period between the last mutation and the save.
pub const DEFAULT_AUTOSAVE_DELAY: Duration = Duration::from_secs(2);

/// Save indicator shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    Saving,
    Saved,
    Error(String),
}

/// Messages to the debounce worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    /// Arm or re-arm the timer.
    Mutation,
    /// Disarm the timer without saving.
    Cancel,
}

/// Whatever performs the actual save.
pub trait Saver: Send + Sync {
    fn save(&self) -> BoxFuture<'_, Result<(), SyncError>>;
}

/// Debounces mutations into single saves.
///
/// [`Self::on_mutation`] (re)arms a one-shot timer; the save runs once the
/// timer expires without another mutation. [`Self::save_now`] and
/// [`Self::cancel`] disarm the timer. A save already running is never
/// interrupted.
pub struct AutoSaveController {
    delay: Duration,
    status: watch::Sender<SaveStatus>,
    trigger: Mutex<Option<mpsc::UnboundedSender<Signal>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AutoSaveController {
    pub fn new(delay: Duration) -> Self {
        let (status, _) = watch::channel(SaveStatus::Idle);
        Self {
            delay,
            status,
            trigger: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    pub fn status(&self) -> SaveStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.status.subscribe()
    }

    /// Spawn the debounce worker. Must run inside a Tokio runtime.
    pub fn start(&self, saver: Arc<dyn Saver>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_worker(self.delay, rx, saver, self.status.clone()));
        *lock(&self.trigger) = Some(tx);
        if let Some(previous) = lock(&self.worker).replace(handle) {
            previous.abort();
        }
    }

    /// Stop accepting mutations. A pending save is flushed before the
    /// worker exits; await the returned handle to wait for it.
    pub fn stop(&self) -> Option<JoinHandle<()>> {
        lock(&self.trigger).take();
        lock(&self.worker).take()
    }

    /// Note a mutation of `current`. Returns whether a save was scheduled;
    /// an assessment without a name is never saved.
    pub fn on_mutation(&self, current: &Assessment) -> bool {
        if !current.has_identity() {
            debug!("autosave skipped: assessment has no name");
            return false;
        }
        let guard = lock(&self.trigger);
        let Some(tx) = guard.as_ref() else {
            warn!("autosave not started, mutation ignored");
            return false;
        };
        self.status.send_if_modified(|status| {
            if matches!(status, SaveStatus::Error(_)) {
                *status = SaveStatus::Idle;
                true
            } else {
                false
            }
        });
        tx.send(Signal::Mutation).is_ok()
    }

    /// Drop a pending debounced save, if any.
    pub fn cancel(&self) {
        if let Some(tx) = lock(&self.trigger).as_ref() {
            let _ = tx.send(Signal::Cancel);
        }
    }

    /// Save immediately, reporting through the same status channel. A
    /// pending debounced save is dropped since this save covers it.
    pub async fn save_now(&self, saver: &dyn Saver) -> Result<(), SyncError> {
        self.cancel();
        run_save(saver, &self.status).await
    }
}

impl Drop for AutoSaveController {
    fn drop(&mut self) {
        lock(&self.trigger).take();
    }
}

async fn run_worker(
    delay: Duration,
    mut rx: mpsc::UnboundedReceiver<Signal>,
    saver: Arc<dyn Saver>,
    status: watch::Sender<SaveStatus>,
) {
    while let Some(signal) = rx.recv().await {
        if signal == Signal::Cancel {
            continue;
        }
        let mut closed = false;
        let mut cancelled = false;
        loop {
            tokio::select! {
                _ = tokio::time::sleep(delay) => break,
                next = rx.recv() => match next {
                    Some(Signal::Mutation) => {}
                    Some(Signal::Cancel) => {
                        cancelled = true;
                        break;
                    }
                    None => {
                        closed = true;
                        break;
                    }
                },
            }
        }

        if cancelled {
            debug!("pending autosave cancelled");
            continue;
        }
        // Errors are surfaced through the status channel.
        let _ = run_save(saver.as_ref(), &status).await;
        if closed {
            break;
        }
    }
    debug!("autosave worker stopped");
}

async fn run_save(saver: &dyn Saver, status: &watch::Sender<SaveStatus>) -> Result<(), SyncError> {
    status.send_replace(SaveStatus::Saving);
    match saver.save().await {
        Ok(()) => {
            status.send_replace(SaveStatus::Saved);
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "save failed");
            status.send_replace(SaveStatus::Error(e.to_string()));
            Err(e)
        }
    }
}
