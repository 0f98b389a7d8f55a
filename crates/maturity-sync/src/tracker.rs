use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use maturity_core::AssessmentKey;

/// Default window after the last edit during which the user counts as editing.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Folder poll intervals.
///
/// Polling is slower while the user is editing (fewer chances to clash with
/// in-flight input) and faster while idle (fresher data from other devices).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub editing: Duration,
    pub idle: Duration,
}

impl Default for Cadence {
    fn default() -> Self {
        Self {
            editing: Duration::from_secs(30),
            idle: Duration::from_secs(10),
        }
    }
}

/// Tracks which assessments the user is actively editing.
///
/// Every edit reopens that key's window of `idle_timeout`; once it lapses
/// without a further edit the key is idle again. Windows of different keys
/// run independently.
#[derive(Debug)]
pub struct ActiveEditTracker {
    idle_timeout: Duration,
    cadence: Cadence,
    windows: Mutex<HashMap<AssessmentKey, Instant>>,
}

impl Default for ActiveEditTracker {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TIMEOUT, Cadence::default())
    }
}

impl ActiveEditTracker {
    pub fn new(idle_timeout: Duration, cadence: Cadence) -> Self {
        Self {
            idle_timeout,
            cadence,
            windows: Mutex::new(HashMap::new()),
        }
    }

    fn windows(&self) -> MutexGuard<'_, HashMap<AssessmentKey, Instant>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record an edit on `key`, restarting its idle timeout.
    pub fn mark_editing(&self, key: AssessmentKey) {
        let now = Instant::now();
        let mut windows = self.windows();
        windows.retain(|_, until| now < *until);
        windows.insert(key, now + self.idle_timeout);
    }

    /// End every edit window immediately.
    pub fn clear(&self) {
        self.windows().clear();
    }

    /// Whether any assessment is under active edit.
    pub fn is_active(&self) -> bool {
        let now = Instant::now();
        self.windows().values().any(|until| now < *until)
    }

    pub fn is_editing(&self, name: &str, interview_name: Option<&str>) -> bool {
        self.is_editing_key(&AssessmentKey::new(name, interview_name))
    }

    pub fn is_editing_key(&self, key: &AssessmentKey) -> bool {
        self.windows()
            .get(key)
            .is_some_and(|until| Instant::now() < *until)
    }

    /// Interval until the next folder import.
    pub fn poll_interval(&self) -> Duration {
        if self.is_active() {
            self.cadence.editing
        } else {
            self.cadence.idle
        }
    }

    pub fn cadence(&self) -> Cadence {
        self.cadence
    }
}
