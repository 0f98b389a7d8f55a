//! maturity-sync
//!
//! Keeps the in-memory assessment collection, the local persistent store and
//! an external sync folder in agreement.
//!
//! Public API:
//! - [`AssessmentController`]: the application-facing surface (start an
//!   interview, record answers, score, save, pick a folder, sync)
//! - [`FolderSyncEngine`]: `export_all()` / `import_all()` against a folder
//! - [`AssessmentRepository`]: composite-key lookup and the merge policy
//! - [`AutoSaveController`]: debounced saves with a status channel
//! - [`ActiveEditTracker`]: edit window and adaptive poll cadence
//! - [`SyncScheduler`]: the periodic import task

pub mod autosave;
pub mod backup;
pub mod controller;
pub mod engine;
pub mod error;
pub mod events;
pub mod persistence;
pub mod repository;
pub mod scheduler;
pub mod state;
pub mod tracker;

pub use crate::autosave::{AutoSaveController, SaveStatus, Saver};
pub use crate::controller::{AssessmentController, SyncReport, SyncSettings};
pub use crate::engine::{ExportReport, FolderSyncEngine, ImportReport, SyncPhase};
pub use crate::error::SyncError;
pub use crate::events::AppEvent;
pub use crate::persistence::LocalPersistence;
pub use crate::repository::{AssessmentRepository, MergeOutcome, merge_incoming, should_adopt};
pub use crate::scheduler::SyncScheduler;
pub use crate::state::AppState;
pub use crate::tracker::{ActiveEditTracker, Cadence};
