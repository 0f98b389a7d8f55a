use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use jiff::Timestamp;
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, warn};

use maturity_core::{Assessment, AssessmentKey, keys};
use maturity_storage::{StorageError, SyncFolder};

use crate::error::SyncError;
use crate::repository::MergeOutcome;
use crate::state::AppState;
use crate::tracker::ActiveEditTracker;

/// Where the engine is in a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No folder attached, or access was lost.
    Disabled,
    Idle,
    Importing,
    Merging,
    Exporting,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub written: usize,
    /// Files whose content already matched.
    pub unchanged: usize,
    pub failed: usize,
    pub orphans_deleted: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub added: Vec<AssessmentKey>,
    pub adopted: Vec<AssessmentKey>,
    pub unchanged: usize,
    pub skipped_editing: Vec<AssessmentKey>,
    /// Files that could not be read or failed validation.
    pub invalid: usize,
    /// The open working copy was replaced by an adopted version.
    pub current_refreshed: bool,
}

impl ImportReport {
    /// Whether the collection changed and needs persisting.
    pub fn changed(&self) -> bool {
        !self.added.is_empty() || !self.adopted.is_empty()
    }
}

struct PlannedFile {
    name: String,
    key: AssessmentKey,
    bytes: Vec<u8>,
}

/// Reconciles the assessment collection with a folder of one JSON file per
/// assessment.
///
/// Passes are serialized. Errors never touch the in-memory collection: a
/// transient failure skips that file, loss of folder access disables sync.
pub struct FolderSyncEngine {
    folder: RwLock<Option<Arc<dyn SyncFolder>>>,
    phase: watch::Sender<SyncPhase>,
    pass: Mutex<()>,
}

impl Default for FolderSyncEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FolderSyncEngine {
    pub fn new() -> Self {
        let (phase, _) = watch::channel(SyncPhase::Disabled);
        Self {
            folder: RwLock::new(None),
            phase,
            pass: Mutex::new(()),
        }
    }

    pub fn enable(&self, folder: Arc<dyn SyncFolder>) {
        info!(folder = %folder.describe(), "folder sync enabled");
        *self.folder.write().unwrap_or_else(PoisonError::into_inner) = Some(folder);
        self.phase.send_replace(SyncPhase::Idle);
    }

    pub fn disable(&self) {
        self.folder
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.phase.send_replace(SyncPhase::Disabled);
    }

    pub fn is_enabled(&self) -> bool {
        self.folder().is_some()
    }

    pub fn folder(&self) -> Option<Arc<dyn SyncFolder>> {
        self.folder
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    /// Classify a folder error: loss of access disables sync, anything else
    /// ends the pass with the state unchanged.
    fn fail(&self, folder: &dyn SyncFolder, err: StorageError) -> SyncError {
        if err.is_access_lost() {
            error!(folder = %folder.describe(), error = %err, "sync folder access lost, disabling sync");
            self.disable();
            return SyncError::PermissionLost {
                folder: folder.describe(),
                reason: err.to_string(),
            };
        }
        warn!(folder = %folder.describe(), error = %err, "sync pass aborted");
        self.phase.send_replace(SyncPhase::Idle);
        SyncError::Storage(err)
    }

    /// Write every assessment to the folder and delete orphaned files.
    ///
    /// The collection is snapshotted before the first folder call. Files
    /// whose bytes already match are not rewritten. Each written (or
    /// matching) file's modification time is recorded on its assessment.
    pub async fn export_all(&self, state: &Mutex<AppState>) -> Result<ExportReport, SyncError> {
        let _pass = self.pass.lock().await;
        let folder = self.folder().ok_or(SyncError::SyncDisabled)?;
        self.phase.send_replace(SyncPhase::Exporting);

        let planned: Vec<PlannedFile> = {
            let state = state.lock().await;
            state
                .repository
                .iter()
                .filter_map(|a| match serialize_for_folder(a) {
                    Ok(bytes) => Some(PlannedFile {
                        name: keys::assessment_file(a),
                        key: a.key(),
                        bytes,
                    }),
                    Err(e) => {
                        warn!(key = %a.key(), error = %e, "cannot serialize assessment, skipping");
                        None
                    }
                })
                .collect()
        };

        let existing = match folder.list().await {
            Ok(entries) => entries,
            Err(e) => return Err(self.fail(folder.as_ref(), e)),
        };
        let on_disk: HashSet<&str> = existing.iter().map(|e| e.name.as_str()).collect();

        let mut report = ExportReport::default();
        let mut recorded: Vec<(AssessmentKey, Timestamp)> = Vec::with_capacity(planned.len());

        for file in &planned {
            if on_disk.contains(file.name.as_str()) {
                match folder.read(&file.name).await {
                    Ok(contents) if contents.bytes == file.bytes => {
                        recorded.push((file.key.clone(), contents.modified));
                        report.unchanged += 1;
                        continue;
                    }
                    Ok(_) => {}
                    Err(e) if e.is_access_lost() => return Err(self.fail(folder.as_ref(), e)),
                    Err(e) => debug!(file = %file.name, error = %e, "cannot compare, rewriting"),
                }
            }

            match folder.write(&file.name, file.bytes.clone()).await {
                Ok(modified) => {
                    debug!(file = %file.name, "assessment exported");
                    recorded.push((file.key.clone(), modified));
                    report.written += 1;
                }
                Err(e) if e.is_access_lost() => return Err(self.fail(folder.as_ref(), e)),
                Err(e) => {
                    warn!(file = %file.name, error = %e, "failed to export assessment");
                    report.failed += 1;
                }
            }
        }

        let expected: HashSet<&str> = planned.iter().map(|f| f.name.as_str()).collect();
        for entry in &existing {
            if !keys::is_assessment_file(&entry.name) || expected.contains(entry.name.as_str()) {
                continue;
            }
            match folder.delete(&entry.name).await {
                Ok(()) => {
                    info!(file = %entry.name, "deleted orphaned sync file");
                    report.orphans_deleted += 1;
                }
                Err(e) if e.is_access_lost() => return Err(self.fail(folder.as_ref(), e)),
                Err(e) => warn!(file = %entry.name, error = %e, "failed to delete orphaned sync file"),
            }
        }

        {
            let mut state = state.lock().await;
            for (key, modified) in &recorded {
                state.repository.set_file_modified(key, *modified);
                if let Some(current) = state.current.as_mut()
                    && current.key() == *key
                {
                    current.file_last_modified = Some(*modified);
                }
            }
        }

        self.phase.send_replace(SyncPhase::Idle);
        info!(
            written = report.written,
            unchanged = report.unchanged,
            failed = report.failed,
            orphans = report.orphans_deleted,
            "export finished"
        );
        Ok(report)
    }

    /// Read every JSON file in the folder and merge it into the collection.
    ///
    /// Records under active edit are skipped for this cycle. When the open
    /// working copy is adopted it is refreshed from the merged record.
    pub async fn import_all(
        &self,
        state: &Mutex<AppState>,
        tracker: &ActiveEditTracker,
    ) -> Result<ImportReport, SyncError> {
        let _pass = self.pass.lock().await;
        let folder = self.folder().ok_or(SyncError::SyncDisabled)?;
        self.phase.send_replace(SyncPhase::Importing);

        let entries = match folder.list().await {
            Ok(entries) => entries,
            Err(e) => return Err(self.fail(folder.as_ref(), e)),
        };

        let mut report = ImportReport::default();
        let mut incoming = Vec::new();
        for entry in entries.iter().filter(|e| keys::is_json_file(&e.name)) {
            let contents = match folder.read(&entry.name).await {
                Ok(contents) => contents,
                Err(e) if e.is_access_lost() => return Err(self.fail(folder.as_ref(), e)),
                Err(e) => {
                    warn!(file = %entry.name, error = %e, "failed to read sync file");
                    report.invalid += 1;
                    continue;
                }
            };
            match parse_folder_file(&contents.bytes) {
                Ok(mut assessment) => {
                    assessment.file_last_modified = Some(contents.modified);
                    incoming.push(assessment);
                }
                Err(e) => {
                    warn!(file = %entry.name, error = %e, "skipping invalid sync file");
                    report.invalid += 1;
                }
            }
        }

        self.phase.send_replace(SyncPhase::Merging);
        {
            let mut state = state.lock().await;
            let current_key = state.current.as_ref().map(Assessment::key);

            for assessment in incoming {
                let key = assessment.key();
                match state
                    .repository
                    .apply_incoming(assessment, |k| tracker.is_editing_key(k))
                {
                    MergeOutcome::Added(_) => {
                        debug!(%key, "imported new assessment");
                        report.added.push(key);
                    }
                    MergeOutcome::Adopted(index) => {
                        debug!(%key, "adopted newer assessment from folder");
                        if current_key.as_ref() == Some(&key) {
                            let refreshed = state.repository.get(index).cloned();
                            state.current = refreshed;
                            report.current_refreshed = true;
                        }
                        report.adopted.push(key);
                    }
                    MergeOutcome::Unchanged => report.unchanged += 1,
                    MergeOutcome::SkippedEditing => {
                        debug!(%key, "assessment under edit, import skipped");
                        report.skipped_editing.push(key);
                    }
                }
            }
        }

        self.phase.send_replace(SyncPhase::Idle);
        info!(
            added = report.added.len(),
            adopted = report.adopted.len(),
            unchanged = report.unchanged,
            skipped = report.skipped_editing.len(),
            invalid = report.invalid,
            "import finished"
        );
        Ok(report)
    }

    /// Delete the backing file of a removed assessment.
    pub async fn delete_backing_file(&self, assessment: &Assessment) -> Result<(), SyncError> {
        let _pass = self.pass.lock().await;
        let folder = self.folder().ok_or(SyncError::SyncDisabled)?;
        let name = keys::assessment_file(assessment);
        match folder.delete(&name).await {
            Ok(()) => {
                info!(file = %name, "deleted sync file");
                Ok(())
            }
            Err(e) => Err(self.fail(folder.as_ref(), e)),
        }
    }
}

/// Pretty JSON without the local file bookkeeping.
pub fn serialize_for_folder(assessment: &Assessment) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec_pretty(&assessment.without_file_metadata())
}

fn parse_folder_file(bytes: &[u8]) -> Result<Assessment, SyncError> {
    let value: serde_json::Value = serde_json::from_slice(bytes)?;
    Ok(Assessment::from_json_value(value)?)
}
