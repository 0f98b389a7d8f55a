use std::sync::Arc;
use std::time::Duration;

use jiff::Timestamp;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, error, info, warn};

use maturity_core::{Answer, Assessment, AssessmentKey, CoreError, QuestionCatalog};
use maturity_scoring::{ThemeScores, compute_scores};
use maturity_storage::{BoxFuture, PersistentStore, SyncFolder, SyncFolderHandle};

use crate::autosave::{AutoSaveController, DEFAULT_AUTOSAVE_DELAY, SaveStatus, Saver};
use crate::backup;
use crate::engine::{ExportReport, FolderSyncEngine, ImportReport, SyncPhase};
use crate::error::SyncError;
use crate::events::AppEvent;
use crate::persistence::LocalPersistence;
use crate::repository::MergeOutcome;
use crate::scheduler::SyncScheduler;
use crate::state::AppState;
use crate::tracker::{ActiveEditTracker, Cadence, DEFAULT_IDLE_TIMEOUT};

const EVENT_CAPACITY: usize = 64;

/// Timing and version settings for a controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub autosave_delay: Duration,
    pub edit_idle_timeout: Duration,
    pub cadence: Cadence,
    /// Stamped onto every saved assessment as `appVersion`.
    pub app_version: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            autosave_delay: DEFAULT_AUTOSAVE_DELAY,
            edit_idle_timeout: DEFAULT_IDLE_TIMEOUT,
            cadence: Cadence::default(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Outcome of a manual sync: an import followed by an export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub import: ImportReport,
    pub export: ExportReport,
}

/// Everything the background tasks share.
struct ControllerCore {
    state: Mutex<AppState>,
    catalog: QuestionCatalog,
    persistence: LocalPersistence,
    engine: FolderSyncEngine,
    tracker: Arc<ActiveEditTracker>,
    events: broadcast::Sender<AppEvent>,
    app_version: String,
}

impl ControllerCore {
    fn emit(&self, event: AppEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Upsert the working copy, persist locally, then export when sync is on.
    ///
    /// Only the local save can fail the call. Folder errors are handled here
    /// and reported through events.
    async fn save_current(&self) -> Result<(), SyncError> {
        {
            let mut state = self.state.lock().await;
            let current = state.current.clone().ok_or(SyncError::NoCurrentAssessment)?;
            if !current.has_identity() {
                return Err(SyncError::UnnamedAssessment);
            }
            let key = current.key();
            let index = state
                .repository
                .upsert(current, Timestamp::now(), &self.app_version);
            let saved = state.repository.get(index).cloned();
            state.current = saved;
            self.persistence.save_assessments(&state.repository).await?;
            debug!(%key, "assessment saved");
        }

        if self.engine.is_enabled() {
            match self.engine.export_all(&self.state).await {
                Ok(report) if report.written > 0 => self.persist_quietly().await,
                Ok(_) => {}
                Err(e) => self.handle_sync_error(&e).await,
            }
        }
        Ok(())
    }

    /// Persist the collection after a folder pass. Failures only log: the
    /// next save retries them.
    async fn persist_quietly(&self) {
        let state = self.state.lock().await;
        if let Err(e) = self.persistence.save_assessments(&state.repository).await {
            warn!(error = %e, "failed to persist assessments after sync");
        }
    }

    async fn import_pass(&self) -> Result<ImportReport, SyncError> {
        let report = self.engine.import_all(&self.state, &self.tracker).await?;
        if report.changed() {
            // Stored locally without re-exporting, so imports never echo.
            self.persist_quietly().await;
            self.emit(AppEvent::Imported {
                added: report.added.len(),
                adopted: report.adopted.len(),
            });
        }
        if report.current_refreshed
            && let Some(key) = self.state.lock().await.current.as_ref().map(Assessment::key)
        {
            info!(%key, "open assessment refreshed from sync folder");
            self.emit(AppEvent::CurrentRefreshed(key));
        }
        Ok(report)
    }

    async fn handle_sync_error(&self, err: &SyncError) {
        match err {
            SyncError::PermissionLost { reason, .. } => {
                if let Err(e) = self.persistence.save_sync_enabled(false).await {
                    warn!(error = %e, "failed to persist sync toggle");
                }
                self.emit(AppEvent::SyncDisabled {
                    reason: reason.clone(),
                });
            }
            SyncError::SyncDisabled => debug!("sync pass skipped, sync is off"),
            _ => warn!(error = %err, "sync pass failed"),
        }
    }

    /// One scheduled import. Returns whether the schedule should continue.
    async fn scheduled_tick(&self) -> bool {
        if let Err(e) = self.import_pass().await {
            self.handle_sync_error(&e).await;
        }
        self.engine.is_enabled()
    }
}

impl Saver for ControllerCore {
    fn save(&self) -> BoxFuture<'_, Result<(), SyncError>> {
        Box::pin(self.save_current())
    }
}

/// The application-facing surface over the assessment collection.
///
/// Owns the shared state, the debounced autosave and the periodic folder
/// import. Must be created inside a Tokio runtime. Dropping the controller
/// stops both background tasks; call [`Self::shutdown`] to also flush a
/// pending save.
pub struct AssessmentController {
    core: Arc<ControllerCore>,
    autosave: AutoSaveController,
    scheduler: SyncScheduler,
}

impl AssessmentController {
    /// Load the stored collection and start the autosave worker. Folder
    /// sync stays off until [`Self::restore_sync_folder`] or
    /// [`Self::select_sync_folder`].
    pub async fn open(
        store: Arc<dyn PersistentStore>,
        catalog: QuestionCatalog,
        settings: SyncSettings,
    ) -> Self {
        let persistence = LocalPersistence::new(store);
        let repository = persistence.load_assessments().await;
        info!(count = repository.len(), "assessments loaded");

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let core = Arc::new(ControllerCore {
            state: Mutex::new(AppState::new(repository)),
            catalog,
            persistence,
            engine: FolderSyncEngine::new(),
            tracker: Arc::new(ActiveEditTracker::new(
                settings.edit_idle_timeout,
                settings.cadence,
            )),
            events,
            app_version: settings.app_version,
        });

        let autosave = AutoSaveController::new(settings.autosave_delay);
        autosave.start(core.clone());
        forward_save_status(&autosave, core.events.clone());

        Self {
            core,
            autosave,
            scheduler: SyncScheduler::new(),
        }
    }

    pub fn catalog(&self) -> &QuestionCatalog {
        &self.core.catalog
    }

    pub fn tracker(&self) -> &ActiveEditTracker {
        &self.core.tracker
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.core.events.subscribe()
    }

    pub fn save_status(&self) -> SaveStatus {
        self.autosave.status()
    }

    pub fn sync_phase(&self) -> SyncPhase {
        self.core.engine.phase()
    }

    pub fn is_sync_enabled(&self) -> bool {
        self.core.engine.is_enabled()
    }

    pub async fn assessments(&self) -> Vec<Assessment> {
        self.core.state.lock().await.repository.as_slice().to_vec()
    }

    pub async fn current(&self) -> Option<Assessment> {
        self.core.state.lock().await.current.clone()
    }

    /// Start an interview, or resume it if the key already exists.
    pub async fn start_assessment(
        &self,
        name: &str,
        interview_name: Option<&str>,
        profile: Option<&str>,
    ) -> Result<Assessment, SyncError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SyncError::UnnamedAssessment);
        }
        let interview_name = interview_name.map(str::trim).filter(|s| !s.is_empty());
        self.flush_outgoing().await?;

        let current = {
            let mut state = self.core.state.lock().await;
            let current = match state.repository.find_index(name, interview_name) {
                Some(index) => {
                    info!(name, interview = ?interview_name, "resuming assessment");
                    state.repository.get(index).cloned()
                }
                None => None,
            };
            let current = current.unwrap_or_else(|| {
                info!(name, interview = ?interview_name, "starting assessment");
                Assessment::new(
                    name,
                    interview_name.map(str::to_string),
                    profile.map(str::to_string),
                    Timestamp::now(),
                )
            });
            state.current = Some(current.clone());
            current
        };

        self.core.tracker.mark_editing(current.key());
        self.autosave.on_mutation(&current);
        Ok(current)
    }

    /// Make an existing assessment the working copy.
    pub async fn open_assessment(
        &self,
        name: &str,
        interview_name: Option<&str>,
    ) -> Result<Assessment, SyncError> {
        self.flush_outgoing().await?;
        let mut state = self.core.state.lock().await;
        let found = state
            .repository
            .find_index(name, interview_name)
            .and_then(|i| state.repository.get(i).cloned())
            .ok_or_else(|| SyncError::NotFound {
                key: AssessmentKey::new(name, interview_name).to_string(),
            })?;
        state.current = Some(found.clone());
        Ok(found)
    }

    /// Save the working copy before it is replaced, if it holds changes the
    /// repository does not have yet. Any armed debounced save is dropped
    /// so it cannot fire against the next working copy.
    async fn flush_outgoing(&self) -> Result<(), SyncError> {
        let dirty = {
            let state = self.core.state.lock().await;
            state.current.as_ref().is_some_and(|current| {
                current.has_identity()
                    && state.repository.find(&current.key()) != Some(current)
            })
        };
        if dirty {
            debug!("saving working copy before switching assessments");
            self.autosave.save_now(self.core.as_ref()).await
        } else {
            self.autosave.cancel();
            Ok(())
        }
    }

    /// Apply `edit` to the working copy, mark it as being edited and
    /// schedule a save.
    async fn mutate_current<R>(
        &self,
        edit: impl FnOnce(&mut Assessment) -> R,
    ) -> Result<R, SyncError> {
        let (result, snapshot) = {
            let mut state = self.core.state.lock().await;
            let current = state.current.as_mut().ok_or(SyncError::NoCurrentAssessment)?;
            let result = edit(current);
            (result, current.clone())
        };
        self.core.tracker.mark_editing(snapshot.key());
        self.autosave.on_mutation(&snapshot);
        Ok(result)
    }

    fn check_question(&self, question_id: &str) -> Result<(), SyncError> {
        if self.core.catalog.question(question_id).is_none() {
            return Err(CoreError::UnknownQuestion(question_id.to_string()).into());
        }
        Ok(())
    }

    pub async fn record_answer(
        &self,
        question_id: &str,
        answer: Answer,
        answered_by: Option<&str>,
    ) -> Result<(), SyncError> {
        self.check_question(question_id)?;
        self.mutate_current(|a| a.record_answer(question_id, answer, answered_by))
            .await
    }

    pub async fn record_comment(&self, question_id: &str, text: &str) -> Result<(), SyncError> {
        self.check_question(question_id)?;
        self.mutate_current(|a| a.record_comment(question_id, text))
            .await
    }

    pub async fn clear_answer(&self, question_id: &str) -> Result<Option<Answer>, SyncError> {
        self.mutate_current(|a| a.clear_answer(question_id)).await
    }

    /// Scores of the working copy against the active catalog.
    pub async fn compute_scores(&self) -> Result<ThemeScores, SyncError> {
        let state = self.core.state.lock().await;
        let current = state.current.as_ref().ok_or(SyncError::NoCurrentAssessment)?;
        Ok(compute_scores(current, &self.core.catalog))
    }

    /// Save the working copy now, bypassing the debounce.
    pub async fn save_now(&self) -> Result<(), SyncError> {
        self.autosave.save_now(self.core.as_ref()).await
    }

    /// Schedule a debounced save of the working copy.
    pub async fn schedule_save(&self) -> bool {
        match self.current().await {
            Some(current) => self.autosave.on_mutation(&current),
            None => false,
        }
    }

    /// Remove an assessment, locally and from the sync folder.
    pub async fn delete_assessment(
        &self,
        name: &str,
        interview_name: Option<&str>,
    ) -> Result<Assessment, SyncError> {
        let removed = {
            let mut state = self.core.state.lock().await;
            let removed = state
                .repository
                .find_index(name, interview_name)
                .and_then(|i| state.repository.delete(i))
                .ok_or_else(|| SyncError::NotFound {
                    key: AssessmentKey::new(name, interview_name).to_string(),
                })?;
            if state
                .current
                .as_ref()
                .is_some_and(|c| c.key() == removed.key())
            {
                state.current = None;
            }
            self.core
                .persistence
                .save_assessments(&state.repository)
                .await?;
            removed
        };
        info!(key = %removed.key(), "assessment deleted");

        if self.core.engine.is_enabled()
            && let Err(e) = self.core.engine.delete_backing_file(&removed).await
        {
            self.core.handle_sync_error(&e).await;
        }
        Ok(removed)
    }

    /// Use `handle` as the sync folder from now on and run a first sync.
    pub async fn select_sync_folder(&self, handle: SyncFolderHandle) -> Result<SyncReport, SyncError> {
        let folder = handle.open().await?;
        self.core.persistence.save_folder_handle(&handle).await?;
        self.core.persistence.save_sync_enabled(true).await?;
        self.attach_folder(folder);
        self.sync_now().await
    }

    /// Re-acquire the stored folder at startup. Returns whether sync is on.
    ///
    /// A folder that can no longer be opened switches sync off; the stored
    /// handle is kept so the user can re-select it.
    pub async fn restore_sync_folder(&self) -> Result<bool, SyncError> {
        if !self.core.persistence.load_sync_enabled().await {
            return Ok(false);
        }
        let Some(handle) = self.core.persistence.load_folder_handle().await else {
            warn!("sync enabled but no folder stored");
            self.core.persistence.save_sync_enabled(false).await?;
            return Ok(false);
        };

        match handle.open().await {
            Ok(folder) => {
                self.attach_folder(folder);
                if let Err(e) = self.sync_now().await {
                    warn!(error = %e, "initial sync failed");
                }
                Ok(self.is_sync_enabled())
            }
            Err(e) => {
                error!(path = %handle.path.display(), error = %e, "sync folder no longer accessible");
                self.core.persistence.save_sync_enabled(false).await?;
                self.core.emit(AppEvent::SyncDisabled {
                    reason: e.to_string(),
                });
                Ok(false)
            }
        }
    }

    /// Enable sync against an already opened folder and start the
    /// periodic import. Nothing is persisted.
    pub fn attach_folder(&self, folder: Arc<dyn SyncFolder>) {
        self.core.engine.enable(folder);
        let core = self.core.clone();
        self.scheduler.start(
            self.core.tracker.clone(),
            Arc::new(move || -> BoxFuture<'static, bool> {
                let core = core.clone();
                Box::pin(async move { core.scheduled_tick().await })
            }),
        );
    }

    /// Turn folder sync off and forget the folder. A pass already running
    /// completes.
    pub async fn disable_sync(&self) -> Result<(), SyncError> {
        self.scheduler.stop();
        self.core.engine.disable();
        self.core.persistence.save_sync_enabled(false).await?;
        self.core.persistence.clear_folder_handle().await?;
        info!("folder sync disabled");
        Ok(())
    }

    /// Import from the folder, then export to it.
    pub async fn sync_now(&self) -> Result<SyncReport, SyncError> {
        let result = async {
            let import = self.core.import_pass().await?;
            let export = self.core.engine.export_all(&self.core.state).await?;
            if export.written > 0 {
                self.core.persist_quietly().await;
            }
            Ok::<_, SyncError>(SyncReport { import, export })
        }
        .await;

        if let Err(e) = &result {
            if matches!(e, SyncError::PermissionLost { .. }) {
                self.scheduler.stop();
            }
            self.core.handle_sync_error(e).await;
        }
        result
    }

    /// All assessments as one JSON array.
    pub async fn export_backup(&self) -> Result<String, SyncError> {
        let state = self.core.state.lock().await;
        backup::export_backup(&state.repository)
    }

    /// Merge a backup into the collection with the folder-import rules.
    pub async fn import_backup(&self, text: &str) -> Result<ImportReport, SyncError> {
        let incoming = backup::parse_backup(text)?;
        let mut report = ImportReport::default();
        {
            let mut state = self.core.state.lock().await;
            let current_key = state.current.as_ref().map(Assessment::key);
            for assessment in incoming {
                let key = assessment.key();
                match state
                    .repository
                    .apply_incoming(assessment, |k| self.core.tracker.is_editing_key(k))
                {
                    MergeOutcome::Added(_) => report.added.push(key),
                    MergeOutcome::Adopted(index) => {
                        if current_key.as_ref() == Some(&key) {
                            let refreshed = state.repository.get(index).cloned();
                            state.current = refreshed;
                            report.current_refreshed = true;
                        }
                        report.adopted.push(key);
                    }
                    MergeOutcome::Unchanged => report.unchanged += 1,
                    MergeOutcome::SkippedEditing => report.skipped_editing.push(key),
                }
            }
            if report.changed() {
                self.core
                    .persistence
                    .save_assessments(&state.repository)
                    .await?;
            }
        }
        info!(
            added = report.added.len(),
            adopted = report.adopted.len(),
            "backup imported"
        );

        if report.changed() && self.core.engine.is_enabled() {
            match self.core.engine.export_all(&self.core.state).await {
                Ok(_) => self.core.persist_quietly().await,
                Err(e) => self.core.handle_sync_error(&e).await,
            }
        }
        Ok(report)
    }

    /// Stop the background tasks, flushing a pending save first.
    pub async fn shutdown(self) {
        if let Some(task) = self.scheduler.stop() {
            let _ = task.await;
        }
        if let Some(worker) = self.autosave.stop() {
            let _ = worker.await;
        }
        debug!("controller shut down");
    }
}

/// Mirror autosave status changes onto the event channel.
fn forward_save_status(autosave: &AutoSaveController, events: broadcast::Sender<AppEvent>) {
    let mut status = autosave.subscribe();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = status.borrow_and_update().clone();
            let _ = events.send(AppEvent::SaveStatusChanged(current));
        }
    });
}
