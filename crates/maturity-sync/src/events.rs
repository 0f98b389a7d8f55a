use maturity_core::AssessmentKey;

use crate::autosave::SaveStatus;

/// Notifications for whatever renders the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The open assessment was replaced by a newer version from the folder.
    CurrentRefreshed(AssessmentKey),
    /// A folder pass brought in new or changed assessments.
    Imported { added: usize, adopted: usize },
    /// Folder access was lost and sync was switched off.
    SyncDisabled { reason: String },
    SaveStatusChanged(SaveStatus),
}
