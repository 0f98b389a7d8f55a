use maturity_core::Assessment;

use crate::repository::AssessmentRepository;

/// Mutable application state shared by the save path and the sync timer.
#[derive(Debug, Default)]
pub struct AppState {
    pub repository: AssessmentRepository,
    /// Working copy of the assessment being answered. Saved into the
    /// repository by the autosave path.
    pub current: Option<Assessment>,
}

impl AppState {
    pub fn new(repository: AssessmentRepository) -> Self {
        Self {
            repository,
            current: None,
        }
    }
}
