use serde_json::Value;
use tracing::warn;

use maturity_core::Assessment;

use crate::error::SyncError;
use crate::repository::AssessmentRepository;

/// Serialize every assessment as one pretty JSON array for manual backup.
pub fn export_backup(repository: &AssessmentRepository) -> Result<String, SyncError> {
    let records: Vec<Assessment> = repository
        .iter()
        .map(Assessment::without_file_metadata)
        .collect();
    Ok(serde_json::to_string_pretty(&records)?)
}

/// Parse a backup file. The top level must be an array; entries that are
/// not valid assessments are skipped.
pub fn parse_backup(text: &str) -> Result<Vec<Assessment>, SyncError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Array(entries) = value else {
        return Err(SyncError::InvalidBackup(
            "expected a JSON array of assessments".to_string(),
        ));
    };

    let mut out = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match Assessment::from_json_value(entry) {
            Ok(mut assessment) => {
                assessment.file_last_modified = None;
                out.push(assessment);
            }
            Err(e) => warn!(index, error = %e, "skipping invalid backup entry"),
        }
    }
    Ok(out)
}
