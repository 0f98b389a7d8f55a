//! File name and store key conventions.
//!
//! Pure string functions. These define the canonical layout of the sync
//! folder and the keys used in the local persistent store.

use crate::models::assessment::Assessment;

pub const ASSESSMENT_FILE_PREFIX: &str = "assessment-";

pub const JSON_SUFFIX: &str = ".json";

/// Serialized assessment list.
pub const STORE_ASSESSMENTS: &str = "assessments";

/// Whether folder sync was enabled when the last session ended.
pub const STORE_SYNC_ENABLED: &str = "sync_enabled";

/// Handle to the sync folder, re-acquired every session.
pub const STORE_SYNC_FOLDER: &str = "sync_folder";

/// Replace every character outside `[A-Za-z0-9]` with `_`.
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// `assessment-<name>-<interview>-<YYYY-MM-DD>.json`, date in UTC.
pub fn assessment_file(assessment: &Assessment) -> String {
    format!(
        "{ASSESSMENT_FILE_PREFIX}{}-{}-{}{JSON_SUFFIX}",
        sanitize(&assessment.name),
        sanitize(assessment.interview_name_or_name()),
        assessment.date.strftime("%Y-%m-%d"),
    )
}

pub fn is_assessment_file(file_name: &str) -> bool {
    file_name.starts_with(ASSESSMENT_FILE_PREFIX) && file_name.ends_with(JSON_SUFFIX)
}

pub fn is_json_file(file_name: &str) -> bool {
    file_name.ends_with(JSON_SUFFIX)
}

/// Default name for a bulk backup written on `date`.
pub fn backup_file(date: jiff::civil::Date) -> String {
    format!("maturity-assessments-{date}{JSON_SUFFIX}")
}
