use jiff::{SignedDuration, Timestamp};
use serde_json::Value;
use tracing::warn;

use maturity_core::{Assessment, AssessmentKey};

/// Version tag used when neither side of a merge carries one.
pub const DEFAULT_APP_VERSION: &str = "unknown";

/// What happened to one incoming record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No local record had this key; appended at the index.
    Added(usize),
    /// The local record at the index was replaced by the merged version.
    Adopted(usize),
    /// Nothing differs from the local record.
    Unchanged,
    /// The user is editing this record; left alone for this cycle.
    SkippedEditing,
}

/// In-memory assessment collection keyed by (name, interview name).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssessmentRepository {
    assessments: Vec<Assessment>,
}

impl AssessmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_assessments(assessments: Vec<Assessment>) -> Self {
        Self { assessments }
    }

    /// Rebuild from the stored JSON list.
    ///
    /// Never fails: a malformed list yields an empty repository and
    /// malformed entries are dropped, each with a warning.
    pub fn from_stored_json(text: &str) -> Self {
        let entries = match serde_json::from_str::<Value>(text) {
            Ok(Value::Array(entries)) => entries,
            Ok(_) => {
                warn!("stored assessment list is not an array, starting empty");
                return Self::new();
            }
            Err(e) => {
                warn!(error = %e, "stored assessment list is malformed, starting empty");
                return Self::new();
            }
        };

        let mut assessments = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            match serde_json::from_value::<Assessment>(entry) {
                Ok(a) => assessments.push(a),
                Err(e) => warn!(index, error = %e, "dropping malformed stored assessment"),
            }
        }
        Self { assessments }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.assessments)
    }

    pub fn len(&self) -> usize {
        self.assessments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assessments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Assessment> {
        self.assessments.iter()
    }

    pub fn as_slice(&self) -> &[Assessment] {
        &self.assessments
    }

    pub fn get(&self, index: usize) -> Option<&Assessment> {
        self.assessments.get(index)
    }

    /// Composite-key lookup. A missing interview name on either side
    /// stands for the application name.
    pub fn find_index(&self, name: &str, interview_name: Option<&str>) -> Option<usize> {
        self.assessments
            .iter()
            .position(|a| a.key().matches(name, interview_name))
    }

    pub fn find(&self, key: &AssessmentKey) -> Option<&Assessment> {
        self.find_index(&key.name, Some(&key.interview_name))
            .and_then(|i| self.assessments.get(i))
    }

    /// Insert or overwrite by composite key, stamping the save time and
    /// version. The stored `date` always moves forward.
    pub fn upsert(&mut self, mut assessment: Assessment, now: Timestamp, app_version: &str) -> usize {
        assessment.app_version = Some(app_version.to_string());
        let existing = self.find_index(&assessment.name, assessment.interview_name.as_deref());

        let floor = existing
            .map(|i| self.assessments[i].date)
            .into_iter()
            .chain([assessment.date])
            .max();
        assessment.date = match floor {
            Some(floor) if now <= floor => floor + SignedDuration::from_millis(1),
            _ => now,
        };

        match existing {
            Some(index) => {
                if assessment.file_last_modified.is_none() {
                    assessment.file_last_modified = self.assessments[index].file_last_modified;
                }
                self.assessments[index] = assessment;
                index
            }
            None => {
                self.assessments.push(assessment);
                self.assessments.len() - 1
            }
        }
    }

    /// Remove the record at `index`. The caller owns deleting its backing file.
    pub fn delete(&mut self, index: usize) -> Option<Assessment> {
        (index < self.assessments.len()).then(|| self.assessments.remove(index))
    }

    /// Reconcile one record that arrived from outside (folder or backup).
    pub fn apply_incoming(
        &mut self,
        incoming: Assessment,
        is_editing: impl Fn(&AssessmentKey) -> bool,
    ) -> MergeOutcome {
        let Some(index) = self.find_index(&incoming.name, incoming.interview_name.as_deref()) else {
            self.assessments.push(incoming);
            return MergeOutcome::Added(self.assessments.len() - 1);
        };

        if is_editing(&incoming.key()) {
            return MergeOutcome::SkippedEditing;
        }

        let existing = &self.assessments[index];
        if !should_adopt(existing, &incoming) {
            return MergeOutcome::Unchanged;
        }

        let merged = merge_incoming(existing, &incoming);
        if merged == *existing {
            return MergeOutcome::Unchanged;
        }
        self.assessments[index] = merged;
        MergeOutcome::Adopted(index)
    }

    /// Record the backing file's modification time after an export.
    pub fn set_file_modified(&mut self, key: &AssessmentKey, modified: Timestamp) -> bool {
        match self.find_index(&key.name, Some(&key.interview_name)) {
            Some(index) => {
                self.assessments[index].file_last_modified = Some(modified);
                true
            }
            None => false,
        }
    }
}

/// Whether an incoming version should replace the local one.
///
/// Any detectable divergence counts: no recorded file time yet, a strictly
/// newer file time, a different number of answers, or any differing answer.
pub fn should_adopt(existing: &Assessment, incoming: &Assessment) -> bool {
    let Some(recorded) = existing.file_last_modified else {
        return true;
    };
    if incoming.file_last_modified.is_some_and(|m| m > recorded) {
        return true;
    }
    if existing.answers.len() != incoming.answers.len() {
        return true;
    }
    incoming
        .answers
        .iter()
        .any(|(question, answer)| existing.answers.get(question) != Some(answer))
}

/// Merge an incoming version over a local one.
///
/// Fields the incoming record carries win; fields it lacks are kept from
/// the local record, so an older writer cannot erase newer data such as
/// attachments. Unknown fields merge key by key the same way.
pub fn merge_incoming(existing: &Assessment, imported: &Assessment) -> Assessment {
    let mut extra = existing.extra.clone();
    extra.extend(imported.extra.iter().map(|(k, v)| (k.clone(), v.clone())));

    Assessment {
        name: imported.name.clone(),
        interview_name: imported
            .interview_name
            .clone()
            .or_else(|| existing.interview_name.clone()),
        profile: imported.profile.clone().or_else(|| existing.profile.clone()),
        profiles: imported.profiles.clone().or_else(|| existing.profiles.clone()),
        date: imported.date,
        answers: imported.answers.clone(),
        comments: imported.comments.clone().or_else(|| existing.comments.clone()),
        answered_by: imported
            .answered_by
            .clone()
            .or_else(|| existing.answered_by.clone()),
        attachments: imported
            .attachments
            .clone()
            .or_else(|| existing.attachments.clone()),
        app_version: imported
            .app_version
            .clone()
            .or_else(|| existing.app_version.clone())
            .or_else(|| Some(DEFAULT_APP_VERSION.to_string())),
        file_last_modified: imported.file_last_modified.or(existing.file_last_modified),
        extra,
    }
}
