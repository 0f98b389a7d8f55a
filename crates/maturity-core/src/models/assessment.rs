use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

use crate::error::CoreError;

/// A recorded answer to a yes/no question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Answer {
    Yes,
    No,
}

impl Answer {
    pub fn is_yes(self) -> bool {
        matches!(self, Self::Yes)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Answer {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" => Ok(Self::Yes),
            "no" | "n" => Ok(Self::No),
            _ => Err(CoreError::InvalidAnswer(s.to_string())),
        }
    }
}

/// Composite identity of an assessment: application name plus interview
/// name. A missing interview name defaults to the application name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssessmentKey {
    pub name: String,
    pub interview_name: String,
}

impl AssessmentKey {
    pub fn new(name: &str, interview_name: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            interview_name: interview_name.unwrap_or(name).to_string(),
        }
    }

    pub fn matches(&self, name: &str, interview_name: Option<&str>) -> bool {
        self.name == name && self.interview_name == interview_name.unwrap_or(name)
    }
}

impl fmt::Display for AssessmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.name, self.interview_name)
    }
}

/// A file attached to an answer. Carried through sync untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Attachment {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub mime_type: String,
    #[serde(default)]
    pub size: u64,
    /// Base64 payload.
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub timestamp: String,
}

/// One interview's answers for one application.
///
/// Serialized with camelCase field names. Fields this build does not know
/// about are kept in `extra` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Assessment {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interview_name: Option<String>,
    /// Legacy single-profile field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profiles: Option<Vec<String>>,
    /// Last-modified time, advanced on every save.
    pub date: jiff::Timestamp,
    #[serde(default)]
    pub answers: BTreeMap<String, Answer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answered_by: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<BTreeMap<String, Vec<Attachment>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    /// Modification time of the backing sync file. Never written to the folder.
    #[serde(
        rename = "_fileLastModified",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub file_last_modified: Option<jiff::Timestamp>,
    #[serde(flatten)]
    #[ts(skip)]
    pub extra: Map<String, Value>,
}

impl Assessment {
    pub fn new(
        name: impl Into<String>,
        interview_name: Option<String>,
        profile: Option<String>,
        now: jiff::Timestamp,
    ) -> Self {
        Self {
            name: name.into(),
            interview_name,
            profile,
            profiles: None,
            date: now,
            answers: BTreeMap::new(),
            comments: None,
            answered_by: None,
            attachments: None,
            app_version: None,
            file_last_modified: None,
            extra: Map::new(),
        }
    }

    /// Parse and validate a record read from outside the process.
    ///
    /// A valid record has a string `name`, a string `profile` (or a
    /// `profiles` array), an object `answers` and a `date`.
    pub fn from_json_value(value: Value) -> Result<Self, CoreError> {
        let obj = value
            .as_object()
            .ok_or_else(|| CoreError::InvalidAssessment("not a JSON object".to_string()))?;

        if !obj.get("name").is_some_and(Value::is_string) {
            return Err(CoreError::InvalidAssessment(
                "missing or non-string 'name'".to_string(),
            ));
        }
        let has_profile = obj.get("profile").is_some_and(Value::is_string)
            || obj.get("profiles").is_some_and(Value::is_array);
        if !has_profile {
            return Err(CoreError::InvalidAssessment(
                "missing 'profile' or 'profiles'".to_string(),
            ));
        }
        if !obj.get("answers").is_some_and(Value::is_object) {
            return Err(CoreError::InvalidAssessment(
                "missing or non-object 'answers'".to_string(),
            ));
        }
        if obj.get("date").is_none_or(Value::is_null) {
            return Err(CoreError::InvalidAssessment("missing 'date'".to_string()));
        }

        serde_json::from_value(value).map_err(|e| CoreError::InvalidAssessment(e.to_string()))
    }

    pub fn key(&self) -> AssessmentKey {
        AssessmentKey::new(&self.name, self.interview_name.as_deref())
    }

    /// Interview name, falling back to the application name.
    pub fn interview_name_or_name(&self) -> &str {
        self.interview_name.as_deref().unwrap_or(&self.name)
    }

    pub fn has_identity(&self) -> bool {
        !self.name.trim().is_empty()
    }

    /// Profiles selected for this assessment, legacy field first.
    pub fn selected_profiles(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.profile.as_deref().into_iter().collect();
        for p in self.profiles.iter().flatten() {
            if !out.contains(&p.as_str()) {
                out.push(p.as_str());
            }
        }
        out
    }

    pub fn answer(&self, question_id: &str) -> Option<Answer> {
        self.answers.get(question_id).copied()
    }

    pub fn record_answer(&mut self, question_id: &str, answer: Answer, answered_by: Option<&str>) {
        self.answers.insert(question_id.to_string(), answer);
        if let Some(profile) = answered_by {
            self.answered_by
                .get_or_insert_with(BTreeMap::new)
                .insert(question_id.to_string(), profile.to_string());
        }
    }

    /// Remove an answer together with its `answeredBy` tag.
    pub fn clear_answer(&mut self, question_id: &str) -> Option<Answer> {
        if let Some(by) = self.answered_by.as_mut() {
            by.remove(question_id);
        }
        self.answers.remove(question_id)
    }

    /// Set a comment; blank text removes it.
    pub fn record_comment(&mut self, question_id: &str, text: &str) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            if let Some(comments) = self.comments.as_mut() {
                comments.remove(question_id);
            }
            return;
        }
        self.comments
            .get_or_insert_with(BTreeMap::new)
            .insert(question_id.to_string(), trimmed.to_string());
    }

    pub fn comment(&self, question_id: &str) -> Option<&str> {
        self.comments
            .as_ref()
            .and_then(|c| c.get(question_id))
            .map(String::as_str)
    }

    /// Copy suitable for writing to the sync folder.
    pub fn without_file_metadata(&self) -> Self {
        Self {
            file_last_modified: None,
            ..self.clone()
        }
    }
}
