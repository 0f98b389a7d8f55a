//! Question catalogs.
//!
//! The built-in catalog is embedded at compile time. A custom catalog is a
//! single JSON array of question objects; it is validated entry by entry and
//! replaces the built-in one when at least one entry survives.

use std::path::Path;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use ts_rs::TS;

use crate::error::CoreError;
use crate::models::question::Question;

const BUILTIN_CATALOG_JSON: &str = include_str!("../catalog/default.json");

static BUILTIN: LazyLock<QuestionCatalog> = LazyLock::new(|| {
    QuestionCatalog::from_catalog_json(BUILTIN_CATALOG_JSON).unwrap_or_else(|e| {
        tracing::error!(error = %e, "embedded question catalog is invalid");
        QuestionCatalog::default()
    })
});

/// Ordered themes plus the questions that feed them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct QuestionCatalog {
    pub themes: Vec<String>,
    pub questions: Vec<Question>,
}

impl QuestionCatalog {
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    /// Build a catalog from questions, deriving themes in first-appearance order.
    pub fn from_questions(questions: Vec<Question>) -> Self {
        let mut catalog = Self {
            themes: Vec::new(),
            questions,
        };
        catalog.sync_themes();
        catalog
    }

    /// Parse the `{ "themes": [...], "questions": [...] }` form.
    pub fn from_catalog_json(text: &str) -> Result<Self, CoreError> {
        let value: Value = serde_json::from_str(text)?;
        let questions = value
            .get("questions")
            .ok_or_else(|| CoreError::InvalidCatalog("missing 'questions'".to_string()))?;
        let mut catalog = Self::from_question_values(questions)?;

        if let Some(themes) = value.get("themes").and_then(Value::as_array) {
            let declared: Vec<String> = themes
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
            let derived = std::mem::replace(&mut catalog.themes, declared);
            for theme in derived {
                if !catalog.themes.contains(&theme) {
                    catalog.themes.push(theme);
                }
            }
        }
        Ok(catalog)
    }

    /// Parse a custom catalog file: a JSON array of question objects.
    ///
    /// Invalid entries are skipped with a warning. Fails if the top level is
    /// not an array or no entry is valid.
    pub fn from_questions_json(text: &str) -> Result<Self, CoreError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_question_values(&value)
    }

    fn from_question_values(value: &Value) -> Result<Self, CoreError> {
        let entries = value
            .as_array()
            .ok_or_else(|| CoreError::InvalidCatalog("expected a JSON array".to_string()))?;

        let mut questions: Vec<Question> = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            match Question::from_value(entry) {
                Ok(q) if questions.iter().any(|existing| existing.id == q.id) => {
                    warn!(index, id = %q.id, "skipping question with duplicate id");
                }
                Ok(q) => questions.push(q),
                Err(reason) => {
                    let err = CoreError::InvalidQuestion { index, reason };
                    warn!(error = %err, "skipping invalid question");
                }
            }
        }

        if questions.is_empty() {
            return Err(CoreError::InvalidCatalog(
                "no valid questions".to_string(),
            ));
        }
        Ok(Self::from_questions(questions))
    }

    /// Serialize the questions as a custom catalog file.
    pub fn to_questions_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(&self.questions)?)
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn questions_for_theme<'a>(&'a self, theme: &'a str) -> impl Iterator<Item = &'a Question> {
        self.questions.iter().filter(move |q| q.theme == theme)
    }

    pub fn questions_for_profile<'a>(
        &'a self,
        profile: &'a str,
    ) -> impl Iterator<Item = &'a Question> {
        self.questions.iter().filter(move |q| q.is_visible_to(profile))
    }

    /// Append a question. Ids must stay unique.
    pub fn add_question(&mut self, question: Question) -> Result<(), CoreError> {
        if self.question(&question.id).is_some() {
            return Err(CoreError::DuplicateQuestion(question.id));
        }
        self.questions.push(question);
        self.sync_themes();
        Ok(())
    }

    /// Replace the question `id` in place. The replacement may carry a new
    /// id as long as it does not collide with another question.
    pub fn update_question(&mut self, id: &str, question: Question) -> Result<(), CoreError> {
        let index = self.position(id)?;
        if question.id != id && self.question(&question.id).is_some() {
            return Err(CoreError::DuplicateQuestion(question.id));
        }
        self.questions[index] = question;
        self.sync_themes();
        Ok(())
    }

    pub fn remove_question(&mut self, id: &str) -> Result<Question, CoreError> {
        let index = self.position(id)?;
        let removed = self.questions.remove(index);
        self.sync_themes();
        Ok(removed)
    }

    /// Move the question at `from` so it ends up at index `to`.
    pub fn move_question(&mut self, from: usize, to: usize) -> Result<(), CoreError> {
        let len = self.questions.len();
        if from >= len || to >= len {
            return Err(CoreError::InvalidCatalog(format!(
                "move {from} -> {to} out of bounds for {len} questions"
            )));
        }
        let question = self.questions.remove(from);
        self.questions.insert(to, question);
        Ok(())
    }

    fn position(&self, id: &str) -> Result<usize, CoreError> {
        self.questions
            .iter()
            .position(|q| q.id == id)
            .ok_or_else(|| CoreError::UnknownQuestion(id.to_string()))
    }

    /// Keep declared theme order, drop empty themes, append new ones.
    fn sync_themes(&mut self) {
        let questions = &self.questions;
        self.themes
            .retain(|theme| questions.iter().any(|q| &q.theme == theme));
        for q in questions {
            if !self.themes.contains(&q.theme) {
                self.themes.push(q.theme.clone());
            }
        }
    }
}

/// Load the active catalog: the custom file when it is present and valid,
/// otherwise the built-in catalog.
pub fn load_catalog(path: Option<&Path>) -> QuestionCatalog {
    let Some(path) = path else {
        return QuestionCatalog::builtin();
    };

    let loaded = std::fs::read_to_string(path)
        .map_err(CoreError::from)
        .and_then(|text| QuestionCatalog::from_questions_json(&text));

    match loaded {
        Ok(catalog) => {
            info!(
                path = %path.display(),
                questions = catalog.questions.len(),
                "custom question catalog loaded"
            );
            catalog
        }
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "custom question catalog unusable, using built-in catalog"
            );
            QuestionCatalog::builtin()
        }
    }
}
