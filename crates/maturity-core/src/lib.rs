//! maturity-core
//!
//! Pure domain types for the maturity questionnaire: questions and catalogs,
//! assessments, and the file/key naming conventions shared by the store and
//! the sync folder. No timers, no storage backends.

pub mod catalog;
pub mod error;
pub mod keys;
pub mod models;

pub use crate::catalog::{QuestionCatalog, load_catalog};
pub use crate::error::CoreError;
pub use crate::models::assessment::{Answer, Assessment, AssessmentKey, Attachment};
pub use crate::models::question::Question;
