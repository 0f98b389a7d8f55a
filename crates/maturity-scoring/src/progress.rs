use serde::{Deserialize, Serialize};
use ts_rs::TS;

use maturity_core::{Assessment, QuestionCatalog};

/// How much of a profile's questionnaire has been answered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Progress {
    pub answered: usize,
    pub total: usize,
}

impl Progress {
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.answered as f64 / self.total as f64 * 100.0
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.answered == self.total
    }
}

/// Count answered questions among those visible to `profile`.
pub fn progress(assessment: &Assessment, catalog: &QuestionCatalog, profile: &str) -> Progress {
    let mut out = Progress {
        answered: 0,
        total: 0,
    };
    for question in catalog.questions_for_profile(profile) {
        out.total += 1;
        if assessment.answers.contains_key(&question.id) {
            out.answered += 1;
        }
    }
    out
}
