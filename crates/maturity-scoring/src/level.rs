use std::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Named maturity level for a 1–5 score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum MaturityLevel {
    Initial,
    Managed,
    Defined,
    Measured,
    Optimized,
}

impl MaturityLevel {
    /// Scores outside 1–5 are clamped.
    pub fn from_score(score: u8) -> Self {
        match score {
            0 | 1 => Self::Initial,
            2 => Self::Managed,
            3 => Self::Defined,
            4 => Self::Measured,
            _ => Self::Optimized,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Initial => "Initial",
            Self::Managed => "Managed",
            Self::Defined => "Defined",
            Self::Measured => "Measured",
            Self::Optimized => "Optimized",
        }
    }
}

impl fmt::Display for MaturityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
