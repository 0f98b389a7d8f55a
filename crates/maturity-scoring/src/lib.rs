//! maturity-scoring
//!
//! Weighted maturity scoring. Pure functions over an assessment and a
//! question catalog; no I/O, no clock.

pub mod level;
pub mod progress;
pub mod scoring;

pub use level::MaturityLevel;
pub use progress::{Progress, progress};
pub use scoring::{ThemeScore, ThemeScores, compute_scores, overall_maturity};
