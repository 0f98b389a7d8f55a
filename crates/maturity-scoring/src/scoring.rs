use serde::{Deserialize, Serialize};
use ts_rs::TS;

use maturity_core::{Assessment, QuestionCatalog};

use crate::level::MaturityLevel;

/// Lowest score; also the score of a theme with no answered question.
pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;

/// Score and weight totals for one theme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ThemeScore {
    pub theme: String,
    pub score: u8,
    pub earned_weight: u32,
    pub total_weight: u32,
}

impl ThemeScore {
    pub fn level(&self) -> MaturityLevel {
        MaturityLevel::from_score(self.score)
    }
}

/// Per-theme scores in catalog theme order (the radar chart axis order).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ThemeScores {
    pub themes: Vec<ThemeScore>,
}

impl ThemeScores {
    pub fn get(&self, theme: &str) -> Option<u8> {
        self.themes.iter().find(|t| t.theme == theme).map(|t| t.score)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ThemeScore> {
        self.themes.iter()
    }

    pub fn len(&self) -> usize {
        self.themes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.themes.is_empty()
    }
}

/// Compute a 1–5 maturity score for every theme of `catalog`.
///
/// Every catalog question counts, whatever profile it targets: an
/// assessment can collect answers from several profiles over time. Only
/// answered questions contribute weight. A theme with nothing answered
/// scores [`MIN_SCORE`].
pub fn compute_scores(assessment: &Assessment, catalog: &QuestionCatalog) -> ThemeScores {
    let mut themes: Vec<ThemeScore> = catalog
        .themes
        .iter()
        .map(|theme| ThemeScore {
            theme: theme.clone(),
            score: MIN_SCORE,
            earned_weight: 0,
            total_weight: 0,
        })
        .collect();

    for question in &catalog.questions {
        let Some(answer) = assessment.answer(&question.id) else {
            continue;
        };
        let Some(entry) = themes.iter_mut().find(|t| t.theme == question.theme) else {
            continue;
        };
        let weight = u32::from(question.weight);
        entry.total_weight += weight;
        if answer.is_yes() {
            entry.earned_weight += weight;
        }
    }

    for entry in &mut themes {
        entry.score = band(entry.earned_weight, entry.total_weight);
    }

    ThemeScores { themes }
}

/// Map an earned/total weight ratio onto five 20%-wide bands.
///
/// `round(pct / 20 + 0.5)` rounds half up, so an exact multiple of 20% lands
/// in the higher band: 20% → 2, 40% → 3, 60% → 4, 80% → 5.
fn band(earned: u32, total: u32) -> u8 {
    if total == 0 {
        return MIN_SCORE;
    }
    let percentage = f64::from(earned) / f64::from(total) * 100.0;
    let rounded = (percentage / 20.0 + 0.5).round();
    rounded.clamp(f64::from(MIN_SCORE), f64::from(MAX_SCORE)) as u8
}

/// Mean of the theme scores, rounded to one decimal.
pub fn overall_maturity(scores: &ThemeScores) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    let sum: u32 = scores.iter().map(|t| u32::from(t.score)).sum();
    let mean = f64::from(sum) / scores.len() as f64;
    Some((mean * 10.0).round() / 10.0)
}
