use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

/// Profile tag that makes a question visible to every profile.
pub const ALL_PROFILES: &str = "all";

pub const MIN_WEIGHT: u8 = 1;
pub const MAX_WEIGHT: u8 = 5;

/// A single weighted yes/no question. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Question {
    pub id: String,
    pub theme: String,
    pub profiles: BTreeSet<String>,
    #[serde(rename = "question")]
    pub text: String,
    pub weight: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Question {
    /// Whether a respondent with `profile` is shown this question.
    pub fn is_visible_to(&self, profile: &str) -> bool {
        self.profiles.contains(profile) || self.profiles.contains(ALL_PROFILES)
    }

    /// Validate a raw JSON question definition.
    ///
    /// Requires a string `id`, `theme` and `question`, a `profiles` array of
    /// strings and a whole-number `weight` within [`MIN_WEIGHT`, `MAX_WEIGHT`].
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let obj = value.as_object().ok_or("not a JSON object")?;

        let string_field = |key: &str| -> Result<String, String> {
            obj.get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| format!("missing or non-string '{key}'"))
        };

        let id = string_field("id")?;
        if id.trim().is_empty() {
            return Err("empty 'id'".to_string());
        }
        let theme = string_field("theme")?;
        let text = string_field("question")?;

        let profiles = obj
            .get("profiles")
            .and_then(Value::as_array)
            .ok_or("missing or non-array 'profiles'")?
            .iter()
            .map(|p| {
                p.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| "non-string entry in 'profiles'".to_string())
            })
            .collect::<Result<BTreeSet<_>, _>>()?;

        let raw_weight = obj
            .get("weight")
            .and_then(Value::as_f64)
            .ok_or("missing or non-numeric 'weight'")?;
        if raw_weight.fract() != 0.0
            || raw_weight < f64::from(MIN_WEIGHT)
            || raw_weight > f64::from(MAX_WEIGHT)
        {
            return Err(format!(
                "weight {raw_weight} is outside [{MIN_WEIGHT}, {MAX_WEIGHT}]"
            ));
        }

        let category = obj
            .get("category")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self {
            id,
            theme,
            profiles,
            text,
            weight: raw_weight as u8,
            category,
        })
    }
}
