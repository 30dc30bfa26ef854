use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

/// A raw pre-game feature value as it comes out of the database views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Null,
}

impl FeatureValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FeatureValue::Null)
    }

    /// Numeric view of the value. Numeric strings parse; booleans count as 1/0.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Number(n) => Some(*n),
            FeatureValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            FeatureValue::Text(s) => s.trim().parse::<f64>().ok(),
            FeatureValue::Null => None,
        }
    }

    /// Boolean view of the value. Accepts 0/1 and the usual spellings.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FeatureValue::Bool(b) => Some(*b),
            FeatureValue::Number(n) if *n == 1.0 => Some(true),
            FeatureValue::Number(n) if *n == 0.0 => Some(false),
            FeatureValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "yes" | "y" | "1" => Some(true),
                "false" | "f" | "no" | "n" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FeatureValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => FeatureValue::Null,
            Value::Bool(b) => FeatureValue::Bool(*b),
            Value::Number(n) => n.as_f64().map(FeatureValue::Number).unwrap_or(FeatureValue::Null),
            Value::String(s) => FeatureValue::Text(s.clone()),
            other => FeatureValue::Text(other.to_string()),
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Bool(b) => write!(f, "{}", b),
            FeatureValue::Number(n) => write!(f, "{}", n),
            FeatureValue::Text(s) => write!(f, "{}", s),
            FeatureValue::Null => write!(f, "null"),
        }
    }
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        FeatureValue::Number(v)
    }
}

impl From<bool> for FeatureValue {
    fn from(v: bool) -> Self {
        FeatureValue::Bool(v)
    }
}

impl From<&str> for FeatureValue {
    fn from(v: &str) -> Self {
        FeatureValue::Text(v.to_string())
    }
}

static NULL_VALUE: FeatureValue = FeatureValue::Null;

/// One team-perspective game row from a feature view.
///
/// Identity columns are lifted out; every column (identity included) stays
/// available in `features` so patterns can reference any of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameFeatureRow {
    pub game_id: String,
    pub game_date: Option<NaiveDate>,
    pub primary_team: String,
    pub opponent_team: String,
    pub is_home_team: Option<bool>,
    pub features: HashMap<String, FeatureValue>,
}

impl GameFeatureRow {
    /// Build a row from a `to_jsonb(view_row)` object.
    ///
    /// Game identity prefers `training_key` and falls back to `unique_id`.
    /// Returns `None` when neither is present.
    pub fn from_json_row(row: &Map<String, Value>) -> Option<Self> {
        let text = |key: &str| -> Option<String> {
            match row.get(key)? {
                Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }
        };

        let game_id = match text("training_key") {
            Some(key) => key,
            None => {
                let fallback = text("unique_id")?;
                warn!(unique_id = %fallback, "feature row has no training_key, using unique_id");
                fallback
            }
        };

        let game_date = text("game_date")
            .and_then(|d| NaiveDate::parse_from_str(d.get(..10).unwrap_or(d.as_str()), "%Y-%m-%d").ok());

        let features: HashMap<String, FeatureValue> = row
            .iter()
            .map(|(k, v)| (k.clone(), FeatureValue::from_json(v)))
            .collect();

        let is_home_team = features.get("is_home_team").and_then(FeatureValue::as_bool);

        Some(Self {
            game_id,
            game_date,
            primary_team: text("primary_team").unwrap_or_default(),
            opponent_team: text("opponent_team").unwrap_or_default(),
            is_home_team,
            features,
        })
    }

    /// Feature lookup; absent columns read as null.
    pub fn feature(&self, name: &str) -> &FeatureValue {
        self.features.get(name).unwrap_or(&NULL_VALUE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_row_prefers_training_key() {
        let row = obj(json!({
            "training_key": "2024-05-01_NYY_BOS",
            "unique_id": "abc",
            "game_date": "2024-05-01",
            "primary_team": "NYY",
            "opponent_team": "BOS",
            "is_home_team": 1,
            "home_era": 3.2
        }));

        let parsed = GameFeatureRow::from_json_row(&row).unwrap();
        assert_eq!(parsed.game_id, "2024-05-01_NYY_BOS");
        assert_eq!(parsed.game_date, NaiveDate::from_ymd_opt(2024, 5, 1));
        assert_eq!(parsed.is_home_team, Some(true));
        assert_eq!(parsed.feature("home_era"), &FeatureValue::Number(3.2));
    }

    #[test]
    fn test_row_falls_back_to_unique_id() {
        let row = obj(json!({ "unique_id": "g-17", "primary_team": "LAD" }));
        let parsed = GameFeatureRow::from_json_row(&row).unwrap();
        assert_eq!(parsed.game_id, "g-17");
        assert!(parsed.feature("missing").is_null());
    }

    #[test]
    fn test_row_without_identity_is_dropped() {
        let row = obj(json!({ "primary_team": "LAD" }));
        assert!(GameFeatureRow::from_json_row(&row).is_none());
    }

    #[test]
    fn test_timestamp_game_date_is_truncated() {
        let row = obj(json!({ "unique_id": "g", "game_date": "2024-05-01T00:00:00" }));
        let parsed = GameFeatureRow::from_json_row(&row).unwrap();
        assert_eq!(parsed.game_date, NaiveDate::from_ymd_opt(2024, 5, 1));
    }

    #[test]
    fn test_value_coercions() {
        assert_eq!(FeatureValue::from("3.5").as_f64(), Some(3.5));
        assert_eq!(FeatureValue::from("yes").as_bool(), Some(true));
        assert_eq!(FeatureValue::Number(0.0).as_bool(), Some(false));
        assert_eq!(FeatureValue::Number(2.0).as_bool(), None);
        assert_eq!(FeatureValue::Null.as_f64(), None);
        assert_eq!(FeatureValue::Number(3.0).to_string(), "3");
    }
}
