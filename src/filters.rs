//! Operator-prefixed filters over training and today's feature rows.
//!
//! A filter map is `field -> value`, where the value string may carry an
//! operator prefix: `gt:`, `gte:`, `lt:`, `lte:`, `between:min,max`.
//! A comma-separated value becomes an `IN` list, anything else is equality.
//! The same filters compile to a parameterized SQL `WHERE` clause and
//! evaluate in memory against [`GameFeatureRow`]s.

use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::{Postgres, QueryBuilder};

use crate::domain::{BetTarget, FeatureValue, GameFeatureRow, PickSide};
use crate::error::{Result, SharplineError};
use crate::patterns::discovery::historical_outcome;
use crate::validation::validate_identifier;

/// A literal on the right-hand side of a filter
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl FilterValue {
    fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.to_ascii_lowercase().as_str() {
            "true" => return FilterValue::Bool(true),
            "false" => return FilterValue::Bool(false),
            _ => {}
        }
        match raw.parse::<f64>() {
            Ok(n) if n.is_finite() => FilterValue::Number(n),
            _ => FilterValue::Text(raw.to_string()),
        }
    }

    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(FilterValue::Bool(*b)),
            Value::Number(n) => n.as_f64().map(FilterValue::Number),
            Value::String(s) => Some(FilterValue::parse(s)),
            _ => None,
        }
    }

    fn matches(&self, actual: &FeatureValue) -> bool {
        match self {
            FilterValue::Number(n) => actual.as_f64().is_some_and(|v| v == *n),
            FilterValue::Bool(b) => actual.as_bool() == Some(*b),
            FilterValue::Text(t) => match actual {
                FeatureValue::Null => false,
                other => other.to_string().eq_ignore_ascii_case(t),
            },
        }
    }
}

/// Comparison applied to one column
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    Eq(FilterValue),
    Gt(f64),
    Gte(f64),
    Lt(f64),
    Lte(f64),
    Between(f64, f64),
    In(Vec<FilterValue>),
}

/// One validated `field <op> value` condition
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
}

fn parse_bound(field: &str, raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| {
            SharplineError::invalid_filter(field, format!("expected a number, got {:?}", raw))
        })
}

/// Parse one filter value string for `field`.
pub fn parse_filter(field: &str, raw: &str) -> Result<Filter> {
    validate_identifier(field, "filter field")
        .map_err(|_| SharplineError::invalid_filter(field, "not a plain column name"))?;

    let raw = raw.trim();
    if raw.is_empty() {
        return Err(SharplineError::invalid_filter(field, "empty value"));
    }

    let op = if let Some(rest) = raw.strip_prefix("gte:") {
        FilterOp::Gte(parse_bound(field, rest)?)
    } else if let Some(rest) = raw.strip_prefix("gt:") {
        FilterOp::Gt(parse_bound(field, rest)?)
    } else if let Some(rest) = raw.strip_prefix("lte:") {
        FilterOp::Lte(parse_bound(field, rest)?)
    } else if let Some(rest) = raw.strip_prefix("lt:") {
        FilterOp::Lt(parse_bound(field, rest)?)
    } else if let Some(rest) = raw.strip_prefix("between:") {
        let (lo, hi) = rest.split_once(',').ok_or_else(|| {
            SharplineError::invalid_filter(field, "between needs min,max")
        })?;
        let (lo, hi) = (parse_bound(field, lo)?, parse_bound(field, hi)?);
        if lo > hi {
            return Err(SharplineError::invalid_filter(
                field,
                format!("between bounds reversed: {} > {}", lo, hi),
            ));
        }
        FilterOp::Between(lo, hi)
    } else if raw.contains(',') {
        let items: Vec<FilterValue> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(FilterValue::parse)
            .collect();
        if items.is_empty() {
            return Err(SharplineError::invalid_filter(field, "empty list"));
        }
        FilterOp::In(items)
    } else {
        FilterOp::Eq(FilterValue::parse(raw))
    };

    Ok(Filter {
        field: field.to_string(),
        op,
    })
}

impl Filter {
    /// Evaluate against an in-memory row. Missing or null columns never match.
    pub fn matches(&self, row: &GameFeatureRow) -> bool {
        let actual = row.feature(&self.field);
        if actual.is_null() {
            return false;
        }
        let num = || actual.as_f64();
        match &self.op {
            FilterOp::Eq(v) => v.matches(actual),
            FilterOp::Gt(b) => num().is_some_and(|n| n > *b),
            FilterOp::Gte(b) => num().is_some_and(|n| n >= *b),
            FilterOp::Lt(b) => num().is_some_and(|n| n < *b),
            FilterOp::Lte(b) => num().is_some_and(|n| n <= *b),
            FilterOp::Between(lo, hi) => num().is_some_and(|n| n >= *lo && n <= *hi),
            FilterOp::In(items) => items.iter().any(|v| v.matches(actual)),
        }
    }

    fn push_sql(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        let num = numeric_expr(&self.field);
        match &self.op {
            FilterOp::Eq(FilterValue::Number(n)) => {
                qb.push(format!("{} = ", num)).push_bind(*n);
            }
            FilterOp::Eq(FilterValue::Bool(b)) => {
                qb.push(format!("{} = ", boolean_expr(&self.field))).push_bind(*b);
            }
            FilterOp::Eq(FilterValue::Text(t)) => {
                qb.push(format!("lower({}) = lower(", text_expr(&self.field)))
                    .push_bind(t.clone())
                    .push(")");
            }
            FilterOp::Gt(b) => {
                qb.push(format!("{} > ", num)).push_bind(*b);
            }
            FilterOp::Gte(b) => {
                qb.push(format!("{} >= ", num)).push_bind(*b);
            }
            FilterOp::Lt(b) => {
                qb.push(format!("{} < ", num)).push_bind(*b);
            }
            FilterOp::Lte(b) => {
                qb.push(format!("{} <= ", num)).push_bind(*b);
            }
            FilterOp::Between(lo, hi) => {
                qb.push(format!("{} BETWEEN ", num))
                    .push_bind(*lo)
                    .push(" AND ")
                    .push_bind(*hi);
            }
            FilterOp::In(items) => {
                let numbers: Option<Vec<f64>> = items
                    .iter()
                    .map(|v| match v {
                        FilterValue::Number(n) => Some(*n),
                        _ => None,
                    })
                    .collect();
                match numbers {
                    Some(numbers) => {
                        qb.push(format!("{} = ANY(", num))
                            .push_bind(numbers)
                            .push(")");
                    }
                    None => {
                        let texts: Vec<String> = items
                            .iter()
                            .map(|v| match v {
                                FilterValue::Number(n) => FeatureValue::Number(*n).to_string(),
                                FilterValue::Bool(b) => b.to_string(),
                                FilterValue::Text(t) => t.to_lowercase(),
                            })
                            .collect();
                        qb.push(format!("lower({}) = ANY(", text_expr(&self.field)))
                            .push_bind(texts)
                            .push(")");
                    }
                }
            }
        }
    }
}

// Columns are read through `to_jsonb(v)` so any column type compares
// without a cast error. `field` is a validated identifier.
fn text_expr(field: &str) -> String {
    format!("(to_jsonb(v)->>'{}')", field)
}

/// Number view of a column: booleans as 1/0, numeric text parsed, anything
/// else NULL (never matches).
fn numeric_expr(field: &str) -> String {
    let t = text_expr(field);
    format!(
        "(CASE WHEN {t} = 'true' THEN 1.0::double precision \
         WHEN {t} = 'false' THEN 0.0::double precision \
         WHEN btrim({t}) ~ '^[-+]?([0-9]+\\.?[0-9]*|\\.[0-9]+)([eE][-+]?[0-9]+)?$' \
         THEN btrim({t})::double precision END)",
        t = t
    )
}

/// Boolean view of a column: the usual spellings plus 1/0.
fn boolean_expr(field: &str) -> String {
    let t = text_expr(field);
    format!(
        "(CASE WHEN lower(btrim({t})) IN ('true', 't', 'yes', 'y') THEN true \
         WHEN lower(btrim({t})) IN ('false', 'f', 'no', 'n') THEN false \
         WHEN {n} = 1 THEN true \
         WHEN {n} = 0 THEN false END)",
        t = t,
        n = numeric_expr(field)
    )
}

/// A conjunction of filters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet {
    pub filters: Vec<Filter>,
}

impl FilterSet {
    /// Build from a JSON object of `field -> value`.
    ///
    /// Values may be strings (with operator prefixes), numbers, booleans,
    /// or arrays (an `IN` list). Null and empty-string values are ignored.
    pub fn from_json_map(map: &Map<String, Value>) -> Result<Self> {
        let mut filters = Vec::with_capacity(map.len());
        // deterministic SQL text
        let mut keys: Vec<&String> = map.keys().collect();
        keys.sort();

        for field in keys {
            let value = &map[field];
            let filter = match value {
                Value::Null => continue,
                Value::String(s) if s.trim().is_empty() => continue,
                Value::String(s) => parse_filter(field, s)?,
                Value::Array(items) => {
                    validate_identifier(field, "filter field").map_err(|_| {
                        SharplineError::invalid_filter(field.as_str(), "not a plain column name")
                    })?;
                    let values: Vec<FilterValue> = items
                        .iter()
                        .map(|v| {
                            FilterValue::from_json(v).ok_or_else(|| {
                                SharplineError::invalid_filter(
                                    field.as_str(),
                                    "list items must be scalars",
                                )
                            })
                        })
                        .collect::<Result<_>>()?;
                    if values.is_empty() {
                        continue;
                    }
                    Filter {
                        field: field.clone(),
                        op: FilterOp::In(values),
                    }
                }
                Value::Object(_) => {
                    return Err(SharplineError::invalid_filter(
                        field.as_str(),
                        "nested objects are not supported",
                    ))
                }
                scalar => {
                    validate_identifier(field, "filter field").map_err(|_| {
                        SharplineError::invalid_filter(field.as_str(), "not a plain column name")
                    })?;
                    let v = FilterValue::from_json(scalar).ok_or_else(|| {
                        SharplineError::invalid_filter(field.as_str(), "unsupported value")
                    })?;
                    Filter {
                        field: field.clone(),
                        op: FilterOp::Eq(v),
                    }
                }
            };
            filters.push(filter);
        }

        Ok(Self { filters })
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn matches(&self, row: &GameFeatureRow) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }

    /// Append ` AND <cond>` for every filter. The builder must already hold
    /// a `WHERE` clause (e.g. `WHERE 1=1`) over rows aliased `v`.
    pub fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        for filter in &self.filters {
            qb.push(" AND ");
            filter.push_sql(qb);
        }
    }
}

fn pct(hits: i64, total: i64) -> Option<f64> {
    (total > 0).then(|| hits as f64 * 100.0 / total as f64)
}

/// Aggregate outcome rates for a filtered row set
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingSummary {
    pub games: usize,
    pub ml_games: i64,
    pub ml_win_pct: Option<f64>,
    pub rl_games: i64,
    pub rl_cover_pct: Option<f64>,
    pub ou_games: i64,
    pub over_pct: Option<f64>,
    pub under_pct: Option<f64>,
    pub dominant_ml_side: Option<PickSide>,
}

impl TrainingSummary {
    pub fn from_rows(rows: &[GameFeatureRow]) -> Self {
        let tally = |target| {
            rows.iter()
                .filter_map(|r| historical_outcome(r, target))
                .fold((0i64, 0i64), |(hit, n), won| (hit + won as i64, n + 1))
        };
        let (ml_wins, ml_games) = tally(BetTarget::Moneyline);
        let (rl_covers, rl_games) = tally(BetTarget::Runline);
        let (overs, ou_games) = tally(BetTarget::OverUnder);

        let ml_win_pct = pct(ml_wins, ml_games);
        Self {
            games: rows.len(),
            ml_games,
            ml_win_pct,
            rl_games,
            rl_cover_pct: pct(rl_covers, rl_games),
            ou_games,
            over_pct: pct(overs, ou_games),
            under_pct: pct(ou_games - overs, ou_games),
            dominant_ml_side: ml_win_pct
                .map(|w| PickSide::from_win_rates(BetTarget::Moneyline, w, 100.0 - w)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn row(features: &[(&str, FeatureValue)]) -> GameFeatureRow {
        GameFeatureRow {
            game_id: "g1".into(),
            game_date: None,
            primary_team: "NYY".into(),
            opponent_team: "BOS".into(),
            is_home_team: Some(true),
            features: features
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn test_parse_operators() {
        assert_eq!(parse_filter("era", "gt:3.5").unwrap().op, FilterOp::Gt(3.5));
        assert_eq!(parse_filter("era", "gte:3").unwrap().op, FilterOp::Gte(3.0));
        assert_eq!(parse_filter("era", "lt:4").unwrap().op, FilterOp::Lt(4.0));
        assert_eq!(parse_filter("era", "lte:4").unwrap().op, FilterOp::Lte(4.0));
        assert_eq!(
            parse_filter("era", "between:3,4.5").unwrap().op,
            FilterOp::Between(3.0, 4.5)
        );
        assert_eq!(
            parse_filter("team", "NYY, BOS").unwrap().op,
            FilterOp::In(vec![
                FilterValue::Text("NYY".into()),
                FilterValue::Text("BOS".into())
            ])
        );
        assert_eq!(
            parse_filter("is_home_team", "true").unwrap().op,
            FilterOp::Eq(FilterValue::Bool(true))
        );
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(parse_filter("era; drop table x", "1").is_err());
        assert!(parse_filter("ERA", "1").is_err());
        assert!(parse_filter("era", "gt:abc").is_err());
        assert!(parse_filter("era", "between:5").is_err());
        assert!(parse_filter("era", "between:5,1").is_err());
        let err = parse_filter("era", "  ").unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_in_memory_matching() {
        let r = row(&[
            ("home_era", 3.2.into()),
            ("hand", "L".into()),
            ("is_home_team", true.into()),
        ]);
        assert!(parse_filter("home_era", "between:3,3.5").unwrap().matches(&r));
        assert!(!parse_filter("home_era", "gt:3.2").unwrap().matches(&r));
        assert!(parse_filter("hand", "l").unwrap().matches(&r));
        assert!(parse_filter("hand", "R,L").unwrap().matches(&r));
        assert!(parse_filter("is_home_team", "true").unwrap().matches(&r));
        assert!(!parse_filter("missing", "1").unwrap().matches(&r));
    }

    #[test]
    fn test_from_json_map() {
        let map = json!({
            "home_era": "lt:4",
            "o_u_line": 8.5,
            "hand": ["L", "R"],
            "ignored": null,
            "blank": ""
        });
        let set = FilterSet::from_json_map(map.as_object().unwrap()).unwrap();
        assert_eq!(set.filters.len(), 3);
        // sorted by field
        assert_eq!(set.filters[0].field, "hand");

        let r = row(&[
            ("home_era", 3.9.into()),
            ("o_u_line", 8.5.into()),
            ("hand", "R".into()),
        ]);
        assert!(set.matches(&r));

        let bad = json!({"x\"": "1"});
        assert!(FilterSet::from_json_map(bad.as_object().unwrap()).is_err());
    }

    #[test]
    fn test_sql_is_parameterized() {
        let map = json!({"home_era": "between:3,4", "team": "NYY,BOS", "o_u_line": "8.5"});
        let set = FilterSet::from_json_map(map.as_object().unwrap()).unwrap();
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM t v WHERE 1=1");
        set.push_where(&mut qb);
        let sql = qb.sql();
        assert!(sql.contains(&format!("{} BETWEEN $1 AND $2", numeric_expr("home_era"))));
        assert!(sql.contains(&format!("{} = $3", numeric_expr("o_u_line"))));
        assert!(sql.contains("lower((to_jsonb(v)->>'team')) = ANY($4)"));
        assert!(!sql.contains("NYY"));
    }

    #[test]
    fn test_sql_never_casts_columns_directly() {
        let map = json!({"is_home_team": "1", "won": true, "home_rest": "gt:0"});
        let set = FilterSet::from_json_map(map.as_object().unwrap()).unwrap();
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM t v WHERE 1=1");
        set.push_where(&mut qb);
        let sql = qb.sql();
        assert!(!sql.contains("\"is_home_team\")::double precision"));
        assert!(!sql.contains("\"won\")::boolean"));
        assert!(sql.contains("to_jsonb(v)->>'is_home_team') = 'true' THEN 1.0"));
        assert!(sql.contains(&format!("{} > $", numeric_expr("home_rest"))));

        // the in-memory path agrees on a boolean column compared as a number
        let row = row(&[("is_home_team", FeatureValue::Bool(true))]);
        assert!(parse_filter("is_home_team", "1").unwrap().matches(&row));
        assert!(parse_filter("is_home_team", "gt:0").unwrap().matches(&row));
    }

    #[test]
    fn test_training_summary() {
        let rows = vec![
            row(&[("primary_win", true.into()), ("ou_result", "over".into())]),
            row(&[("primary_win", true.into()), ("ou_result", "under".into())]),
            row(&[("primary_win", false.into()), ("ou_result", "over".into())]),
            row(&[("primary_win", FeatureValue::Null)]),
        ];
        let s = TrainingSummary::from_rows(&rows);
        assert_eq!(s.games, 4);
        assert_eq!(s.ml_games, 3);
        assert!((s.ml_win_pct.unwrap() - 66.666_666).abs() < 1e-4);
        assert_eq!(s.rl_games, 0);
        assert_eq!(s.rl_cover_pct, None);
        assert_eq!(s.ou_games, 3);
        assert_eq!(s.dominant_ml_side, Some(PickSide::Primary));
    }
}
