//! Feature binning: raw pre-game values to small categorical labels.
//!
//! The same rule table labels historical rows when a pattern is saved and
//! today's rows when patterns are matched. Any change to a threshold or to
//! rule precedence changes combos, so it must come with a bump of
//! [`BINNING_RULES_VERSION`]; patterns saved under another version are not
//! matched.

use crate::domain::FeatureValue;

/// Version of the rule table below. Stored with every saved pattern.
pub const BINNING_RULES_VERSION: i32 = 1;

/// Label for a missing value
pub const NULL_LABEL: &str = "null";

/// Separator between labels in a combo string
pub const COMBO_SEPARATOR: &str = "|";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameMatch {
    Exact(&'static str),
    Contains(&'static str),
}

impl NameMatch {
    fn matches(&self, name: &str) -> bool {
        match self {
            NameMatch::Exact(s) => name == *s,
            NameMatch::Contains(s) => name.contains(s),
        }
    }
}

/// Label rule for one feature family
#[derive(Debug, Clone, Copy, PartialEq)]
enum BinRule {
    /// Sign of the run line: favorite / pick / underdog
    RunLine,
    /// `< low` → first label, `<= high` → second, else third
    Ascending {
        low: f64,
        high: f64,
        labels: [&'static str; 3],
    },
    /// `>= high` → first label, `>= low` → second, else third
    Descending {
        high: f64,
        low: f64,
        labels: [&'static str; 3],
    },
    /// Like `Descending` but values above 1.0 are read as percentages
    Rate { high: f64, low: f64 },
    /// `>= hot` hot, `<= cold` cold, else neutral
    Streak { hot: f64, cold: f64 },
    /// `>= threshold` hot, else cold
    Recent { threshold: f64 },
    /// Booleans to yes/no, handedness strings to L/R
    Flag,
}

/// Rules in precedence order: exact names first, then substring families.
/// `handle` must precede `hand`, `whip` must precede `era`.
const RULES: &[(NameMatch, BinRule)] = &[
    (NameMatch::Exact("primary_rl"), BinRule::RunLine),
    (
        NameMatch::Exact("o_u_line"),
        BinRule::Ascending {
            low: 8.0,
            high: 9.0,
            labels: ["low", "medium", "high"],
        },
    ),
    (NameMatch::Contains("last_3"), BinRule::Recent { threshold: 2.0 }),
    (
        NameMatch::Contains("whip"),
        BinRule::Ascending {
            low: 1.20,
            high: 1.35,
            labels: ["good", "average", "poor"],
        },
    ),
    (
        NameMatch::Contains("era"),
        BinRule::Ascending {
            low: 3.50,
            high: 4.50,
            labels: ["good", "average", "poor"],
        },
    ),
    (NameMatch::Contains("win_pct"), BinRule::Rate { high: 0.55, low: 0.45 }),
    (
        NameMatch::Contains("ops"),
        BinRule::Descending {
            high: 0.760,
            low: 0.700,
            labels: ["good", "average", "poor"],
        },
    ),
    (NameMatch::Contains("streak"), BinRule::Streak { hot: 3.0, cold: -3.0 }),
    (
        NameMatch::Contains("last_runs"),
        BinRule::Descending {
            high: 6.0,
            low: 3.0,
            labels: ["high", "medium", "low"],
        },
    ),
    (
        NameMatch::Contains("handle"),
        BinRule::Descending {
            high: 60.0,
            low: 40.0,
            labels: ["heavy", "balanced", "light"],
        },
    ),
    (
        NameMatch::Contains("bets"),
        BinRule::Descending {
            high: 60.0,
            low: 40.0,
            labels: ["heavy", "balanced", "light"],
        },
    ),
    (NameMatch::Contains("hand"), BinRule::Flag),
    (NameMatch::Contains("is_"), BinRule::Flag),
    (NameMatch::Contains("_flag"), BinRule::Flag),
];

fn rule_for(feature: &str) -> Option<BinRule> {
    RULES
        .iter()
        .find(|(m, _)| m.matches(feature))
        .map(|(_, rule)| *rule)
}

impl BinRule {
    /// Label for a non-null value, or `None` when the value does not fit the rule
    fn label(&self, value: &FeatureValue) -> Option<String> {
        match self {
            BinRule::Flag => flag_label(value),
            rule => {
                let v = value.as_f64().filter(|v| v.is_finite())?;
                rule.numeric_label(v).map(str::to_string)
            }
        }
    }

    fn numeric_label(&self, v: f64) -> Option<&'static str> {
        let label = match *self {
            BinRule::RunLine => {
                if v < 0.0 {
                    "favorite"
                } else if v > 0.0 {
                    "underdog"
                } else {
                    "pick"
                }
            }
            BinRule::Ascending { low, high, labels } => {
                if v < low {
                    labels[0]
                } else if v <= high {
                    labels[1]
                } else {
                    labels[2]
                }
            }
            BinRule::Descending { high, low, labels } => descending(v, high, low, labels),
            BinRule::Rate { high, low } => {
                let rate = if v > 1.0 { v / 100.0 } else { v };
                descending(rate, high, low, ["good", "average", "poor"])
            }
            BinRule::Streak { hot, cold } => {
                if v >= hot {
                    "hot"
                } else if v <= cold {
                    "cold"
                } else {
                    "neutral"
                }
            }
            BinRule::Recent { threshold } => {
                if v >= threshold {
                    "hot"
                } else {
                    "cold"
                }
            }
            BinRule::Flag => return None,
        };
        Some(label)
    }
}

fn descending(v: f64, high: f64, low: f64, labels: [&'static str; 3]) -> &'static str {
    if v >= high {
        labels[0]
    } else if v >= low {
        labels[1]
    } else {
        labels[2]
    }
}

fn flag_label(value: &FeatureValue) -> Option<String> {
    if let Some(text) = value.as_text() {
        let upper = text.trim().to_ascii_uppercase();
        match upper.as_str() {
            "L" | "LEFT" | "LHP" => return Some("L".to_string()),
            "R" | "RIGHT" | "RHP" => return Some("R".to_string()),
            _ => {}
        }
    }
    value
        .as_bool()
        .map(|b| if b { "yes" } else { "no" }.to_string())
}

/// Map a feature value to its bin label.
///
/// Null always yields `"null"`. Values outside every rule family (or not
/// readable by their family's rule) keep their display form.
pub fn bin_feature(feature: &str, value: &FeatureValue) -> String {
    if value.is_null() {
        return NULL_LABEL.to_string();
    }

    rule_for(feature)
        .and_then(|rule| rule.label(value))
        .unwrap_or_else(|| value.to_string())
}

/// Join labels into the combo key used for matching
pub fn join_combo<I, S>(labels: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    labels
        .into_iter()
        .map(|s| s.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(COMBO_SEPARATOR)
}
