use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Bet market a saved pattern is tracked against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetTarget {
    Moneyline,
    Runline,
    OverUnder,
}

impl BetTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            BetTarget::Moneyline => "moneyline",
            BetTarget::Runline => "runline",
            BetTarget::OverUnder => "over_under",
        }
    }
}

impl TryFrom<&str> for BetTarget {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.trim().to_ascii_lowercase().as_str() {
            "moneyline" | "ml" => Ok(BetTarget::Moneyline),
            "runline" | "rl" | "spread" => Ok(BetTarget::Runline),
            "over_under" | "ou" | "total" | "totals" => Ok(BetTarget::OverUnder),
            other => Err(format!("unknown bet target: {}", other)),
        }
    }
}

impl fmt::Display for BetTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Side a pattern predicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PickSide {
    Primary,
    Opponent,
    Over,
    Under,
}

impl PickSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            PickSide::Primary => "primary",
            PickSide::Opponent => "opponent",
            PickSide::Over => "over",
            PickSide::Under => "under",
        }
    }

    /// Whether this side can be bet on the given market
    pub fn fits(&self, target: BetTarget) -> bool {
        match target {
            BetTarget::OverUnder => matches!(self, PickSide::Over | PickSide::Under),
            BetTarget::Moneyline | BetTarget::Runline => {
                matches!(self, PickSide::Primary | PickSide::Opponent)
            }
        }
    }

    /// Side implied by historical win rates; ties go to primary/over.
    pub fn from_win_rates(target: BetTarget, win_pct: f64, opponent_win_pct: f64) -> Self {
        let first = win_pct >= opponent_win_pct;
        match (target, first) {
            (BetTarget::OverUnder, true) => PickSide::Over,
            (BetTarget::OverUnder, false) => PickSide::Under,
            (_, true) => PickSide::Primary,
            (_, false) => PickSide::Opponent,
        }
    }
}

impl TryFrom<&str> for PickSide {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.trim().to_ascii_lowercase().as_str() {
            "primary" | "team" => Ok(PickSide::Primary),
            "opponent" => Ok(PickSide::Opponent),
            "over" => Ok(PickSide::Over),
            "under" => Ok(PickSide::Under),
            other => Err(format!("unknown side: {}", other)),
        }
    }
}

impl fmt::Display for PickSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user-saved rule: ordered features plus the bin-label combination they must produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedPattern {
    pub id: Uuid,
    pub user_id: String,
    pub features: Vec<String>,
    pub combo: String,
    pub target: BetTarget,
    pub win_pct: f64,
    pub opponent_win_pct: f64,
    /// Historical sample size when the pattern was saved
    pub games: i64,
    pub dominant_side: Option<PickSide>,
    /// Version of the binning rules the combo was produced with
    pub binning_version: i32,
    pub created_at: DateTime<Utc>,
}

impl SavedPattern {
    /// The side this pattern bets: `dominant_side` when it fits the target,
    /// otherwise whichever side won more often at save time.
    pub fn predicted_side(&self) -> PickSide {
        match self.dominant_side {
            Some(side) if side.fits(self.target) => side,
            _ => PickSide::from_win_rates(self.target, self.win_pct, self.opponent_win_pct),
        }
    }
}

/// Over/under settlement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OuResult {
    Over,
    Under,
    Push,
}

impl OuResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            OuResult::Over => "over",
            OuResult::Under => "under",
            OuResult::Push => "push",
        }
    }
}

impl TryFrom<&str> for OuResult {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.trim().to_ascii_lowercase().as_str() {
            "over" | "o" | "1" => Ok(OuResult::Over),
            "under" | "u" | "0" => Ok(OuResult::Under),
            "push" | "p" => Ok(OuResult::Push),
            other => Err(format!("unknown over/under result: {}", other)),
        }
    }
}

/// Betting lines recorded for a game at match time (American odds)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BettingLines {
    pub primary_ml: Option<i32>,
    pub opponent_ml: Option<i32>,
    pub primary_rl: Option<f64>,
    pub primary_rl_price: Option<i32>,
    pub opponent_rl_price: Option<i32>,
    pub o_u_line: Option<f64>,
    pub over_price: Option<i32>,
    pub under_price: Option<i32>,
}

impl BettingLines {
    pub fn is_empty(&self) -> bool {
        *self == BettingLines::default()
    }
}

/// A game whose combo matched a saved pattern on a given date
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyMatch {
    pub pattern_id: Uuid,
    pub match_date: NaiveDate,
    pub game_id: String,
    pub primary_team: String,
    pub opponent_team: String,
    pub is_home_game: Option<bool>,
    pub lines: BettingLines,
    pub primary_ml_won: Option<bool>,
    pub primary_rl_won: Option<bool>,
    pub ou_result: Option<OuResult>,
}

impl DailyMatch {
    pub fn is_settled(&self) -> bool {
        self.primary_ml_won.is_some() || self.primary_rl_won.is_some() || self.ou_result.is_some()
    }
}

/// Match candidate returned to the caller of the daily check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternMatch {
    pub pattern_id: Uuid,
    pub combo: String,
    pub target: BetTarget,
    pub predicted_side: PickSide,
    pub game_id: String,
    pub game_date: NaiveDate,
    pub primary_team: String,
    pub opponent_team: String,
    pub is_home_game: Option<bool>,
    pub lines: BettingLines,
    /// Where the lines came from: `circa_lines`, `feature_view` or `none`
    pub lines_source: String,
}

impl PatternMatch {
    pub fn to_daily_match(&self) -> DailyMatch {
        DailyMatch {
            pattern_id: self.pattern_id,
            match_date: self.game_date,
            game_id: self.game_id.clone(),
            primary_team: self.primary_team.clone(),
            opponent_team: self.opponent_team.clone(),
            is_home_game: self.is_home_game,
            lines: self.lines.clone(),
            primary_ml_won: None,
            primary_rl_won: None,
            ou_result: None,
        }
    }
}

/// Aggregated return for one saved pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiRecord {
    pub pattern_id: Uuid,
    pub total_games: i64,
    pub wins: i64,
    pub losses: i64,
    pub total_roi: f64,
    pub avg_roi: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(target: BetTarget, dominant: Option<PickSide>, win: f64, opp: f64) -> SavedPattern {
        SavedPattern {
            id: Uuid::nil(),
            user_id: "u1".into(),
            features: vec!["home_era".into()],
            combo: "good".into(),
            target,
            win_pct: win,
            opponent_win_pct: opp,
            games: 40,
            dominant_side: dominant,
            binning_version: 1,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_predicted_side_uses_dominant_side() {
        let p = pattern(BetTarget::Moneyline, Some(PickSide::Opponent), 60.0, 40.0);
        assert_eq!(p.predicted_side(), PickSide::Opponent);
    }

    #[test]
    fn test_predicted_side_falls_back_to_win_rates() {
        let p = pattern(BetTarget::Moneyline, None, 42.0, 58.0);
        assert_eq!(p.predicted_side(), PickSide::Opponent);

        let p = pattern(BetTarget::OverUnder, None, 61.0, 39.0);
        assert_eq!(p.predicted_side(), PickSide::Over);
    }

    #[test]
    fn test_incompatible_dominant_side_is_ignored() {
        let p = pattern(BetTarget::Runline, Some(PickSide::Over), 55.0, 45.0);
        assert_eq!(p.predicted_side(), PickSide::Primary);
    }

    #[test]
    fn test_parse_target_aliases() {
        assert_eq!(BetTarget::try_from("ML").unwrap(), BetTarget::Moneyline);
        assert_eq!(BetTarget::try_from("totals").unwrap(), BetTarget::OverUnder);
        assert!(BetTarget::try_from("parlay").is_err());
    }
}
