//! Labelling historical games into combos (the save-pattern path).

use serde::Serialize;
use std::collections::HashMap;

use super::matcher::combo_for;
use crate::domain::{BetTarget, GameFeatureRow, OuResult, PickSide};

/// Historical outcome columns of the training view
pub const ML_OUTCOME_COLUMN: &str = "primary_win";
pub const RL_OUTCOME_COLUMN: &str = "primary_runline_win";
pub const OU_OUTCOME_COLUMN: &str = "ou_result";

/// Totals settlement recorded on a historical row
pub fn ou_outcome(row: &GameFeatureRow) -> Option<OuResult> {
    let value = row.feature(OU_OUTCOME_COLUMN);
    match value.as_text() {
        Some(text) => OuResult::try_from(text).ok(),
        None => match value.as_bool()? {
            true => Some(OuResult::Over),
            false => Some(OuResult::Under),
        },
    }
}

/// Outcome of a historical row for a market, from the primary team's
/// perspective (`true` = primary won / covered, or the game went over).
/// `None` when the row has no usable outcome; totals pushes are `None`.
pub fn historical_outcome(row: &GameFeatureRow, target: BetTarget) -> Option<bool> {
    match target {
        BetTarget::Moneyline => row.feature(ML_OUTCOME_COLUMN).as_bool(),
        BetTarget::Runline => row.feature(RL_OUTCOME_COLUMN).as_bool(),
        BetTarget::OverUnder => match ou_outcome(row)? {
            OuResult::Over => Some(true),
            OuResult::Under => Some(false),
            OuResult::Push => None,
        },
    }
}

/// Aggregate record of one combo over history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComboStats {
    pub combo: String,
    pub games: i64,
    /// Primary wins (or overs for totals)
    pub wins: i64,
    pub losses: i64,
    pub win_pct: f64,
    pub opponent_win_pct: f64,
    pub dominant_side: PickSide,
}

impl ComboStats {
    fn from_counts(combo: String, target: BetTarget, wins: i64, losses: i64) -> Self {
        let games = wins + losses;
        let win_pct = if games > 0 {
            wins as f64 * 100.0 / games as f64
        } else {
            0.0
        };
        let opponent_win_pct = if games > 0 { 100.0 - win_pct } else { 0.0 };
        Self {
            combo,
            games,
            wins,
            losses,
            win_pct,
            opponent_win_pct,
            dominant_side: PickSide::from_win_rates(target, win_pct, opponent_win_pct),
        }
    }

    /// Edge of the dominant side over a coin flip, in percentage points
    pub fn edge(&self) -> f64 {
        self.win_pct.max(self.opponent_win_pct) - 50.0
    }
}

/// Group historical rows by combo and tally outcomes for the target market.
///
/// Rows without an outcome are left out. Results with fewer than
/// `min_games` are dropped; the rest are ordered by edge, then sample size.
pub fn discover_combos(
    rows: &[GameFeatureRow],
    features: &[String],
    target: BetTarget,
    min_games: i64,
) -> Vec<ComboStats> {
    let mut counts: HashMap<String, (i64, i64)> = HashMap::new();

    for row in rows {
        let Some(primary_won) = historical_outcome(row, target) else {
            continue;
        };
        let entry = counts.entry(combo_for(features, row)).or_insert((0, 0));
        if primary_won {
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }
    }

    let mut stats: Vec<ComboStats> = counts
        .into_iter()
        .map(|(combo, (wins, losses))| ComboStats::from_counts(combo, target, wins, losses))
        .filter(|s| s.games >= min_games.max(1))
        .collect();

    stats.sort_by(|a, b| {
        b.edge()
            .total_cmp(&a.edge())
            .then(b.games.cmp(&a.games))
            .then(a.combo.cmp(&b.combo))
    });
    stats
}

/// Stats of one specific combo over history (zero games if it never occurred)
pub fn combo_stats(
    rows: &[GameFeatureRow],
    features: &[String],
    combo: &str,
    target: BetTarget,
) -> ComboStats {
    let (mut wins, mut losses) = (0, 0);
    for row in rows {
        if combo_for(features, row) != combo {
            continue;
        }
        match historical_outcome(row, target) {
            Some(true) => wins += 1,
            Some(false) => losses += 1,
            None => {}
        }
    }
    ComboStats::from_counts(combo.to_string(), target, wins, losses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FeatureValue, SavedPattern};
    use crate::patterns::binning::BINNING_RULES_VERSION;
    use crate::patterns::matcher::find_matches;
    use chrono::Utc;
    use uuid::Uuid;

    fn row(id: &str, era: f64, outcome: FeatureValue) -> GameFeatureRow {
        let mut features = std::collections::HashMap::new();
        features.insert("home_era".to_string(), FeatureValue::Number(era));
        features.insert(ML_OUTCOME_COLUMN.to_string(), outcome.clone());
        features.insert(OU_OUTCOME_COLUMN.to_string(), outcome);
        GameFeatureRow {
            game_id: id.into(),
            game_date: None,
            primary_team: "NYY".into(),
            opponent_team: "BOS".into(),
            is_home_team: Some(true),
            features,
        }
    }

    fn history() -> Vec<GameFeatureRow> {
        vec![
            row("a", 3.0, true.into()),
            row("b", 3.1, true.into()),
            row("c", 3.3, false.into()),
            row("d", 5.0, false.into()),
            row("e", 5.2, false.into()),
            row("f", 4.0, FeatureValue::Null),
        ]
    }

    #[test]
    fn test_discover_groups_by_combo() {
        let features = vec!["home_era".to_string()];
        let stats = discover_combos(&history(), &features, BetTarget::Moneyline, 1);

        let good = stats.iter().find(|s| s.combo == "good").unwrap();
        assert_eq!((good.wins, good.losses), (2, 1));
        assert_eq!(good.dominant_side, PickSide::Primary);

        let poor = stats.iter().find(|s| s.combo == "poor").unwrap();
        assert_eq!(poor.win_pct, 0.0);
        assert_eq!(poor.dominant_side, PickSide::Opponent);

        // the null-outcome row never forms an "average" group
        assert!(stats.iter().all(|s| s.combo != "average"));
        // strongest edge first
        assert_eq!(stats[0].combo, "poor");
    }

    #[test]
    fn test_min_games_filter() {
        let features = vec!["home_era".to_string()];
        let stats = discover_combos(&history(), &features, BetTarget::Moneyline, 3);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].combo, "good");
    }

    #[test]
    fn test_totals_outcome_text_and_push() {
        let mut r = row("x", 3.0, FeatureValue::Null);
        r.features
            .insert(OU_OUTCOME_COLUMN.into(), FeatureValue::from("Over"));
        assert_eq!(historical_outcome(&r, BetTarget::OverUnder), Some(true));

        r.features
            .insert(OU_OUTCOME_COLUMN.into(), FeatureValue::from("push"));
        assert_eq!(historical_outcome(&r, BetTarget::OverUnder), None);
    }

    #[test]
    fn test_saved_combo_matches_todays_game_with_same_values() {
        let features = vec!["home_era".to_string()];
        let saved = combo_stats(&history(), &features, "good", BetTarget::Moneyline);
        assert_eq!(saved.games, 3);

        let pattern = SavedPattern {
            id: Uuid::new_v4(),
            user_id: "u".into(),
            features: features.clone(),
            combo: saved.combo.clone(),
            target: BetTarget::Moneyline,
            win_pct: saved.win_pct,
            opponent_win_pct: saved.opponent_win_pct,
            games: saved.games,
            dominant_side: Some(saved.dominant_side),
            binning_version: BINNING_RULES_VERSION,
            created_at: Utc::now(),
        };
        let today = vec![row("today", 3.0, FeatureValue::Null)];
        assert_eq!(find_matches(std::slice::from_ref(&pattern), &today).len(), 1);
    }
}
