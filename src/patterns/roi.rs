//! Per-pattern return on investment from the daily-match history.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::domain::{
    clock::eastern_date, BetTarget, DailyMatch, OuResult, PickSide, RoiRecord, SavedPattern,
};

/// Price assumed for totals when the side's price was not recorded
pub const DEFAULT_TOTALS_PRICE: i32 = -110;

/// Percentage return of a one-unit bet at American odds.
///
/// Loss is always -100. A win at `+O` returns `O`; a win at `-O` returns
/// `10000 / O`.
pub fn bet_roi(american_odds: i32, won: bool) -> f64 {
    if !won {
        return -100.0;
    }
    let odds = american_odds as f64;
    if odds > 0.0 {
        odds
    } else {
        10_000.0 / odds.abs()
    }
}

/// A settled bet derived from one daily match
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SettledBet {
    pub won: bool,
    pub price: i32,
    pub roi: f64,
}

/// Why a daily match did not count toward ROI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoOutcome,
    NoPrice,
    Push,
}

/// Settle one daily match for the given market and side.
pub fn settle(
    m: &DailyMatch,
    target: BetTarget,
    side: PickSide,
) -> Result<SettledBet, SkipReason> {
    let (won, price) = match target {
        BetTarget::Moneyline => {
            let primary_won = m.primary_ml_won.ok_or(SkipReason::NoOutcome)?;
            match side {
                PickSide::Opponent => (!primary_won, m.lines.opponent_ml),
                _ => (primary_won, m.lines.primary_ml),
            }
        }
        BetTarget::Runline => {
            let primary_covered = m.primary_rl_won.ok_or(SkipReason::NoOutcome)?;
            match side {
                PickSide::Opponent => (!primary_covered, m.lines.opponent_rl_price),
                _ => (primary_covered, m.lines.primary_rl_price),
            }
        }
        BetTarget::OverUnder => {
            let result = m.ou_result.ok_or(SkipReason::NoOutcome)?;
            if result == OuResult::Push {
                return Err(SkipReason::Push);
            }
            match side {
                PickSide::Under => (
                    result == OuResult::Under,
                    Some(m.lines.under_price.unwrap_or(DEFAULT_TOTALS_PRICE)),
                ),
                _ => (
                    result == OuResult::Over,
                    Some(m.lines.over_price.unwrap_or(DEFAULT_TOTALS_PRICE)),
                ),
            }
        }
    };

    let price = price.filter(|p| *p != 0).ok_or(SkipReason::NoPrice)?;
    Ok(SettledBet {
        won,
        price,
        roi: bet_roi(price, won),
    })
}

/// Running totals for one pattern
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RoiTally {
    pub games: i64,
    pub wins: i64,
    pub losses: i64,
    pub total_roi: f64,
    pub skipped: i64,
}

impl RoiTally {
    pub fn record(&mut self, bet: &SettledBet) {
        self.games += 1;
        if bet.won {
            self.wins += 1;
        } else {
            self.losses += 1;
        }
        self.total_roi += bet.roi;
    }

    pub fn avg_roi(&self) -> f64 {
        if self.games == 0 {
            0.0
        } else {
            self.total_roi / self.games as f64
        }
    }
}

/// First date whose matches count toward a pattern's ROI
pub fn counting_from(pattern: &SavedPattern) -> NaiveDate {
    eastern_date(pattern.created_at)
}

/// Recompute a pattern's ROI from its full match history.
///
/// Matches dated before the pattern's creation (Eastern date) are ignored,
/// as are matches missing the outcome or price for the target market.
/// The result depends only on the inputs, so re-running over an unchanged
/// history yields the same record.
pub fn calculate_roi(pattern: &SavedPattern, history: &[DailyMatch]) -> (RoiRecord, RoiTally) {
    let since = counting_from(pattern);
    let side = pattern.predicted_side();
    let mut tally = RoiTally::default();

    for m in history.iter().filter(|m| m.pattern_id == pattern.id) {
        if m.match_date < since {
            continue;
        }
        match settle(m, pattern.target, side) {
            Ok(bet) => tally.record(&bet),
            Err(reason) => {
                tally.skipped += 1;
                debug!(
                    pattern_id = %pattern.id,
                    game_id = %m.game_id,
                    ?reason,
                    "daily match not counted"
                );
            }
        }
    }

    let record = RoiRecord {
        pattern_id: pattern.id,
        total_games: tally.games,
        wins: tally.wins,
        losses: tally.losses,
        total_roi: tally.total_roi,
        avg_roi: tally.avg_roi(),
    };
    (record, tally)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BettingLines;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn pattern(target: BetTarget, side: Option<PickSide>) -> SavedPattern {
        SavedPattern {
            id: Uuid::from_u128(7),
            user_id: "u1".into(),
            features: vec!["home_era".into()],
            combo: "good".into(),
            target,
            win_pct: 60.0,
            opponent_win_pct: 40.0,
            games: 30,
            dominant_side: side,
            binning_version: 1,
            // 2024-04-01 16:00 UTC is 12:00 EDT on 2024-04-01
            created_at: Utc.with_ymd_and_hms(2024, 4, 1, 16, 0, 0).unwrap(),
        }
    }

    fn daily(day: u32, lines: BettingLines) -> DailyMatch {
        DailyMatch {
            pattern_id: Uuid::from_u128(7),
            match_date: NaiveDate::from_ymd_opt(2024, 4, day).unwrap(),
            game_id: format!("g{}", day),
            primary_team: "NYY".into(),
            opponent_team: "BOS".into(),
            is_home_game: Some(true),
            lines,
            primary_ml_won: None,
            primary_rl_won: None,
            ou_result: None,
        }
    }

    fn ml(primary: i32, opponent: i32) -> BettingLines {
        BettingLines {
            primary_ml: Some(primary),
            opponent_ml: Some(opponent),
            ..Default::default()
        }
    }

    #[test]
    fn test_bet_roi_cases() {
        assert_eq!(bet_roi(150, true), 150.0);
        assert!((bet_roi(-150, true) - 66.666_666).abs() < 1e-4);
        assert_eq!(bet_roi(150, false), -100.0);
        assert_eq!(bet_roi(-150, false), -100.0);
    }

    #[test]
    fn test_moneyline_six_and_four_at_plus_120() {
        let p = pattern(BetTarget::Moneyline, Some(PickSide::Primary));
        let history: Vec<DailyMatch> = (1..=10)
            .map(|day| {
                let mut m = daily(day, ml(120, -140));
                m.primary_ml_won = Some(day <= 6);
                m
            })
            .collect();

        let (record, tally) = calculate_roi(&p, &history);
        assert_eq!(record.total_games, 10);
        assert_eq!(record.wins, 6);
        assert_eq!(record.losses, 4);
        assert!((record.total_roi - 320.0).abs() < 1e-9);
        assert!((record.avg_roi - 32.0).abs() < 1e-9);
        assert_eq!(tally.skipped, 0);
    }

    #[test]
    fn test_opponent_side_inverts_outcome_and_price() {
        let p = pattern(BetTarget::Moneyline, Some(PickSide::Opponent));
        let mut m = daily(2, ml(-150, 130));
        m.primary_ml_won = Some(false);

        let (record, _) = calculate_roi(&p, &[m]);
        assert_eq!(record.wins, 1);
        assert_eq!(record.total_roi, 130.0);
    }

    #[test]
    fn test_rows_missing_outcome_or_price_are_skipped() {
        let p = pattern(BetTarget::Moneyline, None);
        let unsettled = daily(2, ml(110, -130));
        let mut no_price = daily(3, BettingLines::default());
        no_price.primary_ml_won = Some(true);

        let (record, tally) = calculate_roi(&p, &[unsettled, no_price]);
        assert_eq!(record.total_games, 0);
        assert_eq!(record.avg_roi, 0.0);
        assert_eq!(tally.skipped, 2);
    }

    #[test]
    fn test_matches_before_creation_are_ignored() {
        let p = pattern(BetTarget::Moneyline, None);
        let mut early = daily(1, ml(100, -120));
        early.match_date = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        early.primary_ml_won = Some(true);
        let mut same_day = daily(1, ml(100, -120));
        same_day.primary_ml_won = Some(true);

        let (record, _) = calculate_roi(&p, &[early, same_day]);
        assert_eq!(record.total_games, 1);
    }

    #[test]
    fn test_totals_default_to_minus_110() {
        let p = pattern(BetTarget::OverUnder, Some(PickSide::Under));
        let mut m = daily(4, BettingLines::default());
        m.ou_result = Some(OuResult::Under);

        let (record, _) = calculate_roi(&p, &[m]);
        assert_eq!(record.wins, 1);
        assert!((record.total_roi - 10_000.0 / 110.0).abs() < 1e-9);
    }

    #[test]
    fn test_totals_push_is_not_counted() {
        let p = pattern(BetTarget::OverUnder, None);
        let mut m = daily(4, BettingLines::default());
        m.ou_result = Some(OuResult::Push);

        let (record, tally) = calculate_roi(&p, &[m]);
        assert_eq!(record.total_games, 0);
        assert_eq!(tally.skipped, 1);
    }

    #[test]
    fn test_runline_uses_rl_prices() {
        let p = pattern(BetTarget::Runline, None);
        let mut m = daily(5, BettingLines {
            primary_rl: Some(-1.5),
            primary_rl_price: Some(145),
            opponent_rl_price: Some(-165),
            ..Default::default()
        });
        m.primary_rl_won = Some(true);

        let (record, _) = calculate_roi(&p, &[m]);
        assert_eq!(record.total_roi, 145.0);
    }

    #[test]
    fn test_recalculation_is_idempotent() {
        let p = pattern(BetTarget::Moneyline, None);
        let history: Vec<DailyMatch> = (2..=8)
            .map(|day| {
                let mut m = daily(day, ml(-125, 105));
                m.primary_ml_won = Some(day % 3 != 0);
                m
            })
            .collect();

        let (first, _) = calculate_roi(&p, &history);
        let (second, _) = calculate_roi(&p, &history);
        assert_eq!(first, second);
    }
}
