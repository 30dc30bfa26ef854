//! Situational trend scoring for matchup ordering.
//!
//! Two heuristics rank today's matchups for display:
//!
//! - **O/U consensus strength**: situations where both teams lean the same
//!   way on totals, weighted by how much history backs the lean.
//! - **ATS dominance**: situations where one team covers far more often
//!   than the other.
//!
//! Neither score is normalized or bounded. They only order a list; a
//! matchup scoring 400 is not "twice as likely" as one scoring 200, and a
//! single strong situation can outrank several weak ones.

use serde::{Deserialize, Serialize};

/// Percentage a lean must exceed for both teams
pub const OU_LEAN_THRESHOLD: f64 = 55.0;
/// Cover-percentage gap that counts as a mismatch
pub const ATS_GAP_THRESHOLD: f64 = 10.0;
/// Minimum games behind a situational percentage
pub const MIN_SITUATION_GAMES: u32 = 5;

/// Situation categories tracked per team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Situation {
    /// After a win / after a loss
    LastGame,
    /// As favorite / as underdog
    FavDog,
    /// Home favorite, road underdog, ...
    SideFavDog,
    /// Days of rest bucket
    RestBucket,
    /// Rest advantage versus the opponent
    RestComp,
}

impl Situation {
    pub const ALL: [Situation; 5] = [
        Situation::LastGame,
        Situation::FavDog,
        Situation::SideFavDog,
        Situation::RestBucket,
        Situation::RestComp,
    ];

    /// Column prefix in the situational trend views
    pub fn prefix(&self) -> &'static str {
        match self {
            Situation::LastGame => "last_game",
            Situation::FavDog => "fav_dog",
            Situation::SideFavDog => "side_fav_dog",
            Situation::RestBucket => "rest_bucket",
            Situation::RestComp => "rest_comp",
        }
    }
}

/// Win/loss tally parsed from a record string
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecordTally {
    pub wins: u32,
    pub losses: u32,
    pub total: u32,
}

/// Parse `"W-L"` (or `"W-L-P"`) into a tally. Pushes do not count as games.
///
/// Anything malformed, empty or missing yields zero games, which keeps the
/// situation below the sample-size threshold.
pub fn parse_record(record: Option<&str>) -> RecordTally {
    let Some(raw) = record.map(str::trim).filter(|s| !s.is_empty()) else {
        return RecordTally::default();
    };

    let parts: Vec<&str> = raw.split('-').map(str::trim).collect();
    if parts.len() < 2 || parts.len() > 3 {
        return RecordTally::default();
    }

    match (parts[0].parse::<u32>(), parts[1].parse::<u32>()) {
        (Ok(wins), Ok(losses)) => {
            if parts.len() == 3 && parts[2].parse::<u32>().is_err() {
                return RecordTally::default();
            }
            RecordTally {
                wins,
                losses,
                total: wins.saturating_add(losses),
            }
        }
        _ => RecordTally::default(),
    }
}

/// One team's numbers in one situation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SituationLine {
    pub over_pct: Option<f64>,
    pub under_pct: Option<f64>,
    pub ou_record: Option<String>,
    pub cover_pct: Option<f64>,
    pub ats_record: Option<String>,
}

impl SituationLine {
    pub fn ou_games(&self) -> u32 {
        parse_record(self.ou_record.as_deref()).total
    }

    pub fn ats_games(&self) -> u32 {
        parse_record(self.ats_record.as_deref()).total
    }
}

/// A team's situational trends, indexed by [`Situation`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamSituations {
    pub team: String,
    pub lines: Vec<(Situation, SituationLine)>,
}

impl TeamSituations {
    pub fn get(&self, situation: Situation) -> Option<&SituationLine> {
        self.lines
            .iter()
            .find(|(s, _)| *s == situation)
            .map(|(_, line)| line)
    }
}

/// Direction of a totals lean
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OuLean {
    Over,
    Under,
}

/// Contribution of one situation to the O/U score
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OuSignal {
    pub situation: Situation,
    pub lean: OuLean,
    pub weighted_pct: f64,
    pub min_games: u32,
    pub score: f64,
}

/// Contribution of one situation to the ATS score
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AtsSignal {
    pub situation: Situation,
    pub away_cover_pct: f64,
    pub home_cover_pct: f64,
    pub min_games: u32,
    pub score: f64,
}

fn weighted_avg(a_pct: f64, a_games: u32, b_pct: f64, b_games: u32) -> f64 {
    let total = a_games as f64 + b_games as f64;
    if total == 0.0 {
        return 0.0;
    }
    (a_pct * a_games as f64 + b_pct * b_games as f64) / total
}

/// O/U signal for one situation, if both teams qualify
pub fn ou_signal(
    situation: Situation,
    away: &SituationLine,
    home: &SituationLine,
) -> Option<OuSignal> {
    let (away_games, home_games) = (away.ou_games(), home.ou_games());
    if away_games < MIN_SITUATION_GAMES || home_games < MIN_SITUATION_GAMES {
        return None;
    }

    let both_above = |a: Option<f64>, b: Option<f64>| match (a, b) {
        (Some(a), Some(b)) if a > OU_LEAN_THRESHOLD && b > OU_LEAN_THRESHOLD => Some((a, b)),
        _ => None,
    };

    let (lean, (away_pct, home_pct)) = if let Some(p) = both_above(away.over_pct, home.over_pct) {
        (OuLean::Over, p)
    } else if let Some(p) = both_above(away.under_pct, home.under_pct) {
        (OuLean::Under, p)
    } else {
        return None;
    };

    let weighted_pct = weighted_avg(away_pct, away_games, home_pct, home_games);
    let min_games = away_games.min(home_games);
    Some(OuSignal {
        situation,
        lean,
        weighted_pct,
        min_games,
        score: weighted_pct * min_games as f64,
    })
}

/// ATS signal for one situation, if both teams qualify
pub fn ats_signal(
    situation: Situation,
    away: &SituationLine,
    home: &SituationLine,
) -> Option<AtsSignal> {
    let (away_games, home_games) = (away.ats_games(), home.ats_games());
    if away_games < MIN_SITUATION_GAMES || home_games < MIN_SITUATION_GAMES {
        return None;
    }

    let (away_cover_pct, home_cover_pct) = (away.cover_pct?, home.cover_pct?);
    let gap = (away_cover_pct - home_cover_pct).abs();
    if gap <= ATS_GAP_THRESHOLD {
        return None;
    }

    let min_games = away_games.min(home_games);
    Some(AtsSignal {
        situation,
        away_cover_pct,
        home_cover_pct,
        min_games,
        score: gap * min_games as f64,
    })
}

/// Both heuristic scores for a matchup, with the situations behind them
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConsensusScore {
    pub ou_consensus_strength: f64,
    pub ats_dominance: f64,
    pub ou_signals: Vec<OuSignal>,
    pub ats_signals: Vec<AtsSignal>,
}

/// Score a matchup. Situations missing for either team contribute nothing.
pub fn score_matchup(away: &TeamSituations, home: &TeamSituations) -> ConsensusScore {
    let mut score = ConsensusScore::default();

    for situation in Situation::ALL {
        let (Some(a), Some(h)) = (away.get(situation), home.get(situation)) else {
            continue;
        };

        if let Some(signal) = ou_signal(situation, a, h) {
            score.ou_consensus_strength += signal.score;
            score.ou_signals.push(signal);
        }
        if let Some(signal) = ats_signal(situation, a, h) {
            score.ats_dominance += signal.score;
            score.ats_signals.push(signal);
        }
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(over: f64, ou: &str, cover: f64, ats: &str) -> SituationLine {
        SituationLine {
            over_pct: Some(over),
            under_pct: Some(100.0 - over),
            ou_record: Some(ou.to_string()),
            cover_pct: Some(cover),
            ats_record: Some(ats.to_string()),
        }
    }

    fn team(name: &str, entries: Vec<(Situation, SituationLine)>) -> TeamSituations {
        TeamSituations {
            team: name.to_string(),
            lines: entries,
        }
    }

    #[test]
    fn test_parse_record() {
        assert_eq!(parse_record(Some("7-3")).total, 10);
        assert_eq!(parse_record(Some(" 7 - 3 ")).total, 10);
        assert_eq!(parse_record(Some("7-3-1")).total, 10);
        assert_eq!(parse_record(Some("")).total, 0);
        assert_eq!(parse_record(None).total, 0);
        assert_eq!(parse_record(Some("seven-three")).total, 0);
        assert_eq!(parse_record(Some("7")).total, 0);
        assert_eq!(parse_record(Some("7-3-x")).total, 0);
        assert_eq!(parse_record(Some("1-2-3-4")).total, 0);
    }

    #[test]
    fn test_no_qualifying_situation_scores_zero() {
        let away = team("BOS", vec![(Situation::LastGame, line(50.0, "5-5", 50.0, "5-5"))]);
        let home = team("NYK", vec![(Situation::LastGame, line(52.0, "6-4", 55.0, "6-4"))]);
        let score = score_matchup(&away, &home);
        assert_eq!(score.ou_consensus_strength, 0.0);
        assert_eq!(score.ats_dominance, 0.0);
    }

    #[test]
    fn test_over_consensus_is_weighted_by_games() {
        // away 60% over in 10 games, home 70% over in 5 games
        let away = team("BOS", vec![(Situation::FavDog, line(60.0, "6-4", 50.0, "5-5"))]);
        let home = team("NYK", vec![(Situation::FavDog, line(70.0, "3-2", 50.0, "5-5"))]);

        let score = score_matchup(&away, &home);
        let weighted = (60.0 * 10.0 + 70.0 * 5.0) / 15.0;
        assert!((score.ou_consensus_strength - weighted * 5.0).abs() < 1e-9);
        assert_eq!(score.ou_signals[0].lean, OuLean::Over);
    }

    #[test]
    fn test_under_consensus() {
        let away = team("BOS", vec![(Situation::RestBucket, line(30.0, "3-7", 50.0, "5-5"))]);
        let home = team("NYK", vec![(Situation::RestBucket, line(40.0, "4-6", 50.0, "5-5"))]);
        let score = score_matchup(&away, &home);
        assert_eq!(score.ou_signals.len(), 1);
        assert_eq!(score.ou_signals[0].lean, OuLean::Under);
        assert!((score.ou_consensus_strength - 65.0 * 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_split_lean_contributes_nothing() {
        let away = team("BOS", vec![(Situation::LastGame, line(70.0, "7-3", 50.0, "5-5"))]);
        let home = team("NYK", vec![(Situation::LastGame, line(30.0, "3-7", 50.0, "5-5"))]);
        assert_eq!(score_matchup(&away, &home).ou_consensus_strength, 0.0);
    }

    #[test]
    fn test_small_sample_is_excluded_regardless_of_pct() {
        let away = team("BOS", vec![(Situation::LastGame, line(90.0, "3-1", 90.0, "3-1"))]);
        let home = team("NYK", vec![(Situation::LastGame, line(90.0, "7-3", 10.0, "bad"))]);
        let score = score_matchup(&away, &home);
        assert_eq!(score.ou_consensus_strength, 0.0);
        assert_eq!(score.ats_dominance, 0.0);
    }

    #[test]
    fn test_ats_dominance_sums_situations() {
        let away = team(
            "BOS",
            vec![
                (Situation::LastGame, line(50.0, "5-5", 70.0, "7-3")),
                (Situation::RestComp, line(50.0, "5-5", 40.0, "4-6")),
            ],
        );
        let home = team(
            "NYK",
            vec![
                (Situation::LastGame, line(50.0, "5-5", 45.0, "9-11")),
                (Situation::RestComp, line(50.0, "5-5", 65.0, "13-7")),
            ],
        );
        let score = score_matchup(&away, &home);
        // |70-45| * 10 + |40-65| * 10
        assert!((score.ats_dominance - 500.0).abs() < 1e-9);
        assert_eq!(score.ats_signals.len(), 2);
    }

    #[test]
    fn test_gap_of_exactly_ten_does_not_count() {
        let away = team("BOS", vec![(Situation::FavDog, line(50.0, "5-5", 60.0, "6-4"))]);
        let home = team("NYK", vec![(Situation::FavDog, line(50.0, "5-5", 50.0, "5-5"))]);
        assert_eq!(score_matchup(&away, &home).ats_dominance, 0.0);
    }

    #[test]
    fn test_scores_increase_with_sample_size() {
        let small = score_matchup(
            &team("A", vec![(Situation::FavDog, line(60.0, "6-4", 70.0, "7-3"))]),
            &team("B", vec![(Situation::FavDog, line(60.0, "6-4", 40.0, "4-6"))]),
        );
        let large = score_matchup(
            &team("A", vec![(Situation::FavDog, line(60.0, "12-8", 70.0, "14-6"))]),
            &team("B", vec![(Situation::FavDog, line(60.0, "12-8", 40.0, "8-12"))]),
        );
        assert!(large.ou_consensus_strength > small.ou_consensus_strength);
        assert!(large.ats_dominance > small.ats_dominance);
    }

    #[test]
    fn test_scores_increase_with_pct_and_gap() {
        let weak = score_matchup(
            &team("A", vec![(Situation::FavDog, line(60.0, "6-4", 70.0, "7-3"))]),
            &team("B", vec![(Situation::FavDog, line(60.0, "6-4", 55.0, "6-4"))]),
        );
        let strong = score_matchup(
            &team("A", vec![(Situation::FavDog, line(75.0, "6-4", 80.0, "7-3"))]),
            &team("B", vec![(Situation::FavDog, line(80.0, "6-4", 40.0, "6-4"))]),
        );
        assert!(weak.ou_consensus_strength > 0.0);
        assert!(weak.ats_dominance > 0.0);
        assert!(strong.ou_consensus_strength > weak.ou_consensus_strength);
        assert!(strong.ats_dominance > weak.ats_dominance);
    }

    #[test]
    fn test_huge_records_do_not_overflow() {
        let huge = line(60.0, "4294967295-0", 70.0, "4294967295-0");
        let away = team("A", vec![(Situation::LastGame, huge.clone())]);
        let home = team("B", vec![(Situation::LastGame, huge)]);
        let score = score_matchup(&away, &home);
        assert!(score.ou_consensus_strength.is_finite());
        assert!((score.ou_signals[0].weighted_pct - 60.0).abs() < 1e-9);
        assert_eq!(score.ou_signals[0].min_games, u32::MAX);
    }
}
