//! Scored NBA/NCAAB matchups from the situational trend tables.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::domain::FeatureValue;
use crate::patterns::{score_matchup, ConsensusScore, Situation, SituationLine, TeamSituations};

/// Ordering of the trends list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendSort {
    #[default]
    OuConsensus,
    AtsDominance,
    /// Sum of both scores
    Combined,
}

impl TryFrom<&str> for TrendSort {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "ou" | "ou_consensus" | "consensus" => Ok(TrendSort::OuConsensus),
            "ats" | "ats_dominance" | "dominance" => Ok(TrendSort::AtsDominance),
            "combined" | "all" => Ok(TrendSort::Combined),
            other => Err(format!("unknown sort: {}", other)),
        }
    }
}

/// One matchup with both teams' situations and its scores
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredMatchup {
    pub game_id: String,
    pub game_date: Option<String>,
    pub away_team: String,
    pub home_team: String,
    pub away: TeamSituations,
    pub home: TeamSituations,
    pub score: ConsensusScore,
}

fn text(row: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match row.get(*k)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn number(row: &Map<String, Value>, key: &str) -> Option<f64> {
    row.get(key).map(FeatureValue::from_json)?.as_f64()
}

/// Situational lines of one team row, read from `<prefix>_over_pct`,
/// `<prefix>_under_pct`, `<prefix>_ou_record`, `<prefix>_cover_pct` and
/// `<prefix>_ats_record` columns.
pub fn team_situations(row: &Map<String, Value>) -> TeamSituations {
    let lines = Situation::ALL
        .iter()
        .map(|s| {
            let p = s.prefix();
            let line = SituationLine {
                over_pct: number(row, &format!("{}_over_pct", p)),
                under_pct: number(row, &format!("{}_under_pct", p)),
                ou_record: text(row, &[&format!("{}_ou_record", p)]),
                cover_pct: number(row, &format!("{}_cover_pct", p)),
                ats_record: text(row, &[&format!("{}_ats_record", p)]),
            };
            (*s, line)
        })
        .collect();

    TeamSituations {
        team: text(row, &["team_name", "team"]).unwrap_or_default(),
        lines,
    }
}

/// `Some(true)` for the home row, `Some(false)` for away
fn is_home(row: &Map<String, Value>) -> Option<bool> {
    if let Some(v) = row.get("is_home") {
        if let Some(b) = FeatureValue::from_json(v).as_bool() {
            return Some(b);
        }
    }
    match text(row, &["team_side", "home_away", "side"])?
        .to_ascii_lowercase()
        .as_str()
    {
        "home" | "h" => Some(true),
        "away" | "a" | "road" => Some(false),
        _ => None,
    }
}

/// Pair team rows by `game_id` into scored matchups, sorted descending.
///
/// Games without exactly two team rows are skipped.
pub fn build_matchups(rows: &[Map<String, Value>], sort: TrendSort) -> Vec<ScoredMatchup> {
    let mut by_game: BTreeMap<String, Vec<&Map<String, Value>>> = BTreeMap::new();
    for row in rows {
        match text(row, &["game_id", "unique_id"]) {
            Some(id) => by_game.entry(id).or_default().push(row),
            None => debug!("trend row without game_id"),
        }
    }

    let mut out = Vec::with_capacity(by_game.len());
    for (game_id, team_rows) in by_game {
        if team_rows.len() != 2 {
            warn!(%game_id, rows = team_rows.len(), "expected two team rows per game");
            continue;
        }
        let (away_row, home_row) = match (is_home(team_rows[0]), is_home(team_rows[1])) {
            (Some(a), Some(b)) if a == b => {
                warn!(%game_id, home = a, "both rows share a home marker, taking row order");
                (team_rows[0], team_rows[1])
            }
            (Some(true), _) | (_, Some(false)) => (team_rows[1], team_rows[0]),
            (Some(false), _) | (_, Some(true)) => (team_rows[0], team_rows[1]),
            (None, None) => {
                warn!(%game_id, "home/away not marked, taking row order");
                (team_rows[0], team_rows[1])
            }
        };

        let away = team_situations(away_row);
        let home = team_situations(home_row);
        let score = score_matchup(&away, &home);
        out.push(ScoredMatchup {
            game_date: text(home_row, &["game_date"]),
            away_team: away.team.clone(),
            home_team: home.team.clone(),
            game_id,
            away,
            home,
            score,
        });
    }

    let key = |m: &ScoredMatchup| match sort {
        TrendSort::OuConsensus => m.score.ou_consensus_strength,
        TrendSort::AtsDominance => m.score.ats_dominance,
        TrendSort::Combined => m.score.ou_consensus_strength + m.score.ats_dominance,
    };
    out.sort_by(|a, b| key(b).total_cmp(&key(a)).then(a.game_id.cmp(&b.game_id)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(
        game: &str,
        team: &str,
        side: &str,
        over: f64,
        ou: &str,
        cover: f64,
    ) -> Map<String, Value> {
        json!({
            "game_id": game,
            "team_name": team,
            "team_side": side,
            "last_game_over_pct": over,
            "last_game_under_pct": 100.0 - over,
            "last_game_ou_record": ou,
            "last_game_cover_pct": cover,
            "last_game_ats_record": "6-4",
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn test_pairs_and_scores() {
        let rows = vec![
            row("g1", "Celtics", "home", 70.0, "7-3", 80.0),
            row("g1", "Lakers", "away", 60.0, "6-4", 40.0),
            row("g2", "Heat", "home", 50.0, "5-5", 50.0),
            row("g2", "Magic", "away", 50.0, "5-5", 50.0),
        ];
        let matchups = build_matchups(&rows, TrendSort::OuConsensus);
        assert_eq!(matchups.len(), 2);

        let first = &matchups[0];
        assert_eq!(first.game_id, "g1");
        assert_eq!(first.home_team, "Celtics");
        assert_eq!(first.away_team, "Lakers");
        // weighted over% (60*10 + 70*10)/20 = 65, times min games 10
        assert!((first.score.ou_consensus_strength - 650.0).abs() < 1e-9);
        // |80 - 40| * 10
        assert!((first.score.ats_dominance - 400.0).abs() < 1e-9);

        assert_eq!(matchups[1].score.ou_consensus_strength, 0.0);
    }

    #[test]
    fn test_string_percentages_and_missing_side() {
        let mut a = row("g1", "A", "", 60.0, "6-4", 50.0);
        a.insert("last_game_over_pct".into(), json!("62.5"));
        a.remove("team_side");
        let mut b = row("g1", "B", "", 60.0, "6-4", 50.0);
        b.remove("team_side");

        let matchups = build_matchups(&[a, b], TrendSort::AtsDominance);
        assert_eq!(matchups.len(), 1);
        assert_eq!(matchups[0].away_team, "A");
        let line = matchups[0].away.get(Situation::LastGame).unwrap();
        assert_eq!(line.over_pct, Some(62.5));
    }

    #[test]
    fn test_conflicting_home_markers_take_row_order() {
        let rows = vec![
            row("g1", "Celtics", "home", 70.0, "7-3", 80.0),
            row("g1", "Lakers", "home", 60.0, "6-4", 40.0),
        ];
        let matchups = build_matchups(&rows, TrendSort::Combined);
        assert_eq!(matchups.len(), 1);
        assert_eq!(matchups[0].away_team, "Celtics");
        assert_eq!(matchups[0].home_team, "Lakers");
    }

    #[test]
    fn test_incomplete_games_are_skipped() {
        let rows = vec![row("g1", "Celtics", "home", 70.0, "7-3", 80.0)];
        assert!(build_matchups(&rows, TrendSort::Combined).is_empty());
    }

    #[test]
    fn test_sort_parsing() {
        assert_eq!(TrendSort::try_from("ats").unwrap(), TrendSort::AtsDominance);
        assert_eq!(TrendSort::try_from("").unwrap(), TrendSort::OuConsensus);
        assert!(TrendSort::try_from("random").is_err());
    }
}
