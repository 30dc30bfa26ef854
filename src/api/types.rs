use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::adapters::GameEvent;
use crate::domain::{BetTarget, BettingLines, DailyMatch, PatternMatch, RoiRecord, SavedPattern};
use crate::filters::TrainingSummary;
use crate::patterns::ComboStats;
use crate::services::ScoredMatchup;

// ============================================================================
// Function Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckPatternsRequest {
    #[serde(default)]
    pub user_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckPatternsResponse {
    pub date: Option<NaiveDate>,
    pub patterns_checked: usize,
    pub games_checked: usize,
    pub matches: Vec<PatternMatch>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRequest {
    /// Field name -> filter expression (`gte:3.5`, `a,b`, `true`, ...)
    #[serde(default)]
    pub filters: Map<String, Value>,
    pub limit: Option<i64>,
    /// League for `games-today-filtered`; MLB when absent
    pub league: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterResponse {
    pub summary: TrainingSummary,
    pub game_rows: Vec<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GamesTodayResponse {
    pub date: NaiveDate,
    pub league: String,
    pub total_games: usize,
    pub games: Vec<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameAnalysisRequest {
    #[serde(default)]
    pub game_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameAnalysisResponse {
    pub game_id: String,
    pub game: Map<String, Value>,
    /// Other perspective of the same game, when present
    pub opponent: Option<Map<String, Value>>,
    pub lines: BettingLines,
    pub lines_source: &'static str,
    pub pattern_matches: Vec<DailyMatch>,
}

// ============================================================================
// Odds / Trends Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct OddsQuery {
    /// Comma-separated bookmaker keys
    pub bookmakers: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OddsResponse {
    pub sport_key: String,
    pub events: Vec<GameEvent>,
}

#[derive(Debug, Deserialize)]
pub struct TrendsQuery {
    pub sort: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendsResponse {
    pub league: String,
    pub date: NaiveDate,
    pub source: String,
    pub matchups: Vec<ScoredMatchup>,
}

// ============================================================================
// Pattern Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternsQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternWithRoi {
    #[serde(flatten)]
    pub pattern: SavedPattern,
    pub roi: Option<RoiRecord>,
    pub roi_calculated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePatternRequest {
    #[serde(default)]
    pub user_id: String,
    pub features: Vec<String>,
    pub combo: String,
    pub target: BetTarget,
    #[serde(default)]
    pub filters: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverRequest {
    pub features: Vec<String>,
    pub target: BetTarget,
    #[serde(default = "default_min_games")]
    pub min_games: i64,
    #[serde(default)]
    pub filters: Map<String, Value>,
    pub limit: Option<usize>,
}

fn default_min_games() -> i64 {
    10
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverResponse {
    pub total_combos: usize,
    pub combos: Vec<ComboStats>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}
