//! `/functions/*` routes: the pattern jobs and feature-view queries the
//! frontend calls directly.

use axum::{extract::State, Json};
use serde_json::Value;
use tracing::{info, warn};

use crate::adapters::ProxyAction;
use crate::api::error::{ApiError, ApiResult};
use crate::api::{state::AppState, types::*};
use crate::domain::{eastern_today, GameFeatureRow, League};
use crate::error::SharplineError;
use crate::filters::{FilterSet, TrainingSummary};
use crate::services::{PatternRepository, RoiRunSummary, MAX_VIEW_ROWS};

fn row_limit(requested: Option<i64>) -> ApiResult<i64> {
    match requested {
        None => Ok(MAX_VIEW_ROWS),
        Some(n) if n <= 0 => Err(ApiError::bad_request("limit must be positive")),
        Some(n) => Ok(n.min(MAX_VIEW_ROWS)),
    }
}

fn parse_league(raw: Option<&str>, default: League) -> ApiResult<League> {
    match raw {
        None => Ok(default),
        Some(s) => League::try_from(s).map_err(ApiError::bad_request),
    }
}

/// POST /functions/check-saved-patterns
pub async fn check_saved_patterns(
    State(state): State<AppState>,
    Json(req): Json<CheckPatternsRequest>,
) -> ApiResult<Json<CheckPatternsResponse>> {
    let summary = state
        .patterns
        .check_saved_patterns(&req.user_id, eastern_today())
        .await?;

    if summary.failed_upserts > 0 {
        warn!(failed = summary.failed_upserts, "some matches were not persisted");
    }

    Ok(Json(CheckPatternsResponse {
        date: summary.date,
        patterns_checked: summary.patterns_checked,
        games_checked: summary.games_checked,
        matches: summary.matches,
    }))
}

/// POST /functions/calculate-pattern-roi
pub async fn calculate_pattern_roi(
    State(state): State<AppState>,
) -> ApiResult<Json<RoiRunSummary>> {
    let summary = state.patterns.calculate_pattern_roi(eastern_today()).await?;
    Ok(Json(summary))
}

async fn filter_training(
    state: &AppState,
    league: League,
    req: FilterRequest,
) -> ApiResult<Json<FilterResponse>> {
    let view = league.training_view().ok_or_else(|| {
        ApiError::bad_request(format!("no training data for {}", league))
    })?;
    let filters = FilterSet::from_json_map(&req.filters)?;
    let limit = row_limit(req.limit)?;

    let game_rows = state.store.fetch_view_rows(view, None, &filters, limit).await?;
    let parsed: Vec<GameFeatureRow> = game_rows
        .iter()
        .filter_map(GameFeatureRow::from_json_row)
        .collect();
    let summary = TrainingSummary::from_rows(&parsed);

    info!(%league, filters = filters.filters.len(), games = summary.games, "filtered training data");
    Ok(Json(FilterResponse { summary, game_rows }))
}

/// POST /functions/filter-training-data
pub async fn filter_training_data(
    State(state): State<AppState>,
    Json(req): Json<FilterRequest>,
) -> ApiResult<Json<FilterResponse>> {
    filter_training(&state, League::Mlb, req).await
}

/// POST /functions/filter-nfl-training-data
pub async fn filter_nfl_training_data(
    State(state): State<AppState>,
    Json(req): Json<FilterRequest>,
) -> ApiResult<Json<FilterResponse>> {
    filter_training(&state, League::Nfl, req).await
}

/// POST /functions/games-today-filtered
///
/// Filters run in memory over today's rows so boolean and text columns
/// compare the same way they bin.
pub async fn games_today_filtered(
    State(state): State<AppState>,
    Json(req): Json<FilterRequest>,
) -> ApiResult<Json<GamesTodayResponse>> {
    let league = parse_league(req.league.as_deref(), League::Mlb)?;
    let view = league
        .input_view()
        .ok_or_else(|| ApiError::bad_request(format!("no daily input view for {}", league)))?;
    let filters = FilterSet::from_json_map(&req.filters)?;
    let today = eastern_today();

    let rows = state
        .store
        .fetch_view_rows(view, Some(today), &FilterSet::default(), MAX_VIEW_ROWS)
        .await?;
    let total_games = rows.len();

    let mut games: Vec<_> = rows
        .into_iter()
        .filter(|raw| {
            GameFeatureRow::from_json_row(raw).is_some_and(|row| filters.matches(&row))
        })
        .collect();
    if let Some(limit) = req.limit {
        games.truncate(row_limit(Some(limit))? as usize);
    }

    info!(%league, date = %today, total_games, matched = games.len(), "filtered today's games");
    Ok(Json(GamesTodayResponse {
        date: today,
        league: league.to_string(),
        total_games,
        games,
    }))
}

/// POST /functions/get-game-analysis-data
pub async fn get_game_analysis_data(
    State(state): State<AppState>,
    Json(req): Json<GameAnalysisRequest>,
) -> ApiResult<Json<GameAnalysisResponse>> {
    let game_id = req.game_id.trim().to_string();
    if game_id.is_empty() {
        return Err(ApiError::bad_request("gameId is required"));
    }
    let keys = vec![game_id.clone()];

    let mut rows = match League::Mlb.input_view() {
        Some(view) => state.store.fetch_view_rows_by_key(view, &keys).await?,
        None => Vec::new(),
    };
    if rows.is_empty() {
        if let Some(view) = League::Mlb.training_view() {
            warn!(%game_id, "game not in today's input view, trying training view");
            rows = state.store.fetch_view_rows_by_key(view, &keys).await?;
        }
    }

    let mut rows = rows.into_iter();
    let game = rows
        .next()
        .ok_or_else(|| SharplineError::NotFound(format!("game {}", game_id)))?;
    let opponent = rows.next();

    let (lines, lines_source) = match GameFeatureRow::from_json_row(&game) {
        Some(row) => state.patterns.lines_for(&row).await,
        None => match state.store.live_lines(&game_id).await? {
            Some(lines) => (lines, "circa_lines"),
            None => (Default::default(), "none"),
        },
    };
    let pattern_matches = state.store.daily_matches_for_game(&game_id).await?;

    Ok(Json(GameAnalysisResponse {
        game_id,
        game,
        opponent,
        lines,
        lines_source,
        pattern_matches,
    }))
}

/// POST /functions/polymarket-proxy
///
/// The body is parsed here rather than by the extractor so a bad `action`
/// answers 400 with the usual error body.
pub async fn polymarket_proxy(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let action: ProxyAction = serde_json::from_value(body)
        .map_err(|e| ApiError::bad_request(format!("invalid proxy request: {}", e)))?;
    let value = state.polymarket.dispatch(&state.teams, action).await?;
    Ok(Json(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_limit_caps_and_rejects() {
        assert_eq!(row_limit(None).unwrap(), MAX_VIEW_ROWS);
        assert_eq!(row_limit(Some(10)).unwrap(), 10);
        assert_eq!(row_limit(Some(MAX_VIEW_ROWS * 2)).unwrap(), MAX_VIEW_ROWS);
        assert!(row_limit(Some(0)).is_err());
    }

    #[test]
    fn test_parse_league_defaults() {
        assert_eq!(parse_league(None, League::Mlb).unwrap(), League::Mlb);
        assert_eq!(parse_league(Some("nba"), League::Mlb).unwrap(), League::Nba);
        assert!(parse_league(Some("cricket"), League::Mlb).is_err());
    }
}
