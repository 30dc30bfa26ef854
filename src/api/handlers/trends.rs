use axum::{
    extract::{Path, Query, State},
    Json,
};
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::api::{state::AppState, types::*};
use crate::domain::{eastern_today, League};
use crate::services::{build_matchups, TrendSort};

/// GET /api/trends/:league
pub async fn get_trends(
    State(state): State<AppState>,
    Path(league): Path<String>,
    Query(query): Query<TrendsQuery>,
) -> ApiResult<Json<TrendsResponse>> {
    let league = League::try_from(league.as_str()).map_err(ApiError::bad_request)?;
    if league.trends_table().is_none() {
        return Err(ApiError::bad_request(format!(
            "no situational trends for {}",
            league
        )));
    }
    let sort = TrendSort::try_from(query.sort.as_deref().unwrap_or_default())
        .map_err(ApiError::bad_request)?;

    let date = eastern_today();
    let (rows, source) = state.store.situational_trends(league, date).await?;
    let matchups = build_matchups(&rows, sort);

    info!(%league, %date, %source, matchups = matchups.len(), "scored trends");
    Ok(Json(TrendsResponse {
        league: league.to_string(),
        date,
        source,
        matchups,
    }))
}
