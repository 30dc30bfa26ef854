use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::api::error::ApiResult;
use crate::api::{state::AppState, types::*};

/// Split a `bookmakers=a,b` query value; blanks are dropped
fn bookmaker_list(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(|b| b.trim().to_ascii_lowercase())
        .filter(|b| !b.is_empty())
        .collect()
}

/// GET /api/odds/:sport_key
pub async fn get_odds(
    State(state): State<AppState>,
    Path(sport_key): Path<String>,
    Query(query): Query<OddsQuery>,
) -> ApiResult<Json<OddsResponse>> {
    let books = bookmaker_list(query.bookmakers.as_deref());
    let events = state.odds.get_odds(&sport_key, &books).await?;

    Ok(Json(OddsResponse {
        sport_key,
        events: events.as_ref().clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bookmaker_list() {
        assert!(bookmaker_list(None).is_empty());
        assert_eq!(
            bookmaker_list(Some(" FanDuel, ,draftkings")),
            vec!["fanduel", "draftkings"]
        );
    }
}
