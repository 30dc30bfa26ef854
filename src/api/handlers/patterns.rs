use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::api::{state::AppState, types::*};
use crate::domain::SavedPattern;
use crate::error::SharplineError;
use crate::filters::FilterSet;
use crate::validation::validate_user_id;

/// Default number of combos returned by discovery
const DEFAULT_DISCOVER_LIMIT: usize = 50;

fn required_user(user_id: Option<&str>) -> ApiResult<&str> {
    let user_id = user_id.unwrap_or_default();
    validate_user_id(user_id)?;
    Ok(user_id)
}

async fn with_roi(state: &AppState, pattern: SavedPattern) -> PatternWithRoi {
    let (roi, roi_calculated_at) = match state.store.get_roi(pattern.id).await {
        Ok(Some((record, at))) => (Some(record), Some(at)),
        Ok(None) => (None, None),
        Err(e) => {
            warn!(pattern_id = %pattern.id, error = %e, "failed to load pattern ROI");
            (None, None)
        }
    };
    PatternWithRoi {
        pattern,
        roi,
        roi_calculated_at,
    }
}

fn parse_pattern_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(format!("invalid pattern id: {}", raw)))
}

/// GET /api/patterns?userId=
pub async fn list_patterns(
    State(state): State<AppState>,
    Query(query): Query<PatternsQuery>,
) -> ApiResult<Json<Vec<PatternWithRoi>>> {
    let user_id = required_user(query.user_id.as_deref())?;
    let patterns = state.store.list_patterns(Some(user_id)).await?;

    let mut out = Vec::with_capacity(patterns.len());
    for pattern in patterns {
        out.push(with_roi(&state, pattern).await);
    }

    Ok(Json(out))
}

/// GET /api/patterns/:id?userId=
///
/// Patterns of other users answer 404 like missing ones.
pub async fn get_pattern(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PatternsQuery>,
) -> ApiResult<Json<PatternWithRoi>> {
    let id = parse_pattern_id(&id)?;
    let user_id = required_user(query.user_id.as_deref())?;

    let pattern = state
        .store
        .get_pattern(id)
        .await?
        .filter(|p| p.user_id == user_id)
        .ok_or_else(|| SharplineError::NotFound(format!("pattern {}", id)))?;

    Ok(Json(with_roi(&state, pattern).await))
}

/// POST /api/patterns
pub async fn create_pattern(
    State(state): State<AppState>,
    Json(req): Json<SavePatternRequest>,
) -> ApiResult<(StatusCode, Json<SavedPattern>)> {
    let filters = FilterSet::from_json_map(&req.filters)?;
    let pattern = state
        .patterns
        .save_pattern(&req.user_id, req.features, &req.combo, req.target, &filters)
        .await?;
    Ok((StatusCode::CREATED, Json(pattern)))
}

/// DELETE /api/patterns/:id?userId=
pub async fn delete_pattern(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PatternsQuery>,
) -> ApiResult<Json<DeleteResponse>> {
    let id = parse_pattern_id(&id)?;
    let user_id = required_user(query.user_id.as_deref())?;

    if !state.store.delete_pattern(id, user_id).await? {
        return Err(SharplineError::NotFound(format!("pattern {}", id)).into());
    }
    info!(pattern_id = %id, user_id, "pattern deleted");
    Ok(Json(DeleteResponse { deleted: true }))
}

/// POST /api/patterns/discover
pub async fn discover_patterns(
    State(state): State<AppState>,
    Json(req): Json<DiscoverRequest>,
) -> ApiResult<Json<DiscoverResponse>> {
    if req.min_games < 1 {
        return Err(ApiError::bad_request("minGames must be at least 1"));
    }
    let filters = FilterSet::from_json_map(&req.filters)?;
    let mut combos = state
        .patterns
        .discover(&req.features, req.target, req.min_games, &filters)
        .await?;

    let total_combos = combos.len();
    combos.truncate(req.limit.unwrap_or(DEFAULT_DISCOVER_LIMIT));
    Ok(Json(DiscoverResponse {
        total_combos,
        combos,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_user() {
        assert_eq!(required_user(Some("u1")).unwrap(), "u1");
        assert!(required_user(None).is_err());
        assert!(required_user(Some("a b")).is_err());
    }

    #[test]
    fn test_parse_pattern_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_pattern_id(&id.to_string()).unwrap(), id);
        assert_eq!(
            parse_pattern_id("nope").unwrap_err().status,
            StatusCode::BAD_REQUEST
        );
    }
}
