use axum::{extract::State, http::StatusCode, Json};

use crate::api::state::AppState;
use crate::services::health::{check_health, HealthResponse, HealthStatus};

/// GET /health -- liveness plus a database round trip
///
/// Answers 503 only when a component is unhealthy; a missing odds key is
/// reported as degraded.
pub async fn health_handler(
    State(state): State<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let resp = check_health(&state.store, &state.odds, state.start_time).await;
    let code = match resp.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    };
    (code, Json(resp))
}
