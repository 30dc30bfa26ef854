use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::api::{handlers, state::AppState};

pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Pattern jobs
        .route(
            "/functions/check-saved-patterns",
            post(handlers::check_saved_patterns),
        )
        .route(
            "/functions/calculate-pattern-roi",
            post(handlers::calculate_pattern_roi),
        )
        // Feature-view queries
        .route(
            "/functions/filter-training-data",
            post(handlers::filter_training_data),
        )
        .route(
            "/functions/filter-nfl-training-data",
            post(handlers::filter_nfl_training_data),
        )
        .route(
            "/functions/games-today-filtered",
            post(handlers::games_today_filtered),
        )
        .route(
            "/functions/get-game-analysis-data",
            post(handlers::get_game_analysis_data),
        )
        .route("/functions/polymarket-proxy", post(handlers::polymarket_proxy))
        // Odds and trends
        .route("/api/odds/:sport_key", get(handlers::get_odds))
        .route("/api/trends/:league", get(handlers::get_trends))
        // Pattern endpoints
        .route(
            "/api/patterns",
            get(handlers::list_patterns).post(handlers::create_pattern),
        )
        .route("/api/patterns/discover", post(handlers::discover_patterns))
        .route(
            "/api/patterns/:id",
            get(handlers::get_pattern).delete(handlers::delete_pattern),
        )
        // Health
        .route("/health", get(handlers::health_handler))
        // Add state and CORS
        .with_state(state)
        .layer(cors)
}
