use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::adapters::{PostgresStore, TeamMatcher};
use crate::api::{create_router, AppState};
use crate::config::AppConfig;
use crate::error::Result;

/// Team matcher with the built-in aliases plus `ncaab_team_mapping`.
/// A missing mapping table leaves the built-ins only.
pub async fn load_team_matcher(store: &PostgresStore) -> TeamMatcher {
    match store.ncaab_team_aliases().await {
        Ok(groups) => {
            info!(groups = groups.len(), "loaded NCAAB team mapping");
            TeamMatcher::new().with_groups(groups)
        }
        Err(e) => {
            warn!(error = %e, "NCAAB team mapping unavailable, using built-in aliases");
            TeamMatcher::new()
        }
    }
}

/// Start the API server
pub async fn start_api_server(store: Arc<PostgresStore>, config: &AppConfig) -> Result<()> {
    let teams = load_team_matcher(&store).await;
    let app_state = AppState::new(store, config, teams)?;
    if !app_state.odds.is_configured() {
        warn!("odds.api_key is empty; /api/odds will answer 503");
    }

    let app = create_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("API server listening on http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
