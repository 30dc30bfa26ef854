use crate::adapters::{OddsCache, OddsClient, PolymarketClient, PostgresStore, TeamMatcher};
use crate::config::AppConfig;
use crate::error::Result;
use crate::services::{PatternRepository, PatternService};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub store: Arc<PostgresStore>,

    /// Pattern jobs over the same store
    pub patterns: PatternService,

    /// Odds client; its cache lives as long as this state
    pub odds: OddsClient,

    pub polymarket: PolymarketClient,

    pub teams: Arc<TeamMatcher>,

    /// Application start time
    pub start_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(store: Arc<PostgresStore>, config: &AppConfig, teams: TeamMatcher) -> Result<Self> {
        let repo: Arc<dyn PatternRepository> = store.clone();
        let cache = OddsCache::new(Duration::from_secs(config.odds.cache_ttl_secs));

        Ok(Self {
            patterns: PatternService::new(repo),
            odds: OddsClient::new(config.odds.clone(), cache),
            polymarket: PolymarketClient::new(&config.polymarket)?,
            teams: Arc::new(teams),
            store,
            start_time: Utc::now(),
        })
    }

    pub fn uptime_seconds(&self) -> u64 {
        (Utc::now() - self.start_time).num_seconds().max(0) as u64
    }
}
