//! Health report for the `/health` route: database reachability plus the
//! state of the odds cache.

use crate::adapters::{OddsClient, PostgresStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Health status for a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// Component health check result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_check: Option<DateTime<Utc>>,
}

/// Overall service health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub components: Vec<ComponentHealth>,
}

impl HealthResponse {
    /// Worst component status wins; no components means healthy
    pub fn from_components(started_at: DateTime<Utc>, components: Vec<ComponentHealth>) -> Self {
        let status = if components
            .iter()
            .any(|c| c.status == HealthStatus::Unhealthy)
        {
            HealthStatus::Unhealthy
        } else if components.iter().any(|c| c.status == HealthStatus::Degraded) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        let now = Utc::now();
        Self {
            status,
            timestamp: now,
            uptime_seconds: (now - started_at).num_seconds().max(0) as u64,
            components,
        }
    }
}

async fn database_health(store: &PostgresStore) -> ComponentHealth {
    let (status, message) = match store.ping().await {
        Ok(()) => (HealthStatus::Healthy, None),
        Err(e) => {
            warn!(error = %e, "database health check failed");
            (HealthStatus::Unhealthy, Some(e.to_string()))
        }
    };
    ComponentHealth {
        name: "database".to_string(),
        status,
        message,
        last_check: Some(Utc::now()),
    }
}

fn odds_health(odds: &OddsClient) -> ComponentHealth {
    if !odds.is_configured() {
        return ComponentHealth {
            name: "odds_api".to_string(),
            status: HealthStatus::Degraded,
            message: Some("no API key configured".to_string()),
            last_check: None,
        };
    }
    ComponentHealth {
        name: "odds_api".to_string(),
        status: HealthStatus::Healthy,
        message: Some(format!(
            "{} cached, {} in flight",
            odds.cache().len(),
            odds.cache().in_flight_len()
        )),
        last_check: None,
    }
}

/// Check every component once
pub async fn check_health(
    store: &PostgresStore,
    odds: &OddsClient,
    started_at: DateTime<Utc>,
) -> HealthResponse {
    let components = vec![database_health(store).await, odds_health(odds)];
    HealthResponse::from_components(started_at, components)
}
