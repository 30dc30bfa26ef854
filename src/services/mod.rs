pub mod health;
pub mod pattern_service;
pub mod trends;

pub use health::{check_health, ComponentHealth, HealthResponse, HealthStatus};
pub use pattern_service::{
    CheckSummary, PatternRepository, PatternService, RoiCalculation, RoiRunSummary, MAX_VIEW_ROWS,
};
pub use trends::{build_matchups, team_situations, ScoredMatchup, TrendSort};
