pub mod adapters;
pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod filters;
pub mod patterns;
pub mod services;
pub mod validation;

pub use adapters::{OddsCache, OddsClient, PolymarketClient, PostgresStore, TeamMatcher};
pub use config::AppConfig;
pub use error::{Result, SharplineError};
pub use services::{PatternRepository, PatternService};
