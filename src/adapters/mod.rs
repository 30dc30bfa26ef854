pub mod api_server;
pub mod odds_api;
pub mod polymarket;
pub mod postgres;
pub mod team_names;

pub use api_server::{load_team_matcher, start_api_server};
pub use odds_api::{BookmakerOdds, GameEvent, MarketOdds, OddsCache, OddsClient, Outcome};
pub use polymarket::{GammaEvent, GammaMarket, PolymarketClient, ProxyAction};
pub use postgres::PostgresStore;
pub use team_names::{normalize_team_name, NameMatch, TeamMatcher};
