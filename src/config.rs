use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub odds: OddsConfig,
    #[serde(default)]
    pub polymarket: PolymarketConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP port for the JSON API (default: 8080)
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OddsConfig {
    /// The Odds API key; odds routes answer 503 when empty
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_odds_base_url")]
    pub base_url: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Default bookmakers when a request names none
    #[serde(default = "default_bookmakers")]
    pub bookmakers: Vec<String>,
    /// How long a fetched odds payload is served from memory
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_odds_base_url() -> String {
    "https://api.the-odds-api.com/v4".to_string()
}

fn default_region() -> String {
    "us".to_string()
}

fn default_bookmakers() -> Vec<String> {
    vec![
        "draftkings".to_string(),
        "fanduel".to_string(),
        "betmgm".to_string(),
    ]
}

fn default_cache_ttl_secs() -> u64 {
    300
}

impl Default for OddsConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_odds_base_url(),
            region: default_region(),
            bookmakers: default_bookmakers(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolymarketConfig {
    #[serde(default = "default_gamma_url")]
    pub gamma_url: String,
    #[serde(default = "default_clob_url")]
    pub clob_url: String,
}

fn default_gamma_url() -> String {
    "https://gamma-api.polymarket.com".to_string()
}

fn default_clob_url() -> String {
    "https://clob.polymarket.com".to_string()
}

impl Default for PolymarketConfig {
    fn default() -> Self {
        Self {
            gamma_url: default_gamma_url(),
            clob_url: default_clob_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("database.max_connections", 5)?
            .set_default("server.port", 8080)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Environment-specific overrides (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("SHARPLINE_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // SHARPLINE_DATABASE__URL, SHARPLINE_ODDS__API_KEY, ...
            .add_source(
                Environment::with_prefix("SHARPLINE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("odds.bookmakers")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Configuration used by CLI commands that only need a database URL
    pub fn with_database_url(url: &str) -> Self {
        Self {
            database: DatabaseConfig {
                url: url.to_string(),
                max_connections: default_max_connections(),
            },
            server: ServerConfig::default(),
            odds: OddsConfig::default(),
            polymarket: PolymarketConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.database.url.trim().is_empty() {
            errors.push("database.url must be set".to_string());
        }

        if self.database.max_connections == 0 {
            errors.push("database.max_connections must be positive".to_string());
        }

        if self.odds.cache_ttl_secs == 0 {
            errors.push("odds.cache_ttl_secs must be positive".to_string());
        }

        if self.odds.bookmakers.iter().any(|b| b.trim().is_empty()) {
            errors.push("odds.bookmakers must not contain empty entries".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
