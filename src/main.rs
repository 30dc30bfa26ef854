use clap::Parser;
use sharpline::adapters::{start_api_server, PostgresStore};
use sharpline::cli::{self, Cli, Commands, OutputMode};
use sharpline::config::AppConfig;
use sharpline::domain::eastern_today;
use sharpline::error::{Result, SharplineError};
use sharpline::services::{PatternRepository, PatternService};
use std::sync::Arc;
use tracing::info;

mod main_runtime;

use main_runtime::{init_logging, init_logging_simple};

fn load_config(dir: &str) -> Result<AppConfig> {
    let config = AppConfig::load_from(dir)?;
    if let Err(problems) = config.validate() {
        for p in &problems {
            eprintln!("invalid configuration: {}", p);
        }
        return Err(SharplineError::Validation(problems.join("; ")));
    }
    Ok(config)
}

async fn connect(config: &AppConfig) -> Result<Arc<PostgresStore>> {
    let store =
        PostgresStore::new(&config.database.url, config.database.max_connections).await?;
    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mode = OutputMode::from_json_flag(cli.json);

    match &cli.command {
        Commands::Bin { feature, value } => {
            init_logging_simple();
            cli::show_bin(feature, value, mode)?;
        }
        Commands::Serve { port } => {
            let mut config = load_config(&cli.config)?;
            let _guard = init_logging(&config.logging);
            if let Some(port) = port {
                config.server.port = *port;
            }

            let store = connect(&config).await?;
            store.ensure_tables().await?;
            info!(port = config.server.port, "starting sharpline");
            start_api_server(store, &config).await?;
        }
        Commands::CheckPatterns { user } => {
            let config = load_config(&cli.config)?;
            init_logging_simple();
            let store: Arc<dyn PatternRepository> = connect(&config).await?;
            let summary = PatternService::new(store)
                .check_saved_patterns(user, eastern_today())
                .await?;
            cli::show_check_summary(&summary, mode)?;
        }
        Commands::CalculateRoi => {
            let config = load_config(&cli.config)?;
            init_logging_simple();
            let store: Arc<dyn PatternRepository> = connect(&config).await?;
            let summary = PatternService::new(store)
                .calculate_pattern_roi(eastern_today())
                .await?;
            cli::show_roi_summary(&summary, mode)?;
        }
        Commands::InitDb => {
            let config = load_config(&cli.config)?;
            init_logging_simple();
            let store = connect(&config).await?;
            store.ensure_tables().await?;
            println!("tables ready");
        }
    }

    Ok(())
}
