use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tabled::{Table, Tabled};

use crate::domain::{FeatureValue, PatternMatch};
use crate::error::Result;
use crate::patterns::bin_feature;
use crate::services::{CheckSummary, RoiRunSummary};

#[derive(Parser)]
#[command(name = "sharpline")]
#[command(author = "Sharpline Team")]
#[command(version = "0.1.0")]
#[command(about = "Betting pattern matching, ROI tracking and trend scoring", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config directory (default.toml plus $SHARPLINE_ENV overrides)
    #[arg(short, long, default_value = "config", global = true)]
    pub config: String,

    /// Print results as JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API
    Serve {
        /// Port override (default: server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Match a user's saved patterns against today's games
    CheckPatterns {
        /// User whose patterns are checked
        #[arg(short, long)]
        user: String,
    },
    /// Settle finished matches and recompute ROI for every pattern
    CalculateRoi,
    /// Show the bin label for a feature value
    Bin {
        #[arg(short, long)]
        feature: String,
        /// Value as JSON (`3.2`, `true`, `"L"`) or bare text; `null` for missing
        #[arg(short, long)]
        value: String,
    },
    /// Create the service-owned tables if missing
    InitDb,
}

/// Output mode for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Table,
    Json,
}

impl OutputMode {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Table
        }
    }
}

/// Print a vec of Tabled + Serialize items in the chosen mode.
pub fn print_items<T: Tabled + Serialize>(items: &[T], mode: OutputMode) -> Result<()> {
    match mode {
        OutputMode::Table => {
            if items.is_empty() {
                println!("(no results)");
            } else {
                println!("{}", Table::new(items));
            }
        }
        OutputMode::Json => println!("{}", serde_json::to_string_pretty(items)?),
    }
    Ok(())
}

/// Parse a CLI feature value: JSON literal when it parses, text otherwise
pub fn parse_feature_value(raw: &str) -> FeatureValue {
    match serde_json::from_str::<Value>(raw.trim()) {
        Ok(v) => FeatureValue::from_json(&v),
        Err(_) => FeatureValue::Text(raw.to_string()),
    }
}

#[derive(Debug, Serialize, Tabled)]
pub struct BinRow {
    pub feature: String,
    pub value: String,
    pub label: String,
}

pub fn show_bin(feature: &str, raw: &str, mode: OutputMode) -> Result<()> {
    let value = parse_feature_value(raw);
    let row = BinRow {
        feature: feature.to_string(),
        value: raw.to_string(),
        label: bin_feature(feature, &value),
    };
    print_items(&[row], mode)
}

fn price(p: Option<i32>) -> String {
    match p {
        Some(p) if p > 0 => format!("+{}", p),
        Some(p) => p.to_string(),
        None => "-".to_string(),
    }
}

#[derive(Debug, Serialize, Tabled)]
pub struct MatchRow {
    pub game: String,
    pub matchup: String,
    pub combo: String,
    pub target: String,
    pub pick: String,
    pub ml: String,
    pub total: String,
    pub lines: String,
}

impl From<&PatternMatch> for MatchRow {
    fn from(m: &PatternMatch) -> Self {
        Self {
            game: m.game_id.clone(),
            matchup: format!("{} vs {}", m.primary_team, m.opponent_team),
            combo: m.combo.clone(),
            target: m.target.to_string(),
            pick: m.predicted_side.to_string(),
            ml: format!("{} / {}", price(m.lines.primary_ml), price(m.lines.opponent_ml)),
            total: m
                .lines
                .o_u_line
                .map(|l| l.to_string())
                .unwrap_or_else(|| "-".to_string()),
            lines: m.lines_source.clone(),
        }
    }
}

pub fn show_check_summary(summary: &CheckSummary, mode: OutputMode) -> Result<()> {
    if mode == OutputMode::Json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }
    println!(
        "{} patterns x {} games: {} matches",
        summary.patterns_checked,
        summary.games_checked,
        summary.matches.len()
    );
    let rows: Vec<MatchRow> = summary.matches.iter().map(MatchRow::from).collect();
    print_items(&rows, mode)
}

#[derive(Debug, Serialize, Tabled)]
pub struct RoiRow {
    pub pattern: String,
    pub combo: String,
    pub target: String,
    pub games: i64,
    pub record: String,
    pub total_roi: String,
    pub avg_roi: String,
}

pub fn show_roi_summary(summary: &RoiRunSummary, mode: OutputMode) -> Result<()> {
    if mode == OutputMode::Json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }
    println!(
        "{} patterns processed, {} failed, {} matches settled",
        summary.processed_patterns, summary.failed_patterns, summary.settled_matches
    );
    let rows: Vec<RoiRow> = summary
        .calculations
        .iter()
        .map(|c| RoiRow {
            pattern: c.pattern_id.to_string(),
            combo: c.combo.clone(),
            target: c.target.to_string(),
            games: c.record.total_games,
            record: format!("{}-{}", c.record.wins, c.record.losses),
            total_roi: format!("{:.2}", c.record.total_roi),
            avg_roi: format!("{:.2}", c.record.avg_roi),
        })
        .collect();
    print_items(&rows, mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feature_value() {
        assert_eq!(parse_feature_value("3.2"), FeatureValue::Number(3.2));
        assert_eq!(parse_feature_value("true"), FeatureValue::Bool(true));
        assert_eq!(parse_feature_value("null"), FeatureValue::Null);
        assert_eq!(parse_feature_value("\"L\""), FeatureValue::Text("L".into()));
        assert_eq!(parse_feature_value("L"), FeatureValue::Text("L".into()));
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["sharpline", "check-patterns", "--user", "u1"]).unwrap();
        assert!(matches!(cli.command, Commands::CheckPatterns { ref user } if user == "u1"));

        let cli = Cli::try_parse_from([
            "sharpline", "bin", "--feature", "home_era", "--value", "3.2", "--json",
        ])
        .unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Bin { .. }));
    }

    #[test]
    fn test_price_format() {
        assert_eq!(price(Some(120)), "+120");
        assert_eq!(price(Some(-110)), "-110");
        assert_eq!(price(None), "-");
    }
}
