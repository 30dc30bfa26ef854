use serde::{Deserialize, Serialize};
use std::fmt;

/// Leagues with data in the warehouse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum League {
    Mlb,
    Nfl,
    Nba,
    Ncaab,
}

impl League {
    pub fn as_str(&self) -> &'static str {
        match self {
            League::Mlb => "mlb",
            League::Nfl => "nfl",
            League::Nba => "nba",
            League::Ncaab => "ncaab",
        }
    }

    /// Historical feature view with outcome columns
    pub fn training_view(&self) -> Option<&'static str> {
        match self {
            League::Mlb => Some("training_data_team_view"),
            League::Nfl => Some("nfl_training_data_team_view"),
            League::Nba | League::Ncaab => None,
        }
    }

    /// Pre-game feature view for upcoming games
    pub fn input_view(&self) -> Option<&'static str> {
        match self {
            League::Mlb => Some("input_values_team_format_view"),
            League::Nba => Some("nba_input_values_view"),
            League::Ncaab => Some("v_cbb_input_values"),
            League::Nfl => None,
        }
    }

    /// Situational trends table; the `_today` variant is preferred when populated
    pub fn trends_table(&self) -> Option<&'static str> {
        match self {
            League::Nba => Some("nba_game_situational_trends"),
            League::Ncaab => Some("ncaab_game_situational_trends"),
            League::Mlb | League::Nfl => None,
        }
    }
}

impl TryFrom<&str> for League {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mlb" | "baseball" => Ok(League::Mlb),
            "nfl" => Ok(League::Nfl),
            "nba" => Ok(League::Nba),
            "ncaab" | "cbb" | "ncaam" => Ok(League::Ncaab),
            other => Err(format!("unknown league: {}", other)),
        }
    }
}

impl fmt::Display for League {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
