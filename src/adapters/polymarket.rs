//! Polymarket Gamma/CLOB pass-through used by the `polymarket-proxy`
//! function. Requests are action-dispatched; upstream failures surface as
//! [`SharplineError::Upstream`] with the upstream status code.

use crate::adapters::team_names::TeamMatcher;
use crate::config::PolymarketConfig;
use crate::error::{Result, SharplineError};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// Default page size for event listings
const DEFAULT_EVENT_LIMIT: u32 = 100;

fn deserialize_optional_number<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.parse::<f64>().ok(),
        _ => None,
    })
}

/// Gamma market; list-valued fields arrive as JSON-encoded strings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GammaMarket {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(rename = "conditionId", alias = "condition_id", default)]
    pub condition_id: Option<String>,
    #[serde(rename = "outcomePrices", default)]
    pub outcome_prices: Option<String>,
    #[serde(rename = "clobTokenIds", default)]
    pub clob_token_ids: Option<String>,
    #[serde(default)]
    pub outcomes: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_number")]
    pub volume: Option<f64>,
}

impl GammaMarket {
    fn decode_list(raw: Option<&String>) -> Vec<String> {
        raw.and_then(|s| serde_json::from_str::<Vec<String>>(s).ok())
            .unwrap_or_default()
    }

    pub fn outcome_names(&self) -> Vec<String> {
        Self::decode_list(self.outcomes.as_ref())
    }

    pub fn token_ids(&self) -> Vec<String> {
        Self::decode_list(self.clob_token_ids.as_ref())
    }

    /// Outcome prices in outcome order; unparseable entries are dropped
    pub fn prices(&self) -> Vec<Decimal> {
        Self::decode_list(self.outcome_prices.as_ref())
            .iter()
            .filter_map(|p| p.parse::<Decimal>().ok())
            .collect()
    }
}

/// Gamma event with its markets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GammaEvent {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub closed: bool,
    #[serde(rename = "startDate", default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub markets: Vec<GammaMarket>,
}

/// A proxy request, dispatched on `action`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ProxyAction {
    Events {
        #[serde(alias = "tagId")]
        tag_id: Option<String>,
        #[serde(alias = "seriesId")]
        series_id: Option<String>,
        #[serde(default)]
        closed: bool,
        limit: Option<u32>,
    },
    Market {
        slug: String,
    },
    Price {
        #[serde(alias = "tokenId")]
        token_id: String,
        side: Option<String>,
    },
    Midpoint {
        #[serde(alias = "tokenId")]
        token_id: String,
    },
    FindGame {
        #[serde(alias = "homeTeam")]
        home_team: String,
        #[serde(alias = "awayTeam")]
        away_team: String,
        #[serde(alias = "tagId")]
        tag_id: Option<String>,
        #[serde(alias = "seriesId")]
        series_id: Option<String>,
    },
}

/// Gamma + CLOB REST client
#[derive(Clone)]
pub struct PolymarketClient {
    client: Client,
    gamma_url: String,
    clob_url: String,
}

impl PolymarketClient {
    pub fn new(config: &PolymarketConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            gamma_url: config.gamma_url.trim_end_matches('/').to_string(),
            clob_url: config.clob_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        debug!(%url, "polymarket request");
        let resp = self.client.get(url).query(query).send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(SharplineError::Upstream {
                status,
                message: format!("Polymarket: {}", text),
            });
        }

        Ok(resp.json().await?)
    }

    /// Open (or closed) events, optionally by tag or series
    pub async fn events(
        &self,
        tag_id: Option<&str>,
        series_id: Option<&str>,
        closed: bool,
        limit: u32,
    ) -> Result<Vec<GammaEvent>> {
        let mut query = vec![
            ("closed", closed.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(tag) = tag_id {
            query.push(("tag_id", tag.to_string()));
        }
        if let Some(series) = series_id {
            query.push(("series_id", series.to_string()));
        }

        let value = self
            .get_json(&format!("{}/events", self.gamma_url), &query)
            .await?;
        let events: Vec<GammaEvent> = serde_json::from_value(value)?;
        debug!(count = events.len(), "fetched gamma events");
        Ok(events)
    }

    /// One market by slug
    pub async fn market_by_slug(&self, slug: &str) -> Result<GammaMarket> {
        let value = self
            .get_json(
                &format!("{}/markets", self.gamma_url),
                &[("slug", slug.to_string())],
            )
            .await?;
        let markets: Vec<GammaMarket> = serde_json::from_value(value)?;
        markets
            .into_iter()
            .next()
            .ok_or_else(|| SharplineError::NotFound(format!("market {}", slug)))
    }

    /// Best price for a token on one side of the book
    pub async fn price(&self, token_id: &str, side: &str) -> Result<Value> {
        self.get_json(
            &format!("{}/price", self.clob_url),
            &[("token_id", token_id.to_string()), ("side", side.to_string())],
        )
        .await
    }

    pub async fn midpoint(&self, token_id: &str) -> Result<Value> {
        self.get_json(
            &format!("{}/midpoint", self.clob_url),
            &[("token_id", token_id.to_string())],
        )
        .await
    }

    /// The open event whose title names both teams
    pub async fn find_game(
        &self,
        matcher: &TeamMatcher,
        home_team: &str,
        away_team: &str,
        tag_id: Option<&str>,
        series_id: Option<&str>,
    ) -> Result<Option<GammaEvent>> {
        let events = self
            .events(tag_id, series_id, false, DEFAULT_EVENT_LIMIT)
            .await?;
        let found = find_event(matcher, events, home_team, away_team);
        match &found {
            Some(e) => info!(title = %e.title, "found polymarket game"),
            None => warn!(home_team, away_team, "no polymarket game found"),
        }
        Ok(found)
    }

    /// Run one proxy action and return the JSON body for the caller
    pub async fn dispatch(&self, matcher: &TeamMatcher, action: ProxyAction) -> Result<Value> {
        match action {
            ProxyAction::Events {
                tag_id,
                series_id,
                closed,
                limit,
            } => {
                let events = self
                    .events(
                        tag_id.as_deref(),
                        series_id.as_deref(),
                        closed,
                        limit.unwrap_or(DEFAULT_EVENT_LIMIT),
                    )
                    .await?;
                Ok(json!({ "events": events }))
            }
            ProxyAction::Market { slug } => {
                let market = self.market_by_slug(&slug).await?;
                Ok(market_json(&market))
            }
            ProxyAction::Price { token_id, side } => {
                let side = side.unwrap_or_else(|| "buy".to_string()).to_ascii_lowercase();
                if side != "buy" && side != "sell" {
                    return Err(SharplineError::Validation(format!(
                        "side must be buy or sell, got {}",
                        side
                    )));
                }
                self.price(&token_id, &side).await
            }
            ProxyAction::Midpoint { token_id } => self.midpoint(&token_id).await,
            ProxyAction::FindGame {
                home_team,
                away_team,
                tag_id,
                series_id,
            } => {
                let event = self
                    .find_game(
                        matcher,
                        &home_team,
                        &away_team,
                        tag_id.as_deref(),
                        series_id.as_deref(),
                    )
                    .await?;
                Ok(json!({
                    "event": event,
                    "markets": event
                        .as_ref()
                        .map(|e| e.markets.iter().map(market_json).collect::<Vec<_>>())
                        .unwrap_or_default(),
                }))
            }
        }
    }
}

/// Market plus its decoded outcome lists
fn market_json(market: &GammaMarket) -> Value {
    json!({
        "market": market,
        "outcomes": market.outcome_names(),
        "prices": market.prices(),
        "tokenIds": market.token_ids(),
    })
}

/// First event whose title (or slug) mentions both teams
pub fn find_event(
    matcher: &TeamMatcher,
    events: Vec<GammaEvent>,
    home_team: &str,
    away_team: &str,
) -> Option<GammaEvent> {
    events.into_iter().find(|e| {
        let text = format!("{} {}", e.title, e.slug.replace('-', " "));
        matcher.mentions(&text, home_team) && matcher.mentions(&text, away_team)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn event(title: &str, slug: &str) -> GammaEvent {
        GammaEvent {
            id: "1".into(),
            title: title.into(),
            slug: slug.into(),
            closed: false,
            start_date: None,
            markets: vec![],
        }
    }

    #[test]
    fn test_market_decodes_string_lists() {
        let raw = json!({
            "question": "Lakers vs. Celtics",
            "outcomePrices": "[\"0.42\", \"0.58\"]",
            "clobTokenIds": "[\"111\", \"222\"]",
            "outcomes": "[\"Lakers\", \"Celtics\"]",
            "volume": "12345.5"
        });
        let market: GammaMarket = serde_json::from_value(raw).unwrap();
        assert_eq!(market.prices(), vec![dec!(0.42), dec!(0.58)]);
        assert_eq!(market.token_ids(), vec!["111", "222"]);
        assert_eq!(market.outcome_names()[1], "Celtics");
        assert_eq!(market.volume, Some(12345.5));
    }

    #[test]
    fn test_action_parsing() {
        let a: ProxyAction =
            serde_json::from_value(json!({"action": "price", "tokenId": "9"})).unwrap();
        assert!(matches!(a, ProxyAction::Price { ref token_id, side: None } if token_id == "9"));

        let a: ProxyAction = serde_json::from_value(
            json!({"action": "find_game", "homeTeam": "Celtics", "awayTeam": "Lakers"}),
        )
        .unwrap();
        assert!(matches!(a, ProxyAction::FindGame { .. }));

        assert!(serde_json::from_value::<ProxyAction>(json!({"action": "trade"})).is_err());
    }

    #[test]
    fn test_find_event_needs_both_teams() {
        let matcher = TeamMatcher::new();
        let events = vec![
            event("Lakers vs. Warriors", "nba-lal-gsw-2024-01-01"),
            event("Lakers vs. Celtics", "nba-lal-bos-2024-01-01"),
        ];
        let found = find_event(&matcher, events, "Boston Celtics", "Los Angeles Lakers");
        assert_eq!(found.unwrap().title, "Lakers vs. Celtics");
    }
}
