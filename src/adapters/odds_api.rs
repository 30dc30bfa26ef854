//! The Odds API v4 client with a per-process TTL cache and request
//! coalescing: concurrent callers for the same `(sport, bookmakers)` key
//! share one upstream request.

use crate::config::OddsConfig;
use crate::error::{Result, SharplineError};
use crate::validation::validate_identifier;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Markets requested for every sport
const ODDS_MARKETS: &str = "h2h,spreads,totals";

/// Odds from a single outcome (American format)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub point: Option<f64>,
}

/// Market odds (h2h, spreads, totals)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOdds {
    pub key: String,
    pub outcomes: Vec<Outcome>,
}

/// Bookmaker odds for a game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmakerOdds {
    pub key: String,
    pub title: String,
    #[serde(default)]
    pub last_update: Option<String>,
    pub markets: Vec<MarketOdds>,
}

/// Game event with odds from multiple bookmakers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    pub id: String,
    pub sport_key: String,
    #[serde(default)]
    pub sport_title: String,
    pub commence_time: String,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub bookmakers: Vec<BookmakerOdds>,
}

type FetchResult = std::result::Result<Arc<Vec<GameEvent>>, Arc<SharplineError>>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

struct CachedOdds {
    events: Arc<Vec<GameEvent>>,
    fetched_at: Instant,
}

/// TTL cache plus in-flight request map, owned by the serving process
#[derive(Clone)]
pub struct OddsCache {
    ttl: Duration,
    entries: Arc<DashMap<String, CachedOdds>>,
    in_flight: Arc<DashMap<String, SharedFetch>>,
}

impl OddsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(DashMap::new()),
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Cache key: sport plus the sorted bookmaker list
    pub fn key(sport_key: &str, bookmakers: &[String]) -> String {
        let mut books: Vec<&str> = bookmakers.iter().map(String::as_str).collect();
        books.sort_unstable();
        books.dedup();
        format!("{}:{}", sport_key, books.join(","))
    }

    /// Fresh cached value, if any
    pub fn get_fresh(&self, key: &str) -> Option<Arc<Vec<GameEvent>>> {
        let entry = self.entries.get(key)?;
        if entry.fetched_at.elapsed() < self.ttl {
            Some(entry.events.clone())
        } else {
            None
        }
    }

    /// Cached keys, fresh or stale
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Return the cached value for `key`, or join/start the upstream fetch.
    ///
    /// Only one `fetch` runs per key at a time. A failed fetch is not cached
    /// and its in-flight entry is cleared, so the next caller retries.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> Result<Arc<Vec<GameEvent>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<GameEvent>>> + Send + 'static,
    {
        if let Some(events) = self.get_fresh(key) {
            debug!(key, "odds cache hit");
            return Ok(events);
        }

        let shared = match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(existing) => {
                debug!(key, "joining in-flight odds request");
                existing.get().clone()
            }
            Entry::Vacant(slot) => {
                let fut = fetch()
                    .map(|r| r.map(Arc::new).map_err(Arc::new))
                    .boxed()
                    .shared();
                slot.insert(fut.clone());
                fut
            }
        };

        let outcome = shared.clone().await;
        // a late joiner must not drop a newer request for the same key
        self.in_flight.remove_if(key, |_, f| f.ptr_eq(&shared));

        match outcome {
            Ok(events) => {
                self.entries.insert(
                    key.to_string(),
                    CachedOdds {
                        events: events.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                Ok(events)
            }
            Err(e) => {
                warn!(key, error = %e, "odds fetch failed");
                Err(clone_error(&e))
            }
        }
    }
}

fn clone_error(e: &SharplineError) -> SharplineError {
    match e {
        SharplineError::Upstream { status, message } => SharplineError::Upstream {
            status: *status,
            message: message.clone(),
        },
        SharplineError::Validation(msg) => SharplineError::Validation(msg.clone()),
        other => SharplineError::Internal(other.to_string()),
    }
}

/// The Odds API client
#[derive(Clone)]
pub struct OddsClient {
    client: Client,
    config: OddsConfig,
    cache: OddsCache,
}

impl OddsClient {
    pub fn new(config: OddsConfig, cache: OddsCache) -> Self {
        Self {
            client: Client::new(),
            config,
            cache,
        }
    }

    pub fn cache(&self) -> &OddsCache {
        &self.cache
    }

    pub fn is_configured(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    /// Odds for a sport key (e.g. `basketball_nba`), through the cache.
    ///
    /// `bookmakers` overrides the configured list when non-empty.
    pub async fn get_odds(
        &self,
        sport_key: &str,
        bookmakers: &[String],
    ) -> Result<Arc<Vec<GameEvent>>> {
        validate_identifier(sport_key, "sport_key")?;
        let books: Vec<String> = if bookmakers.is_empty() {
            self.config.bookmakers.clone()
        } else {
            bookmakers.to_vec()
        };
        for book in &books {
            validate_identifier(book, "bookmaker")?;
        }

        if !self.is_configured() {
            return Err(SharplineError::Config(config::ConfigError::NotFound(
                "odds.api_key".to_string(),
            )));
        }

        let key = OddsCache::key(sport_key, &books);
        let client = self.client.clone();
        let url = format!(
            "{}/sports/{}/odds",
            self.config.base_url.trim_end_matches('/'),
            sport_key
        );
        let api_key = self.config.api_key.clone();
        let region = self.config.region.clone();
        let joined = books.join(",");
        let sport = sport_key.to_string();

        self.cache
            .get_or_fetch(&key, move || async move {
                fetch_odds(client, url, api_key, region, joined, sport).await
            })
            .await
    }
}

async fn fetch_odds(
    client: Client,
    url: String,
    api_key: String,
    region: String,
    bookmakers: String,
    sport: String,
) -> Result<Vec<GameEvent>> {
    debug!(%url, %bookmakers, "fetching odds");

    let response = client
        .get(&url)
        .query(&[
            ("apiKey", api_key.as_str()),
            ("regions", region.as_str()),
            ("markets", ODDS_MARKETS),
            ("bookmakers", bookmakers.as_str()),
            ("oddsFormat", "american"),
        ])
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        return Err(SharplineError::Upstream {
            status,
            message: format!("Odds API: {}", text),
        });
    }

    let events: Vec<GameEvent> = response.json().await?;
    info!(sport = %sport, games = events.len(), "fetched odds");
    Ok(events)
}
