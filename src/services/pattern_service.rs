//! Pattern jobs: the daily match check, ROI recalculation, and saving or
//! discovering patterns from history.
//!
//! Storage sits behind [`PatternRepository`] so the jobs can run against
//! Postgres in production and a mock in tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::postgres::PostgresStore;
use crate::domain::{
    BetTarget, BettingLines, DailyMatch, FeatureValue, GameFeatureRow, League, PatternMatch,
    RoiRecord, SavedPattern,
};
use crate::error::{Result, SharplineError};
use crate::filters::FilterSet;
use crate::patterns::binning::{BINNING_RULES_VERSION, COMBO_SEPARATOR};
use crate::patterns::discovery::{historical_outcome, ou_outcome};
use crate::patterns::roi::counting_from;
use crate::patterns::{
    calculate_roi, combo_stats, discover_combos, find_matches, lines_from_row, ComboStats,
    RoiTally,
};
use crate::validation::{validate_features, validate_user_id};

/// Row cap for one feature-view read
pub const MAX_VIEW_ROWS: i64 = 50_000;

/// Storage used by the pattern jobs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PatternRepository: Send + Sync {
    async fn patterns_for_user(&self, user_id: &str) -> Result<Vec<SavedPattern>>;

    async fn all_patterns(&self) -> Result<Vec<SavedPattern>>;

    async fn insert_pattern(&self, pattern: &SavedPattern) -> Result<()>;

    /// Today's feature rows (one per team perspective)
    async fn games_on(&self, date: NaiveDate) -> Result<Vec<GameFeatureRow>>;

    /// Historical rows with outcome columns
    async fn training_rows(&self, filters: &FilterSet) -> Result<Vec<GameFeatureRow>>;

    /// Historical rows by game id
    async fn training_rows_by_id(&self, game_ids: &[String]) -> Result<Vec<GameFeatureRow>>;

    /// Live lines for a game, if the lines table has any
    async fn live_lines(&self, game_id: &str) -> Result<Option<BettingLines>>;

    async fn upsert_daily_match(&self, m: &DailyMatch) -> Result<()>;

    async fn daily_matches_since(&self, pattern_id: Uuid, since: NaiveDate) -> Result<Vec<DailyMatch>>;

    async fn unsettled_daily_matches(&self, before: NaiveDate) -> Result<Vec<DailyMatch>>;

    async fn record_outcome(&self, m: &DailyMatch) -> Result<()>;

    async fn upsert_roi(&self, record: &RoiRecord) -> Result<()>;
}

fn rows_from_json(rows: Vec<serde_json::Map<String, serde_json::Value>>) -> Vec<GameFeatureRow> {
    let total = rows.len();
    let parsed: Vec<GameFeatureRow> = rows.iter().filter_map(GameFeatureRow::from_json_row).collect();
    if parsed.len() < total {
        warn!(dropped = total - parsed.len(), "feature rows without training_key or unique_id");
    }
    parsed
}

#[async_trait]
impl PatternRepository for PostgresStore {
    async fn patterns_for_user(&self, user_id: &str) -> Result<Vec<SavedPattern>> {
        self.list_patterns(Some(user_id)).await
    }

    async fn all_patterns(&self) -> Result<Vec<SavedPattern>> {
        self.list_patterns(None).await
    }

    async fn insert_pattern(&self, pattern: &SavedPattern) -> Result<()> {
        PostgresStore::insert_pattern(self, pattern).await
    }

    async fn games_on(&self, date: NaiveDate) -> Result<Vec<GameFeatureRow>> {
        let view = League::Mlb
            .input_view()
            .ok_or_else(|| SharplineError::Internal("no input view for mlb".into()))?;
        let rows = self
            .fetch_view_rows(view, Some(date), &FilterSet::default(), MAX_VIEW_ROWS)
            .await?;
        Ok(rows_from_json(rows))
    }

    async fn training_rows(&self, filters: &FilterSet) -> Result<Vec<GameFeatureRow>> {
        let view = League::Mlb
            .training_view()
            .ok_or_else(|| SharplineError::Internal("no training view for mlb".into()))?;
        let rows = self.fetch_view_rows(view, None, filters, MAX_VIEW_ROWS).await?;
        Ok(rows_from_json(rows))
    }

    async fn training_rows_by_id(&self, game_ids: &[String]) -> Result<Vec<GameFeatureRow>> {
        let view = League::Mlb
            .training_view()
            .ok_or_else(|| SharplineError::Internal("no training view for mlb".into()))?;
        let rows = self.fetch_view_rows_by_key(view, game_ids).await?;
        Ok(rows_from_json(rows))
    }

    async fn live_lines(&self, game_id: &str) -> Result<Option<BettingLines>> {
        let Some(row) = self.circa_lines(game_id).await? else {
            return Ok(None);
        };
        let snapshot = GameFeatureRow {
            game_id: game_id.to_string(),
            game_date: None,
            primary_team: String::new(),
            opponent_team: String::new(),
            is_home_team: None,
            features: row
                .iter()
                .map(|(k, v)| (k.clone(), FeatureValue::from_json(v)))
                .collect(),
        };
        Ok(Some(lines_from_row(&snapshot)))
    }

    async fn upsert_daily_match(&self, m: &DailyMatch) -> Result<()> {
        PostgresStore::upsert_daily_match(self, m).await
    }

    async fn daily_matches_since(&self, pattern_id: Uuid, since: NaiveDate) -> Result<Vec<DailyMatch>> {
        PostgresStore::daily_matches_since(self, pattern_id, since).await
    }

    async fn unsettled_daily_matches(&self, before: NaiveDate) -> Result<Vec<DailyMatch>> {
        PostgresStore::unsettled_daily_matches(self, before).await
    }

    async fn record_outcome(&self, m: &DailyMatch) -> Result<()> {
        PostgresStore::record_outcome(self, m).await
    }

    async fn upsert_roi(&self, record: &RoiRecord) -> Result<()> {
        PostgresStore::upsert_roi(self, record).await
    }
}

/// Result of one daily match check
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckSummary {
    pub date: Option<NaiveDate>,
    pub patterns_checked: usize,
    pub games_checked: usize,
    pub matches: Vec<PatternMatch>,
    /// Matches returned but not persisted
    pub failed_upserts: usize,
}

/// ROI outcome for one pattern
#[derive(Debug, Clone, Serialize)]
pub struct RoiCalculation {
    pub pattern_id: Uuid,
    pub combo: String,
    pub target: BetTarget,
    #[serde(flatten)]
    pub record: RoiRecord,
    pub skipped_matches: i64,
}

/// Result of one ROI run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RoiRunSummary {
    pub processed_patterns: usize,
    pub settled_matches: usize,
    pub failed_patterns: usize,
    pub calculations: Vec<RoiCalculation>,
}

/// Pattern jobs over a repository
#[derive(Clone)]
pub struct PatternService {
    repo: Arc<dyn PatternRepository>,
}

impl PatternService {
    pub fn new(repo: Arc<dyn PatternRepository>) -> Self {
        Self { repo }
    }

    /// Lines for a game: live table first, then the snapshot on the
    /// feature row. Lookup failures fall back rather than abort the batch.
    pub async fn lines_for(&self, game: &GameFeatureRow) -> (BettingLines, &'static str) {
        match self.repo.live_lines(&game.game_id).await {
            Ok(Some(lines)) if !lines.is_empty() => return (lines, "circa_lines"),
            Ok(_) => warn!(game_id = %game.game_id, "no live lines, using feature view"),
            Err(e) => warn!(game_id = %game.game_id, error = %e, "live lines lookup failed, using feature view"),
        }
        let snapshot = lines_from_row(game);
        if snapshot.is_empty() {
            warn!(game_id = %game.game_id, "no lines available for game");
            (BettingLines::default(), "none")
        } else {
            (snapshot, "feature_view")
        }
    }

    /// Match a user's saved patterns against `today`'s games and persist
    /// each match. No patterns or no games is an empty result, not an error.
    #[instrument(skip(self))]
    pub async fn check_saved_patterns(&self, user_id: &str, today: NaiveDate) -> Result<CheckSummary> {
        validate_user_id(user_id)?;

        let patterns = self.repo.patterns_for_user(user_id).await?;
        let mut summary = CheckSummary {
            date: Some(today),
            patterns_checked: patterns.len(),
            ..Default::default()
        };
        if patterns.is_empty() {
            info!(user_id, "user has no saved patterns");
            return Ok(summary);
        }

        let games = self.repo.games_on(today).await?;
        summary.games_checked = games.len();
        if games.is_empty() {
            info!(%today, "no games today");
            return Ok(summary);
        }

        let mut lines_by_game: HashMap<&str, (BettingLines, &'static str)> = HashMap::new();
        for candidate in find_matches(&patterns, &games) {
            let game = candidate.game;
            let pattern = candidate.pattern;
            if !lines_by_game.contains_key(game.game_id.as_str()) {
                let lines = self.lines_for(game).await;
                lines_by_game.insert(game.game_id.as_str(), lines);
            }
            let (lines, source) = lines_by_game
                .get(game.game_id.as_str())
                .cloned()
                .unwrap_or_else(|| (BettingLines::default(), "none"));

            let m = PatternMatch {
                pattern_id: pattern.id,
                combo: pattern.combo.clone(),
                target: pattern.target,
                predicted_side: pattern.predicted_side(),
                game_id: game.game_id.clone(),
                game_date: today,
                primary_team: game.primary_team.clone(),
                opponent_team: game.opponent_team.clone(),
                is_home_game: game.is_home_team,
                lines,
                lines_source: source.to_string(),
            };

            if let Err(e) = self.repo.upsert_daily_match(&m.to_daily_match()).await {
                error!(pattern_id = %m.pattern_id, game_id = %m.game_id, error = %e, "failed to store daily match");
                summary.failed_upserts += 1;
            }
            summary.matches.push(m);
        }

        info!(
            user_id,
            patterns = summary.patterns_checked,
            games = summary.games_checked,
            matches = summary.matches.len(),
            "pattern check complete"
        );
        Ok(summary)
    }

    /// Fill outcomes of finished daily matches from the training view.
    /// Returns how many matches were updated.
    #[instrument(skip(self))]
    pub async fn settle_daily_matches(&self, today: NaiveDate) -> Result<usize> {
        let open = self.repo.unsettled_daily_matches(today).await?;
        if open.is_empty() {
            return Ok(0);
        }

        let ids: Vec<String> = open
            .iter()
            .map(|m| m.game_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let rows = self.repo.training_rows_by_id(&ids).await?;
        let by_id: HashMap<&str, &GameFeatureRow> =
            rows.iter().map(|r| (r.game_id.as_str(), r)).collect();

        let mut settled = 0;
        for mut m in open {
            let Some(row) = by_id.get(m.game_id.as_str()) else {
                debug!(game_id = %m.game_id, "no result yet");
                continue;
            };
            m.primary_ml_won = historical_outcome(row, BetTarget::Moneyline);
            m.primary_rl_won = historical_outcome(row, BetTarget::Runline);
            m.ou_result = ou_outcome(row);
            if !m.is_settled() {
                continue;
            }
            match self.repo.record_outcome(&m).await {
                Ok(()) => settled += 1,
                Err(e) => error!(pattern_id = %m.pattern_id, game_id = %m.game_id, error = %e, "failed to record outcome"),
            }
        }

        info!(open = ids.len(), settled, "daily matches settled");
        Ok(settled)
    }

    /// Recompute and store ROI for every saved pattern.
    #[instrument(skip(self))]
    pub async fn calculate_pattern_roi(&self, today: NaiveDate) -> Result<RoiRunSummary> {
        let settled_matches = match self.settle_daily_matches(today).await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "settling daily matches failed, using recorded outcomes");
                0
            }
        };

        let patterns = self.repo.all_patterns().await?;
        let mut summary = RoiRunSummary {
            settled_matches,
            ..Default::default()
        };

        for pattern in &patterns {
            let history = match self
                .repo
                .daily_matches_since(pattern.id, counting_from(pattern))
                .await
            {
                Ok(h) => h,
                Err(e) => {
                    error!(pattern_id = %pattern.id, error = %e, "failed to load daily matches");
                    summary.failed_patterns += 1;
                    continue;
                }
            };

            let (record, tally): (RoiRecord, RoiTally) = calculate_roi(pattern, &history);
            if let Err(e) = self.repo.upsert_roi(&record).await {
                error!(pattern_id = %pattern.id, error = %e, "failed to store ROI");
                summary.failed_patterns += 1;
                continue;
            }

            debug!(
                pattern_id = %pattern.id,
                games = record.total_games,
                total_roi = record.total_roi,
                "pattern ROI updated"
            );
            summary.processed_patterns += 1;
            summary.calculations.push(RoiCalculation {
                pattern_id: pattern.id,
                combo: pattern.combo.clone(),
                target: pattern.target,
                record,
                skipped_matches: tally.skipped,
            });
        }

        info!(
            patterns = patterns.len(),
            processed = summary.processed_patterns,
            failed = summary.failed_patterns,
            "ROI calculation complete"
        );
        Ok(summary)
    }

    /// Combos of `features` over filtered history, strongest edge first
    #[instrument(skip(self, filters))]
    pub async fn discover(
        &self,
        features: &[String],
        target: BetTarget,
        min_games: i64,
        filters: &FilterSet,
    ) -> Result<Vec<ComboStats>> {
        validate_features(features)?;
        let rows = self.repo.training_rows(filters).await?;
        Ok(discover_combos(&rows, features, target, min_games))
    }

    /// Save a pattern with stats recomputed from history under the current
    /// binning rules.
    #[instrument(skip(self, filters))]
    pub async fn save_pattern(
        &self,
        user_id: &str,
        features: Vec<String>,
        combo: &str,
        target: BetTarget,
        filters: &FilterSet,
    ) -> Result<SavedPattern> {
        validate_user_id(user_id)?;
        validate_features(&features)?;
        if combo.split(COMBO_SEPARATOR).count() != features.len() {
            return Err(SharplineError::Validation(format!(
                "combo {:?} does not have one label per feature ({})",
                combo,
                features.len()
            )));
        }

        let rows = self.repo.training_rows(filters).await?;
        let stats = combo_stats(&rows, &features, combo, target);
        if stats.games == 0 {
            return Err(SharplineError::Validation(format!(
                "combo {:?} never occurs in history",
                combo
            )));
        }

        let pattern = SavedPattern {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            features,
            combo: stats.combo,
            target,
            win_pct: stats.win_pct,
            opponent_win_pct: stats.opponent_win_pct,
            games: stats.games,
            dominant_side: Some(stats.dominant_side),
            binning_version: BINNING_RULES_VERSION,
            created_at: Utc::now(),
        };
        self.repo.insert_pattern(&pattern).await?;
        info!(pattern_id = %pattern.id, combo = %pattern.combo, games = pattern.games, "pattern saved");
        Ok(pattern)
    }
}
