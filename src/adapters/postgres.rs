use crate::domain::{
    BetTarget, BettingLines, DailyMatch, League, OuResult, PickSide, RoiRecord, SavedPattern,
};
use crate::error::Result;
use crate::filters::FilterSet;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow, Postgres};
use sqlx::{QueryBuilder, Row};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// PostgreSQL storage adapter
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a store whose connections are opened on first use
    pub fn connect_lazy(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(database_url)?;
        Ok(Self { pool })
    }

    /// Create a PostgreSQL store from an existing connection pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Cheap connectivity check
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Create the pattern tables if they do not exist.
    ///
    /// Feature views and lines tables are owned by the warehouse and are
    /// never created here.
    pub async fn ensure_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS saved_trend_patterns (
                id UUID PRIMARY KEY,
                user_id TEXT NOT NULL,
                features TEXT[] NOT NULL,
                combo TEXT NOT NULL,
                target TEXT NOT NULL,
                win_pct DOUBLE PRECISION NOT NULL,
                opponent_win_pct DOUBLE PRECISION NOT NULL,
                games BIGINT NOT NULL DEFAULT 0,
                dominant_side TEXT,
                binning_version INTEGER NOT NULL DEFAULT 1,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // tables created before versioned binning
        sqlx::query(
            "ALTER TABLE saved_trend_patterns ADD COLUMN IF NOT EXISTS binning_version INTEGER NOT NULL DEFAULT 1",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_saved_trend_patterns_user ON saved_trend_patterns(user_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pattern_daily_matches (
                pattern_id UUID NOT NULL REFERENCES saved_trend_patterns(id) ON DELETE CASCADE,
                match_date DATE NOT NULL,
                game_id TEXT NOT NULL,
                primary_team TEXT NOT NULL,
                opponent_team TEXT NOT NULL,
                is_home_game BOOLEAN,
                primary_ml INTEGER,
                opponent_ml INTEGER,
                primary_rl DOUBLE PRECISION,
                primary_rl_price INTEGER,
                opponent_rl_price INTEGER,
                o_u_line DOUBLE PRECISION,
                over_price INTEGER,
                under_price INTEGER,
                primary_ml_won BOOLEAN,
                primary_rl_won BOOLEAN,
                ou_result TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (pattern_id, match_date, game_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pattern_roi (
                pattern_id UUID PRIMARY KEY REFERENCES saved_trend_patterns(id) ON DELETE CASCADE,
                total_games BIGINT NOT NULL,
                wins BIGINT NOT NULL,
                losses BIGINT NOT NULL,
                total_roi DOUBLE PRECISION NOT NULL,
                avg_roi DOUBLE PRECISION NOT NULL,
                calculated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Pattern tables ready");
        Ok(())
    }

    // ==================== Saved patterns ====================

    /// Insert a new saved pattern
    #[instrument(skip(self, pattern), fields(pattern_id = %pattern.id, user_id = %pattern.user_id))]
    pub async fn insert_pattern(&self, pattern: &SavedPattern) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO saved_trend_patterns (
                id, user_id, features, combo, target, win_pct, opponent_win_pct,
                games, dominant_side, binning_version, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(pattern.id)
        .bind(&pattern.user_id)
        .bind(&pattern.features)
        .bind(&pattern.combo)
        .bind(pattern.target.as_str())
        .bind(pattern.win_pct)
        .bind(pattern.opponent_win_pct)
        .bind(pattern.games)
        .bind(pattern.dominant_side.map(|s| s.as_str()))
        .bind(pattern.binning_version)
        .bind(pattern.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Saved patterns, optionally restricted to one user, oldest first
    #[instrument(skip(self))]
    pub async fn list_patterns(&self, user_id: Option<&str>) -> Result<Vec<SavedPattern>> {
        let mut qb = QueryBuilder::<Postgres>::new(
            r#"
            SELECT id, user_id, features, combo, target, win_pct, opponent_win_pct,
                   games, dominant_side, binning_version, created_at
            FROM saved_trend_patterns
            WHERE 1=1
            "#,
        );
        if let Some(user_id) = user_id {
            qb.push(" AND user_id = ").push_bind(user_id);
        }
        qb.push(" ORDER BY created_at ASC");

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().filter_map(pattern_from_row).collect())
    }

    /// One saved pattern by id
    #[instrument(skip(self))]
    pub async fn get_pattern(&self, id: Uuid) -> Result<Option<SavedPattern>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, features, combo, target, win_pct, opponent_win_pct,
                   games, dominant_side, binning_version, created_at
            FROM saved_trend_patterns
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().and_then(pattern_from_row))
    }

    /// Delete a pattern owned by `user_id`. Returns whether a row was removed.
    #[instrument(skip(self))]
    pub async fn delete_pattern(&self, id: Uuid, user_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM saved_trend_patterns WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ==================== Feature views ====================

    /// Rows of a feature view as JSON objects.
    ///
    /// `view` must be one of the fixed names from [`League`]; column
    /// filters are validated identifiers with bound values.
    #[instrument(skip(self, filters), fields(filters = filters.filters.len()))]
    pub async fn fetch_view_rows(
        &self,
        view: &'static str,
        game_date: Option<NaiveDate>,
        filters: &FilterSet,
        limit: i64,
    ) -> Result<Vec<Map<String, Value>>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT to_jsonb(v) AS row FROM {} v WHERE 1=1",
            view
        ));
        if let Some(date) = game_date {
            qb.push(" AND (v.game_date)::date = ").push_bind(date);
        }
        filters.push_where(&mut qb);
        qb.push(" LIMIT ").push_bind(limit);

        let rows = qb.build().fetch_all(&self.pool).await?;
        let out = json_objects(&rows);
        debug!(view, rows = out.len(), "fetched feature rows");
        Ok(out)
    }

    /// Rows of a feature view whose `training_key` (or `unique_id`) is in `keys`
    #[instrument(skip(self, keys), fields(keys = keys.len()))]
    pub async fn fetch_view_rows_by_key(
        &self,
        view: &'static str,
        keys: &[String],
    ) -> Result<Vec<Map<String, Value>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            r#"
            SELECT to_jsonb(v) AS row FROM {} v
            WHERE to_jsonb(v)->>'training_key' = ANY($1)
               OR to_jsonb(v)->>'unique_id' = ANY($1)
            "#,
            view
        );
        let rows = sqlx::query(&sql).bind(keys).fetch_all(&self.pool).await?;
        Ok(json_objects(&rows))
    }

    /// Latest `circa_lines` row for a game, as JSON
    #[instrument(skip(self))]
    pub async fn circa_lines(&self, game_id: &str) -> Result<Option<Map<String, Value>>> {
        let row = sqlx::query(
            r#"
            SELECT to_jsonb(c) AS row FROM circa_lines c
            WHERE to_jsonb(c)->>'game_id' = $1
               OR to_jsonb(c)->>'training_key' = $1
            ORDER BY to_jsonb(c)->>'updated_at' DESC NULLS LAST
            LIMIT 1
            "#,
        )
        .bind(game_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().and_then(json_object))
    }

    // ==================== Daily matches ====================

    /// Upsert a daily match. Lines are refreshed; recorded outcomes are kept.
    #[instrument(skip(self, m), fields(pattern_id = %m.pattern_id, game_id = %m.game_id))]
    pub async fn upsert_daily_match(&self, m: &DailyMatch) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO pattern_daily_matches (
                pattern_id, match_date, game_id, primary_team, opponent_team, is_home_game,
                primary_ml, opponent_ml, primary_rl, primary_rl_price, opponent_rl_price,
                o_u_line, over_price, under_price
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (pattern_id, match_date, game_id) DO UPDATE SET
                primary_team = EXCLUDED.primary_team,
                opponent_team = EXCLUDED.opponent_team,
                is_home_game = EXCLUDED.is_home_game,
                primary_ml = COALESCE(EXCLUDED.primary_ml, pattern_daily_matches.primary_ml),
                opponent_ml = COALESCE(EXCLUDED.opponent_ml, pattern_daily_matches.opponent_ml),
                primary_rl = COALESCE(EXCLUDED.primary_rl, pattern_daily_matches.primary_rl),
                primary_rl_price = COALESCE(EXCLUDED.primary_rl_price, pattern_daily_matches.primary_rl_price),
                opponent_rl_price = COALESCE(EXCLUDED.opponent_rl_price, pattern_daily_matches.opponent_rl_price),
                o_u_line = COALESCE(EXCLUDED.o_u_line, pattern_daily_matches.o_u_line),
                over_price = COALESCE(EXCLUDED.over_price, pattern_daily_matches.over_price),
                under_price = COALESCE(EXCLUDED.under_price, pattern_daily_matches.under_price),
                updated_at = NOW()
            "#,
        )
        .bind(m.pattern_id)
        .bind(m.match_date)
        .bind(&m.game_id)
        .bind(&m.primary_team)
        .bind(&m.opponent_team)
        .bind(m.is_home_game)
        .bind(m.lines.primary_ml)
        .bind(m.lines.opponent_ml)
        .bind(m.lines.primary_rl)
        .bind(m.lines.primary_rl_price)
        .bind(m.lines.opponent_rl_price)
        .bind(m.lines.o_u_line)
        .bind(m.lines.over_price)
        .bind(m.lines.under_price)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Daily matches of a pattern on or after `since`
    #[instrument(skip(self))]
    pub async fn daily_matches_since(
        &self,
        pattern_id: Uuid,
        since: NaiveDate,
    ) -> Result<Vec<DailyMatch>> {
        let rows = sqlx::query(&format!(
            "{} WHERE pattern_id = $1 AND match_date >= $2 ORDER BY match_date, game_id",
            DAILY_MATCH_SELECT
        ))
        .bind(pattern_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(daily_match_from_row).collect())
    }

    /// Daily matches recorded for one game across all patterns
    #[instrument(skip(self))]
    pub async fn daily_matches_for_game(&self, game_id: &str) -> Result<Vec<DailyMatch>> {
        let rows = sqlx::query(&format!(
            "{} WHERE game_id = $1 ORDER BY match_date DESC",
            DAILY_MATCH_SELECT
        ))
        .bind(game_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(daily_match_from_row).collect())
    }

    /// Daily matches dated before `before` with no outcome recorded yet
    #[instrument(skip(self))]
    pub async fn unsettled_daily_matches(&self, before: NaiveDate) -> Result<Vec<DailyMatch>> {
        let rows = sqlx::query(&format!(
            r#"{} WHERE match_date < $1
                 AND primary_ml_won IS NULL
                 AND primary_rl_won IS NULL
                 AND ou_result IS NULL"#,
            DAILY_MATCH_SELECT
        ))
        .bind(before)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(daily_match_from_row).collect())
    }

    /// Record outcomes for one daily match
    #[instrument(skip(self, m), fields(pattern_id = %m.pattern_id, game_id = %m.game_id))]
    pub async fn record_outcome(&self, m: &DailyMatch) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE pattern_daily_matches SET
                primary_ml_won = $4,
                primary_rl_won = $5,
                ou_result = $6,
                updated_at = NOW()
            WHERE pattern_id = $1 AND match_date = $2 AND game_id = $3
            "#,
        )
        .bind(m.pattern_id)
        .bind(m.match_date)
        .bind(&m.game_id)
        .bind(m.primary_ml_won)
        .bind(m.primary_rl_won)
        .bind(m.ou_result.map(|r| r.as_str()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ==================== ROI ====================

    /// Replace a pattern's ROI record
    #[instrument(skip(self, record), fields(pattern_id = %record.pattern_id))]
    pub async fn upsert_roi(&self, record: &RoiRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO pattern_roi (pattern_id, total_games, wins, losses, total_roi, avg_roi, calculated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (pattern_id) DO UPDATE SET
                total_games = EXCLUDED.total_games,
                wins = EXCLUDED.wins,
                losses = EXCLUDED.losses,
                total_roi = EXCLUDED.total_roi,
                avg_roi = EXCLUDED.avg_roi,
                calculated_at = NOW()
            "#,
        )
        .bind(record.pattern_id)
        .bind(record.total_games)
        .bind(record.wins)
        .bind(record.losses)
        .bind(record.total_roi)
        .bind(record.avg_roi)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Stored ROI for a pattern, with the time it was calculated
    #[instrument(skip(self))]
    pub async fn get_roi(&self, pattern_id: Uuid) -> Result<Option<(RoiRecord, DateTime<Utc>)>> {
        let row = sqlx::query(
            r#"
            SELECT pattern_id, total_games, wins, losses, total_roi, avg_roi, calculated_at
            FROM pattern_roi WHERE pattern_id = $1
            "#,
        )
        .bind(pattern_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let record = RoiRecord {
            pattern_id: row.try_get("pattern_id")?,
            total_games: row.try_get("total_games")?,
            wins: row.try_get("wins")?,
            losses: row.try_get("losses")?,
            total_roi: row.try_get("total_roi")?,
            avg_roi: row.try_get("avg_roi")?,
        };
        Ok(Some((record, row.try_get("calculated_at")?)))
    }

    // ==================== Trends ====================

    /// Situational trend rows for a league on `date`.
    ///
    /// Reads `<table>_today` first; when that is empty or missing, falls
    /// back to the dated base table. Returns the rows and the table used.
    #[instrument(skip(self))]
    pub async fn situational_trends(
        &self,
        league: League,
        date: NaiveDate,
    ) -> Result<(Vec<Map<String, Value>>, String)> {
        let Some(base) = league.trends_table() else {
            return Ok((Vec::new(), String::new()));
        };

        let today_table = format!("{}_today", base);
        let today = sqlx::query(&format!("SELECT to_jsonb(t) AS row FROM {} t", today_table))
            .fetch_all(&self.pool)
            .await;

        match today {
            Ok(rows) if !rows.is_empty() => return Ok((json_objects(&rows), today_table)),
            Ok(_) => warn!(table = %today_table, "today table empty, falling back to base table"),
            Err(e) => warn!(table = %today_table, error = %e, "today table unreadable, falling back to base table"),
        }

        let rows = sqlx::query(&format!(
            "SELECT to_jsonb(t) AS row FROM {} t WHERE (t.game_date)::date = $1",
            base
        ))
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok((json_objects(&rows), base.to_string()))
    }

    /// Alias groups from `ncaab_team_mapping`: every text column of a row
    /// names the same team in a different source.
    #[instrument(skip(self))]
    pub async fn ncaab_team_aliases(&self) -> Result<Vec<Vec<String>>> {
        let rows = sqlx::query("SELECT to_jsonb(m) AS row FROM ncaab_team_mapping m")
            .fetch_all(&self.pool)
            .await?;

        let groups = json_objects(&rows)
            .into_iter()
            .map(|obj| {
                obj.into_iter()
                    .filter(|(k, _)| k != "id" && !k.ends_with("_id") && !k.ends_with("_at"))
                    .filter_map(|(_, v)| match v {
                        Value::String(s) if !s.trim().is_empty() => Some(s),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
            })
            .filter(|g| g.len() > 1)
            .collect();

        Ok(groups)
    }
}

const DAILY_MATCH_SELECT: &str = r#"
    SELECT pattern_id, match_date, game_id, primary_team, opponent_team, is_home_game,
           primary_ml, opponent_ml, primary_rl, primary_rl_price, opponent_rl_price,
           o_u_line, over_price, under_price, primary_ml_won, primary_rl_won, ou_result
    FROM pattern_daily_matches"#;

fn json_object(row: &PgRow) -> Option<Map<String, Value>> {
    match row.try_get::<Value, _>("row") {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, "unreadable view row");
            None
        }
    }
}

fn json_objects(rows: &[PgRow]) -> Vec<Map<String, Value>> {
    rows.iter().filter_map(json_object).collect()
}

fn pattern_from_row(row: &PgRow) -> Option<SavedPattern> {
    let id: Uuid = row.try_get("id").ok()?;
    let target: String = row.try_get("target").ok()?;
    let target = match BetTarget::try_from(target.as_str()) {
        Ok(t) => t,
        Err(e) => {
            warn!(pattern_id = %id, error = %e, "skipping pattern with unknown target");
            return None;
        }
    };
    let dominant_side = row
        .try_get::<Option<String>, _>("dominant_side")
        .ok()
        .flatten()
        .and_then(|s| PickSide::try_from(s.as_str()).ok());

    Some(SavedPattern {
        id,
        user_id: row.try_get("user_id").ok()?,
        features: row.try_get("features").ok()?,
        combo: row.try_get("combo").ok()?,
        target,
        win_pct: row.try_get("win_pct").unwrap_or(0.0),
        opponent_win_pct: row.try_get("opponent_win_pct").unwrap_or(0.0),
        games: row.try_get("games").unwrap_or(0),
        dominant_side,
        binning_version: row.try_get("binning_version").unwrap_or(1),
        created_at: row.try_get("created_at").ok()?,
    })
}

fn daily_match_from_row(row: &PgRow) -> Option<DailyMatch> {
    let ou_result = row
        .try_get::<Option<String>, _>("ou_result")
        .ok()
        .flatten()
        .and_then(|s| OuResult::try_from(s.as_str()).ok());

    Some(DailyMatch {
        pattern_id: row.try_get("pattern_id").ok()?,
        match_date: row.try_get("match_date").ok()?,
        game_id: row.try_get("game_id").ok()?,
        primary_team: row.try_get("primary_team").ok()?,
        opponent_team: row.try_get("opponent_team").ok()?,
        is_home_game: row.try_get("is_home_game").ok()?,
        lines: BettingLines {
            primary_ml: row.try_get("primary_ml").ok()?,
            opponent_ml: row.try_get("opponent_ml").ok()?,
            primary_rl: row.try_get("primary_rl").ok()?,
            primary_rl_price: row.try_get("primary_rl_price").ok()?,
            opponent_rl_price: row.try_get("opponent_rl_price").ok()?,
            o_u_line: row.try_get("o_u_line").ok()?,
            over_price: row.try_get("over_price").ok()?,
            under_price: row.try_get("under_price").ok()?,
        },
        primary_ml_won: row.try_get("primary_ml_won").ok()?,
        primary_rl_won: row.try_get("primary_rl_won").ok()?,
        ou_result,
    })
}
