use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};

use crate::model::{FavoriteKind, MatchFilter, NormalizedMatch, TriggerKind};

pub struct Store {
    pool: SqlitePool,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MatchRecord {
    pub id: i64,
    pub external_event_id: String,
    pub league: String,
    pub round: Option<String>,
    pub home_player: String,
    pub away_player: String,
    pub start_time: String,
    pub status: String,
    pub score: Option<String>,
    pub venue: Option<String>,
    pub city: Option<String>,
    pub last_fetched_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FavoriteRecord {
    pub id: i64,
    pub user_id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub external_player_id: Option<String>,
    pub external_event_id: Option<String>,
    pub match_id: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AlertRecord {
    pub id: i64,
    pub user_id: i64,
    pub match_id: i64,
    #[serde(rename = "trigger")]
    pub trigger_kind: String,
    pub is_active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ActiveMatchFavoritesRow {
    pub id: i64,
    pub external_event_id: String,
    pub league: String,
    pub home_player: String,
    pub away_player: String,
    pub status: String,
    pub start_time: String,
    pub favorite_count: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LeagueStatusCount {
    pub league: String,
    pub status: String,
    pub match_count: i64,
}

impl Store {
    pub async fn new(database_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{database_path}"))
            .context("Invalid database path")?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            // Cascading deletes depend on this pragma.
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Create a Store from an existing pool (for sharing between the poller
    /// and the API server).
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<()> {
        let migration_sql = include_str!("../../migrations/001_init.sql");
        // Execute each statement separately (sqlx doesn't support multiple
        // statements in one call).
        for statement in migration_sql.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .with_context(|| format!("Failed to execute migration: {trimmed}"))?;
            }
        }
        Ok(())
    }

    // --- User operations ---

    pub async fn insert_user(&self, email: &str, password_hash: &str) -> Result<UserRecord> {
        let result = sqlx::query("INSERT INTO users (email, password_hash) VALUES (?, ?)")
            .bind(email)
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .context("Failed to insert user")?;

        let id = result.last_insert_rowid();
        self.get_user_by_id(id)
            .await?
            .context("Inserted user not found")
    }

    pub async fn get_user_by_id(&self, id: i64) -> Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by id")?;
        Ok(user)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by email")?;
        Ok(user)
    }

    pub async fn delete_user(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete user")?;
        Ok(result.rows_affected() > 0)
    }

    // --- Match operations ---

    pub async fn insert_match(&self, m: &NormalizedMatch) -> Result<i64> {
        let score_json = serialize_score(m)?;
        let result = sqlx::query(
            "INSERT INTO matches (external_event_id, league, round, home_player, away_player, start_time, status, score, venue, city)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&m.external_event_id)
        .bind(&m.league)
        .bind(&m.round)
        .bind(&m.home_player)
        .bind(&m.away_player)
        .bind(m.start_time.to_rfc3339())
        .bind(m.status.as_str())
        .bind(&score_json)
        .bind(&m.venue)
        .bind(&m.city)
        .execute(&self.pool)
        .await
        .context("Failed to insert match")?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_match(&self, id: i64) -> Result<Option<MatchRecord>> {
        let m = sqlx::query_as::<_, MatchRecord>("SELECT * FROM matches WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch match")?;
        Ok(m)
    }

    pub async fn get_match_by_external_id(
        &self,
        external_event_id: &str,
    ) -> Result<Option<MatchRecord>> {
        let m = sqlx::query_as::<_, MatchRecord>(
            "SELECT * FROM matches WHERE external_event_id = ?",
        )
        .bind(external_event_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch match by external event id")?;
        Ok(m)
    }

    /// Overwrite the mutable fields of a match and refresh the fetch
    /// timestamp. The natural key is never touched.
    pub async fn update_match_fields(&self, id: i64, m: &NormalizedMatch) -> Result<()> {
        let score_json = serialize_score(m)?;
        sqlx::query(
            "UPDATE matches
             SET league = ?, round = ?, home_player = ?, away_player = ?, start_time = ?,
                 status = ?, score = ?, venue = ?, city = ?, last_fetched_at = datetime('now')
             WHERE id = ?",
        )
        .bind(&m.league)
        .bind(&m.round)
        .bind(&m.home_player)
        .bind(&m.away_player)
        .bind(m.start_time.to_rfc3339())
        .bind(m.status.as_str())
        .bind(&score_json)
        .bind(&m.venue)
        .bind(&m.city)
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to update match")?;
        Ok(())
    }

    /// Refresh only the fetch timestamp, leaving the row otherwise untouched.
    pub async fn touch_match(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE matches SET last_fetched_at = datetime('now') WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to touch match")?;
        Ok(())
    }

    pub async fn delete_match(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM matches WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete match")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_matches(&self, filter: &MatchFilter) -> Result<Vec<MatchRecord>> {
        let date = filter.date.map(|d| d.format("%Y-%m-%d").to_string());
        let status = filter.status.map(|s| s.as_str());
        let offset = i64::from(filter.page.saturating_sub(1)) * i64::from(filter.limit);

        let matches = sqlx::query_as::<_, MatchRecord>(
            "SELECT * FROM matches
             WHERE (?1 IS NULL OR date(start_time) = ?1)
               AND (?2 IS NULL OR status = ?2)
             ORDER BY start_time, id
             LIMIT ?3 OFFSET ?4",
        )
        .bind(&date)
        .bind(status)
        .bind(i64::from(filter.limit))
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list matches")?;
        Ok(matches)
    }

    pub async fn count_matches(&self, filter: &MatchFilter) -> Result<i64> {
        let date = filter.date.map(|d| d.format("%Y-%m-%d").to_string());
        let status = filter.status.map(|s| s.as_str());

        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM matches
             WHERE (?1 IS NULL OR date(start_time) = ?1)
               AND (?2 IS NULL OR status = ?2)",
        )
        .bind(&date)
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count matches")?;
        Ok(row.0)
    }

    // --- Favorite operations ---

    pub async fn insert_favorite(
        &self,
        user_id: i64,
        kind: FavoriteKind,
        external_player_id: Option<&str>,
        external_event_id: Option<&str>,
        match_id: Option<i64>,
    ) -> Result<FavoriteRecord> {
        let result = sqlx::query(
            "INSERT INTO favorites (user_id, kind, external_player_id, external_event_id, match_id)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(kind.as_str())
        .bind(external_player_id)
        .bind(external_event_id)
        .bind(match_id)
        .execute(&self.pool)
        .await
        .context("Failed to insert favorite")?;

        let id = result.last_insert_rowid();
        let favorite =
            sqlx::query_as::<_, FavoriteRecord>("SELECT * FROM favorites WHERE id = ?")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .context("Inserted favorite not found")?;
        Ok(favorite)
    }

    /// Look up an equivalent favorite so duplicate submissions collapse to
    /// the existing row.
    pub async fn find_favorite(
        &self,
        user_id: i64,
        kind: FavoriteKind,
        external_player_id: Option<&str>,
        external_event_id: Option<&str>,
        match_id: Option<i64>,
    ) -> Result<Option<FavoriteRecord>> {
        let favorite = match kind {
            FavoriteKind::Player => {
                sqlx::query_as::<_, FavoriteRecord>(
                    "SELECT * FROM favorites
                     WHERE user_id = ? AND kind = 'player' AND external_player_id = ?",
                )
                .bind(user_id)
                .bind(external_player_id)
                .fetch_optional(&self.pool)
                .await
            }
            FavoriteKind::Match => {
                sqlx::query_as::<_, FavoriteRecord>(
                    "SELECT * FROM favorites
                     WHERE user_id = ?1 AND kind = 'match'
                       AND ((?2 IS NOT NULL AND external_event_id = ?2)
                         OR (?3 IS NOT NULL AND match_id = ?3))",
                )
                .bind(user_id)
                .bind(external_event_id)
                .bind(match_id)
                .fetch_optional(&self.pool)
                .await
            }
        }
        .context("Failed to look up favorite")?;
        Ok(favorite)
    }

    pub async fn get_user_favorites(&self, user_id: i64) -> Result<Vec<FavoriteRecord>> {
        let favorites = sqlx::query_as::<_, FavoriteRecord>(
            "SELECT * FROM favorites WHERE user_id = ? ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch favorites")?;
        Ok(favorites)
    }

    pub async fn delete_favorite(&self, id: i64, user_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM favorites WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete favorite")?;
        Ok(result.rows_affected() > 0)
    }

    // --- Alert operations ---

    pub async fn insert_alert(
        &self,
        user_id: i64,
        match_id: i64,
        trigger: TriggerKind,
    ) -> Result<AlertRecord> {
        let result = sqlx::query(
            "INSERT INTO alerts (user_id, match_id, trigger_kind) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(match_id)
        .bind(trigger.as_str())
        .execute(&self.pool)
        .await
        .context("Failed to insert alert")?;

        let id = result.last_insert_rowid();
        let alert = sqlx::query_as::<_, AlertRecord>("SELECT * FROM alerts WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .context("Inserted alert not found")?;
        Ok(alert)
    }

    pub async fn find_alert(
        &self,
        user_id: i64,
        match_id: i64,
        trigger: TriggerKind,
    ) -> Result<Option<AlertRecord>> {
        let alert = sqlx::query_as::<_, AlertRecord>(
            "SELECT * FROM alerts WHERE user_id = ? AND match_id = ? AND trigger_kind = ?",
        )
        .bind(user_id)
        .bind(match_id)
        .bind(trigger.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up alert")?;
        Ok(alert)
    }

    pub async fn get_alert(&self, id: i64, user_id: i64) -> Result<Option<AlertRecord>> {
        let alert = sqlx::query_as::<_, AlertRecord>(
            "SELECT * FROM alerts WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch alert")?;
        Ok(alert)
    }

    pub async fn get_user_alerts(&self, user_id: i64) -> Result<Vec<AlertRecord>> {
        let alerts = sqlx::query_as::<_, AlertRecord>(
            "SELECT * FROM alerts WHERE user_id = ? ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch alerts")?;
        Ok(alerts)
    }

    pub async fn update_alert(
        &self,
        id: i64,
        user_id: i64,
        trigger: Option<TriggerKind>,
        is_active: Option<bool>,
    ) -> Result<Option<AlertRecord>> {
        let Some(existing) = self.get_alert(id, user_id).await? else {
            return Ok(None);
        };

        let trigger = trigger
            .map(|t| t.as_str().to_string())
            .unwrap_or(existing.trigger_kind);
        let is_active = is_active.unwrap_or(existing.is_active);

        sqlx::query("UPDATE alerts SET trigger_kind = ?, is_active = ? WHERE id = ?")
            .bind(&trigger)
            .bind(is_active)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update alert")?;

        self.get_alert(id, user_id).await
    }

    pub async fn delete_alert(&self, id: i64, user_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM alerts WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete alert")?;
        Ok(result.rows_affected() > 0)
    }

    /// Alerts eligible to fire for a match. Inactive rows are filtered here
    /// so they can never reach the notifier.
    pub async fn get_active_alerts_for_match(&self, match_id: i64) -> Result<Vec<AlertRecord>> {
        let alerts = sqlx::query_as::<_, AlertRecord>(
            "SELECT * FROM alerts WHERE match_id = ? AND is_active = 1 ORDER BY id",
        )
        .bind(match_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch active alerts for match")?;
        Ok(alerts)
    }

    // --- Aggregate views ---

    pub async fn get_active_match_favorites(&self) -> Result<Vec<ActiveMatchFavoritesRow>> {
        let rows = sqlx::query_as::<_, ActiveMatchFavoritesRow>(
            "SELECT * FROM active_match_favorites ORDER BY start_time, id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to read active_match_favorites view")?;
        Ok(rows)
    }

    pub async fn get_league_status_counts(&self) -> Result<Vec<LeagueStatusCount>> {
        let rows = sqlx::query_as::<_, LeagueStatusCount>(
            "SELECT * FROM league_status_counts ORDER BY league, status",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to read league_status_counts view")?;
        Ok(rows)
    }
}

fn serialize_score(m: &NormalizedMatch) -> Result<Option<String>> {
    m.score
        .as_ref()
        .map(|s| serde_json::to_string(s).context("Failed to serialize score payload"))
        .transpose()
}
