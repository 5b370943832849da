//! File-based SQLite backend. Uniqueness and cascades are enforced by the
//! schema; multi-row writes run in a transaction.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::database::error::{is_foreign_key_violation, map_db_error, StorageError, StoreResult};
use crate::database::models::*;
use crate::database::store::{Backend, EntityKind, Store};
use crate::utils::datetime::now_timestamp;
use crate::utils::logging::log_database_operation;

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        ensure_parent_dir(database_url);

        // Create database if it doesn't exist
        if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
            info!("Creating database {}", database_url);
            Sqlite::create_database(database_url).await.map_err(map_db_error)?;
        }

        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(map_db_error)?
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(map_db_error)?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn count(&self, sql: &str) -> StoreResult<i64> {
        sqlx::query_scalar::<_, i64>(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)
    }
}

/// SQLite cannot create missing directories on its own.
/// File path behind a `sqlite:` URL; `None` for in-memory databases.
pub fn sqlite_path(database_url: &str) -> Option<&str> {
    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() || path.starts_with(":memory:") {
        return None;
    }
    Some(path)
}

fn ensure_parent_dir(database_url: &str) {
    let Some(path) = sqlite_path(database_url) else {
        return;
    };

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("Could not create database directory {}: {}", parent.display(), e);
            }
        }
    }
}

#[async_trait]
impl Store for SqliteStore {
    fn backend(&self) -> Backend {
        Backend::Sqlite
    }

    async fn migrate(&self) -> StoreResult<()> {
        info!("Running SQLite migrations");
        sqlx::migrate!("./migrations/sqlite")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::BackendUnavailable(e.to_string()))
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(())
    }

    async fn describe(&self) -> StoreResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name"
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn upsert_user(&self, user: &NewUser) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, username, first_name, last_name, is_subscribed, registered_at)
            VALUES (?, ?, ?, ?, FALSE, ?)
            ON CONFLICT (user_id) DO UPDATE SET
                username = COALESCE(excluded.username, users.username),
                first_name = COALESCE(excluded.first_name, users.first_name),
                last_name = COALESCE(excluded.last_name, users.last_name)
            "#,
        )
        .bind(user.user_id)
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(now_timestamp())
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    async fn get_user(&self, user_id: i64) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, User>(
            "SELECT user_id, username, first_name, last_name, is_subscribed, registered_at FROM users WHERE user_id = ?"
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn set_subscription(&self, user_id: i64, subscribed: bool) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE users SET is_subscribed = ? WHERE user_id = ?")
            .bind(subscribed)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_giveaway(&self, giveaway: &NewGiveaway) -> StoreResult<i64> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let id = sqlx::query(
            r#"
            INSERT INTO giveaways (title, description, end_date, winners_count, status, created_at)
            VALUES (?, ?, ?, ?, 'active', ?)
            "#,
        )
        .bind(&giveaway.title)
        .bind(&giveaway.description)
        .bind(&giveaway.end_date)
        .bind(giveaway.winners_count)
        .bind(now_timestamp())
        .execute(&mut tx)
        .await
        .map_err(map_db_error)?
        .last_insert_rowid();

        for (index, prize) in giveaway.prizes.iter().enumerate() {
            sqlx::query("INSERT INTO giveaway_prizes (giveaway_id, place, description) VALUES (?, ?, ?)")
                .bind(id)
                .bind(index as i64 + 1)
                .bind(prize)
                .execute(&mut tx)
                .await
                .map_err(map_db_error)?;
        }

        tx.commit().await.map_err(map_db_error)?;
        log_database_operation("INSERT", "giveaways", Some(&format!("id {id}")));
        Ok(id)
    }

    async fn get_giveaway(&self, id: i64) -> StoreResult<Option<Giveaway>> {
        let row = sqlx::query_as::<_, GiveawayRow>(
            "SELECT id, title, description, end_date, winners_count, status, created_at, message_id FROM giveaways WHERE id = ?"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        row.map(Giveaway::try_from).transpose()
    }

    async fn list_giveaways(&self, filter: GiveawayFilter) -> StoreResult<Vec<Giveaway>> {
        let sql = match filter {
            GiveawayFilter::Active => {
                "SELECT id, title, description, end_date, winners_count, status, created_at, message_id FROM giveaways WHERE status = 'active' ORDER BY created_at DESC, id DESC"
            }
            GiveawayFilter::All => {
                "SELECT id, title, description, end_date, winners_count, status, created_at, message_id FROM giveaways ORDER BY created_at DESC, id DESC"
            }
        };

        let rows = sqlx::query_as::<_, GiveawayRow>(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        rows.into_iter().map(Giveaway::try_from).collect()
    }

    async fn update_giveaway(&self, id: i64, update: &GiveawayUpdate) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE giveaways SET title = ?, description = ?, end_date = ?, winners_count = ? WHERE id = ? AND status = ?"
        )
        .bind(&update.title)
        .bind(&update.description)
        .bind(&update.end_date)
        .bind(update.winners_count)
        .bind(id)
        .bind(GiveawayStatus::Active.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return match self.get_giveaway(id).await? {
                Some(_) => Ok(false),
                None => Err(StorageError::not_found(EntityKind::Giveaway, id)),
            };
        }
        Ok(true)
    }

    async fn transition_giveaway_status(
        &self,
        id: i64,
        from: GiveawayStatus,
        to: GiveawayStatus,
    ) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE giveaways SET status = ? WHERE id = ? AND status = ?")
            .bind(to.as_str())
            .bind(id)
            .bind(from.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn prizes(&self, giveaway_id: i64) -> StoreResult<Vec<Prize>> {
        sqlx::query_as::<_, Prize>(
            "SELECT giveaway_id, place, description FROM giveaway_prizes WHERE giveaway_id = ? ORDER BY place"
        )
        .bind(giveaway_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn create_tournament(&self, tournament: &NewTournament) -> StoreResult<i64> {
        let id = sqlx::query(
            r#"
            INSERT INTO tournaments (title, description, start_date, winners_count, registration_status, created_at)
            VALUES (?, ?, ?, ?, 'open', ?)
            "#,
        )
        .bind(&tournament.title)
        .bind(&tournament.description)
        .bind(&tournament.start_date)
        .bind(tournament.winners_count)
        .bind(now_timestamp())
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?
        .last_insert_rowid();

        log_database_operation("INSERT", "tournaments", Some(&format!("id {id}")));
        Ok(id)
    }

    async fn get_tournament(&self, id: i64) -> StoreResult<Option<Tournament>> {
        let row = sqlx::query_as::<_, TournamentRow>(
            "SELECT id, title, description, start_date, winners_count, registration_status, created_at, message_id FROM tournaments WHERE id = ?"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        row.map(Tournament::try_from).transpose()
    }

    async fn list_tournaments(&self) -> StoreResult<Vec<Tournament>> {
        let rows = sqlx::query_as::<_, TournamentRow>(
            "SELECT id, title, description, start_date, winners_count, registration_status, created_at, message_id FROM tournaments ORDER BY created_at DESC, id DESC"
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        rows.into_iter().map(Tournament::try_from).collect()
    }

    async fn set_registration_status(&self, id: i64, status: RegistrationStatus) -> StoreResult<()> {
        let result = sqlx::query("UPDATE tournaments SET registration_status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(EntityKind::Tournament, id));
        }
        Ok(())
    }

    async fn set_message_id(&self, kind: EntityKind, id: i64, message_id: i64) -> StoreResult<()> {
        let sql = format!("UPDATE {} SET message_id = ? WHERE id = ?", kind.table());
        let result = sqlx::query(&sql)
            .bind(message_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(kind, id));
        }
        Ok(())
    }

    async fn add_giveaway_participant(&self, giveaway_id: i64, user_id: i64) -> StoreResult<()> {
        let result = sqlx::query(
            "INSERT INTO giveaway_participants (giveaway_id, user_id, joined_at) VALUES (?, ?, ?)"
        )
        .bind(giveaway_id)
        .bind(user_id)
        .bind(now_timestamp())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_foreign_key_violation(&e) => {
                Err(StorageError::not_found(EntityKind::Giveaway, giveaway_id))
            }
            Err(e) => Err(map_db_error(e)),
        }
    }

    async fn add_tournament_registration(&self, registration: &NewRegistration) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO tournament_participants
                (tournament_id, user_id, age, phone_brand, nickname, game_id, registered_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(registration.tournament_id)
        .bind(registration.user_id)
        .bind(registration.age)
        .bind(&registration.phone_brand)
        .bind(&registration.nickname)
        .bind(&registration.game_id)
        .bind(now_timestamp())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_foreign_key_violation(&e) => {
                Err(StorageError::not_found(EntityKind::Tournament, registration.tournament_id))
            }
            Err(e) => Err(map_db_error(e)),
        }
    }

    async fn participant_ids(&self, giveaway_id: i64) -> StoreResult<Vec<i64>> {
        sqlx::query_scalar::<_, i64>(
            "SELECT user_id FROM giveaway_participants WHERE giveaway_id = ? ORDER BY id"
        )
        .bind(giveaway_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn registrations(&self, tournament_id: i64) -> StoreResult<Vec<RegistrationView>> {
        sqlx::query_as::<_, RegistrationView>(
            r#"
            SELECT tp.tournament_id, tp.user_id, tp.age, tp.phone_brand, tp.nickname, tp.game_id,
                   tp.registered_at, u.first_name, u.username
            FROM tournament_participants tp
            LEFT JOIN users u ON u.user_id = tp.user_id
            WHERE tp.tournament_id = ?
            ORDER BY tp.registered_at DESC, tp.id DESC
            "#,
        )
        .bind(tournament_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn count_participants(&self, kind: EntityKind, id: i64) -> StoreResult<i64> {
        let (table, column) = kind.participants_table();
        let sql = format!("SELECT COUNT(*) FROM {table} WHERE {column} = ?");
        sqlx::query_scalar::<_, i64>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn record_draw(&self, giveaway_id: i64, winners: &[Winner]) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let flipped = sqlx::query(
            "UPDATE giveaways SET status = 'completed' WHERE id = ? AND status = 'active'"
        )
        .bind(giveaway_id)
        .execute(&mut tx)
        .await
        .map_err(map_db_error)?
        .rows_affected();

        if flipped == 0 {
            tx.rollback().await.map_err(map_db_error)?;
            return Ok(false);
        }

        for winner in winners {
            sqlx::query(
                "INSERT INTO giveaway_winners (giveaway_id, user_id, place, display_name, username) VALUES (?, ?, ?, ?, ?)"
            )
            .bind(giveaway_id)
            .bind(winner.user_id)
            .bind(winner.place)
            .bind(&winner.display_name)
            .bind(&winner.username)
            .execute(&mut tx)
            .await
            .map_err(map_db_error)?;
        }

        tx.commit().await.map_err(map_db_error)?;
        log_database_operation(
            "DRAW",
            "giveaway_winners",
            Some(&format!("giveaway {giveaway_id}, {} winner(s)", winners.len())),
        );
        Ok(true)
    }

    async fn winners(&self, giveaway_id: i64) -> StoreResult<Vec<Winner>> {
        sqlx::query_as::<_, Winner>(
            "SELECT giveaway_id, user_id, place, display_name, username FROM giveaway_winners WHERE giveaway_id = ? ORDER BY place"
        )
        .bind(giveaway_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn delete_cascade(&self, kind: EntityKind, id: i64) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        for (table, column) in kind.child_tables() {
            let sql = format!("DELETE FROM {table} WHERE {column} = ?");
            sqlx::query(&sql)
                .bind(id)
                .execute(&mut tx)
                .await
                .map_err(map_db_error)?;
        }

        let sql = format!("DELETE FROM {} WHERE id = ?", kind.table());
        let deleted = sqlx::query(&sql)
            .bind(id)
            .execute(&mut tx)
            .await
            .map_err(map_db_error)?
            .rows_affected();

        if deleted == 0 {
            tx.rollback().await.map_err(map_db_error)?;
            return Err(StorageError::not_found(kind, id));
        }

        tx.commit().await.map_err(map_db_error)?;
        log_database_operation("DELETE", kind.table(), Some(&format!("id {id} with children")));
        Ok(())
    }

    async fn stats(&self) -> StoreResult<Stats> {
        Ok(Stats {
            total_users: self.count("SELECT COUNT(*) FROM users").await?,
            active_users: self.count("SELECT COUNT(*) FROM users WHERE is_subscribed = TRUE").await?,
            total_giveaways: self.count("SELECT COUNT(*) FROM giveaways").await?,
            active_giveaways: self.count("SELECT COUNT(*) FROM giveaways WHERE status = 'active'").await?,
            total_tournaments: self.count("SELECT COUNT(*) FROM tournaments").await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_connect_creates_missing_directories() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("nested").join("bot.db");
        let url = format!("sqlite:{}", db_path.display());

        let store = SqliteStore::connect(&url).await.expect("Failed to connect");
        store.migrate().await.expect("Failed to migrate");

        assert!(db_path.exists());
        let tables = store.describe().await.expect("Failed to describe");
        assert!(tables.contains(&"giveaway_participants".to_string()));
        assert!(tables.contains(&"tournament_participants".to_string()));
    }

    #[test]
    fn test_sqlite_path() {
        assert_eq!(sqlite_path("sqlite:./data/giveaways.db"), Some("./data/giveaways.db"));
        assert_eq!(sqlite_path("sqlite:///tmp/bot.db?mode=rwc"), Some("/tmp/bot.db"));
        assert_eq!(sqlite_path("sqlite::memory:"), None);
    }
}
