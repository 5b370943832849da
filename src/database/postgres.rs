//! PostgreSQL backend. Shares the relational schema with SQLite; every call
//! is wrapped in a short retry for transient connection failures.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::future::Future;
use std::time::Duration;
use tracing::info;

use crate::database::error::{is_foreign_key_violation, map_db_error, StorageError, StoreResult};
use crate::database::models::*;
use crate::database::store::{Backend, EntityKind, Store};
use crate::utils::datetime::now_timestamp;
use crate::utils::logging::{log_database_operation, log_retry};

const MAX_ATTEMPTS: u32 = 3;
const BASE_DELAY: Duration = Duration::from_millis(100);

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connections are opened on first use, so startup does not fail while
    /// the server is still coming up.
    pub fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect_lazy(database_url)
            .map_err(map_db_error)?;

        Ok(Self { pool })
    }

    async fn count(&self, sql: &'static str) -> StoreResult<i64> {
        let pool = &self.pool;
        retry_transient("count", move || async move {
            sqlx::query_scalar::<_, i64>(sql)
                .fetch_one(pool)
                .await
                .map_err(map_db_error)
        })
        .await
    }
}

/// Runs `attempt` until it succeeds, fails permanently, or runs out of
/// attempts. Delays double from [`BASE_DELAY`].
pub async fn retry_transient<T, F, Fut>(operation: &str, mut attempt: F) -> StoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let mut tries = 1;
    loop {
        match attempt().await {
            Err(e) if e.is_retryable() && tries < MAX_ATTEMPTS => {
                log_retry(operation, tries, MAX_ATTEMPTS, &e.to_string());
                tokio::time::sleep(BASE_DELAY * 2u32.pow(tries - 1)).await;
                tries += 1;
            }
            result => return result,
        }
    }
}

#[async_trait]
impl Store for PostgresStore {
    fn backend(&self) -> Backend {
        Backend::Postgres
    }

    async fn migrate(&self) -> StoreResult<()> {
        info!("Running PostgreSQL migrations");
        sqlx::migrate!("./migrations/postgres")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::BackendUnavailable(e.to_string()))
    }

    async fn ping(&self) -> StoreResult<()> {
        let pool = &self.pool;
        retry_transient("ping", move || async move {
            sqlx::query("SELECT 1")
                .execute(pool)
                .await
                .map_err(map_db_error)?;
            Ok::<_, StorageError>(())
        })
        .await
    }

    async fn describe(&self) -> StoreResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT table_name::text FROM information_schema.tables WHERE table_schema = 'public' ORDER BY table_name"
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn upsert_user(&self, user: &NewUser) -> StoreResult<()> {
        let pool = &self.pool;
        let registered_at = now_timestamp();
        let registered_at = registered_at.as_str();
        retry_transient("upsert_user", move || async move {
            sqlx::query(
                r#"
                INSERT INTO users (user_id, username, first_name, last_name, is_subscribed, registered_at)
                VALUES ($1, $2, $3, $4, FALSE, $5)
                ON CONFLICT (user_id) DO UPDATE SET
                    username = COALESCE(EXCLUDED.username, users.username),
                    first_name = COALESCE(EXCLUDED.first_name, users.first_name),
                    last_name = COALESCE(EXCLUDED.last_name, users.last_name)
                "#,
            )
            .bind(user.user_id)
            .bind(&user.username)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(registered_at)
            .execute(pool)
            .await
            .map_err(map_db_error)?;
            Ok::<_, StorageError>(())
        })
        .await
    }

    async fn get_user(&self, user_id: i64) -> StoreResult<Option<User>> {
        let pool = &self.pool;
        retry_transient("get_user", move || async move {
            sqlx::query_as::<_, User>(
                "SELECT user_id, username, first_name, last_name, is_subscribed, registered_at FROM users WHERE user_id = $1"
            )
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .map_err(map_db_error)
        })
        .await
    }

    async fn set_subscription(&self, user_id: i64, subscribed: bool) -> StoreResult<bool> {
        let pool = &self.pool;
        retry_transient("set_subscription", move || async move {
            let result = sqlx::query("UPDATE users SET is_subscribed = $1 WHERE user_id = $2")
                .bind(subscribed)
                .bind(user_id)
                .execute(pool)
                .await
                .map_err(map_db_error)?;
            Ok::<_, StorageError>(result.rows_affected() > 0)
        })
        .await
    }

    async fn create_giveaway(&self, giveaway: &NewGiveaway) -> StoreResult<i64> {
        let pool = &self.pool;
        let created_at = now_timestamp();
        let created_at = created_at.as_str();
        let id = retry_transient("create_giveaway", move || async move {
            let mut tx = pool.begin().await.map_err(map_db_error)?;

            let id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO giveaways (title, description, end_date, winners_count, status, created_at)
                VALUES ($1, $2, $3, $4, 'active', $5)
                RETURNING id
                "#,
            )
            .bind(&giveaway.title)
            .bind(&giveaway.description)
            .bind(&giveaway.end_date)
            .bind(giveaway.winners_count)
            .bind(created_at)
            .fetch_one(&mut tx)
            .await
            .map_err(map_db_error)?;

            for (index, prize) in giveaway.prizes.iter().enumerate() {
                sqlx::query("INSERT INTO giveaway_prizes (giveaway_id, place, description) VALUES ($1, $2, $3)")
                    .bind(id)
                    .bind(index as i64 + 1)
                    .bind(prize)
                    .execute(&mut tx)
                    .await
                    .map_err(map_db_error)?;
            }

            tx.commit().await.map_err(map_db_error)?;
            Ok::<_, StorageError>(id)
        })
        .await?;

        log_database_operation("INSERT", "giveaways", Some(&format!("id {id}")));
        Ok(id)
    }

    async fn get_giveaway(&self, id: i64) -> StoreResult<Option<Giveaway>> {
        let pool = &self.pool;
        let row = retry_transient("get_giveaway", move || async move {
            sqlx::query_as::<_, GiveawayRow>(
                "SELECT id, title, description, end_date, winners_count, status, created_at, message_id FROM giveaways WHERE id = $1"
            )
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(map_db_error)
        })
        .await?;

        row.map(Giveaway::try_from).transpose()
    }

    async fn list_giveaways(&self, filter: GiveawayFilter) -> StoreResult<Vec<Giveaway>> {
        let pool = &self.pool;
        let sql = match filter {
            GiveawayFilter::Active => {
                "SELECT id, title, description, end_date, winners_count, status, created_at, message_id FROM giveaways WHERE status = 'active' ORDER BY created_at DESC, id DESC"
            }
            GiveawayFilter::All => {
                "SELECT id, title, description, end_date, winners_count, status, created_at, message_id FROM giveaways ORDER BY created_at DESC, id DESC"
            }
        };

        let rows = retry_transient("list_giveaways", move || async move {
            sqlx::query_as::<_, GiveawayRow>(sql)
                .fetch_all(pool)
                .await
                .map_err(map_db_error)
        })
        .await?;

        rows.into_iter().map(Giveaway::try_from).collect()
    }

    async fn update_giveaway(&self, id: i64, update: &GiveawayUpdate) -> StoreResult<bool> {
        let pool = &self.pool;
        let affected = retry_transient("update_giveaway", move || async move {
            let result = sqlx::query(
                "UPDATE giveaways SET title = $1, description = $2, end_date = $3, winners_count = $4 WHERE id = $5 AND status = $6"
            )
            .bind(&update.title)
            .bind(&update.description)
            .bind(&update.end_date)
            .bind(update.winners_count)
            .bind(id)
            .bind(GiveawayStatus::Active.as_str())
            .execute(pool)
            .await
            .map_err(map_db_error)?;
            Ok::<_, StorageError>(result.rows_affected())
        })
        .await?;

        if affected == 0 {
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
        let pool = &self.pool;
        retry_transient("transition_giveaway_status", move || async move {
            let result = sqlx::query("UPDATE giveaways SET status = $1 WHERE id = $2 AND status = $3")
                .bind(to.as_str())
                .bind(id)
                .bind(from.as_str())
                .execute(pool)
                .await
                .map_err(map_db_error)?;
            Ok::<_, StorageError>(result.rows_affected() > 0)
        })
        .await
    }

    async fn prizes(&self, giveaway_id: i64) -> StoreResult<Vec<Prize>> {
        let pool = &self.pool;
        retry_transient("prizes", move || async move {
            sqlx::query_as::<_, Prize>(
                "SELECT giveaway_id, place, description FROM giveaway_prizes WHERE giveaway_id = $1 ORDER BY place"
            )
            .bind(giveaway_id)
            .fetch_all(pool)
            .await
            .map_err(map_db_error)
        })
        .await
    }

    async fn create_tournament(&self, tournament: &NewTournament) -> StoreResult<i64> {
        let pool = &self.pool;
        let created_at = now_timestamp();
        let created_at = created_at.as_str();
        let id = retry_transient("create_tournament", move || async move {
            sqlx::query_scalar::<_, i64>(
                r#"
                INSERT INTO tournaments (title, description, start_date, winners_count, registration_status, created_at)
                VALUES ($1, $2, $3, $4, 'open', $5)
                RETURNING id
                "#,
            )
            .bind(&tournament.title)
            .bind(&tournament.description)
            .bind(&tournament.start_date)
            .bind(tournament.winners_count)
            .bind(created_at)
            .fetch_one(pool)
            .await
            .map_err(map_db_error)
        })
        .await?;

        log_database_operation("INSERT", "tournaments", Some(&format!("id {id}")));
        Ok(id)
    }

    async fn get_tournament(&self, id: i64) -> StoreResult<Option<Tournament>> {
        let pool = &self.pool;
        let row = retry_transient("get_tournament", move || async move {
            sqlx::query_as::<_, TournamentRow>(
                "SELECT id, title, description, start_date, winners_count, registration_status, created_at, message_id FROM tournaments WHERE id = $1"
            )
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(map_db_error)
        })
        .await?;

        row.map(Tournament::try_from).transpose()
    }

    async fn list_tournaments(&self) -> StoreResult<Vec<Tournament>> {
        let pool = &self.pool;
        let rows = retry_transient("list_tournaments", move || async move {
            sqlx::query_as::<_, TournamentRow>(
                "SELECT id, title, description, start_date, winners_count, registration_status, created_at, message_id FROM tournaments ORDER BY created_at DESC, id DESC"
            )
            .fetch_all(pool)
            .await
            .map_err(map_db_error)
        })
        .await?;

        rows.into_iter().map(Tournament::try_from).collect()
    }

    async fn set_registration_status(&self, id: i64, status: RegistrationStatus) -> StoreResult<()> {
        let pool = &self.pool;
        let affected = retry_transient("set_registration_status", move || async move {
            let result = sqlx::query("UPDATE tournaments SET registration_status = $1 WHERE id = $2")
                .bind(status.as_str())
                .bind(id)
                .execute(pool)
                .await
                .map_err(map_db_error)?;
            Ok::<_, StorageError>(result.rows_affected())
        })
        .await?;

        if affected == 0 {
            return Err(StorageError::not_found(EntityKind::Tournament, id));
        }
        Ok(())
    }

    async fn set_message_id(&self, kind: EntityKind, id: i64, message_id: i64) -> StoreResult<()> {
        let pool = &self.pool;
        let sql = format!("UPDATE {} SET message_id = $1 WHERE id = $2", kind.table());
        let sql = sql.as_str();
        let affected = retry_transient("set_message_id", move || async move {
            let result = sqlx::query(sql)
                .bind(message_id)
                .bind(id)
                .execute(pool)
                .await
                .map_err(map_db_error)?;
            Ok::<_, StorageError>(result.rows_affected())
        })
        .await?;

        if affected == 0 {
            return Err(StorageError::not_found(kind, id));
        }
        Ok(())
    }

    async fn add_giveaway_participant(&self, giveaway_id: i64, user_id: i64) -> StoreResult<()> {
        let pool = &self.pool;
        let joined_at = now_timestamp();
        let joined_at = joined_at.as_str();
        retry_transient("add_giveaway_participant", move || async move {
            let result = sqlx::query(
                "INSERT INTO giveaway_participants (giveaway_id, user_id, joined_at) VALUES ($1, $2, $3)"
            )
            .bind(giveaway_id)
            .bind(user_id)
            .bind(joined_at)
            .execute(pool)
            .await;

            match result {
                Ok(_) => Ok(()),
                Err(e) if is_foreign_key_violation(&e) => {
                    Err(StorageError::not_found(EntityKind::Giveaway, giveaway_id))
                }
                Err(e) => Err(map_db_error(e)),
            }
        })
        .await
    }

    async fn add_tournament_registration(&self, registration: &NewRegistration) -> StoreResult<()> {
        let pool = &self.pool;
        let registered_at = now_timestamp();
        let registered_at = registered_at.as_str();
        retry_transient("add_tournament_registration", move || async move {
            let result = sqlx::query(
                r#"
                INSERT INTO tournament_participants
                    (tournament_id, user_id, age, phone_brand, nickname, game_id, registered_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(registration.tournament_id)
            .bind(registration.user_id)
            .bind(registration.age)
            .bind(&registration.phone_brand)
            .bind(&registration.nickname)
            .bind(&registration.game_id)
            .bind(registered_at)
            .execute(pool)
            .await;

            match result {
                Ok(_) => Ok(()),
                Err(e) if is_foreign_key_violation(&e) => Err(StorageError::not_found(
                    EntityKind::Tournament,
                    registration.tournament_id,
                )),
                Err(e) => Err(map_db_error(e)),
            }
        })
        .await
    }

    async fn participant_ids(&self, giveaway_id: i64) -> StoreResult<Vec<i64>> {
        let pool = &self.pool;
        retry_transient("participant_ids", move || async move {
            sqlx::query_scalar::<_, i64>(
                "SELECT user_id FROM giveaway_participants WHERE giveaway_id = $1 ORDER BY id"
            )
            .bind(giveaway_id)
            .fetch_all(pool)
            .await
            .map_err(map_db_error)
        })
        .await
    }

    async fn registrations(&self, tournament_id: i64) -> StoreResult<Vec<RegistrationView>> {
        let pool = &self.pool;
        retry_transient("registrations", move || async move {
            sqlx::query_as::<_, RegistrationView>(
                r#"
                SELECT tp.tournament_id, tp.user_id, tp.age, tp.phone_brand, tp.nickname, tp.game_id,
                       tp.registered_at, u.first_name, u.username
                FROM tournament_participants tp
                LEFT JOIN users u ON u.user_id = tp.user_id
                WHERE tp.tournament_id = $1
                ORDER BY tp.registered_at DESC, tp.id DESC
                "#,
            )
            .bind(tournament_id)
            .fetch_all(pool)
            .await
            .map_err(map_db_error)
        })
        .await
    }

    async fn count_participants(&self, kind: EntityKind, id: i64) -> StoreResult<i64> {
        let pool = &self.pool;
        let (table, column) = kind.participants_table();
        let sql = format!("SELECT COUNT(*) FROM {table} WHERE {column} = $1");
        let sql = sql.as_str();
        retry_transient("count_participants", move || async move {
            sqlx::query_scalar::<_, i64>(sql)
                .bind(id)
                .fetch_one(pool)
                .await
                .map_err(map_db_error)
        })
        .await
    }

    async fn record_draw(&self, giveaway_id: i64, winners: &[Winner]) -> StoreResult<bool> {
        let pool = &self.pool;
        let committed = retry_transient("record_draw", move || async move {
            let mut tx = pool.begin().await.map_err(map_db_error)?;

            let flipped = sqlx::query(
                "UPDATE giveaways SET status = 'completed' WHERE id = $1 AND status = 'active'"
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
                    "INSERT INTO giveaway_winners (giveaway_id, user_id, place, display_name, username) VALUES ($1, $2, $3, $4, $5)"
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
            Ok::<_, StorageError>(true)
        })
        .await?;

        if committed {
            log_database_operation(
                "DRAW",
                "giveaway_winners",
                Some(&format!("giveaway {giveaway_id}, {} winner(s)", winners.len())),
            );
        }
        Ok(committed)
    }

    async fn winners(&self, giveaway_id: i64) -> StoreResult<Vec<Winner>> {
        let pool = &self.pool;
        retry_transient("winners", move || async move {
            sqlx::query_as::<_, Winner>(
                "SELECT giveaway_id, user_id, place, display_name, username FROM giveaway_winners WHERE giveaway_id = $1 ORDER BY place"
            )
            .bind(giveaway_id)
            .fetch_all(pool)
            .await
            .map_err(map_db_error)
        })
        .await
    }

    async fn delete_cascade(&self, kind: EntityKind, id: i64) -> StoreResult<()> {
        let pool = &self.pool;
        let deleted = retry_transient("delete_cascade", move || async move {
            let mut tx = pool.begin().await.map_err(map_db_error)?;

            for (table, column) in kind.child_tables() {
                let sql = format!("DELETE FROM {table} WHERE {column} = $1");
                sqlx::query(&sql)
                    .bind(id)
                    .execute(&mut tx)
                    .await
                    .map_err(map_db_error)?;
            }

            let sql = format!("DELETE FROM {} WHERE id = $1", kind.table());
            let deleted = sqlx::query(&sql)
                .bind(id)
                .execute(&mut tx)
                .await
                .map_err(map_db_error)?
                .rows_affected();

            if deleted == 0 {
                tx.rollback().await.map_err(map_db_error)?;
                return Ok(false);
            }

            tx.commit().await.map_err(map_db_error)?;
            Ok::<_, StorageError>(true)
        })
        .await?;

        if !deleted {
            return Err(StorageError::not_found(kind, id));
        }
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
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failure() {
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result = retry_transient("flaky", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(StorageError::ConnectionFailed("reset by peer".to_string()))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result: StoreResult<()> = retry_transient("down", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::ConnectionFailed("refused".to_string()))
        })
        .await;

        assert!(matches!(result, Err(StorageError::ConnectionFailed(_))));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_retry_does_not_repeat_permanent_errors() {
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result: StoreResult<()> = retry_transient("dup", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::ConstraintViolation("duplicate".to_string()))
        })
        .await;

        assert!(matches!(result, Err(StorageError::ConstraintViolation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
