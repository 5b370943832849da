//! Backend-agnostic storage contract.
//!
//! Exactly one implementation is constructed at startup (see
//! [`crate::database::connection::DatabaseManager::connect`]); call sites only
//! ever see `dyn Store`.

use async_trait::async_trait;
use std::fmt;

use crate::database::error::StoreResult;
use crate::database::models::*;

/// Parent entities that own a participant pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Giveaway,
    Tournament,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Giveaway => "giveaway",
            EntityKind::Tournament => "tournament",
        }
    }

    /// Relational table holding the entity rows.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Giveaway => "giveaways",
            EntityKind::Tournament => "tournaments",
        }
    }

    /// Relational participant table and its foreign key column.
    pub fn participants_table(&self) -> (&'static str, &'static str) {
        match self {
            EntityKind::Giveaway => ("giveaway_participants", "giveaway_id"),
            EntityKind::Tournament => ("tournament_participants", "tournament_id"),
        }
    }

    /// Every relational child table, in deletion order.
    pub fn child_tables(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            EntityKind::Giveaway => &[
                ("giveaway_winners", "giveaway_id"),
                ("giveaway_prizes", "giveaway_id"),
                ("giveaway_participants", "giveaway_id"),
            ],
            EntityKind::Tournament => &[("tournament_participants", "tournament_id")],
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    Postgres,
    KeyValue,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Sqlite => "sqlite",
            Backend::Postgres => "postgres",
            Backend::KeyValue => "key-value",
        }
    }

    /// Whether (entity, user) uniqueness is guaranteed by the engine itself.
    /// The key-value store only emulates it with check-then-set.
    pub fn enforces_uniqueness(&self) -> bool {
        !matches!(self, Backend::KeyValue)
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    fn backend(&self) -> Backend;

    /// Create or upgrade the schema. No-op where there is none.
    async fn migrate(&self) -> StoreResult<()>;
    async fn ping(&self) -> StoreResult<()>;
    /// Human readable inventory (tables or key families) for the migration tool.
    async fn describe(&self) -> StoreResult<Vec<String>>;

    /// Insert the user or refresh the display fields that were supplied,
    /// keeping the subscription flag.
    async fn upsert_user(&self, user: &NewUser) -> StoreResult<()>;
    async fn get_user(&self, user_id: i64) -> StoreResult<Option<User>>;
    /// Returns false when the user is unknown.
    async fn set_subscription(&self, user_id: i64, subscribed: bool) -> StoreResult<bool>;

    /// Giveaway and prizes become visible together or not at all.
    async fn create_giveaway(&self, giveaway: &NewGiveaway) -> StoreResult<i64>;
    async fn get_giveaway(&self, id: i64) -> StoreResult<Option<Giveaway>>;
    /// Most recently created first.
    async fn list_giveaways(&self, filter: GiveawayFilter) -> StoreResult<Vec<Giveaway>>;
    /// Only active giveaways change. Returns false, writing nothing, when the
    /// giveaway has already been drawn or finished.
    async fn update_giveaway(&self, id: i64, update: &GiveawayUpdate) -> StoreResult<bool>;
    /// Compare-and-set on status. Returns false when the current status is not `from`.
    async fn transition_giveaway_status(
        &self,
        id: i64,
        from: GiveawayStatus,
        to: GiveawayStatus,
    ) -> StoreResult<bool>;
    async fn prizes(&self, giveaway_id: i64) -> StoreResult<Vec<Prize>>;

    async fn create_tournament(&self, tournament: &NewTournament) -> StoreResult<i64>;
    async fn get_tournament(&self, id: i64) -> StoreResult<Option<Tournament>>;
    /// Most recently created first.
    async fn list_tournaments(&self) -> StoreResult<Vec<Tournament>>;
    async fn set_registration_status(&self, id: i64, status: RegistrationStatus) -> StoreResult<()>;

    /// Remember the channel post that announced the entity.
    async fn set_message_id(&self, kind: EntityKind, id: i64, message_id: i64) -> StoreResult<()>;

    /// Fails with `ConstraintViolation` when the pair already exists.
    async fn add_giveaway_participant(&self, giveaway_id: i64, user_id: i64) -> StoreResult<()>;
    /// Fails with `ConstraintViolation` when the pair already exists.
    async fn add_tournament_registration(&self, registration: &NewRegistration) -> StoreResult<()>;
    async fn participant_ids(&self, giveaway_id: i64) -> StoreResult<Vec<i64>>;
    async fn registrations(&self, tournament_id: i64) -> StoreResult<Vec<RegistrationView>>;
    async fn count_participants(&self, kind: EntityKind, id: i64) -> StoreResult<i64>;

    /// Persist winners and flip an active giveaway to completed as one step.
    /// Returns false, writing nothing, when the giveaway is no longer active.
    async fn record_draw(&self, giveaway_id: i64, winners: &[Winner]) -> StoreResult<bool>;
    /// Ordered by place.
    async fn winners(&self, giveaway_id: i64) -> StoreResult<Vec<Winner>>;

    /// Remove the entity and every participant, prize and winner referencing it.
    async fn delete_cascade(&self, kind: EntityKind, id: i64) -> StoreResult<()>;

    async fn stats(&self) -> StoreResult<Stats>;
}
