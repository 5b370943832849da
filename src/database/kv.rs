//! Key-value backend speaking the Replit database HTTP protocol:
//!
//! * `POST {base}` with form body `key=value` sets a key
//! * `GET {base}/{key}` reads it (404 when absent)
//! * `DELETE {base}/{key}` removes it
//! * `GET {base}?prefix=p` lists matching keys, one per line
//!
//! Values are JSON documents. There are no transactions, so uniqueness is
//! emulated with check-then-set and two racing writers can both pass the
//! check. Parent records are written after their children and deleted after
//! them too: a failed cascade leaves the parent in place so a retry can
//! finish, and a failed create removes the children it already wrote.
//!
//! Ids come from a per-kind counter. Allocation is serialized within the
//! process; separate processes sharing one database can still race on it.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::database::error::{map_http_error, StorageError, StoreResult};
use crate::database::models::*;
use crate::database::store::{Backend, EntityKind, Store};
use crate::utils::datetime::now_timestamp;
use crate::utils::logging::log_database_operation;

mod keys {
    use crate::database::store::EntityKind;

    pub const USER_PREFIX: &str = "user_";

    pub fn entity(kind: EntityKind, id: i64) -> String {
        format!("{}_{}", kind, id)
    }

    pub fn entity_prefix(kind: EntityKind) -> String {
        format!("{}_", kind)
    }

    /// `giveaway_7` yields 7; `giveaway_participant_7_1` and `giveaway_next_id` yield nothing.
    pub fn entity_id(kind: EntityKind, key: &str) -> Option<i64> {
        key.strip_prefix(&entity_prefix(kind))?.parse().ok()
    }

    pub fn counter(kind: EntityKind) -> String {
        format!("{}_next_id", kind)
    }

    pub fn participant_prefix(kind: EntityKind, id: i64) -> String {
        format!("{}_participant_{}_", kind, id)
    }

    pub fn participant(kind: EntityKind, id: i64, user_id: i64) -> String {
        format!("{}{}", participant_prefix(kind, id), user_id)
    }

    pub fn prize_prefix(giveaway_id: i64) -> String {
        format!("giveaway_prize_{}_", giveaway_id)
    }

    pub fn prize(giveaway_id: i64, place: i64) -> String {
        format!("{}{}", prize_prefix(giveaway_id), place)
    }

    pub fn winner_prefix(giveaway_id: i64) -> String {
        format!("giveaway_winner_{}_", giveaway_id)
    }

    pub fn winner(giveaway_id: i64, place: i64) -> String {
        format!("{}{}", winner_prefix(giveaway_id), place)
    }

    pub fn user(user_id: i64) -> String {
        format!("{}{}", USER_PREFIX, user_id)
    }
}

pub struct KeyValueStore {
    http: Client,
    base_url: String,
    /// Held while a counter is read and bumped.
    id_lock: Mutex<()>,
}

impl KeyValueStore {
    pub fn new(base_url: &str) -> StoreResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(map_http_error)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            id_lock: Mutex::new(()),
        })
    }

    fn key_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    async fn get_raw(&self, key: &str) -> StoreResult<Option<String>> {
        let response = self.http
            .get(self.key_url(key))
            .send()
            .await
            .map_err(map_http_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = check_status(response, "GET", key)?
            .text()
            .await
            .map_err(map_http_error)?;
        Ok(Some(body))
    }

    async fn set_raw(&self, key: &str, value: &str) -> StoreResult<()> {
        let response = self.http
            .post(&self.base_url)
            .form(&[(key, value)])
            .send()
            .await
            .map_err(map_http_error)?;
        check_status(response, "SET", key)?;
        Ok(())
    }

    async fn delete_key(&self, key: &str) -> StoreResult<()> {
        let response = self.http
            .delete(self.key_url(key))
            .send()
            .await
            .map_err(map_http_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status(response, "DELETE", key)?;
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let response = self.http
            .get(&self.base_url)
            .query(&[("prefix", prefix)])
            .send()
            .await
            .map_err(map_http_error)?;

        let body = check_status(response, "LIST", prefix)?
            .text()
            .await
            .map_err(map_http_error)?;

        Ok(body
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get_raw(key).await?.is_some())
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.get_raw(key).await? {
            Some(raw) => serde_json::from_str(&raw).map(Some).map_err(|e| {
                StorageError::BackendUnavailable(format!("malformed value under '{key}': {e}"))
            }),
            None => Ok(None),
        }
    }

    async fn set_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> StoreResult<()> {
        let raw = serde_json::to_string(value).map_err(|e| {
            StorageError::BackendUnavailable(format!("cannot encode value for '{key}': {e}"))
        })?;
        self.set_raw(key, &raw).await
    }

    /// Values under every key with the prefix; keys deleted mid-scan are skipped.
    async fn values_with_prefix<T: DeserializeOwned>(&self, prefix: &str) -> StoreResult<Vec<T>> {
        let mut values = Vec::new();
        for key in self.list_keys(prefix).await? {
            if let Some(value) = self.get_json(&key).await? {
                values.push(value);
            }
        }
        Ok(values)
    }

    async fn delete_prefix(&self, prefix: &str) -> StoreResult<usize> {
        let keys = self.list_keys(prefix).await?;
        for key in &keys {
            self.delete_key(key).await?;
        }
        Ok(keys.len())
    }

    async fn entity_ids(&self, kind: EntityKind) -> StoreResult<Vec<i64>> {
        let mut ids: Vec<i64> = self.list_keys(&keys::entity_prefix(kind))
            .await?
            .iter()
            .filter_map(|key| keys::entity_id(kind, key))
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    /// Bumps the per-kind counter, skipping ids that are somehow already taken.
    /// The counter is written before the lock is released, so the next caller
    /// in this process always starts past the id handed out here.
    async fn next_id(&self, kind: EntityKind) -> StoreResult<i64> {
        let _guard = self.id_lock.lock().await;
        let counter = keys::counter(kind);
        let mut id = self.get_json::<i64>(&counter).await?.unwrap_or(0) + 1;
        while self.exists(&keys::entity(kind, id)).await? {
            id += 1;
        }
        self.set_json(&counter, &id).await?;
        Ok(id)
    }

    /// Prizes first, then the giveaway itself.
    async fn write_giveaway(&self, id: i64, giveaway: &NewGiveaway) -> StoreResult<()> {
        for (index, description) in giveaway.prizes.iter().enumerate() {
            let place = index as i64 + 1;
            let prize = Prize {
                giveaway_id: id,
                place,
                description: description.clone(),
            };
            self.set_json(&keys::prize(id, place), &prize).await?;
        }

        let record = Giveaway {
            id,
            title: giveaway.title.clone(),
            description: giveaway.description.clone(),
            end_date: giveaway.end_date.clone(),
            winners_count: giveaway.winners_count,
            status: GiveawayStatus::Active,
            created_at: now_timestamp(),
            message_id: None,
        };
        self.set_json(&keys::entity(EntityKind::Giveaway, id), &record).await
    }

    async fn require_entity(&self, kind: EntityKind, id: i64) -> StoreResult<()> {
        if self.exists(&keys::entity(kind, id)).await? {
            Ok(())
        } else {
            Err(StorageError::not_found(kind, id))
        }
    }

    async fn claim_participant_key(&self, kind: EntityKind, id: i64, user_id: i64) -> StoreResult<String> {
        self.require_entity(kind, id).await?;
        let key = keys::participant(kind, id, user_id);
        if self.exists(&key).await? {
            return Err(StorageError::ConstraintViolation(format!(
                "user {user_id} already joined {kind} {id}"
            )));
        }
        Ok(key)
    }
}

fn check_status(response: Response, operation: &str, key: &str) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(StorageError::BackendUnavailable(format!(
            "{operation} '{key}' answered HTTP {status}"
        )))
    }
}

fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (String, i64)) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl Store for KeyValueStore {
    fn backend(&self) -> Backend {
        Backend::KeyValue
    }

    async fn migrate(&self) -> StoreResult<()> {
        info!("Key-value storage has no schema to migrate");
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        self.list_keys("__ping").await?;
        Ok(())
    }

    async fn describe(&self) -> StoreResult<Vec<String>> {
        let users = self.list_keys(keys::USER_PREFIX).await?.len();
        let giveaways = self.entity_ids(EntityKind::Giveaway).await?.len();
        let tournaments = self.entity_ids(EntityKind::Tournament).await?.len();
        Ok(vec![
            format!("users: {users} key(s)"),
            format!("giveaways: {giveaways} key(s)"),
            format!("tournaments: {tournaments} key(s)"),
        ])
    }

    async fn upsert_user(&self, user: &NewUser) -> StoreResult<()> {
        let key = keys::user(user.user_id);
        let existing: Option<User> = self.get_json(&key).await?;

        let record = match existing {
            Some(existing) => User {
                user_id: user.user_id,
                username: user.username.clone().or(existing.username),
                first_name: user.first_name.clone().or(existing.first_name),
                last_name: user.last_name.clone().or(existing.last_name),
                is_subscribed: existing.is_subscribed,
                registered_at: existing.registered_at,
            },
            None => User {
                user_id: user.user_id,
                username: user.username.clone(),
                first_name: user.first_name.clone(),
                last_name: user.last_name.clone(),
                is_subscribed: false,
                registered_at: now_timestamp(),
            },
        };
        self.set_json(&key, &record).await
    }

    async fn get_user(&self, user_id: i64) -> StoreResult<Option<User>> {
        self.get_json(&keys::user(user_id)).await
    }

    async fn set_subscription(&self, user_id: i64, subscribed: bool) -> StoreResult<bool> {
        let key = keys::user(user_id);
        match self.get_json::<User>(&key).await? {
            Some(mut user) => {
                user.is_subscribed = subscribed;
                self.set_json(&key, &user).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn create_giveaway(&self, giveaway: &NewGiveaway) -> StoreResult<i64> {
        let id = self.next_id(EntityKind::Giveaway).await?;

        if let Err(e) = self.write_giveaway(id, giveaway).await {
            if let Err(cleanup) = self.delete_prefix(&keys::prize_prefix(id)).await {
                warn!("Could not remove prizes of unfinished giveaway {}: {}", id, cleanup);
            }
            return Err(e);
        }

        log_database_operation("SET", "giveaway", Some(&format!("id {id}")));
        Ok(id)
    }

    async fn get_giveaway(&self, id: i64) -> StoreResult<Option<Giveaway>> {
        self.get_json(&keys::entity(EntityKind::Giveaway, id)).await
    }

    async fn list_giveaways(&self, filter: GiveawayFilter) -> StoreResult<Vec<Giveaway>> {
        let mut giveaways = Vec::new();
        for id in self.entity_ids(EntityKind::Giveaway).await? {
            if let Some(giveaway) = self.get_giveaway(id).await? {
                if filter.matches(&giveaway) {
                    giveaways.push(giveaway);
                }
            }
        }
        newest_first(&mut giveaways, |g| (g.created_at.clone(), g.id));
        Ok(giveaways)
    }

    async fn update_giveaway(&self, id: i64, update: &GiveawayUpdate) -> StoreResult<bool> {
        let key = keys::entity(EntityKind::Giveaway, id);
        let mut giveaway: Giveaway = self.get_json(&key)
            .await?
            .ok_or_else(|| StorageError::not_found(EntityKind::Giveaway, id))?;

        if giveaway.status != GiveawayStatus::Active {
            return Ok(false);
        }

        giveaway.title = update.title.clone();
        giveaway.description = update.description.clone();
        giveaway.end_date = update.end_date.clone();
        giveaway.winners_count = update.winners_count;
        self.set_json(&key, &giveaway).await?;
        Ok(true)
    }

    async fn transition_giveaway_status(
        &self,
        id: i64,
        from: GiveawayStatus,
        to: GiveawayStatus,
    ) -> StoreResult<bool> {
        let key = keys::entity(EntityKind::Giveaway, id);
        match self.get_json::<Giveaway>(&key).await? {
            Some(mut giveaway) if giveaway.status == from => {
                giveaway.status = to;
                self.set_json(&key, &giveaway).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn prizes(&self, giveaway_id: i64) -> StoreResult<Vec<Prize>> {
        let mut prizes: Vec<Prize> = self.values_with_prefix(&keys::prize_prefix(giveaway_id)).await?;
        prizes.sort_by_key(|p| p.place);
        Ok(prizes)
    }

    async fn create_tournament(&self, tournament: &NewTournament) -> StoreResult<i64> {
        let id = self.next_id(EntityKind::Tournament).await?;

        let record = Tournament {
            id,
            title: tournament.title.clone(),
            description: tournament.description.clone(),
            start_date: tournament.start_date.clone(),
            winners_count: tournament.winners_count,
            registration_status: RegistrationStatus::Open,
            created_at: now_timestamp(),
            message_id: None,
        };
        self.set_json(&keys::entity(EntityKind::Tournament, id), &record).await?;

        log_database_operation("SET", "tournament", Some(&format!("id {id}")));
        Ok(id)
    }

    async fn get_tournament(&self, id: i64) -> StoreResult<Option<Tournament>> {
        self.get_json(&keys::entity(EntityKind::Tournament, id)).await
    }

    async fn list_tournaments(&self) -> StoreResult<Vec<Tournament>> {
        let mut tournaments = Vec::new();
        for id in self.entity_ids(EntityKind::Tournament).await? {
            if let Some(tournament) = self.get_tournament(id).await? {
                tournaments.push(tournament);
            }
        }
        newest_first(&mut tournaments, |t| (t.created_at.clone(), t.id));
        Ok(tournaments)
    }

    async fn set_registration_status(&self, id: i64, status: RegistrationStatus) -> StoreResult<()> {
        let key = keys::entity(EntityKind::Tournament, id);
        let mut tournament: Tournament = self.get_json(&key)
            .await?
            .ok_or_else(|| StorageError::not_found(EntityKind::Tournament, id))?;

        tournament.registration_status = status;
        self.set_json(&key, &tournament).await
    }

    async fn set_message_id(&self, kind: EntityKind, id: i64, message_id: i64) -> StoreResult<()> {
        let key = keys::entity(kind, id);
        match kind {
            EntityKind::Giveaway => {
                let mut giveaway: Giveaway = self.get_json(&key)
                    .await?
                    .ok_or_else(|| StorageError::not_found(kind, id))?;
                giveaway.message_id = Some(message_id);
                self.set_json(&key, &giveaway).await
            }
            EntityKind::Tournament => {
                let mut tournament: Tournament = self.get_json(&key)
                    .await?
                    .ok_or_else(|| StorageError::not_found(kind, id))?;
                tournament.message_id = Some(message_id);
                self.set_json(&key, &tournament).await
            }
        }
    }

    async fn add_giveaway_participant(&self, giveaway_id: i64, user_id: i64) -> StoreResult<()> {
        let key = self.claim_participant_key(EntityKind::Giveaway, giveaway_id, user_id).await?;
        let participant = GiveawayParticipant {
            giveaway_id,
            user_id,
            joined_at: now_timestamp(),
        };
        self.set_json(&key, &participant).await
    }

    async fn add_tournament_registration(&self, registration: &NewRegistration) -> StoreResult<()> {
        let key = self.claim_participant_key(
            EntityKind::Tournament,
            registration.tournament_id,
            registration.user_id,
        )
        .await?;

        let record = TournamentRegistration {
            tournament_id: registration.tournament_id,
            user_id: registration.user_id,
            age: registration.age,
            phone_brand: registration.phone_brand.clone(),
            nickname: registration.nickname.clone(),
            game_id: registration.game_id.clone(),
            registered_at: now_timestamp(),
        };
        self.set_json(&key, &record).await
    }

    async fn participant_ids(&self, giveaway_id: i64) -> StoreResult<Vec<i64>> {
        let prefix = keys::participant_prefix(EntityKind::Giveaway, giveaway_id);
        let mut participants: Vec<GiveawayParticipant> = self.values_with_prefix(&prefix).await?;
        participants.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.user_id.cmp(&b.user_id)));
        Ok(participants.into_iter().map(|p| p.user_id).collect())
    }

    async fn registrations(&self, tournament_id: i64) -> StoreResult<Vec<RegistrationView>> {
        let prefix = keys::participant_prefix(EntityKind::Tournament, tournament_id);
        let records: Vec<TournamentRegistration> = self.values_with_prefix(&prefix).await?;

        let mut views = Vec::with_capacity(records.len());
        for record in records {
            let user = self.get_user(record.user_id).await?;
            let (first_name, username) = match user {
                Some(u) => (u.first_name, u.username),
                None => (None, None),
            };
            views.push(RegistrationView::new(record, first_name, username));
        }
        newest_first(&mut views, |v| (v.registered_at.clone(), v.user_id));
        Ok(views)
    }

    async fn count_participants(&self, kind: EntityKind, id: i64) -> StoreResult<i64> {
        let keys = self.list_keys(&keys::participant_prefix(kind, id)).await?;
        Ok(keys.len() as i64)
    }

    async fn record_draw(&self, giveaway_id: i64, winners: &[Winner]) -> StoreResult<bool> {
        let key = keys::entity(EntityKind::Giveaway, giveaway_id);
        let mut giveaway: Giveaway = match self.get_json(&key).await? {
            Some(giveaway) => giveaway,
            None => return Ok(false),
        };

        if giveaway.status != GiveawayStatus::Active {
            return Ok(false);
        }

        for winner in winners {
            self.set_json(&keys::winner(giveaway_id, winner.place), winner).await?;
        }

        giveaway.status = GiveawayStatus::Completed;
        self.set_json(&key, &giveaway).await?;

        log_database_operation(
            "DRAW",
            "giveaway_winner",
            Some(&format!("giveaway {giveaway_id}, {} winner(s)", winners.len())),
        );
        Ok(true)
    }

    async fn winners(&self, giveaway_id: i64) -> StoreResult<Vec<Winner>> {
        let mut winners: Vec<Winner> = self.values_with_prefix(&keys::winner_prefix(giveaway_id)).await?;
        winners.sort_by_key(|w| w.place);
        Ok(winners)
    }

    async fn delete_cascade(&self, kind: EntityKind, id: i64) -> StoreResult<()> {
        let key = keys::entity(kind, id);
        if !self.exists(&key).await? {
            return Err(StorageError::not_found(kind, id));
        }

        let mut removed = self.delete_prefix(&keys::participant_prefix(kind, id)).await?;
        if kind == EntityKind::Giveaway {
            removed += self.delete_prefix(&keys::prize_prefix(id)).await?;
            removed += self.delete_prefix(&keys::winner_prefix(id)).await?;
        }
        self.delete_key(&key).await?;

        log_database_operation(
            "DELETE",
            kind.as_str(),
            Some(&format!("id {id} and {removed} child key(s)")),
        );
        Ok(())
    }

    async fn stats(&self) -> StoreResult<Stats> {
        let users: Vec<User> = self.values_with_prefix(keys::USER_PREFIX).await?;
        let giveaways = self.list_giveaways(GiveawayFilter::All).await?;
        let tournaments = self.entity_ids(EntityKind::Tournament).await?;

        Ok(Stats {
            total_users: users.len() as i64,
            active_users: users.iter().filter(|u| u.is_subscribed).count() as i64,
            total_giveaways: giveaways.len() as i64,
            active_giveaways: giveaways
                .iter()
                .filter(|g| g.status == GiveawayStatus::Active)
                .count() as i64,
            total_tournaments: tournaments.len() as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::keys;
    use crate::database::store::EntityKind;

    #[test]
    fn test_entity_id_ignores_child_keys() {
        assert_eq!(keys::entity_id(EntityKind::Giveaway, "giveaway_12"), Some(12));
        assert_eq!(keys::entity_id(EntityKind::Giveaway, "giveaway_participant_12_7"), None);
        assert_eq!(keys::entity_id(EntityKind::Giveaway, "giveaway_prize_12_1"), None);
        assert_eq!(keys::entity_id(EntityKind::Giveaway, "giveaway_next_id"), None);
        assert_eq!(keys::entity_id(EntityKind::Tournament, "giveaway_12"), None);
    }

    #[test]
    fn test_participant_prefix_does_not_collide() {
        let prefix = keys::participant_prefix(EntityKind::Giveaway, 1);
        assert!(keys::participant(EntityKind::Giveaway, 1, 42).starts_with(&prefix));
        assert!(!keys::participant(EntityKind::Giveaway, 10, 42).starts_with(&prefix));
    }

    #[test]
    fn test_user_keys() {
        assert_eq!(keys::user(42), "user_42");
        assert!(keys::user(42).starts_with(keys::USER_PREFIX));
    }
}
