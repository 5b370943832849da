//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Form, Router,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use giveaway_bot::config::StorageConfig;
use giveaway_bot::database::connection::DatabaseManager;
use giveaway_bot::database::models::{NewGiveaway, NewTournament, NewUser};
use giveaway_bot::services::membership::{MembershipChecker, MembershipError};
use giveaway_bot::services::notify::{BotLinks, DeliveryError, Notifier, OutgoingMessage};
use giveaway_bot::web::AppState;

pub async fn sqlite_db() -> (DatabaseManager, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");
    let storage = StorageConfig::Sqlite {
        url: format!("sqlite:{}", db_path.display()),
    };

    let db = DatabaseManager::connect(&storage)
        .await
        .expect("Failed to create test database");
    db.run_migrations().await.expect("Failed to run migrations");
    (db, temp_dir)
}

/// Store backed by a fresh in-process key-value server.
pub async fn kv_db() -> (DatabaseManager, MockKv) {
    let kv = MockKv::start().await;
    let storage = StorageConfig::KeyValue { url: kv.url.clone() };
    let db = DatabaseManager::connect(&storage)
        .await
        .expect("Failed to create key-value store");
    db.run_migrations().await.expect("Failed to run migrations");
    (db, kv)
}

/// PostgreSQL store, only when `TEST_POSTGRES_URL` points at a scratch database.
pub async fn postgres_db() -> Option<DatabaseManager> {
    let url = std::env::var("TEST_POSTGRES_URL").ok()?;
    let storage = StorageConfig::Postgres { url, max_connections: 5 };
    let db = DatabaseManager::connect(&storage)
        .await
        .expect("Failed to connect to PostgreSQL");
    db.run_migrations().await.expect("Failed to run migrations");
    Some(db)
}

/// Minimal server speaking the Replit database protocol.
#[derive(Clone)]
pub struct MockKv {
    pub url: String,
    pub data: Arc<Mutex<BTreeMap<String, String>>>,
    broken: Arc<Mutex<HashSet<String>>>,
}

#[derive(Clone)]
struct KvState {
    data: Arc<Mutex<BTreeMap<String, String>>>,
    broken: Arc<Mutex<HashSet<String>>>,
}

impl MockKv {
    pub async fn start() -> Self {
        let state = KvState {
            data: Arc::default(),
            broken: Arc::default(),
        };
        let app = Router::new()
            .route("/", get(kv_list).post(kv_set))
            .route("/:key", get(kv_get).delete(kv_delete))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock key-value server");
        let addr = listener.local_addr().expect("Mock server has no address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Mock key-value server failed");
        });

        Self {
            url: format!("http://{addr}"),
            data: state.data,
            broken: state.broken,
        }
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.data
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Writes and deletes of `key` answer HTTP 500 until [`MockKv::repair`].
    pub fn break_key(&self, key: &str) {
        self.broken.lock().unwrap().insert(key.to_string());
    }

    pub fn repair(&self) {
        self.broken.lock().unwrap().clear();
    }
}

async fn kv_set(State(state): State<KvState>, Form(pairs): Form<HashMap<String, String>>) -> StatusCode {
    let broken = state.broken.lock().unwrap();
    if pairs.keys().any(|key| broken.contains(key)) {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    state.data.lock().unwrap().extend(pairs);
    StatusCode::OK
}

async fn kv_get(State(state): State<KvState>, Path(key): Path<String>) -> Response {
    match state.data.lock().unwrap().get(&key) {
        Some(value) => (StatusCode::OK, value.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn kv_delete(State(state): State<KvState>, Path(key): Path<String>) -> StatusCode {
    if state.broken.lock().unwrap().contains(&key) {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    state.data.lock().unwrap().remove(&key);
    StatusCode::NO_CONTENT
}

async fn kv_list(State(state): State<KvState>, Query(query): Query<HashMap<String, String>>) -> String {
    let prefix = query.get("prefix").cloned().unwrap_or_default();
    state
        .data
        .lock()
        .unwrap()
        .keys()
        .filter(|k| k.starts_with(&prefix))
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

/// Notifier double that records every message and fails for chosen users.
#[derive(Default)]
pub struct RecordingNotifier {
    pub direct: Mutex<Vec<(i64, OutgoingMessage)>>,
    pub channel: Mutex<Vec<OutgoingMessage>>,
    pub failing_users: HashSet<i64>,
    pub has_channel: bool,
    next_message_id: AtomicI64,
}

impl RecordingNotifier {
    pub fn with_channel() -> Self {
        Self {
            has_channel: true,
            next_message_id: AtomicI64::new(100),
            ..Self::default()
        }
    }

    pub fn failing_for(mut self, users: &[i64]) -> Self {
        self.failing_users = users.iter().copied().collect();
        self
    }

    pub fn direct_recipients(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.direct.lock().unwrap().iter().map(|(id, _)| *id).collect();
        ids.sort_unstable();
        ids
    }

    pub fn message_for(&self, user_id: i64) -> Option<OutgoingMessage> {
        self.direct
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _)| *id == user_id)
            .map(|(_, message)| message.clone())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_to_user(&self, user_id: i64, message: &OutgoingMessage) -> Result<(), DeliveryError> {
        if self.failing_users.contains(&user_id) {
            return Err(DeliveryError::new(format!("user {user_id}"), "bot was blocked by the user"));
        }
        self.direct.lock().unwrap().push((user_id, message.clone()));
        Ok(())
    }

    async fn post_to_channel(&self, message: &OutgoingMessage) -> Result<Option<i64>, DeliveryError> {
        if !self.has_channel {
            return Ok(None);
        }
        self.channel.lock().unwrap().push(message.clone());
        Ok(Some(self.next_message_id.fetch_add(1, Ordering::SeqCst)))
    }
}

/// Membership checker with a canned answer.
pub enum StubMembership {
    Member(bool),
    Inaccessible,
    Failing,
}

#[async_trait]
impl MembershipChecker for StubMembership {
    async fn is_member(&self, _user_id: i64) -> Result<bool, MembershipError> {
        match self {
            StubMembership::Member(member) => Ok(*member),
            StubMembership::Inaccessible => Err(MembershipError::Inaccessible(
                "Bad Request: member list is inaccessible".to_string(),
            )),
            StubMembership::Failing => Err(MembershipError::Failed("network down".to_string())),
        }
    }
}

pub const ADMIN_ID: i64 = 1000;

pub fn test_state(db: DatabaseManager, notifier: Arc<RecordingNotifier>, membership: StubMembership) -> AppState {
    let links = BotLinks {
        bot_username: Some("giveaway_test_bot".to_string()),
        web_app_url: "https://example.com/app".to_string(),
    };
    AppState::new(db, notifier, Arc::new(membership), links, vec![ADMIN_ID])
}

pub fn user(user_id: i64) -> NewUser {
    NewUser {
        user_id,
        username: Some(format!("user{user_id}")),
        first_name: Some(format!("User {user_id}")),
        last_name: None,
    }
}

pub fn giveaway(title: &str, winners_count: i64) -> NewGiveaway {
    NewGiveaway {
        title: title.to_string(),
        description: Some("Weekly drop".to_string()),
        end_date: Some("2030-01-01T18:00:00Z".to_string()),
        winners_count,
        prizes: Vec::new(),
    }
}

pub fn tournament(title: &str) -> NewTournament {
    NewTournament {
        title: title.to_string(),
        description: Some("Squad mode".to_string()),
        start_date: Some("2030-01-02T12:00:00Z".to_string()),
        winners_count: 3,
    }
}
