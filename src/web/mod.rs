//! JSON API consumed by the Telegram web app.
//!
//! Handlers live in one module per resource and share [`AppState`]. The
//! health routes are merged in from [`HealthService`] so a single listener
//! serves everything.

pub mod admin;
pub mod error;
pub mod extractors;
pub mod giveaways;
pub mod tournaments;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::database::connection::DatabaseManager;
use crate::database::models::Winner;
use crate::database::Store;
use crate::services::draw::DrawEngine;
use crate::services::health::HealthService;
use crate::services::ledger::ParticipationLedger;
use crate::services::membership::{MembershipChecker, SubscriptionService};
use crate::services::notify::{BotLinks, NotificationDispatcher, Notifier};
use crate::services::supervisor::BotStatus;
use crate::utils::validation::{parse_optional_int, validate_user_id, FieldValue};
use self::error::{ApiError, ApiResult};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseManager,
    pub ledger: ParticipationLedger,
    pub draws: DrawEngine,
    pub dispatcher: NotificationDispatcher,
    pub subscriptions: SubscriptionService,
    pub admin_ids: Arc<Vec<i64>>,
}

impl AppState {
    pub fn new(
        db: DatabaseManager,
        notifier: Arc<dyn Notifier>,
        membership: Arc<dyn MembershipChecker>,
        links: BotLinks,
        admin_ids: Vec<i64>,
    ) -> Self {
        let store = db.store.clone();
        Self {
            ledger: ParticipationLedger::new(store.clone()),
            draws: DrawEngine::new(store.clone()),
            dispatcher: NotificationDispatcher::new(notifier, store.clone(), links),
            subscriptions: SubscriptionService::new(membership, store),
            admin_ids: Arc::new(admin_ids),
            db,
        }
    }

    pub fn store(&self) -> &dyn Store {
        self.db.store.as_ref()
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }
}

/// Winner as the web app renders it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WinnerView {
    pub id: i64,
    pub name: String,
    pub username: Option<String>,
    pub place: i64,
}

impl From<&Winner> for WinnerView {
    fn from(winner: &Winner) -> Self {
        Self {
            id: winner.user_id,
            name: winner.display_name.clone(),
            username: winner.username.clone(),
            place: winner.place,
        }
    }
}

/// Reads the mandatory `user_id` field of a request body, accepting it as a
/// number or a numeric string.
pub fn require_user_id(value: Option<&FieldValue>) -> ApiResult<i64> {
    let user_id = parse_optional_int("user_id", value).map_err(ApiError::invalid)?;
    validate_user_id(user_id).map_err(ApiError::invalid)
}

pub fn router(state: AppState, bot_status: BotStatus) -> Router {
    let health = HealthService::new(state.db.clone(), bot_status);

    let api = Router::new()
        .route("/api/giveaways", get(giveaways::list).post(giveaways::create))
        .route("/api/giveaways/:id", put(giveaways::update).delete(giveaways::remove))
        .route("/api/giveaways/:id/participate", post(giveaways::participate))
        .route("/api/giveaways/:id/draw", post(giveaways::draw))
        .route("/api/giveaways/:id/finish", post(giveaways::finish))
        .route("/api/giveaways/:id/winners", get(giveaways::winners))
        .route("/api/tournaments", get(tournaments::list).post(tournaments::create))
        .route("/api/tournaments/:id", delete(tournaments::remove))
        .route("/api/tournaments/:id/register", post(tournaments::register))
        .route("/api/tournaments/:id/toggle-registration", post(tournaments::toggle_registration))
        .route("/api/tournaments/:id/participants", get(tournaments::participants))
        .route("/api/check-admin", post(admin::check_admin))
        .route("/api/check-subscription", post(admin::check_subscription))
        .route("/api/stats", get(admin::stats))
        .with_state(state);

    api.merge(health.router)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}
