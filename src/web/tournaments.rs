use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::database::models::{NewTournament, NewUser, RegistrationStatus, RegistrationView, Tournament};
use crate::database::EntityKind;
use crate::services::ledger::{ParticipationOutcome, RegistrationForm};
use crate::utils::datetime::normalize_end_date;
use crate::utils::validation::{
    parse_optional_int, validate_description, validate_title, validate_winners_count, FieldValue,
};
use crate::web::error::{ApiError, ApiResult};
use crate::web::extractors::{ApiJson, ApiPath};
use crate::web::{require_user_id, AppState};

#[derive(Debug, Serialize)]
pub struct TournamentView {
    #[serde(flatten)]
    pub tournament: Tournament,
    pub participants: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct TournamentRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<String>,
    pub winners_count: Option<FieldValue>,
}

impl TournamentRequest {
    fn into_new(self) -> anyhow::Result<NewTournament> {
        Ok(NewTournament {
            title: validate_title(self.title.as_deref())?,
            description: validate_description(self.description.as_deref())?,
            start_date: normalize_end_date(self.start_date.as_deref())?,
            winners_count: validate_winners_count(parse_optional_int(
                "winners_count",
                self.winners_count.as_ref(),
            )?)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub user_id: Option<FieldValue>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(flatten)]
    pub form: RegistrationForm,
}

#[derive(Debug, Default, Deserialize)]
pub struct ToggleRequest {
    /// Target state; absent means "flip the current one".
    pub status: Option<String>,
}

async fn load(state: &AppState, id: i64) -> ApiResult<Tournament> {
    state
        .store()
        .get_tournament(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Tournament {id} not found")))
}

pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<TournamentView>>> {
    let store = state.store();

    let mut views = Vec::new();
    for tournament in store.list_tournaments().await? {
        let participants = store.count_participants(EntityKind::Tournament, tournament.id).await?;
        views.push(TournamentView { tournament, participants });
    }

    Ok(Json(views))
}

pub async fn create(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<TournamentRequest>,
) -> ApiResult<Json<Value>> {
    let new_tournament = body.into_new().map_err(ApiError::invalid)?;
    let id = state.store().create_tournament(&new_tournament).await?;
    info!("Tournament {} created: {}", id, new_tournament.title);

    let tournament = load(&state, id).await?;
    state.dispatcher.announce_tournament(&tournament).await;

    Ok(Json(json!({ "success": true, "id": id })))
}

pub async fn remove(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    state.store().delete_cascade(EntityKind::Tournament, id).await?;
    info!("Tournament {} deleted", id);
    Ok(Json(json!({ "success": true })))
}

pub async fn register(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> ApiResult<Json<Value>> {
    let user = NewUser {
        user_id: require_user_id(body.user_id.as_ref())?,
        username: body.username,
        first_name: body.first_name,
        last_name: body.last_name,
    };

    match state.ledger.register_for_tournament(id, &user, &body.form).await? {
        ParticipationOutcome::Added { participants } => {
            Ok(Json(json!({ "success": true, "participants": participants })))
        }
        ParticipationOutcome::AlreadyExists => Err(ApiError::conflict("Already registered")),
        ParticipationOutcome::EntityNotFound => {
            Err(ApiError::not_found(format!("Tournament {id} not found")))
        }
        ParticipationOutcome::EntityClosed => {
            Err(ApiError::conflict("Registration for this tournament is closed"))
        }
    }
}

pub async fn toggle_registration(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<ToggleRequest>,
) -> ApiResult<Json<Value>> {
    let current = load(&state, id).await?;

    let status = match body.status.as_deref().map(str::trim) {
        Some(raw) => raw
            .to_lowercase()
            .parse::<RegistrationStatus>()
            .map_err(|_| ApiError::validation(format!("status must be 'open' or 'closed', got '{raw}'")))?,
        None if current.registration_status.is_open() => RegistrationStatus::Closed,
        None => RegistrationStatus::Open,
    };

    state.store().set_registration_status(id, status).await?;
    info!("Tournament {} registration {}", id, status.as_str());

    Ok(Json(json!({ "success": true, "registration_status": status })))
}

pub async fn participants(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Vec<RegistrationView>>> {
    load(&state, id).await?;
    Ok(Json(state.store().registrations(id).await?))
}
