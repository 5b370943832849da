use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::database::models::{
    Giveaway, GiveawayFilter, GiveawayStatus, GiveawayUpdate, NewGiveaway, NewUser, Prize,
};
use crate::database::EntityKind;
use crate::services::draw::DrawOutcome;
use crate::services::ledger::ParticipationOutcome;
use crate::utils::datetime::normalize_end_date;
use crate::utils::validation::{
    parse_optional_int, validate_description, validate_prizes, validate_title,
    validate_winners_count, FieldValue,
};
use crate::web::error::{ApiError, ApiResult};
use crate::web::extractors::{ApiJson, ApiPath, ApiQuery};
use crate::web::{require_user_id, AppState, WinnerView};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Serialize)]
pub struct GiveawayView {
    #[serde(flatten)]
    pub giveaway: Giveaway,
    pub participants: i64,
    pub prizes: Vec<Prize>,
}

/// Body of create and update requests.
#[derive(Debug, Default, Deserialize)]
pub struct GiveawayRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub end_date: Option<String>,
    pub winners_count: Option<FieldValue>,
    pub prizes: Option<Vec<String>>,
}

impl GiveawayRequest {
    fn into_new(self) -> anyhow::Result<NewGiveaway> {
        let winners_count =
            validate_winners_count(parse_optional_int("winners_count", self.winners_count.as_ref())?)?;
        Ok(NewGiveaway {
            title: validate_title(self.title.as_deref())?,
            description: validate_description(self.description.as_deref())?,
            end_date: normalize_end_date(self.end_date.as_deref())?,
            prizes: validate_prizes(&self.prizes.unwrap_or_default(), winners_count)?,
            winners_count,
        })
    }

    /// Fields left out keep their current values. Prizes are fixed at
    /// creation, so the winner count may not drop below them.
    fn into_update(self, current: &Giveaway, prizes: &[Prize]) -> anyhow::Result<GiveawayUpdate> {
        if self.prizes.as_ref().is_some_and(|p| !p.is_empty()) {
            anyhow::bail!("Prizes cannot be changed after the giveaway is created");
        }
        let winners_count = match parse_optional_int("winners_count", self.winners_count.as_ref())? {
            Some(count) => validate_winners_count(Some(count))?,
            None => current.winners_count,
        };
        if (prizes.len() as i64) > winners_count {
            anyhow::bail!(
                "winners_count must be at least {} to cover the existing prizes",
                prizes.len()
            );
        }
        Ok(GiveawayUpdate {
            title: validate_title(self.title.as_deref().or(Some(current.title.as_str())))?,
            description: match self.description {
                Some(description) => validate_description(Some(&description))?,
                None => current.description.clone(),
            },
            end_date: match self.end_date {
                Some(end_date) => normalize_end_date(Some(&end_date))?,
                None => current.end_date.clone(),
            },
            winners_count,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ParticipateRequest {
    pub user_id: Option<FieldValue>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

async fn load(state: &AppState, id: i64) -> ApiResult<Giveaway> {
    state
        .store()
        .get_giveaway(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Giveaway {id} not found")))
}

pub async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Json<Vec<GiveawayView>>> {
    let filter = if query.all { GiveawayFilter::All } else { GiveawayFilter::Active };
    let store = state.store();

    let mut views = Vec::new();
    for giveaway in store.list_giveaways(filter).await? {
        let participants = store.count_participants(EntityKind::Giveaway, giveaway.id).await?;
        let prizes = store.prizes(giveaway.id).await?;
        views.push(GiveawayView { giveaway, participants, prizes });
    }

    Ok(Json(views))
}

pub async fn create(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<GiveawayRequest>,
) -> ApiResult<Json<Value>> {
    let new_giveaway = body.into_new().map_err(ApiError::invalid)?;
    let id = state.store().create_giveaway(&new_giveaway).await?;
    info!("Giveaway {} created: {}", id, new_giveaway.title);

    // Channel posting is best effort; the giveaway exists either way
    let giveaway = load(&state, id).await?;
    let prizes = state.store().prizes(id).await?;
    state.dispatcher.announce_giveaway(&giveaway, &prizes).await;

    Ok(Json(json!({ "success": true, "id": id })))
}

pub async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<GiveawayRequest>,
) -> ApiResult<Json<Value>> {
    let current = load(&state, id).await?;
    if current.status.is_terminal() {
        return Err(ApiError::conflict(format!(
            "Giveaway {} is {} and can no longer be edited",
            id,
            current.status.as_str()
        )));
    }

    let prizes = state.store().prizes(id).await?;
    let update = body.into_update(&current, &prizes).map_err(ApiError::invalid)?;
    if !state.store().update_giveaway(id, &update).await? {
        // Drawn or finished since the check above
        return Err(ApiError::conflict(format!(
            "Giveaway {id} has been closed and can no longer be edited"
        )));
    }

    Ok(Json(json!({ "success": true })))
}

pub async fn remove(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    state.store().delete_cascade(EntityKind::Giveaway, id).await?;
    info!("Giveaway {} deleted", id);
    Ok(Json(json!({ "success": true })))
}

pub async fn participate(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<ParticipateRequest>,
) -> ApiResult<Json<Value>> {
    let user = NewUser {
        user_id: require_user_id(body.user_id.as_ref())?,
        username: body.username,
        first_name: body.first_name,
        last_name: body.last_name,
    };

    match state.ledger.join_giveaway(id, &user).await? {
        ParticipationOutcome::Added { participants } => {
            Ok(Json(json!({ "success": true, "participants": participants })))
        }
        ParticipationOutcome::AlreadyExists => Err(ApiError::conflict("Already participated")),
        ParticipationOutcome::EntityNotFound => Err(ApiError::not_found(format!("Giveaway {id} not found"))),
        ParticipationOutcome::EntityClosed => Err(ApiError::conflict("Giveaway is no longer active")),
    }
}

pub async fn draw(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    // Loaded up front so a committed draw never fails on a later read
    let mut giveaway = load(&state, id).await?;

    let winners = match state.draws.draw_winners(id).await? {
        DrawOutcome::Winners(winners) => winners,
        DrawOutcome::NotFound => return Err(ApiError::not_found(format!("Giveaway {id} not found"))),
        DrawOutcome::InsufficientParticipants { needed, have } => {
            return Err(ApiError::InsufficientParticipants { needed, have })
        }
        DrawOutcome::AlreadyDrawn(winners) => return Err(ApiError::AlreadyDrawn { winners }),
    };

    // Results go out in the background so slow deliveries never hold the response
    giveaway.status = GiveawayStatus::Completed;
    let dispatcher = state.dispatcher.clone();
    let announced = winners.clone();
    tokio::spawn(async move {
        dispatcher.announce_results(&giveaway, &announced).await;
    });

    let views: Vec<WinnerView> = winners.iter().map(WinnerView::from).collect();
    let body = match views.as_slice() {
        [single] => json!({ "success": true, "winner": single }),
        _ => json!({ "success": true, "winners": views }),
    };
    Ok(Json(body))
}

/// Closes an active giveaway without drawing.
pub async fn finish(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    let finished = state
        .store()
        .transition_giveaway_status(id, GiveawayStatus::Active, GiveawayStatus::Finished)
        .await?;

    if !finished {
        let current = load(&state, id).await?;
        return Err(ApiError::conflict(format!(
            "Giveaway {} is already {}",
            id,
            current.status.as_str()
        )));
    }

    info!("Giveaway {} finished without a draw", id);
    Ok(Json(json!({ "success": true, "status": GiveawayStatus::Finished })))
}

pub async fn winners(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    let giveaway = load(&state, id).await?;
    let winners: Vec<WinnerView> = state
        .store()
        .winners(id)
        .await?
        .iter()
        .map(WinnerView::from)
        .collect();

    Ok(Json(json!({
        "giveaway_id": id,
        "status": giveaway.status,
        "winners": winners,
    })))
}
