use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::database::models::Stats;
use crate::utils::validation::{parse_optional_int, FieldValue};
use crate::web::error::ApiResult;
use crate::web::extractors::ApiJson;
use crate::web::{require_user_id, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct UserRequest {
    pub user_id: Option<FieldValue>,
}

/// Unknown or malformed ids are simply not admins.
pub async fn check_admin(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<UserRequest>,
) -> Json<Value> {
    let is_admin = parse_optional_int("user_id", body.user_id.as_ref())
        .ok()
        .flatten()
        .is_some_and(|id| state.is_admin(id));

    Json(json!({ "is_admin": is_admin }))
}

pub async fn check_subscription(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<UserRequest>,
) -> ApiResult<Json<Value>> {
    let user_id = require_user_id(body.user_id.as_ref())?;
    let is_subscribed = state.subscriptions.check(user_id).await?;
    Ok(Json(json!({ "is_subscribed": is_subscribed })))
}

pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<Stats>> {
    Ok(Json(state.store().stats().await?))
}
