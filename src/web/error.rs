//! Error type for API handlers.
//!
//! Every failure renders as `{"error": "<message>", "code": "<kind>"}` with
//! a 400, 404 or 500 status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error};

use crate::database::models::Winner;
use crate::database::StorageError;
use crate::services::ledger::LedgerError;
use crate::web::WinnerView;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Not enough participants: {needed} needed, {have} joined")]
    InsufficientParticipants { needed: i64, have: i64 },

    #[error("Winners have already been drawn for this giveaway")]
    AlreadyDrawn { winners: Vec<Winner> },

    #[error("Storage backend error: {0}")]
    Backend(#[source] StorageError),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Wraps a failed validation helper.
    pub fn invalid(err: anyhow::Error) -> Self {
        Self::Validation(err.to_string())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::Conflict(_)
            | Self::InsufficientParticipants { .. }
            | Self::AlreadyDrawn { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::NotFound(_) => "NotFoundError",
            Self::Conflict(_) | Self::AlreadyDrawn { .. } => "ConflictError",
            Self::InsufficientParticipants { .. } => "InsufficientParticipantsError",
            Self::Backend(_) => "BackendError",
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { .. } => Self::NotFound(err.to_string()),
            StorageError::ConstraintViolation(message) => Self::Conflict(message),
            other => Self::Backend(other),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Validation(message) => Self::Validation(message),
            LedgerError::Storage(e) => e.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            error!(error = ?self, "Request failed");
        } else {
            debug!("Request rejected: {}", self);
        }

        let mut body = json!({
            "error": self.to_string(),
            "code": self.error_code(),
        });

        match &self {
            Self::InsufficientParticipants { needed, have } => {
                body["needed"] = json!(needed);
                body["have"] = json!(have);
            }
            Self::AlreadyDrawn { winners } => {
                let winners: Vec<WinnerView> = winners.iter().map(WinnerView::from).collect();
                body["winners"] = json!(winners);
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::EntityKind;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::InsufficientParticipants { needed: 1, have: 0 }.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Backend(StorageError::ConnectionFailed("down".to_string())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_storage_errors_map_to_api_kinds() {
        let not_found: ApiError = StorageError::not_found(EntityKind::Giveaway, 9).into();
        assert_eq!(not_found.error_code(), "NotFoundError");
        assert_eq!(not_found.to_string(), "giveaway 9 not found");

        let duplicate: ApiError = StorageError::ConstraintViolation("dup".to_string()).into();
        assert_eq!(duplicate.error_code(), "ConflictError");

        let backend: ApiError = StorageError::BackendUnavailable("gone".to_string()).into();
        assert_eq!(backend.error_code(), "BackendError");
    }
}
