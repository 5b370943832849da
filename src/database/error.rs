//! Storage error taxonomy shared by every backend.

use thiserror::Error;

use crate::database::store::EntityKind;

/// SQLite extended codes (UNIQUE, PRIMARYKEY) and the PostgreSQL SQLSTATE.
const UNIQUE_VIOLATION_CODES: &[&str] = &["2067", "1555", "23505"];
const FOREIGN_KEY_VIOLATION_CODES: &[&str] = &["787", "23503"];
/// SQLITE_BUSY and SQLITE_LOCKED family.
const BUSY_CODES: &[&str] = &["5", "6", "261", "517"];

pub type StoreResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("connection to the store failed: {0}")]
    ConnectionFailed(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: i64 },

    #[error("storage backend unavailable: {0}")]
    BackendUnavailable(String),
}

impl StorageError {
    pub fn not_found(entity: EntityKind, id: i64) -> Self {
        StorageError::NotFound { entity, id }
    }

    /// Only transport-level failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::ConnectionFailed(_))
    }
}

/// Convert SQLx error to StorageError
pub fn map_db_error(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed => StorageError::ConnectionFailed(e.to_string()),
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.to_string()).unwrap_or_default();
            let message = db_err.message();
            if UNIQUE_VIOLATION_CODES.contains(&code.as_str())
                || message.contains("UNIQUE constraint failed")
                || message.contains("duplicate key value")
            {
                StorageError::ConstraintViolation(message.to_string())
            } else if BUSY_CODES.contains(&code.as_str()) {
                StorageError::ConnectionFailed(message.to_string())
            } else {
                StorageError::BackendUnavailable(e.to_string())
            }
        }
        _ => StorageError::BackendUnavailable(e.to_string()),
    }
}

/// A child row pointing at a parent that no longer exists.
pub fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.to_string()).unwrap_or_default();
            FOREIGN_KEY_VIOLATION_CODES.contains(&code.as_str())
                || db_err.message().contains("FOREIGN KEY constraint failed")
        }
        _ => false,
    }
}

/// Convert a key-value transport error to StorageError
pub fn map_http_error(e: reqwest::Error) -> StorageError {
    if e.is_connect() || e.is_timeout() || e.is_request() {
        StorageError::ConnectionFailed(e.to_string())
    } else {
        StorageError::BackendUnavailable(e.to_string())
    }
}
