use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use crate::database::error::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Open,
    Closed,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Open => "open",
            RegistrationStatus::Closed => "closed",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, RegistrationStatus::Open)
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistrationStatus {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(RegistrationStatus::Open),
            "closed" => Ok(RegistrationStatus::Closed),
            other => Err(StorageError::BackendUnavailable(format!(
                "unknown registration status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    /// Free text as entered by the organiser.
    pub start_date: Option<String>,
    pub winners_count: i64,
    pub registration_status: RegistrationStatus,
    pub created_at: String,
    pub message_id: Option<i64>,
}

#[derive(Debug, Clone, FromRow)]
pub struct TournamentRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub start_date: Option<String>,
    pub winners_count: i64,
    pub registration_status: String,
    pub created_at: String,
    pub message_id: Option<i64>,
}

impl TryFrom<TournamentRow> for Tournament {
    type Error = StorageError;

    fn try_from(row: TournamentRow) -> Result<Self, Self::Error> {
        Ok(Tournament {
            id: row.id,
            title: row.title,
            description: row.description,
            start_date: row.start_date,
            winners_count: row.winners_count,
            registration_status: row.registration_status.parse()?,
            created_at: row.created_at,
            message_id: row.message_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTournament {
    pub title: String,
    pub description: Option<String>,
    pub start_date: Option<String>,
    pub winners_count: i64,
}
