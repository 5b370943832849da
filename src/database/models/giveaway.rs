use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use crate::database::error::StorageError;

/// Lifecycle of a giveaway. `Completed` and `Finished` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GiveawayStatus {
    Active,
    /// Winners were drawn.
    Completed,
    /// Closed by an administrator without a draw.
    Finished,
}

impl GiveawayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GiveawayStatus::Active => "active",
            GiveawayStatus::Completed => "completed",
            GiveawayStatus::Finished => "finished",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, GiveawayStatus::Active)
    }
}

impl fmt::Display for GiveawayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GiveawayStatus {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(GiveawayStatus::Active),
            "completed" => Ok(GiveawayStatus::Completed),
            "finished" => Ok(GiveawayStatus::Finished),
            other => Err(StorageError::BackendUnavailable(format!(
                "unknown giveaway status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Giveaway {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    /// RFC 3339, normalized on write.
    pub end_date: Option<String>,
    pub winners_count: i64,
    pub status: GiveawayStatus,
    pub created_at: String,
    pub message_id: Option<i64>,
}

/// Giveaway as it comes out of a relational table, status still textual.
#[derive(Debug, Clone, FromRow)]
pub struct GiveawayRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub end_date: Option<String>,
    pub winners_count: i64,
    pub status: String,
    pub created_at: String,
    pub message_id: Option<i64>,
}

impl TryFrom<GiveawayRow> for Giveaway {
    type Error = StorageError;

    fn try_from(row: GiveawayRow) -> Result<Self, Self::Error> {
        Ok(Giveaway {
            id: row.id,
            title: row.title,
            description: row.description,
            end_date: row.end_date,
            winners_count: row.winners_count,
            status: row.status.parse()?,
            created_at: row.created_at,
            message_id: row.message_id,
        })
    }
}

/// Validated input for a new giveaway. Prize `n` goes to place `n + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGiveaway {
    pub title: String,
    pub description: Option<String>,
    pub end_date: Option<String>,
    pub winners_count: i64,
    pub prizes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GiveawayUpdate {
    pub title: String,
    pub description: Option<String>,
    pub end_date: Option<String>,
    pub winners_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GiveawayFilter {
    Active,
    All,
}

impl GiveawayFilter {
    pub fn matches(&self, giveaway: &Giveaway) -> bool {
        match self {
            GiveawayFilter::Active => giveaway.status == GiveawayStatus::Active,
            GiveawayFilter::All => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Prize {
    pub giveaway_id: i64,
    pub place: i64,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [GiveawayStatus::Active, GiveawayStatus::Completed, GiveawayStatus::Finished] {
            assert_eq!(status.as_str().parse::<GiveawayStatus>().unwrap(), status);
        }
        assert!("drawing".parse::<GiveawayStatus>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!GiveawayStatus::Active.is_terminal());
        assert!(GiveawayStatus::Completed.is_terminal());
        assert!(GiveawayStatus::Finished.is_terminal());
    }
}
