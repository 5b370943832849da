use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Winner {
    pub giveaway_id: i64,
    pub user_id: i64,
    /// 1-based rank in draw order.
    pub place: i64,
    pub display_name: String,
    pub username: Option<String>,
}
