use serde::{Deserialize, Serialize};

/// Aggregate counters shown on the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total_users: i64,
    pub active_users: i64,
    pub total_giveaways: i64,
    pub active_giveaways: i64,
    pub total_tournaments: i64,
}
