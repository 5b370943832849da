use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_subscribed: bool,
    pub registered_at: String,
}

/// Display fields refreshed on every interaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewUser {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl NewUser {
    pub fn new(user_id: i64) -> Self {
        Self { user_id, ..Default::default() }
    }
}

/// Name shown in winner lists: first name, then handle, then a synthetic label.
pub fn display_name_for(user: Option<&User>, user_id: i64) -> String {
    user.and_then(|u| {
        u.first_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| u.username.as_deref().filter(|n| !n.trim().is_empty()))
            .map(str::to_string)
    })
    .unwrap_or_else(|| format!("User {user_id}"))
}
