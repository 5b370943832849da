use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct GiveawayParticipant {
    pub giveaway_id: i64,
    pub user_id: i64,
    pub joined_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct TournamentRegistration {
    pub tournament_id: i64,
    pub user_id: i64,
    pub age: i64,
    pub phone_brand: String,
    pub nickname: String,
    pub game_id: String,
    pub registered_at: String,
}

/// Registration joined with whatever the user table knows about the player.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct RegistrationView {
    pub tournament_id: i64,
    pub user_id: i64,
    pub age: i64,
    pub phone_brand: String,
    pub nickname: String,
    pub game_id: String,
    pub registered_at: String,
    pub first_name: Option<String>,
    pub username: Option<String>,
}

impl RegistrationView {
    pub fn new(registration: TournamentRegistration, first_name: Option<String>, username: Option<String>) -> Self {
        Self {
            tournament_id: registration.tournament_id,
            user_id: registration.user_id,
            age: registration.age,
            phone_brand: registration.phone_brand,
            nickname: registration.nickname,
            game_id: registration.game_id,
            registered_at: registration.registered_at,
            first_name,
            username,
        }
    }
}

/// Validated registration ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRegistration {
    pub tournament_id: i64,
    pub user_id: i64,
    pub age: i64,
    pub phone_brand: String,
    pub nickname: String,
    pub game_id: String,
}
