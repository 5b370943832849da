pub mod callback;
pub mod message;

use std::sync::Arc;
use teloxide::{dispatching::UpdateHandler, prelude::*};

use crate::bot::commands::Command;
use crate::bot::BotSettings;
use crate::database::connection::DatabaseManager;
use crate::database::models::NewUser;
use crate::services::ledger::ParticipationLedger;

pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;
pub type HandlerResult = Result<(), HandlerError>;

/// Everything the chat handlers share. Cheap to clone.
#[derive(Clone)]
pub struct BotHandler {
    pub db: DatabaseManager,
    pub ledger: ParticipationLedger,
    pub settings: Arc<BotSettings>,
}

impl BotHandler {
    pub fn new(db: DatabaseManager, settings: BotSettings) -> Self {
        Self {
            ledger: ParticipationLedger::new(db.store.clone()),
            db,
            settings: Arc::new(settings),
        }
    }

    pub fn schema(&self) -> UpdateHandler<HandlerError> {
        let commands = self.clone();
        let callbacks = self.clone();

        dptree::entry()
            .branch(
                Update::filter_message()
                    .filter_command::<Command>()
                    .endpoint(move |bot: Bot, msg: Message, cmd: Command| {
                        let handler = commands.clone();
                        async move { message::command_handler(bot, msg, cmd, handler).await }
                    }),
            )
            .branch(Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
                let handler = callbacks.clone();
                async move { callback::callback_handler(bot, q, handler).await }
            }))
    }
}

/// Profile fields of a Telegram user as the store keeps them.
pub fn new_user_from(user: &teloxide::types::User) -> NewUser {
    NewUser {
        user_id: user.id.0 as i64,
        username: user.username.clone(),
        first_name: Some(user.first_name.clone()).filter(|name| !name.is_empty()),
        last_name: user.last_name.clone(),
    }
}
