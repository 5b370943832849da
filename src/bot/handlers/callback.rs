use teloxide::prelude::*;
use teloxide::types::InlineKeyboardMarkup;

use crate::bot::commands::admin::{format_stats, ACCESS_DENIED};
use crate::bot::handlers::{new_user_from, BotHandler, HandlerResult};
use crate::bot::web_app_button;
use crate::services::ledger::{LedgerError, ParticipationOutcome};

/// What a button press asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Participate(i64),
    ShowStats,
    CreateGiveaway,
    CreateTournament,
    Manage,
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        if let Some(id) = data.strip_prefix("participate_") {
            return id.parse().ok().map(CallbackAction::Participate);
        }
        match data {
            "show_stats" => Some(CallbackAction::ShowStats),
            "create_giveaway" => Some(CallbackAction::CreateGiveaway),
            "create_tournament" => Some(CallbackAction::CreateTournament),
            "manage" => Some(CallbackAction::Manage),
            _ => None,
        }
    }

    fn requires_admin(&self) -> bool {
        !matches!(self, CallbackAction::Participate(_))
    }
}

/// Alert text shown after pressing "Participate" under a channel post.
pub fn participation_alert(outcome: &Result<ParticipationOutcome, LedgerError>) -> String {
    match outcome {
        Ok(ParticipationOutcome::Added { participants }) => {
            format!("✅ You're in! Participants so far: {participants}")
        }
        Ok(ParticipationOutcome::AlreadyExists) => "ℹ️ You are already taking part in this giveaway.".to_string(),
        Ok(ParticipationOutcome::EntityNotFound) => "❌ This giveaway no longer exists.".to_string(),
        Ok(ParticipationOutcome::EntityClosed) => "⏰ This giveaway has already ended.".to_string(),
        Err(_) => "⚠️ Something went wrong, please try again later.".to_string(),
    }
}

pub async fn callback_handler(bot: Bot, q: CallbackQuery, handler: BotHandler) -> HandlerResult {
    let user_id = q.from.id.0 as i64;
    let data = q.data.clone().unwrap_or_default();
    tracing::info!("Callback received: '{}' from user {}", data, user_id);

    let Some(action) = CallbackAction::parse(&data) else {
        bot.answer_callback_query(q.id).text("Unknown action").await?;
        return Ok(());
    };

    if action.requires_admin() && !handler.settings.is_admin(user_id) {
        bot.answer_callback_query(q.id).text(ACCESS_DENIED).show_alert(true).await?;
        return Ok(());
    }

    match action {
        CallbackAction::Participate(giveaway_id) => {
            let outcome = handler.ledger.join_giveaway(giveaway_id, &new_user_from(&q.from)).await;
            if let Err(e) = &outcome {
                tracing::error!("Participation of {} in giveaway {} failed: {}", user_id, giveaway_id, e);
            }
            bot.answer_callback_query(q.id)
                .text(participation_alert(&outcome))
                .show_alert(true)
                .await?;
        }
        CallbackAction::ShowStats => {
            bot.answer_callback_query(q.id).await?;
            let text = match handler.db.store.stats().await {
                Ok(stats) => format_stats(&stats),
                Err(e) => {
                    tracing::error!("Failed to load stats: {}", e);
                    "❌ Could not load statistics right now.".to_string()
                }
            };
            bot.send_message(q.from.id, text).await?;
        }
        CallbackAction::CreateGiveaway | CallbackAction::CreateTournament | CallbackAction::Manage => {
            bot.answer_callback_query(q.id).await?;
            let (label, view) = match action {
                CallbackAction::CreateGiveaway => ("🎁 Create giveaway", "create-giveaway"),
                CallbackAction::CreateTournament => ("🏆 Create tournament", "create-tournament"),
                _ => ("🛠 Manage", "manage"),
            };
            let url = format!("{}?view={}", handler.settings.web_app_url, view);

            let request = bot.send_message(q.from.id, "Continue in the app:");
            match web_app_button(label, &url) {
                Some(button) => request.reply_markup(InlineKeyboardMarkup::new(vec![vec![button]])).await?,
                None => request.await?,
            };
        }
    }
    Ok(())
}
