use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::bot::handlers::{BotHandler, HandlerResult};
use crate::database::models::Stats;

pub const ACCESS_DENIED: &str = "⛔ This command is only available to administrators.";

pub fn admin_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("📊 Statistics", "show_stats")],
        vec![
            InlineKeyboardButton::callback("🎁 New giveaway", "create_giveaway"),
            InlineKeyboardButton::callback("🏆 New tournament", "create_tournament"),
        ],
        vec![InlineKeyboardButton::callback("🛠 Manage", "manage")],
    ])
}

pub fn format_stats(stats: &Stats) -> String {
    format!(
        "📊 Bot statistics\n\n\
        👥 Users: {} ({} subscribed)\n\
        🎁 Giveaways: {} ({} active)\n\
        🏆 Tournaments: {}",
        stats.total_users,
        stats.active_users,
        stats.total_giveaways,
        stats.active_giveaways,
        stats.total_tournaments
    )
}

fn sender_id(msg: &Message) -> Option<i64> {
    msg.from().map(|u| u.id.0 as i64)
}

pub async fn handle_admin(bot: Bot, msg: Message, handler: &BotHandler) -> HandlerResult {
    if !sender_id(&msg).is_some_and(|id| handler.settings.is_admin(id)) {
        bot.send_message(msg.chat.id, ACCESS_DENIED).await?;
        return Ok(());
    }

    bot.send_message(msg.chat.id, "🛠 Admin panel")
        .reply_markup(admin_keyboard())
        .await?;
    Ok(())
}

pub async fn handle_stats(bot: Bot, msg: Message, handler: &BotHandler) -> HandlerResult {
    if !sender_id(&msg).is_some_and(|id| handler.settings.is_admin(id)) {
        bot.send_message(msg.chat.id, ACCESS_DENIED).await?;
        return Ok(());
    }

    match handler.db.store.stats().await {
        Ok(stats) => {
            bot.send_message(msg.chat.id, format_stats(&stats)).await?;
        }
        Err(e) => {
            tracing::error!("Failed to load stats: {}", e);
            bot.send_message(msg.chat.id, "❌ Could not load statistics right now.").await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_stats() {
        let stats = Stats {
            total_users: 120,
            active_users: 80,
            total_giveaways: 7,
            active_giveaways: 2,
            total_tournaments: 3,
        };
        let text = format_stats(&stats);
        assert!(text.contains("Users: 120 (80 subscribed)"));
        assert!(text.contains("Giveaways: 7 (2 active)"));
        assert!(text.contains("Tournaments: 3"));
    }

    #[test]
    fn test_admin_keyboard_callbacks() {
        let markup = admin_keyboard();
        let data: Vec<String> = markup
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|button| match &button.kind {
                teloxide::types::InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(data, vec!["show_stats", "create_giveaway", "create_tournament", "manage"]);
    }
}
