use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::bot::handlers::{new_user_from, BotHandler, HandlerResult};
use crate::bot::{link_button, web_app_button, BotSettings};
use crate::database::models::Tournament;
use crate::database::EntityKind;
use crate::utils::datetime::format_stored;

/// Deep-link payload that opens a tournament, e.g. `tournament_12`.
pub fn parse_tournament_payload(payload: &str) -> Option<i64> {
    payload.trim().strip_prefix("tournament_")?.parse().ok()
}

pub async fn handle_start(bot: Bot, msg: Message, payload: String, handler: &BotHandler) -> HandlerResult {
    let Some(user) = msg.from() else {
        return Ok(());
    };

    // A failed upsert must not keep the user from seeing the app
    let new_user = new_user_from(user);
    if let Err(e) = handler.db.store.upsert_user(&new_user).await {
        tracing::error!("Failed to register user {}: {}", new_user.user_id, e);
    }

    if let Some(tournament_id) = parse_tournament_payload(&payload) {
        return show_tournament(&bot, &msg, tournament_id, handler).await;
    }

    let text = format!(
        "🎁 Welcome, {}!\n\n\
        Here you can join community giveaways and sign up for tournaments.\n\
        Open the app below to see what is running right now.",
        user.first_name
    );

    let request = bot.send_message(msg.chat.id, text);
    match welcome_keyboard(&handler.settings) {
        Some(markup) => request.reply_markup(markup).await?,
        None => request.await?,
    };
    Ok(())
}

fn welcome_keyboard(settings: &BotSettings) -> Option<InlineKeyboardMarkup> {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = Vec::new();

    if let Some(button) = web_app_button("🎮 Open app", &settings.web_app_url) {
        rows.push(vec![button]);
    }

    let links: Vec<InlineKeyboardButton> = [
        settings.channel_link.as_deref().and_then(|url| link_button("📢 Telegram", url)),
        settings.tiktok_url.as_deref().and_then(|url| link_button("🎵 TikTok", url)),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !links.is_empty() {
        rows.push(links);
    }

    (!rows.is_empty()).then(|| InlineKeyboardMarkup::new(rows))
}

async fn show_tournament(bot: &Bot, msg: &Message, tournament_id: i64, handler: &BotHandler) -> HandlerResult {
    let store = &handler.db.store;

    let Some(tournament) = store.get_tournament(tournament_id).await? else {
        bot.send_message(msg.chat.id, "❌ This tournament no longer exists.").await?;
        return Ok(());
    };
    let participants = store.count_participants(EntityKind::Tournament, tournament_id).await?;

    let request = bot.send_message(msg.chat.id, tournament_text(&tournament, participants));
    let register_url = format!("{}?tournament={}", handler.settings.web_app_url, tournament_id);

    match web_app_button("📝 Register", &register_url) {
        Some(button) if tournament.registration_status.is_open() => {
            request.reply_markup(InlineKeyboardMarkup::new(vec![vec![button]])).await?
        }
        _ => request.await?,
    };
    Ok(())
}

pub fn tournament_text(tournament: &Tournament, participants: i64) -> String {
    let mut text = format!("🏆 {}\n", tournament.title);

    if let Some(description) = &tournament.description {
        text.push_str(&format!("\n{description}\n"));
    }
    if let Some(start) = &tournament.start_date {
        text.push_str(&format!("\n📅 Starts: {}", format_stored(start)));
    }
    text.push_str(&format!("\n👥 Registered: {participants}"));
    text.push_str(&format!("\n🏅 Winners: {}", tournament.winners_count));

    if tournament.registration_status.is_open() {
        text.push_str("\n\n✅ Registration is open");
    } else {
        text.push_str("\n\n🔒 Registration is closed");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::RegistrationStatus;

    #[test]
    fn test_parse_tournament_payload() {
        assert_eq!(parse_tournament_payload("tournament_12"), Some(12));
        assert_eq!(parse_tournament_payload(" tournament_3 "), Some(3));
        assert_eq!(parse_tournament_payload(""), None);
        assert_eq!(parse_tournament_payload("tournament_x"), None);
        assert_eq!(parse_tournament_payload("giveaway_1"), None);
    }

    #[test]
    fn test_tournament_text_reflects_registration_state() {
        let mut tournament = Tournament {
            id: 5,
            title: "Squad Cup".to_string(),
            description: Some("Erangel, TPP".to_string()),
            start_date: Some("2024-12-31T18:00:00Z".to_string()),
            winners_count: 3,
            registration_status: RegistrationStatus::Open,
            created_at: "2024-12-01T10:00:00Z".to_string(),
            message_id: None,
        };

        let open = tournament_text(&tournament, 17);
        assert!(open.contains("Squad Cup"));
        assert!(open.contains("31.12.2024 18:00 UTC"));
        assert!(open.contains("Registered: 17"));
        assert!(open.contains("Registration is open"));

        tournament.registration_status = RegistrationStatus::Closed;
        assert!(tournament_text(&tournament, 17).contains("Registration is closed"));
    }

    #[test]
    fn test_welcome_keyboard_skips_missing_links() {
        let settings = BotSettings {
            web_app_url: "https://example.com/app".to_string(),
            ..BotSettings::default()
        };
        let markup = welcome_keyboard(&settings).unwrap();
        assert_eq!(markup.inline_keyboard.len(), 1);

        let settings = BotSettings {
            web_app_url: "https://example.com/app".to_string(),
            channel_link: Some("https://t.me/pubg_drops".to_string()),
            tiktok_url: Some("https://www.tiktok.com/@pubg_drops".to_string()),
            ..BotSettings::default()
        };
        let markup = welcome_keyboard(&settings).unwrap();
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[1].len(), 2);

        assert!(welcome_keyboard(&BotSettings::default()).is_none());
    }
}
