//! Telegram implementations of the notifier and membership seams.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatMemberKind, InlineKeyboardButton, InlineKeyboardMarkup, ParseMode, Recipient};
use teloxide::RequestError;

use crate::services::membership::{MembershipChecker, MembershipError};
use crate::services::notify::{DeliveryError, Notifier, OutgoingMessage, PostButton};

/// Phrases Telegram uses when the bot may not inspect the channel.
const INACCESSIBLE_MARKERS: &[&str] = &["member list is inaccessible", "bad request"];

#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
    channel: Option<Recipient>,
}

impl TelegramNotifier {
    pub fn new(bot: Bot, channel_id: Option<&str>) -> Self {
        Self {
            bot,
            channel: channel_id.map(parse_channel),
        }
    }
}

/// `@name` addresses a public channel; anything numeric is a chat id.
pub fn parse_channel(channel_id: &str) -> Recipient {
    let channel_id = channel_id.trim();
    match channel_id.parse::<i64>() {
        Ok(id) => Recipient::Id(ChatId(id)),
        Err(_) if channel_id.starts_with('@') => Recipient::ChannelUsername(channel_id.to_string()),
        Err(_) => Recipient::ChannelUsername(format!("@{channel_id}")),
    }
}

pub fn keyboard_for(button: &PostButton) -> Option<InlineKeyboardMarkup> {
    let button = match button {
        PostButton::Callback { label, data } => InlineKeyboardButton::callback(label.clone(), data.clone()),
        PostButton::Url { label, url } => match reqwest::Url::parse(url) {
            Ok(url) => InlineKeyboardButton::url(label.clone(), url),
            Err(e) => {
                tracing::warn!("Skipping button with invalid URL '{}': {}", url, e);
                return None;
            }
        },
    };
    Some(InlineKeyboardMarkup::new(vec![vec![button]]))
}

fn recipient_label(recipient: &Recipient) -> String {
    match recipient {
        Recipient::Id(chat_id) => chat_id.0.to_string(),
        Recipient::ChannelUsername(name) => name.clone(),
    }
}

impl TelegramNotifier {
    async fn send(&self, recipient: Recipient, message: &OutgoingMessage) -> Result<Message, RequestError> {
        let request = self.bot
            .send_message(recipient, message.text.clone())
            .parse_mode(ParseMode::MarkdownV2);

        match message.button.as_ref().and_then(keyboard_for) {
            Some(markup) => request.reply_markup(markup).await,
            None => request.await,
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_to_user(&self, user_id: i64, message: &OutgoingMessage) -> Result<(), DeliveryError> {
        self.send(Recipient::Id(ChatId(user_id)), message)
            .await
            .map(|_| ())
            .map_err(|e| DeliveryError::new(format!("user {user_id}"), e.to_string()))
    }

    async fn post_to_channel(&self, message: &OutgoingMessage) -> Result<Option<i64>, DeliveryError> {
        let Some(channel) = self.channel.clone() else {
            return Ok(None);
        };

        let label = recipient_label(&channel);
        let sent = self.send(channel, message)
            .await
            .map_err(|e| DeliveryError::new(format!("channel {label}"), e.to_string()))?;
        Ok(Some(i64::from(sent.id.0)))
    }
}

#[async_trait]
impl MembershipChecker for TelegramNotifier {
    async fn is_member(&self, user_id: i64) -> Result<bool, MembershipError> {
        let Some(channel) = self.channel.clone() else {
            return Err(MembershipError::NoChannel);
        };

        match self.bot.get_chat_member(channel, UserId(user_id as u64)).await {
            Ok(member) => Ok(matches!(
                member.kind,
                ChatMemberKind::Owner(_) | ChatMemberKind::Administrator(_) | ChatMemberKind::Member
            )),
            Err(e) => {
                let text = e.to_string();
                let lowered = text.to_lowercase();
                if INACCESSIBLE_MARKERS.iter().any(|marker| lowered.contains(marker)) {
                    Err(MembershipError::Inaccessible(text))
                } else {
                    Err(MembershipError::Failed(text))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_channel() {
        assert_eq!(parse_channel("@pubg_drops"), Recipient::ChannelUsername("@pubg_drops".to_string()));
        assert_eq!(parse_channel("pubg_drops"), Recipient::ChannelUsername("@pubg_drops".to_string()));
        assert_eq!(parse_channel("-1001234567890"), Recipient::Id(ChatId(-1001234567890)));
    }

    #[test]
    fn test_invalid_url_button_is_dropped() {
        let button = PostButton::Url {
            label: "Register".to_string(),
            url: "not a url".to_string(),
        };
        assert!(keyboard_for(&button).is_none());

        let button = PostButton::Callback {
            label: "Go".to_string(),
            data: "participate_1".to_string(),
        };
        assert!(keyboard_for(&button).is_some());
    }
}
