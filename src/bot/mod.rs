pub mod commands;
pub mod handlers;

use teloxide::types::{InlineKeyboardButton, WebAppInfo};

use crate::config::Config;

/// Values the chat handlers need from the configuration.
#[derive(Debug, Clone, Default)]
pub struct BotSettings {
    pub admin_ids: Vec<i64>,
    pub web_app_url: String,
    /// Public link to the community channel, when it has a username.
    pub channel_link: Option<String>,
    pub tiktok_url: Option<String>,
}

impl BotSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            admin_ids: config.admin_ids.clone(),
            web_app_url: config.web_app_url.clone(),
            channel_link: config.channel_id.as_deref().and_then(channel_link),
            tiktok_url: config.tiktok_url.clone(),
        }
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }
}

/// `@name` channels have a public t.me link; numeric ids do not.
pub fn channel_link(channel_id: &str) -> Option<String> {
    channel_id
        .trim()
        .strip_prefix('@')
        .filter(|name| !name.is_empty())
        .map(|name| format!("https://t.me/{name}"))
}

/// Button opening the web app, or `None` if the URL is not valid.
pub fn web_app_button(label: &str, url: &str) -> Option<InlineKeyboardButton> {
    match reqwest::Url::parse(url) {
        Ok(url) => Some(InlineKeyboardButton::web_app(label, WebAppInfo { url })),
        Err(e) => {
            tracing::warn!("Invalid web app URL '{}': {}", url, e);
            None
        }
    }
}

pub fn link_button(label: &str, url: &str) -> Option<InlineKeyboardButton> {
    reqwest::Url::parse(url)
        .ok()
        .map(|url| InlineKeyboardButton::url(label, url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_link() {
        assert_eq!(channel_link("@pubg_drops").as_deref(), Some("https://t.me/pubg_drops"));
        assert_eq!(channel_link("-1001234567890"), None);
        assert_eq!(channel_link("@"), None);
    }

    #[test]
    fn test_buttons_reject_bad_urls() {
        assert!(web_app_button("Open", "https://example.com/app").is_some());
        assert!(web_app_button("Open", "not a url").is_none());
        assert!(link_button("TikTok", "::").is_none());
    }
}
