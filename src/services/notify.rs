//! Best-effort delivery of announcements and draw results.
//!
//! Sending goes through the [`Notifier`] trait so the dispatcher can run
//! against Telegram in production and a recording double in tests. A failed
//! delivery is logged and counted; it never aborts the batch and never
//! touches what is already stored.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::database::models::{Giveaway, Prize, Tournament, Winner};
use crate::database::{EntityKind, Store};
use crate::utils::datetime::format_stored;
use crate::utils::logging::{log_delivery_failure, log_system_event};
use crate::utils::markdown::{bold, escape_markdown, mention};

#[derive(Debug, Clone, Error)]
#[error("delivery to {recipient} failed: {reason}")]
pub struct DeliveryError {
    pub recipient: String,
    pub reason: String,
}

impl DeliveryError {
    pub fn new(recipient: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            reason: reason.into(),
        }
    }
}

/// Single inline button attached under a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostButton {
    Callback { label: String, data: String },
    Url { label: String, url: String },
}

/// A MarkdownV2 message, already escaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
    pub button: Option<PostButton>,
}

impl OutgoingMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            button: None,
        }
    }

    pub fn with_button(mut self, button: PostButton) -> Self {
        self.button = Some(button);
        self
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_to_user(&self, user_id: i64, message: &OutgoingMessage) -> Result<(), DeliveryError>;

    /// Returns the id of the channel post, or `None` when no channel is configured.
    async fn post_to_channel(&self, message: &OutgoingMessage) -> Result<Option<i64>, DeliveryError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Where announcement buttons should point.
#[derive(Debug, Clone, Default)]
pub struct BotLinks {
    pub bot_username: Option<String>,
    pub web_app_url: String,
}

impl BotLinks {
    /// Deep link that opens the bot on the tournament, or the web app when the
    /// bot username is unknown.
    pub fn tournament_link(&self, tournament_id: i64) -> String {
        match self.bot_username.as_deref() {
            Some(bot) => format!("https://t.me/{bot}?start=tournament_{tournament_id}"),
            None => self.web_app_url.clone(),
        }
    }
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn Store>,
    links: BotLinks,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, store: Arc<dyn Store>, links: BotLinks) -> Self {
        Self { notifier, store, links }
    }

    /// Posts the giveaway to the channel and remembers the post id.
    pub async fn announce_giveaway(&self, giveaway: &Giveaway, prizes: &[Prize]) -> Option<i64> {
        let message = giveaway_post(giveaway, prizes);
        self.post_and_remember(EntityKind::Giveaway, giveaway.id, &message).await
    }

    pub async fn announce_tournament(&self, tournament: &Tournament) -> Option<i64> {
        let message = tournament_post(tournament, &self.links);
        self.post_and_remember(EntityKind::Tournament, tournament.id, &message).await
    }

    /// Tells every participant how the draw went and posts the results to the
    /// channel. Winners learn their place.
    pub async fn announce_results(&self, giveaway: &Giveaway, winners: &[Winner]) -> DeliveryReport {
        let participants = match self.store.participant_ids(giveaway.id).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Could not load participants of giveaway {}: {}; notifying winners only", giveaway.id, e);
                winners.iter().map(|w| w.user_id).collect()
            }
        };
        let prizes = self.store.prizes(giveaway.id).await.unwrap_or_else(|e| {
            warn!("Could not load prizes of giveaway {}: {}", giveaway.id, e);
            Vec::new()
        });

        let mut report = DeliveryReport::default();
        let consolation = participant_message(giveaway, winners);

        for user_id in participants {
            let personal;
            let message = match winners.iter().find(|w| w.user_id == user_id) {
                Some(winner) => {
                    let prize = prizes.iter().find(|p| p.place == winner.place);
                    personal = winner_message(giveaway, winner, prize);
                    &personal
                }
                None => &consolation,
            };

            match self.notifier.send_to_user(user_id, message).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    log_delivery_failure(&e.recipient, &e.reason);
                    report.failed += 1;
                }
            }
        }

        match self.notifier.post_to_channel(&results_post(giveaway, winners)).await {
            Ok(Some(_)) => report.delivered += 1,
            Ok(None) => {}
            Err(e) => {
                log_delivery_failure(&e.recipient, &e.reason);
                report.failed += 1;
            }
        }

        log_system_event(
            "Draw results delivered",
            Some(&format!(
                "giveaway {}: {} delivered, {} failed",
                giveaway.id, report.delivered, report.failed
            )),
        );
        report
    }

    async fn post_and_remember(&self, kind: EntityKind, id: i64, message: &OutgoingMessage) -> Option<i64> {
        match self.notifier.post_to_channel(message).await {
            Ok(Some(message_id)) => {
                if let Err(e) = self.store.set_message_id(kind, id, message_id).await {
                    warn!("Posted {} {} but could not store message id: {}", kind, id, e);
                }
                Some(message_id)
            }
            Ok(None) => None,
            Err(e) => {
                log_delivery_failure(&e.recipient, &e.reason);
                None
            }
        }
    }
}

fn place_label(place: i64) -> String {
    match place {
        1 => "🥇".to_string(),
        2 => "🥈".to_string(),
        3 => "🥉".to_string(),
        n => format!("{n}."),
    }
}

pub fn giveaway_post(giveaway: &Giveaway, prizes: &[Prize]) -> OutgoingMessage {
    let mut lines = vec![bold("🎁 NEW GIVEAWAY"), String::new(), bold(&giveaway.title)];

    if let Some(description) = &giveaway.description {
        lines.push(String::new());
        lines.push(escape_markdown(description));
    }

    lines.push(String::new());
    lines.push(escape_markdown(&format!("🏆 Winners: {}", giveaway.winners_count)));
    for prize in prizes {
        lines.push(escape_markdown(&format!(
            "{} place: {}",
            place_label(prize.place),
            prize.description
        )));
    }
    if let Some(end_date) = &giveaway.end_date {
        lines.push(escape_markdown(&format!("⏰ Ends: {}", format_stored(end_date))));
    }

    lines.push(String::new());
    lines.push(escape_markdown("Press the button below to take part!"));

    OutgoingMessage::new(lines.join("\n")).with_button(PostButton::Callback {
        label: "🎯 Participate".to_string(),
        data: format!("participate_{}", giveaway.id),
    })
}

pub fn tournament_post(tournament: &Tournament, links: &BotLinks) -> OutgoingMessage {
    let mut lines = vec![bold("🏆 NEW TOURNAMENT"), String::new(), bold(&tournament.title)];

    if let Some(description) = &tournament.description {
        lines.push(String::new());
        lines.push(escape_markdown(description));
    }

    lines.push(String::new());
    if let Some(start_date) = &tournament.start_date {
        lines.push(escape_markdown(&format!("📅 Start: {start_date}")));
    }
    lines.push(escape_markdown(&format!("🏅 Winners: {}", tournament.winners_count)));
    lines.push(String::new());
    lines.push(escape_markdown("Register via the button below!"));

    OutgoingMessage::new(lines.join("\n")).with_button(PostButton::Url {
        label: "📝 Register".to_string(),
        url: links.tournament_link(tournament.id),
    })
}

pub fn results_post(giveaway: &Giveaway, winners: &[Winner]) -> OutgoingMessage {
    let mut lines = vec![bold("🎉 GIVEAWAY RESULTS"), String::new(), bold(&giveaway.title), String::new()];

    for winner in winners {
        lines.push(format!(
            "{} {}",
            escape_markdown(&place_label(winner.place)),
            mention(&winner.display_name, winner.username.as_deref())
        ));
    }

    lines.push(String::new());
    lines.push(escape_markdown("Congratulations to the winners!"));
    OutgoingMessage::new(lines.join("\n"))
}

fn winner_message(giveaway: &Giveaway, winner: &Winner, prize: Option<&Prize>) -> OutgoingMessage {
    let mut text = escape_markdown(&format!(
        "🎉 Congratulations! You took place {} in the giveaway \"{}\"!",
        winner.place, giveaway.title
    ));
    if let Some(prize) = prize {
        text.push_str("\n\n");
        text.push_str(&escape_markdown(&format!("🎁 Your prize: {}", prize.description)));
    }
    text.push_str("\n\n");
    text.push_str(&escape_markdown("The organisers will contact you soon."));
    OutgoingMessage::new(text)
}

fn participant_message(giveaway: &Giveaway, winners: &[Winner]) -> OutgoingMessage {
    let names: Vec<String> = winners
        .iter()
        .map(|w| mention(&w.display_name, w.username.as_deref()))
        .collect();

    let text = format!(
        "{}\n\n{} {}\n\n{}",
        escape_markdown(&format!("The giveaway \"{}\" has ended.", giveaway.title)),
        escape_markdown("Winners:"),
        names.join(", "),
        escape_markdown("Thanks for taking part, good luck next time!")
    );
    OutgoingMessage::new(text)
}
