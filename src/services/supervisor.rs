//! Lifecycle of the Telegram connection.
//!
//! The bot is probed with `getMe` under a bounded exponential backoff. Once
//! the probe succeeds the dispatcher runs until shutdown; if every attempt
//! fails the bot is marked degraded and the HTTP API keeps serving.

use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use tracing::{error, warn};

use crate::bot::handlers::BotHandler;
use crate::utils::logging::log_system_event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BotState {
    Starting,
    Connected,
    Degraded,
    Stopped,
}

impl BotState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BotState::Starting => "starting",
            BotState::Connected => "connected",
            BotState::Degraded => "degraded",
            BotState::Stopped => "stopped",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => BotState::Connected,
            2 => BotState::Degraded,
            3 => BotState::Stopped,
            _ => BotState::Starting,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            BotState::Starting => 0,
            BotState::Connected => 1,
            BotState::Degraded => 2,
            BotState::Stopped => 3,
        }
    }
}

/// Shared, lock-free view of the bot state for the health endpoint.
#[derive(Debug, Clone, Default)]
pub struct BotStatus(Arc<AtomicU8>);

impl BotStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> BotState {
        BotState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, state: BotState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Runs `probe` until it succeeds or the policy is exhausted.
pub async fn probe_with_backoff<T, E, F, Fut>(policy: &RetryPolicy, mut probe: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    for attempt in 1..=policy.max_attempts {
        match probe().await {
            Ok(value) => return Some(value),
            Err(e) if attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "Bot connection attempt {}/{} failed: {}; retrying in {:?}",
                    attempt, policy.max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                error!("Bot connection attempt {}/{} failed: {}", attempt, policy.max_attempts, e);
            }
        }
    }
    None
}

pub struct BotSupervisor {
    bot: Bot,
    handler: BotHandler,
    status: BotStatus,
    policy: RetryPolicy,
}

impl BotSupervisor {
    pub fn new(bot: Bot, handler: BotHandler, status: BotStatus) -> Self {
        Self {
            bot,
            handler,
            status,
            policy: RetryPolicy::default(),
        }
    }

    pub async fn run(self) {
        self.status.set(BotState::Starting);

        let bot = self.bot.clone();
        let me = probe_with_backoff(&self.policy, || {
            let bot = bot.clone();
            async move { bot.get_me().await }
        })
        .await;

        let Some(me) = me else {
            self.status.set(BotState::Degraded);
            log_system_event("Bot degraded", Some("Telegram unreachable, serving HTTP only"));
            return;
        };

        self.status.set(BotState::Connected);
        log_system_event("Bot connected", Some(&format!("@{}", me.username())));

        Dispatcher::builder(self.bot, self.handler.schema())
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        self.status.set(BotState::Stopped);
        log_system_event("Bot dispatcher stopped", None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(6), Duration::from_secs(32));
        assert_eq!(policy.delay_for(7), Duration::from_secs(60));
        assert_eq!(policy.delay_for(40), Duration::from_secs(60));
    }

    #[test]
    fn test_status_round_trip() {
        let status = BotStatus::new();
        assert_eq!(status.get(), BotState::Starting);
        status.set(BotState::Degraded);
        assert_eq!(status.clone().get(), BotState::Degraded);
    }

    #[tokio::test]
    async fn test_probe_gives_up_after_max_attempts() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };
        let calls = AtomicU32::new(0);

        let result: Option<()> = probe_with_backoff(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("unreachable") }
        })
        .await;

        assert!(result.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_probe_returns_first_success() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };
        let calls = AtomicU32::new(0);

        let result = probe_with_backoff(&policy, || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err("not yet")
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result, Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
