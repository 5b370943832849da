use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::database::{Store, StoreResult};

#[derive(Debug, Error)]
pub enum MembershipError {
    /// Telegram refuses to reveal the member list (bot is not an admin of the
    /// channel, or the chat is private).
    #[error("channel member list is inaccessible: {0}")]
    Inaccessible(String),

    #[error("membership lookup failed: {0}")]
    Failed(String),

    #[error("no channel configured")]
    NoChannel,
}

#[async_trait]
pub trait MembershipChecker: Send + Sync {
    async fn is_member(&self, user_id: i64) -> Result<bool, MembershipError>;
}

/// Resolves and records whether a user follows the community channel.
#[derive(Clone)]
pub struct SubscriptionService {
    checker: Arc<dyn MembershipChecker>,
    store: Arc<dyn Store>,
}

impl SubscriptionService {
    pub fn new(checker: Arc<dyn MembershipChecker>, store: Arc<dyn Store>) -> Self {
        Self { checker, store }
    }

    /// When the channel cannot be inspected, anyone who has used the bot
    /// counts as subscribed. Other lookup failures answer "not subscribed"
    /// and leave the stored flag alone.
    pub async fn check(&self, user_id: i64) -> StoreResult<bool> {
        let subscribed = match self.checker.is_member(user_id).await {
            Ok(member) => member,
            Err(e @ (MembershipError::Inaccessible(_) | MembershipError::NoChannel)) => {
                debug!("Membership of {} unknown ({}), falling back to user records", user_id, e);
                self.store.get_user(user_id).await?.is_some()
            }
            Err(e) => {
                warn!("Subscription check for {} failed: {}", user_id, e);
                return Ok(false);
            }
        };

        self.store.set_subscription(user_id, subscribed).await?;
        Ok(subscribed)
    }
}
