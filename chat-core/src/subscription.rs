//! Live-message subscription registry.
//!
//! A conversation listens for inbound messages through a subscription.
//! The registry holds at most one active subscription: a new one can only
//! be installed after the previous one has been released, so two listeners
//! never feed the same timeline.
//!
//! Subscription ids are never reused. A listener that outlived its
//! subscription is recognized as stale and its deliveries are refused.

use chat_types::{Conversation, Epoch};
use std::fmt;
use thiserror::Error;

/// Identifier of one subscription.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Get the numeric value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionId({})", self.0)
    }
}

/// What a subscription listens for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerScope {
    /// Conversation the listener feeds.
    pub conversation: Conversation,
    /// Bind generation the listener belongs to.
    pub epoch: Epoch,
}

/// Error type for subscription operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscribeError {
    /// A subscription is still active and must be released first.
    #[error("subscription {active:?} still active")]
    AlreadySubscribed {
        /// The active subscription.
        active: SubscriptionId,
    },
}

/// Registry holding at most one active subscription.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    /// Last id handed out.
    last_id: u64,
    /// The active subscription, if any.
    active: Option<(SubscriptionId, ListenerScope)>,
}

impl SubscriptionSet {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a subscription.
    ///
    /// Fails if another subscription is still active.
    pub fn subscribe(&mut self, scope: ListenerScope) -> Result<SubscriptionId, SubscribeError> {
        if let Some((active, _)) = &self.active {
            return Err(SubscribeError::AlreadySubscribed { active: *active });
        }
        self.last_id += 1;
        let id = SubscriptionId(self.last_id);
        self.active = Some((id, scope));
        Ok(id)
    }

    /// Release a subscription.
    ///
    /// Returns false if `id` was not the active subscription.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        match &self.active {
            Some((active, _)) if *active == id => {
                self.active = None;
                true
            }
            _ => false,
        }
    }

    /// Release whatever is active.
    pub fn clear(&mut self) -> Option<SubscriptionId> {
        self.active.take().map(|(id, _)| id)
    }

    /// Whether `id` is the active subscription.
    pub fn is_active(&self, id: SubscriptionId) -> bool {
        matches!(&self.active, Some((active, _)) if *active == id)
    }

    /// The active subscription and its scope.
    pub fn active(&self) -> Option<(SubscriptionId, &ListenerScope)> {
        self.active.as_ref().map(|(id, scope)| (*id, scope))
    }
}
