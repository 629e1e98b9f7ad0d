//! Request and response bodies of the persistence API.

use serde::{Deserialize, Serialize};

use crate::{Conversation, Origin, UserId};

/// Body of a history fetch: both participants of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRequest {
    /// The requesting (local) user.
    pub from: UserId,
    /// The peer.
    pub to: UserId,
}

impl From<&Conversation> for HistoryRequest {
    fn from(conversation: &Conversation) -> Self {
        Self {
            from: conversation.local.clone(),
            to: conversation.peer.clone(),
        }
    }
}

/// One stored message, as returned by a history fetch (oldest first).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Message text.
    pub message: String,
    /// Whether the requesting user wrote it.
    pub from_self: bool,
}

impl HistoryEntry {
    /// Create a history entry.
    pub fn new(message: &str, from_self: bool) -> Self {
        Self {
            message: message.to_string(),
            from_self,
        }
    }

    /// Rendering side of this entry.
    pub fn origin(&self) -> Origin {
        Origin::from_self(self.from_self)
    }
}

/// Body of a durability write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRequest {
    /// Sender id.
    pub from: UserId,
    /// Recipient id.
    pub to: UserId,
    /// Message text.
    pub message: String,
}

impl WriteRequest {
    /// Write request for a message sent in `conversation`.
    pub fn new(conversation: &Conversation, message: &str) -> Self {
        Self {
            from: conversation.local.clone(),
            to: conversation.peer.clone(),
            message: message.to_string(),
        }
    }
}
