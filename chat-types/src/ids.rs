//! Identity and ordering types for duet.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-assigned identifier of a user.
///
/// Opaque to the client; serialized as a plain string.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Create a UserId from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether the id is empty (an unusable identity).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

/// A logged-in user or a contact.
///
/// Field names on the wire match the stored session record
/// (`_id`, `username`, `avatarImage`, `isAvatarImageSet`).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Server-assigned user id.
    #[serde(rename = "_id")]
    pub id: UserId,
    /// Name shown to the other party.
    #[serde(rename = "username")]
    pub display_name: String,
    /// Base64 avatar image payload (may be empty).
    #[serde(rename = "avatarImage", default)]
    pub avatar: String,
    /// Whether the user has picked an avatar.
    #[serde(rename = "isAvatarImageSet", default)]
    pub avatar_set: bool,
}

impl Identity {
    /// Create an identity without an avatar.
    pub fn new(id: impl Into<String>, display_name: &str) -> Self {
        Self {
            id: UserId::new(id),
            display_name: display_name.to_string(),
            avatar: String::new(),
            avatar_set: false,
        }
    }

    /// Attach an avatar payload and mark it as set.
    pub fn with_avatar(mut self, avatar: &str) -> Self {
        self.avatar = avatar.to_string();
        self.avatar_set = true;
        self
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("avatar", &format!("[{} bytes]", self.avatar.len()))
            .field("avatar_set", &self.avatar_set)
            .finish()
    }
}

/// Addressing key of a two-party conversation.
///
/// Has no persisted record of its own; it names who fetches, subscribes
/// and sends.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Conversation {
    /// The logged-in side.
    pub local: UserId,
    /// The remote side.
    pub peer: UserId,
}

impl Conversation {
    /// Create a conversation between two users.
    pub fn new(local: UserId, peer: UserId) -> Self {
        Self { local, peer }
    }

    /// Conversation between two identities.
    pub fn between(local: &Identity, peer: &Identity) -> Self {
        Self::new(local.id.clone(), peer.id.clone())
    }
}

impl fmt::Display for Conversation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<->{}", self.local, self.peer)
    }
}

/// Position of a message inside its timeline.
///
/// Assigned by the timeline at insertion, monotonically increasing and never
/// reused within one bind, so it doubles as the message's stable identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Sequence(u64);

impl Sequence {
    /// Create a Sequence with the given value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the numeric value.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// The sequence before any message.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Increment by one.
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sequence({})", self.0)
    }
}

/// Generation counter for conversation binds.
///
/// Every bind gets a fresh epoch; async results tagged with an older epoch
/// belong to a conversation that is no longer active.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Epoch(u64);

impl Epoch {
    /// Create an Epoch with the given value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the numeric value.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// The epoch before any bind.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Increment by one.
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Epoch({})", self.0)
    }
}

/// Which side of the conversation wrote a message.
///
/// Decides the rendering side, not the delivery path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Written by the logged-in user.
    #[serde(rename = "self")]
    Local,
    /// Written by the remote peer.
    Peer,
}

impl Origin {
    /// Map the persistence API's `fromSelf` flag.
    pub fn from_self(from_self: bool) -> Self {
        if from_self {
            Self::Local
        } else {
            Self::Peer
        }
    }

    /// Whether the message was written locally.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local)
    }
}

/// Durable-write outcome of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// Loaded from history or received live; nothing to confirm.
    Settled,
    /// Sent optimistically, persistence write in flight.
    Pending,
    /// Persistence write confirmed.
    Stored,
    /// Persistence write failed; durable history lacks this message.
    WriteFailed {
        /// Error message describing the failure.
        error: String,
    },
}

impl DeliveryStatus {
    /// Whether the message still waits for a write outcome.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}
