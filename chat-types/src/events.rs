//! Events carried over the live connection.
//!
//! Every frame is a JSON text message of the form
//! `{"event": "<name>", "data": <payload>}`.

use serde::{Deserialize, Serialize};

use crate::{UserId, WireError};

/// Names of the events in the live protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    /// Presence announcement (outbound).
    AddUser,
    /// Request for immediate peer delivery (outbound).
    SendMsg,
    /// Message routed to the local identity (inbound).
    MsgReceive,
}

impl EventName {
    /// The name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AddUser => "add-user",
            Self::SendMsg => "send-msg",
            Self::MsgReceive => "msg-receive",
        }
    }

    /// Look up a wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "add-user" => Some(Self::AddUser),
            "send-msg" => Some(Self::SendMsg),
            "msg-receive" => Some(Self::MsgReceive),
            _ => None,
        }
    }
}

/// All live protocol events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum LiveEvent {
    /// Tell the server which identity this connection belongs to.
    AddUser(UserId),
    /// Deliver a message to a peer right away.
    SendMsg(SendMsg),
    /// A message addressed to the announced identity.
    MsgReceive(String),
}

impl LiveEvent {
    /// The event's wire name.
    pub fn name(&self) -> EventName {
        match self {
            Self::AddUser(_) => EventName::AddUser,
            Self::SendMsg(_) => EventName::SendMsg,
            Self::MsgReceive(_) => EventName::MsgReceive,
        }
    }

    /// Serialize to a JSON text frame.
    pub fn to_json(&self) -> Result<String, WireError> {
        serde_json::to_string(self).map_err(WireError::Serialization)
    }

    /// Deserialize from a JSON text frame.
    ///
    /// Frames naming an event outside the protocol yield
    /// [`WireError::UnknownEvent`] so callers can skip them.
    pub fn from_json(text: &str) -> Result<Self, WireError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(WireError::Deserialization)?;
        let name = value
            .get("event")
            .and_then(|v| v.as_str())
            .ok_or_else(|| WireError::InvalidData("frame has no event name".into()))?;
        if EventName::parse(name).is_none() {
            return Err(WireError::UnknownEvent(name.to_string()));
        }
        serde_json::from_value(value).map_err(WireError::Deserialization)
    }
}

/// Payload of a `send-msg` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMsg {
    /// Sender id.
    pub from: UserId,
    /// Recipient id.
    pub to: UserId,
    /// Message text.
    pub msg: String,
}
