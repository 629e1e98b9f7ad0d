//! # chat-types
//!
//! Wire format types for the duet two-party chat engine.
//!
//! This crate provides the foundational types used across all duet crates:
//! - [`UserId`], [`Identity`], [`Conversation`] - Who is talking to whom
//! - [`Sequence`], [`Epoch`] - Ordering and bind-generation types
//! - [`LiveEvent`] - Events carried over the live connection
//! - [`HistoryEntry`], [`HistoryRequest`], [`WriteRequest`] - Persistence API bodies
//! - [`WireError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod api;
mod error;
mod events;
mod ids;

pub use api::{HistoryEntry, HistoryRequest, WriteRequest};
pub use error::WireError;
pub use events::{EventName, LiveEvent, SendMsg};
pub use ids::{Conversation, DeliveryStatus, Epoch, Identity, Origin, Sequence, UserId};
