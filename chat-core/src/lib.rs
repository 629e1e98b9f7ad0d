//! # chat-core
//!
//! Pure logic for duet chat sync (no I/O, instant tests).
//!
//! This crate implements the state machines and bookkeeping for the chat
//! engine without any network or disk I/O.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about connection and conversation transitions
//!
//! The actual I/O (live transport, persistence API) is performed by
//! `chat-client`, which interprets the actions produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod epoch;
pub mod state;
pub mod subscription;
pub mod timeline;

pub use epoch::EpochTracker;
pub use state::{Action, ConnectionEvent, ConnectionState, Event};
pub use subscription::{ListenerScope, SubscribeError, SubscriptionId, SubscriptionSet};
pub use timeline::{SeedOutcome, Timeline, TimelineEntry};
