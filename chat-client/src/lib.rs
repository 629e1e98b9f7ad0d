//! # duet-chat-client
//!
//! Client library for the duet two-party chat engine.
//!
//! Keeps the message timeline of one open conversation consistent across the
//! stored history, live messages from the peer and messages sent locally.
//!
//! ## Features
//!
//! - **Single live connection**: one WebSocket per login, presence announced
//!   on every (re)connect, reconnection with backoff
//! - **Rebind isolation**: opening a conversation tears the previous one down
//!   before subscribing; late history for a previous conversation is dropped
//! - **Optimistic send**: messages appear immediately and carry their durable
//!   write status
//! - **Transport Abstraction**: pluggable live transport and message store
//!   (WebSocket/HTTP, mock)
//! - **Pure State Machine**: uses chat-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use duet_chat_client::{ChatEngine, ClientConfig, HttpMessageStore, WsTransport};
//!
//! let config = ClientConfig::new("http://localhost:5000");
//! let mut engine = ChatEngine::new(WsTransport::new(), HttpMessageStore::new(&config), &config);
//!
//! engine.login(alice).await;
//! engine.select_peer(bob).await?;
//! engine.send("hi").await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod session;
pub mod store;
pub mod transport;

pub use config::{
    ClientConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_HISTORY_ROUTE, DEFAULT_WRITE_ROUTE,
};
pub use connection::ConnectionManager;
pub use dispatcher::{OutboundDispatcher, PendingWrite, SendOutcome, SkipReason};
pub use engine::{ChatEngine, Command, Completion, EngineUpdate};
pub use error::ClientError;
pub use session::{ConversationSession, HistoryOutcome, HistoryTicket};
pub use store::{HttpMessageStore, MessageStore, MockMessageStore, StoreError};
pub use transport::{Inbound, LiveTransport, MockTransport, TransportError, WsTransport};
