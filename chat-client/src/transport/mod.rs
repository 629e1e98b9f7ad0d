//! Live transport abstraction for duet.
//!
//! This module provides a pluggable transport layer for the long-lived
//! bidirectional connection (WebSocket, mock for testing).
//!
//! # Design
//!
//! The transport trait is async and connection-oriented:
//! - `connect()` establishes the connection (`connect` / `connect_error`)
//! - `emit()` sends one live event
//! - `recv()` waits for the next inbound signal
//! - `close()` terminates the connection
//!
//! The transport knows nothing about identities or conversations; the
//! connection manager drives it.

mod mock;
mod ws;

pub use mock::MockTransport;
pub use ws::WsTransport;

use async_trait::async_trait;
use chat_types::{LiveEvent, WireError};
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection was not established in time.
    #[error("connection timed out")]
    Timeout,

    /// Not connected.
    #[error("not connected")]
    NotConnected,

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Frame could not be encoded or decoded.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),
}

/// Signals delivered by [`LiveTransport::recv`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A live protocol event.
    Event(LiveEvent),
    /// The connection was lost without being closed locally.
    Dropped(String),
}

/// Transport trait for the live connection.
///
/// Implementations handle the underlying connection mechanism
/// (WebSocket, mock, etc).
#[async_trait]
pub trait LiveTransport: Send + Sync {
    /// Connect to the live endpoint at `url`.
    async fn connect(&self, url: &str) -> Result<(), TransportError>;

    /// Send one event over the connection.
    async fn emit(&self, event: &LiveEvent) -> Result<(), TransportError>;

    /// Receive the next inbound signal.
    ///
    /// Waits until a signal is available. Returns
    /// [`TransportError::NotConnected`] once the connection is closed.
    async fn recv(&self) -> Result<Inbound, TransportError>;

    /// Check if currently connected.
    fn is_connected(&self) -> bool;

    /// Close the connection.
    async fn close(&self) -> Result<(), TransportError>;
}
