//! Persistence API abstraction for duet.
//!
//! The message store is the request/response side of the system: it loads
//! the durable history of a conversation and stores sent messages. It is
//! separate from the live transport and may fail independently of it.

mod http;
mod mock;

pub use http::HttpMessageStore;
pub use mock::MockMessageStore;

use async_trait::async_trait;
use chat_types::{HistoryEntry, HistoryRequest, WriteRequest};
use thiserror::Error;

/// Persistence API errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The request never got a response.
    #[error("request failed: {0}")]
    Request(String),

    /// The server answered with a non-success status.
    #[error("server returned status {0}")]
    Status(u16),

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    Decode(String),
}

/// Persistence API consumed by the chat engine.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Fetch the stored history of a conversation, oldest first.
    async fn fetch_history(&self, request: &HistoryRequest)
        -> Result<Vec<HistoryEntry>, StoreError>;

    /// Store a sent message.
    ///
    /// The response carries no identifier; success only confirms storage.
    async fn write_message(&self, request: &WriteRequest) -> Result<(), StoreError>;
}
