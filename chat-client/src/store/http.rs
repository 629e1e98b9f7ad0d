//! HTTP message store.
//!
//! Both operations are JSON POSTs against the chat server:
//! history to `history_url`, writes to `write_url`.

use super::{MessageStore, StoreError};
use async_trait::async_trait;
use chat_types::{HistoryEntry, HistoryRequest, WriteRequest};
use tracing::debug;

use crate::config::ClientConfig;

/// Message store backed by the chat server's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpMessageStore {
    http: reqwest::Client,
    history_url: String,
    write_url: String,
}

impl HttpMessageStore {
    /// Create a store for the endpoints named in `config`.
    pub fn new(config: &ClientConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Create a store reusing an existing HTTP client.
    pub fn with_client(http: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            http,
            history_url: config.history_url(),
            write_url: config.write_url(),
        }
    }

    /// Endpoint used for history fetches.
    pub fn history_url(&self) -> &str {
        &self.history_url
    }

    /// Endpoint used for message writes.
    pub fn write_url(&self) -> &str {
        &self.write_url
    }

    async fn post<B: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<reqwest::Response, StoreError> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status(status.as_u16()));
        }
        Ok(response)
    }
}

#[async_trait]
impl MessageStore for HttpMessageStore {
    async fn fetch_history(
        &self,
        request: &HistoryRequest,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        debug!("Fetching history {} -> {}", request.from, request.to);
        self.post(&self.history_url, request)
            .await?
            .json::<Vec<HistoryEntry>>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn write_message(&self, request: &WriteRequest) -> Result<(), StoreError> {
        debug!("Storing message {} -> {}", request.from, request.to);
        self.post(&self.write_url, request).await?;
        Ok(())
    }
}
