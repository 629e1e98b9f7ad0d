//! Mock message store for testing.
//!
//! Histories are scripted per peer. A fetch or write can be held open until
//! the test releases it, which is how interleavings such as a conversation
//! switch during a pending fetch are reproduced.

use super::{MessageStore, StoreError};
use async_trait::async_trait;
use chat_types::{HistoryEntry, HistoryRequest, UserId, WriteRequest};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

/// Mock message store for testing.
#[derive(Debug, Default)]
pub struct MockMessageStore {
    inner: Arc<Mutex<MockStoreInner>>,
}

#[derive(Debug, Default)]
struct MockStoreInner {
    histories: HashMap<UserId, Vec<HistoryEntry>>,
    fetches: Vec<HistoryRequest>,
    writes: Vec<WriteRequest>,
    held_fetches: HashMap<UserId, oneshot::Receiver<()>>,
    held_write: Option<oneshot::Receiver<()>>,
    fail_next_fetch: Option<StoreError>,
    fail_next_write: Option<StoreError>,
}

impl MockMessageStore {
    /// Create an empty store; every history is empty until set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the history returned for conversations with `peer`.
    pub fn set_history(&self, peer: &UserId, history: Vec<HistoryEntry>) {
        let mut inner = self.inner.lock().unwrap();
        inner.histories.insert(peer.clone(), history);
    }

    /// Hold the next fetch for `peer` until the returned sender fires
    /// (or is dropped).
    pub fn hold_history(&self, peer: &UserId) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        let mut inner = self.inner.lock().unwrap();
        inner.held_fetches.insert(peer.clone(), rx);
        tx
    }

    /// Hold the next write until the returned sender fires (or is dropped).
    pub fn hold_next_write(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        let mut inner = self.inner.lock().unwrap();
        inner.held_write = Some(rx);
        tx
    }

    /// Cause the next fetch to fail with the given error.
    pub fn fail_next_fetch(&self, error: StoreError) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_fetch = Some(error);
    }

    /// Cause the next write to fail with the given error.
    pub fn fail_next_write(&self, error: StoreError) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_write = Some(error);
    }

    /// All fetch requests received.
    pub fn fetches(&self) -> Vec<HistoryRequest> {
        let inner = self.inner.lock().unwrap();
        inner.fetches.clone()
    }

    /// All successful writes, in completion order.
    pub fn writes(&self) -> Vec<WriteRequest> {
        let inner = self.inner.lock().unwrap();
        inner.writes.clone()
    }
}

impl Clone for MockMessageStore {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl MessageStore for MockMessageStore {
    async fn fetch_history(
        &self,
        request: &HistoryRequest,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        let gate = {
            let mut inner = self.inner.lock().unwrap();
            inner.fetches.push(request.clone());
            inner.held_fetches.remove(&request.to)
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        let mut inner = self.inner.lock().unwrap();
        if let Some(error) = inner.fail_next_fetch.take() {
            return Err(error);
        }
        Ok(inner
            .histories
            .get(&request.to)
            .cloned()
            .unwrap_or_default())
    }

    async fn write_message(&self, request: &WriteRequest) -> Result<(), StoreError> {
        let gate = {
            let mut inner = self.inner.lock().unwrap();
            inner.held_write.take()
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        let mut inner = self.inner.lock().unwrap();
        if let Some(error) = inner.fail_next_write.take() {
            return Err(error);
        }
        inner.writes.push(request.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn request(to: &str) -> HistoryRequest {
        HistoryRequest {
            from: UserId::new("1"),
            to: UserId::new(to),
        }
    }

    #[tokio::test]
    async fn unknown_peer_has_empty_history() {
        let store = MockMessageStore::new();
        assert!(store.fetch_history(&request("9")).await.unwrap().is_empty());
        assert_eq!(store.fetches().len(), 1);
    }

    #[tokio::test]
    async fn scripted_history_is_returned() {
        let store = MockMessageStore::new();
        store.set_history(&UserId::new("2"), vec![HistoryEntry::new("hi", false)]);

        let history = store.fetch_history(&request("2")).await.unwrap();
        assert_eq!(history, vec![HistoryEntry::new("hi", false)]);
    }

    #[tokio::test]
    async fn held_fetch_waits_for_release() {
        let store = MockMessageStore::new();
        let release = store.hold_history(&UserId::new("2"));

        let fetching = store.clone();
        let pending = tokio::spawn(async move { fetching.fetch_history(&request("2")).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());

        release.send(()).unwrap();
        assert!(pending.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn forced_failures_apply_once() {
        let store = MockMessageStore::new();
        store.fail_next_fetch(StoreError::Status(500));
        store.fail_next_write(StoreError::Request("reset".into()));

        assert_eq!(
            store.fetch_history(&request("2")).await,
            Err(StoreError::Status(500))
        );
        assert!(store.fetch_history(&request("2")).await.is_ok());

        let write = WriteRequest {
            from: UserId::new("1"),
            to: UserId::new("2"),
            message: "yo".into(),
        };
        assert!(store.write_message(&write).await.is_err());
        store.write_message(&write).await.unwrap();
        assert_eq!(store.writes(), vec![write]);
    }
}
