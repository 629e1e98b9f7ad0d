//! Mock transport for testing.
//!
//! Allows pushing inbound signals and capturing emitted events for
//! verification.

use super::{Inbound, LiveTransport, TransportError};
use async_trait::async_trait;
use chat_types::LiveEvent;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Mock transport for testing.
///
/// Clones share state, so a test can keep one clone while the connection
/// manager owns another.
#[derive(Debug, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
    wakeup: Arc<Notify>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    connected: bool,
    connected_url: Option<String>,
    connect_calls: usize,
    close_calls: usize,
    emitted: Vec<LiveEvent>,
    inbound: VecDeque<Inbound>,
    fail_next_connect: Option<String>,
    fail_next_emit: Option<String>,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an inbound signal for the next `recv()` call.
    pub fn push_inbound(&self, signal: Inbound) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.inbound.push_back(signal);
        }
        self.wakeup.notify_one();
    }

    /// Queue an inbound `msg-receive` event.
    pub fn push_message(&self, text: &str) {
        self.push_inbound(Inbound::Event(LiveEvent::MsgReceive(text.to_string())));
    }

    /// Simulate the server dropping the connection.
    pub fn drop_connection(&self, reason: &str) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.connected = false;
            inner.inbound.push_back(Inbound::Dropped(reason.to_string()));
        }
        self.wakeup.notify_one();
    }

    /// Get all events that were emitted.
    pub fn emitted(&self) -> Vec<LiveEvent> {
        let inner = self.inner.lock().unwrap();
        inner.emitted.clone()
    }

    /// Get the last event that was emitted.
    pub fn last_emitted(&self) -> Option<LiveEvent> {
        let inner = self.inner.lock().unwrap();
        inner.emitted.last().cloned()
    }

    /// Count emitted `add-user` announcements.
    pub fn presence_announcements(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .emitted
            .iter()
            .filter(|e| matches!(e, LiveEvent::AddUser(_)))
            .count()
    }

    /// Get the URL that was connected to.
    pub fn connected_url(&self) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner.connected_url.clone()
    }

    /// Number of `connect()` calls, successful or not.
    pub fn connect_calls(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.connect_calls
    }

    /// Number of `close()` calls.
    pub fn close_calls(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.close_calls
    }

    /// Cause the next connect() to fail with the given error.
    pub fn fail_next_connect(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_connect = Some(error.to_string());
    }

    /// Cause the next emit() to fail with the given error.
    pub fn fail_next_emit(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_emit = Some(error.to_string());
    }

    /// Clear all state (events, queue, connection).
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        *inner = MockTransportInner::default();
    }
}

impl Clone for MockTransport {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            wakeup: Arc::clone(&self.wakeup),
        }
    }
}

#[async_trait]
impl LiveTransport for MockTransport {
    async fn connect(&self, url: &str) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.connect_calls += 1;

        // Check for forced failure
        if let Some(error) = inner.fail_next_connect.take() {
            return Err(TransportError::ConnectionFailed(error));
        }

        inner.connected = true;
        inner.connected_url = Some(url.to_string());
        Ok(())
    }

    async fn emit(&self, event: &LiveEvent) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();

        if !inner.connected {
            return Err(TransportError::NotConnected);
        }

        // Check for forced failure
        if let Some(error) = inner.fail_next_emit.take() {
            return Err(TransportError::SendFailed(error));
        }

        inner.emitted.push(event.clone());
        Ok(())
    }

    async fn recv(&self) -> Result<Inbound, TransportError> {
        loop {
            let notified = self.wakeup.notified();
            {
                let mut inner = self.inner.lock().unwrap();
                if let Some(signal) = inner.inbound.pop_front() {
                    return Ok(signal);
                }
                if !inner.connected {
                    return Err(TransportError::NotConnected);
                }
            }
            notified.await;
        }
    }

    fn is_connected(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.connected
    }

    async fn close(&self) -> Result<(), TransportError> {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.close_calls += 1;
            inner.connected = false;
            inner.inbound.clear();
        }
        self.wakeup.notify_one();
        Ok(())
    }
}
