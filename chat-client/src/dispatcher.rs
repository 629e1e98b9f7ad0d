//! OutboundDispatcher - sending a message.
//!
//! A send goes out on two independent paths:
//!
//! 1. `send-msg` over the live connection, for immediate delivery to the peer
//! 2. a write to the message store, for durability
//!
//! The message is appended to the local timeline as soon as it is emitted,
//! before the write resolves. The write runs as its own task and reports back
//! through the engine's completion channel; the outcome is recorded on the
//! timeline entry and is never rolled back or retried.

use std::sync::Arc;

use chat_types::{Epoch, Identity, LiveEvent, SendMsg, Sequence, WriteRequest};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::connection::ConnectionManager;
use crate::engine::Completion;
use crate::session::ConversationSession;
use crate::store::MessageStore;
use crate::transport::LiveTransport;

/// Why a send did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The text was empty.
    EmptyText,
    /// No identity is logged in.
    NoIdentity,
    /// No conversation is bound.
    NoConversation,
    /// The live connection is not open.
    NotConnected,
}

/// A durable write in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    /// Epoch of the bind the message was sent in.
    pub epoch: Epoch,
    /// Timeline entry of the message.
    pub sequence: Sequence,
    /// Write request body.
    pub request: WriteRequest,
}

/// Result of a send.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Emitted, appended and queued for storage.
    Dispatched(PendingWrite),
    /// Nothing was sent.
    Skipped(SkipReason),
}

impl SendOutcome {
    /// Whether the message went out.
    pub fn is_dispatched(&self) -> bool {
        matches!(self, Self::Dispatched(_))
    }
}

/// Sends messages on the live and durable paths.
pub struct OutboundDispatcher<S: MessageStore> {
    store: Arc<S>,
    completions: mpsc::UnboundedSender<Completion>,
}

impl<S: MessageStore + 'static> OutboundDispatcher<S> {
    /// Create a dispatcher reporting write outcomes on `completions`.
    pub fn new(store: Arc<S>, completions: mpsc::UnboundedSender<Completion>) -> Self {
        Self { store, completions }
    }

    /// Send `text` from `local` in the bound conversation.
    ///
    /// A send with empty text, no identity, no bound conversation or no open
    /// connection is a silent no-op.
    pub async fn send<T: LiveTransport>(
        &self,
        connection: &ConnectionManager<T>,
        session: &mut ConversationSession,
        local: Option<&Identity>,
        text: &str,
    ) -> SendOutcome {
        if text.is_empty() {
            return SendOutcome::Skipped(SkipReason::EmptyText);
        }
        let Some(local) = local else {
            return SendOutcome::Skipped(SkipReason::NoIdentity);
        };
        let Some(conversation) = session.conversation().cloned() else {
            return SendOutcome::Skipped(SkipReason::NoConversation);
        };
        if conversation.local != local.id {
            return SendOutcome::Skipped(SkipReason::NoConversation);
        }
        if !connection.is_open() {
            return SendOutcome::Skipped(SkipReason::NotConnected);
        }

        let event = LiveEvent::SendMsg(SendMsg {
            from: conversation.local.clone(),
            to: conversation.peer.clone(),
            msg: text.to_string(),
        });
        if let Err(e) = connection.emit(&event).await {
            warn!("Error sending message to {}: {}", conversation.peer, e);
        }

        let Some((epoch, sequence)) = session.append_sent(text) else {
            return SendOutcome::Skipped(SkipReason::NoConversation);
        };
        let pending = PendingWrite {
            epoch,
            sequence,
            request: WriteRequest::new(&conversation, text),
        };
        debug!("Sent {} to {}", sequence, conversation.peer);

        self.spawn_write(pending.clone());
        SendOutcome::Dispatched(pending)
    }

    fn spawn_write(&self, pending: PendingWrite) {
        let store = Arc::clone(&self.store);
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let result = store.write_message(&pending.request).await;
            // Receiver is gone once the engine shuts down.
            let _ = completions.send(Completion::Write { pending, result });
        });
    }
}
