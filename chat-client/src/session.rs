//! ConversationSession - binding of the timeline to one conversation.
//!
//! A bind tears down whatever was bound before, starts a new epoch, resets
//! the timeline and installs the live subscription. The history fetch runs
//! elsewhere; its result is handed back through [`apply_history`] with the
//! [`HistoryTicket`] the bind issued, and is discarded if the ticket's epoch
//! is no longer current.
//!
//! [`apply_history`]: ConversationSession::apply_history

use chat_core::{EpochTracker, ListenerScope, SeedOutcome, SubscriptionId, Timeline};
use chat_types::{
    Conversation, DeliveryStatus, Epoch, HistoryEntry, HistoryRequest, Identity, Sequence,
};
use tracing::{debug, info, warn};

use crate::connection::ConnectionManager;
use crate::error::ClientError;
use crate::store::StoreError;
use crate::transport::LiveTransport;

/// Issued by a bind; identifies the history fetch it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTicket {
    /// Conversation being loaded.
    pub conversation: Conversation,
    /// Epoch of the bind that issued the ticket.
    pub epoch: Epoch,
}

impl HistoryTicket {
    /// Request body for the fetch.
    pub fn request(&self) -> HistoryRequest {
        HistoryRequest::from(&self.conversation)
    }
}

/// What happened to a history result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryOutcome {
    /// Installed as the timeline baseline.
    Applied(SeedOutcome),
    /// The fetch failed; the baseline stays empty.
    Failed(StoreError),
    /// A newer bind or an unbind happened first; the result was dropped.
    Stale,
}

/// Teardown state of the active bind.
#[derive(Debug)]
struct Binding {
    conversation: Conversation,
    epoch: Epoch,
    subscription: SubscriptionId,
}

/// The active conversation and its timeline.
#[derive(Debug, Default)]
pub struct ConversationSession {
    epochs: EpochTracker,
    timeline: Timeline,
    active: Option<Binding>,
}

impl ConversationSession {
    /// Create a session with nothing bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the timeline to the conversation between `local` and `peer`.
    ///
    /// Any previous bind is torn down first, so at most one subscription
    /// exists afterwards. The returned ticket must accompany the history
    /// result.
    pub fn bind<T: LiveTransport>(
        &mut self,
        connection: &mut ConnectionManager<T>,
        local: &Identity,
        peer: &Identity,
    ) -> Result<HistoryTicket, ClientError> {
        self.unbind(connection);

        let conversation = Conversation::between(local, peer);
        let epoch = self.epochs.advance();
        self.timeline.reset(epoch);

        let subscription = connection.subscribe(ListenerScope {
            conversation: conversation.clone(),
            epoch,
        })?;
        info!("Opened conversation {} ({:?})", conversation, epoch);

        self.active = Some(Binding {
            conversation: conversation.clone(),
            epoch,
            subscription,
        });
        Ok(HistoryTicket {
            conversation,
            epoch,
        })
    }

    /// Tear down the active bind: release its subscription, clear the
    /// timeline and make its pending results stale.
    ///
    /// Returns false if nothing was bound.
    pub fn unbind<T: LiveTransport>(&mut self, connection: &mut ConnectionManager<T>) -> bool {
        let Some(binding) = self.active.take() else {
            return false;
        };
        connection.unsubscribe(binding.subscription);
        self.epochs.retire();
        self.timeline.reset(self.epochs.current());
        debug!("Closed conversation {}", binding.conversation);
        true
    }

    /// Apply the result of the fetch issued with `ticket`.
    pub fn apply_history(
        &mut self,
        ticket: &HistoryTicket,
        result: Result<Vec<HistoryEntry>, StoreError>,
    ) -> HistoryOutcome {
        if !self.is_current(ticket.epoch) {
            debug!(
                "Discarding history for {} from {:?}",
                ticket.conversation, ticket.epoch
            );
            return HistoryOutcome::Stale;
        }
        match result {
            Ok(history) => {
                let outcome = self.timeline.seed(history);
                debug!(
                    "Loaded {} messages for {} ({} live kept)",
                    outcome.seeded, ticket.conversation, outcome.kept_arrivals
                );
                HistoryOutcome::Applied(outcome)
            }
            Err(e) => {
                warn!("Error fetching messages for {}: {}", ticket.conversation, e);
                HistoryOutcome::Failed(e)
            }
        }
    }

    /// Deliver a live message to the timeline.
    ///
    /// Only the active subscription delivers; a message routed to a released
    /// subscription is dropped and `None` is returned.
    pub fn deliver(&mut self, subscription: SubscriptionId, text: &str) -> Option<Sequence> {
        let binding = self.active.as_ref()?;
        if binding.subscription != subscription {
            debug!("Dropping message for released {:?}", subscription);
            return None;
        }
        Some(self.timeline.append_received(text))
    }

    /// Append a locally sent message. Returns `None` if nothing is bound.
    pub fn append_sent(&mut self, text: &str) -> Option<(Epoch, Sequence)> {
        let epoch = self.active.as_ref()?.epoch;
        Some((epoch, self.timeline.append_sent(text)))
    }

    /// Record the durable-write outcome of a sent message.
    ///
    /// Returns false if the message belongs to a timeline that is gone.
    pub fn record_write(
        &mut self,
        epoch: Epoch,
        sequence: Sequence,
        result: &Result<(), StoreError>,
    ) -> bool {
        if !self.is_current(epoch) {
            return false;
        }
        let status = match result {
            Ok(()) => DeliveryStatus::Stored,
            Err(e) => DeliveryStatus::WriteFailed {
                error: e.to_string(),
            },
        };
        self.timeline.set_delivery(sequence, status)
    }

    /// The active conversation.
    pub fn conversation(&self) -> Option<&Conversation> {
        self.active.as_ref().map(|b| &b.conversation)
    }

    /// Subscription of the active bind.
    pub fn subscription(&self) -> Option<SubscriptionId> {
        self.active.as_ref().map(|b| b.subscription)
    }

    /// Epoch of the active bind.
    pub fn epoch(&self) -> Option<Epoch> {
        self.active.as_ref().map(|b| b.epoch)
    }

    /// The timeline.
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    fn is_current(&self, epoch: Epoch) -> bool {
        self.active.is_some() && self.epochs.is_current(epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::transport::MockTransport;
    use chat_types::Origin;

    fn alice() -> Identity {
        Identity::new("1", "alice")
    }

    fn bob() -> Identity {
        Identity::new("2", "bob")
    }

    fn carol() -> Identity {
        Identity::new("3", "carol")
    }

    async fn open_connection() -> ConnectionManager<MockTransport> {
        let mut connection =
            ConnectionManager::new(MockTransport::new(), &ClientConfig::new("http://test"));
        connection.open(&alice()).await;
        connection
    }

    // ===========================================
    // Bind Tests
    // ===========================================

    #[tokio::test]
    async fn bind_subscribes_and_issues_ticket() {
        let mut connection = open_connection().await;
        let mut session = ConversationSession::new();

        let ticket = session.bind(&mut connection, &alice(), &bob()).unwrap();

        assert_eq!(ticket.conversation, Conversation::between(&alice(), &bob()));
        assert_eq!(ticket.request().from.as_str(), "1");
        assert_eq!(ticket.request().to.as_str(), "2");
        assert_eq!(connection.route_message(), session.subscription());
        assert!(session.timeline().is_empty());
    }

    #[tokio::test]
    async fn rebind_replaces_subscription() {
        let mut connection = open_connection().await;
        let mut session = ConversationSession::new();

        session.bind(&mut connection, &alice(), &bob()).unwrap();
        let first = session.subscription().unwrap();
        session.bind(&mut connection, &alice(), &carol()).unwrap();
        let second = session.subscription().unwrap();

        assert_ne!(first, second);
        assert!(!connection.is_subscribed(first));
        assert_eq!(connection.route_message(), Some(second));
    }

    #[tokio::test]
    async fn rebind_clears_timeline() {
        let mut connection = open_connection().await;
        let mut session = ConversationSession::new();

        let ticket = session.bind(&mut connection, &alice(), &bob()).unwrap();
        session.apply_history(&ticket, Ok(vec![HistoryEntry::new("old", true)]));
        assert_eq!(session.timeline().len(), 1);

        session.bind(&mut connection, &alice(), &carol()).unwrap();
        assert!(session.timeline().is_empty());
    }

    // ===========================================
    // History Tests
    // ===========================================

    #[tokio::test]
    async fn history_precedes_arrivals() {
        let mut connection = open_connection().await;
        let mut session = ConversationSession::new();
        let ticket = session.bind(&mut connection, &alice(), &bob()).unwrap();
        let subscription = session.subscription().unwrap();

        session.deliver(subscription, "live");
        let outcome = session.apply_history(
            &ticket,
            Ok(vec![
                HistoryEntry::new("first", true),
                HistoryEntry::new("second", false),
            ]),
        );

        assert_eq!(
            outcome,
            HistoryOutcome::Applied(SeedOutcome {
                seeded: 2,
                kept_arrivals: 1
            })
        );
        assert_eq!(
            session.timeline().texts(),
            vec![
                ("first", Origin::Local),
                ("second", Origin::Peer),
                ("live", Origin::Peer)
            ]
        );
    }

    #[tokio::test]
    async fn stale_history_is_discarded() {
        let mut connection = open_connection().await;
        let mut session = ConversationSession::new();

        let for_bob = session.bind(&mut connection, &alice(), &bob()).unwrap();
        let for_carol = session.bind(&mut connection, &alice(), &carol()).unwrap();

        let late = session.apply_history(&for_bob, Ok(vec![HistoryEntry::new("bob", false)]));
        assert_eq!(late, HistoryOutcome::Stale);
        assert!(session.timeline().is_empty());

        session.apply_history(&for_carol, Ok(vec![HistoryEntry::new("carol", false)]));
        assert_eq!(session.timeline().texts(), vec![("carol", Origin::Peer)]);
    }

    #[tokio::test]
    async fn history_after_unbind_is_discarded() {
        let mut connection = open_connection().await;
        let mut session = ConversationSession::new();

        let ticket = session.bind(&mut connection, &alice(), &bob()).unwrap();
        assert!(session.unbind(&mut connection));

        let outcome = session.apply_history(&ticket, Ok(vec![HistoryEntry::new("x", false)]));
        assert_eq!(outcome, HistoryOutcome::Stale);
        assert!(session.timeline().is_empty());
        assert!(connection.route_message().is_none());
    }

    #[tokio::test]
    async fn failed_history_leaves_timeline_empty() {
        let mut connection = open_connection().await;
        let mut session = ConversationSession::new();
        let ticket = session.bind(&mut connection, &alice(), &bob()).unwrap();

        let outcome = session.apply_history(&ticket, Err(StoreError::Status(500)));

        assert_eq!(outcome, HistoryOutcome::Failed(StoreError::Status(500)));
        assert!(session.timeline().is_empty());
        assert!(session.conversation().is_some());
    }

    // ===========================================
    // Delivery Tests
    // ===========================================

    #[tokio::test]
    async fn released_subscription_does_not_deliver() {
        let mut connection = open_connection().await;
        let mut session = ConversationSession::new();

        session.bind(&mut connection, &alice(), &bob()).unwrap();
        let stale = session.subscription().unwrap();
        session.bind(&mut connection, &alice(), &carol()).unwrap();

        assert!(session.deliver(stale, "late").is_none());
        assert!(session.timeline().is_empty());
    }

    #[tokio::test]
    async fn write_outcome_updates_entry() {
        let mut connection = open_connection().await;
        let mut session = ConversationSession::new();
        session.bind(&mut connection, &alice(), &bob()).unwrap();

        let (epoch, ok) = session.append_sent("stored").unwrap();
        let (_, failed) = session.append_sent("lost").unwrap();

        assert!(session.record_write(epoch, ok, &Ok(())));
        assert!(session.record_write(epoch, failed, &Err(StoreError::Status(503))));

        let timeline = session.timeline();
        assert_eq!(timeline.get(ok).unwrap().delivery, DeliveryStatus::Stored);
        assert!(matches!(
            timeline.get(failed).unwrap().delivery,
            DeliveryStatus::WriteFailed { .. }
        ));
        assert_eq!(timeline.len(), 2);
    }

    #[tokio::test]
    async fn write_outcome_for_old_bind_is_ignored() {
        let mut connection = open_connection().await;
        let mut session = ConversationSession::new();
        session.bind(&mut connection, &alice(), &bob()).unwrap();
        let (epoch, sequence) = session.append_sent("hi").unwrap();

        session.bind(&mut connection, &alice(), &carol()).unwrap();

        assert!(!session.record_write(epoch, sequence, &Ok(())));
    }

    #[test]
    fn append_sent_requires_binding() {
        let mut session = ConversationSession::new();
        assert!(session.append_sent("hi").is_none());
    }
}
