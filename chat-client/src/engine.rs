//! ChatEngine - the main interface for duet.
//!
//! The engine owns one [`ConnectionManager`], one [`ConversationSession`] and
//! one [`OutboundDispatcher`] and serializes every state change through
//! `&mut self`:
//!
//! ```text
//! commands ─┐
//! inbound  ─┼─► ChatEngine ─► connection / session / timeline
//! completions (history, writes) ─┘        │
//!                                         └─► EngineUpdate stream
//! ```
//!
//! Store calls run as spawned tasks and come back as [`Completion`]s, so a
//! slow fetch never blocks live delivery. Completions for an older bind are
//! discarded by the session.
//!
//! # Example
//!
//! ```ignore
//! use duet_chat_client::{ChatEngine, ClientConfig, HttpMessageStore, WsTransport};
//! use duet_chat_types::Identity;
//!
//! let config = ClientConfig::new("http://localhost:5000");
//! let mut engine = ChatEngine::new(WsTransport::new(), HttpMessageStore::new(&config), &config);
//!
//! engine.login(Identity::new("1", "alice")).await;
//! engine.select_peer(Identity::new("2", "bob")).await?;
//! engine.send("yo").await;
//! ```

use std::sync::Arc;

use chat_core::{ConnectionEvent, Timeline, TimelineEntry};
use chat_types::{
    Conversation, DeliveryStatus, HistoryEntry, Identity, LiveEvent, Sequence,
};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::connection::ConnectionManager;
use crate::dispatcher::{OutboundDispatcher, PendingWrite, SendOutcome, SkipReason};
use crate::error::ClientError;
use crate::session::{ConversationSession, HistoryOutcome, HistoryTicket};
use crate::store::{MessageStore, StoreError};
use crate::transport::{Inbound, LiveTransport};

/// Result of a spawned store call.
#[derive(Debug)]
pub enum Completion {
    /// A history fetch resolved.
    History {
        /// Ticket of the bind that issued the fetch.
        ticket: HistoryTicket,
        /// Fetched entries, oldest first.
        result: Result<Vec<HistoryEntry>, StoreError>,
    },
    /// A durable write resolved.
    Write {
        /// The write.
        pending: PendingWrite,
        /// Store outcome.
        result: Result<(), StoreError>,
    },
}

/// Requests accepted by [`ChatEngine::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Log in and open the live connection.
    Login(Identity),
    /// Open the conversation with a peer.
    SelectPeer(Identity),
    /// Send a message in the open conversation.
    Send(String),
    /// Close the conversation and the connection.
    Logout,
}

/// Observable changes, for a UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineUpdate {
    /// Connection lifecycle event.
    Connection(ConnectionEvent),
    /// A conversation was opened; its timeline starts empty.
    Opened(Conversation),
    /// History arrived; carries the whole timeline.
    HistoryLoaded(Vec<TimelineEntry>),
    /// History could not be fetched.
    HistoryFailed(String),
    /// A message was appended.
    Appended(TimelineEntry),
    /// A sent message's durable write resolved.
    Delivery {
        /// Timeline entry.
        sequence: Sequence,
        /// New status.
        status: DeliveryStatus,
    },
    /// A send did nothing.
    Skipped(SkipReason),
    /// Logged out.
    LoggedOut,
}

/// The main chat engine.
pub struct ChatEngine<T: LiveTransport, S: MessageStore> {
    connection: ConnectionManager<T>,
    session: ConversationSession,
    dispatcher: OutboundDispatcher<S>,
    store: Arc<S>,
    identity: Option<Identity>,
    peer: Option<Identity>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    updates: Option<mpsc::UnboundedSender<EngineUpdate>>,
}

impl<T, S> ChatEngine<T, S>
where
    T: LiveTransport + 'static,
    S: MessageStore + 'static,
{
    /// Create an engine. Nothing connects until [`login`](Self::login).
    pub fn new(transport: T, store: S, config: &ClientConfig) -> Self {
        let store = Arc::new(store);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            connection: ConnectionManager::new(transport, config),
            session: ConversationSession::new(),
            dispatcher: OutboundDispatcher::new(Arc::clone(&store), completions_tx.clone()),
            store,
            identity: None,
            peer: None,
            completions_tx,
            completions_rx,
            updates: None,
        }
    }

    /// Publish [`EngineUpdate`]s on `updates`.
    pub fn with_updates(mut self, updates: mpsc::UnboundedSender<EngineUpdate>) -> Self {
        self.updates = Some(updates);
        self
    }

    /// Log in as `identity` and open the live connection.
    ///
    /// Logging in again as the same identity is a no-op; a different identity
    /// logs the current one out first.
    pub async fn login(&mut self, identity: Identity) {
        if identity.id.is_empty() {
            warn!("Ignoring login without a user id");
            return;
        }
        if let Some(current) = &self.identity {
            if current.id != identity.id {
                self.logout().await;
            }
        }
        info!("Logged in as {} ({})", identity.display_name, identity.id);
        self.connection.open(&identity).await;
        self.identity = Some(identity);
        self.publish_connection_events();
    }

    /// Open the conversation with `peer`.
    ///
    /// The timeline is reset immediately; history is fetched in the
    /// background and applied when it arrives.
    pub async fn select_peer(&mut self, peer: Identity) -> Result<HistoryTicket, ClientError> {
        let local = self.identity.as_ref().ok_or(ClientError::NotLoggedIn)?;
        let ticket = self.session.bind(&mut self.connection, local, &peer)?;
        self.peer = Some(peer);
        self.publish(EngineUpdate::Opened(ticket.conversation.clone()));

        let store = Arc::clone(&self.store);
        let completions = self.completions_tx.clone();
        let fetch = ticket.clone();
        tokio::spawn(async move {
            let result = store.fetch_history(&fetch.request()).await;
            let _ = completions.send(Completion::History {
                ticket: fetch,
                result,
            });
        });
        Ok(ticket)
    }

    /// Send `text` to the current peer.
    pub async fn send(&mut self, text: &str) -> SendOutcome {
        let outcome = self
            .dispatcher
            .send(
                &self.connection,
                &mut self.session,
                self.identity.as_ref(),
                text,
            )
            .await;
        match &outcome {
            SendOutcome::Dispatched(pending) => {
                if let Some(entry) = self.session.timeline().get(pending.sequence) {
                    self.publish(EngineUpdate::Appended(entry.clone()));
                }
            }
            SendOutcome::Skipped(reason) => {
                debug!("Send skipped: {:?}", reason);
                self.publish(EngineUpdate::Skipped(*reason));
            }
        }
        outcome
    }

    /// Close the conversation and the connection, then forget the identity.
    pub async fn logout(&mut self) {
        self.session.unbind(&mut self.connection);
        self.peer = None;
        self.connection.close().await;
        self.publish_connection_events();
        if let Some(identity) = self.identity.take() {
            info!("Logged out {}", identity.id);
            self.publish(EngineUpdate::LoggedOut);
        }
    }

    /// Process a signal from the live transport.
    pub async fn handle_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Event(LiveEvent::MsgReceive(text)) => {
                let Some(subscription) = self.connection.route_message() else {
                    debug!("No open conversation; dropping message");
                    return;
                };
                if let Some(sequence) = self.session.deliver(subscription, &text) {
                    if let Some(entry) = self.session.timeline().get(sequence) {
                        self.publish(EngineUpdate::Appended(entry.clone()));
                    }
                }
            }
            Inbound::Event(other) => {
                debug!("Ignoring inbound {} event", other.name().as_str());
            }
            Inbound::Dropped(reason) => {
                self.connection.handle_dropped(reason).await;
                self.publish_connection_events();
            }
        }
    }

    /// Apply the result of a store call.
    pub fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::History { ticket, result } => {
                match self.session.apply_history(&ticket, result) {
                    HistoryOutcome::Applied(_) => {
                        let entries = self.session.timeline().entries().to_vec();
                        self.publish(EngineUpdate::HistoryLoaded(entries));
                    }
                    HistoryOutcome::Failed(e) => {
                        self.publish(EngineUpdate::HistoryFailed(e.to_string()));
                    }
                    HistoryOutcome::Stale => {}
                }
            }
            Completion::Write { pending, result } => {
                if let Err(e) = &result {
                    warn!("Error storing message {}: {}", pending.sequence, e);
                }
                if self
                    .session
                    .record_write(pending.epoch, pending.sequence, &result)
                {
                    if let Some(entry) = self.session.timeline().get(pending.sequence) {
                        self.publish(EngineUpdate::Delivery {
                            sequence: entry.sequence,
                            status: entry.delivery.clone(),
                        });
                    }
                }
            }
        }
    }

    /// Wait for the next store completion without applying it.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        self.completions_rx.recv().await
    }

    /// Wait for the next store completion and apply it.
    pub async fn process_next(&mut self) {
        if let Some(completion) = self.completions_rx.recv().await {
            self.handle_completion(completion);
        }
    }

    /// Attempt the scheduled reconnect now.
    pub async fn reconnect_now(&mut self) {
        self.connection.reconnect_now().await;
        self.publish_connection_events();
    }

    /// Drive the engine until `commands` closes, then log out.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let transport = self.connection.transport_handle();
        loop {
            let reconnect_at = self.connection.reconnect_deadline();
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some(completion) = self.completions_rx.recv() => {
                    self.handle_completion(completion);
                }
                inbound = transport.recv(), if self.connection.is_open() => match inbound {
                    Ok(inbound) => self.handle_inbound(inbound).await,
                    Err(e) => self.handle_inbound(Inbound::Dropped(e.to_string())).await,
                },
                _ = sleep_until(reconnect_at.unwrap_or_else(Instant::now)), if reconnect_at.is_some() => {
                    self.reconnect_now().await;
                }
            }
        }
        self.logout().await;
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Login(identity) => self.login(identity).await,
            Command::SelectPeer(peer) => {
                if let Err(e) = self.select_peer(peer).await {
                    warn!("Cannot open conversation: {}", e);
                }
            }
            Command::Send(text) => {
                let _ = self.send(&text).await;
            }
            Command::Logout => self.logout().await,
        }
    }

    /// The logged-in identity.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// The current peer.
    pub fn peer(&self) -> Option<&Identity> {
        self.peer.as_ref()
    }

    /// The open conversation.
    pub fn conversation(&self) -> Option<&Conversation> {
        self.session.conversation()
    }

    /// Timeline of the open conversation.
    pub fn timeline(&self) -> &Timeline {
        self.session.timeline()
    }

    /// Check if the live connection is open.
    pub fn is_connected(&self) -> bool {
        self.connection.is_open()
    }

    /// The connection manager.
    pub fn connection(&self) -> &ConnectionManager<T> {
        &self.connection
    }

    /// Get a reference to the underlying transport (for testing).
    pub fn transport(&self) -> &T {
        self.connection.transport()
    }

    fn publish(&self, update: EngineUpdate) {
        if let Some(updates) = &self.updates {
            let _ = updates.send(update);
        }
    }

    fn publish_connection_events(&mut self) {
        for event in self.connection.drain_events() {
            self.publish(EngineUpdate::Connection(event));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MockMessageStore;
    use crate::transport::MockTransport;
    use chat_types::{Origin, UserId};
    use std::time::Duration;

    type TestEngine = ChatEngine<MockTransport, MockMessageStore>;

    fn alice() -> Identity {
        Identity::new("1", "alice")
    }

    fn bob() -> Identity {
        Identity::new("2", "bob")
    }

    fn carol() -> Identity {
        Identity::new("3", "carol")
    }

    fn engine() -> (TestEngine, MockTransport, MockMessageStore) {
        let transport = MockTransport::new();
        let store = MockMessageStore::new();
        let engine = ChatEngine::new(
            transport.clone(),
            store.clone(),
            &ClientConfig::new("http://test"),
        );
        (engine, transport, store)
    }

    async fn next_update(updates: &mut mpsc::UnboundedReceiver<EngineUpdate>) -> EngineUpdate {
        tokio::time::timeout(Duration::from_secs(2), updates.recv())
            .await
            .expect("update in time")
            .expect("engine running")
    }

    async fn deliver(engine: &mut TestEngine, transport: &MockTransport, text: &str) {
        transport.push_message(text);
        let inbound = transport.recv().await.unwrap();
        engine.handle_inbound(inbound).await;
    }

    // ===========================================
    // Scenario
    // ===========================================

    #[tokio::test]
    async fn alice_chats_with_bob() {
        let (mut engine, transport, store) = engine();
        store.set_history(&UserId::new("2"), vec![HistoryEntry::new("hi", false)]);

        engine.login(alice()).await;
        engine.select_peer(bob()).await.unwrap();
        engine.process_next().await;
        assert_eq!(engine.timeline().texts(), vec![("hi", Origin::Peer)]);

        assert!(engine.send("yo").await.is_dispatched());
        assert_eq!(
            engine.timeline().texts(),
            vec![("hi", Origin::Peer), ("yo", Origin::Local)]
        );

        deliver(&mut engine, &transport, "sup").await;
        assert_eq!(
            engine.timeline().texts(),
            vec![
                ("hi", Origin::Peer),
                ("yo", Origin::Local),
                ("sup", Origin::Peer)
            ]
        );

        engine.process_next().await;
        assert_eq!(store.writes().len(), 1);
        assert_eq!(store.writes()[0].message, "yo");
        assert_eq!(
            store.fetches()[0],
            chat_types::HistoryRequest {
                from: UserId::new("1"),
                to: UserId::new("2"),
            }
        );
    }

    // ===========================================
    // Ordering
    // ===========================================

    #[tokio::test]
    async fn seed_then_appends_keep_arrival_order() {
        let (mut engine, transport, store) = engine();
        store.set_history(
            &UserId::new("2"),
            vec![HistoryEntry::new("a", true), HistoryEntry::new("b", false)],
        );
        engine.login(alice()).await;
        engine.select_peer(bob()).await.unwrap();
        engine.process_next().await;

        let _ = engine.send("c").await;
        deliver(&mut engine, &transport, "d").await;
        let _ = engine.send("e").await;
        deliver(&mut engine, &transport, "f").await;

        assert_eq!(
            engine.timeline().texts(),
            vec![
                ("a", Origin::Local),
                ("b", Origin::Peer),
                ("c", Origin::Local),
                ("d", Origin::Peer),
                ("e", Origin::Local),
                ("f", Origin::Peer),
            ]
        );
    }

    #[tokio::test]
    async fn arrivals_before_history_follow_it() {
        let (mut engine, transport, store) = engine();
        store.set_history(&UserId::new("2"), vec![HistoryEntry::new("old", false)]);
        let release = store.hold_history(&UserId::new("2"));

        engine.login(alice()).await;
        engine.select_peer(bob()).await.unwrap();
        deliver(&mut engine, &transport, "new").await;
        release.send(()).unwrap();
        engine.process_next().await;

        assert_eq!(
            engine.timeline().texts(),
            vec![("old", Origin::Peer), ("new", Origin::Peer)]
        );
    }

    // ===========================================
    // Rebind Isolation
    // ===========================================

    #[tokio::test]
    async fn stale_listener_does_not_touch_new_timeline() {
        let (mut engine, transport, store) = engine();
        store.set_history(&UserId::new("3"), vec![HistoryEntry::new("c1", false)]);

        engine.login(alice()).await;
        engine.select_peer(bob()).await.unwrap();
        let stale = engine.session.subscription().unwrap();
        engine.process_next().await;

        engine.select_peer(carol()).await.unwrap();
        engine.process_next().await;
        let before = engine.timeline().texts().len();

        assert!(engine.session.deliver(stale, "for bob").is_none());
        assert_eq!(engine.timeline().texts().len(), before);

        // Live traffic now only reaches the new conversation.
        deliver(&mut engine, &transport, "for carol").await;
        assert_eq!(
            engine.timeline().texts(),
            vec![("c1", Origin::Peer), ("for carol", Origin::Peer)]
        );
    }

    // ===========================================
    // Presence
    // ===========================================

    #[tokio::test]
    async fn login_twice_announces_once() {
        let (mut engine, transport, _) = engine();

        engine.login(alice()).await;
        engine.login(alice()).await;

        assert_eq!(transport.presence_announcements(), 1);
        assert_eq!(
            transport.emitted(),
            vec![LiveEvent::AddUser(UserId::new("1"))]
        );
    }

    // ===========================================
    // Optimistic Send
    // ===========================================

    #[tokio::test]
    async fn send_appends_before_write_completes() {
        let (mut engine, _, store) = engine();
        engine.login(alice()).await;
        engine.select_peer(bob()).await.unwrap();
        engine.process_next().await;
        let release = store.hold_next_write();

        let SendOutcome::Dispatched(pending) = engine.send("hi").await else {
            panic!("expected dispatch");
        };

        let entry = engine.timeline().get(pending.sequence).unwrap();
        assert_eq!(entry.text, "hi");
        assert_eq!(entry.origin, Origin::Local);
        assert!(entry.delivery.is_pending());
        assert!(store.writes().is_empty());

        release.send(()).unwrap();
        engine.process_next().await;
        assert_eq!(
            engine.timeline().get(pending.sequence).unwrap().delivery,
            DeliveryStatus::Stored
        );
    }

    #[tokio::test]
    async fn failed_write_keeps_message() {
        let (mut engine, _, store) = engine();
        engine.login(alice()).await;
        engine.select_peer(bob()).await.unwrap();
        engine.process_next().await;
        store.fail_next_write(StoreError::Status(500));

        let _ = engine.send("hi").await;
        engine.process_next().await;

        let entry = &engine.timeline().entries()[0];
        assert_eq!(entry.text, "hi");
        assert_eq!(
            entry.delivery,
            DeliveryStatus::WriteFailed {
                error: StoreError::Status(500).to_string()
            }
        );
    }

    #[tokio::test]
    async fn send_without_conversation_is_skipped() {
        let (mut engine, transport, _) = engine();
        engine.login(alice()).await;

        let outcome = engine.send("hi").await;

        assert_eq!(outcome, SendOutcome::Skipped(SkipReason::NoConversation));
        assert_eq!(transport.emitted().len(), 1);
    }

    // ===========================================
    // Stale Fetch Discard
    // ===========================================

    #[tokio::test]
    async fn late_history_for_previous_peer_is_discarded() {
        let (mut engine, _, store) = engine();
        store.set_history(&UserId::new("2"), vec![HistoryEntry::new("from bob", false)]);
        store.set_history(&UserId::new("3"), vec![HistoryEntry::new("from carol", false)]);
        let release_bob = store.hold_history(&UserId::new("2"));

        engine.login(alice()).await;
        engine.select_peer(bob()).await.unwrap();
        engine.select_peer(carol()).await.unwrap();

        engine.process_next().await;
        let carol_view = engine.timeline().entries().to_vec();
        assert_eq!(engine.timeline().texts(), vec![("from carol", Origin::Peer)]);

        release_bob.send(()).unwrap();
        engine.process_next().await;
        assert_eq!(engine.timeline().entries(), carol_view.as_slice());
    }

    #[tokio::test]
    async fn history_failure_leaves_empty_timeline() {
        let (engine, transport, store) = engine();
        store.fail_next_fetch(StoreError::Request("connection reset".into()));
        let (tx, mut updates) = mpsc::unbounded_channel();
        let mut engine = engine.with_updates(tx);

        engine.login(alice()).await;
        engine.select_peer(bob()).await.unwrap();
        engine.process_next().await;
        assert!(engine.timeline().is_empty());

        // Live delivery still works.
        deliver(&mut engine, &transport, "still here").await;
        assert_eq!(engine.timeline().len(), 1);

        let mut saw_failure = false;
        while let Ok(update) = updates.try_recv() {
            if matches!(update, EngineUpdate::HistoryFailed(_)) {
                saw_failure = true;
            }
        }
        assert!(saw_failure);
    }

    // ===========================================
    // Lifecycle
    // ===========================================

    #[tokio::test]
    async fn select_peer_requires_login() {
        let (mut engine, _, _) = engine();
        let result = engine.select_peer(bob()).await;
        assert!(matches!(result, Err(ClientError::NotLoggedIn)));
    }

    #[tokio::test]
    async fn logout_closes_before_forgetting_identity() {
        let (mut engine, transport, _) = engine();
        engine.login(alice()).await;
        engine.select_peer(bob()).await.unwrap();

        engine.logout().await;

        assert!(!transport.is_connected());
        assert_eq!(transport.close_calls(), 1);
        assert!(engine.identity().is_none());
        assert!(engine.conversation().is_none());

        // Messages after logout go nowhere.
        engine
            .handle_inbound(Inbound::Event(LiveEvent::MsgReceive("late".into())))
            .await;
        assert!(engine.timeline().is_empty());
    }

    #[tokio::test]
    async fn switching_identity_logs_out_first() {
        let (mut engine, transport, _) = engine();
        engine.login(alice()).await;
        engine.select_peer(bob()).await.unwrap();

        engine.login(carol()).await;

        assert_eq!(transport.close_calls(), 1);
        assert!(engine.conversation().is_none());
        assert_eq!(engine.identity().unwrap().id, UserId::new("3"));
        assert_eq!(transport.presence_announcements(), 2);
    }

    #[tokio::test]
    async fn drop_and_reconnect_keeps_conversation() {
        let (mut engine, transport, _) = engine();
        engine.login(alice()).await;
        engine.select_peer(bob()).await.unwrap();
        engine.process_next().await;

        transport.drop_connection("server restart");
        let inbound = transport.recv().await.unwrap();
        engine.handle_inbound(inbound).await;
        assert!(!engine.is_connected());
        assert!(engine.connection().reconnect_deadline().is_some());

        engine.reconnect_now().await;
        assert!(engine.is_connected());
        assert_eq!(transport.presence_announcements(), 2);

        deliver(&mut engine, &transport, "back").await;
        assert_eq!(engine.timeline().texts(), vec![("back", Origin::Peer)]);
    }

    #[tokio::test]
    async fn run_processes_commands_and_live_messages() {
        let (engine, transport, store) = engine();
        store.set_history(&UserId::new("2"), vec![HistoryEntry::new("hi", false)]);
        let (updates_tx, mut updates) = mpsc::unbounded_channel();
        let (commands, rx) = mpsc::channel(8);
        let task = tokio::spawn(engine.with_updates(updates_tx).run(rx));

        commands.send(Command::Login(alice())).await.unwrap();
        commands.send(Command::SelectPeer(bob())).await.unwrap();

        loop {
            if let EngineUpdate::HistoryLoaded(entries) = next_update(&mut updates).await {
                assert_eq!(entries.len(), 1);
                break;
            }
        }

        transport.push_message("sup");
        loop {
            if let EngineUpdate::Appended(entry) = next_update(&mut updates).await {
                assert_eq!(entry.text, "sup");
                assert_eq!(entry.origin, Origin::Peer);
                break;
            }
        }

        drop(commands);
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("engine stops")
            .unwrap();
        assert!(!transport.is_connected());
    }
}
