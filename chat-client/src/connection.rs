//! ConnectionManager - owner of the live connection.
//!
//! One manager exists per login session. It drives the pure
//! [`ConnectionState`] machine from chat-core and executes the actions it
//! produces against the [`LiveTransport`]:
//!
//! ```text
//! open()/close()/drops ──► ConnectionState::on_event ──► actions
//!                                                          │
//!          connect / add-user / close / retry timer ◄──────┘
//! ```
//!
//! The manager also holds the subscription registry. Conversations borrow
//! the connection to subscribe, unsubscribe and emit; they never own it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chat_core::{
    Action, ConnectionEvent, ConnectionState, Event, ListenerScope, SubscribeError,
    SubscriptionId, SubscriptionSet,
};
use chat_types::{Identity, LiveEvent, UserId};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::transport::{LiveTransport, TransportError};

/// Owner of the live connection for one logged-in identity.
pub struct ConnectionManager<T: LiveTransport> {
    transport: Arc<T>,
    live_url: String,
    reconnect: bool,
    connect_timeout: Duration,
    state: ConnectionState,
    identity: Option<UserId>,
    subscriptions: SubscriptionSet,
    reconnect_at: Option<Instant>,
    events: Vec<ConnectionEvent>,
}

impl<T: LiveTransport> ConnectionManager<T> {
    /// Create a manager with no connection.
    pub fn new(transport: T, config: &ClientConfig) -> Self {
        Self {
            transport: Arc::new(transport),
            live_url: config.live_url.clone(),
            reconnect: config.reconnect,
            connect_timeout: config.connect_timeout,
            state: ConnectionState::new(),
            identity: None,
            subscriptions: SubscriptionSet::new(),
            reconnect_at: None,
            events: Vec::new(),
        }
    }

    /// Open the live connection for `identity` and announce presence.
    ///
    /// Idempotent: while a connection is open or being established for the
    /// same identity nothing happens. Transport failures are logged and leave
    /// the manager in its retry state; they are never returned.
    pub async fn open(&mut self, identity: &Identity) {
        if let Some(current) = &self.identity {
            if *current != identity.id && !self.is_released() {
                info!("Switching live connection from {} to {}", current, identity.id);
                self.close().await;
            }
        }
        self.identity = Some(identity.id.clone());
        info!("Initializing live connection for {}", identity.id);
        self.apply(Event::OpenRequested).await;
    }

    /// Close the live connection.
    ///
    /// Releases every subscription first, so nothing is dispatched after this
    /// returns. Safe to call when already closed.
    pub async fn close(&mut self) {
        if let Some(id) = self.subscriptions.clear() {
            debug!("Released subscription {:?} on close", id);
        }
        self.apply(Event::CloseRequested).await;
        self.identity = None;
    }

    /// Report that the open connection was lost.
    pub async fn handle_dropped(&mut self, reason: String) {
        self.apply(Event::Dropped { reason }).await;
    }

    /// Fire the reconnect timer.
    pub async fn reconnect_now(&mut self) {
        self.reconnect_at = None;
        self.apply(Event::ReconnectTimer).await;
    }

    /// When the next reconnect attempt is due, if one is scheduled.
    pub fn reconnect_deadline(&self) -> Option<Instant> {
        self.reconnect_at
    }

    /// Send an event over the open connection.
    pub async fn emit(&self, event: &LiveEvent) -> Result<(), ClientError> {
        if !self.is_open() {
            return Err(ClientError::NotConnected);
        }
        self.transport.emit(event).await?;
        Ok(())
    }

    /// Install the live-message subscription for a conversation.
    pub fn subscribe(&mut self, scope: ListenerScope) -> Result<SubscriptionId, SubscribeError> {
        let id = self.subscriptions.subscribe(scope)?;
        debug!("Subscribed {:?} to live messages", id);
        Ok(id)
    }

    /// Release a subscription. Returns false for an unknown or stale id.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let released = self.subscriptions.unsubscribe(id);
        if released {
            debug!("Unsubscribed {:?} from live messages", id);
        }
        released
    }

    /// The subscription an inbound message should be dispatched to.
    pub fn route_message(&self) -> Option<SubscriptionId> {
        if self.state.is_closed() {
            return None;
        }
        self.subscriptions.active().map(|(id, _)| id)
    }

    /// Whether `id` is the active subscription.
    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.subscriptions.is_active(id)
    }

    /// Check if the connection is open.
    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Identity the connection was opened for.
    pub fn identity(&self) -> Option<&UserId> {
        self.identity.as_ref()
    }

    /// Take the connection events reported since the last call.
    pub fn drain_events(&mut self) -> Vec<ConnectionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Shared handle to the transport, for the receive loop.
    pub fn transport_handle(&self) -> Arc<T> {
        Arc::clone(&self.transport)
    }

    /// Get a reference to the underlying transport (for testing).
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn is_released(&self) -> bool {
        matches!(self.state, ConnectionState::Absent | ConnectionState::Closed)
    }

    /// Feed an event through the state machine and execute the resulting
    /// actions; transport outcomes are fed back in until the machine settles.
    async fn apply(&mut self, event: Event) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            let (state, actions) = std::mem::take(&mut self.state).on_event(event);
            self.state = state;
            for action in actions {
                if let Some(next) = self.execute(action).await {
                    queue.push_back(next);
                }
            }
        }
    }

    async fn execute(&mut self, action: Action) -> Option<Event> {
        match action {
            Action::Connect => {
                let attempt = tokio::time::timeout(
                    self.connect_timeout,
                    self.transport.connect(&self.live_url),
                )
                .await
                .unwrap_or(Err(TransportError::Timeout));
                match attempt {
                    Ok(()) => Some(Event::ConnectSucceeded),
                    Err(e) => Some(Event::ConnectFailed {
                        error: e.to_string(),
                    }),
                }
            }
            Action::AnnouncePresence => {
                let id = self.identity.clone()?;
                match self.transport.emit(&LiveEvent::AddUser(id.clone())).await {
                    Ok(()) => debug!("Announced presence for {}", id),
                    Err(e) => warn!("Presence announcement for {} failed: {}", id, e),
                }
                None
            }
            Action::Disconnect => {
                info!("Cleaning up live connection");
                if let Err(e) = self.transport.close().await {
                    warn!("Error closing live connection: {}", e);
                }
                None
            }
            Action::StartReconnectTimer { delay } => {
                if self.reconnect {
                    info!("Retrying live connection in {:?}", delay);
                    self.reconnect_at = Some(Instant::now() + delay);
                }
                None
            }
            Action::CancelReconnect => {
                self.reconnect_at = None;
                None
            }
            Action::EmitEvent(event) => {
                match &event {
                    ConnectionEvent::Connected => info!("Live connection established"),
                    ConnectionEvent::ConnectionFailed { error } => {
                        warn!("Live connection error: {}", error)
                    }
                    ConnectionEvent::Disconnected { reason } => {
                        warn!("Live connection lost: {}", reason)
                    }
                    ConnectionEvent::ReconnectFailed { attempt, error } => {
                        warn!("Reconnect attempt {} failed: {}", attempt, error)
                    }
                    ConnectionEvent::Closed => info!("Live connection closed"),
                }
                self.events.push(event);
                None
            }
        }
    }
}
