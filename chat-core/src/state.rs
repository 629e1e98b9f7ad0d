//! Connection state machine for duet.
//!
//! This module provides a pure, side-effect-free state machine for the live
//! connection lifecycle. The state machine takes events as input and produces
//! a new state plus a list of actions to execute.
//!
//! The actual I/O (connecting, announcing presence, closing) is performed by
//! chat-client, not by this module.

use std::time::Duration;

/// Connection state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection has been requested in this session.
    Absent,
    /// Connection attempt in progress.
    Connecting {
        /// Reconnection attempts that preceded this one (0 = first try).
        attempt: u32,
    },
    /// Connected and presence announced.
    Open,
    /// Connection failed or dropped, waiting to retry.
    Reconnecting {
        /// Number of failed attempts so far.
        attempt: u32,
    },
    /// Closed on request; nothing is dispatched any more.
    Closed,
}

impl ConnectionState {
    /// Create a new state machine in the Absent state.
    pub fn new() -> Self {
        Self::Absent
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (chat-client)
    /// is responsible for executing the returned actions.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            // Open requests
            (Self::Absent | Self::Closed, Event::OpenRequested) => {
                (Self::Connecting { attempt: 0 }, vec![Action::Connect])
            }
            (Self::Reconnecting { attempt }, Event::OpenRequested) => (
                Self::Connecting { attempt },
                vec![Action::CancelReconnect, Action::Connect],
            ),
            // Already connecting or open: one handle per identity
            (state @ (Self::Connecting { .. } | Self::Open), Event::OpenRequested) => {
                (state, vec![])
            }

            // Transport reports success
            (Self::Connecting { .. } | Self::Reconnecting { .. }, Event::ConnectSucceeded) => (
                Self::Open,
                vec![
                    Action::AnnouncePresence,
                    Action::EmitEvent(ConnectionEvent::Connected),
                ],
            ),

            // Transport reports failure
            (Self::Connecting { attempt }, Event::ConnectFailed { error }) => {
                let next_attempt = attempt.saturating_add(1);
                let emitted = if attempt == 0 {
                    ConnectionEvent::ConnectionFailed { error }
                } else {
                    ConnectionEvent::ReconnectFailed {
                        attempt: next_attempt,
                        error,
                    }
                };
                (
                    Self::Reconnecting {
                        attempt: next_attempt,
                    },
                    vec![
                        Action::EmitEvent(emitted),
                        Action::StartReconnectTimer {
                            delay: calculate_backoff(next_attempt),
                        },
                    ],
                )
            }

            // Open connection lost
            (Self::Open, Event::Dropped { reason }) => (
                Self::Reconnecting { attempt: 1 },
                vec![
                    Action::EmitEvent(ConnectionEvent::Disconnected { reason }),
                    Action::StartReconnectTimer {
                        delay: calculate_backoff(1),
                    },
                ],
            ),

            // Retry timer
            (Self::Reconnecting { attempt }, Event::ReconnectTimer) => {
                (Self::Connecting { attempt }, vec![Action::Connect])
            }

            // Close requests
            (Self::Open | Self::Connecting { .. }, Event::CloseRequested) => (
                Self::Closed,
                vec![
                    Action::Disconnect,
                    Action::EmitEvent(ConnectionEvent::Closed),
                ],
            ),
            (Self::Reconnecting { .. }, Event::CloseRequested) => (
                Self::Closed,
                vec![
                    Action::CancelReconnect,
                    Action::Disconnect,
                    Action::EmitEvent(ConnectionEvent::Closed),
                ],
            ),

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if the connection is open.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Check if currently trying to connect.
    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting { .. } | Self::Reconnecting { .. })
    }

    /// Check if the connection was closed on request.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Events that can occur in the connection lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Login asked for a live connection.
    OpenRequested,
    /// Transport connected (`connect`).
    ConnectSucceeded,
    /// Transport failed to connect (`connect_error`).
    ConnectFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// An open connection was lost.
    Dropped {
        /// Reason for disconnection.
        reason: String,
    },
    /// Logout asked for the connection to close.
    CloseRequested,
    /// Reconnect timer fired.
    ReconnectTimer,
}

/// Actions to be executed by chat-client.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Initiate transport connection.
    Connect,
    /// Emit `add-user` with the logged-in identity.
    AnnouncePresence,
    /// Close the transport.
    Disconnect,
    /// Start a timer for reconnection.
    StartReconnectTimer {
        /// Delay before attempting reconnection.
        delay: Duration,
    },
    /// Cancel any pending reconnect timer.
    CancelReconnect,
    /// Report an event to the application.
    EmitEvent(ConnectionEvent),
}

/// Connection events reported to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Connection opened and presence announced.
    Connected,
    /// First connection attempt failed.
    ConnectionFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Open connection was lost.
    Disconnected {
        /// Reason for disconnection.
        reason: String,
    },
    /// A reconnection attempt failed.
    ReconnectFailed {
        /// Which attempt this was.
        attempt: u32,
        /// Error message describing the failure.
        error: String,
    },
    /// Connection closed on request.
    Closed,
}

/// Calculate reconnection backoff with jitter.
///
/// Formula: min(30s, 2^attempt seconds) + random(0..=1000ms)
fn calculate_backoff(attempt: u32) -> Duration {
    let base_secs = 2u64.pow(attempt.min(5)).min(30);
    Duration::from_secs(base_secs) + Duration::from_millis(random_jitter_ms())
}

/// Random jitter between 0 and 1000 milliseconds.
fn random_jitter_ms() -> u64 {
    let mut bytes = [0u8; 8];
    // An unavailable RNG only costs the jitter.
    if getrandom::getrandom(&mut bytes).is_err() {
        return 0;
    }
    u64::from_le_bytes(bytes) % 1001
}
