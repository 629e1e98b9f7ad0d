//! Client errors.

use chat_core::SubscribeError;
use thiserror::Error;

use crate::transport::TransportError;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Subscription could not be installed.
    #[error("subscription error: {0}")]
    Subscribe(#[from] SubscribeError),

    /// Live connection is not open.
    #[error("not connected")]
    NotConnected,

    /// No identity is logged in.
    #[error("not logged in")]
    NotLoggedIn,
}
