//! Bind-generation tracking for duet.
//!
//! History fetches have no cancellation primitive. Each bind takes a new
//! [`Epoch`]; when a fetch resolves, its epoch is compared against the
//! current one and the result is dropped if a newer bind (or an unbind)
//! happened in between.

use chat_types::Epoch;

/// Issues bind generations and answers whether a result is still current.
#[derive(Debug, Clone, Default)]
pub struct EpochTracker {
    current: Epoch,
}

impl EpochTracker {
    /// Create a tracker before any bind.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation and return it.
    pub fn advance(&mut self) -> Epoch {
        self.current = self.current.next();
        self.current
    }

    /// End the current generation without starting a bind.
    ///
    /// Results tagged with the retired epoch become stale.
    pub fn retire(&mut self) {
        self.current = self.current.next();
    }

    /// The current generation.
    pub fn current(&self) -> Epoch {
        self.current
    }

    /// Whether a result tagged `epoch` belongs to the current generation.
    pub fn is_current(&self, epoch: Epoch) -> bool {
        epoch == self.current
    }
}
