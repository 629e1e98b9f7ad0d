//! Message timeline for the active conversation.
//!
//! The timeline merges three sources into one ordered sequence:
//! - the persisted history loaded at bind time (the baseline)
//! - live messages received from the peer
//! - messages sent locally, inserted optimistically
//!
//! Render order is the baseline in fetched order followed by every append in
//! the order it happened. Nothing is sorted and nothing is deduplicated by
//! content: two identical texts are two messages.
//!
//! Each entry gets a [`Sequence`] when it is inserted. Sequences are never
//! reused within a bind, so they serve as the stable handle used to record
//! the durable-write outcome of an optimistic send.

use chat_types::{DeliveryStatus, Epoch, HistoryEntry, Origin, Sequence};

/// One rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEntry {
    /// Stable identifier within the timeline.
    pub sequence: Sequence,
    /// Message text.
    pub text: String,
    /// Rendering side.
    pub origin: Origin,
    /// Durable-write outcome.
    pub delivery: DeliveryStatus,
}

/// Result of seeding the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedOutcome {
    /// Number of history entries installed.
    pub seeded: usize,
    /// Number of live/local arrivals kept after the baseline.
    pub kept_arrivals: usize,
}

/// Ordered message sequence of the active conversation.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    /// Bind generation this timeline belongs to.
    epoch: Epoch,
    /// Entries in render order.
    entries: Vec<TimelineEntry>,
    /// Number of leading entries that came from the history baseline.
    baseline_len: usize,
    /// Last sequence handed out.
    last: Sequence,
}

impl Timeline {
    /// Create an empty timeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all entries and start a fresh timeline for a new bind.
    pub fn reset(&mut self, epoch: Epoch) {
        self.epoch = epoch;
        self.entries.clear();
        self.baseline_len = 0;
        self.last = Sequence::zero();
    }

    /// The bind generation this timeline belongs to.
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Install the history baseline.
    ///
    /// Replaces any previous baseline. Arrivals appended since the bind stay
    /// after the baseline in their arrival order.
    pub fn seed(&mut self, history: Vec<HistoryEntry>) -> SeedOutcome {
        let baseline: Vec<TimelineEntry> = history
            .into_iter()
            .map(|entry| {
                let origin = entry.origin();
                TimelineEntry {
                    sequence: self.advance(),
                    text: entry.message,
                    origin,
                    delivery: DeliveryStatus::Settled,
                }
            })
            .collect();
        let seeded = baseline.len();
        self.entries.splice(0..self.baseline_len, baseline);
        self.baseline_len = seeded;

        SeedOutcome {
            seeded,
            kept_arrivals: self.entries.len() - seeded,
        }
    }

    /// Append a message received from the peer.
    pub fn append_received(&mut self, text: &str) -> Sequence {
        self.push(text, Origin::Peer, DeliveryStatus::Settled)
    }

    /// Append a locally sent message, pending its durable write.
    pub fn append_sent(&mut self, text: &str) -> Sequence {
        self.push(text, Origin::Local, DeliveryStatus::Pending)
    }

    /// Record the delivery status of an entry.
    ///
    /// Returns false if no entry has this sequence.
    pub fn set_delivery(&mut self, sequence: Sequence, status: DeliveryStatus) -> bool {
        match self.entries.iter_mut().find(|e| e.sequence == sequence) {
            Some(entry) => {
                entry.delivery = status;
                true
            }
            None => false,
        }
    }

    /// Look up an entry by sequence.
    pub fn get(&self, sequence: Sequence) -> Option<&TimelineEntry> {
        self.entries.iter().find(|e| e.sequence == sequence)
    }

    /// Entries in render order.
    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    /// `(text, origin)` pairs in render order.
    pub fn texts(&self) -> Vec<(&str, Origin)> {
        self.entries
            .iter()
            .map(|e| (e.text.as_str(), e.origin))
            .collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the timeline has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of history entries at the front.
    pub fn baseline_len(&self) -> usize {
        self.baseline_len
    }

    /// Number of sends whose durable write has not completed.
    pub fn pending_writes(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.delivery.is_pending())
            .count()
    }

    fn push(&mut self, text: &str, origin: Origin, delivery: DeliveryStatus) -> Sequence {
        let sequence = self.advance();
        self.entries.push(TimelineEntry {
            sequence,
            text: text.to_string(),
            origin,
            delivery,
        });
        sequence
    }

    fn advance(&mut self) -> Sequence {
        self.last = self.last.next();
        self.last
    }
}
