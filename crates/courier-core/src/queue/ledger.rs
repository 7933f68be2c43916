//! Retry ledger: failure counts keyed by message identity.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::domain::MessageId;
use crate::error::CourierError;

/// Result of recording a handler failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureRecord {
    /// Still under the ceiling; carries the new count.
    Counted(u32),

    /// Went past the ceiling (duplicate deliveries racing); entry purged.
    Exhausted,
}

/// In-memory failure counts. Counters reset when the process restarts.
///
/// Invariants:
/// - `0 <= count <= max_retries` for every entry.
/// - An entry exists only after a delivery of that identity was deleted.
/// - A resend carries its chain's count to the new identity, so the ceiling
///   applies to the logical message, not to one delivery.
///
/// Every read-modify-write happens under one lock, so concurrent
/// acknowledgment units never lose an update.
#[derive(Debug)]
pub struct RetryLedger {
    max_retries: u32,
    counts: Mutex<HashMap<MessageId, u32>>,
}

impl RetryLedger {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            counts: Mutex::new(HashMap::new()),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Entry check before a delivery is processed.
    ///
    /// When the identity already failed `max_retries` times the entry is
    /// purged and `RetriesExhausted` returned.
    pub fn admit(&self, message_id: &MessageId) -> Result<(), CourierError> {
        let mut counts = self.counts.lock();
        match counts.get(message_id).copied() {
            Some(failures) if failures >= self.max_retries => {
                counts.remove(message_id);
                Err(CourierError::RetriesExhausted {
                    message_id: message_id.clone(),
                    failures,
                })
            }
            _ => Ok(()),
        }
    }

    /// Start tracking an identity (after its delete succeeded).
    pub fn observe(&self, message_id: &MessageId) {
        self.counts.lock().entry(message_id.clone()).or_insert(0);
    }

    pub fn record_failure(&self, message_id: &MessageId) -> FailureRecord {
        let mut counts = self.counts.lock();
        let failures = counts.entry(message_id.clone()).or_insert(0);
        if *failures >= self.max_retries {
            counts.remove(message_id);
            return FailureRecord::Exhausted;
        }
        *failures += 1;
        FailureRecord::Counted(*failures)
    }

    /// Move the failure count of `from` onto the resent identity `to`.
    ///
    /// Failures already counted for `to` (it can be received before the
    /// hand-over) are added, capped at the ceiling.
    pub fn carry(&self, from: &MessageId, to: MessageId) {
        let mut counts = self.counts.lock();
        let Some(failures) = counts.remove(from) else {
            return;
        };
        let slot = counts.entry(to).or_insert(0);
        *slot = slot.saturating_add(failures).min(self.max_retries);
    }

    pub fn clear(&self, message_id: &MessageId) {
        self.counts.lock().remove(message_id);
    }

    pub fn failures(&self, message_id: &MessageId) -> Option<u32> {
        self.counts.lock().get(message_id).copied()
    }

    pub fn len(&self) -> usize {
        self.counts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.lock().is_empty()
    }
}
