//! Liveness registry: keep-alive bookkeeping for armed futures.
//!
//! The reactor holds no ambient reference to the futures it will call
//! back into; this registry is the explicit substitute. Each entry pairs
//! a pending-callback count with a strong handle to the future core, so a
//! future with an outstanding continuation survives even if the caller
//! drops every other reference (anonymous `rpc().then(cb)` chains and
//! streaming re-arms depend on this).
//!
//! Lifecycle of an entry:
//! - created with count 1 when a continuation is first armed
//! - incremented on re-arm (`reset` with the continuation outstanding)
//! - decremented when a continuation fires; removed at 0, dropping the
//!   strong handle and letting ordinary ownership reclaim the future
//!
//! Pure bookkeeping: no dispatch logic lives here. Misuse (releasing an
//! absent entry) is an internal defect and reports `InvariantViolation`.

use std::collections::HashMap;

use crate::error::{Error, ErrorKind};
use crate::future::{FutureId, SharedCore};

struct Entry {
    count: u32,
    handle: SharedCore,
}

/// Keep-alive table mapping future identity to pending-callback count.
#[derive(Default)]
pub(crate) struct LivenessRegistry {
    entries: HashMap<FutureId, Entry>,
    /// Arm order, used for deterministic dispatch ordering.
    order: Vec<FutureId>,
}

impl LivenessRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Creates an entry with count 1, or increments an existing one.
    ///
    /// Returns the new count.
    pub(crate) fn retain(&mut self, id: FutureId, handle: SharedCore) -> u32 {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.count += 1;
            return entry.count;
        }
        self.entries.insert(id, Entry { count: 1, handle });
        self.order.push(id);
        1
    }

    /// Decrements the entry, removing it when the count reaches 0.
    ///
    /// Returns the remaining count.
    ///
    /// # Errors
    ///
    /// Returns `InvariantViolation` when no entry exists; counts never go
    /// negative.
    pub(crate) fn release(&mut self, id: FutureId) -> Result<u32, Error> {
        let Some(entry) = self.entries.get_mut(&id) else {
            return Err(Error::new(ErrorKind::InvariantViolation)
                .with_message(format!("release of unretained {id}")));
        };
        entry.count -= 1;
        let remaining = entry.count;
        if remaining == 0 {
            self.entries.remove(&id);
            self.order.retain(|other| *other != id);
        }
        Ok(remaining)
    }

    /// Membership test backing double-registration rejection.
    pub(crate) fn is_retained(&self, id: FutureId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Current pending-callback count for a future, if retained.
    pub(crate) fn count(&self, id: FutureId) -> Option<u32> {
        self.entries.get(&id).map(|entry| entry.count)
    }

    /// Strong handle for a retained future (identity lookup, not
    /// ownership transfer).
    pub(crate) fn handle(&self, id: FutureId) -> Option<SharedCore> {
        self.entries.get(&id).map(|entry| entry.handle.clone())
    }

    /// Retained futures in arm order.
    pub(crate) fn armed_order(&self) -> &[FutureId] {
        &self.order
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
