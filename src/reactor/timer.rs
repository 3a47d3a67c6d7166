//! Deadline queue for armed continuation timeouts.
//!
//! A min-heap of `(deadline, sequence)` entries. Entries are never removed
//! eagerly on disarm; each carries the arm generation it was scheduled
//! under, and the reactor discards entries whose generation no longer
//! matches the future's current arm cycle when they fire. The sequence
//! number keeps expiry order deterministic for equal deadlines.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Instant;

use smallvec::SmallVec;

use crate::future::FutureId;

/// A scheduled deadline for one arm cycle of a future.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TimerEntry {
    pub(crate) deadline: Instant,
    pub(crate) future: FutureId,
    pub(crate) generation: u32,
    seq: u64,
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.deadline
            .cmp(&other.deadline)
            .then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap of pending deadlines.
#[derive(Debug, Default)]
pub(crate) struct TimerQueue {
    heap: BinaryHeap<Reverse<TimerEntry>>,
    seq: u64,
}

impl TimerQueue {
    pub(crate) fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            seq: 0,
        }
    }

    /// Schedules a deadline for the given future and arm generation.
    pub(crate) fn schedule(&mut self, deadline: Instant, future: FutureId, generation: u32) {
        let entry = TimerEntry {
            deadline,
            future,
            generation,
            seq: self.seq,
        };
        self.seq += 1;
        self.heap.push(Reverse(entry));
    }

    /// Returns the earliest pending deadline.
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(entry)| entry.deadline)
    }

    /// Removes and returns every entry due at or before `now`, in expiry
    /// order.
    pub(crate) fn pop_due(&mut self, now: Instant) -> SmallVec<[TimerEntry; 4]> {
        let mut due = SmallVec::new();
        while let Some(&Reverse(entry)) = self.heap.peek() {
            if entry.deadline > now {
                break;
            }
            self.heap.pop();
            due.push(entry);
        }
        due
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
