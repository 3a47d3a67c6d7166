//! Pluggable completion sources for the reactor's idle phase.
//!
//! Real deployments complete operations from an I/O backend the reactor
//! blocks on; this crate keeps that backend behind [`EventSource`], a
//! capability trait with default no-op methods. Implementations are
//! selected by explicit registration ([`crate::reactor::Reactor::register_source`]),
//! not discovered.
//!
//! The reactor polls sources only when a turn made no progress: the first
//! active source receives the park budget and may block for up to that
//! long; remaining sources get a zero-budget poll. `Interrupted` poll
//! errors are retried transparently; any other I/O error is fatal and
//! surfaces at the blocking call site.
//!
//! Sources must not call back into the reactor from `poll`; they complete
//! operations through engine handles (e.g. a
//! [`Fulfiller`](crate::engine::oneshot::Fulfiller)) and return how many
//! they completed.

use core::fmt;
use std::io;
use std::time::Duration;

use crate::error::{Error, ErrorKind};

/// A backend that can complete pending operations while the reactor is
/// idle.
pub trait EventSource: fmt::Debug {
    /// Label used in logs.
    fn label(&self) -> &str {
        "event-source"
    }

    /// Returns `true` while the source may still complete operations.
    ///
    /// Inactive sources are skipped and do not keep blocking waits alive.
    fn is_active(&self) -> bool {
        false
    }

    /// Polls the source, blocking for at most `budget` (`None` = caller
    /// imposed no bound). Returns the number of operations completed.
    ///
    /// # Errors
    ///
    /// I/O errors from the backend; `Interrupted` is retried by the
    /// caller.
    fn poll(&mut self, budget: Option<Duration>) -> io::Result<usize> {
        let _ = budget;
        Ok(0)
    }
}

/// Explicit registry of event source implementors.
#[derive(Debug, Default)]
pub(crate) struct SourceRegistry {
    sources: Vec<Box<dyn EventSource>>,
}

impl SourceRegistry {
    pub(crate) fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    pub(crate) fn register(&mut self, source: Box<dyn EventSource>) {
        tracing::debug!(source = source.label(), "event source registered");
        self.sources.push(source);
    }

    pub(crate) fn any_active(&self) -> bool {
        self.sources.iter().any(|s| s.is_active())
    }

    /// Removes all sources so they can be polled without holding the
    /// reactor borrow.
    pub(crate) fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    /// Puts polled sources back, keeping sources registered meanwhile.
    pub(crate) fn absorb(&mut self, mut polled: Self) {
        polled.sources.append(&mut self.sources);
        self.sources = polled.sources;
    }

    /// Polls every active source once; the first receives the budget,
    /// the rest a zero-budget look.
    pub(crate) fn poll_all(&mut self, budget: Option<Duration>) -> Result<usize, Error> {
        let mut completed = 0;
        let mut budget = budget;
        for source in &mut self.sources {
            if !source.is_active() {
                continue;
            }
            loop {
                match source.poll(budget) {
                    Ok(n) => {
                        completed += n;
                        break;
                    }
                    // Retried transparently rather than surfaced as a
                    // spurious error.
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                        tracing::trace!(source = source.label(), "poll interrupted; retrying");
                    }
                    Err(e) => {
                        return Err(Error::new(ErrorKind::EngineFailure)
                            .with_message(format!("event source {:?} failed", source.label()))
                            .with_source(e));
                    }
                }
            }
            budget = Some(Duration::ZERO);
        }
        Ok(completed)
    }
}
