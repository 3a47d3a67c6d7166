//! Single-threaded event loop driving completion dispatch and deadlines.
//!
//! The reactor owns the three pieces of loop state the future layer
//! relies on:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Reactor                              │
//! │  ┌────────────────┐  ┌─────────────┐  ┌───────────────────┐  │
//! │  │ LivenessRegistry│  │ TimerQueue  │  │  SourceRegistry   │  │
//! │  │ (armed futures, │  │ (armed      │  │ (pluggable idle   │  │
//! │  │  keep-alive)    │  │  deadlines) │  │  completion poll) │  │
//! │  └────────────────┘  └─────────────┘  └───────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Turn structure
//!
//! Each turn fires due deadlines, dispatches ready continuations in arm
//! order (bounded by `max_dispatch_per_turn`), and parks only when
//! neither produced progress: sleeping until the next deadline, deferring
//! to registered event sources, or failing with `Stalled` when nothing
//! can ever complete.
//!
//! # Threading
//!
//! One thread, cooperative. The handle is `!Send`; continuations run
//! synchronously on the loop, interleaved with timer expiry, and nothing
//! here is safe for cross-thread mutation. `stop` takes effect between
//! turns.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

use crate::config::ReactorConfig;
use crate::engine::oneshot::{self, Fulfiller};
use crate::error::{Error, ErrorKind};
use crate::future::{Future, FutureId, SharedCore};

pub(crate) mod dispatch;
pub(crate) mod liveness;
pub mod source;
pub(crate) mod timer;

pub use source::EventSource;

use liveness::LivenessRegistry;
use source::SourceRegistry;
use timer::TimerQueue;

/// Loop counters exposed for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReactorStats {
    /// Turns executed.
    pub turns: u64,
    /// Continuations dispatched.
    pub dispatched: u64,
    /// Armed deadlines that expired and failed their operation.
    pub timeouts_fired: u64,
}

pub(crate) struct ReactorShared {
    state: RefCell<ReactorState>,
}

struct ReactorState {
    liveness: LivenessRegistry,
    timers: TimerQueue,
    sources: SourceRegistry,
    config: ReactorConfig,
    stopped: bool,
    stats: ReactorStats,
}

pub(crate) type WeakReactor = Weak<ReactorShared>;

/// Handle to the event loop.
///
/// Clones share the same loop state.
#[derive(Clone)]
pub struct Reactor {
    shared: Rc<ReactorShared>,
}

impl Default for Reactor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Reactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.shared.state.try_borrow() {
            Ok(state) => f
                .debug_struct("Reactor")
                .field("retained", &state.liveness.len())
                .field("timers", &state.timers.len())
                .field("stats", &state.stats)
                .finish(),
            Err(_) => f.write_str("Reactor { <borrowed> }"),
        }
    }
}

impl Reactor {
    /// Creates a reactor with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ReactorConfig::default())
    }

    /// Creates a reactor with the given configuration.
    #[must_use]
    pub fn with_config(config: ReactorConfig) -> Self {
        Self {
            shared: Rc::new(ReactorShared {
                state: RefCell::new(ReactorState {
                    liveness: LivenessRegistry::new(),
                    timers: TimerQueue::new(),
                    sources: SourceRegistry::new(),
                    config,
                    stopped: false,
                    stats: ReactorStats::default(),
                }),
            }),
        }
    }

    /// Creates a future for a fresh oneshot operation bound to this
    /// reactor, returning the fulfiller half for whoever learns the
    /// outcome.
    #[must_use]
    pub fn oneshot(&self) -> (Future, Fulfiller) {
        let (op, fulfiller) = oneshot::operation();
        (Future::with_reactor(self, Box::new(op)), fulfiller)
    }

    /// Registers an idle completion source.
    pub fn register_source(&self, source: Box<dyn EventSource>) {
        self.shared.state.borrow_mut().sources.register(source);
    }

    /// Returns `true` if both handles refer to the same loop.
    #[must_use]
    pub fn is_same(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }

    /// Returns a copy of the active configuration.
    #[must_use]
    pub fn config(&self) -> ReactorConfig {
        self.shared.state.borrow().config.clone()
    }

    /// Returns loop counters.
    #[must_use]
    pub fn stats(&self) -> ReactorStats {
        self.shared.state.borrow().stats
    }

    /// Number of futures currently kept alive by the liveness registry.
    #[must_use]
    pub fn retained_futures(&self) -> usize {
        self.shared.state.borrow().liveness.len()
    }

    /// Returns `true` while a continuation is outstanding for the future.
    #[must_use]
    pub fn is_retained(&self, id: FutureId) -> bool {
        self.shared.state.borrow().liveness.is_retained(id)
    }

    /// Pending-callback count for a future, if retained.
    #[must_use]
    pub fn retained_count(&self, id: FutureId) -> Option<u32> {
        self.shared.state.borrow().liveness.count(id)
    }

    /// Requests that `run` return after the current turn.
    pub fn stop(&self) {
        self.shared.state.borrow_mut().stopped = true;
    }

    /// Runs the loop until `stop` is called or no armed work remains
    /// (no retained futures, no pending deadlines, no active sources).
    ///
    /// # Errors
    ///
    /// `Stalled` when armed work remains that nothing can ever complete;
    /// `EngineFailure` when an event source fails fatally.
    pub fn run(&self) -> Result<(), Error> {
        self.shared.state.borrow_mut().stopped = false;
        loop {
            {
                let state = self.shared.state.borrow();
                if state.stopped {
                    tracing::debug!("reactor stopped");
                    return Ok(());
                }
                let quiescent = state.liveness.is_empty()
                    && state.timers.is_empty()
                    && !state.sources.any_active();
                if quiescent {
                    tracing::debug!("reactor quiescent");
                    return Ok(());
                }
            }
            self.turn(None)?;
        }
    }

    /// Executes a single turn without parking.
    ///
    /// Returns the amount of progress made (deadlines fired, sources
    /// completed, continuations dispatched).
    ///
    /// # Errors
    ///
    /// `EngineFailure` when an event source fails fatally.
    pub fn run_once(&self) -> Result<usize, Error> {
        self.turn(Some(Duration::ZERO))
    }

    pub(crate) fn downgrade(&self) -> WeakReactor {
        Rc::downgrade(&self.shared)
    }

    pub(crate) fn from_shared(shared: Rc<ReactorShared>) -> Self {
        Self { shared }
    }

    pub(crate) fn retain(&self, id: FutureId, handle: SharedCore) -> u32 {
        self.shared.state.borrow_mut().liveness.retain(id, handle)
    }

    pub(crate) fn release(&self, id: FutureId) -> Result<u32, Error> {
        self.shared.state.borrow_mut().liveness.release(id)
    }

    pub(crate) fn schedule_deadline(&self, id: FutureId, generation: u32, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        self.shared
            .state
            .borrow_mut()
            .timers
            .schedule(deadline, id, generation);
    }

    /// Drives the loop until the target operation leaves `Pending` or the
    /// deadline elapses.
    pub(crate) fn drive(&self, core: &SharedCore, timeout: Option<Duration>) -> Result<(), Error> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if core.borrow().op.state().is_terminal() {
                return Ok(());
            }
            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(Error::new(ErrorKind::Timeout)
                            .with_message("wait deadline elapsed with the operation still pending"));
                    }
                    self.turn(Some(deadline - now))?;
                }
                None => {
                    self.turn(None)?;
                }
            }
        }
    }

    /// One loop turn: fire deadlines, dispatch ready continuations, and
    /// park only if neither produced progress.
    fn turn(&self, max_park: Option<Duration>) -> Result<usize, Error> {
        self.shared.state.borrow_mut().stats.turns += 1;
        let fired = self.fire_due_timers();
        let dispatched = self.dispatch_ready();
        let progress = fired + dispatched;
        if progress > 0 {
            return Ok(progress);
        }
        self.idle_wait(max_park)
    }

    fn fire_due_timers(&self) -> usize {
        let now = Instant::now();
        let due = self.shared.state.borrow_mut().timers.pop_due(now);
        if due.is_empty() {
            return 0;
        }
        let mut fired = 0;
        for entry in due {
            let handle = self.shared.state.borrow().liveness.handle(entry.future);
            let Some(handle) = handle else {
                continue;
            };
            let mut core = handle.borrow_mut();
            // A generation mismatch means the deadline belongs to a
            // previous arm cycle; an already terminal operation needs no
            // timeout.
            if core.arm_generation != entry.generation || core.op.state().is_terminal() {
                continue;
            }
            core.op.fail(
                Error::new(ErrorKind::Timeout)
                    .with_message("armed deadline elapsed before completion"),
            );
            drop(core);
            fired += 1;
            tracing::debug!(future = %entry.future, "armed deadline elapsed; operation failed");
        }
        if fired > 0 {
            self.shared.state.borrow_mut().stats.timeouts_fired += fired as u64;
        }
        fired
    }

    fn dispatch_ready(&self) -> usize {
        let (candidates, budget) = {
            let state = self.shared.state.borrow();
            let budget = match state.config.max_dispatch_per_turn {
                0 => usize::MAX,
                n => n,
            };
            (state.liveness.armed_order().to_vec(), budget)
        };
        let mut dispatched = 0;
        for id in candidates {
            if dispatched >= budget {
                break;
            }
            let handle = self.shared.state.borrow().liveness.handle(id);
            let Some(handle) = handle else {
                continue;
            };
            let ready = {
                let core = handle.borrow();
                core.continuation.is_some()
                    && core.op.state().is_terminal()
                    && core.arm_generation != core.dispatched_generation
            };
            if !ready {
                continue;
            }
            dispatch::run_continuation(self, id, &handle);
            dispatched += 1;
        }
        if dispatched > 0 {
            self.shared.state.borrow_mut().stats.dispatched += dispatched as u64;
        }
        dispatched
    }

    /// Parks the idle loop: defer to event sources, sleep until the next
    /// deadline, or report `Stalled` when nothing can ever complete.
    fn idle_wait(&self, max_park: Option<Duration>) -> Result<usize, Error> {
        let (next_deadline, any_active, park_interval) = {
            let state = self.shared.state.borrow();
            (
                state.timers.next_deadline(),
                state.sources.any_active(),
                state.config.park_interval,
            )
        };
        let now = Instant::now();
        let until_deadline = next_deadline.map(|d| d.saturating_duration_since(now));
        let budget = match (until_deadline, max_park) {
            (Some(t), Some(p)) => Some(t.min(p)),
            (Some(t), None) => Some(t),
            (None, Some(p)) => Some(p),
            (None, None) => None,
        };
        if any_active {
            // Sources park in their own poll; unbounded waits are capped
            // at the configured interval so new deadlines get a look.
            let capped = budget.map_or(park_interval, |b| b.min(park_interval));
            return self.poll_sources(Some(capped));
        }
        match budget {
            Some(park) => {
                if !park.is_zero() {
                    std::thread::sleep(park);
                }
                Ok(0)
            }
            None => Err(Error::new(ErrorKind::Stalled).with_message(
                "no pending deadlines or active event sources; pending operations can never complete",
            )),
        }
    }

    fn poll_sources(&self, budget: Option<Duration>) -> Result<usize, Error> {
        let mut taken = self.shared.state.borrow_mut().sources.take();
        let result = taken.poll_all(budget);
        self.shared.state.borrow_mut().sources.absorb(taken);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiescent_run_returns_immediately() {
        let reactor = Reactor::new();
        reactor.run().unwrap();
        assert_eq!(reactor.retained_futures(), 0);
    }

    #[test]
    fn run_once_without_work_makes_no_progress() {
        let reactor = Reactor::new();
        assert_eq!(reactor.run_once().unwrap(), 0);
        assert_eq!(reactor.stats().turns, 1);
        assert_eq!(reactor.stats().dispatched, 0);
    }

    #[test]
    fn handles_share_state() {
        let reactor = Reactor::new();
        let clone = reactor.clone();
        assert!(reactor.is_same(&clone));
        assert!(!reactor.is_same(&Reactor::new()));

        clone.run_once().unwrap();
        assert_eq!(reactor.stats().turns, 1);
    }

    #[test]
    fn oneshot_future_is_bound() {
        let reactor = Reactor::new();
        let (future, fulfiller) = reactor.oneshot();
        assert!(future.reactor().is_some_and(|r| r.is_same(&reactor)));
        assert!(fulfiller.is_attached());
    }
}
