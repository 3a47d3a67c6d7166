//! Completion future: handle to a pending operation with explicit
//! `Pending`/`Ready`/`Failed` states.
//!
//! A future wraps exactly one engine operation handle and supports two
//! consumption styles:
//!
//! - **non-blocking**: [`Future::then`] / [`Future::then_within`] arm a
//!   continuation that the reactor dispatches on completion; the arming
//!   call returns immediately and the future is kept alive by the
//!   reactor's liveness registry until every armed round has fired
//! - **blocking**: [`Future::wait_for`] / [`Future::get`] drive the
//!   reactor until the operation completes or a deadline elapses
//!
//! [`Future::reset`] re-arms the operation for another round (streaming
//! responses), incrementing the liveness count when a continuation is
//! outstanding so the future also survives the next round.
//!
//! The reactor back-reference is resolved lazily: a future may exist
//! unbound ([`Future::reactor`] returns `None`, a valid state rather
//! than an error) until bound explicitly or adopted through a composite.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::engine::{OpState, Operation};
use crate::error::{Error, ErrorKind};
use crate::payload::Payload;
use crate::reactor::{Reactor, WeakReactor};

pub mod wait_all;

/// Process-unique identity of a future.
///
/// Used as the dispatch token and the liveness registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FutureId(u64);

impl FutureId {
    pub(crate) const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw numeric identity.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for FutureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "future-{}", self.0)
    }
}

fn next_future_id() -> FutureId {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    FutureId(NEXT.fetch_add(1, Ordering::Relaxed))
}

pub(crate) type Continuation = Box<dyn FnMut(&Future)>;
pub(crate) type SharedCore = Rc<RefCell<FutureCore>>;

pub(crate) struct FutureCore {
    pub(crate) id: FutureId,
    /// Exclusively owned operation handle; released when the last strong
    /// handle to this core drops.
    pub(crate) op: Box<dyn Operation>,
    pub(crate) continuation: Option<Continuation>,
    pub(crate) reactor: Option<WeakReactor>,
    /// Bumped on every arm and re-arm; deadlines from stale cycles are
    /// discarded on generation mismatch.
    pub(crate) arm_generation: u32,
    /// Arm cycle the continuation last fired for. Dispatch is
    /// edge-triggered on `arm_generation != dispatched_generation`, so a
    /// terminal operation fires its continuation once per armed round,
    /// not once per observation.
    pub(crate) dispatched_generation: u32,
    /// Deadline supplied to the current arm; reused when `reset`
    /// re-arms the round.
    pub(crate) armed_timeout: Option<Duration>,
}

impl fmt::Debug for FutureCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FutureCore")
            .field("id", &self.id)
            .field("state", &self.op.state())
            .field("armed", &self.continuation.is_some())
            .field("arm_generation", &self.arm_generation)
            .finish_non_exhaustive()
    }
}

/// Handle to a pending asynchronous result.
#[must_use = "a future does nothing until armed with a continuation or waited on"]
pub struct Future {
    core: SharedCore,
}

impl fmt::Debug for Future {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.core.try_borrow() {
            Ok(core) => core.fmt(f),
            Err(_) => f.write_str("Future { <borrowed> }"),
        }
    }
}

impl Future {
    /// Wraps an operation handle in a new, unbound future.
    pub fn new(op: Box<dyn Operation>) -> Self {
        Self {
            core: Rc::new(RefCell::new(FutureCore {
                id: next_future_id(),
                op,
                continuation: None,
                reactor: None,
                arm_generation: 0,
                dispatched_generation: 0,
                armed_timeout: None,
            })),
        }
    }

    /// Wraps an operation handle in a future bound to `reactor`.
    pub fn with_reactor(reactor: &Reactor, op: Box<dyn Operation>) -> Self {
        let future = Self::new(op);
        future.core.borrow_mut().reactor = Some(reactor.downgrade());
        future
    }

    /// Returns this future's identity.
    #[must_use]
    pub fn id(&self) -> FutureId {
        self.core.borrow().id
    }

    /// Returns the current completion state.
    #[must_use]
    pub fn state(&self) -> OpState {
        self.core.borrow().op.state()
    }

    /// Non-blocking readiness probe; `true` for both terminal states.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state().is_terminal()
    }

    /// Returns the bound reactor, or `None` for an unbound future.
    ///
    /// `None` is a valid state (the future has simply not been
    /// associated with a loop yet), not an error.
    #[must_use]
    pub fn reactor(&self) -> Option<Reactor> {
        self.core
            .borrow()
            .reactor
            .as_ref()
            .and_then(std::rc::Weak::upgrade)
            .map(Reactor::from_shared)
    }

    /// Binds the future to a reactor.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when rebinding to a different reactor while a
    /// continuation is outstanding; the liveness entry lives on the
    /// original loop and rebinding would orphan it.
    pub fn bind(&self, reactor: &Reactor) -> Result<&Self, Error> {
        {
            let core = self.core.borrow();
            let current = core
                .reactor
                .as_ref()
                .and_then(std::rc::Weak::upgrade)
                .map(Reactor::from_shared);
            if let Some(current) = current {
                if !current.is_same(reactor) && core.continuation.is_some() {
                    return Err(Error::new(ErrorKind::InvalidArgument).with_message(
                        "cannot rebind a future with an outstanding continuation",
                    ));
                }
            }
        }
        self.core.borrow_mut().reactor = Some(reactor.downgrade());
        Ok(self)
    }

    /// Arms `callback` to run when the operation completes.
    ///
    /// Non-blocking; the continuation runs later, synchronously on the
    /// reactor. Returns `&Self` so calls chain
    /// (`future.then(cb)?.wait_for(None)?`). Arming inserts a liveness
    /// registry entry with count 1, so the future survives even if the
    /// caller drops every other handle.
    ///
    /// # Errors
    ///
    /// `AlreadyRegistered` when a continuation is already outstanding
    /// (no silent overwrite); `NoReactor` when unbound.
    pub fn then<F>(&self, callback: F) -> Result<&Self, Error>
    where
        F: FnMut(&Future) + 'static,
    {
        self.arm(None, Box::new(callback))?;
        Ok(self)
    }

    /// Like [`then`](Self::then), with a deadline: if the reactor has not
    /// delivered completion within `timeout`, the operation fails with a
    /// `Timeout`-kind error and the continuation fires with the future in
    /// `Failed` state.
    ///
    /// # Errors
    ///
    /// `AlreadyRegistered` when a continuation is already outstanding;
    /// `NoReactor` when unbound.
    pub fn then_within<F>(&self, timeout: Duration, callback: F) -> Result<&Self, Error>
    where
        F: FnMut(&Future) + 'static,
    {
        self.arm(Some(timeout), Box::new(callback))?;
        Ok(self)
    }

    fn arm(&self, timeout: Option<Duration>, callback: Continuation) -> Result<(), Error> {
        let reactor = self.reactor().ok_or_else(|| {
            Error::new(ErrorKind::NoReactor).with_message("continuations require a bound reactor")
        })?;
        let id = self.id();
        if reactor.is_retained(id) {
            return Err(Error::new(ErrorKind::AlreadyRegistered));
        }
        let generation = {
            let mut core = self.core.borrow_mut();
            core.continuation = Some(callback);
            core.armed_timeout = timeout;
            core.arm_generation = core.arm_generation.wrapping_add(1);
            core.arm_generation
        };
        reactor.retain(id, Rc::clone(&self.core));
        if let Some(timeout) = timeout {
            reactor.schedule_deadline(id, generation, timeout);
        }
        tracing::debug!(future = %id, timeout = ?timeout, "continuation armed");
        Ok(())
    }

    /// Re-arms the operation back to `Pending`, clearing any stored
    /// result, so the handle can be reused for the next round of a
    /// streaming exchange.
    ///
    /// When a continuation is outstanding, the liveness count is
    /// incremented (another completion is now also expected) and the
    /// arm deadline, if any, restarts for the new round.
    pub fn reset(&self) {
        let (id, generation, timeout, reactor) = {
            let mut core = self.core.borrow_mut();
            core.op.reset();
            core.arm_generation = core.arm_generation.wrapping_add(1);
            (
                core.id,
                core.arm_generation,
                core.armed_timeout,
                core.reactor.clone(),
            )
        };
        let Some(reactor) = reactor.and_then(|weak| weak.upgrade()).map(Reactor::from_shared)
        else {
            return;
        };
        if reactor.is_retained(id) {
            reactor.retain(id, Rc::clone(&self.core));
            if let Some(timeout) = timeout {
                reactor.schedule_deadline(id, generation, timeout);
            }
            tracing::debug!(future = %id, "re-armed with continuation outstanding");
        }
    }

    /// Blocks until the operation completes or `timeout` elapses, driving
    /// the reactor. `None` means no deadline.
    ///
    /// An already terminal future returns immediately. A `wait_for`
    /// deadline fails only the blocking call; the operation itself stays
    /// `Pending` (armed deadlines passed to
    /// [`then_within`](Self::then_within) are what fail the operation).
    ///
    /// # Errors
    ///
    /// `Timeout` when the deadline elapses first; `NoReactor` when
    /// pending and unbound; `Stalled` when the reactor can never
    /// complete the operation.
    pub fn wait_for(&self, timeout: Option<Duration>) -> Result<&Self, Error> {
        if self.is_ready() {
            return Ok(self);
        }
        let reactor = self.reactor().ok_or_else(|| {
            Error::new(ErrorKind::NoReactor).with_message("blocking waits require a bound reactor")
        })?;
        reactor.drive(&self.core, timeout)?;
        Ok(self)
    }

    /// Blocks until completion and produces the operation's result.
    ///
    /// # Errors
    ///
    /// The engine's recorded failure (including its message when
    /// available) for a `Failed` operation; `NoPayload` when the engine
    /// reports an absent payload (a *valid empty* payload succeeds);
    /// plus everything [`wait_for`](Self::wait_for) can report.
    pub fn get(&self) -> Result<Payload, Error> {
        self.wait_for(None)?;
        let mut core = self.core.borrow_mut();
        match core.op.result()? {
            Some(payload) => Ok(payload),
            None => Err(Error::new(ErrorKind::NoPayload)),
        }
    }

    pub(crate) fn from_core(core: SharedCore) -> Self {
        Self { core }
    }

    pub(crate) fn core(&self) -> &SharedCore {
        &self.core
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::oneshot;

    fn unbound_pending() -> (Future, oneshot::Fulfiller) {
        let (op, fulfiller) = oneshot::operation();
        (Future::new(Box::new(op)), fulfiller)
    }

    #[test]
    fn unbound_reactor_is_none_not_an_error() {
        let (future, _fulfiller) = unbound_pending();
        assert!(future.reactor().is_none());
        assert_eq!(future.state(), OpState::Pending);
        assert!(!future.is_ready());
    }

    #[test]
    fn blocking_and_arming_require_a_reactor() {
        let (future, _fulfiller) = unbound_pending();
        let err = future.then(|_| {}).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoReactor);
        let err = future.wait_for(None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoReactor);
    }

    #[test]
    fn terminal_future_needs_no_reactor_to_get() {
        let (future, fulfiller) = unbound_pending();
        fulfiller.fulfill("done early");
        assert!(future.is_ready());
        // wait_for and get return immediately without a loop to drive.
        future.wait_for(None).unwrap();
        assert_eq!(future.get().unwrap().as_bytes(), b"done early");
    }

    #[test]
    fn bind_resolves_the_back_reference() {
        let reactor = Reactor::new();
        let (future, _fulfiller) = unbound_pending();
        future.bind(&reactor).unwrap();
        assert!(future.reactor().is_some_and(|r| r.is_same(&reactor)));
    }

    #[test]
    fn rebinding_with_outstanding_continuation_is_rejected() {
        let reactor_a = Reactor::new();
        let reactor_b = Reactor::new();
        let (future, _fulfiller) = reactor_a.oneshot();
        future.then(|_| {}).unwrap();

        let err = future.bind(&reactor_b).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        // Same-loop rebinding stays legal.
        future.bind(&reactor_a).unwrap();
    }

    #[test]
    fn double_then_is_already_registered() {
        let reactor = Reactor::new();
        let (future, _fulfiller) = reactor.oneshot();
        future.then(|_| {}).unwrap();
        let err = future.then(|_| {}).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyRegistered);
    }

    #[test]
    fn get_reports_engine_failure_message() {
        let reactor = Reactor::new();
        let (future, fulfiller) = reactor.oneshot();
        fulfiller.fail(Error::new(ErrorKind::EngineFailure).with_message("connection refused"));
        let err = future.get().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EngineFailure);
        assert_eq!(err.message(), Some("connection refused"));
    }

    #[test]
    fn get_distinguishes_absent_from_empty_payload() {
        let reactor = Reactor::new();

        let (absent, fulfiller) = reactor.oneshot();
        fulfiller.fulfill_no_payload();
        assert_eq!(absent.get().unwrap_err().kind(), ErrorKind::NoPayload);

        let (empty, fulfiller) = reactor.oneshot();
        fulfiller.fulfill(Payload::empty());
        assert!(empty.get().unwrap().is_empty());
    }

    #[test]
    fn ids_are_unique() {
        let (a, _fa) = unbound_pending();
        let (b, _fb) = unbound_pending();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id().to_string(), format!("future-{}", a.id().as_u64()));
    }
}
