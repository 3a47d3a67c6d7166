//! Engine seam: the pending-operation interface consumed by futures.
//!
//! The crate does not implement an RPC engine; it consumes one through the
//! [`Operation`] trait. A future owns exactly one boxed operation handle
//! and derives its `Pending`/`Ready`/`Failed` state from it. The handle is
//! released when the last strong reference to the owning future core
//! drops.
//!
//! Engine implementations report state and produce results; arming
//! continuations and blocking waits are reactor-side concerns layered on
//! top of this interface. [`oneshot`] ships a reference implementation
//! completed through an explicit [`Fulfiller`](oneshot::Fulfiller) handle.

use core::fmt;

use crate::error::Error;
use crate::payload::Payload;

pub mod oneshot;

/// Completion state of a pending operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpState {
    /// Not yet complete.
    Pending,
    /// Completed successfully.
    Ready,
    /// Completed with a failure.
    Failed,
}

impl OpState {
    /// Returns `true` for either terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// A pending asynchronous operation owned by a future.
///
/// Implementations must keep `state` consistent with `result`: a `Ready`
/// operation produces `Ok`, a `Failed` operation produces `Err`, and
/// `reset` returns the operation to `Pending` with no stored result.
pub trait Operation: fmt::Debug {
    /// Non-blocking completion probe.
    fn state(&self) -> OpState;

    /// Produces the operation's outcome.
    ///
    /// `Ok(Some(_))` is a payload, `Ok(None)` is a completed operation
    /// that carried no payload (distinct from a valid empty payload).
    ///
    /// Callers only invoke this once `state()` is terminal; a pending
    /// operation may report `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns the failure recorded for a `Failed` operation, with the
    /// engine's message when one is available.
    fn result(&mut self) -> Result<Option<Payload>, Error>;

    /// Records an externally imposed failure (deadline expiry, dispatch
    /// panic policy). Overwrites any prior outcome.
    fn fail(&mut self, error: Error);

    /// Re-arms the operation back to `Pending`, clearing any stored
    /// result, so the handle can be reused for another round.
    fn reset(&mut self);
}
