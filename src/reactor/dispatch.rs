//! Continuation dispatch.
//!
//! Runs inside a reactor turn, once per armed completion. The sequence is
//! fixed:
//!
//! 1. resolve the token back to the owning future through the liveness
//!    registry (identity lookup, not ownership transfer)
//! 2. defensively take the continuation; a disarmed future means a stale
//!    readiness report from a prior arm cycle and is skipped
//! 3. invoke the continuation with a future facade as receiver
//! 4. release the registry entry; this step is unconditional, even when
//!    the continuation panicked, so the entry can never leak
//! 5. if the entry survived (the continuation re-armed via `reset`),
//!    restore the continuation for the next round
//!
//! A continuation panic never crosses the reactor loop: it is caught
//! here, logged, and recorded on the future as a
//! `ContinuationPanicked` failure.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use crate::error::{Error, ErrorKind};
use crate::future::{Future, FutureId, SharedCore};
use crate::reactor::Reactor;

pub(crate) fn run_continuation(reactor: &Reactor, id: FutureId, handle: &SharedCore) {
    let taken = {
        let mut core = handle.borrow_mut();
        let taken = core.continuation.take();
        if taken.is_some() {
            // This arm cycle is now consumed; a restored continuation
            // only fires again after a re-arm.
            core.dispatched_generation = core.arm_generation;
        }
        taken
    };
    let Some(mut continuation) = taken else {
        tracing::debug!(future = %id, "stale readiness for a disarmed future; skipping dispatch");
        return;
    };

    let future = Future::from_core(Rc::clone(handle));
    let outcome = catch_unwind(AssertUnwindSafe(|| continuation(&future)));

    // The release must happen whether or not the continuation unwound;
    // leaking the entry would pin the future forever.
    let remaining = match reactor.release(id) {
        Ok(remaining) => remaining,
        Err(err) => {
            tracing::error!(future = %id, error = %err, "liveness release failed during dispatch");
            debug_assert!(false, "liveness release failed during dispatch: {err}");
            0
        }
    };
    if remaining > 0 {
        handle.borrow_mut().continuation = Some(continuation);
    }

    match outcome {
        Ok(()) => {
            tracing::trace!(future = %id, remaining, "continuation dispatched");
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::error!(
                future = %id,
                panic = %message,
                "continuation panicked; recording the failure on the future"
            );
            handle
                .borrow_mut()
                .op
                .fail(Error::new(ErrorKind::ContinuationPanicked).with_message(message));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
