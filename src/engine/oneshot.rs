//! Reference operation completed through an explicit fulfiller handle.
//!
//! [`operation`] returns an operation/fulfiller pair sharing one result
//! slot. The operation side is boxed into a future; the fulfiller side
//! stays with whatever code learns the outcome (a protocol decoder, a
//! timer callback, a test). The fulfiller holds only a weak reference, so
//! dropping the future releases the slot and later fulfilment attempts
//! report detachment instead of keeping dead state alive.
//!
//! After [`Operation::reset`] the same pair is reusable for the next
//! round, which is what streaming responses rely on.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::engine::{OpState, Operation};
use crate::error::Error;
use crate::payload::Payload;

#[derive(Debug)]
enum Slot {
    Pending,
    Ready(Option<Payload>),
    Failed(Error),
}

/// Operation half of a [`operation`] pair.
#[derive(Debug)]
pub struct OneshotOp {
    slot: Rc<RefCell<Slot>>,
}

/// Completion half of a [`operation`] pair.
///
/// Cloneable; all clones fulfil the same slot. Fulfilment methods return
/// `false` when the operation side is gone or already terminal.
#[derive(Debug, Clone)]
pub struct Fulfiller {
    slot: Weak<RefCell<Slot>>,
}

/// Creates a connected operation/fulfiller pair.
#[must_use]
pub fn operation() -> (OneshotOp, Fulfiller) {
    let slot = Rc::new(RefCell::new(Slot::Pending));
    let fulfiller = Fulfiller {
        slot: Rc::downgrade(&slot),
    };
    (OneshotOp { slot }, fulfiller)
}

impl Fulfiller {
    /// Returns `true` while the operation side is still alive.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.slot.strong_count() > 0
    }

    /// Completes the operation with a payload.
    pub fn fulfill(&self, payload: impl Into<Payload>) -> bool {
        self.transition(Slot::Ready(Some(payload.into())))
    }

    /// Completes the operation without a payload (absent, not empty).
    pub fn fulfill_no_payload(&self) -> bool {
        self.transition(Slot::Ready(None))
    }

    /// Completes the operation with a failure.
    pub fn fail(&self, error: Error) -> bool {
        self.transition(Slot::Failed(error))
    }

    fn transition(&self, next: Slot) -> bool {
        let Some(slot) = self.slot.upgrade() else {
            return false;
        };
        let mut slot = slot.borrow_mut();
        if !matches!(*slot, Slot::Pending) {
            return false;
        }
        *slot = next;
        true
    }
}

impl Operation for OneshotOp {
    fn state(&self) -> OpState {
        match *self.slot.borrow() {
            Slot::Pending => OpState::Pending,
            Slot::Ready(_) => OpState::Ready,
            Slot::Failed(_) => OpState::Failed,
        }
    }

    fn result(&mut self) -> Result<Option<Payload>, Error> {
        match &*self.slot.borrow() {
            Slot::Pending => Ok(None),
            Slot::Ready(payload) => Ok(payload.clone()),
            Slot::Failed(error) => Err(error.clone()),
        }
    }

    fn fail(&mut self, error: Error) {
        *self.slot.borrow_mut() = Slot::Failed(error);
    }

    fn reset(&mut self) {
        *self.slot.borrow_mut() = Slot::Pending;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn fulfill_with_payload() {
        let (mut op, fulfiller) = operation();
        assert_eq!(op.state(), OpState::Pending);

        assert!(fulfiller.fulfill("pong"));
        assert_eq!(op.state(), OpState::Ready);
        let payload = op.result().unwrap().unwrap();
        assert_eq!(payload.as_bytes(), b"pong");

        // Result is retained, not consumed.
        assert!(op.result().unwrap().is_some());
    }

    #[test]
    fn fulfill_no_payload_is_absent() {
        let (mut op, fulfiller) = operation();
        assert!(fulfiller.fulfill_no_payload());
        assert_eq!(op.state(), OpState::Ready);
        assert!(op.result().unwrap().is_none());
    }

    #[test]
    fn fail_records_error() {
        let (mut op, fulfiller) = operation();
        assert!(fulfiller.fail(Error::new(ErrorKind::EngineFailure).with_message("connection refused")));
        assert_eq!(op.state(), OpState::Failed);
        let err = op.result().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EngineFailure);
        assert_eq!(err.message(), Some("connection refused"));
    }

    #[test]
    fn second_fulfilment_is_rejected() {
        let (op, fulfiller) = operation();
        assert!(fulfiller.fulfill("first"));
        assert!(!fulfiller.fulfill("second"));
        assert!(!fulfiller.fail(Error::new(ErrorKind::EngineFailure)));
        drop(op);
    }

    #[test]
    fn reset_rearms_for_streaming() {
        let (mut op, fulfiller) = operation();
        assert!(fulfiller.fulfill("round one"));
        assert_eq!(op.state(), OpState::Ready);

        op.reset();
        assert_eq!(op.state(), OpState::Pending);
        assert!(op.result().unwrap().is_none());

        assert!(fulfiller.fulfill("round two"));
        let payload = op.result().unwrap().unwrap();
        assert_eq!(payload.as_bytes(), b"round two");
    }

    #[test]
    fn fulfiller_detaches_when_operation_drops() {
        let (op, fulfiller) = operation();
        assert!(fulfiller.is_attached());
        drop(op);
        assert!(!fulfiller.is_attached());
        assert!(!fulfiller.fulfill("too late"));
    }

    #[test]
    fn external_fail_overwrites() {
        let (mut op, fulfiller) = operation();
        assert!(fulfiller.fulfill("done"));
        // Dispatch panic policy and deadline expiry overwrite outcomes.
        op.fail(Error::new(ErrorKind::Timeout));
        assert_eq!(op.state(), OpState::Failed);
        assert!(op.result().unwrap_err().is_timeout());
    }
}
