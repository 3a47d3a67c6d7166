//! Composite future that waits for all of its children.
//!
//! `push` transfers ownership: the child moves into the composite, which
//! keeps it alive at least as long as the composite itself, independent
//! of whatever references the original creator held. Children stay
//! reachable through the parent for interrogating partial results, by
//! position or by an opaque (non-unique) name.
//!
//! The composite's own engine operation aggregates child states: it is
//! terminal only once every child is terminal (a child failing early
//! does not short-circuit the wait) and fails if any child failed. On
//! success it carries a valid empty payload, so `get` on the composite
//! succeeds while per-child payloads are read from the children.
//!
//! The first pushed child donates its reactor when the composite is
//! still unbound; later children's loops are not cross-validated here.

use std::cell::RefCell;
use std::ops::Deref;
use std::rc::Rc;

use crate::engine::{OpState, Operation};
use crate::error::{Error, ErrorKind};
use crate::future::{Future, SharedCore};
use crate::payload::Payload;
use crate::reactor::Reactor;

#[derive(Debug)]
struct ChildSlot {
    name: Option<String>,
    core: SharedCore,
}

#[derive(Debug, Default)]
struct WaitAllInner {
    children: Vec<ChildSlot>,
    /// Externally imposed failure (armed deadline expiry, dispatch panic
    /// policy); overrides child aggregation.
    failed: Option<Error>,
}

/// Engine operation aggregating child completion.
#[derive(Debug)]
pub(crate) struct WaitAllOp {
    inner: Rc<RefCell<WaitAllInner>>,
}

impl Operation for WaitAllOp {
    fn state(&self) -> OpState {
        let inner = self.inner.borrow();
        if inner.failed.is_some() {
            return OpState::Failed;
        }
        if inner.children.is_empty() {
            return OpState::Pending;
        }
        let mut any_failed = false;
        for child in &inner.children {
            match child.core.borrow().op.state() {
                OpState::Pending => return OpState::Pending,
                OpState::Failed => any_failed = true,
                OpState::Ready => {}
            }
        }
        if any_failed {
            OpState::Failed
        } else {
            OpState::Ready
        }
    }

    fn result(&mut self) -> Result<Option<Payload>, Error> {
        match self.state() {
            OpState::Pending => Ok(None),
            OpState::Ready => Ok(Some(Payload::empty())),
            OpState::Failed => {
                let inner = self.inner.borrow();
                if let Some(failed) = &inner.failed {
                    return Err(failed.clone());
                }
                let total = inner.children.len();
                let failed = inner
                    .children
                    .iter()
                    .filter(|child| child.core.borrow().op.state() == OpState::Failed)
                    .count();
                Err(Error::new(ErrorKind::EngineFailure)
                    .with_message(format!("{failed} of {total} child operations failed")))
            }
        }
    }

    fn fail(&mut self, error: Error) {
        self.inner.borrow_mut().failed = Some(error);
    }

    fn reset(&mut self) {
        self.inner.borrow_mut().failed = None;
    }
}

/// A future aggregating child futures under unified ownership.
///
/// Dereferences to [`Future`], so the full surface (`then`, `wait_for`,
/// `get`, `is_ready`, …) applies to the composite as a whole.
#[derive(Debug)]
pub struct WaitAllFuture {
    future: Future,
    inner: Rc<RefCell<WaitAllInner>>,
    children: Vec<Future>,
}

impl Default for WaitAllFuture {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitAllFuture {
    /// Creates an empty, unbound composite.
    #[must_use]
    pub fn new() -> Self {
        let inner = Rc::new(RefCell::new(WaitAllInner::default()));
        let future = Future::new(Box::new(WaitAllOp {
            inner: Rc::clone(&inner),
        }));
        Self {
            future,
            inner,
            children: Vec::new(),
        }
    }

    /// Creates an empty composite bound to `reactor`.
    #[must_use]
    pub fn with_reactor(reactor: &Reactor) -> Self {
        let composite = Self::new();
        composite.future.core().borrow_mut().reactor = Some(reactor.downgrade());
        composite
    }

    /// Transfers ownership of `child` into the composite.
    ///
    /// The child survives at least as long as the composite, regardless
    /// of other references. When the composite has no reactor yet, it
    /// adopts the child's. `name` is an opaque label for interrogating
    /// partial results; uniqueness is not enforced.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if adopting the child's reactor fails.
    pub fn push(&mut self, child: Future, name: Option<&str>) -> Result<(), Error> {
        if self.future.reactor().is_none() {
            if let Some(reactor) = child.reactor() {
                self.future.bind(&reactor)?;
            }
        }
        tracing::debug!(
            composite = %self.future.id(),
            child = %child.id(),
            name = name.unwrap_or(""),
            "child pushed into composite"
        );
        self.inner.borrow_mut().children.push(ChildSlot {
            name: name.map(str::to_owned),
            core: Rc::clone(child.core()),
        });
        self.children.push(child);
        Ok(())
    }

    /// The composite as a plain future.
    #[must_use]
    pub fn as_future(&self) -> &Future {
        &self.future
    }

    /// Children in push order.
    pub fn children(&self) -> impl Iterator<Item = &Future> {
        self.children.iter()
    }

    /// Child at `index` in push order.
    #[must_use]
    pub fn child(&self, index: usize) -> Option<&Future> {
        self.children.get(index)
    }

    /// First child pushed under `name`.
    #[must_use]
    pub fn child_named(&self, name: &str) -> Option<&Future> {
        let index = self
            .inner
            .borrow()
            .children
            .iter()
            .position(|slot| slot.name.as_deref() == Some(name))?;
        self.children.get(index)
    }

    /// Number of children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// `true` when no child has been pushed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl Deref for WaitAllFuture {
    type Target = Future;

    fn deref(&self) -> &Future {
        &self.future
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::oneshot::Fulfiller;
    use std::rc::Rc;

    fn bound_child(reactor: &Reactor) -> (Future, Fulfiller) {
        reactor.oneshot()
    }

    #[test]
    fn empty_composite_is_pending() {
        let composite = WaitAllFuture::new();
        assert_eq!(composite.state(), OpState::Pending);
        assert!(composite.is_empty());
        assert!(composite.reactor().is_none());
    }

    #[test]
    fn adopts_reactor_from_first_child() {
        let reactor = Reactor::new();
        let mut composite = WaitAllFuture::new();
        assert!(composite.reactor().is_none());

        let (child, _fulfiller) = bound_child(&reactor);
        composite.push(child, None).unwrap();
        assert!(composite.reactor().is_some_and(|r| r.is_same(&reactor)));
    }

    #[test]
    fn children_survive_through_the_parent() {
        let reactor = Reactor::new();
        let mut composite = WaitAllFuture::with_reactor(&reactor);

        let (child, fulfiller) = bound_child(&reactor);
        let child_core = Rc::downgrade(child.core());
        composite.push(child, Some("lookup")).unwrap();
        // The creator's handle was moved; the parent keeps the child
        // alive.
        assert!(child_core.upgrade().is_some());
        assert_eq!(composite.len(), 1);
        assert!(composite.child_named("lookup").is_some());
        assert!(composite.child_named("other").is_none());

        fulfiller.fulfill("done");
        assert_eq!(
            composite.child(0).unwrap().get().unwrap().as_bytes(),
            b"done"
        );

        drop(composite);
        assert!(child_core.upgrade().is_none(), "parent drop releases children");
    }

    #[test]
    fn ready_only_when_every_child_is_terminal() {
        let reactor = Reactor::new();
        let mut composite = WaitAllFuture::with_reactor(&reactor);
        let (first, fulfil_first) = bound_child(&reactor);
        let (second, fulfil_second) = bound_child(&reactor);
        composite.push(first, None).unwrap();
        composite.push(second, None).unwrap();

        assert_eq!(composite.state(), OpState::Pending);
        fulfil_first.fulfill("one");
        assert_eq!(composite.state(), OpState::Pending);
        fulfil_second.fulfill("two");
        assert_eq!(composite.state(), OpState::Ready);

        // Composite success carries a valid empty payload.
        assert!(composite.get().unwrap().is_empty());
    }

    #[test]
    fn child_failure_fails_the_composite_after_all_terminal() {
        let reactor = Reactor::new();
        let mut composite = WaitAllFuture::with_reactor(&reactor);
        let (first, fulfil_first) = bound_child(&reactor);
        let (second, fulfil_second) = bound_child(&reactor);
        composite.push(first, None).unwrap();
        composite.push(second, None).unwrap();

        fulfil_first.fail(Error::new(ErrorKind::EngineFailure).with_message("connection refused"));
        // A failed child does not short-circuit the wait.
        assert_eq!(composite.state(), OpState::Pending);
        fulfil_second.fulfill("fine");
        assert_eq!(composite.state(), OpState::Failed);

        let err = composite.get().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EngineFailure);
        assert_eq!(err.message(), Some("1 of 2 child operations failed"));
    }

    #[test]
    fn names_need_not_be_unique() {
        let reactor = Reactor::new();
        let mut composite = WaitAllFuture::with_reactor(&reactor);
        let (first, fulfil_first) = bound_child(&reactor);
        let (second, _fulfil_second) = bound_child(&reactor);
        let first_id = first.id();
        composite.push(first, Some("shard")).unwrap();
        composite.push(second, Some("shard")).unwrap();

        fulfil_first.fulfill("a");
        let named = composite.child_named("shard").unwrap();
        assert_eq!(named.id(), first_id, "first match wins");
        assert_eq!(composite.len(), 2);
    }
}
