//! End-to-end tests for reactor loop behavior: dispatch ordering, stop,
//! panic containment, and diagnostics.
//!
//! # Scenarios
//!
//! 1. **Ordering**: continuations fire in arm order within a turn
//! 2. **Stop**: `stop` from a continuation ends `run` between turns,
//!    leaving other armed work retained
//! 3. **Panic policy**: a panicking continuation is caught at the
//!    dispatcher boundary, recorded on the future, and the loop survives
//! 4. **Diagnostics**: loop counters and retention introspection

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use riptide::test_utils::init_test_logging;
use riptide::{ErrorKind, OpState, Reactor};
use riptide::{assert_with_log, test_complete, test_phase};

fn init_test(name: &str) {
    init_test_logging();
    test_phase!(name);
}

#[test]
fn continuations_fire_in_arm_order() {
    init_test("continuations_fire_in_arm_order");
    let reactor = Reactor::new();
    let order = Rc::new(RefCell::new(Vec::new()));

    let mut fulfillers = Vec::new();
    for label in ["first", "second", "third"] {
        let (future, fulfiller) = reactor.oneshot();
        let order = Rc::clone(&order);
        future.then(move |_| order.borrow_mut().push(label)).unwrap();
        fulfillers.push(fulfiller);
        // Keep every future alive purely through the registry.
        drop(future);
    }

    // Complete in reverse order; dispatch still follows arm order.
    for fulfiller in fulfillers.iter().rev() {
        fulfiller.fulfill("done");
    }
    reactor.run().unwrap();

    assert_with_log!(
        *order.borrow() == vec!["first", "second", "third"],
        "arm order preserved",
        vec!["first", "second", "third"],
        order.borrow().clone()
    );
    test_complete!("continuations_fire_in_arm_order");
}

#[test]
fn stop_from_a_continuation_ends_run_between_turns() {
    init_test("stop_from_a_continuation_ends_run_between_turns");
    let reactor = Reactor::new();

    let (parked, _parked_fulfiller) = reactor.oneshot();
    parked.then(|_| {}).unwrap();
    let parked_id = parked.id();

    let (stopper, stop_fulfiller) = reactor.oneshot();
    {
        let reactor = reactor.clone();
        stopper.then(move |_| reactor.stop()).unwrap();
    }

    stop_fulfiller.fulfill("halt");
    reactor.run().unwrap();

    assert_with_log!(
        reactor.is_retained(parked_id),
        "other armed work still retained after stop",
        true,
        reactor.is_retained(parked_id)
    );
    test_complete!("stop_from_a_continuation_ends_run_between_turns");
}

#[test]
fn continuation_panic_is_contained_and_recorded() {
    init_test("continuation_panic_is_contained_and_recorded");
    let reactor = Reactor::new();
    let (future, fulfiller) = reactor.oneshot();
    let (witness, witness_fulfiller) = reactor.oneshot();
    let witness_fired = Rc::new(Cell::new(false));

    future.then(|_| panic!("boom")).unwrap();
    {
        let witness_fired = Rc::clone(&witness_fired);
        witness.then(move |_| witness_fired.set(true)).unwrap();
    }

    fulfiller.fulfill("trigger");
    witness_fulfiller.fulfill("after");
    reactor.run().unwrap();

    // The panic was caught at the dispatcher boundary: the loop kept
    // dispatching, the entry was released, and the failure landed on the
    // future.
    assert_with_log!(
        witness_fired.get(),
        "loop survived the panic",
        true,
        witness_fired.get()
    );
    assert_with_log!(
        reactor.retained_futures() == 0,
        "no leaked registry entries",
        0usize,
        reactor.retained_futures()
    );
    assert_with_log!(
        future.state() == OpState::Failed,
        "panic recorded as failure",
        OpState::Failed,
        future.state()
    );
    let err = future.get().unwrap_err();
    assert_with_log!(
        err.kind() == ErrorKind::ContinuationPanicked,
        "panic error kind",
        ErrorKind::ContinuationPanicked,
        err.kind()
    );
    assert_with_log!(
        err.message() == Some("boom"),
        "panic message preserved",
        Some("boom"),
        err.message()
    );
    test_complete!("continuation_panic_is_contained_and_recorded");
}

#[test]
fn stats_count_turns_and_dispatches() {
    init_test("stats_count_turns_and_dispatches");
    let reactor = Reactor::new();
    let (future, fulfiller) = reactor.oneshot();
    let (other, other_fulfiller) = reactor.oneshot();

    future.then(|_| {}).unwrap();
    other.then(|_| {}).unwrap();
    fulfiller.fulfill("a");
    other_fulfiller.fulfill("b");
    reactor.run().unwrap();

    let stats = reactor.stats();
    assert_with_log!(stats.dispatched == 2, "two dispatches", 2u64, stats.dispatched);
    assert_with_log!(stats.turns >= 1, "at least one turn", 1u64, stats.turns);
    assert_with_log!(
        stats.timeouts_fired == 0,
        "no deadlines involved",
        0u64,
        stats.timeouts_fired
    );
    test_complete!("stats_count_turns_and_dispatches");
}

#[test]
fn dispatch_budget_spreads_work_across_turns() {
    init_test("dispatch_budget_spreads_work_across_turns");
    let reactor = Reactor::with_config(riptide::ReactorConfig {
        max_dispatch_per_turn: 1,
        ..Default::default()
    });
    let fired = Rc::new(Cell::new(0u32));

    for _ in 0..3 {
        let (future, fulfiller) = reactor.oneshot();
        let fired = Rc::clone(&fired);
        future.then(move |_| fired.set(fired.get() + 1)).unwrap();
        fulfiller.fulfill("ready");
        drop(future);
    }

    // One continuation per turn under a budget of 1.
    reactor.run_once().unwrap();
    assert_with_log!(fired.get() == 1, "first turn dispatches one", 1u32, fired.get());
    reactor.run_once().unwrap();
    assert_with_log!(fired.get() == 2, "second turn dispatches one", 2u32, fired.get());
    reactor.run().unwrap();
    assert_with_log!(fired.get() == 3, "run drains the rest", 3u32, fired.get());
    test_complete!("dispatch_budget_spreads_work_across_turns");
}
