//! Test utilities for riptide.
//!
//! Shared helpers for unit and integration tests:
//! - Consistent tracing-based logging initialization
//! - Phase/section macros for readable test output
//! - Constructors for futures in known states
//!
//! # Example
//! ```
//! use riptide::Reactor;
//! use riptide::test_utils::init_test_logging;
//!
//! init_test_logging();
//! let reactor = Reactor::new();
//! let (future, fulfiller) = reactor.oneshot();
//! fulfiller.fulfill("pong");
//! assert_eq!(future.get().unwrap().as_bytes(), b"pong");
//! ```

use std::sync::Once;

use crate::error::Error;
use crate::future::Future;
use crate::payload::Payload;
use crate::reactor::Reactor;

static INIT_LOGGING: Once = Once::new();

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
///
/// The first call wins; later calls are no-ops.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_ansi(false)
            .try_init();
    });
}

/// Creates a future bound to `reactor` that is already `Ready` with
/// `payload`.
#[must_use]
pub fn ready_future(reactor: &Reactor, payload: impl Into<Payload>) -> Future {
    let (future, fulfiller) = reactor.oneshot();
    fulfiller.fulfill(payload);
    future
}

/// Creates a future bound to `reactor` that has already `Failed` with
/// `error`.
#[must_use]
pub fn failed_future(reactor: &Reactor, error: Error) -> Future {
    let (future, fulfiller) = reactor.oneshot();
    fulfiller.fail(error);
    future
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Log a section within a test phase.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        tracing::debug!(section = %$name, "--- {} ---", $name);
    };
}

/// Log test completion with summary.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
    ($name:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::info!(
            test = %$name,
            $($key = %$value,)*
            "test completed successfully: {}",
            $name
        );
    };
}

/// Log before assertions for context.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        tracing::debug!(
            expected = ?$expected,
            actual = ?$actual,
            "Asserting: {}",
            $msg
        );
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}
