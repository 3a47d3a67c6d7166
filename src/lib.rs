//! Riptide: completion futures for single-threaded reactor clients.
//!
//! # Overview
//!
//! Riptide wraps pending asynchronous operations (typically RPCs against
//! a broker) in [`Future`] handles with explicit `Pending`/`Ready`/
//! `Failed` states. Callers either arm a continuation to run on
//! completion or block until the result is available; a single-threaded
//! [`Reactor`] delivers completions, enforces deadlines, and, through
//! its liveness registry, keeps every future with an outstanding
//! continuation alive until the last armed round has fired.
//!
//! # Core Guarantees
//!
//! - **No premature destruction**: arming a continuation retains the
//!   future in the reactor's liveness registry; dropping every caller
//!   handle cannot reclaim it while a callback is outstanding
//! - **No leaked bookkeeping**: the registry release runs even when a
//!   continuation panics; counts reach zero exactly once per armed round
//! - **No silent overwrite**: arming twice without a full release is an
//!   error, reported synchronously
//! - **Bounded blocking**: `wait_for`/`get` honor deadlines and report
//!   `Stalled` instead of hanging when nothing can complete
//! - **Owned composition**: pushing a child into a [`WaitAllFuture`]
//!   transfers ownership; children live at least as long as the parent
//!
//! # Module Structure
//!
//! - [`future`]: the future handle and the wait-all composite
//! - [`reactor`]: event loop, liveness registry, deadlines, dispatch,
//!   pluggable completion sources
//! - [`engine`]: the pending-operation seam plus a oneshot reference
//!   implementation
//! - [`payload`]: completion payload container
//! - [`error`]: typed errors
//! - [`config`]: reactor configuration and environment overrides
//! - [`test_utils`]: logging and fixture helpers for tests
//!
//! # Example
//!
//! ```
//! use riptide::Reactor;
//!
//! let reactor = Reactor::new();
//! let (future, fulfiller) = reactor.oneshot();
//!
//! future
//!     .then(|done| {
//!         let payload = done.get().expect("payload");
//!         assert_eq!(payload.as_bytes(), b"pong");
//!     })
//!     .expect("arm continuation");
//!
//! fulfiller.fulfill("pong");
//! reactor.run().expect("drive to quiescence");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]

pub mod config;
pub mod engine;
pub mod error;
pub mod future;
pub mod payload;
pub mod reactor;
pub mod test_utils;

pub use config::{ConfigError, ReactorConfig};
pub use engine::oneshot::{Fulfiller, OneshotOp};
pub use engine::{OpState, Operation};
pub use error::{Error, ErrorCategory, ErrorKind};
pub use future::wait_all::WaitAllFuture;
pub use future::{Future, FutureId};
pub use payload::Payload;
pub use reactor::{EventSource, Reactor, ReactorStats};
