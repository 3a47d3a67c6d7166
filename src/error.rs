//! Error types and error handling strategy for riptide.
//!
//! Error handling follows these principles:
//!
//! - Errors are explicit and typed (no stringly-typed errors)
//! - Registration failures surface synchronously at the call site, never
//!   deferred to callback time
//! - Blocking calls report `Timeout`/`Stalled` instead of hanging
//! - Registry bookkeeping defects are classified as `InvariantViolation`
//!   and treated as internal bugs, not user errors
//!
//! # Error Categories
//!
//! - **Registration**: continuation arming rejected (`AlreadyRegistered`,
//!   `InvalidArgument`)
//! - **Completion**: the operation's outcome could not be produced
//!   (`Timeout`, `EngineFailure`, `NoPayload`, `MalformedPayload`)
//! - **Reactor**: the event loop could not service the request
//!   (`NoReactor`, `Stalled`, `ContinuationPanicked`)
//! - **Internal**: bookkeeping inconsistencies (`InvariantViolation`)

use core::fmt;
use std::sync::Arc;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Registration ===
    /// A continuation is already registered for this future.
    AlreadyRegistered,
    /// An argument failed validation.
    InvalidArgument,

    // === Completion ===
    /// Deadline elapsed before the operation completed.
    Timeout,
    /// The underlying operation failed.
    EngineFailure,
    /// The operation completed without a payload where one was expected.
    NoPayload,
    /// The payload was present but could not be decoded.
    MalformedPayload,

    // === Reactor ===
    /// The future is not bound to a reactor.
    NoReactor,
    /// The reactor ran out of work while the operation was still pending.
    Stalled,
    /// A user continuation panicked during dispatch.
    ContinuationPanicked,

    // === Internal ===
    /// Liveness registry bookkeeping inconsistency (internal bug).
    InvariantViolation,
}

/// Coarse grouping of error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Continuation registration errors.
    Registration,
    /// Operation completion errors.
    Completion,
    /// Event loop errors.
    Reactor,
    /// Internal defects.
    Internal,
}

impl ErrorKind {
    /// Returns the error category for this kind.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::AlreadyRegistered | Self::InvalidArgument => ErrorCategory::Registration,
            Self::Timeout | Self::EngineFailure | Self::NoPayload | Self::MalformedPayload => {
                ErrorCategory::Completion
            }
            Self::NoReactor | Self::Stalled | Self::ContinuationPanicked => ErrorCategory::Reactor,
            Self::InvariantViolation => ErrorCategory::Internal,
        }
    }

    /// Returns `true` if this kind marks an internal defect rather than a
    /// condition a caller can provoke or recover from.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::InvariantViolation)
    }

    const fn describe(self) -> &'static str {
        match self {
            Self::AlreadyRegistered => "continuation already registered for this future",
            Self::InvalidArgument => "invalid argument",
            Self::Timeout => "operation timed out",
            Self::EngineFailure => "operation failed",
            Self::NoPayload => "operation completed without a payload",
            Self::MalformedPayload => "payload could not be decoded",
            Self::NoReactor => "future is not bound to a reactor",
            Self::Stalled => "reactor ran out of work with the operation still pending",
            Self::ContinuationPanicked => "continuation panicked during dispatch",
            Self::InvariantViolation => "liveness registry invariant violated",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// The main error type for riptide operations.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the detail message, if one was attached.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns `true` if this error is a timeout condition.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }

    /// Returns `true` if this error reports an engine-side operation failure.
    #[must_use]
    pub const fn is_engine_failure(&self) -> bool {
        matches!(self.kind, ErrorKind::EngineFailure)
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{}: {msg}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|s| s.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}
