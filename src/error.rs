//! Unified error types for the kiosk core.
//!
//! Controller calls, intent dispatch and configuration each have their own
//! small `Copy` error enum; [`Error`] wraps all of them so the binary can
//! bubble anything up through `anyhow`.

use core::fmt;

use crate::app::ports::{ConfigError, StorageError};

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A request to the controller failed.
    Controller(ControllerError),
    /// An operator intent could not be dispatched.
    Dispatch(DispatchError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// Key-value storage failed.
    Storage(StorageError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Controller(e) => write!(f, "controller: {e}"),
            Self::Dispatch(e) => write!(f, "dispatch: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Controller errors
// ---------------------------------------------------------------------------

/// Failure of a single request/response exchange with the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerError {
    /// The controller did not answer within the fetch timeout.
    Timeout,
    /// The channel to the controller is down.
    Unreachable,
    /// The controller answered but refused the request.
    Rejected(&'static str),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "request timed out"),
            Self::Unreachable => write!(f, "controller unreachable"),
            Self::Rejected(reason) => write!(f, "request rejected: {reason}"),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ControllerError> for Error {
    fn from(e: ControllerError) -> Self {
        Self::Controller(e)
    }
}

// ---------------------------------------------------------------------------
// Dispatch errors
// ---------------------------------------------------------------------------

/// Errors from the confirm path.  A rejected (stale) confirm is *not* an
/// error; see [`ConfirmOutcome`](crate::dispatcher::ConfirmOutcome).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// Internal logic reached a state the rule table should make
    /// impossible.  Never recovered by guessing a portion.
    InvariantViolation(&'static str),
    /// The intent was valid but did not reach the controller.
    SendFailed(ControllerError),
}

impl DispatchError {
    pub fn is_defect(&self) -> bool {
        matches!(self, Self::InvariantViolation(_))
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvariantViolation(what) => write!(f, "invariant violated: {what}"),
            Self::SendFailed(e) => write!(f, "send failed: {e}"),
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<DispatchError> for Error {
    fn from(e: DispatchError) -> Self {
        Self::Dispatch(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
