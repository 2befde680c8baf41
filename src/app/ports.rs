//! Port traits — the boundary between the screen core and the outside world.
//!
//! ```text
//!   Controller adapter ──▶ ControllerPort ──▶ Poller / Dispatcher
//!                          EventSink      ◀── DispenseScreen
//!   MemoryStore        ──▶ ConfigPort / StoragePort
//! ```
//!
//! The core is single-threaded: ports that are shared between the poll
//! loop and operator callbacks take `&self` and rely on interior
//! mutability in the adapter.  Nothing here requires `Send`.

use crate::config::KioskConfig;
use crate::error::ControllerError;
use crate::model::{RunState, UiRequest};

// ───────────────────────────────────────────────────────────────
// Controller port (request/response to the dispenser controller)
// ───────────────────────────────────────────────────────────────

/// Async request/response facade over the external dispenser controller.
///
/// One call fetches one fact.  Every call may fail transiently; callers
/// decide whether a failure is retained-and-logged (poller) or surfaced
/// (dispatcher).
#[allow(async_fn_in_trait)]
pub trait ControllerPort {
    /// Lifetime dispense counter.
    async fn get_dispense_count(&self) -> Result<u64, ControllerError>;

    /// Bowl-presence photo-eye; `true` = blocked (bowl in the bay).
    async fn get_pe_blocked(&self) -> Result<bool, ControllerError>;

    /// Whether a dispense is currently running.
    async fn dispenser_is_busy(&self) -> Result<bool, ControllerError>;

    /// Hopper-empty timeout latched by the controller.
    async fn dispenser_has_timed_out(&self) -> Result<bool, ControllerError>;

    /// Commit an operator intent.
    async fn update_ui_request(&self, request: UiRequest) -> Result<(), ControllerError>;

    /// Admin recovery: clear the hopper-empty latch after a refill.
    async fn clear_dispenser_time_out(&self) -> Result<(), ControllerError>;

    /// Admin run-state change (cleaning, emptying, ...).
    async fn update_run_state(&self, new_state: RunState) -> Result<(), ControllerError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (core → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The core emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

/// Fan one event out to two sinks, in order.
impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn emit(&mut self, event: &super::events::AppEvent) {
        self.0.emit(event);
        self.1.emit(event);
    }
}

// ───────────────────────────────────────────────────────────────
// Configuration port
// ───────────────────────────────────────────────────────────────

/// Loads and persists kiosk configuration.
///
/// Implementations MUST call [`KioskConfig::validate`] before persisting
/// and reject invalid values rather than clamping them.
pub trait ConfigPort {
    /// Returns [`ConfigError::NotFound`] if nothing was stored yet.
    fn load(&self) -> Result<KioskConfig, ConfigError>;

    fn save(&self, config: &KioskConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port
// ───────────────────────────────────────────────────────────────

/// Namespaced key-value storage for config and defect blobs.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage.
    NotFound,
    /// Stored config failed to deserialize.
    Corrupted,
    /// A field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    NotFound,
    Full,
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for StorageError {}
