//! Outbound application events.
//!
//! The [`DispenseScreen`](super::service::DispenseScreen) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on
//! the other side decide what to do with them — log to the console,
//! record defects, feed an analytics pipeline, etc.

use crate::dispatcher::ConfirmOutcome;
use crate::error::{ControllerError, DispatchError};
use crate::model::{DispenseIntent, DispenseMode, HardwareSnapshot, PortionSelection};
use crate::presentation::RuleId;

use super::commands::AdminCommand;

/// Structured events emitted by the screen core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The screen was mounted and its poller started.
    Mounted(DispenseMode),

    /// The screen was unmounted; no further snapshots will be applied.
    Unmounted,

    /// A poll cycle published facts that differ from the previous ones.
    SnapshotUpdated(HardwareSnapshot),

    /// The operator changed the portion choice.
    SelectionChanged(PortionSelection),

    /// Bowl removal discarded an uncommitted choice.
    SelectionReset { discarded: PortionSelection },

    /// A confirm reached the controller.
    IntentSent(DispenseIntent),

    /// A confirm was dropped because the facts no longer allowed it.
    ConfirmRejected { rule: RuleId },

    /// A valid confirm could not be delivered.
    DispatchFailed(ControllerError),

    /// Internal logic reached a state that should be impossible.
    DefectDetected(&'static str),

    /// An admin request was accepted by the controller.
    AdminForwarded(AdminCommand),

    /// An admin request failed.
    AdminFailed {
        command: AdminCommand,
        error: ControllerError,
    },
}

impl AppEvent {
    /// Event describing a finished confirm attempt.
    pub fn from_confirm(result: &Result<ConfirmOutcome, DispatchError>) -> Self {
        match result {
            Ok(ConfirmOutcome::Sent(intent)) => Self::IntentSent(*intent),
            Ok(ConfirmOutcome::Rejected(rule)) => Self::ConfirmRejected { rule: *rule },
            Err(DispatchError::SendFailed(e)) => Self::DispatchFailed(*e),
            Err(DispatchError::InvariantViolation(what)) => Self::DefectDetected(what),
        }
    }
}
