//! Inbound commands to the dispense screen.
//!
//! Operator commands come from the touch view; admin commands come from
//! the settings menu and are forwarded to the controller unchanged.

use crate::model::{PortionSelection, RunState};

/// Taps the view can send into the screen core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    /// Tap on the Small / Large selector.
    SelectSize(PortionSelection),

    /// Tap on the confirm control.
    Confirm,
}

/// Admin pass-through requests.  Not gated by presentation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCommand {
    /// Clear the controller's hopper-empty latch after a refill.
    ClearHopperTimeout,

    /// Move the controller into another run state (cleaning, emptying, ...).
    SetRunState(RunState),
}
