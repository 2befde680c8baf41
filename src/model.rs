//! Value types shared by the poller, deriver and dispatcher.
//!
//! Everything here is a small `Copy` value.  Snapshots are replaced
//! wholesale each poll cycle and never mutated field-by-field.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Session configuration
// ---------------------------------------------------------------------------

/// Which dispense flow the screen runs.  Fixed for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DispenseMode {
    /// One button, one fixed portion.
    #[default]
    Classic,
    /// Operator picks Small or Large before confirming.
    SizeSelectable,
}

// ---------------------------------------------------------------------------
// Operator input
// ---------------------------------------------------------------------------

/// Locally-held, not-yet-committed portion choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PortionSelection {
    #[default]
    None,
    Small,
    Large,
}

impl PortionSelection {
    pub fn is_chosen(self) -> bool {
        self != Self::None
    }
}

/// The validated command sent on confirm.  Computed at the moment of
/// confirmation; never stored ahead of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispenseIntent {
    SmallDispense,
    RegularDispense,
}

/// Request shape the controller accepts for `update_ui_request`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UiRequest {
    #[default]
    None,
    SmallDispense,
    RegularDispense,
}

impl From<DispenseIntent> for UiRequest {
    fn from(intent: DispenseIntent) -> Self {
        match intent {
            DispenseIntent::SmallDispense => Self::SmallDispense,
            DispenseIntent::RegularDispense => Self::RegularDispense,
        }
    }
}

/// Controller run-state, keyed as `new_state` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunState {
    #[default]
    Ready,
    RunningClassic,
    RunningSized,
    Cleaning,
    Emptying,
}

// ---------------------------------------------------------------------------
// Hardware facts
// ---------------------------------------------------------------------------

/// A point-in-time view of the four controller facts the screen depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HardwareSnapshot {
    /// Photo-eye blocked: a bowl sits in the bay.
    pub bowl_present: bool,
    /// Controller is currently running a dispense.
    pub dispenser_busy: bool,
    /// Controller reported a hopper-empty timeout.
    pub hopper_empty: bool,
    /// Lifetime dispense counter.
    pub dispense_count: u64,
}

/// The individual facts fetched each poll cycle.  Used as a bitmask to
/// report which fetches failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HardwareFact {
    DispenseCount = 0b0001,
    BowlPresence = 0b0010,
    DispenserBusy = 0b0100,
    HopperTimeout = 0b1000,
}

impl HardwareFact {
    pub const ALL: [Self; 4] = [
        Self::DispenseCount,
        Self::BowlPresence,
        Self::DispenserBusy,
        Self::HopperTimeout,
    ];

    pub const fn mask(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::DispenseCount => "dispense_count",
            Self::BowlPresence => "pe_blocked",
            Self::DispenserBusy => "dispenser_busy",
            Self::HopperTimeout => "dispenser_timed_out",
        }
    }
}
