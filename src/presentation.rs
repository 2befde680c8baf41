//! Presentation deriver: a ranked, function-pointer rule table.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  RULES (first match wins)                                            │
//! │  ┌────┬────────────────┬──────────────────────────────┬─────────┬───┐ │
//! │  │ #  │ applies        │ label                        │ style   │ ✓ │ │
//! │  ├────┼────────────────┼──────────────────────────────┼─────────┼───┤ │
//! │  │ 0  │ hopper_empty   │ Empty, please refill         │ TimedOut│   │ │
//! │  │ 1  │ !bowl_present  │ Please place bowl in bay ... │ NotReady│   │ │
//! │  │ 2  │ dispenser_busy │ Dispensing, please wait      │ NotReady│   │ │
//! │  │ 3  │ Classic        │ Dispense                     │ Ready   │ ✓ │ │
//! │  │ 4  │ size chosen    │ Dispense                     │ Ready   │ ✓ │ │
//! │  │ 5  │ (always)       │ Please select a portion size │ NotReady│   │ │
//! │  └────┴────────────────┴──────────────────────────────┴─────────┴───┘ │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Derivation is a pure function of `(snapshot, selection, mode)`: no
//! clock, no I/O, no memory of previous calls.  A new condition is one
//! more row in [`RULES`] at the rank it should take.

use core::fmt::Write as _;

use heapless::String;

use crate::model::{DispenseMode, HardwareSnapshot, PortionSelection};

// ---------------------------------------------------------------------------
// Derived view state
// ---------------------------------------------------------------------------

/// Visual class of the confirm control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleClass {
    Ready,
    NotReady,
    TimedOut,
}

/// Identity of a row in [`RULES`].  Discriminant = rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RuleId {
    HopperEmpty = 0,
    BowlMissing = 1,
    DispenserBusy = 2,
    ClassicReady = 3,
    PortionChosen = 4,
    AwaitingPortion = 5,
}

impl RuleId {
    /// Total number of rules — used to size the table array.
    pub const COUNT: usize = 6;
}

/// Everything the view needs to render the dispense screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentationState {
    pub label: &'static str,
    pub style: StyleClass,
    pub confirm_enabled: bool,
    pub show_size_selector: bool,
    /// Selection as the deriver saw it (None while the bowl is absent).
    pub selection: PortionSelection,
    /// Which rule produced this state.
    pub rule: RuleId,
    pub dispense_count: u64,
}

impl PresentationState {
    /// Footer line under the confirm control.
    pub fn footer(&self) -> String<48> {
        footer(self.dispense_count)
    }
}

// ---------------------------------------------------------------------------
// Rule descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Inputs handed to every rule predicate.
#[derive(Debug, Clone, Copy)]
pub struct DeriveInput {
    pub snapshot: HardwareSnapshot,
    pub selection: PortionSelection,
    pub mode: DispenseMode,
}

impl DeriveInput {
    /// A selection can only be in effect while a bowl is present.
    pub fn new(
        snapshot: &HardwareSnapshot,
        selection: PortionSelection,
        mode: DispenseMode,
    ) -> Self {
        let selection = if snapshot.bowl_present {
            selection
        } else {
            PortionSelection::None
        };
        Self {
            snapshot: *snapshot,
            selection,
            mode,
        }
    }
}

pub type RulePredicateFn = fn(&DeriveInput) -> bool;

/// Static descriptor for a single presentation rule.
pub struct PresentationRule {
    pub id: RuleId,
    pub name: &'static str,
    pub applies: RulePredicateFn,
    pub label: &'static str,
    pub style: StyleClass,
    pub confirm_enabled: bool,
}

pub const LABEL_REFILL: &str = "Empty, please refill";
pub const LABEL_PLACE_BOWL: &str = "Please place bowl in bay below";
pub const LABEL_BUSY: &str = "Dispensing, please wait";
pub const LABEL_DISPENSE: &str = "Dispense";
pub const LABEL_SELECT_SIZE: &str = "Please select a portion size";

// ═══════════════════════════════════════════════════════════════════════════
//  Rule table
// ═══════════════════════════════════════════════════════════════════════════

/// Ranked rules, indexed by `RuleId as usize`.  The last row always applies.
pub static RULES: [PresentationRule; RuleId::COUNT] = [
    PresentationRule {
        id: RuleId::HopperEmpty,
        name: "HopperEmpty",
        applies: hopper_empty,
        label: LABEL_REFILL,
        style: StyleClass::TimedOut,
        confirm_enabled: false,
    },
    PresentationRule {
        id: RuleId::BowlMissing,
        name: "BowlMissing",
        applies: bowl_missing,
        label: LABEL_PLACE_BOWL,
        style: StyleClass::NotReady,
        confirm_enabled: false,
    },
    PresentationRule {
        id: RuleId::DispenserBusy,
        name: "DispenserBusy",
        applies: dispenser_busy,
        label: LABEL_BUSY,
        style: StyleClass::NotReady,
        confirm_enabled: false,
    },
    PresentationRule {
        id: RuleId::ClassicReady,
        name: "ClassicReady",
        applies: classic_mode,
        label: LABEL_DISPENSE,
        style: StyleClass::Ready,
        confirm_enabled: true,
    },
    PresentationRule {
        id: RuleId::PortionChosen,
        name: "PortionChosen",
        applies: portion_chosen,
        label: LABEL_DISPENSE,
        style: StyleClass::Ready,
        confirm_enabled: true,
    },
    PresentationRule {
        id: RuleId::AwaitingPortion,
        name: "AwaitingPortion",
        applies: always,
        label: LABEL_SELECT_SIZE,
        style: StyleClass::NotReady,
        confirm_enabled: false,
    },
];

fn hopper_empty(i: &DeriveInput) -> bool {
    i.snapshot.hopper_empty
}

fn bowl_missing(i: &DeriveInput) -> bool {
    !i.snapshot.bowl_present
}

fn dispenser_busy(i: &DeriveInput) -> bool {
    i.snapshot.dispenser_busy
}

fn classic_mode(i: &DeriveInput) -> bool {
    i.mode == DispenseMode::Classic
}

fn portion_chosen(i: &DeriveInput) -> bool {
    i.mode == DispenseMode::SizeSelectable && i.selection.is_chosen()
}

fn always(_: &DeriveInput) -> bool {
    true
}

// ═══════════════════════════════════════════════════════════════════════════
//  Derivation
// ═══════════════════════════════════════════════════════════════════════════

/// First rule whose predicate holds.
pub fn matching_rule(
    snapshot: &HardwareSnapshot,
    selection: PortionSelection,
    mode: DispenseMode,
) -> &'static PresentationRule {
    let input = DeriveInput::new(snapshot, selection, mode);
    RULES
        .iter()
        .find(|rule| (rule.applies)(&input))
        .unwrap_or(&RULES[RuleId::AwaitingPortion as usize])
}

/// Map the latest facts and local selection onto a view state.
pub fn derive(
    snapshot: &HardwareSnapshot,
    selection: PortionSelection,
    mode: DispenseMode,
) -> PresentationState {
    let input = DeriveInput::new(snapshot, selection, mode);
    let rule = matching_rule(snapshot, selection, mode);
    PresentationState {
        label: rule.label,
        style: rule.style,
        confirm_enabled: rule.confirm_enabled,
        show_size_selector: mode == DispenseMode::SizeSelectable,
        selection: input.selection,
        rule: rule.id,
        dispense_count: snapshot.dispense_count,
    }
}

/// "N plastic bags saved!"
pub fn footer(dispense_count: u64) -> String<48> {
    let mut s = String::new();
    // u64::MAX is 20 digits; always fits.
    let _ = write!(s, "{} plastic bags saved!", dispense_count);
    s
}
