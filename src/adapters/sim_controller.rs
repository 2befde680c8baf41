//! In-process simulated dispenser controller.
//!
//! Implements [`ControllerPort`] over a handful of `Cell`s so the screen
//! can be exercised without hardware.  The model is deliberately coarse:
//!
//! ```text
//!   update_ui_request(Small|Regular)
//!        │  bowl in bay, hopper not latched, not busy, run state allows it
//!        ▼
//!   busy for `busy_reads` dispenser_is_busy() calls ──▶ idle
//!   hopper_level -= portion units, dispense_count += 1
//!   hopper_level < portion ──▶ hopper-empty latch (until clear_dispenser_time_out)
//! ```
//!
//! The busy window is counted in status reads rather than wall time so
//! scripted sessions are deterministic regardless of poll cadence.

use core::cell::Cell;

use log::{debug, info, warn};

use crate::app::ports::ControllerPort;
use crate::error::ControllerError;
use crate::model::{RunState, UiRequest};

/// Hopper units consumed by a small portion.
pub const SMALL_PORTION_UNITS: u32 = 1;
/// Hopper units consumed by a regular portion.
pub const REGULAR_PORTION_UNITS: u32 = 2;

#[derive(Debug)]
pub struct SimController {
    bowl_present: Cell<bool>,
    busy_remaining: Cell<u32>,
    busy_reads: u32,
    hopper_level: Cell<u32>,
    hopper_capacity: u32,
    timed_out: Cell<bool>,
    dispense_count: Cell<u64>,
    run_state: Cell<RunState>,
    offline: Cell<bool>,
    last_request: Cell<UiRequest>,
}

impl SimController {
    /// Full hopper of `hopper_capacity` units; each dispense reports busy
    /// for `busy_reads` status reads.
    pub fn new(hopper_capacity: u32, busy_reads: u32) -> Self {
        Self {
            bowl_present: Cell::new(false),
            busy_remaining: Cell::new(0),
            busy_reads,
            hopper_level: Cell::new(hopper_capacity),
            hopper_capacity,
            timed_out: Cell::new(false),
            dispense_count: Cell::new(0),
            run_state: Cell::new(RunState::Ready),
            offline: Cell::new(false),
            last_request: Cell::new(UiRequest::None),
        }
    }

    pub fn with_dispense_count(self, count: u64) -> Self {
        self.dispense_count.set(count);
        self
    }

    // ── Physical world ────────────────────────────────────────

    pub fn place_bowl(&self) {
        self.bowl_present.set(true);
    }

    pub fn remove_bowl(&self) {
        self.bowl_present.set(false);
    }

    /// Top the hopper back up.  The timeout latch stays until cleared.
    pub fn refill(&self) {
        self.hopper_level.set(self.hopper_capacity);
    }

    /// Simulate a dropped link: every call fails with `Unreachable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.set(offline);
    }

    // ── Inspection ────────────────────────────────────────────

    pub fn hopper_level(&self) -> u32 {
        self.hopper_level.get()
    }

    pub fn run_state(&self) -> RunState {
        self.run_state.get()
    }

    pub fn last_request(&self) -> UiRequest {
        self.last_request.get()
    }

    pub fn dispense_count(&self) -> u64 {
        self.dispense_count.get()
    }

    // ── Internal ──────────────────────────────────────────────

    fn link(&self) -> Result<(), ControllerError> {
        if self.offline.get() {
            Err(ControllerError::Unreachable)
        } else {
            Ok(())
        }
    }

    fn accepts_dispense(&self) -> Result<(), ControllerError> {
        match self.run_state.get() {
            RunState::Cleaning | RunState::Emptying => {
                return Err(ControllerError::Rejected("run state does not dispense"));
            }
            RunState::Ready | RunState::RunningClassic | RunState::RunningSized => {}
        }
        if self.timed_out.get() {
            return Err(ControllerError::Rejected("hopper timed out"));
        }
        if !self.bowl_present.get() {
            return Err(ControllerError::Rejected("no bowl"));
        }
        if self.busy_remaining.get() > 0 {
            return Err(ControllerError::Rejected("dispense in progress"));
        }
        Ok(())
    }
}

impl Default for SimController {
    fn default() -> Self {
        Self::new(20, 2)
    }
}

impl ControllerPort for SimController {
    async fn get_dispense_count(&self) -> Result<u64, ControllerError> {
        self.link()?;
        Ok(self.dispense_count.get())
    }

    async fn get_pe_blocked(&self) -> Result<bool, ControllerError> {
        self.link()?;
        Ok(self.bowl_present.get())
    }

    async fn dispenser_is_busy(&self) -> Result<bool, ControllerError> {
        self.link()?;
        let remaining = self.busy_remaining.get();
        if remaining == 0 {
            return Ok(false);
        }
        self.busy_remaining.set(remaining - 1);
        Ok(true)
    }

    async fn dispenser_has_timed_out(&self) -> Result<bool, ControllerError> {
        self.link()?;
        Ok(self.timed_out.get())
    }

    async fn update_ui_request(&self, request: UiRequest) -> Result<(), ControllerError> {
        self.link()?;
        let units = match request {
            UiRequest::None => {
                self.last_request.set(request);
                return Ok(());
            }
            UiRequest::SmallDispense => SMALL_PORTION_UNITS,
            UiRequest::RegularDispense => REGULAR_PORTION_UNITS,
        };
        self.accepts_dispense()?;
        self.last_request.set(request);

        let level = self.hopper_level.get();
        if level < units {
            warn!("sim: hopper short ({} < {}), latching timeout", level, units);
            self.hopper_level.set(0);
            self.timed_out.set(true);
            return Ok(());
        }
        self.hopper_level.set(level - units);
        self.busy_remaining.set(self.busy_reads);
        self.dispense_count.set(self.dispense_count.get() + 1);
        debug!(
            "sim: {:?} dispensing, hopper {}/{}",
            request,
            self.hopper_level.get(),
            self.hopper_capacity
        );
        Ok(())
    }

    async fn clear_dispenser_time_out(&self) -> Result<(), ControllerError> {
        self.link()?;
        self.timed_out.set(false);
        info!("sim: hopper timeout cleared");
        Ok(())
    }

    async fn update_run_state(&self, new_state: RunState) -> Result<(), ControllerError> {
        self.link()?;
        self.run_state.set(new_state);
        info!("sim: run state -> {:?}", new_state);
        Ok(())
    }
}
