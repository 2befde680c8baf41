//! Mock controller adapter for integration tests.
//!
//! Serves scripted facts, records every command, and can hold fact
//! fetches open so tests control exactly when a poll cycle completes.

use std::cell::{Cell, RefCell};

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::signal::Signal;

use ichibu::app::events::AppEvent;
use ichibu::app::ports::{ControllerPort, EventSink};
use ichibu::error::ControllerError;
use ichibu::model::{HardwareFact, HardwareSnapshot, RunState, UiRequest};
use ichibu::poller::SnapshotSink;

// ── Admin call record ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCall {
    ClearTimeout,
    RunState(RunState),
}

// ── MockController ────────────────────────────────────────────

pub struct MockController {
    facts: Cell<HardwareSnapshot>,
    /// `HardwareFact` mask of fetches that fail.
    failing: Cell<u8>,
    send_result: Cell<Result<(), ControllerError>>,
    admin_result: Cell<Result<(), ControllerError>>,
    held: Cell<bool>,
    /// Parked fetches wait here instead of spinning, so the rest of the
    /// executor keeps running while a cycle is held.
    gate: Signal<NoopRawMutex, ()>,
    fetches: Cell<u32>,
    pub requests: RefCell<Vec<UiRequest>>,
    pub admin_calls: RefCell<Vec<AdminCall>>,
}

#[allow(dead_code)]
impl MockController {
    pub fn new(facts: HardwareSnapshot) -> Self {
        Self {
            facts: Cell::new(facts),
            failing: Cell::new(0),
            send_result: Cell::new(Ok(())),
            admin_result: Cell::new(Ok(())),
            held: Cell::new(false),
            gate: Signal::new(),
            fetches: Cell::new(0),
            requests: RefCell::new(Vec::new()),
            admin_calls: RefCell::new(Vec::new()),
        }
    }

    /// Bowl in the bay, hopper full, idle.
    pub fn ready() -> Self {
        Self::new(facts(true, false, false))
    }

    pub fn set_facts(&self, facts: HardwareSnapshot) {
        self.facts.set(facts);
    }

    pub fn update(&self, f: impl FnOnce(&mut HardwareSnapshot)) {
        let mut s = self.facts.get();
        f(&mut s);
        self.facts.set(s);
    }

    pub fn fail(&self, fact: HardwareFact) {
        self.failing.set(self.failing.get() | fact.mask());
    }

    pub fn heal(&self) {
        self.failing.set(0);
    }

    pub fn fail_sends(&self, error: ControllerError) {
        self.send_result.set(Err(error));
    }

    pub fn accept_sends(&self) {
        self.send_result.set(Ok(()));
    }

    pub fn fail_admin(&self, error: ControllerError) {
        self.admin_result.set(Err(error));
    }

    /// Fact fetches wait until [`release`](Self::release).
    pub fn hold(&self) {
        self.held.set(true);
        self.gate.reset();
    }

    pub fn release(&self) {
        self.held.set(false);
        self.gate.signal(());
    }

    /// Total fact fetches started.
    pub fn fetches(&self) -> u32 {
        self.fetches.get()
    }

    pub fn sent(&self) -> Vec<UiRequest> {
        self.requests.borrow().clone()
    }

    async fn fetch<T>(
        &self,
        fact: HardwareFact,
        value: impl FnOnce(&HardwareSnapshot) -> T,
    ) -> Result<T, ControllerError> {
        self.fetches.set(self.fetches.get() + 1);
        while self.held.get() {
            self.gate.wait().await;
            // Pass the release on to the next parked fetch.
            self.gate.signal(());
        }
        if self.failing.get() & fact.mask() != 0 {
            return Err(ControllerError::Unreachable);
        }
        Ok(value(&self.facts.get()))
    }
}

impl ControllerPort for MockController {
    async fn get_dispense_count(&self) -> Result<u64, ControllerError> {
        self.fetch(HardwareFact::DispenseCount, |s| s.dispense_count).await
    }

    async fn get_pe_blocked(&self) -> Result<bool, ControllerError> {
        self.fetch(HardwareFact::BowlPresence, |s| s.bowl_present).await
    }

    async fn dispenser_is_busy(&self) -> Result<bool, ControllerError> {
        self.fetch(HardwareFact::DispenserBusy, |s| s.dispenser_busy).await
    }

    async fn dispenser_has_timed_out(&self) -> Result<bool, ControllerError> {
        self.fetch(HardwareFact::HopperTimeout, |s| s.hopper_empty).await
    }

    async fn update_ui_request(&self, request: UiRequest) -> Result<(), ControllerError> {
        self.send_result.get()?;
        self.requests.borrow_mut().push(request);
        Ok(())
    }

    async fn clear_dispenser_time_out(&self) -> Result<(), ControllerError> {
        self.admin_result.get()?;
        self.admin_calls.borrow_mut().push(AdminCall::ClearTimeout);
        Ok(())
    }

    async fn update_run_state(&self, new_state: RunState) -> Result<(), ControllerError> {
        self.admin_result.get()?;
        self.admin_calls.borrow_mut().push(AdminCall::RunState(new_state));
        Ok(())
    }
}

// ── Sinks ─────────────────────────────────────────────────────

/// Event sink that keeps every event.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

/// Snapshot sink that keeps every published snapshot.
#[derive(Default)]
pub struct SnapshotLog {
    pub published: RefCell<Vec<HardwareSnapshot>>,
}

#[allow(dead_code)]
impl SnapshotLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.published.borrow().len()
    }

    pub fn last(&self) -> Option<HardwareSnapshot> {
        self.published.borrow().last().copied()
    }
}

impl SnapshotSink for SnapshotLog {
    fn publish(&self, snapshot: HardwareSnapshot) {
        self.published.borrow_mut().push(snapshot);
    }
}

// ── Helpers ───────────────────────────────────────────────────

pub fn facts(bowl: bool, busy: bool, empty: bool) -> HardwareSnapshot {
    HardwareSnapshot {
        bowl_present: bowl,
        dispenser_busy: busy,
        hopper_empty: empty,
        dispense_count: 99,
    }
}
