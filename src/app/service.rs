//! Dispense screen service — the hexagonal core.
//!
//! [`DispenseScreen`] owns the latest snapshot, the operator's selection,
//! the intent dispatcher and the event sink.  [`MountedScreen`] adds the
//! poller lifecycle: mounting starts it, dropping or unmounting stops it.
//!
//! ```text
//!  HardwareStatePoller ──publish──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                                   │      DispenseScreen       │
//!  view: select_size / confirm ───▶ │ Selection · Rules · Disp. │ ──▶ ControllerPort
//!                                   └──────────────────────────┘
//! ```
//!
//! Everything runs on one cooperative executor.  State lives in `Cell`s
//! and is read at the instant an operation runs; no borrow is held
//! across an await.

use core::cell::{Cell, Ref, RefCell};
use std::rc::Rc;

use log::{debug, info, warn};

use crate::config::KioskConfig;
use crate::dispatcher::{ConfirmOutcome, IntentDispatcher};
use crate::error::{ControllerError, DispatchError};
use crate::model::{DispenseMode, HardwareSnapshot, PortionSelection};
use crate::poller::{HardwareStatePoller, PollerConfig, SnapshotSink};
use crate::presentation::{self, PresentationState};
use crate::selection::SelectionState;

use super::commands::{AdminCommand, OperatorCommand};
use super::events::AppEvent;
use super::ports::{ControllerPort, EventSink};

// ───────────────────────────────────────────────────────────────
// DispenseScreen
// ───────────────────────────────────────────────────────────────

pub struct DispenseScreen<C, E> {
    controller: Rc<C>,
    dispatcher: IntentDispatcher,
    snapshot: Cell<HardwareSnapshot>,
    /// Whether any snapshot has been published yet.
    observed: Cell<bool>,
    selection: Cell<SelectionState>,
    events: RefCell<E>,
}

impl<C: ControllerPort, E: EventSink> DispenseScreen<C, E> {
    /// Until the first poll completes the screen behaves as if no bowl
    /// were present.
    pub fn new(controller: Rc<C>, mode: DispenseMode, events: E) -> Self {
        Self {
            controller,
            dispatcher: IntentDispatcher::new(mode),
            snapshot: Cell::new(HardwareSnapshot::default()),
            observed: Cell::new(false),
            selection: Cell::new(SelectionState::new()),
            events: RefCell::new(events),
        }
    }

    pub fn from_config(controller: Rc<C>, config: &KioskConfig, events: E) -> Self {
        Self::new(controller, config.dispense_mode, events)
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn mode(&self) -> DispenseMode {
        self.dispatcher.mode()
    }

    /// Latest published facts.
    pub fn snapshot(&self) -> HardwareSnapshot {
        self.snapshot.get()
    }

    pub fn selection(&self) -> PortionSelection {
        self.selection.get().current()
    }

    /// Derived view state for the current facts and selection.
    pub fn presentation(&self) -> PresentationState {
        presentation::derive(&self.snapshot.get(), self.selection(), self.mode())
    }

    pub fn controller(&self) -> &Rc<C> {
        &self.controller
    }

    /// Borrow the event sink (tests and diagnostics read it back).
    pub fn events(&self) -> Ref<'_, E> {
        self.events.borrow()
    }

    // ── Operator input ────────────────────────────────────────

    /// Record a portion tap.  Ignored in Classic mode and while no bowl is
    /// present.  Returns whether the selection changed.
    pub fn select_size(&self, size: PortionSelection) -> bool {
        if self.mode() == DispenseMode::Classic {
            debug!("select_size ignored in Classic mode");
            return false;
        }
        let mut state = self.selection.get();
        let changed = state.select(size);
        self.selection.set(state);
        if changed {
            self.emit(&AppEvent::SelectionChanged(size));
        }
        changed
    }

    /// Validate against the facts as they are right now and send at most
    /// one intent.
    pub async fn confirm(&self) -> Result<ConfirmOutcome, DispatchError> {
        let snapshot = self.snapshot.get();
        let selection = self.selection();
        let result = self
            .dispatcher
            .confirm(&*self.controller, &snapshot, selection)
            .await;
        self.emit(&AppEvent::from_confirm(&result));
        result
    }

    /// Route a view command.  `SelectSize` never fails and yields `None`.
    pub async fn handle_command(
        &self,
        cmd: OperatorCommand,
    ) -> Result<Option<ConfirmOutcome>, DispatchError> {
        match cmd {
            OperatorCommand::SelectSize(size) => {
                self.select_size(size);
                Ok(None)
            }
            OperatorCommand::Confirm => self.confirm().await.map(Some),
        }
    }

    // ── Admin pass-through ────────────────────────────────────

    /// Forward an admin request.  Failures are logged and returned; there
    /// is no automatic retry.
    pub async fn handle_admin(&self, cmd: AdminCommand) -> Result<(), ControllerError> {
        let result = match cmd {
            AdminCommand::ClearHopperTimeout => self.controller.clear_dispenser_time_out().await,
            AdminCommand::SetRunState(state) => self.controller.update_run_state(state).await,
        };
        match result {
            Ok(()) => {
                info!("admin {:?} forwarded", cmd);
                self.emit(&AppEvent::AdminForwarded(cmd));
            }
            Err(error) => {
                warn!("admin {:?} failed: {}", cmd, error);
                self.emit(&AppEvent::AdminFailed {
                    command: cmd,
                    error,
                });
            }
        }
        result
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Start polling into this screen on `executor`.
    pub fn mount<'a, const N: usize>(
        self: &Rc<Self>,
        executor: &edge_executor::LocalExecutor<'a, N>,
        config: &KioskConfig,
    ) -> MountedScreen<C, E>
    where
        C: 'a,
        E: 'a,
    {
        let poller = HardwareStatePoller::new(Rc::clone(&self.controller), PollerConfig::from(config));
        poller.start(executor, Rc::clone(self));
        self.emit(&AppEvent::Mounted(self.mode()));
        MountedScreen {
            screen: Rc::clone(self),
            poller,
            refresh_after_confirm: config.refresh_after_confirm,
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn emit(&self, event: &AppEvent) {
        self.events.borrow_mut().emit(event);
    }
}

impl<C: ControllerPort, E: EventSink> SnapshotSink for DispenseScreen<C, E> {
    /// Selection reset is applied before the new facts become visible.
    fn publish(&self, snapshot: HardwareSnapshot) {
        let mut selection = self.selection.get();
        let discarded = selection.observe(&snapshot);
        self.selection.set(selection);

        let previous = self.snapshot.replace(snapshot);
        let first = !self.observed.replace(true);

        if let Some(discarded) = discarded {
            info!("bowl removed, {:?} selection discarded", discarded);
            self.emit(&AppEvent::SelectionReset { discarded });
        }
        if first || previous != snapshot {
            self.emit(&AppEvent::SnapshotUpdated(snapshot));
        }
    }
}

// ───────────────────────────────────────────────────────────────
// MountedScreen
// ───────────────────────────────────────────────────────────────

/// A screen with a running poller.  Dropping it stops the poller.
pub struct MountedScreen<C: ControllerPort, E: EventSink> {
    screen: Rc<DispenseScreen<C, E>>,
    poller: HardwareStatePoller<C>,
    refresh_after_confirm: bool,
}

impl<C: ControllerPort, E: EventSink> MountedScreen<C, E> {
    pub fn screen(&self) -> &Rc<DispenseScreen<C, E>> {
        &self.screen
    }

    pub fn poller(&self) -> &HardwareStatePoller<C> {
        &self.poller
    }

    pub fn presentation(&self) -> PresentationState {
        self.screen.presentation()
    }

    pub fn select_size(&self, size: PortionSelection) -> bool {
        self.screen.select_size(size)
    }

    /// Confirm, then poll once right away so a busy controller disables
    /// the control without waiting for the next tick.
    pub async fn confirm(&self) -> Result<ConfirmOutcome, DispatchError> {
        let result = self.screen.confirm().await;
        if self.refresh_after_confirm && matches!(result, Ok(ConfirmOutcome::Sent(_))) {
            let outcome = self.poller.poll_cycle(&*self.screen).await;
            debug!("post-confirm refresh: {:?}", outcome);
        }
        result
    }

    /// Stop polling and release the screen.
    pub fn unmount(self) {
        drop(self);
    }
}

impl<C: ControllerPort, E: EventSink> Drop for MountedScreen<C, E> {
    fn drop(&mut self) {
        self.poller.stop();
        self.screen.emit(&AppEvent::Unmounted);
    }
}
