//! Integration tests for the poller → screen → dispatcher pipeline.
//!
//! Facts are pulled through a real `HardwareStatePoller` with manual
//! `poll_cycle` calls, so every test controls exactly when a snapshot is
//! published.

use std::rc::Rc;
use std::time::Duration;

use futures_lite::future::block_on;

use ichibu::adapters::memory_store::MemoryStore;
use ichibu::app::commands::{AdminCommand, OperatorCommand};
use ichibu::app::events::AppEvent;
use ichibu::app::ports::EventSink;
use ichibu::app::service::DispenseScreen;
use ichibu::config::KioskConfig;
use ichibu::diagnostics::DefectReporter;
use ichibu::dispatcher::ConfirmOutcome;
use ichibu::error::{ControllerError, DispatchError};
use ichibu::model::{DispenseIntent, DispenseMode, HardwareFact, PortionSelection, RunState, UiRequest};
use ichibu::poller::{CycleOutcome, HardwareStatePoller, PollerConfig};
use ichibu::presentation::{RuleId, StyleClass};

use super::mock_controller::{AdminCall, MockController, RecordingSink, facts};

type Screen = DispenseScreen<MockController, RecordingSink>;

struct Rig {
    ctl: Rc<MockController>,
    screen: Rc<Screen>,
    poller: HardwareStatePoller<MockController>,
}

impl Rig {
    fn new(mode: DispenseMode, ctl: MockController) -> Self {
        let ctl = Rc::new(ctl);
        let screen = Rc::new(DispenseScreen::new(
            Rc::clone(&ctl),
            mode,
            RecordingSink::new(),
        ));
        let poller = HardwareStatePoller::new(Rc::clone(&ctl), PollerConfig::default());
        Self {
            ctl,
            screen,
            poller,
        }
    }

    fn poll(&self) -> CycleOutcome {
        block_on(self.poller.poll_cycle(&*self.screen))
    }

    fn confirm(&self) -> Result<ConfirmOutcome, DispatchError> {
        block_on(self.screen.confirm())
    }
}

// ── Scenario A: Classic, bowl present → RegularDispense ──────

#[test]
fn classic_with_bowl_sends_regular_dispense() {
    let rig = Rig::new(DispenseMode::Classic, MockController::ready());
    rig.poll();

    let p = rig.screen.presentation();
    assert_eq!(p.label, "Dispense");
    assert!(p.confirm_enabled);
    assert_eq!(p.style, StyleClass::Ready);

    assert_eq!(
        rig.confirm(),
        Ok(ConfirmOutcome::Sent(DispenseIntent::RegularDispense))
    );
    assert_eq!(rig.ctl.sent(), vec![UiRequest::RegularDispense]);
}

// ── Scenario B: SizeSelectable, no portion → no-op ───────────

#[test]
fn sized_without_portion_rejects_confirm() {
    let rig = Rig::new(DispenseMode::SizeSelectable, MockController::ready());
    rig.poll();

    let p = rig.screen.presentation();
    assert_eq!(p.label, "Please select a portion size");
    assert!(!p.confirm_enabled);
    assert!(p.show_size_selector);

    assert_eq!(
        rig.confirm(),
        Ok(ConfirmOutcome::Rejected(RuleId::AwaitingPortion))
    );
    assert!(rig.ctl.sent().is_empty());
}

// ── Scenario C: bowl removed while Large selected ────────────

#[test]
fn bowl_removal_resets_selection_before_next_derivation() {
    let rig = Rig::new(DispenseMode::SizeSelectable, MockController::ready());
    rig.poll();
    assert!(rig.screen.select_size(PortionSelection::Large));
    assert!(rig.screen.presentation().confirm_enabled);

    rig.ctl.update(|s| s.bowl_present = false);
    rig.poll();

    assert_eq!(rig.screen.selection(), PortionSelection::None);
    let p = rig.screen.presentation();
    assert_eq!(p.label, "Please place bowl in bay below");
    assert_eq!(p.selection, PortionSelection::None);
    assert!(rig.screen.events().events.contains(&AppEvent::SelectionReset {
        discarded: PortionSelection::Large
    }));

    // Bowl back: the operator has to choose again.
    rig.ctl.update(|s| s.bowl_present = true);
    rig.poll();
    assert_eq!(rig.screen.presentation().label, "Please select a portion size");
}

// ── Scenario D: timeout outranks busy ────────────────────────

#[test]
fn hopper_timeout_outranks_busy_dispenser() {
    let rig = Rig::new(DispenseMode::Classic, MockController::new(facts(true, true, true)));
    rig.poll();

    let p = rig.screen.presentation();
    assert_eq!(p.label, "Empty, please refill");
    assert_eq!(p.style, StyleClass::TimedOut);
    assert!(!p.confirm_enabled);
    assert_eq!(
        rig.confirm(),
        Ok(ConfirmOutcome::Rejected(RuleId::HopperEmpty))
    );
}

// ── Round-trip: Small → Large → confirm ──────────────────────

#[test]
fn last_selection_wins_on_confirm() {
    let rig = Rig::new(DispenseMode::SizeSelectable, MockController::ready());
    rig.poll();

    rig.screen.select_size(PortionSelection::Small);
    rig.screen.select_size(PortionSelection::Large);
    assert_eq!(
        rig.confirm(),
        Ok(ConfirmOutcome::Sent(DispenseIntent::RegularDispense))
    );
    assert_eq!(rig.ctl.sent(), vec![UiRequest::RegularDispense]);
}

#[test]
fn small_selection_sends_small_dispense() {
    let rig = Rig::new(DispenseMode::SizeSelectable, MockController::ready());
    rig.poll();
    let r = block_on(
        rig.screen
            .handle_command(OperatorCommand::SelectSize(PortionSelection::Small)),
    );
    assert_eq!(r, Ok(None));
    let r = block_on(rig.screen.handle_command(OperatorCommand::Confirm));
    assert_eq!(
        r,
        Ok(Some(ConfirmOutcome::Sent(DispenseIntent::SmallDispense)))
    );
}

// ── Stale confirm race ───────────────────────────────────────

#[test]
fn confirm_after_facts_changed_is_dropped() {
    let rig = Rig::new(DispenseMode::Classic, MockController::ready());
    rig.poll();
    let shown = rig.screen.presentation();
    assert!(shown.confirm_enabled);

    // Hopper runs dry between render and tap.
    rig.ctl.update(|s| s.hopper_empty = true);
    rig.poll();

    assert_eq!(
        rig.confirm(),
        Ok(ConfirmOutcome::Rejected(RuleId::HopperEmpty))
    );
    assert!(rig.ctl.sent().is_empty());
    assert!(rig.screen.events().events.contains(&AppEvent::ConfirmRejected {
        rule: RuleId::HopperEmpty
    }));
}

#[test]
fn observed_busy_blocks_repeat_confirm() {
    let rig = Rig::new(DispenseMode::Classic, MockController::ready());
    rig.poll();
    assert!(rig.confirm().unwrap().was_sent());

    rig.ctl.update(|s| s.dispenser_busy = true);
    rig.poll();
    assert_eq!(rig.screen.presentation().label, "Dispensing, please wait");
    assert_eq!(
        rig.confirm(),
        Ok(ConfirmOutcome::Rejected(RuleId::DispenserBusy))
    );
    assert_eq!(rig.ctl.sent().len(), 1);
}

#[test]
fn each_tap_sends_one_intent_without_debounce() {
    let rig = Rig::new(DispenseMode::Classic, MockController::ready());
    rig.poll();
    rig.confirm().unwrap();
    rig.confirm().unwrap();
    assert_eq!(rig.ctl.sent().len(), 2);
}

// ── Send failure ─────────────────────────────────────────────

#[test]
fn send_failure_leaves_screen_ready_for_retry() {
    let rig = Rig::new(DispenseMode::SizeSelectable, MockController::ready());
    rig.poll();
    rig.screen.select_size(PortionSelection::Small);
    rig.ctl.fail_sends(ControllerError::Timeout);

    assert_eq!(
        rig.confirm(),
        Err(DispatchError::SendFailed(ControllerError::Timeout))
    );
    assert_eq!(rig.screen.selection(), PortionSelection::Small);
    assert!(rig.screen.presentation().confirm_enabled);
    assert!(rig.ctl.sent().is_empty());
    assert!(rig
        .screen
        .events()
        .events
        .contains(&AppEvent::DispatchFailed(ControllerError::Timeout)));

    rig.ctl.accept_sends();
    assert_eq!(
        rig.confirm(),
        Ok(ConfirmOutcome::Sent(DispenseIntent::SmallDispense))
    );
}

// ── Transient fetch failure ──────────────────────────────────

#[test]
fn failed_fetch_keeps_last_snapshot_and_selection() {
    let rig = Rig::new(DispenseMode::SizeSelectable, MockController::ready());
    rig.poll();
    rig.screen.select_size(PortionSelection::Large);
    let before = rig.screen.snapshot();

    // The bowl really is gone, but the sensor read fails.
    rig.ctl.update(|s| s.bowl_present = false);
    rig.ctl.fail(HardwareFact::BowlPresence);
    assert_eq!(
        rig.poll(),
        CycleOutcome::Retained {
            failed: HardwareFact::BowlPresence.mask()
        }
    );
    assert_eq!(rig.screen.snapshot(), before);
    assert_eq!(rig.screen.selection(), PortionSelection::Large);

    rig.ctl.heal();
    rig.poll();
    assert_eq!(rig.screen.selection(), PortionSelection::None);
}

#[test]
fn unpolled_screen_is_not_ready() {
    let rig = Rig::new(DispenseMode::Classic, MockController::ready());
    assert!(!rig.screen.presentation().confirm_enabled);
    assert_eq!(
        rig.confirm(),
        Ok(ConfirmOutcome::Rejected(RuleId::BowlMissing))
    );
}

// ── Admin pass-through ───────────────────────────────────────

#[test]
fn admin_commands_reach_controller() {
    let rig = Rig::new(DispenseMode::Classic, MockController::ready());
    block_on(rig.screen.handle_admin(AdminCommand::ClearHopperTimeout)).unwrap();
    block_on(
        rig.screen
            .handle_admin(AdminCommand::SetRunState(RunState::Emptying)),
    )
    .unwrap();
    assert_eq!(
        *rig.ctl.admin_calls.borrow(),
        vec![
            AdminCall::ClearTimeout,
            AdminCall::RunState(RunState::Emptying)
        ]
    );
}

#[test]
fn admin_failure_is_not_retried() {
    let rig = Rig::new(DispenseMode::Classic, MockController::ready());
    rig.ctl.fail_admin(ControllerError::Unreachable);
    let r = block_on(rig.screen.handle_admin(AdminCommand::ClearHopperTimeout));
    assert_eq!(r, Err(ControllerError::Unreachable));
    assert!(rig.ctl.admin_calls.borrow().is_empty());
}

// ── Defect reporting ─────────────────────────────────────────

#[test]
fn invariant_violation_lands_in_defect_log() {
    let mut sinks = (RecordingSink::new(), DefectReporter::new(MemoryStore::new()));
    let failed: Result<ConfirmOutcome, DispatchError> =
        Err(DispatchError::InvariantViolation("size-selectable confirm with no portion"));
    sinks.emit(&AppEvent::from_confirm(&failed));

    assert_eq!(sinks.0.events.len(), 1);
    let entries = sinks.1.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].reason.as_str(),
        "size-selectable confirm with no portion"
    );
}

// ── Mounted lifecycle ────────────────────────────────────────

fn fast_config(mode: DispenseMode) -> KioskConfig {
    KioskConfig {
        dispense_mode: mode,
        poll_interval_ms: 50,
        fetch_timeout_ms: 40,
        ..KioskConfig::default()
    }
}

#[test]
fn mount_polls_at_once_and_unmount_stops_polling() {
    let ctl = Rc::new(MockController::ready());
    let config = fast_config(DispenseMode::Classic);
    let screen = Rc::new(DispenseScreen::from_config(
        Rc::clone(&ctl),
        &config,
        RecordingSink::new(),
    ));
    let executor: edge_executor::LocalExecutor<'_, 8> = edge_executor::LocalExecutor::new();

    block_on(executor.run(async {
        let mounted = screen.mount(&executor, &config);
        assert!(mounted.poller().is_running());
        async_io_mini::Timer::after(Duration::from_millis(20)).await;
        assert!(mounted.presentation().confirm_enabled);

        mounted.unmount();
        let fetches = ctl.fetches();
        async_io_mini::Timer::after(Duration::from_millis(150)).await;
        assert_eq!(ctl.fetches(), fetches, "poller kept fetching after unmount");
    }));

    let sink = screen.events();
    let events = &sink.events;
    assert_eq!(events.first(), Some(&AppEvent::Mounted(DispenseMode::Classic)));
    assert_eq!(events.last(), Some(&AppEvent::Unmounted));
}

#[test]
fn post_confirm_refresh_picks_up_busy_flag() {
    for refresh in [true, false] {
        let ctl = Rc::new(MockController::ready());
        let config = KioskConfig {
            poll_interval_ms: 5000,
            refresh_after_confirm: refresh,
            ..KioskConfig::default()
        };
        let screen = Rc::new(DispenseScreen::from_config(
            Rc::clone(&ctl),
            &config,
            RecordingSink::new(),
        ));
        let executor: edge_executor::LocalExecutor<'_, 8> = edge_executor::LocalExecutor::new();

        block_on(executor.run(async {
            let mounted = screen.mount(&executor, &config);
            async_io_mini::Timer::after(Duration::from_millis(20)).await;
            assert!(mounted.presentation().confirm_enabled);

            // The controller starts dispensing as soon as it accepts.
            ctl.update(|s| s.dispenser_busy = true);
            assert!(mounted.confirm().await.unwrap().was_sent());
            assert_eq!(
                mounted.presentation().confirm_enabled,
                !refresh,
                "refresh={refresh}"
            );
        }));
    }
}
