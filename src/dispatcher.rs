//! Operator confirm → controller command.
//!
//! The dispatcher never trusts what the view showed.  At the instant of a
//! confirm it re-runs the rule table against the snapshot and selection it
//! is handed, and only an enabled rule lets exactly one
//! `update_ui_request` through.  No debouncing: a second confirm after the
//! busy flag is observed is stopped by the busy rule, not by a timer.

use log::{error, info, warn};

use crate::app::ports::ControllerPort;
use crate::error::DispatchError;
use crate::model::{DispenseIntent, DispenseMode, HardwareSnapshot, PortionSelection, UiRequest};
use crate::presentation::{self, RuleId};

/// Result of a confirm that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// The intent reached the controller.
    Sent(DispenseIntent),
    /// Facts changed under the operator; nothing was sent.
    Rejected(RuleId),
}

impl ConfirmOutcome {
    pub fn was_sent(&self) -> bool {
        matches!(self, Self::Sent(_))
    }
}

/// Resolve the intent for an already-validated confirm.
pub fn intent_for(
    mode: DispenseMode,
    selection: PortionSelection,
) -> Result<DispenseIntent, DispatchError> {
    match (mode, selection) {
        (DispenseMode::Classic, _) => Ok(DispenseIntent::RegularDispense),
        (DispenseMode::SizeSelectable, PortionSelection::Small) => {
            Ok(DispenseIntent::SmallDispense)
        }
        (DispenseMode::SizeSelectable, PortionSelection::Large) => {
            Ok(DispenseIntent::RegularDispense)
        }
        (DispenseMode::SizeSelectable, PortionSelection::None) => Err(
            DispatchError::InvariantViolation("size-selectable confirm with no portion"),
        ),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IntentDispatcher {
    mode: DispenseMode,
}

impl IntentDispatcher {
    pub fn new(mode: DispenseMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> DispenseMode {
        self.mode
    }

    /// Validate and, if the current facts allow it, send one intent.
    pub async fn confirm<C: ControllerPort>(
        &self,
        controller: &C,
        snapshot: &HardwareSnapshot,
        selection: PortionSelection,
    ) -> Result<ConfirmOutcome, DispatchError> {
        let rule = presentation::matching_rule(snapshot, selection, self.mode);
        if !rule.confirm_enabled {
            info!("confirm dropped: {} in effect", rule.name);
            return Ok(ConfirmOutcome::Rejected(rule.id));
        }

        let intent = intent_for(self.mode, selection).inspect_err(|e| {
            error!("confirm defect under {}: {}", rule.name, e);
        })?;

        match controller.update_ui_request(UiRequest::from(intent)).await {
            Ok(()) => {
                info!("intent sent: {:?}", intent);
                Ok(ConfirmOutcome::Sent(intent))
            }
            Err(e) => {
                warn!("intent {:?} not delivered: {}", intent, e);
                Err(DispatchError::SendFailed(e))
            }
        }
    }
}
