//! Locally-held operator portion choice.
//!
//! The selection is only meaningful while a bowl sits in the bay.  Every
//! published snapshot is run through [`SelectionState::observe`] before
//! anything is derived from it, so a bowl removal clears the choice in the
//! same step that publishes the removal.

use log::debug;

use crate::model::{HardwareSnapshot, PortionSelection};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionState {
    selection: PortionSelection,
    bowl_present: bool,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current choice; always `None` while no bowl is present.
    pub fn current(&self) -> PortionSelection {
        if self.bowl_present {
            self.selection
        } else {
            PortionSelection::None
        }
    }

    /// Operator tap.  Ignored while the bowl is absent.  Returns whether
    /// the stored selection changed.
    pub fn select(&mut self, size: PortionSelection) -> bool {
        if !self.bowl_present {
            debug!("selection {:?} ignored: no bowl", size);
            return false;
        }
        let changed = self.selection != size;
        self.selection = size;
        changed
    }

    /// Apply a newly published snapshot.  Returns the discarded choice if
    /// this snapshot forced a reset.
    pub fn observe(&mut self, snapshot: &HardwareSnapshot) -> Option<PortionSelection> {
        let was_present = self.bowl_present;
        self.bowl_present = snapshot.bowl_present;
        if snapshot.bowl_present {
            return None;
        }
        let discarded = self.selection;
        self.selection = PortionSelection::None;
        if was_present && discarded.is_chosen() {
            Some(discarded)
        } else {
            None
        }
    }
}
