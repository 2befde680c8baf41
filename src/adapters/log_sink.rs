//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events
//! through the `log` facade (the binary routes it to `tracing-subscriber`).
//! An analytics or telemetry adapter would implement the same trait.

use log::{error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Mounted(mode) => {
                info!("MOUNT | mode={:?}", mode);
            }
            AppEvent::Unmounted => {
                info!("MOUNT | unmounted");
            }
            AppEvent::SnapshotUpdated(s) => {
                info!(
                    "SNAP  | bowl={} busy={} hopper={} count={}",
                    if s.bowl_present { "IN" } else { "OUT" },
                    s.dispenser_busy,
                    if s.hopper_empty { "EMPTY" } else { "OK" },
                    s.dispense_count,
                );
            }
            AppEvent::SelectionChanged(sel) => {
                info!("SEL   | {:?}", sel);
            }
            AppEvent::SelectionReset { discarded } => {
                info!("SEL   | reset, discarded={:?}", discarded);
            }
            AppEvent::IntentSent(intent) => {
                info!("DISP  | sent {:?}", intent);
            }
            AppEvent::ConfirmRejected { rule } => {
                info!("DISP  | dropped, rule={:?}", rule);
            }
            AppEvent::DispatchFailed(e) => {
                warn!("DISP  | send failed: {}", e);
            }
            AppEvent::DefectDetected(what) => {
                error!("DEFECT| {}", what);
            }
            AppEvent::AdminForwarded(cmd) => {
                info!("ADMIN | {:?} ok", cmd);
            }
            AppEvent::AdminFailed { command, error } => {
                warn!("ADMIN | {:?} failed: {}", command, error);
            }
        }
    }
}
