//! Defect logging.
//!
//! Stores up to 4 defect entries in a storage ring buffer under the
//! "defect" namespace.  A defect is internal logic reaching a state the
//! presentation rules should make impossible (for example a size-selectable
//! confirm arriving with no portion chosen).  Entries survive restarts so
//! field units can be inspected after the fact.

use log::{error, warn};
use serde::{Deserialize, Serialize};

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, StoragePort};

const DEFECT_RING_SLOTS: usize = 4;
const DEFECT_NAMESPACE: &str = "defect";
const DEFECT_INDEX_KEY: &str = "defect_idx";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefectEntry {
    pub uptime_secs: u64,
    pub reason: heapless::String<64>,
}

impl DefectEntry {
    pub fn new(uptime_secs: u64, reason: &str) -> Self {
        let mut r = heapless::String::new();
        for ch in reason.chars() {
            if r.push(ch).is_err() {
                break;
            }
        }
        Self {
            uptime_secs,
            reason: r,
        }
    }
}

/// Storage-backed ring buffer for defect entries.
#[derive(Debug, Default)]
pub struct DefectLog {
    write_index: usize,
}

impl DefectLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the write index from storage, or default to 0.
    pub fn init(&mut self, store: &dyn StoragePort) {
        let mut buf = [0u8; 4];
        if let Ok(4) = store.read(DEFECT_NAMESPACE, DEFECT_INDEX_KEY, &mut buf) {
            self.write_index = u32::from_le_bytes(buf) as usize % DEFECT_RING_SLOTS;
        }
    }

    /// Write an entry to the next ring slot and advance the index.
    pub fn write_entry(&mut self, store: &mut dyn StoragePort, entry: &DefectEntry) {
        let slot_key = Self::slot_key(self.write_index);
        match postcard::to_allocvec(entry) {
            Ok(bytes) => {
                if let Err(e) = store.write(DEFECT_NAMESPACE, &slot_key, &bytes) {
                    warn!("defect log: slot {} write failed: {}", self.write_index, e);
                }
            }
            Err(_) => warn!("defect log: entry did not serialize"),
        }

        self.write_index = (self.write_index + 1) % DEFECT_RING_SLOTS;
        let idx_bytes = (self.write_index as u32).to_le_bytes();
        if let Err(e) = store.write(DEFECT_NAMESPACE, DEFECT_INDEX_KEY, &idx_bytes) {
            warn!("defect log: index write failed: {}", e);
        }
    }

    /// Read all stored entries (up to 4), oldest first.
    pub fn read_all(&self, store: &dyn StoragePort) -> heapless::Vec<DefectEntry, DEFECT_RING_SLOTS> {
        let mut entries = heapless::Vec::new();
        // The next slot to be overwritten holds the oldest entry.
        for offset in 0..DEFECT_RING_SLOTS {
            let slot_key = Self::slot_key((self.write_index + offset) % DEFECT_RING_SLOTS);
            let mut buf = [0u8; 128];
            if let Ok(len) = store.read(DEFECT_NAMESPACE, &slot_key, &mut buf) {
                if let Ok(entry) = postcard::from_bytes::<DefectEntry>(&buf[..len]) {
                    let _ = entries.push(entry);
                }
            }
        }
        entries
    }

    /// Erase all entries and reset the index.
    pub fn clear(&mut self, store: &mut dyn StoragePort) {
        for i in 0..DEFECT_RING_SLOTS {
            let _ = store.delete(DEFECT_NAMESPACE, &Self::slot_key(i));
        }
        let _ = store.delete(DEFECT_NAMESPACE, DEFECT_INDEX_KEY);
        self.write_index = 0;
    }

    pub fn count(&self, store: &dyn StoragePort) -> usize {
        (0..DEFECT_RING_SLOTS)
            .filter(|i| store.exists(DEFECT_NAMESPACE, &Self::slot_key(*i)))
            .count()
    }

    fn slot_key(index: usize) -> heapless::String<16> {
        let mut s = heapless::String::new();
        let _ = core::fmt::Write::write_fmt(&mut s, format_args!("d{}", index));
        s
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink that persists defects
// ───────────────────────────────────────────────────────────────

/// [`EventSink`] that records every [`AppEvent::DefectDetected`] into a
/// [`DefectLog`] and ignores everything else.  Compose it with a logging
/// sink as a tuple: `(LogEventSink::new(), DefectReporter::new(store))`.
pub struct DefectReporter<S> {
    store: S,
    log: DefectLog,
}

impl<S: StoragePort> DefectReporter<S> {
    pub fn new(store: S) -> Self {
        let mut log = DefectLog::new();
        log.init(&store);
        Self { store, log }
    }

    pub fn entries(&self) -> heapless::Vec<DefectEntry, DEFECT_RING_SLOTS> {
        self.log.read_all(&self.store)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clear(&mut self) {
        self.log.clear(&mut self.store);
    }
}

impl<S: StoragePort> EventSink for DefectReporter<S> {
    fn emit(&mut self, event: &AppEvent) {
        if let AppEvent::DefectDetected(reason) = event {
            error!("DEFECT | {}", reason);
            let entry = DefectEntry::new(crate::poller::monotonic_now().as_secs(), reason);
            self.log.write_entry(&mut self.store, &entry);
        }
    }
}
