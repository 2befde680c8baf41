//! Fuzz target: `DefectLog` ring buffer
//!
//! Writes arbitrary reasons, then plants arbitrary bytes in one slot and
//! in the index key, and checks:
//! - No panics on garbage slot or index blobs
//! - `read_all` never returns more than 4 entries
//! - `clear` always leaves the ring empty
//!
//! cargo fuzz run fuzz_defect_log

#![no_main]

use libfuzzer_sys::fuzz_target;

use ichibu::adapters::memory_store::MemoryStore;
use ichibu::diagnostics::{DefectEntry, DefectLog};

fuzz_target!(|data: &[u8]| {
    let Some((&head, rest)) = data.split_first() else {
        return;
    };

    let mut store = MemoryStore::new();
    let mut log = DefectLog::new();
    log.init(&store);

    let writes = (head as usize % 8) + 1;
    let reason = String::from_utf8_lossy(rest);
    for i in 0..writes {
        log.write_entry(&mut store, &DefectEntry::new(i as u64, &reason));
    }
    assert!(log.read_all(&store).len() <= 4);

    // Corrupt one slot and the index, then reopen.
    let slot = format!("d{}", head % 4);
    store.put_raw("defect", &slot, rest);
    store.put_raw("defect", "defect_idx", rest);
    let mut reopened = DefectLog::new();
    reopened.init(&store);
    assert!(reopened.read_all(&store).len() <= 4);
    reopened.write_entry(&mut store, &DefectEntry::new(0, "after corruption"));

    reopened.clear(&mut store);
    assert!(reopened.read_all(&store).is_empty());
    assert_eq!(reopened.count(&store), 0);
});
