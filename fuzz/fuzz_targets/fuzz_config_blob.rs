//! Fuzz target: persisted config decoding
//!
//! Feeds arbitrary bytes in as the stored config blob.  Loading must never
//! panic, and anything it accepts must pass validation.
//!
//! cargo fuzz run fuzz_config_blob

#![no_main]

use libfuzzer_sys::fuzz_target;

use ichibu::adapters::memory_store::MemoryStore;
use ichibu::app::ports::ConfigPort;

fuzz_target!(|data: &[u8]| {
    let store = MemoryStore::new();
    store.put_raw("kiosk", "kioskcfg", data);
    if let Ok(cfg) = store.load() {
        assert!(cfg.validate().is_ok());
        assert!(cfg.fetch_timeout() <= cfg.poll_interval());
    }
});
