//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter          | Implements     | Connects to                |
//! |------------------|----------------|----------------------------|
//! | `log_sink`       | EventSink      | `log` facade / console     |
//! | `memory_store`   | ConfigPort     | In-memory postcard blobs   |
//! |                  | StoragePort    |                            |
//! | `sim_controller` | ControllerPort | In-process dispenser model |

pub mod log_sink;
pub mod memory_store;
pub mod sim_controller;
