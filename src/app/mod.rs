//! Application core — dispense-screen orchestration, zero direct I/O.
//!
//! This module wires the poller, selection state, presentation rules and
//! intent dispatcher into one mounted screen.  All interaction with the
//! controller and the rest of the kiosk happens through **port traits**
//! defined in [`ports`], keeping this layer fully testable with mocks.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
