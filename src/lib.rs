//! Ichibu kiosk dispense-control core.
//!
//! Polls the dispenser controller, derives what the operator screen shows
//! from the latest facts, and forwards only validated dispense intents.
//! The view layer and the controller transport live outside this crate
//! behind the port traits in [`app::ports`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod diagnostics;
pub mod dispatcher;
pub mod error;
pub mod model;
pub mod poller;
pub mod presentation;
pub mod selection;
