//! Cyberfly BLE provisioning library.
//!
//! Exposes the provisioning engine for integration testing and for the
//! firmware binary.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module; on the host the
//! adapters fall back to null / std implementations.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod boot;
pub mod config;
pub mod drivers;
pub mod error;
pub mod events;
pub mod fsm;
pub mod link;

pub use app::service::{Provisioner, SessionOutcome, run_provisioning};
