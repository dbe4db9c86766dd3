//! Application core — provisioning logic behind port traits.
//!
//! This module holds the protocol rules: what a valid configuration
//! message is, what the peer is told, and how a session is supervised.
//! All interaction with hardware happens through the traits in [`ports`],
//! keeping this layer fully testable without a radio.

pub mod ports;
pub mod processor;
pub mod record;
pub mod service;
pub mod status;
