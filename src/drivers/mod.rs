//! Board-level drivers over `embedded-hal` pins.

pub mod button;
pub mod status_led;
