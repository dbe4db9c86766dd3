//! Boot button long-hold detection.
//!
//! ## Hardware
//!
//! Active-low momentary switch with internal pull-up (GPIO0, the BOOT
//! strap on most dev boards).
//!
//! ## Gesture
//!
//! | Gesture    | Condition                          | Result                   |
//! |------------|------------------------------------|--------------------------|
//! | Long hold  | Low continuously for > hold window | force provisioning mode  |
//! | Anything else | released earlier / never pressed | normal boot             |
//!
//! The check runs once at boot, before any radio work, so it simply polls.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::InputPin;

pub const LONG_HOLD_MS: u32 = 3000;
pub const POLL_MS: u32 = 50;

pub struct BootButton<P> {
    pin: P,
    hold_ms: u32,
    poll_ms: u32,
}

impl<P: InputPin> BootButton<P> {
    pub fn new(pin: P) -> Self {
        Self {
            pin,
            hold_ms: LONG_HOLD_MS,
            poll_ms: POLL_MS,
        }
    }

    fn pressed(&mut self) -> bool {
        // Unreadable pin reads as "not pressed".
        self.pin.is_low().unwrap_or(false)
    }

    /// Poll until the button is released or held past the window.
    /// Returns `true` for a long hold.
    pub fn held_at_boot(&mut self, delay: &mut impl DelayNs) -> bool {
        let mut held = 0u32;
        while self.pressed() {
            if held > self.hold_ms {
                return true;
            }
            delay.delay_ms(self.poll_ms);
            held = held.saturating_add(self.poll_ms);
        }
        false
    }
}
