//! Single-colour liveness LED.
//!
//! Blinks at a fixed cadence while the device is in provisioning mode so a
//! user can tell it is waiting for the app.  Works over any
//! `embedded-hal` output pin; on the board this is GPIO2.
//!
//! Pin errors are logged once per call and otherwise ignored: a dead LED
//! must never interrupt provisioning.

use embedded_hal::digital::{ErrorType, OutputPin};
use log::debug;

pub struct StatusLed<P> {
    pin: P,
    lit: bool,
}

impl<P: OutputPin> StatusLed<P> {
    /// Wrap `pin` and drive it low.
    pub fn new(pin: P) -> Self {
        let mut led = Self { pin, lit: true };
        led.set(false);
        led
    }

    pub fn set(&mut self, on: bool) {
        if on == self.lit {
            return;
        }
        let res = if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        match res {
            Ok(()) => self.lit = on,
            Err(_) => debug!("LED: pin write failed"),
        }
    }

    pub fn toggle(&mut self) {
        self.set(!self.lit);
    }

    pub fn off(&mut self) {
        self.set(false);
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }

    pub fn release(self) -> P {
        self.pin
    }
}

/// Placeholder pin for boards without an indicator.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLed;

impl ErrorType for NoLed {
    type Error = core::convert::Infallible;
}

impl OutputPin for NoLed {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
