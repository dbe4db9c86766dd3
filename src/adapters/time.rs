//! Monotonic clock adapter.
//!
//! - **`target_os = "espidf"`** — `esp_timer_get_time()` for time,
//!   FreeRTOS task delay for blocking waits.
//! - **`not(target_os = "espidf")`** — `std::time::Instant` and
//!   `std::thread::sleep` for host runs.

use embedded_hal::delay::DelayNs;

use crate::app::ports::Clock;

pub struct MonotonicClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Microseconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    pub fn uptime_us(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
    }

    /// Microseconds since construction (monotonic).
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.uptime_us() / 1000
    }
}

impl DelayNs for MonotonicClock {
    #[cfg(target_os = "espidf")]
    fn delay_ns(&mut self, ns: u32) {
        esp_idf_svc::hal::delay::Delay::new_default().delay_ns(ns);
    }

    #[cfg(target_os = "espidf")]
    fn delay_ms(&mut self, ms: u32) {
        esp_idf_svc::hal::delay::FreeRtos::delay_ms(ms);
    }

    #[cfg(not(target_os = "espidf"))]
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(ns)));
    }
}
