//! Cyberfly provisioning firmware — main entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │                                                              │
//! │  BluedroidRadio   FileConfigStore   SystemRestart            │
//! │  (RadioPort)      (ConfigStore)     (RestartPort)            │
//! │  MonotonicClock   StatusLed / BootButton                     │
//! │  (Clock)          (GPIO2 / GPIO0)                            │
//! │                                                              │
//! │  ──────────────── Port Trait Boundary ─────────────────      │
//! │                                                              │
//! │  ┌──────────────────────────────────────────────────────┐    │
//! │  │            Provisioner (pure logic)                  │    │
//! │  │  FSM · Framer · Completeness · Processor             │    │
//! │  └──────────────────────────────────────────────────────┘    │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use anyhow::Result;
use log::{error, info, warn};

use esp_idf_svc::hal::gpio::{PinDriver, Pull};
use esp_idf_svc::hal::peripherals::Peripherals;

use cyberfly_provision::adapters::radio::BluedroidRadio;
use cyberfly_provision::adapters::restart::SystemRestart;
use cyberfly_provision::adapters::storage::{self, FileConfigStore, DEFAULT_RECORD_PATH};
use cyberfly_provision::adapters::time::MonotonicClock;
use cyberfly_provision::app::ports::{Platform, RestartPort};
use cyberfly_provision::boot::{self, BootDecision, BOOT_PROVISION_TIMEOUT_SECS};
use cyberfly_provision::config::DEFAULT_DEVICE_NAME;
use cyberfly_provision::drivers::button::BootButton;
use cyberfly_provision::drivers::status_led::StatusLed;
use cyberfly_provision::run_provisioning;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Cyberfly provisioning v{}        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Storage ────────────────────────────────────────────
    if let Err(e) = storage::init_nvs() {
        warn!("NVS init failed ({}), radio bring-up may fail", e);
    }
    if let Err(e) = storage::mount_spiffs() {
        warn!("SPIFFS mount failed ({}), configuration will not persist", e);
    }
    let store = FileConfigStore::new(DEFAULT_RECORD_PATH);

    // ── 3. GPIO ───────────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let mut button_pin = PinDriver::input(peripherals.pins.gpio0)?;
    button_pin.set_pull(Pull::Up)?;
    let led_pin = PinDriver::output(peripherals.pins.gpio2)?;

    let mut clock = MonotonicClock::new();
    let held = BootButton::new(button_pin).held_at_boot(&mut clock);

    // ── 4. Boot decision ──────────────────────────────────────
    match boot::decide(&store, held) {
        BootDecision::Run(record) => {
            info!(
                "Configured for device '{}' on network '{}'",
                record.device_id, record.network_id
            );
            Ok(())
        }
        BootDecision::Provision(reason) => {
            info!("Entering provisioning ({:?})", reason);
            let platform = Platform::new(BluedroidRadio::new(), store, SystemRestart, clock)
                .with_indicator(StatusLed::new(led_pin));

            let saved = run_provisioning(platform, DEFAULT_DEVICE_NAME, BOOT_PROVISION_TIMEOUT_SECS, true);
            if !saved {
                info!("Provisioning window closed without configuration, restarting");
            }
            // Either outcome ends in a restart: a saved record is picked up
            // on the next boot, a timeout retries.
            if let Err(e) = SystemRestart.restart() {
                error!("Restart failed: {}", e);
            }
            Ok(())
        }
    }
}
