//! Boot-time decision: run with the stored configuration or enter
//! provisioning.
//!
//! | Stored record       | Button held ≥ 3 s | Decision                 |
//! |---------------------|-------------------|--------------------------|
//! | valid               | no                | run                      |
//! | valid               | yes               | provision (user forced)  |
//! | absent / invalid    | —                 | provision                |
//! | unreadable          | —                 | provision                |
//!
//! After provisioning the device always restarts: on success the new
//! record is picked up, on timeout the next boot tries again.

use log::{info, warn};

use crate::app::ports::ConfigStore;
use crate::app::record::DeviceConfigRecord;

/// Session length used when provisioning is entered from boot.
pub const BOOT_PROVISION_TIMEOUT_SECS: u32 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionReason {
    NoConfig,
    InvalidConfig,
    StorageError,
    ButtonHeld,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootDecision {
    Run(DeviceConfigRecord),
    Provision(ProvisionReason),
}

/// Decide how to boot.  `button_held` is the result of the long-hold check.
pub fn decide<S: ConfigStore>(store: &S, button_held: bool) -> BootDecision {
    if button_held {
        info!("BOOT: button held, entering provisioning");
        return BootDecision::Provision(ProvisionReason::ButtonHeld);
    }

    match store.load() {
        Ok(Some(record)) if record.is_valid() => {
            info!("BOOT: configuration found for device '{}'", record.device_id);
            BootDecision::Run(record)
        }
        Ok(Some(_)) => {
            warn!("BOOT: stored configuration is incomplete");
            BootDecision::Provision(ProvisionReason::InvalidConfig)
        }
        Ok(None) => {
            info!("BOOT: no configuration stored");
            BootDecision::Provision(ProvisionReason::NoConfig)
        }
        Err(e) => {
            warn!("BOOT: configuration unreadable: {}", e);
            BootDecision::Provision(ProvisionReason::StorageError)
        }
    }
}
