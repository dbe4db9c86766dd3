//! Device restart.
//!
//! - **`target_os = "espidf"`** — `esp_restart()`, which never returns.
//! - **host** — restart is unavailable; the caller sees the error and
//!   treats it as a restart that did not happen.

use crate::app::ports::RestartPort;
use crate::error::HwResult;

#[derive(Debug, Default)]
pub struct SystemRestart;

impl RestartPort for SystemRestart {
    #[cfg(target_os = "espidf")]
    fn restart(&mut self) -> HwResult<()> {
        log::info!("BOOT: restarting");
        // SAFETY: esp_restart has no preconditions.
        unsafe { esp_idf_svc::sys::esp_restart() }
    }

    #[cfg(not(target_os = "espidf"))]
    fn restart(&mut self) -> HwResult<()> {
        log::warn!("BOOT: restart requested on a host build");
        Err(crate::error::HwError::Unavailable)
    }
}
