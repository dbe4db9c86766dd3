//! Legacy advertising payload and the advertising fallback ladder.
//!
//! Payload layout (AD structures, 31-byte legacy limit):
//!
//! ```text
//! 02 01 06                 flags: LE general discoverable, BR/EDR unsupported
//! LL 09 <name…>            complete local name
//! 03 03 01 18              16-bit service marker 0x1801
//! 02 0A 00                 TX power 0 dBm (only when it still fits)
//! ```
//!
//! Starting advertising walks a ladder of progressively simpler attempts:
//! requested interval with payload, fallback interval with payload, then
//! stack defaults with no payload at all.

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::app::ports::{AdvParams, RadioPort};
use crate::config::ProtocolConfig;

/// Legacy advertising PDU data limit.
pub const MAX_ADV_LEN: usize = 31;

const AD_FLAGS: [u8; 3] = [0x02, 0x01, 0x06];
const AD_TYPE_COMPLETE_NAME: u8 = 0x09;
const AD_SERVICE_MARKER: [u8; 4] = [0x03, 0x03, 0x01, 0x18];
const AD_TX_POWER: [u8; 3] = [0x02, 0x0A, 0x00];

pub type AdvPayload = heapless::Vec<u8, MAX_ADV_LEN>;

/// Advertising cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdvMode {
    /// Short interval for quick discovery right after start or disconnect.
    Fast,
    /// Long interval once the discovery window has passed.
    Slow,
}

impl AdvMode {
    pub fn interval_ms(self, cfg: &ProtocolConfig) -> u32 {
        match self {
            Self::Fast => cfg.fast_adv_interval_ms,
            Self::Slow => cfg.slow_adv_interval_ms,
        }
    }
}

/// Build the advertising data for `name`.
///
/// The name is cut on a char boundary so the mandatory structures always
/// fit; the TX power hint is appended only if room remains.
pub fn build_payload(name: &str) -> AdvPayload {
    let mut out = AdvPayload::new();
    let _ = out.extend_from_slice(&AD_FLAGS);

    let room = MAX_ADV_LEN - AD_FLAGS.len() - AD_SERVICE_MARKER.len() - 2;
    let mut end = name.len().min(room);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    let name = &name.as_bytes()[..end];

    let _ = out.push(name.len() as u8 + 1);
    let _ = out.push(AD_TYPE_COMPLETE_NAME);
    let _ = out.extend_from_slice(name);
    let _ = out.extend_from_slice(&AD_SERVICE_MARKER);

    if out.len() + AD_TX_POWER.len() <= MAX_ADV_LEN {
        let _ = out.extend_from_slice(&AD_TX_POWER);
    }
    out
}

/// Which rung of the ladder succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvRung {
    Requested,
    Fallback,
    Minimal,
}

/// Stop any running advertising, pause briefly, then walk the fallback
/// ladder.  Returns the rung that succeeded or `None` if all failed.
pub fn start_advertising<R: RadioPort, D: DelayNs>(
    radio: &mut R,
    delay: &mut D,
    cfg: &ProtocolConfig,
    name: &str,
    mode: AdvMode,
) -> Option<AdvRung> {
    if let Err(e) = radio.stop_advertising() {
        warn!("BLE: stop advertising failed: {}", e);
    }
    delay.delay_ms(cfg.adv_restart_delay_ms);

    let payload = build_payload(name);
    let interval = mode.interval_ms(cfg);

    let requested = AdvParams {
        interval_ms: Some(interval),
        payload: Some(payload.as_slice()),
    };
    match radio.start_advertising(&requested) {
        Ok(()) => {
            info!("BLE: advertising '{}' at {} ms ({:?})", name, interval, mode);
            return Some(AdvRung::Requested);
        }
        Err(e) => warn!("BLE: advertising at {} ms failed: {}", interval, e),
    }

    let fallback = AdvParams {
        interval_ms: Some(cfg.fallback_adv_interval_ms),
        payload: Some(payload.as_slice()),
    };
    match radio.start_advertising(&fallback) {
        Ok(()) => {
            info!(
                "BLE: advertising '{}' at fallback {} ms",
                name, cfg.fallback_adv_interval_ms
            );
            return Some(AdvRung::Fallback);
        }
        Err(e) => warn!("BLE: fallback advertising failed: {}", e),
    }

    let minimal = AdvParams {
        interval_ms: None,
        payload: None,
    };
    match radio.start_advertising(&minimal) {
        Ok(()) => {
            info!("BLE: advertising in minimal mode");
            Some(AdvRung::Minimal)
        }
        Err(e) => {
            warn!("BLE: all advertising attempts failed: {}", e);
            None
        }
    }
}
