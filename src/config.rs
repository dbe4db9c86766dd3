//! Protocol and session configuration.
//!
//! [`ProtocolConfig`] holds every constant that is shared with the companion
//! application or tuned for the radio.  It is passed into the engine at
//! construction so tests and parallel sessions never share globals.
//! Changing the UUIDs, `max_rx_bytes` or `fragment_timeout_ms` breaks
//! compatibility with deployed apps.

use serde::{Deserialize, Serialize};

/// Nordic-UART-style service carrying the provisioning exchange.
pub const SERVICE_UUID: u128 = 0x6e40_0001_b5a3_f393_e0a9_e50e_24dc_ca9e;
/// Client → device (write / write-without-response).
pub const RX_CHAR_UUID: u128 = 0x6e40_0002_b5a3_f393_e0a9_e50e_24dc_ca9e;
/// Device → client (notify + read).
pub const TX_CHAR_UUID: u128 = 0x6e40_0003_b5a3_f393_e0a9_e50e_24dc_ca9e;

/// Default advertised name.
pub const DEFAULT_DEVICE_NAME: &str = "CYBERFLY-SETUP";
/// Maximum advertised name length in bytes.
pub const MAX_NAME_LEN: usize = 20;
/// Network id written when the app does not send one.
pub const DEFAULT_NETWORK_ID: &str = "mainnet01";

/// Connection parameters requested from the central once it connects.
/// Values are in controller units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnParams {
    /// Connection interval bounds, 1.25 ms units.
    pub interval_min: u16,
    pub interval_max: u16,
    /// Connection events the peripheral may skip.
    pub latency: u16,
    /// Supervision timeout, 10 ms units.
    pub supervision_timeout: u16,
}

/// Versioned wire and timing parameters for one provisioning session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Bumped whenever a field below changes meaning on the wire.
    pub version: u16,

    // --- Transport identifiers ---
    pub service_uuid: u128,
    pub rx_char_uuid: u128,
    pub tx_char_uuid: u128,

    // --- Inbound framing ---
    /// Reassembly capacity.  Must equal the app's `MAX_JSON_SIZE`.
    pub max_rx_bytes: usize,
    /// Partial messages older than this are dropped on the next fragment.
    pub fragment_timeout_ms: u64,

    // --- Outbound framing ---
    /// ATT default MTU before any exchange.
    pub default_mtu: u16,
    /// Local MTUs to request, most preferred first.
    pub preferred_mtus: [u16; 2],
    /// ATT notification header bytes.
    pub att_overhead: usize,
    /// Smallest piece ever sent.
    pub min_chunk: usize,
    /// Pause after this many pieces.
    pub pacing_every: usize,
    pub pacing_delay_ms: u32,

    // --- Advertising ---
    pub fast_adv_interval_ms: u32,
    pub slow_adv_interval_ms: u32,
    pub fallback_adv_interval_ms: u32,
    /// Fast advertising lasts this long before dropping to slow.
    pub fast_adv_window_ms: u64,
    /// How often to verify advertising is still running.
    pub adv_check_interval_ms: u64,
    /// Pause between stopping and restarting advertising.
    pub adv_restart_delay_ms: u32,

    // --- Link supervision ---
    pub health_interval_ms: u64,
    /// Requested on every connect; the central may refuse.
    pub conn_params: ConnParams,
    pub connect_settle_ms: u32,
    pub disconnect_readvertise_ms: u32,

    // --- Supervisor ---
    pub loop_period_ms: u32,
    pub blink_period_ms: u64,
    pub min_session_secs: u32,
    pub max_session_secs: u32,

    // --- Radio bring-up ---
    pub radio_reset_ms: u32,
    pub radio_settle_ms: u32,

    // --- Completion ---
    /// Time for the `saved` notification and filesystem to flush.
    pub save_flush_ms: u32,
    pub pre_restart_ms: u32,
    /// If the device is still running this long after a restart request
    /// the condition is reported as fatal.
    pub restart_grace_ms: u32,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            version: 2,

            service_uuid: SERVICE_UUID,
            rx_char_uuid: RX_CHAR_UUID,
            tx_char_uuid: TX_CHAR_UUID,

            max_rx_bytes: 384,
            fragment_timeout_ms: 2000,

            default_mtu: 23,
            preferred_mtus: [512, 180],
            att_overhead: 3,
            min_chunk: 20,
            pacing_every: 3,
            pacing_delay_ms: 20,

            fast_adv_interval_ms: 50,
            slow_adv_interval_ms: 200,
            fallback_adv_interval_ms: 100,
            fast_adv_window_ms: 60_000,
            adv_check_interval_ms: 10_000,
            adv_restart_delay_ms: 50,

            health_interval_ms: 5000,
            conn_params: ConnParams {
                interval_min: 6,
                interval_max: 12,
                latency: 0,
                supervision_timeout: 200,
            },
            connect_settle_ms: 30,
            disconnect_readvertise_ms: 50,

            loop_period_ms: 50,
            blink_period_ms: 500,
            min_session_secs: 30,
            max_session_secs: 600,

            radio_reset_ms: 100,
            radio_settle_ms: 300,

            save_flush_ms: 800,
            pre_restart_ms: 200,
            restart_grace_ms: 2000,
        }
    }
}

/// Caller-facing knobs for a single session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub name: heapless::String<MAX_NAME_LEN>,
    pub timeout_secs: u32,
    pub auto_restart: bool,
}

impl SessionOptions {
    /// Build options, truncating `name` to [`MAX_NAME_LEN`] bytes on a char
    /// boundary and clamping the timeout into the configured bounds.  An
    /// empty name falls back to [`DEFAULT_DEVICE_NAME`].
    pub fn new(name: &str, timeout_secs: u32, auto_restart: bool, cfg: &ProtocolConfig) -> Self {
        let name = if name.is_empty() {
            DEFAULT_DEVICE_NAME
        } else {
            name
        };
        let mut bounded = heapless::String::new();
        for c in name.chars() {
            if bounded.push(c).is_err() {
                break;
            }
        }
        Self {
            name: bounded,
            timeout_secs: timeout_secs.clamp(cfg.min_session_secs, cfg.max_session_secs),
            auto_restart,
        }
    }

    pub fn timeout_ms(&self) -> u64 {
        u64::from(self.timeout_secs) * 1000
    }
}
