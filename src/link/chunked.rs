//! Chunked notification delivery.
//!
//! Outbound status payloads can exceed a single notification when the link
//! is still on the default ATT MTU.  The payload is split into pieces that
//! fit `transport_unit - ATT header`, never smaller than the configured
//! minimum, and sent in order with a short pause every few pieces so the
//! controller's TX queue does not overflow.
//!
//! ```text
//! payload ──▶ [piece 1][piece 2][piece 3] ─pause─ [piece 4] ...
//! ```

use embedded_hal::delay::DelayNs;
use log::{debug, warn};

use crate::app::ports::RadioPort;
use crate::config::ProtocolConfig;

/// Splitting and pacing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    pub piece_len: usize,
    pub pace_every: usize,
    pub pace_ms: u32,
}

impl ChunkPlan {
    pub fn new(transport_unit: u16, cfg: &ProtocolConfig) -> Self {
        let usable = usize::from(transport_unit).saturating_sub(cfg.att_overhead);
        Self {
            piece_len: usable.max(cfg.min_chunk).max(1),
            pace_every: cfg.pacing_every,
            pace_ms: cfg.pacing_delay_ms,
        }
    }

    /// Number of pieces `len` bytes will be split into.
    pub fn pieces(&self, len: usize) -> usize {
        len.div_ceil(self.piece_len)
    }
}

/// Send `payload` on `handle` as a paced sequence of notifications.
///
/// Returns `false` on the first failed piece; nothing is retried.
pub fn send_chunked<R: RadioPort, D: DelayNs>(
    radio: &mut R,
    delay: &mut D,
    conn: u16,
    handle: u16,
    payload: &[u8],
    plan: &ChunkPlan,
) -> bool {
    debug!("BLE: sending {} bytes in {} pieces", payload.len(), plan.pieces(payload.len()));
    for (i, piece) in payload.chunks(plan.piece_len).enumerate() {
        if let Err(e) = radio.notify(conn, handle, piece) {
            warn!("BLE: notify piece {} failed: {}", i, e);
            return false;
        }
        let sent = i + 1;
        if plan.pace_every > 0 && sent % plan.pace_every == 0 && sent * plan.piece_len < payload.len() {
            delay.delay_ms(plan.pace_ms);
        }
    }
    true
}
