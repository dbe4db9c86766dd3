//! Inbound fragment reassembly.
//!
//! The companion app streams a JSON object as a sequence of attribute
//! writes with no length header.  [`FragmentBuffer`] glues them back
//! together under three rules:
//!
//! 1. a partial message older than the staleness window is discarded;
//! 2. a fragment whose first non-whitespace byte is `{` starts a new message;
//! 3. the buffer never grows past its limit; on overflow the newest bytes win.
//!
//! No fragment is ever rejected and nothing here can panic.

use log::debug;

/// Hard upper bound on the reassembly buffer.  The runtime limit comes from
/// [`ProtocolConfig::max_rx_bytes`](crate::config::ProtocolConfig) and is
/// clamped to this.
pub const MAX_RX_CAPACITY: usize = 512;

pub struct FragmentBuffer {
    data: heapless::Vec<u8, MAX_RX_CAPACITY>,
    limit: usize,
    stale_after_ms: u64,
    last_fragment_ms: Option<u64>,
}

impl FragmentBuffer {
    pub fn new(limit: usize, stale_after_ms: u64) -> Self {
        Self {
            data: heapless::Vec::new(),
            limit: limit.clamp(1, MAX_RX_CAPACITY),
            stale_after_ms,
            last_fragment_ms: None,
        }
    }

    /// Append one transport fragment received at `now_ms`.
    pub fn append(&mut self, fragment: &[u8], now_ms: u64) {
        if fragment.is_empty() {
            return;
        }

        if let Some(last) = self.last_fragment_ms {
            if now_ms.saturating_sub(last) > self.stale_after_ms {
                debug!("PROV: discarding stale partial ({} bytes)", self.data.len());
                self.data.clear();
            }
        }

        if starts_object(fragment) {
            self.data.clear();
        }

        self.push_bounded(fragment);
        self.last_fragment_ms = Some(now_ms);
    }

    /// Drop everything buffered and restart the staleness clock at `now_ms`.
    pub fn reset(&mut self, now_ms: u64) {
        self.data.clear();
        self.last_fragment_ms = Some(now_ms);
    }

    /// Buffered bytes decoded as UTF-8, skipping invalid sequences.
    pub fn text(&self) -> String {
        decode_lossy(&self.data)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn last_fragment_ms(&self) -> Option<u64> {
        self.last_fragment_ms
    }

    fn push_bounded(&mut self, fragment: &[u8]) {
        let limit = self.limit;
        if self.data.len() + fragment.len() <= limit {
            // Cannot fail: total <= limit <= capacity.
            let _ = self.data.extend_from_slice(fragment);
            return;
        }

        if fragment.len() >= limit {
            self.data.clear();
            let _ = self.data.extend_from_slice(&fragment[fragment.len() - limit..]);
            return;
        }

        let keep = limit - fragment.len();
        let drop = self.data.len() - keep;
        self.data.rotate_left(drop);
        self.data.truncate(keep);
        let _ = self.data.extend_from_slice(fragment);
    }
}

fn starts_object(fragment: &[u8]) -> bool {
    fragment
        .iter()
        .find(|b| !matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
        .is_some_and(|&b| b == b'{')
}

/// Decode UTF-8, silently dropping invalid sequences.
pub fn decode_lossy(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}
