//! Session blackboard.
//!
//! `ProvisioningSession` is the single, exclusively owned struct the
//! supervisor threads through every handler.  Nothing else holds session
//! state; radio callbacks only enqueue events.

use log::info;

use crate::app::ports::ServiceHandles;
use crate::config::{ProtocolConfig, SessionOptions};
use crate::link::framer::FragmentBuffer;

use super::{ConnectionState, SessionEvent};

pub struct ProvisioningSession {
    // -- Identity --
    pub name: heapless::String<{ crate::config::MAX_NAME_LEN }>,
    pub timeout_ms: u64,
    pub auto_restart: bool,

    // -- Lifecycle --
    state: ConnectionState,
    /// True while the radio is believed to be advertising.
    pub advertising: bool,
    pub conn: Option<u16>,
    pub handles: ServiceHandles,
    /// Notification size budget.  Starts at the ATT default, raised by MTU
    /// exchange up to `local_mtu`.
    pub transport_unit: u16,
    /// MTU we asked the stack for at bring-up.
    pub local_mtu: u16,
    pub attempts: u32,

    // -- Timing (ms, monotonic) --
    pub started_at: u64,
    pub last_health_check: u64,
    pub last_adv_check: u64,
    pub last_blink: u64,
    pub fast_until: u64,
    /// Set once the fast window has been traded for slow advertising.
    pub slow_switched: bool,

    // -- Inbound --
    pub buffer: FragmentBuffer,
}

impl ProvisioningSession {
    pub fn new(opts: &SessionOptions, cfg: &ProtocolConfig, now_ms: u64) -> Self {
        Self {
            name: opts.name.clone(),
            timeout_ms: opts.timeout_ms(),
            auto_restart: opts.auto_restart,
            state: ConnectionState::Idle,
            advertising: false,
            conn: None,
            handles: ServiceHandles::default(),
            transport_unit: cfg.default_mtu,
            local_mtu: cfg.default_mtu,
            attempts: 0,
            started_at: now_ms,
            last_health_check: now_ms,
            last_adv_check: now_ms,
            last_blink: now_ms,
            fast_until: now_ms + cfg.fast_adv_window_ms,
            slow_switched: false,
            buffer: FragmentBuffer::new(cfg.max_rx_bytes, cfg.fragment_timeout_ms),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Apply `event`.  Returns `true` if the state changed.
    pub fn apply(&mut self, event: SessionEvent) -> bool {
        match self.state.on_event(event) {
            Some(next) => {
                info!("PROV: {:?} -> {:?} ({:?})", self.state, next, event);
                self.state = next;
                true
            }
            None => false,
        }
    }

    pub fn saved(&self) -> bool {
        self.state == ConnectionState::Saved
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.started_at)
    }

    /// Session budget exhausted (and not already finished).
    pub fn deadline_passed(&self, now_ms: u64) -> bool {
        !self.state.is_terminal() && self.elapsed_ms(now_ms) >= self.timeout_ms
    }

    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.timeout_ms.saturating_sub(self.elapsed_ms(now_ms))
    }
}
