//! Connection / advertising state machine.
//!
//! ```text
//!            start                connect
//!   Idle ───────────▶ Adv(Fast) ──────────▶ Connected ──save──▶ Saved
//!                      │    ▲  ◀──────────────┘
//!            window    │    │   disconnect / probe failure
//!            elapsed   ▼    │
//!                     Adv(Slow) ────connect────▶ Connected
//!
//!   any non-terminal ──timeout──▶ TimedOut
//! ```
//!
//! The transition table is pure: [`ConnectionState::on_event`] never
//! touches the radio.  Side effects live in the supervisor, which applies a
//! transition and then performs whatever the new state requires.

pub mod context;

use crate::link::advertising::AdvMode;

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Idle,
    Advertising(AdvMode),
    Connected,
    /// Configuration persisted.  Terminal.
    Saved,
    /// Session budget exhausted without a save.  Terminal.
    TimedOut,
}

/// Inputs that can move the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Bring-up finished; begin fast advertising.
    Started,
    Connected,
    /// Peer left, or the health probe failed.
    LinkLost,
    /// Fast discovery window elapsed while still advertising.
    WindowElapsed,
    ConfigSaved,
    Timeout,
}

impl ConnectionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Saved | Self::TimedOut)
    }

    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }

    /// Advertising mode the radio should be in, if any.
    pub fn expected_advertising(self) -> Option<AdvMode> {
        match self {
            Self::Advertising(mode) => Some(mode),
            _ => None,
        }
    }

    /// Next state for `event`, or `None` if the event does not apply here.
    pub fn on_event(self, event: SessionEvent) -> Option<Self> {
        use ConnectionState as S;
        use SessionEvent as E;

        if self.is_terminal() {
            return None;
        }
        match (self, event) {
            (_, E::Timeout) => Some(S::TimedOut),
            (S::Idle, E::Started) => Some(S::Advertising(AdvMode::Fast)),
            (S::Advertising(_), E::Connected) => Some(S::Connected),
            (S::Advertising(AdvMode::Fast), E::WindowElapsed) => Some(S::Advertising(AdvMode::Slow)),
            (S::Connected, E::LinkLost) => Some(S::Advertising(AdvMode::Fast)),
            (S::Connected, E::ConfigSaved) => Some(S::Saved),
            _ => None,
        }
    }
}
