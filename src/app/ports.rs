//! Port traits — the hexagonal boundary between the provisioning engine
//! and the hardware it runs on.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Provisioner (domain)
//! ```
//!
//! Every capability the engine needs (radio, persistent store, restart,
//! monotonic clock, liveness indicator) is injected once through
//! [`Platform`].  Hosts without a radio plug in a null implementation that
//! answers [`HwError::Unavailable`].
//!
//! ## Security notes
//!
//! - **ConfigStore** implementations MUST make `save` atomic: a failed
//!   write leaves the previous record (or nothing) in place.
//! - Secrets travel through these ports but are never logged.  Inbound
//!   fragments are logged by length only.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::app::record::DeviceConfigRecord;
use crate::config::ConnParams;
use crate::drivers::status_led::StatusLed;
use crate::error::{HwResult, StorageError};
use crate::events::RadioEvent;

// ───────────────────────────────────────────────────────────────
// Radio port (driven adapter: domain ↔ BLE host stack)
// ───────────────────────────────────────────────────────────────

/// The three 128-bit identifiers of the provisioning service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceIds {
    pub service: u128,
    pub rx: u128,
    pub tx: u128,
}

/// Attribute handles assigned by the stack at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServiceHandles {
    /// Write / write-without-response characteristic value.
    pub rx: u16,
    /// Notify + read characteristic value.
    pub tx: u16,
}

/// One advertising attempt.  `payload == None` means "stack defaults,
/// no custom advertising data".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvParams<'a> {
    pub interval_ms: Option<u32>,
    pub payload: Option<&'a [u8]>,
}

/// GAP/GATT operations the engine needs from a BLE peripheral stack.
///
/// Asynchronous stack callbacks never reach the engine directly; they are
/// surfaced through [`poll_event`](Self::poll_event).
pub trait RadioPort {
    /// Power the controller and host stack up.
    fn activate(&mut self) -> HwResult<()>;

    /// Power the controller down.  Idempotent.
    fn deactivate(&mut self) -> HwResult<()>;

    /// Set the GAP device name.
    fn set_device_name(&mut self, name: &str) -> HwResult<()>;

    /// Request a local ATT MTU.
    fn set_local_mtu(&mut self, mtu: u16) -> HwResult<()>;

    /// Register the provisioning service and return its value handles.
    fn register_service(&mut self, ids: &ServiceIds) -> HwResult<ServiceHandles>;

    fn start_advertising(&mut self, params: &AdvParams<'_>) -> HwResult<()>;

    fn stop_advertising(&mut self) -> HwResult<()>;

    /// Whether the controller reports advertising as running.
    /// `None` when the stack cannot tell.
    fn is_advertising(&self) -> Option<bool>;

    /// Send one notification on `handle` to `conn`.
    fn notify(&mut self, conn: u16, handle: u16, data: &[u8]) -> HwResult<()>;

    /// Cheap non-mutating read of a local attribute, used as a link probe.
    fn read_local(&mut self, handle: u16) -> HwResult<()>;

    /// Ask the central to adopt `params` for `conn`.
    fn update_conn_params(&mut self, conn: u16, params: &ConnParams) -> HwResult<()>;

    /// Ask the stack to drop a connection.
    fn disconnect(&mut self, conn: u16) -> HwResult<()>;

    /// Next pending stack event, if any.
    fn poll_event(&mut self) -> Option<RadioEvent>;
}

// ───────────────────────────────────────────────────────────────
// Configuration store (driven adapter: domain ↔ persistent storage)
// ───────────────────────────────────────────────────────────────

/// Persists the single [`DeviceConfigRecord`].
pub trait ConfigStore {
    /// Load the stored record.  `Ok(None)` on first boot.
    fn load(&self) -> Result<Option<DeviceConfigRecord>, StorageError>;

    /// Durably persist `record`.  Returns only after data is flushed.
    fn save(&mut self, record: &DeviceConfigRecord) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Restart + clock
// ───────────────────────────────────────────────────────────────

pub trait RestartPort {
    /// Request a device restart.  On hardware this does not return;
    /// returning at all means the restart did not happen.
    fn restart(&mut self) -> HwResult<()>;
}

/// Monotonic millisecond clock that can also block for short delays.
pub trait Clock: DelayNs {
    fn now_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Platform bundle
// ───────────────────────────────────────────────────────────────

/// All injected capabilities for one session.
pub struct Platform<R, S, X, C, L> {
    pub radio: R,
    pub store: S,
    pub restart: X,
    pub clock: C,
    /// Liveness indicator; `None` on boards without one.
    pub indicator: Option<StatusLed<L>>,
}

impl<R, S, X, C, L> Platform<R, S, X, C, L>
where
    R: RadioPort,
    S: ConfigStore,
    X: RestartPort,
    C: Clock,
    L: OutputPin,
{
    pub fn new(radio: R, store: S, restart: X, clock: C) -> Self {
        Self {
            radio,
            store,
            restart,
            clock,
            indicator: None,
        }
    }

    #[must_use]
    pub fn with_indicator(mut self, led: StatusLed<L>) -> Self {
        self.indicator = Some(led);
        self
    }
}
