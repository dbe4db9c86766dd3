//! Mock platform adapters for integration tests.
//!
//! Everything runs on virtual time: [`SimClock`] only advances when the
//! engine delays, and [`ScriptedRadio`] releases scripted stack events
//! once the clock reaches their timestamp.  A five-minute session
//! therefore completes in milliseconds of wall time.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::{Mutex, Once};

use embedded_hal::delay::DelayNs;
use log::{LevelFilter, Log, Metadata, Record};

use cyberfly_provision::app::ports::{
    AdvParams, Clock, ConfigStore, Platform, RadioPort, RestartPort, ServiceHandles, ServiceIds,
};
use cyberfly_provision::app::record::DeviceConfigRecord;
use cyberfly_provision::config::ConnParams;
use cyberfly_provision::drivers::status_led::NoLed;
use cyberfly_provision::error::{HwError, HwResult, StorageError};
use cyberfly_provision::events::RadioEvent;

pub const RX_HANDLE: u16 = 0x2a;
pub const TX_HANDLE: u16 = 0x2c;
pub const CONN: u16 = 1;

pub type MockPlatform = Platform<ScriptedRadio, MockStore, MockRestart, SimClock, NoLed>;

// ── SimClock ──────────────────────────────────────────────────

/// Shared virtual clock.  Clones observe the same time.
#[derive(Clone, Default)]
pub struct SimClock {
    now_ns: Rc<Cell<u64>>,
}

#[allow(dead_code)]
impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_ms(&self, ms: u64) {
        self.now_ns.set(self.now_ns.get() + ms * 1_000_000);
    }
}

impl DelayNs for SimClock {
    fn delay_ns(&mut self, ns: u32) {
        self.now_ns.set(self.now_ns.get() + u64::from(ns));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.advance_ms(u64::from(ms));
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u64 {
        self.now_ns.get() / 1_000_000
    }
}

// ── ScriptedRadio ─────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Step {
    Event(RadioEvent),
    /// Controller silently stops advertising.
    DropAdvertising,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdvStart {
    pub at_ms: u64,
    pub interval_ms: Option<u32>,
    pub with_payload: bool,
}

pub struct ScriptedRadio {
    clock: SimClock,
    script: VecDeque<(u64, Step)>,

    pub fail_activate: bool,
    /// Every `start_advertising` with a requested interval fails.
    pub fail_requested_interval: bool,
    /// `read_local` fails from this time on.
    pub probe_fails_from: Option<u64>,
    pub reject_mtus: Vec<u16>,
    pub refuse_conn_params: bool,

    pub active: bool,
    pub advertising: bool,
    pub device_name: Option<String>,
    pub local_mtu: Option<u16>,
    pub adv_starts: Vec<AdvStart>,
    pub notifies: Vec<(u16, u16, Vec<u8>)>,
    pub disconnects: Vec<u16>,
    pub conn_param_requests: Vec<(u16, ConnParams)>,
    pub probes: u32,
}

#[allow(dead_code)]
impl ScriptedRadio {
    pub fn new(clock: &SimClock) -> Self {
        Self {
            clock: clock.clone(),
            script: VecDeque::new(),
            fail_activate: false,
            fail_requested_interval: false,
            probe_fails_from: None,
            reject_mtus: Vec::new(),
            refuse_conn_params: false,
            active: false,
            advertising: false,
            device_name: None,
            local_mtu: None,
            adv_starts: Vec::new(),
            notifies: Vec::new(),
            disconnects: Vec::new(),
            conn_param_requests: Vec::new(),
            probes: 0,
        }
    }

    /// Queue `step` to be released at `at_ms`.  Steps must be added in
    /// time order.
    pub fn at(mut self, at_ms: u64, step: Step) -> Self {
        self.script.push_back((at_ms, step));
        self
    }

    pub fn connect_at(self, at_ms: u64) -> Self {
        self.at(at_ms, Step::Event(RadioEvent::Connected { conn: CONN }))
    }

    pub fn disconnect_at(self, at_ms: u64) -> Self {
        self.at(at_ms, Step::Event(RadioEvent::Disconnected { conn: CONN }))
    }

    pub fn write_at(self, at_ms: u64, data: &str) -> Self {
        self.at(at_ms, Step::Event(RadioEvent::write(CONN, RX_HANDLE, data.as_bytes())))
    }

    pub fn mtu_at(self, at_ms: u64, mtu: u16) -> Self {
        self.at(at_ms, Step::Event(RadioEvent::MtuChanged { conn: CONN, mtu }))
    }

    /// The stack's event queue lost events at this point.
    pub fn overflow_at(self, at_ms: u64) -> Self {
        self.at(at_ms, Step::Event(RadioEvent::Overflow))
    }

    /// All notified bytes, concatenated, as text.
    pub fn notified(&self) -> String {
        let bytes: Vec<u8> = self.notifies.iter().flat_map(|(_, _, d)| d.iter().copied()).collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn notify_sizes(&self) -> Vec<usize> {
        self.notifies.iter().map(|(_, _, d)| d.len()).collect()
    }
}

impl RadioPort for ScriptedRadio {
    fn activate(&mut self) -> HwResult<()> {
        if self.fail_activate {
            return Err(HwError::Unavailable);
        }
        self.active = true;
        Ok(())
    }

    fn deactivate(&mut self) -> HwResult<()> {
        self.active = false;
        self.advertising = false;
        Ok(())
    }

    fn set_device_name(&mut self, name: &str) -> HwResult<()> {
        self.device_name = Some(name.to_owned());
        Ok(())
    }

    fn set_local_mtu(&mut self, mtu: u16) -> HwResult<()> {
        if self.reject_mtus.contains(&mtu) {
            return Err(HwError::Transient("mtu"));
        }
        self.local_mtu = Some(mtu);
        Ok(())
    }

    fn register_service(&mut self, _ids: &ServiceIds) -> HwResult<ServiceHandles> {
        if !self.active {
            return Err(HwError::Unavailable);
        }
        Ok(ServiceHandles {
            rx: RX_HANDLE,
            tx: TX_HANDLE,
        })
    }

    fn start_advertising(&mut self, params: &AdvParams<'_>) -> HwResult<()> {
        if !self.active {
            return Err(HwError::Unavailable);
        }
        if self.fail_requested_interval && params.interval_ms.is_some() {
            return Err(HwError::Transient("adv params"));
        }
        self.adv_starts.push(AdvStart {
            at_ms: self.clock.now_ms(),
            interval_ms: params.interval_ms,
            with_payload: params.payload.is_some(),
        });
        self.advertising = true;
        Ok(())
    }

    fn stop_advertising(&mut self) -> HwResult<()> {
        self.advertising = false;
        Ok(())
    }

    fn is_advertising(&self) -> Option<bool> {
        Some(self.advertising)
    }

    fn notify(&mut self, conn: u16, handle: u16, data: &[u8]) -> HwResult<()> {
        self.notifies.push((conn, handle, data.to_vec()));
        Ok(())
    }

    fn read_local(&mut self, _handle: u16) -> HwResult<()> {
        self.probes += 1;
        match self.probe_fails_from {
            Some(t) if self.clock.now_ms() >= t => Err(HwError::Transient("probe")),
            _ => Ok(()),
        }
    }

    fn update_conn_params(&mut self, conn: u16, params: &ConnParams) -> HwResult<()> {
        self.conn_param_requests.push((conn, *params));
        if self.refuse_conn_params {
            return Err(HwError::Transient("conn params"));
        }
        Ok(())
    }

    fn disconnect(&mut self, conn: u16) -> HwResult<()> {
        self.disconnects.push(conn);
        Ok(())
    }

    fn poll_event(&mut self) -> Option<RadioEvent> {
        loop {
            let due = self.script.front().is_some_and(|(t, _)| *t <= self.clock.now_ms());
            if !due {
                return None;
            }
            let (_, step) = self.script.pop_front()?;
            match step {
                Step::DropAdvertising => self.advertising = false,
                Step::Event(event) => {
                    if matches!(event, RadioEvent::Connected { .. }) {
                        // The controller stops advertising on connect.
                        self.advertising = false;
                    }
                    return Some(event);
                }
            }
        }
    }
}

// ── MockStore ─────────────────────────────────────────────────

/// In-memory store; clones share the saved records.
#[derive(Clone, Default)]
pub struct MockStore {
    saved: Rc<RefCell<Vec<DeviceConfigRecord>>>,
    pub fail_saves: bool,
}

#[allow(dead_code)]
impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_saves: true,
            ..Self::default()
        }
    }

    pub fn saved(&self) -> Vec<DeviceConfigRecord> {
        self.saved.borrow().clone()
    }
}

impl ConfigStore for MockStore {
    fn load(&self) -> Result<Option<DeviceConfigRecord>, StorageError> {
        Ok(self.saved.borrow().last().cloned())
    }

    fn save(&mut self, record: &DeviceConfigRecord) -> Result<(), StorageError> {
        if self.fail_saves {
            return Err(StorageError::Io);
        }
        self.saved.borrow_mut().push(record.clone());
        Ok(())
    }
}

// ── MockRestart ───────────────────────────────────────────────

/// Counts restart requests; the "device" never actually restarts.
#[derive(Clone, Default)]
pub struct MockRestart {
    pub requests: Rc<Cell<u32>>,
}

impl RestartPort for MockRestart {
    fn restart(&mut self) -> HwResult<()> {
        self.requests.set(self.requests.get() + 1);
        Err(HwError::Unavailable)
    }
}

// ── Helpers ───────────────────────────────────────────────────

#[allow(dead_code)]
pub fn platform(radio: ScriptedRadio, store: MockStore, restart: MockRestart, clock: SimClock) -> MockPlatform {
    Platform::new(radio, store, restart, clock)
}

// ── Log capture ───────────────────────────────────────────────

static LINES: Mutex<Vec<String>> = Mutex::new(Vec::new());
static INSTALL: Once = Once::new();

struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        if let Ok(mut lines) = LINES.lock() {
            lines.push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

/// Route every log record, at every level, into an in-memory buffer
/// shared by all tests in this binary.
pub fn capture_logs() {
    INSTALL.call_once(|| {
        log::set_logger(&CaptureLogger).unwrap();
        log::set_max_level(LevelFilter::Trace);
    });
}

/// Captured lines containing `needle`.
pub fn logged_lines_containing(needle: &str) -> Vec<String> {
    LINES
        .lock()
        .unwrap()
        .iter()
        .filter(|l| l.contains(needle))
        .cloned()
        .collect()
}
