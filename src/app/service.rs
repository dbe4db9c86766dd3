//! Provisioning supervisor — the hexagonal core.
//!
//! [`Provisioner`] owns the session blackboard and the injected
//! [`Platform`].  It brings the radio up, runs the single-threaded
//! supervisor loop, and tears everything down again.  All I/O flows
//! through port traits, so the whole flow runs on the host against mocks.
//!
//! ```text
//!  RadioPort ──events──▶ ┌──────────────────────────┐ ──▶ ConfigStore
//!                        │       Provisioner        │
//!  RadioPort ◀─notify────│ framer · detector · FSM  │ ──▶ RestartPort
//!                        └──────────────────────────┘
//! ```
//!
//! Per tick: check the session deadline, drain radio events, keep
//! advertising alive (liveness check, fast → slow switch), probe the link,
//! blink the indicator, then yield for one loop period.

use embedded_hal::digital::OutputPin;
use log::{debug, error, info, warn};

use crate::config::{ProtocolConfig, SessionOptions};
use crate::error::{Error, RadioError, Result};
use crate::events::RadioEvent;
use crate::fsm::context::ProvisioningSession;
use crate::fsm::SessionEvent;
use crate::link::advertising::{self, AdvMode};
use crate::link::chunked::{ChunkPlan, send_chunked};
use crate::link::completeness::is_complete;

use super::ports::{Clock, ConfigStore, Platform, RadioPort, RestartPort, ServiceIds};
use super::processor;
use super::status::StatusMessage;

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Configuration persisted (and no restart was requested).
    Saved,
    /// Configuration persisted, restart requested, but the device kept
    /// running past the grace period.
    RestartStalled,
    /// Session budget ran out without a save.
    TimedOut,
}

impl SessionOutcome {
    /// The boolean verdict reported to the boot sequence.
    pub fn saved(self) -> bool {
        !matches!(self, Self::TimedOut)
    }
}

// ───────────────────────────────────────────────────────────────
// Provisioner
// ───────────────────────────────────────────────────────────────

pub struct Provisioner<R, S, X, C, L> {
    cfg: ProtocolConfig,
    platform: Platform<R, S, X, C, L>,
    session: ProvisioningSession,
}

impl<R, S, X, C, L> Provisioner<R, S, X, C, L>
where
    R: RadioPort,
    S: ConfigStore,
    X: RestartPort,
    C: Clock,
    L: OutputPin,
{
    pub fn new(cfg: ProtocolConfig, opts: &SessionOptions, platform: Platform<R, S, X, C, L>) -> Self {
        let now = platform.clock.now_ms();
        let session = ProvisioningSession::new(opts, &cfg, now);
        Self {
            cfg,
            platform,
            session,
        }
    }

    pub fn session(&self) -> &ProvisioningSession {
        &self.session
    }

    pub fn platform(&self) -> &Platform<R, S, X, C, L> {
        &self.platform
    }

    pub fn into_platform(self) -> Platform<R, S, X, C, L> {
        self.platform
    }

    /// Run one provisioning session to completion.
    ///
    /// Only radio bring-up failures are returned as errors; everything
    /// else is reported to the peer and the session carries on.
    pub fn run(&mut self) -> Result<SessionOutcome> {
        // Deadline and fast window count from the start of the session.
        let start = self.now();
        self.session.started_at = start;
        self.session.fast_until = start + self.cfg.fast_adv_window_ms;

        if let Err(e) = self.bring_up() {
            error!("BLE: bring-up failed: {}", e);
            self.cleanup();
            return Err(e);
        }
        info!(
            "PROV: ready, advertising as '{}' for {} s",
            self.session.name,
            self.session.timeout_ms / 1000
        );

        while !self.session.state().is_terminal() {
            self.tick();
        }

        let outcome = if self.session.saved() {
            self.finish_saved()
        } else {
            SessionOutcome::TimedOut
        };

        info!("PROV: exiting provisioning mode ({:?})", outcome);
        self.cleanup();
        Ok(outcome)
    }

    // ── Bring-up / teardown ───────────────────────────────────

    fn bring_up(&mut self) -> Result<()> {
        let cfg = &self.cfg;
        let Platform { radio, clock, .. } = &mut self.platform;

        // Start from a clean controller.
        let _ = radio.deactivate();
        clock.delay_ms(cfg.radio_reset_ms);
        radio.activate().map_err(RadioError::InitFailed)?;
        clock.delay_ms(cfg.radio_settle_ms);
        info!("BLE: radio active");

        if let Err(e) = radio.set_device_name(&self.session.name) {
            warn!("BLE: setting GAP name failed: {}", e);
        }

        self.session.local_mtu = cfg.default_mtu;
        for mtu in cfg.preferred_mtus {
            match radio.set_local_mtu(mtu) {
                Ok(()) => {
                    self.session.local_mtu = mtu;
                    break;
                }
                Err(e) => debug!("BLE: local MTU {} rejected: {}", mtu, e),
            }
        }
        info!("BLE: local MTU {}", self.session.local_mtu);

        let ids = ServiceIds {
            service: cfg.service_uuid,
            rx: cfg.rx_char_uuid,
            tx: cfg.tx_char_uuid,
        };
        let handles = radio
            .register_service(&ids)
            .map_err(RadioError::ServiceRegistration)?;
        info!("BLE: service registered (rx={}, tx={})", handles.rx, handles.tx);
        self.session.handles = handles;

        self.session.apply(SessionEvent::Started);
        if !self.advertise(AdvMode::Fast) {
            return Err(Error::Radio(RadioError::AdvertisingFailed));
        }
        Ok(())
    }

    fn cleanup(&mut self) {
        info!("PROV: cleaning up radio");
        if let Some(led) = self.platform.indicator.as_mut() {
            led.off();
        }
        let radio = &mut self.platform.radio;
        if let Err(e) = radio.stop_advertising() {
            debug!("BLE: stop advertising failed: {}", e);
        }
        self.session.advertising = false;
        if let Some(conn) = self.session.conn.take() {
            let _ = radio.disconnect(conn);
        }
        if let Err(e) = radio.deactivate() {
            warn!("BLE: deactivate failed: {}", e);
        }
    }

    fn finish_saved(&mut self) -> SessionOutcome {
        if !self.session.auto_restart {
            return SessionOutcome::Saved;
        }

        let cfg = &self.cfg;
        let Platform { restart, clock, .. } = &mut self.platform;
        info!("PROV: preparing to restart");
        clock.delay_ms(cfg.pre_restart_ms);
        if let Err(e) = restart.restart() {
            error!("PROV: restart request failed: {}", e);
        }

        // Reaching this point means the device is still running.
        clock.delay_ms(cfg.restart_grace_ms);
        error!(
            "PROV: FATAL: configuration saved but device did not restart within {} ms",
            cfg.restart_grace_ms
        );
        SessionOutcome::RestartStalled
    }

    // ── Supervisor tick ───────────────────────────────────────

    fn tick(&mut self) {
        let now = self.now();
        if self.session.deadline_passed(now) {
            info!("PROV: session timed out after {} ms", self.session.elapsed_ms(now));
            self.session.apply(SessionEvent::Timeout);
            return;
        }

        while let Some(event) = self.platform.radio.poll_event() {
            self.handle_event(event);
            if self.session.saved() {
                return;
            }
        }

        let now = self.now();
        self.maintain_advertising(now);
        self.check_link_health(now);
        self.blink(now);

        self.platform.clock.delay_ms(self.cfg.loop_period_ms);
    }

    fn handle_event(&mut self, event: RadioEvent) {
        match event {
            RadioEvent::Connected { conn } => self.on_connected(conn),
            RadioEvent::Disconnected { conn } => {
                if self.session.conn == Some(conn) {
                    info!("BLE: disconnected (conn={})", conn);
                    self.on_link_lost();
                } else {
                    debug!("BLE: disconnect for stale conn {} ignored", conn);
                }
            }
            RadioEvent::Write { conn, handle, data } => {
                if self.session.is_connected()
                    && self.session.conn == Some(conn)
                    && handle == self.session.handles.rx
                {
                    self.on_fragment(&data);
                }
            }
            RadioEvent::MtuChanged { conn, mtu } => {
                if self.session.conn == Some(conn) {
                    let unit = mtu.min(self.session.local_mtu).max(self.cfg.default_mtu);
                    info!("BLE: MTU {} negotiated, transport unit {}", mtu, unit);
                    self.session.transport_unit = unit;
                }
            }
            RadioEvent::Overflow => {
                if !self.session.buffer.is_empty() {
                    warn!("BLE: radio events dropped, discarding partial message");
                }
                let now = self.now();
                self.session.buffer.reset(now);
            }
        }
    }

    fn on_connected(&mut self, conn: u16) {
        if !self.session.apply(SessionEvent::Connected) {
            warn!(
                "BLE: connect (conn={}) ignored in state {:?}",
                conn,
                self.session.state()
            );
            return;
        }
        let now = self.now();
        self.session.conn = Some(conn);
        self.session.advertising = false;
        self.session.attempts += 1;
        self.session.transport_unit = self.cfg.default_mtu;
        self.session.last_health_check = now;
        self.session.buffer.reset(now);
        info!(
            "BLE: connected conn={} (attempt {}, {} s left)",
            conn,
            self.session.attempts,
            self.session.remaining_ms(now) / 1000
        );

        // Best effort: the central decides.
        if let Err(e) = self.platform.radio.update_conn_params(conn, &self.cfg.conn_params) {
            debug!("BLE: connection parameter request failed: {}", e);
        }

        self.platform.clock.delay_ms(self.cfg.connect_settle_ms);
        let sent = self.notify(&StatusMessage::Ready);
        debug!("BLE: ready status sent: {}", sent);
    }

    /// Peer left or the link probe failed.  Re-advertise fast unless saved.
    fn on_link_lost(&mut self) {
        self.session.apply(SessionEvent::LinkLost);
        self.session.conn = None;
        let now = self.now();
        self.session.buffer.reset(now);

        if self.session.saved() {
            return;
        }
        self.platform.clock.delay_ms(self.cfg.disconnect_readvertise_ms);
        if self.advertise(AdvMode::Fast) {
            info!("BLE: re-advertising after link loss");
        } else {
            warn!("BLE: failed to restart advertising after link loss");
        }
    }

    fn on_fragment(&mut self, fragment: &[u8]) {
        let now = self.now();
        // Fragments carry credentials: never log their content.
        debug!("BLE: received {} bytes", fragment.len());

        self.session.buffer.append(fragment, now);
        let text = self.session.buffer.text();
        debug!("PROV: buffer now {} chars", text.chars().count());

        if is_complete(&text) {
            info!("PROV: complete message received, processing");
            self.process_message(&text);
        }
    }

    fn process_message(&mut self, text: &str) {
        let outcome = processor::process(text, &mut self.platform.store);
        self.notify(&outcome.status());

        if outcome.is_saved() {
            self.session.apply(SessionEvent::ConfigSaved);
            // Let the notification drain and the filesystem settle.
            self.platform.clock.delay_ms(self.cfg.save_flush_ms);
        }

        let now = self.now();
        self.session.buffer.reset(now);
    }

    // ── Maintenance ───────────────────────────────────────────

    fn maintain_advertising(&mut self, now: u64) {
        let Some(mode) = self.session.state().expected_advertising() else {
            return;
        };

        if now.saturating_sub(self.session.last_adv_check) > self.cfg.adv_check_interval_ms {
            self.session.last_adv_check = now;
            let running = self
                .platform
                .radio
                .is_advertising()
                .unwrap_or(self.session.advertising);
            if !running {
                warn!("BLE: advertising stopped unexpectedly, restarting");
                self.advertise(mode);
            }
        }

        if !self.session.slow_switched
            && mode == AdvMode::Fast
            && now > self.session.fast_until
            && self.session.apply(SessionEvent::WindowElapsed)
        {
            self.session.slow_switched = true;
            if self.advertise(AdvMode::Slow) {
                info!("BLE: switched to slow advertising");
            }
        }
    }

    fn check_link_health(&mut self, now: u64) {
        let Some(conn) = self.session.conn else {
            return;
        };
        if now.saturating_sub(self.session.last_health_check) <= self.cfg.health_interval_ms {
            return;
        }

        match self.platform.radio.read_local(self.session.handles.tx) {
            Ok(()) => self.session.last_health_check = now,
            Err(e) => {
                warn!("BLE: link health check failed: {}", e);
                let _ = self.platform.radio.disconnect(conn);
                self.on_link_lost();
            }
        }
    }

    fn blink(&mut self, now: u64) {
        if now.saturating_sub(self.session.last_blink) < self.cfg.blink_period_ms {
            return;
        }
        self.session.last_blink = now;
        if let Some(led) = self.platform.indicator.as_mut() {
            led.toggle();
        }
    }

    // ── Radio helpers ─────────────────────────────────────────

    fn advertise(&mut self, mode: AdvMode) -> bool {
        let Platform { radio, clock, .. } = &mut self.platform;
        let ok = advertising::start_advertising(radio, clock, &self.cfg, &self.session.name, mode)
            .is_some();
        self.session.advertising = ok;
        ok
    }

    fn notify(&mut self, msg: &StatusMessage) -> bool {
        let Some(conn) = self.session.conn else {
            debug!("BLE: no connection, {:?} not sent", msg);
            return false;
        };
        let plan = ChunkPlan::new(self.session.transport_unit, &self.cfg);
        let payload = msg.to_bytes();
        let Platform { radio, clock, .. } = &mut self.platform;
        send_chunked(radio, clock, conn, self.session.handles.tx, &payload, &plan)
    }

    fn now(&self) -> u64 {
        self.platform.clock.now_ms()
    }
}

// ───────────────────────────────────────────────────────────────
// Caller API
// ───────────────────────────────────────────────────────────────

/// Run a provisioning session with default protocol parameters.
///
/// `name` is truncated to 20 bytes and `timeout_secs` clamped into the
/// configured bounds.  Returns `true` once a configuration was saved.
pub fn run_provisioning<R, S, X, C, L>(
    platform: Platform<R, S, X, C, L>,
    name: &str,
    timeout_secs: u32,
    auto_restart: bool,
) -> bool
where
    R: RadioPort,
    S: ConfigStore,
    X: RestartPort,
    C: Clock,
    L: OutputPin,
{
    let cfg = ProtocolConfig::default();
    let opts = SessionOptions::new(name, timeout_secs, auto_restart, &cfg);
    let mut provisioner = Provisioner::new(cfg, &opts, platform);
    match provisioner.run() {
        Ok(outcome) => outcome.saved(),
        Err(e) => {
            error!("PROV: provisioning aborted: {}", e);
            false
        }
    }
}
