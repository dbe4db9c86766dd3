//! Link-loss, advertising maintenance and bring-up failure paths.

use std::cell::Cell;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::digital::{ErrorType, OutputPin};

use cyberfly_provision::adapters::radio::NullRadio;
use cyberfly_provision::app::ports::Platform;
use cyberfly_provision::app::service::{Provisioner, SessionOutcome};
use cyberfly_provision::config::{ConnParams, ProtocolConfig, SessionOptions};
use cyberfly_provision::drivers::status_led::{NoLed, StatusLed};
use cyberfly_provision::error::{Error, RadioError};
use cyberfly_provision::events::RadioEvent;
use cyberfly_provision::fsm::ConnectionState;
use cyberfly_provision::run_provisioning;

use crate::mock_hw::{platform, MockRestart, MockStore, ScriptedRadio, SimClock, Step, CONN};

fn provisioner(radio: ScriptedRadio, clock: SimClock, timeout_secs: u32) -> Provisioner<ScriptedRadio, MockStore, MockRestart, SimClock, NoLed> {
    let cfg = ProtocolConfig::default();
    let opts = SessionOptions::new("CYBERFLY-SETUP", timeout_secs, false, &cfg);
    Provisioner::new(cfg, &opts, platform(radio, MockStore::new(), MockRestart::default(), clock))
}

fn intervals(radio: &ScriptedRadio) -> Vec<Option<u32>> {
    radio.adv_starts.iter().map(|a| a.interval_ms).collect()
}

// ── Link health ───────────────────────────────────────────────

#[test]
fn failed_probe_drops_link_and_readvertises_fast() {
    let clock = SimClock::new();
    let mut radio = ScriptedRadio::new(&clock).connect_at(1000);
    radio.probe_fails_from = Some(3000);

    let mut p = provisioner(radio, clock, 30);
    assert_eq!(p.run().unwrap(), SessionOutcome::TimedOut);
    let platform = p.into_platform();

    // Probe runs once the 5 s interval has passed since connect.
    assert_eq!(platform.radio.probes, 1);
    assert_eq!(platform.radio.disconnects, vec![CONN]);
    let readvertised = platform
        .radio
        .adv_starts
        .iter()
        .any(|a| a.at_ms > 6000 && a.interval_ms == Some(50));
    assert!(readvertised);
}

#[test]
fn healthy_link_is_probed_periodically() {
    let clock = SimClock::new();
    let radio = ScriptedRadio::new(&clock).connect_at(1000);

    let mut p = provisioner(radio, clock, 30);
    p.run().unwrap();

    // Connected from ~1 s to 30 s: one probe per 5 s interval.
    let probes = p.platform().radio.probes;
    assert!((4..=6).contains(&probes), "probes = {probes}");
    assert_eq!(p.platform().radio.disconnects, vec![CONN]);
}

#[test]
fn reconnect_after_disconnect_is_a_new_attempt() {
    let clock = SimClock::new();
    let radio = ScriptedRadio::new(&clock)
        .connect_at(1000)
        .write_at(1200, r#"{"device_id":"d1","#)
        .at(1500, Step::Event(RadioEvent::Disconnected { conn: 9 }))
        .disconnect_at(2000)
        .connect_at(3000)
        .write_at(3200, r#"{"device_id":"d1","ssid":"net","publicKey":"pk"}"#);

    let mut p = provisioner(radio, clock, 30);
    assert_eq!(p.run().unwrap(), SessionOutcome::Saved);

    assert_eq!(p.session().attempts, 2);
    let radio = &p.platform().radio;
    assert_eq!(radio.notified().matches(r#"{"status":"ready"}"#).count(), 2);
    assert_eq!(intervals(radio), vec![Some(50), Some(50)]);
    assert!(radio.adv_starts[1].at_ms >= 2050);
}

#[test]
fn connection_parameters_requested_on_every_connect() {
    let clock = SimClock::new();
    let radio = ScriptedRadio::new(&clock)
        .connect_at(1000)
        .disconnect_at(2000)
        .connect_at(3000);

    let mut p = provisioner(radio, clock, 30);
    p.run().unwrap();

    let responsive = ConnParams {
        interval_min: 6,
        interval_max: 12,
        latency: 0,
        supervision_timeout: 200,
    };
    assert_eq!(p.platform().radio.conn_param_requests, vec![(CONN, responsive), (CONN, responsive)]);
}

#[test]
fn refused_connection_parameters_do_not_block_provisioning() {
    let clock = SimClock::new();
    let mut radio = ScriptedRadio::new(&clock)
        .connect_at(1000)
        .write_at(1200, r#"{"device_id":"d1","ssid":"net","publicKey":"pk"}"#);
    radio.refuse_conn_params = true;

    let mut p = provisioner(radio, clock, 30);
    assert_eq!(p.run().unwrap(), SessionOutcome::Saved);
    assert_eq!(p.platform().radio.notified(), r#"{"status":"ready"}{"status":"saved"}"#);
}

// ── Advertising maintenance ───────────────────────────────────

#[test]
fn switches_to_slow_advertising_once_after_fast_window() {
    let clock = SimClock::new();
    let radio = ScriptedRadio::new(&clock);

    let mut p = provisioner(radio, clock, 120);
    p.run().unwrap();

    let radio = &p.platform().radio;
    assert_eq!(intervals(radio), vec![Some(50), Some(200)]);
    assert!(radio.adv_starts[1].at_ms > 60_000);
    assert!(p.session().slow_switched);
}

#[test]
fn stopped_advertising_is_restarted_on_liveness_check() {
    let clock = SimClock::new();
    let radio = ScriptedRadio::new(&clock).at(5000, Step::DropAdvertising);

    let mut p = provisioner(radio, clock, 30);
    p.run().unwrap();

    let radio = &p.platform().radio;
    assert_eq!(intervals(radio), vec![Some(50), Some(50)]);
    assert!(radio.adv_starts[1].at_ms > 10_000);
}

#[test]
fn advertising_falls_back_to_minimal_parameters() {
    let clock = SimClock::new();
    let mut radio = ScriptedRadio::new(&clock);
    radio.fail_requested_interval = true;

    let mut p = provisioner(radio, clock, 30);
    p.run().unwrap();

    let first = &p.platform().radio.adv_starts[0];
    assert_eq!(first.interval_ms, None);
    assert!(!first.with_payload);
}

// ── MTU ───────────────────────────────────────────────────────

#[test]
fn default_mtu_chunks_notifications_to_twenty_bytes() {
    let clock = SimClock::new();
    let radio = ScriptedRadio::new(&clock)
        .connect_at(1000)
        .write_at(1200, r#"{"device_id":"d1"}"#);

    let mut p = provisioner(radio, clock, 30);
    p.run().unwrap();

    let radio = &p.platform().radio;
    let sizes = radio.notify_sizes();
    assert!(sizes.len() > 2);
    assert!(sizes.iter().all(|&n| n <= 20));
    assert!(radio.notified().contains(r#""msg":"missing:ssid,publicKey""#));
}

#[test]
fn negotiated_mtu_widens_notifications() {
    let clock = SimClock::new();
    let radio = ScriptedRadio::new(&clock)
        .connect_at(1000)
        .mtu_at(1100, 185)
        .write_at(1200, r#"{"device_id":"d1"}"#);

    let mut p = provisioner(radio, clock, 30);
    p.run().unwrap();

    assert_eq!(p.session().local_mtu, 512);
    assert_eq!(p.session().transport_unit, 185);
    // Ready, then the whole error status in one piece.
    assert_eq!(p.platform().radio.notify_sizes().len(), 2);
}

#[test]
fn rejected_local_mtu_falls_back_down_the_ladder() {
    let clock = SimClock::new();
    let mut radio = ScriptedRadio::new(&clock).connect_at(1000).mtu_at(1100, 247);
    radio.reject_mtus = vec![512];

    let mut p = provisioner(radio, clock, 30);
    p.run().unwrap();

    assert_eq!(p.platform().radio.local_mtu, Some(180));
    assert_eq!(p.session().transport_unit, 180);
}

// ── Bring-up failure ──────────────────────────────────────────

#[test]
fn activation_failure_is_an_error() {
    let clock = SimClock::new();
    let mut radio = ScriptedRadio::new(&clock);
    radio.fail_activate = true;

    let mut p = provisioner(radio, clock, 30);
    let err = p.run().unwrap_err();

    assert!(matches!(err, Error::Radio(RadioError::InitFailed(_))));
    assert_eq!(p.session().state(), ConnectionState::Idle);
    assert!(p.platform().radio.adv_starts.is_empty());
}

#[test]
fn null_radio_session_reports_not_saved() {
    let clock = SimClock::new();
    let restart = MockRestart::default();
    let platform = Platform::<_, _, _, _, NoLed>::new(NullRadio, MockStore::new(), restart.clone(), clock);

    assert!(!run_provisioning(platform, "CYBERFLY-SETUP", 30, true));
    assert_eq!(restart.requests.get(), 0);
}

// ── Indicator ─────────────────────────────────────────────────

#[derive(Clone, Default)]
struct CountingPin {
    high: Rc<Cell<bool>>,
    toggles: Rc<Cell<u32>>,
}

impl ErrorType for CountingPin {
    type Error = Infallible;
}

impl OutputPin for CountingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high.set(true);
        self.toggles.set(self.toggles.get() + 1);
        Ok(())
    }
}

#[test]
fn indicator_blinks_while_waiting_and_ends_dark() {
    let clock = SimClock::new();
    let pin = CountingPin::default();
    let cfg = ProtocolConfig::default();
    let opts = SessionOptions::new("CYBERFLY-SETUP", 30, false, &cfg);
    let platform = Platform::new(ScriptedRadio::new(&clock), MockStore::new(), MockRestart::default(), clock)
        .with_indicator(StatusLed::new(pin.clone()));

    let mut p = Provisioner::new(cfg, &opts, platform);
    p.run().unwrap();

    // 500 ms blink period over ~30 s: roughly 30 rising edges.
    assert!(pin.toggles.get() >= 20);
    assert!(!pin.high.get());
    assert_eq!(p.session().state(), ConnectionState::TimedOut);
}
