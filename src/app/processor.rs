//! Configuration processor.
//!
//! Turns a completed inbound message into a persisted
//! [`DeviceConfigRecord`] or a rejection the peer can act on.  Nothing is
//! written unless every required field is present.
//!
//! Field lookup rules:
//!
//! | Record field    | Accepted keys                               | Required |
//! |-----------------|---------------------------------------------|----------|
//! | `device_id`     | `device_id`                                 | yes      |
//! | `ssid`          | `ssid`                                      | yes      |
//! | public key      | `publicKey`, then `key_pair.publicKey`      | yes      |
//! | secret key      | `secretKey`, then `key_pair.secretKey`      | no       |
//! | `wifi_password` | `wifi_password`, then `password`            | no       |
//! | `network_id`    | `network_id` (absent or null → `mainnet01`) | no       |
//!
//! A value counts as missing when it is absent, `null`, or empty (the
//! usual "falsy" JSON values: `""`, `false`, `0`, `[]`, `{}`).  Non-string
//! values that are present are stored as their JSON text.

use log::{info, warn};
use serde_json::{Map, Value};

use crate::app::ports::ConfigStore;
use crate::app::record::{DeviceConfigRecord, RecordFields};
use crate::app::status::StatusMessage;
use crate::error::StorageError;
use crate::link::completeness::unwrap_quoted;

/// Why a message was not accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Not parseable as a JSON object.
    BadJson,
    /// Required fields absent or empty, in check order.
    Missing(Vec<&'static str>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Saved(DeviceConfigRecord),
    Rejected(Rejection),
    SaveFailed(StorageError),
}

impl ProcessOutcome {
    /// Notification owed to the peer for this outcome.
    pub fn status(&self) -> StatusMessage {
        match self {
            Self::Saved(_) => StatusMessage::Saved,
            Self::Rejected(Rejection::BadJson) => StatusMessage::BadJson,
            Self::Rejected(Rejection::Missing(fields)) => StatusMessage::Missing(fields.clone()),
            Self::SaveFailed(_) => StatusMessage::SaveFailed,
        }
    }

    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved(_))
    }
}

/// Parse and validate without side effects.
pub fn evaluate(text: &str) -> Result<DeviceConfigRecord, Rejection> {
    // A quoted wrapper that fails to unquote is parsed as-is and will
    // fail below.
    let body = unwrap_quoted(text).unwrap_or_else(|| text.trim().to_owned());

    let parsed: Value = serde_json::from_str(&body).map_err(|e| {
        warn!("PROV: JSON parse failed: {}", e);
        Rejection::BadJson
    })?;
    let Value::Object(obj) = parsed else {
        warn!("PROV: message is not a JSON object");
        return Err(Rejection::BadJson);
    };

    let key_pair = obj.get("key_pair").and_then(Value::as_object);

    let device_id = present(obj.get("device_id"));
    let ssid = present(obj.get("ssid"));
    let public_key = present(obj.get("publicKey"))
        .or_else(|| present(key_pair.and_then(|kp| kp.get("publicKey"))));

    let mut missing = Vec::new();
    if device_id.is_none() {
        missing.push("device_id");
    }
    if ssid.is_none() {
        missing.push("ssid");
    }
    if public_key.is_none() {
        missing.push("publicKey");
    }
    let (Some(device_id), Some(ssid), Some(public_key)) = (device_id, ssid, public_key) else {
        warn!("PROV: missing fields: {}", missing.join(","));
        return Err(Rejection::Missing(missing));
    };

    let secret_key = present(obj.get("secretKey"))
        .or_else(|| present(key_pair.and_then(|kp| kp.get("secretKey"))))
        .unwrap_or_default();
    if secret_key.is_empty() {
        warn!("PROV: no secret key supplied; storing empty secretKey");
    }

    let wifi_password = present(obj.get("wifi_password"))
        .or_else(|| text_of(obj.get("password")))
        .unwrap_or_default();
    let network_id = network_id(&obj);

    Ok(DeviceConfigRecord::from_fields(&RecordFields {
        device_id: &device_id,
        ssid: &ssid,
        wifi_password: &wifi_password,
        network_id: network_id.as_deref(),
        public_key: &public_key,
        secret_key: &secret_key,
    }))
}

/// Evaluate `text` and, if valid, persist the record.
pub fn process<S: ConfigStore>(text: &str, store: &mut S) -> ProcessOutcome {
    let record = match evaluate(text) {
        Ok(r) => r,
        Err(rejection) => return ProcessOutcome::Rejected(rejection),
    };

    match store.save(&record) {
        Ok(()) => {
            info!("PROV: device config saved (device_id={})", record.device_id);
            ProcessOutcome::Saved(record)
        }
        Err(e) => {
            warn!("PROV: save failed: {}", e);
            ProcessOutcome::SaveFailed(e)
        }
    }
}

// ── Field helpers ─────────────────────────────────────────────

/// Value as text, or `None` if absent or falsy.
fn present(v: Option<&Value>) -> Option<String> {
    let v = v?;
    let falsy = match v {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    };
    if falsy { None } else { text_of(Some(v)) }
}

/// Value as text; `None` only if absent or null.
fn text_of(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => serde_json::to_string(other).ok(),
    }
}

fn network_id(obj: &Map<String, Value>) -> Option<String> {
    text_of(obj.get("network_id"))
}
