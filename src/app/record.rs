//! The persisted device configuration record.
//!
//! On disk (and on the wire to the SDK's runtime) the record is a single
//! JSON object:
//!
//! ```json
//! {"device_id":"…","ssid":"…","wifi_password":"…","network_id":"mainnet01",
//!  "key_pair":{"publicKey":"…","secretKey":"…"}}
//! ```
//!
//! Field lengths are bounded in characters, not bytes.

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_NETWORK_ID;

pub const MAX_DEVICE_ID: usize = 64;
pub const MAX_SSID: usize = 32;
pub const MAX_WIFI_PASSWORD: usize = 64;
pub const MAX_NETWORK_ID: usize = 32;
pub const MAX_KEY: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyPair {
    #[serde(rename = "publicKey")]
    pub public_key: String,
    #[serde(rename = "secretKey", default)]
    pub secret_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfigRecord {
    pub device_id: String,
    pub ssid: String,
    #[serde(default)]
    pub wifi_password: String,
    #[serde(default = "default_network_id")]
    pub network_id: String,
    pub key_pair: KeyPair,
}

fn default_network_id() -> String {
    DEFAULT_NETWORK_ID.to_owned()
}

/// Raw field values as extracted from an inbound message.
#[derive(Debug, Clone, Default)]
pub struct RecordFields<'a> {
    pub device_id: &'a str,
    pub ssid: &'a str,
    pub wifi_password: &'a str,
    pub network_id: Option<&'a str>,
    pub public_key: &'a str,
    pub secret_key: &'a str,
}

impl DeviceConfigRecord {
    /// Build a bounded record.  Every field is cut to its maximum length in
    /// characters; a missing network id becomes [`DEFAULT_NETWORK_ID`].
    pub fn from_fields(f: &RecordFields<'_>) -> Self {
        Self {
            device_id: truncate_chars(f.device_id, MAX_DEVICE_ID),
            ssid: truncate_chars(f.ssid, MAX_SSID),
            wifi_password: truncate_chars(f.wifi_password, MAX_WIFI_PASSWORD),
            network_id: truncate_chars(f.network_id.unwrap_or(DEFAULT_NETWORK_ID), MAX_NETWORK_ID),
            key_pair: KeyPair {
                public_key: truncate_chars(f.public_key, MAX_KEY),
                secret_key: truncate_chars(f.secret_key, MAX_KEY),
            },
        }
    }

    /// A record is usable when device id, SSID and public key are non-empty.
    pub fn is_valid(&self) -> bool {
        !self.device_id.is_empty() && !self.ssid.is_empty() && !self.key_pair.public_key.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
