//! Outbound status notifications.
//!
//! The companion app matches on the exact compact JSON text, so field order
//! and spelling are part of the protocol.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusMessage {
    Ready,
    Saved,
    BadJson,
    /// Names of required fields that were absent or empty, in check order.
    Missing(Vec<&'static str>),
    SaveFailed,
}

#[derive(Serialize)]
struct Wire<'a> {
    status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    msg: Option<String>,
}

impl StatusMessage {
    fn wire(&self) -> Wire<'static> {
        let (status, msg) = match self {
            Self::Ready => ("ready", None),
            Self::Saved => ("saved", None),
            Self::BadJson => ("error", Some("bad_json".to_owned())),
            Self::Missing(fields) => ("error", Some(format!("missing:{}", fields.join(",")))),
            Self::SaveFailed => ("error", Some("save_failed".to_owned())),
        };
        Wire { status, msg }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        // Serialising a two-field struct of strings cannot fail.
        serde_json::to_vec(&self.wire()).unwrap_or_default()
    }
}
