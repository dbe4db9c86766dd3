//! Fuzz target: `processor::evaluate`
//!
//! Arbitrary text must either be rejected or produce a record whose
//! required fields are present and within their stored limits.
//!
//! cargo fuzz run fuzz_config_message

#![no_main]

use cyberfly_provision::app::processor::evaluate;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    if let Ok(record) = evaluate(&text) {
        assert!(record.is_valid());
        assert!(record.device_id.chars().count() <= 64);
        assert!(record.ssid.chars().count() <= 32);
    }
});
