//! Fuzz target: `FragmentBuffer::append` + `is_complete`
//!
//! Splits arbitrary bytes into fragments at positions chosen by the input
//! itself, feeds them through the reassembly buffer and asks the
//! completeness detector about every intermediate state.  Neither may
//! panic, and the buffer must never exceed its limit.
//!
//! cargo fuzz run fuzz_fragment_stream

#![no_main]

use cyberfly_provision::link::completeness::is_complete;
use cyberfly_provision::link::framer::FragmentBuffer;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let step = usize::from(split % 32) + 1;

    let mut buf = FragmentBuffer::new(384, 2000);
    for (i, fragment) in rest.chunks(step).enumerate() {
        buf.append(fragment, i as u64 * 100);
        assert!(buf.len() <= buf.limit(), "buffer exceeded its limit");
        let text = buf.text();
        // Idempotent: asking twice gives the same answer.
        assert_eq!(is_complete(&text), is_complete(&text));
    }
});
