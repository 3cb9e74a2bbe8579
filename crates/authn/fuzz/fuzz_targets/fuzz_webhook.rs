//! Fuzz target for webhook signature headers and event payloads.
//!
//! The first byte selects how the input is split between the signature
//! header and the body. Neither header parsing nor event parsing may panic.

#![no_main]

use chrono::DateTime;
use huddle_authn::webhook::{DEFAULT_WEBHOOK_TOLERANCE, parse_event, verify_signature};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let (header, body) = rest.split_at(usize::from(split).min(rest.len()));

    let Some(now) = DateTime::from_timestamp(1_700_000_000, 0) else {
        return;
    };
    if let Ok(header) = std::str::from_utf8(header) {
        let _ = verify_signature(b"whsec_fuzz", Some(header), body, now, DEFAULT_WEBHOOK_TOLERANCE);
    }
    let _ = parse_event(body);
});
