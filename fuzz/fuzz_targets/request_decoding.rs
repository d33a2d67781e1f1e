#![no_main]

//! Fuzz target for request decoding.
//!
//! Feeds arbitrary bytes to the request decoder. Decoding must never panic,
//! and any buffer it accepts must re-encode to the same bytes.

use attestor_core::{decode_request, encode_request, equals_request};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    fuzz_request_decoding(data);
});

fn fuzz_request_decoding(data: &[u8]) {
    let Ok(request) = decode_request(data) else {
        return;
    };

    let encoded = match encode_request(&request) {
        Ok(encoded) => encoded,
        Err(e) => panic!("decoded request failed to encode: {e}"),
    };
    assert_eq!(encoded.as_ref(), data, "re-encoding changed the bytes");

    let again = match decode_request(&encoded) {
        Ok(again) => again,
        Err(e) => panic!("re-encoded request failed to decode: {e}"),
    };
    assert!(equals_request(&request, &again));
}
