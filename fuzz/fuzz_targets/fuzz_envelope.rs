// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use busrpc::protocol::{decode_request, decode_response, encode_request, encode_response};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Anything that decodes must re-encode to an equivalent envelope
    if let Ok(request) = decode_request(data) {
        let again = decode_request(&encode_request(&request)).expect("re-decode request");
        assert_eq!(again, request);
    }

    if let Ok(response) = decode_response(data) {
        let again = decode_response(&encode_response(&response)).expect("re-decode response");
        assert_eq!(again, response);
    }
});
