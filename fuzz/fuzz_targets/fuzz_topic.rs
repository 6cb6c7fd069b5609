// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use busrpc::topic::{is_valid_pattern, sanitize_component, topic_matches, TopicScheme};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let scheme = TopicScheme::default();

    // Parsed addresses rebuild the exact topic
    if let Some(a) = scheme.parse_call(text) {
        assert_eq!(scheme.call_topic(&a.endpoint, &a.service, &a.method, &a.caller), text);
    }
    if let Some(a) = scheme.parse_reply(text) {
        assert_eq!(scheme.reply_topic(&a.endpoint, &a.service, &a.method, &a.caller), text);
    }

    let component = sanitize_component(text);
    let topic = scheme.call_topic("Driver", "svc", "m", &component);
    assert!(scheme.parse_call(&topic).is_some());

    if is_valid_pattern(text) {
        let _ = topic_matches(text, &topic);
    }
});
