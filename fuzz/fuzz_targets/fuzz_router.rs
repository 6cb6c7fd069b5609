// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use busrpc::protocol::decode_request;
use busrpc::{CallRouter, Dispatcher, Reply};
use libfuzzer_sys::fuzz_target;
use std::sync::{Arc, OnceLock};

fn router() -> &'static CallRouter {
    static ROUTER: OnceLock<CallRouter> = OnceLock::new();
    ROUTER.get_or_init(|| {
        let dispatcher = Dispatcher::new();
        dispatcher.register_typed("math", "add", |(a, b): (i64, i64)| Ok(a.wrapping_add(b)));
        CallRouter::new(Arc::new(dispatcher))
    })
}

fuzz_target!(|data: &[u8]| {
    // Never panics; notifications are never answered
    let reply = router().handle(data, "math", "add");
    if let Ok(request) = decode_request(data) {
        match (&request.id, &reply) {
            (None, Reply::NoReply) => {}
            (Some(id), Reply::Send(response)) => assert_eq!(response.id.as_ref(), Some(id)),
            other => panic!("unexpected reply shape: {:?}", other),
        }
    }
});
