// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pub/sub transport seam.
//!
//! The RPC layer only needs to publish, subscribe and be handed inbound
//! messages. Connection management, QoS and reconnect belong to the
//! concrete transport.

mod memory;

pub use crate::topic::topic_matches;
pub use memory::{MemoryBus, MemoryConnection};

use crate::error::TransportError;
use crossbeam::channel::Receiver;
use std::io;
use std::thread::{self, JoinHandle};

/// One inbound publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: Vec<u8>,
    /// Replayed from the retained store on subscribe
    pub retained: bool,
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            retained: false,
        }
    }
}

/// Publish/subscribe connection used by [`RpcClient`](crate::RpcClient) and
/// [`RpcServer`](crate::RpcServer).
///
/// Implementations must not call back into the RPC layer from `publish` or
/// `subscribe`; inbound messages go to the connection's event stream.
///
/// `RpcClient::shutdown` and `RpcServer::shutdown` close their transport,
/// which ends the event stream and with it any delivery thread holding the
/// client or server. A connection shared through an `Arc` is closed by
/// whichever owner shuts down first.
pub trait Transport: Send + Sync + 'static {
    /// Client id the connection was opened with.
    fn client_id(&self) -> &str;

    fn publish(&self, topic: &str, payload: &[u8], retained: bool) -> Result<(), TransportError>;

    /// Subscribe to a topic filter (MQTT `+`/`#` wildcards).
    fn subscribe(&self, pattern: &str) -> Result<(), TransportError>;

    /// Disconnect and end the event stream. Idempotent.
    fn close(&self) {}
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn client_id(&self) -> &str {
        (**self).client_id()
    }

    fn publish(&self, topic: &str, payload: &[u8], retained: bool) -> Result<(), TransportError> {
        (**self).publish(topic, payload, retained)
    }

    fn subscribe(&self, pattern: &str) -> Result<(), TransportError> {
        (**self).subscribe(pattern)
    }

    fn close(&self) {
        (**self).close();
    }
}

/// Run `on_message` for every message on `inbox` in a named thread.
///
/// The thread exits once every sender of `inbox` is gone.
pub fn spawn_delivery_thread<F>(
    name: &str,
    inbox: Receiver<Message>,
    mut on_message: F,
) -> io::Result<JoinHandle<()>>
where
    F: FnMut(Message) + Send + 'static,
{
    let thread_name = format!("busrpc-{}", name);
    thread::Builder::new().name(thread_name).spawn(move || {
        for message in inbox.iter() {
            on_message(message);
        }
        log::debug!("[transport] delivery loop finished");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::unbounded;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn delivery_thread_drains_until_disconnect() {
        let (tx, rx) = unbounded();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);

        let handle = spawn_delivery_thread("test", rx, move |message| {
            assert_eq!(message.payload, b"x");
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .expect("spawn");

        for _ in 0..3 {
            tx.send(Message::new("a/b", b"x".to_vec())).expect("send");
        }
        drop(tx);
        handle.join().expect("join");
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }
}
