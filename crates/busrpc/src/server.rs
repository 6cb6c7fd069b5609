// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RPC server (callee side).
//!
//! For every registered (service, method) the server subscribes to
//! `<prefix>/<endpoint>/<service>/<method>/+` and announces the method with
//! a retained marker on the bare topic. Each inbound call is routed through
//! a [`CallRouter`] and answered on `.../<caller>/reply`.

use crate::config::{ConfigError, RpcConfig};
use crate::dispatcher::Dispatcher;
use crate::error::TransportError;
use crate::protocol::encode_response;
use crate::router::{CallRouter, Reply};
use crate::topic::{CallAddress, TopicScheme};
use crate::transport::Transport;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Payload of the retained announcement marker.
pub const ANNOUNCE_MARKER: &[u8] = b"1";

/// Serves the methods of a [`Dispatcher`] under one endpoint id.
pub struct RpcServer<T: Transport> {
    transport: T,
    topics: TopicScheme,
    endpoint_id: String,
    router: CallRouter,
    announce_retained: bool,

    /// Announcement topics published by `setup`
    announced: Mutex<Vec<String>>,

    requests_processed: AtomicU64,
    replies_sent: AtomicU64,
}

impl<T: Transport> RpcServer<T> {
    /// Server with default settings.
    ///
    /// Fails if `endpoint_id` is not a single topic level (empty, or
    /// containing `/`, `+` or `#`).
    pub fn new(
        transport: T,
        endpoint_id: &str,
        dispatcher: Arc<Dispatcher>,
    ) -> Result<Self, ConfigError> {
        let config = RpcConfig::default().endpoint_id(endpoint_id);
        Self::with_config(transport, dispatcher, &config)
    }

    pub fn with_config(
        transport: T,
        dispatcher: Arc<Dispatcher>,
        config: &RpcConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            transport,
            topics: config.topics(),
            endpoint_id: config.endpoint_id.clone(),
            router: CallRouter::with_options(dispatcher, config.router_options()),
            announce_retained: config.announce_retained,
            announced: Mutex::new(Vec::new()),
            requests_processed: AtomicU64::new(0),
            replies_sent: AtomicU64::new(0),
        })
    }

    /// Subscribe to and announce every registered method.
    ///
    /// Returns the number of methods served. Methods registered afterwards
    /// need another `setup` call to become reachable.
    pub fn setup(&self) -> Result<usize, TransportError> {
        let entries = self.router.dispatcher().list_entries();

        for (service, method) in &entries {
            let pattern = self
                .topics
                .call_subscription(&self.endpoint_id, service, method);
            self.transport.subscribe(&pattern)?;

            let announce = self.topics.announce_topic(&self.endpoint_id, service, method);
            self.transport
                .publish(&announce, ANNOUNCE_MARKER, self.announce_retained)?;

            let mut announced = self.announced.lock();
            if !announced.contains(&announce) {
                announced.push(announce);
            }
            log::debug!("[server] serving {}/{}/{}", self.endpoint_id, service, method);
        }

        log::info!(
            "[server] endpoint '{}' serving {} methods under {}",
            self.endpoint_id,
            entries.len(),
            self.topics.prefix()
        );
        Ok(entries.len())
    }

    /// Feed one inbound message.
    ///
    /// Returns `Ok(true)` if it was a call to this endpoint. Only publishing
    /// the reply can fail; the call itself was handled either way.
    pub fn handle_message(&self, topic: &str, payload: &[u8]) -> Result<bool, TransportError> {
        let Some(address) = self.accept(topic) else {
            return Ok(false);
        };
        let reply = self
            .router
            .handle(payload, &address.service, &address.method);
        self.send_reply(&address, reply).map(|()| true)
    }

    /// Async variant of [`handle_message`](Self::handle_message) that can
    /// serve async handlers. Must be polled inside a tokio runtime.
    #[cfg(feature = "async")]
    pub async fn handle_message_async(
        &self,
        topic: &str,
        payload: &[u8],
    ) -> Result<bool, TransportError> {
        let Some(address) = self.accept(topic) else {
            return Ok(false);
        };
        let reply = self
            .router
            .handle_async(payload, &address.service, &address.method)
            .await;
        self.send_reply(&address, reply).map(|()| true)
    }

    fn accept(&self, topic: &str) -> Option<CallAddress> {
        let address = self.topics.parse_call(topic)?;
        if address.endpoint != self.endpoint_id {
            return None;
        }

        self.requests_processed.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "[server] call {}/{} from {}",
            address.service,
            address.method,
            address.caller
        );
        Some(address)
    }

    fn send_reply(&self, address: &CallAddress, reply: Reply) -> Result<(), TransportError> {
        let response = match reply {
            Reply::Send(response) => response,
            Reply::NoReply => return Ok(()),
        };

        let reply_topic = self.topics.reply_topic(
            &address.endpoint,
            &address.service,
            &address.method,
            &address.caller,
        );
        if let Err(e) = self
            .transport
            .publish(&reply_topic, &encode_response(&response), false)
        {
            log::warn!("[server] failed to send reply on {}: {}", reply_topic, e);
            return Err(e);
        }

        self.replies_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Clear retained announcements published by [`setup`](Self::setup),
    /// then close the transport.
    ///
    /// The transport is closed even if clearing a marker fails.
    pub fn shutdown(&self) -> Result<(), TransportError> {
        let announced: Vec<String> = self.announced.lock().drain(..).collect();
        let cleared = if self.announce_retained {
            announced
                .iter()
                .try_for_each(|topic| self.transport.publish(topic, b"", true))
        } else {
            Ok(())
        };
        self.transport.close();
        log::info!("[server] endpoint '{}' shut down", self.endpoint_id);
        cleared
    }

    pub fn endpoint_id(&self) -> &str {
        &self.endpoint_id
    }

    pub fn router(&self) -> &CallRouter {
        &self.router
    }

    pub fn topics(&self) -> &TopicScheme {
        &self.topics
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Calls addressed to this endpoint so far (including notifications).
    pub fn requests_processed(&self) -> u64 {
        self.requests_processed.load(Ordering::Relaxed)
    }

    pub fn replies_sent(&self) -> u64 {
        self.replies_sent.load(Ordering::Relaxed)
    }
}

impl<T: Transport> std::fmt::Debug for RpcServer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcServer")
            .field("endpoint_id", &self.endpoint_id)
            .field("prefix", &self.topics.prefix())
            .field("requests_processed", &self.requests_processed())
            .finish()
    }
}
