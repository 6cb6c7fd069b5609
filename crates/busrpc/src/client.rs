// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RPC client (caller side).
//!
//! Publishes calls on `<prefix>/<endpoint>/<service>/<method>/<caller>` and
//! correlates replies arriving on `.../<caller>/reply`. Inbound messages are
//! fed in by the application's delivery loop through
//! [`RpcClient::handle_message`]; blocking calls must therefore never be made
//! from that loop.

use crate::config::RpcConfig;
use crate::correlation::{CorrelationKey, CorrelationTable};
use crate::error::{RpcError, RpcResult};
use crate::pending::PendingCall;
use crate::protocol::{decode_response, encode_request, Id, Params, Request};
use crate::topic::{is_valid_component, sanitize_component, topic_matches, TopicScheme};
use crate::transport::Transport;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

type MethodKey = (String, String, String);

/// RPC client for calling methods on remote endpoints.
///
/// # Example
///
/// ```rust
/// use busrpc::{spawn_delivery_thread, Dispatcher, MemoryBus, RpcClient, RpcServer};
/// use serde_json::json;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let bus = MemoryBus::new();
///
/// let dispatcher = Arc::new(Dispatcher::new());
/// dispatcher.register_typed("math", "add", |(a, b): (i64, i64)| Ok(a + b));
/// let (conn, inbox) = bus.connect("server");
/// let server = Arc::new(RpcServer::new(conn, "Driver", dispatcher).unwrap());
/// server.setup().unwrap();
/// let s = Arc::clone(&server);
/// spawn_delivery_thread("server", inbox, move |m| {
///     let _ = s.handle_message(&m.topic, &m.payload);
/// })
/// .unwrap();
///
/// let (conn, inbox) = bus.connect("caller");
/// let client = Arc::new(RpcClient::new(conn));
/// let c = Arc::clone(&client);
/// spawn_delivery_thread("caller", inbox, move |m| {
///     c.handle_message(&m.topic, &m.payload);
/// })
/// .unwrap();
///
/// let sum = client
///     .call("Driver", "math", "add", vec![json!(2), json!(3)].into(), Some(Duration::from_secs(5)))
///     .unwrap();
/// assert_eq!(sum, json!(5));
/// ```
pub struct RpcClient<T: Transport> {
    transport: T,
    topics: TopicScheme,

    /// Sanitized caller id used as the `<caller>` topic level
    caller_id: String,

    /// Filter matching every reply addressed to this client
    reply_pattern: String,

    /// Call id counter
    sequence: AtomicI64,

    pending: CorrelationTable,

    /// (endpoint, service, method) triples whose reply topic is subscribed
    subscribed: Mutex<HashSet<MethodKey>>,

    default_timeout: Option<Duration>,

    shutdown: AtomicBool,
}

impl<T: Transport> RpcClient<T> {
    /// Client with default settings; the caller id is the transport's
    /// client id with illegal topic characters replaced.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, &RpcConfig::default())
    }

    pub fn with_config(transport: T, config: &RpcConfig) -> Self {
        let caller_id = match &config.client_id {
            Some(id) => sanitize_component(id),
            None => sanitize_component(transport.client_id()),
        };
        let topics = config.topics();
        let reply_pattern = topics.reply_subscription(&caller_id);

        Self {
            transport,
            topics,
            caller_id,
            reply_pattern,
            sequence: AtomicI64::new(1),
            pending: CorrelationTable::new(),
            subscribed: Mutex::new(HashSet::new()),
            default_timeout: config.default_timeout(),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Call a method and block until its reply or `timeout` (`None` waits
    /// forever).
    ///
    /// On timeout the pending entry is dropped, so a late reply is ignored.
    pub fn call(
        &self,
        endpoint: &str,
        service: &str,
        method: &str,
        params: Params,
        timeout: Option<Duration>,
    ) -> RpcResult<Value> {
        let call = self.call_async(endpoint, service, method, params)?;
        let result = call.wait(timeout);
        if let Err(RpcError::Timeout) = result {
            self.pending.remove(call.key());
            log::debug!("[client] call {} timed out", call.key());
        }
        result
    }

    /// [`call`](Self::call) with the configured default timeout.
    pub fn call_default(
        &self,
        endpoint: &str,
        service: &str,
        method: &str,
        params: Params,
    ) -> RpcResult<Value> {
        self.call(endpoint, service, method, params, self.default_timeout)
    }

    /// Send a call and return its pending handle without waiting.
    ///
    /// The entry stays registered until a reply resolves it; a caller that
    /// gives up waiting should [`forget`](Self::forget) it.
    pub fn call_async(
        &self,
        endpoint: &str,
        service: &str,
        method: &str,
        params: Params,
    ) -> RpcResult<PendingCall> {
        self.ensure_running()?;
        validate_components(endpoint, service, method)?;

        let call_id = self.sequence.fetch_add(1, Ordering::Relaxed);
        let key = CorrelationKey::new(endpoint, service, method, call_id);
        // registered before publishing so a fast reply always finds its entry
        let call = self.pending.register(key.clone())?;

        // a shutdown that swept the table before this entry landed
        if self.is_shutdown() {
            self.pending.remove(&key);
            call.cancel();
            return Err(RpcError::Shutdown);
        }

        if let Err(e) = self.send_call(endpoint, service, method, call_id, params) {
            self.pending.remove(&key);
            return Err(e);
        }

        log::debug!("[client] sent call {}", key);
        Ok(call)
    }

    /// Fire-and-forget call; no reply is produced or awaited.
    pub fn notify(
        &self,
        endpoint: &str,
        service: &str,
        method: &str,
        params: Params,
    ) -> RpcResult<()> {
        self.ensure_running()?;
        validate_components(endpoint, service, method)?;

        let topic = self
            .topics
            .call_topic(endpoint, service, method, &self.caller_id);
        let payload = encode_request(&Request::notification(params));
        self.transport.publish(&topic, &payload, false)?;
        log::debug!("[client] sent notification {}/{}/{}", endpoint, service, method);
        Ok(())
    }

    /// Drop the pending entry of an abandoned call.
    pub fn forget(&self, call: &PendingCall) -> bool {
        self.pending.remove(call.key())
    }

    /// Feed one inbound message. Returns true if it was a reply addressed to
    /// this client, whether or not a pending call matched it.
    pub fn handle_message(&self, topic: &str, payload: &[u8]) -> bool {
        if !topic_matches(&self.reply_pattern, topic) {
            return false;
        }
        let Some(address) = self.topics.parse_reply(topic) else {
            return false;
        };

        let response = match decode_response(payload) {
            Ok(response) => response,
            Err(e) => {
                log::warn!("[client] undecodable reply on {}: {}", topic, e);
                return true;
            }
        };

        let Some(call_id) = response.id.as_ref().and_then(Id::as_number) else {
            log::debug!("[client] reply on {} carries no call id, dropping", topic);
            return true;
        };

        let key = CorrelationKey::new(address.endpoint, address.service, address.method, call_id);
        self.pending.resolve(&key, response.outcome);
        true
    }

    /// Stop accepting calls, wake every waiter with [`RpcError::Shutdown`]
    /// and close the transport.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        let cancelled = self.pending.cancel_all();
        self.transport.close();
        log::debug!(
            "[client] {} shut down, {} pending calls cancelled",
            self.caller_id,
            cancelled
        );
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn caller_id(&self) -> &str {
        &self.caller_id
    }

    pub fn topics(&self) -> &TopicScheme {
        &self.topics
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    /// Number of calls still awaiting a reply.
    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }

    fn ensure_running(&self) -> RpcResult<()> {
        if self.is_shutdown() {
            Err(RpcError::Shutdown)
        } else {
            Ok(())
        }
    }

    fn send_call(
        &self,
        endpoint: &str,
        service: &str,
        method: &str,
        call_id: i64,
        params: Params,
    ) -> RpcResult<()> {
        self.ensure_reply_subscription(endpoint, service, method)?;

        let topic = self
            .topics
            .call_topic(endpoint, service, method, &self.caller_id);
        let payload = encode_request(&Request::call(Id::Number(call_id), params));
        self.transport.publish(&topic, &payload, false)?;
        Ok(())
    }

    /// Subscribe to the reply topic of a method once.
    fn ensure_reply_subscription(
        &self,
        endpoint: &str,
        service: &str,
        method: &str,
    ) -> RpcResult<()> {
        let key = (endpoint.to_string(), service.to_string(), method.to_string());
        if self.subscribed.lock().contains(&key) {
            return Ok(());
        }

        // lock released during I/O; a racing thread subscribing twice is harmless
        let topic = self
            .topics
            .reply_topic(endpoint, service, method, &self.caller_id);
        self.transport.subscribe(&topic)?;
        self.subscribed.lock().insert(key);
        Ok(())
    }
}

impl<T: Transport> Drop for RpcClient<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<T: Transport> std::fmt::Debug for RpcClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("caller_id", &self.caller_id)
            .field("prefix", &self.topics.prefix())
            .field("pending", &self.pending.len())
            .finish()
    }
}

fn validate_components(endpoint: &str, service: &str, method: &str) -> RpcResult<()> {
    for component in [endpoint, service, method] {
        if !is_valid_component(component) {
            return Err(RpcError::InvalidTopic(component.to_string()));
        }
    }
    Ok(())
}
