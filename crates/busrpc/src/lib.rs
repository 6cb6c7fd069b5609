// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Request/reply RPC over a publish/subscribe bus
//!
//! Carries JSON call envelopes over MQTT-style topics and correlates each
//! reply with the call that caused it.
//!
//! # Features
//!
//! - **Method Registry**: (service, method) -> handler, typed or raw
//! - **Call Router**: decode, dispatch, map every failure to an error reply
//! - **Call Correlation**: blocking calls with timeouts, duplicate-safe
//! - **Topic Addressing**: `<prefix>/<endpoint>/<service>/<method>/<caller>[/reply]`
//! - **Async Handlers** (feature `async`): methods returning futures, served
//!   through [`CallRouter::handle_async`] on a tokio runtime
//! - **Transport Seam**: any pub/sub connection behind [`Transport`], with an
//!   in-process [`MemoryBus`] for tests and single-process setups
//!
//! # Topics
//!
//! ```text
//! /rpc/v1/Driver/math/add                announcement (retained "1")
//! /rpc/v1/Driver/math/add/+              server subscription
//! /rpc/v1/Driver/math/add/ui             call from caller "ui"
//! /rpc/v1/Driver/math/add/ui/reply       reply to "ui"
//! ```
//!
//! # Configuration File
//!
//! ```toml
//! topic_prefix = "/rpc/v1"
//! endpoint_id = "Driver"
//! client_id = "ui"
//! default_timeout_ms = 10000
//! announce_retained = true
//! expose_fault_details = true
//! ```

pub mod client;
pub mod config;
pub mod correlation;
pub mod dispatcher;
pub mod error;
pub mod pending;
pub mod protocol;
pub mod router;
pub mod server;
pub mod topic;
pub mod transport;

pub use client::RpcClient;
pub use config::{ConfigError, RpcConfig};
pub use correlation::{CorrelationKey, CorrelationTable};
#[cfg(feature = "async")]
pub use dispatcher::{AsyncHandler, HandlerFuture};
pub use dispatcher::{Dispatcher, Fault, Handler, HandlerError, Method, Outcome};
pub use error::{RpcError, RpcResult, TransportError};
pub use pending::PendingCall;
pub use protocol::{DecodeError, ErrorCode, ErrorObject, Id, Params, Request, Response};
pub use router::{CallRouter, Reply, RouterOptions};
pub use server::RpcServer;
pub use topic::{topic_matches, CallAddress, TopicScheme};
pub use transport::{spawn_delivery_thread, MemoryBus, MemoryConnection, Message, Transport};
