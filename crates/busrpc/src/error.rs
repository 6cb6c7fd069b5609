// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for bus RPC operations.

use crate::correlation::CorrelationKey;
use crate::protocol::{DecodeError, ErrorObject};
use thiserror::Error;

/// Result type for RPC operations
pub type RpcResult<T> = Result<T, RpcError>;

/// Failures reported by a transport. Never retried by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport connection closed")]
    Closed,

    #[error("publish to '{topic}' failed: {reason}")]
    Publish { topic: String, reason: String },

    #[error("subscribe to '{pattern}' failed: {reason}")]
    Subscribe { pattern: String, reason: String },

    #[error("invalid topic: {0}")]
    InvalidTopic(String),
}

/// Errors surfaced to RPC callers
#[derive(Debug, Error)]
pub enum RpcError {
    /// No reply arrived before the local deadline
    #[error("RPC request timed out")]
    Timeout,

    /// The remote side answered with an error object
    #[error("{0}")]
    Remote(ErrorObject),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A call with the same correlation key is still pending
    #[error("duplicate pending call {0}")]
    DuplicateCall(CorrelationKey),

    /// Identifier unusable as a topic level
    #[error("invalid topic component '{0}'")]
    InvalidTopic(String),

    #[error("RPC client shut down")]
    Shutdown,
}

impl RpcError {
    /// Remote error object, if this is one.
    pub fn remote(&self) -> Option<&ErrorObject> {
        match self {
            RpcError::Remote(error) => Some(error),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, RpcError::Timeout)
    }
}

impl From<ErrorObject> for RpcError {
    fn from(error: ErrorObject) -> Self {
        RpcError::Remote(error)
    }
}
