// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Correlation table: pending calls keyed by (endpoint, service, method, id).
//!
//! Shared by caller threads (register/remove) and the delivery thread
//! (resolve). Each operation holds a shard lock only for the map update;
//! waking the waiter happens after the entry has been taken out.

use crate::error::{RpcError, RpcResult};
use crate::pending::PendingCall;
use crate::protocol::ErrorObject;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use std::fmt;

/// Identifies which pending call a reply belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationKey {
    pub endpoint: String,
    pub service: String,
    pub method: String,
    pub call_id: i64,
}

impl CorrelationKey {
    pub fn new(
        endpoint: impl Into<String>,
        service: impl Into<String>,
        method: impl Into<String>,
        call_id: i64,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            service: service.into(),
            method: method.into(),
            call_id,
        }
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}#{}",
            self.endpoint, self.service, self.method, self.call_id
        )
    }
}

/// Registry of calls awaiting a reply.
#[derive(Debug, Default)]
pub struct CorrelationTable {
    pending: DashMap<CorrelationKey, PendingCall>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new pending call under `key`.
    ///
    /// Fails with [`RpcError::DuplicateCall`] if the key is still pending.
    pub fn register(&self, key: CorrelationKey) -> RpcResult<PendingCall> {
        match self.pending.entry(key) {
            Entry::Occupied(entry) => Err(RpcError::DuplicateCall(entry.key().clone())),
            Entry::Vacant(entry) => {
                let call = PendingCall::new(entry.key().clone());
                entry.insert(call.clone());
                Ok(call)
            }
        }
    }

    /// Take the call at `key` out of the table and settle it.
    ///
    /// Returns false when nothing is registered under `key` (late reply,
    /// reply to another process); that is not an error.
    pub fn resolve(&self, key: &CorrelationKey, outcome: Result<Value, ErrorObject>) -> bool {
        match self.pending.remove(key) {
            Some((_, call)) => {
                call.resolve(outcome);
                true
            }
            None => {
                log::debug!("[correlation] no pending call for {}, dropping reply", key);
                false
            }
        }
    }

    /// Forget `key` without settling it (timeout cleanup).
    pub fn remove(&self, key: &CorrelationKey) -> bool {
        self.pending.remove(key).is_some()
    }

    pub fn contains(&self, key: &CorrelationKey) -> bool {
        self.pending.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Cancel and drop every pending call. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let keys: Vec<CorrelationKey> = self.pending.iter().map(|e| e.key().clone()).collect();
        let mut cancelled = 0;
        for key in keys {
            if let Some((_, call)) = self.pending.remove(&key) {
                call.cancel();
                cancelled += 1;
            }
        }
        cancelled
    }
}
