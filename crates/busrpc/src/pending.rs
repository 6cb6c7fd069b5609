// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Single-assignment result slot for one outstanding call.
//!
//! The first `resolve`/`cancel` wins; later attempts are ignored so that a
//! duplicated reply cannot overwrite the outcome. Waiters block on a condvar,
//! never by polling.

use crate::correlation::CorrelationKey;
use crate::error::{RpcError, RpcResult};
use crate::protocol::ErrorObject;
use parking_lot::{Condvar, Mutex, MutexGuard};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug)]
enum Slot {
    Waiting,
    Resolved(Result<Value, ErrorObject>),
    Cancelled,
}

#[derive(Debug)]
struct Shared {
    key: CorrelationKey,
    slot: Mutex<Slot>,
    ready: Condvar,
}

/// Handle to the eventual outcome of a call.
///
/// Clones share the same slot.
#[derive(Debug, Clone)]
pub struct PendingCall {
    shared: Arc<Shared>,
}

impl PendingCall {
    pub(crate) fn new(key: CorrelationKey) -> Self {
        Self {
            shared: Arc::new(Shared {
                key,
                slot: Mutex::new(Slot::Waiting),
                ready: Condvar::new(),
            }),
        }
    }

    /// Correlation key this call was registered under.
    pub fn key(&self) -> &CorrelationKey {
        &self.shared.key
    }

    pub fn call_id(&self) -> i64 {
        self.shared.key.call_id
    }

    /// Store the outcome and wake waiters. Returns false if already settled.
    pub fn resolve(&self, outcome: Result<Value, ErrorObject>) -> bool {
        self.settle(Slot::Resolved(outcome))
    }

    /// Settle without an outcome; waiters get [`RpcError::Shutdown`].
    pub fn cancel(&self) -> bool {
        self.settle(Slot::Cancelled)
    }

    fn settle(&self, next: Slot) -> bool {
        let mut slot = self.shared.slot.lock();
        if !matches!(*slot, Slot::Waiting) {
            log::debug!("[pending] {} already settled, ignoring", self.shared.key);
            return false;
        }
        *slot = next;
        drop(slot);
        self.shared.ready.notify_all();
        true
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(*self.shared.slot.lock(), Slot::Waiting)
    }

    /// Non-blocking peek at the outcome.
    pub fn try_outcome(&self) -> Option<RpcResult<Value>> {
        let slot = self.shared.slot.lock();
        match *slot {
            Slot::Waiting => None,
            _ => Some(Self::outcome_of(&slot)),
        }
    }

    /// Block until settled or `timeout` elapses (`None` waits forever).
    ///
    /// A remote error comes back as [`RpcError::Remote`], an elapsed
    /// deadline as [`RpcError::Timeout`].
    pub fn wait(&self, timeout: Option<Duration>) -> RpcResult<Value> {
        let slot = self.wait_settled(timeout)?;
        Self::outcome_of(&slot)
    }

    /// Block like [`wait`](Self::wait) but return only the remote error, if any.
    pub fn error(&self, timeout: Option<Duration>) -> RpcResult<Option<ErrorObject>> {
        let slot = self.wait_settled(timeout)?;
        match &*slot {
            Slot::Resolved(Err(error)) => Ok(Some(error.clone())),
            Slot::Cancelled => Err(RpcError::Shutdown),
            _ => Ok(None),
        }
    }

    fn wait_settled(&self, timeout: Option<Duration>) -> RpcResult<MutexGuard<'_, Slot>> {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut slot = self.shared.slot.lock();

        while matches!(*slot, Slot::Waiting) {
            match deadline {
                Some(deadline) => {
                    let timed_out = self.shared.ready.wait_until(&mut slot, deadline).timed_out();
                    if timed_out && matches!(*slot, Slot::Waiting) {
                        return Err(RpcError::Timeout);
                    }
                }
                None => self.shared.ready.wait(&mut slot),
            }
        }

        Ok(slot)
    }

    fn outcome_of(slot: &Slot) -> RpcResult<Value> {
        match slot {
            Slot::Resolved(Ok(value)) => Ok(value.clone()),
            Slot::Resolved(Err(error)) => Err(RpcError::Remote(error.clone())),
            Slot::Cancelled => Err(RpcError::Shutdown),
            Slot::Waiting => Err(RpcError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread;

    fn pending() -> PendingCall {
        PendingCall::new(CorrelationKey::new("Driver", "math", "add", 1))
    }

    #[test]
    fn first_resolution_wins() {
        let call = pending();
        assert!(!call.is_resolved());
        assert!(call.resolve(Ok(json!(5))));
        assert!(!call.resolve(Ok(json!(6))));
        assert!(!call.resolve(Err(ErrorObject::new(1, "late"))));
        assert!(!call.cancel());
        assert!(call.is_resolved());
        assert_eq!(call.wait(Some(Duration::ZERO)).expect("value"), json!(5));
    }

    #[test]
    fn remote_error_surfaces_as_typed_error() {
        let call = pending();
        call.resolve(Err(ErrorObject::new(-32601, "Method not found")));
        match call.wait(None) {
            Err(RpcError::Remote(error)) => assert_eq!(error.code, -32601),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            call.error(None).expect("settled").map(|e| e.code),
            Some(-32601)
        );
    }

    #[test]
    fn error_accessor_on_success() {
        let call = pending();
        call.resolve(Ok(json!(null)));
        assert_eq!(call.error(None).expect("settled"), None);
    }

    #[test]
    fn timeout_without_resolution() {
        let call = pending();
        let start = Instant::now();
        let result = call.wait(Some(Duration::from_millis(20)));
        let elapsed = start.elapsed();

        assert!(matches!(result, Err(RpcError::Timeout)));
        assert!(elapsed >= Duration::from_millis(19), "returned early: {:?}", elapsed);
        assert!(call.try_outcome().is_none());
    }

    #[test]
    fn resolve_wakes_waiter() {
        let call = pending();
        let resolver = call.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            resolver.resolve(Ok(json!("done")));
        });

        let start = Instant::now();
        let value = call.wait(Some(Duration::from_secs(5))).expect("resolved");
        assert_eq!(value, json!("done"));
        assert!(start.elapsed() < Duration::from_secs(1), "should wake quickly");

        handle.join().unwrap();
    }

    #[test]
    fn cancel_reports_shutdown() {
        let call = pending();
        let waiter = call.clone();
        let handle = thread::spawn(move || waiter.wait(None));
        thread::sleep(Duration::from_millis(10));
        assert!(call.cancel());
        assert!(matches!(handle.join().unwrap(), Err(RpcError::Shutdown)));
    }

    #[test]
    fn many_waiters_see_same_outcome() {
        let call = pending();
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let call = call.clone();
                thread::spawn(move || call.wait(Some(Duration::from_secs(5))))
            })
            .collect();

        thread::sleep(Duration::from_millis(10));
        call.resolve(Ok(json!(1)));

        for waiter in waiters {
            assert_eq!(waiter.join().unwrap().expect("resolved"), json!(1));
        }
    }
}
