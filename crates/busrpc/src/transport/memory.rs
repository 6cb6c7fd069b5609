// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process broker.
//!
//! Behaves like a minimal MQTT broker: wildcard subscriptions, a retained
//! store (an empty retained payload clears the entry), and at most one copy
//! of a publication per connection regardless of how many of its filters
//! match. Each connection gets an unbounded channel as its event stream.

use super::{Message, Transport};
use crate::error::TransportError;
use crate::topic::{is_valid_pattern, is_valid_topic, topic_matches};
use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

struct Session {
    client_id: String,
    patterns: Vec<String>,
    tx: Sender<Message>,
}

#[derive(Default)]
struct BusInner {
    sessions: RwLock<HashMap<u64, Session>>,
    retained: Mutex<BTreeMap<String, Vec<u8>>>,
    next_session: AtomicU64,
}

/// Shared in-memory bus. Clones refer to the same broker.
#[derive(Clone, Default)]
pub struct MemoryBus {
    inner: Arc<BusInner>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a connection. Messages matching its subscriptions arrive on the
    /// returned receiver until the connection is closed or dropped.
    pub fn connect(&self, client_id: &str) -> (MemoryConnection, Receiver<Message>) {
        let (tx, rx) = unbounded();
        let session = self.inner.next_session.fetch_add(1, Ordering::Relaxed);
        self.inner.sessions.write().insert(
            session,
            Session {
                client_id: client_id.to_string(),
                patterns: Vec::new(),
                tx,
            },
        );
        log::debug!("[memory-bus] {} connected (session {})", client_id, session);

        let connection = MemoryConnection {
            bus: Arc::clone(&self.inner),
            session,
            client_id: client_id.to_string(),
            closed: AtomicBool::new(false),
        };
        (connection, rx)
    }

    /// Current retained payload for `topic`.
    pub fn retained(&self, topic: &str) -> Option<Vec<u8>> {
        self.inner.retained.lock().get(topic).cloned()
    }

    pub fn connection_count(&self) -> usize {
        self.inner.sessions.read().len()
    }
}

impl std::fmt::Debug for MemoryBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBus")
            .field("connections", &self.connection_count())
            .field("retained", &self.inner.retained.lock().len())
            .finish()
    }
}

/// One client's connection to a [`MemoryBus`].
pub struct MemoryConnection {
    bus: Arc<BusInner>,
    session: u64,
    client_id: String,
    closed: AtomicBool,
}

impl MemoryConnection {
    /// Disconnect. The event stream ends once queued messages are drained.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.bus.sessions.write().remove(&self.session);
        log::debug!("[memory-bus] {} disconnected", self.client_id);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.is_closed() {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Transport for MemoryConnection {
    fn client_id(&self) -> &str {
        &self.client_id
    }

    fn publish(&self, topic: &str, payload: &[u8], retained: bool) -> Result<(), TransportError> {
        self.ensure_open()?;
        if !is_valid_topic(topic) {
            return Err(TransportError::InvalidTopic(topic.to_string()));
        }

        if retained {
            let mut store = self.bus.retained.lock();
            if payload.is_empty() {
                store.remove(topic);
            } else {
                store.insert(topic.to_string(), payload.to_vec());
            }
        }

        let targets: Vec<Sender<Message>> = self
            .bus
            .sessions
            .read()
            .values()
            .filter(|s| s.patterns.iter().any(|p| topic_matches(p, topic)))
            .map(|s| s.tx.clone())
            .collect();

        for tx in targets {
            // receiver gone means that client is shutting down
            let _ = tx.send(Message::new(topic, payload.to_vec()));
        }
        Ok(())
    }

    fn subscribe(&self, pattern: &str) -> Result<(), TransportError> {
        self.ensure_open()?;
        if !is_valid_pattern(pattern) {
            return Err(TransportError::Subscribe {
                pattern: pattern.to_string(),
                reason: "malformed topic filter".to_string(),
            });
        }

        let tx = {
            let mut sessions = self.bus.sessions.write();
            let session = sessions
                .get_mut(&self.session)
                .ok_or(TransportError::Closed)?;
            if !session.patterns.iter().any(|p| p == pattern) {
                session.patterns.push(pattern.to_string());
            }
            log::debug!("[memory-bus] {} subscribed to {}", session.client_id, pattern);
            session.tx.clone()
        };

        let replay: Vec<Message> = self
            .bus
            .retained
            .lock()
            .iter()
            .filter(|(topic, _)| topic_matches(pattern, topic))
            .map(|(topic, payload)| Message {
                topic: topic.clone(),
                payload: payload.clone(),
                retained: true,
            })
            .collect();

        for message in replay {
            let _ = tx.send(message);
        }
        Ok(())
    }

    fn close(&self) {
        MemoryConnection::close(self);
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for MemoryConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryConnection")
            .field("client_id", &self.client_id)
            .field("session", &self.session)
            .field("closed", &self.is_closed())
            .finish()
    }
}
