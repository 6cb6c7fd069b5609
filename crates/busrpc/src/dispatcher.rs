// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Method registry: (service, method) -> handler.
//!
//! Handlers report their result as an [`Outcome`], so the router maps every
//! case with one exhaustive match.
//!
//! Registration is expected to finish before the server calls
//! [`RpcServer::setup`](crate::RpcServer::setup). Methods registered later
//! are dispatched if a call reaches them, but they are never announced or
//! subscribed to.
//!
//! With the `async` feature, methods can also be registered as
//! [`AsyncHandler`]s. Those only run through
//! [`CallRouter::handle_async`](crate::CallRouter::handle_async).

use crate::protocol::{ErrorObject, Params};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
#[cfg(feature = "async")]
use std::future::Future;
#[cfg(feature = "async")]
use std::pin::Pin;
use std::sync::Arc;

/// Diagnostic for a failed invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    /// Failure class (e.g. `"ParamsError"`, `"panic"`)
    pub kind: String,
    pub message: String,
}

impl Fault {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Diagnostic data attached to error replies.
    pub fn diagnostic(&self, params: &Params) -> Value {
        serde_json::json!({
            "type": self.kind,
            "args": params.to_value(),
            "message": self.message,
        })
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Result of invoking a handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Normal return value
    Success(Value),
    /// Deliberate failure, forwarded verbatim
    ApplicationError(ErrorObject),
    /// The call's own arguments did not fit the handler
    InvalidParams(Fault),
    /// Anything else that went wrong inside the handler
    Fault(Fault),
}

impl Outcome {
    /// Build an outcome from a typed handler result.
    pub fn from_result<T: Serialize>(result: Result<T, HandlerError>) -> Self {
        match result {
            Ok(value) => match serde_json::to_value(value) {
                Ok(value) => Outcome::Success(value),
                Err(e) => Outcome::Fault(Fault::new("SerializationError", e.to_string())),
            },
            Err(err) => err.into(),
        }
    }
}

/// Error a typed handler can return.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerError {
    Application(ErrorObject),
    InvalidParams(String),
    Fault(Fault),
}

impl HandlerError {
    /// Application error with a code and message.
    pub fn application(code: i64, message: impl Into<String>) -> Self {
        HandlerError::Application(ErrorObject::new(code, message))
    }

    /// Unexpected failure of the given class.
    pub fn fault(kind: impl Into<String>, message: impl Into<String>) -> Self {
        HandlerError::Fault(Fault::new(kind, message))
    }
}

impl From<ErrorObject> for HandlerError {
    fn from(error: ErrorObject) -> Self {
        HandlerError::Application(error)
    }
}

impl From<HandlerError> for Outcome {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::Application(error) => Outcome::ApplicationError(error),
            HandlerError::InvalidParams(message) => {
                Outcome::InvalidParams(Fault::new("ParamsError", message))
            }
            HandlerError::Fault(fault) => Outcome::Fault(fault),
        }
    }
}

/// Invocable method.
pub trait Handler: Send + Sync + 'static {
    /// Run the method with the decoded call arguments.
    fn invoke(&self, params: &Params) -> Outcome;
}

impl<F> Handler for F
where
    F: Fn(&Params) -> Outcome + Send + Sync + 'static,
{
    fn invoke(&self, params: &Params) -> Outcome {
        self(params)
    }
}

/// Boxed future returned by an [`AsyncHandler`].
#[cfg(feature = "async")]
pub type HandlerFuture = Pin<Box<dyn Future<Output = Outcome> + Send + 'static>>;

/// Method that completes asynchronously.
///
/// The future owns its arguments so the router can move it onto a tokio
/// task.
#[cfg(feature = "async")]
pub trait AsyncHandler: Send + Sync + 'static {
    fn invoke(&self, params: Params) -> HandlerFuture;
}

#[cfg(feature = "async")]
impl<F, Fut> AsyncHandler for F
where
    F: Fn(Params) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    fn invoke(&self, params: Params) -> HandlerFuture {
        Box::pin(self(params))
    }
}

/// Registered method, as returned by [`Dispatcher::lookup`].
#[derive(Clone)]
pub enum Method {
    Blocking(Arc<dyn Handler>),
    #[cfg(feature = "async")]
    Async(Arc<dyn AsyncHandler>),
}

impl Method {
    /// The blocking handler, if this method has one.
    pub fn as_blocking(&self) -> Option<&Arc<dyn Handler>> {
        match self {
            Method::Blocking(handler) => Some(handler),
            #[cfg(feature = "async")]
            Method::Async(_) => None,
        }
    }

    pub fn is_async(&self) -> bool {
        self.as_blocking().is_none()
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_async() { "Method::Async" } else { "Method::Blocking" })
    }
}

type MethodTable = HashMap<String, HashMap<String, Method>>;

/// Two-level (service, method) handler table.
#[derive(Default)]
pub struct Dispatcher {
    services: RwLock<MethodTable>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler`, replacing any existing entry for the key.
    ///
    /// Returns true if an entry was replaced.
    pub fn register<H: Handler>(&self, service: &str, method: &str, handler: H) -> bool {
        self.insert(service, method, Method::Blocking(Arc::new(handler)))
    }

    fn insert(&self, service: &str, method: &str, entry: Method) -> bool {
        let replaced = self
            .services
            .write()
            .entry(service.to_string())
            .or_default()
            .insert(method.to_string(), entry)
            .is_some();
        log::debug!(
            "[dispatcher] registered {}/{}{}",
            service,
            method,
            if replaced { " (replaced)" } else { "" }
        );
        replaced
    }

    /// Register a closure taking positional arguments as a tuple.
    ///
    /// ```rust
    /// use busrpc::Dispatcher;
    ///
    /// let dispatcher = Dispatcher::new();
    /// dispatcher.register_typed("math", "add", |(a, b): (i64, i64)| Ok(a + b));
    /// ```
    pub fn register_typed<A, R, F>(&self, service: &str, method: &str, f: F) -> bool
    where
        A: DeserializeOwned + 'static,
        R: Serialize + 'static,
        F: Fn(A) -> Result<R, HandlerError> + Send + Sync + 'static,
    {
        self.register(service, method, move |params: &Params| {
            match params.positional_args::<A>() {
                Ok(args) => Outcome::from_result(f(args)),
                Err(reason) => Outcome::InvalidParams(Fault::new("ParamsError", reason)),
            }
        })
    }

    /// Register a closure taking named arguments as a struct.
    pub fn register_named<A, R, F>(&self, service: &str, method: &str, f: F) -> bool
    where
        A: DeserializeOwned + 'static,
        R: Serialize + 'static,
        F: Fn(A) -> Result<R, HandlerError> + Send + Sync + 'static,
    {
        self.register(service, method, move |params: &Params| {
            match params.named_args::<A>() {
                Ok(args) => Outcome::from_result(f(args)),
                Err(reason) => Outcome::InvalidParams(Fault::new("ParamsError", reason)),
            }
        })
    }

    /// Register an async handler, replacing any existing entry for the key.
    #[cfg(feature = "async")]
    pub fn register_async<H>(&self, service: &str, method: &str, handler: H) -> bool
    where
        H: AsyncHandler,
    {
        self.insert(service, method, Method::Async(Arc::new(handler)))
    }

    /// Register an async closure taking positional arguments as a tuple.
    ///
    /// ```rust
    /// use busrpc::Dispatcher;
    ///
    /// let dispatcher = Dispatcher::new();
    /// dispatcher.register_async_typed("math", "add", |(a, b): (i64, i64)| async move {
    ///     Ok(a + b)
    /// });
    /// ```
    #[cfg(feature = "async")]
    pub fn register_async_typed<A, R, F, Fut>(&self, service: &str, method: &str, f: F) -> bool
    where
        A: DeserializeOwned + 'static,
        R: Serialize + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    {
        self.register_async(service, method, move |params: Params| -> HandlerFuture {
            match params.positional_args::<A>() {
                Ok(args) => {
                    let pending = f(args);
                    Box::pin(async move { Outcome::from_result(pending.await) })
                }
                Err(reason) => Box::pin(std::future::ready(Outcome::InvalidParams(Fault::new(
                    "ParamsError",
                    reason,
                )))),
            }
        })
    }

    /// Remove an entry. Returns true if it existed.
    pub fn unregister(&self, service: &str, method: &str) -> bool {
        let mut services = self.services.write();
        let Some(methods) = services.get_mut(service) else {
            return false;
        };
        let removed = methods.remove(method).is_some();
        if methods.is_empty() {
            services.remove(service);
        }
        removed
    }

    /// Exact-match lookup.
    ///
    /// The returned handle is invoked after the registry lock is released.
    pub fn lookup(&self, service: &str, method: &str) -> Option<Method> {
        self.services
            .read()
            .get(service)
            .and_then(|methods| methods.get(method))
            .cloned()
    }

    /// All registered keys, sorted.
    pub fn list_entries(&self) -> Vec<(String, String)> {
        let services = self.services.read();
        let mut entries: Vec<(String, String)> = services
            .iter()
            .flat_map(|(service, methods)| {
                methods
                    .keys()
                    .map(move |method| (service.clone(), method.clone()))
            })
            .collect();
        entries.sort();
        entries
    }

    pub fn len(&self) -> usize {
        self.services.read().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("entries", &self.list_entries())
            .finish()
    }
}

impl Params {
    /// Deserialize positional arguments; named arguments are rejected.
    ///
    /// No arguments at all also satisfy zero-argument targets such as `()`,
    /// which deserialize from `null` rather than `[]`.
    fn positional_args<A: DeserializeOwned>(&self) -> Result<A, String> {
        match self {
            _ if self.is_empty() => serde_json::from_value(Value::Array(Vec::new()))
                .or_else(|err| serde_json::from_value(Value::Null).map_err(|_| err))
                .map_err(|e| e.to_string()),
            Params::Positional(_) => self.parse().map_err(|e| e.to_string()),
            Params::Named(_) => Err("expected positional arguments".to_string()),
        }
    }

    /// Deserialize named arguments; positional arguments are rejected.
    fn named_args<A: DeserializeOwned>(&self) -> Result<A, String> {
        match self {
            Params::Named(_) => self.parse().map_err(|e| e.to_string()),
            Params::Positional(_) => Err("expected named arguments".to_string()),
        }
    }
}
