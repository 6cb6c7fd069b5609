// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Call router: turns one inbound call payload into a reply (or no reply).
//!
//! # Pipeline
//!
//! ```text
//! payload -> decode -> lookup(service, method) -> invoke -> Response | NoReply
//!              |              |                      |
//!         ParseError     MethodNotFound    InvalidParams / ServerError
//! ```
//!
//! Requests without an id never get a reply, whichever branch they took.
//! Undecodable payloads are answered with `"id": null` because there is no
//! way to tell whether they were meant as notifications.
//!
//! Async handlers run through [`CallRouter::handle_async`], which spawns each
//! one on the current tokio runtime so a panic is contained the same way.

use crate::dispatcher::{Dispatcher, Fault, Method, Outcome};
use crate::protocol::{decode_request, DecodeError, ErrorCode, ErrorObject, Request, Response};
use serde_json::Value;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// What to publish for one inbound call.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Publish this response on the reply topic
    Send(Response),
    /// Publish nothing (notification)
    NoReply,
}

impl Reply {
    pub fn response(&self) -> Option<&Response> {
        match self {
            Reply::Send(response) => Some(response),
            Reply::NoReply => None,
        }
    }
}

/// Router behaviour switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterOptions {
    /// Include fault class, arguments and message in server-error replies.
    /// The log entry always has them.
    pub expose_fault_details: bool,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            expose_fault_details: true,
        }
    }
}

/// Server-side response manager.
#[derive(Debug, Clone)]
pub struct CallRouter {
    dispatcher: Arc<Dispatcher>,
    options: RouterOptions,
}

impl CallRouter {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self::with_options(dispatcher, RouterOptions::default())
    }

    pub fn with_options(dispatcher: Arc<Dispatcher>, options: RouterOptions) -> Self {
        Self {
            dispatcher,
            options,
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn options(&self) -> &RouterOptions {
        &self.options
    }

    /// Handle a raw call payload addressed to `service`/`method`.
    pub fn handle(&self, payload: &[u8], service: &str, method: &str) -> Reply {
        match decode_request(payload) {
            Ok(request) => self.handle_request(&request, service, method),
            Err(err) => Self::reject(err),
        }
    }

    /// Handle an already decoded request.
    ///
    /// Methods registered as async handlers fail with a server error here.
    pub fn handle_request(&self, request: &Request, service: &str, method: &str) -> Reply {
        let outcome = match self.dispatcher.lookup(service, method) {
            Some(Method::Blocking(handler)) => {
                let outcome = catch_unwind(AssertUnwindSafe(|| handler.invoke(&request.params)))
                    .unwrap_or_else(|panic| {
                        Outcome::Fault(Fault::new("panic", panic_message(&*panic)))
                    });
                self.settle(outcome, request, service, method)
            }
            #[cfg(feature = "async")]
            Some(Method::Async(_)) => self.settle(
                Outcome::Fault(Fault::new(
                    "AsyncHandler",
                    "method is async and needs CallRouter::handle_async",
                )),
                request,
                service,
                method,
            ),
            None => Self::not_found(service, method),
        };
        Self::reply_to(request, outcome)
    }

    /// Async variant of [`handle`](Self::handle).
    ///
    /// Must be polled inside a tokio runtime. Blocking handlers run inline.
    #[cfg(feature = "async")]
    pub async fn handle_async(&self, payload: &[u8], service: &str, method: &str) -> Reply {
        match decode_request(payload) {
            Ok(request) => self.handle_request_async(&request, service, method).await,
            Err(err) => Self::reject(err),
        }
    }

    /// Async variant of [`handle_request`](Self::handle_request).
    #[cfg(feature = "async")]
    pub async fn handle_request_async(
        &self,
        request: &Request,
        service: &str,
        method: &str,
    ) -> Reply {
        let handler = match self.dispatcher.lookup(service, method) {
            Some(Method::Async(handler)) => handler,
            Some(Method::Blocking(_)) => return self.handle_request(request, service, method),
            None => return Self::reply_to(request, Self::not_found(service, method)),
        };

        let outcome = match tokio::spawn(handler.invoke(request.params.clone())).await {
            Ok(outcome) => outcome,
            Err(err) if err.is_panic() => {
                Outcome::Fault(Fault::new("panic", panic_message(&*err.into_panic())))
            }
            Err(err) => Outcome::Fault(Fault::new("cancelled", err.to_string())),
        };
        Self::reply_to(request, self.settle(outcome, request, service, method))
    }

    fn not_found(service: &str, method: &str) -> Result<Value, ErrorObject> {
        log::debug!("[router] method not found: {}/{}", service, method);
        Err(ErrorObject::standard(ErrorCode::MethodNotFound))
    }

    fn reply_to(request: &Request, outcome: Result<Value, ErrorObject>) -> Reply {
        match &request.id {
            Some(id) => Reply::Send(Response {
                id: Some(id.clone()),
                outcome,
            }),
            None => Reply::NoReply,
        }
    }

    fn settle(
        &self,
        outcome: Outcome,
        request: &Request,
        service: &str,
        method: &str,
    ) -> Result<Value, ErrorObject> {
        match outcome {
            Outcome::Success(value) => Ok(value),
            Outcome::ApplicationError(error) => Err(error),
            Outcome::InvalidParams(fault) => Err(ErrorObject::standard(ErrorCode::InvalidParams)
                .with_data(fault.diagnostic(&request.params))),
            Outcome::Fault(fault) => {
                let data = fault.diagnostic(&request.params);
                log::error!(
                    "[router] API exception in {}/{}: {}",
                    service,
                    method,
                    data
                );
                let error = ErrorObject::standard(ErrorCode::ServerError);
                if self.options.expose_fault_details {
                    Err(error.with_data(data))
                } else {
                    Err(error)
                }
            }
        }
    }

    fn reject(err: DecodeError) -> Reply {
        log::debug!("[router] rejecting call: {}", err);
        let code = err.error_code();
        match err {
            DecodeError::InvalidRequest {
                notification: true,
                ..
            } => Reply::NoReply,
            DecodeError::InvalidRequest { id, .. } => {
                Reply::Send(Response::error(id, ErrorObject::standard(code)))
            }
            DecodeError::Parse(_) | DecodeError::InvalidResponse(_) => {
                Reply::Send(Response::error(None, ErrorObject::standard(code)))
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::HandlerError;
    use crate::protocol::{
        encode_request, Id, Params, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND,
        PARSE_ERROR, SERVER_ERROR,
    };
    use serde_json::json;

    fn router() -> CallRouter {
        let dispatcher = Dispatcher::new();
        dispatcher.register_typed("math", "add", |(a, b): (i64, i64)| Ok(a + b));
        dispatcher.register_typed("math", "fail", |_: Vec<Value>| -> Result<i64, HandlerError> {
            Err(HandlerError::Application(
                ErrorObject::new(42, "custom").with_data(json!({"why": "because"})),
            ))
        });
        dispatcher.register_typed("math", "crash", |_: Vec<Value>| -> Result<i64, HandlerError> {
            Err(HandlerError::fault("ZeroDivisionError", "division by zero"))
        });
        dispatcher.register("math", "panic", |_: &Params| -> Outcome {
            panic!("handler exploded")
        });
        CallRouter::new(Arc::new(dispatcher))
    }

    fn call(id: Option<i64>, args: Vec<Value>) -> Vec<u8> {
        encode_request(&Request {
            id: id.map(Id::Number),
            params: Params::positional(args),
        })
    }

    fn expect_error(reply: Reply) -> (Option<Id>, ErrorObject) {
        match reply {
            Reply::Send(Response {
                id,
                outcome: Err(error),
            }) => (id, error),
            other => panic!("expected error reply, got {:?}", other),
        }
    }

    #[test]
    fn success_reply_echoes_id() {
        let reply = router().handle(&call(Some(1), vec![json!(2), json!(3)]), "math", "add");
        assert_eq!(
            reply,
            Reply::Send(Response::success(Some(Id::Number(1)), json!(5)))
        );
    }

    #[test]
    fn string_id_is_echoed() {
        let reply = router().handle(br#"{"id": "abc", "params": [2, 3]}"#, "math", "add");
        assert_eq!(
            reply,
            Reply::Send(Response::success(Some(Id::String("abc".into())), json!(5)))
        );
    }

    #[test]
    fn max_unsigned_id_is_echoed() {
        let reply = router().handle(
            br#"{"id": 18446744073709551615, "params": [2, 3]}"#,
            "math",
            "add",
        );
        assert_eq!(
            reply,
            Reply::Send(Response::success(Some(Id::Unsigned(u64::MAX)), json!(5)))
        );
    }

    #[test]
    fn zero_argument_method_accepts_empty_params() {
        let dispatcher = Dispatcher::new();
        dispatcher.register_typed("sys", "ping", |(): ()| Ok("pong"));
        let router = CallRouter::new(Arc::new(dispatcher));

        for payload in [&br#"{"id": 1, "params": []}"#[..], br#"{"id": 1}"#] {
            let reply = router.handle(payload, "sys", "ping");
            assert_eq!(reply.response().and_then(Response::result), Some(&json!("pong")));
        }
    }

    #[test]
    fn unknown_method() {
        let (id, error) = expect_error(router().handle(&call(Some(1), vec![]), "math", "sub"));
        assert_eq!(id, Some(Id::Number(1)));
        assert_eq!(error.code, METHOD_NOT_FOUND);
    }

    #[test]
    fn application_error_forwarded_verbatim() {
        let (_, error) = expect_error(router().handle(&call(Some(2), vec![]), "math", "fail"));
        assert_eq!(
            error,
            ErrorObject::new(42, "custom").with_data(json!({"why": "because"}))
        );
    }

    #[test]
    fn invalid_params_carry_diagnostics() {
        let (_, error) =
            expect_error(router().handle(&call(Some(3), vec![json!("x")]), "math", "add"));
        assert_eq!(error.code, INVALID_PARAMS);
        let data = error.data.expect("diagnostic data");
        assert_eq!(data["type"], json!("ParamsError"));
        assert_eq!(data["args"], json!(["x"]));
        assert!(data["message"].is_string());
    }

    #[test]
    fn fault_becomes_server_error() {
        let (id, error) = expect_error(router().handle(&call(Some(4), vec![]), "math", "crash"));
        assert_eq!(id, Some(Id::Number(4)));
        assert_eq!(error.code, SERVER_ERROR);
        assert_eq!(
            error.data,
            Some(json!({"type": "ZeroDivisionError", "args": [], "message": "division by zero"}))
        );
    }

    #[test]
    fn panic_is_contained() {
        let router = router();
        let (_, error) = expect_error(router.handle(&call(Some(5), vec![]), "math", "panic"));
        assert_eq!(error.code, SERVER_ERROR);
        let data = error.data.expect("diagnostic data");
        assert_eq!(data["type"], json!("panic"));
        assert_eq!(data["message"], json!("handler exploded"));

        // still serving
        let reply = router.handle(&call(Some(6), vec![json!(1), json!(1)]), "math", "add");
        assert_eq!(reply.response().and_then(Response::result), Some(&json!(2)));
    }

    #[test]
    fn redacted_fault_details() {
        let dispatcher = router().dispatcher().clone();
        let router = CallRouter::with_options(
            dispatcher,
            RouterOptions {
                expose_fault_details: false,
            },
        );
        let (_, error) = expect_error(router.handle(&call(Some(7), vec![]), "math", "crash"));
        assert_eq!(error.code, SERVER_ERROR);
        assert!(error.data.is_none());
    }

    #[test]
    fn notifications_never_reply() {
        let router = router();
        for (method, args) in [
            ("add", vec![json!(2), json!(3)]),
            ("fail", vec![]),
            ("crash", vec![]),
            ("panic", vec![]),
            ("add", vec![json!("bad")]),
            ("missing", vec![]),
        ] {
            assert_eq!(
                router.handle(&call(None, args), "math", method),
                Reply::NoReply,
                "method {}",
                method
            );
        }
        assert_eq!(
            router.handle(br#"{"params": 3}"#, "math", "add"),
            Reply::NoReply
        );
    }

    #[test]
    fn parse_error_replies_with_null_id() {
        let (id, error) = expect_error(router().handle(b"{garbage", "math", "add"));
        assert_eq!(id, None);
        assert_eq!(error.code, PARSE_ERROR);
    }

    #[test]
    fn invalid_request_echoes_recoverable_id() {
        let (id, error) =
            expect_error(router().handle(br#"{"id": 8, "params": true}"#, "math", "add"));
        assert_eq!(id, Some(Id::Number(8)));
        assert_eq!(error.code, INVALID_REQUEST);

        let (id, error) = expect_error(router().handle(br#"{"id": {}, "params": []}"#, "math", "add"));
        assert_eq!(id, None);
        assert_eq!(error.code, INVALID_REQUEST);

        let (id, _) = expect_error(router().handle(b"[]", "math", "add"));
        assert_eq!(id, None);
    }

    #[cfg(feature = "async")]
    mod async_handlers {
        use super::*;

        fn runtime() -> tokio::runtime::Runtime {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("runtime")
        }

        fn router() -> CallRouter {
            let dispatcher = Dispatcher::new();
            dispatcher.register_async_typed("math", "add", |(a, b): (i64, i64)| async move {
                tokio::task::yield_now().await;
                Ok(a + b)
            });
            dispatcher.register_async_typed("math", "fail", |_: Vec<Value>| async move {
                Err::<i64, _>(HandlerError::application(42, "custom"))
            });
            dispatcher.register_async("math", "panic", |params: Params| async move {
                if params.is_empty() {
                    panic!("async handler exploded");
                }
                Outcome::Success(Value::Null)
            });
            dispatcher.register_typed("math", "sub", |(a, b): (i64, i64)| Ok(a - b));
            CallRouter::new(Arc::new(dispatcher))
        }

        #[test]
        fn async_success_and_errors() {
            let router = router();
            runtime().block_on(async {
                let reply = router
                    .handle_async(&call(Some(1), vec![json!(2), json!(3)]), "math", "add")
                    .await;
                assert_eq!(
                    reply,
                    Reply::Send(Response::success(Some(Id::Number(1)), json!(5)))
                );

                let (_, error) =
                    expect_error(router.handle_async(&call(Some(2), vec![]), "math", "fail").await);
                assert_eq!(error, ErrorObject::new(42, "custom"));

                let (_, error) = expect_error(
                    router.handle_async(&call(Some(3), vec![json!("x")]), "math", "add").await,
                );
                assert_eq!(error.code, INVALID_PARAMS);

                let (_, error) =
                    expect_error(router.handle_async(&call(Some(4), vec![]), "math", "mul").await);
                assert_eq!(error.code, METHOD_NOT_FOUND);
            });
        }

        #[test]
        fn async_router_runs_blocking_handlers() {
            let router = router();
            let reply = runtime().block_on(router.handle_async(
                &call(Some(5), vec![json!(5), json!(3)]),
                "math",
                "sub",
            ));
            assert_eq!(reply.response().and_then(Response::result), Some(&json!(2)));
        }

        #[test]
        fn async_panic_is_contained() {
            let router = router();
            runtime().block_on(async {
                let (id, error) =
                    expect_error(router.handle_async(&call(Some(6), vec![]), "math", "panic").await);
                assert_eq!(id, Some(Id::Number(6)));
                assert_eq!(error.code, SERVER_ERROR);
                let data = error.data.expect("diagnostic data");
                assert_eq!(data["type"], json!("panic"));
                assert_eq!(data["message"], json!("async handler exploded"));

                let reply = router
                    .handle_async(&call(Some(7), vec![json!(1), json!(1)]), "math", "add")
                    .await;
                assert_eq!(reply.response().and_then(Response::result), Some(&json!(2)));
            });
        }

        #[test]
        fn async_notifications_never_reply() {
            let router = router();
            runtime().block_on(async {
                for method in ["add", "fail", "panic", "missing"] {
                    let reply = router
                        .handle_async(&call(None, vec![json!(1), json!(2)]), "math", method)
                        .await;
                    assert_eq!(reply, Reply::NoReply, "method {}", method);
                }
            });
        }

        #[test]
        fn blocking_router_refuses_async_method() {
            let (_, error) =
                expect_error(router().handle(&call(Some(8), vec![json!(1), json!(2)]), "math", "add"));
            assert_eq!(error.code, SERVER_ERROR);
            assert_eq!(error.data.expect("diagnostic")["type"], json!("AsyncHandler"));
        }
    }
}
