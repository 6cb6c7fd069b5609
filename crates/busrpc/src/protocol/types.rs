// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Core envelope types for the bus RPC protocol.
//!
//! A call travels as a [`Request`], the answer as a [`Response`]. Requests
//! without an [`Id`] are notifications and never produce a response.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// JSON-RPC "Parse error".
pub const PARSE_ERROR: i64 = -32700;
/// JSON-RPC "Invalid Request".
pub const INVALID_REQUEST: i64 = -32600;
/// JSON-RPC "Method not found".
pub const METHOD_NOT_FOUND: i64 = -32601;
/// JSON-RPC "Invalid params".
pub const INVALID_PARAMS: i64 = -32602;
/// JSON-RPC "Internal error".
pub const INTERNAL_ERROR: i64 = -32603;
/// Implementation-defined "Server error", reported for handler faults.
pub const SERVER_ERROR: i64 = -32000;

/// Correlation identifier carried by a request and echoed by its response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Id {
    /// Integer id (what [`RpcClient`](crate::RpcClient) generates)
    Number(i64),
    /// Integer id above `i64::MAX`
    Unsigned(u64),
    /// String id (accepted from foreign callers)
    String(String),
}

impl Id {
    /// Convert a JSON value to an id.
    ///
    /// Integers and strings are ids; floats, booleans, arrays and objects
    /// are not. Integers that fit `i64` always become [`Id::Number`].
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .map(Id::Number)
                .or_else(|| n.as_u64().map(Id::Unsigned)),
            Value::String(s) => Some(Id::String(s.clone())),
            _ => None,
        }
    }

    /// JSON form of the id.
    pub fn to_value(&self) -> Value {
        match self {
            Id::Number(n) => Value::from(*n),
            Id::Unsigned(n) => Value::from(*n),
            Id::String(s) => Value::String(s.clone()),
        }
    }

    /// Numeric id, if this is one.
    pub fn as_number(&self) -> Option<i64> {
        match self {
            Id::Number(n) => Some(*n),
            Id::Unsigned(_) | Id::String(_) => None,
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::Number(n) => write!(f, "{}", n),
            Id::Unsigned(n) => write!(f, "{}", n),
            Id::String(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<i64> for Id {
    fn from(n: i64) -> Self {
        Id::Number(n)
    }
}

impl From<u64> for Id {
    fn from(n: u64) -> Self {
        i64::try_from(n).map_or(Id::Unsigned(n), Id::Number)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::String(s.to_string())
    }
}

/// Call arguments: either positional or named, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    /// Ordered arguments (`"params": [..]`)
    Positional(Vec<Value>),
    /// Named arguments (`"params": {..}`)
    Named(Map<String, Value>),
}

impl Params {
    /// Positional arguments.
    pub fn positional(args: Vec<Value>) -> Self {
        Params::Positional(args)
    }

    /// Named arguments.
    pub fn named(kwargs: Map<String, Value>) -> Self {
        Params::Named(kwargs)
    }

    /// No arguments at all.
    pub fn none() -> Self {
        Params::Positional(Vec::new())
    }

    /// Positional view; empty for named params.
    pub fn args(&self) -> &[Value] {
        match self {
            Params::Positional(args) => args,
            Params::Named(_) => &[],
        }
    }

    /// Named view; `None` for positional params.
    pub fn kwargs(&self) -> Option<&Map<String, Value>> {
        match self {
            Params::Positional(_) => None,
            Params::Named(kwargs) => Some(kwargs),
        }
    }

    /// Positional argument at `index`.
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args().get(index)
    }

    /// Named argument `name`.
    pub fn kwarg(&self, name: &str) -> Option<&Value> {
        self.kwargs().and_then(|kwargs| kwargs.get(name))
    }

    /// True if there are no arguments of either kind.
    pub fn is_empty(&self) -> bool {
        match self {
            Params::Positional(args) => args.is_empty(),
            Params::Named(kwargs) => kwargs.is_empty(),
        }
    }

    /// JSON form (`[..]` or `{..}`).
    pub fn to_value(&self) -> Value {
        match self {
            Params::Positional(args) => Value::Array(args.clone()),
            Params::Named(kwargs) => Value::Object(kwargs.clone()),
        }
    }

    /// Deserialize the arguments into a Rust type.
    ///
    /// Positional params deserialize into tuples or sequences, named params
    /// into structs or maps.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.to_value())
    }
}

impl Default for Params {
    fn default() -> Self {
        Self::none()
    }
}

impl From<Vec<Value>> for Params {
    fn from(args: Vec<Value>) -> Self {
        Params::Positional(args)
    }
}

impl From<Map<String, Value>> for Params {
    fn from(kwargs: Map<String, Value>) -> Self {
        Params::Named(kwargs)
    }
}

/// Call envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Correlation id; `None` marks a notification
    pub id: Option<Id>,
    /// Call arguments
    pub params: Params,
}

impl Request {
    /// A call that expects a reply.
    pub fn call(id: Id, params: Params) -> Self {
        Self {
            id: Some(id),
            params,
        }
    }

    /// A fire-and-forget call.
    pub fn notification(params: Params) -> Self {
        Self { id: None, params }
    }

    /// True if no reply may be produced for this request.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Standard error kinds plus the open application range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    ServerError,
    /// Any code not reserved above
    Application(i64),
}

impl ErrorCode {
    /// Wire value.
    pub fn code(self) -> i64 {
        match self {
            ErrorCode::ParseError => PARSE_ERROR,
            ErrorCode::InvalidRequest => INVALID_REQUEST,
            ErrorCode::MethodNotFound => METHOD_NOT_FOUND,
            ErrorCode::InvalidParams => INVALID_PARAMS,
            ErrorCode::InternalError => INTERNAL_ERROR,
            ErrorCode::ServerError => SERVER_ERROR,
            ErrorCode::Application(code) => code,
        }
    }

    /// Classify a wire value.
    pub fn from_code(code: i64) -> Self {
        match code {
            PARSE_ERROR => ErrorCode::ParseError,
            INVALID_REQUEST => ErrorCode::InvalidRequest,
            METHOD_NOT_FOUND => ErrorCode::MethodNotFound,
            INVALID_PARAMS => ErrorCode::InvalidParams,
            INTERNAL_ERROR => ErrorCode::InternalError,
            SERVER_ERROR => ErrorCode::ServerError,
            other => ErrorCode::Application(other),
        }
    }

    /// Default human-readable message.
    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::ParseError => "Parse error",
            ErrorCode::InvalidRequest => "Invalid Request",
            ErrorCode::MethodNotFound => "Method not found",
            ErrorCode::InvalidParams => "Invalid params",
            ErrorCode::InternalError => "Internal error",
            ErrorCode::ServerError => "Server error",
            ErrorCode::Application(_) => "Application error",
        }
    }
}

/// Error member of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    /// Create an error with an arbitrary code.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create one of the standard errors with its default message.
    pub fn standard(code: ErrorCode) -> Self {
        Self::new(code.code(), code.message())
    }

    /// Attach diagnostic data.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Classified code.
    pub fn kind(&self) -> ErrorCode {
        ErrorCode::from_code(self.code)
    }
}

impl From<ErrorCode> for ErrorObject {
    fn from(code: ErrorCode) -> Self {
        Self::standard(code)
    }
}

impl fmt::Display for ErrorObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: ", self.message, self.code)?;
        match &self.data {
            Some(data) => write!(f, "{}", data),
            None => write!(f, "null"),
        }
    }
}

/// Reply envelope. Exactly one of result or error, by construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Echo of the request id; `None` only when it could not be recovered
    pub id: Option<Id>,
    pub outcome: Result<Value, ErrorObject>,
}

impl Response {
    /// Successful reply.
    pub fn success(id: Option<Id>, result: Value) -> Self {
        Self {
            id,
            outcome: Ok(result),
        }
    }

    /// Error reply.
    pub fn error(id: Option<Id>, error: ErrorObject) -> Self {
        Self {
            id,
            outcome: Err(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.outcome.is_err()
    }

    pub fn result(&self) -> Option<&Value> {
        self.outcome.as_ref().ok()
    }

    pub fn error_object(&self) -> Option<&ErrorObject> {
        self.outcome.as_ref().err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn id_from_value() {
        assert_eq!(Id::from_value(&json!(7)), Some(Id::Number(7)));
        assert_eq!(Id::from_value(&json!("a")), Some(Id::String("a".into())));
        assert_eq!(Id::from_value(&json!(1.5)), None);
        assert_eq!(Id::from_value(&json!(null)), None);
        assert_eq!(Id::from_value(&json!([1])), None);
    }

    #[test]
    fn id_above_i64_range() {
        let id = Id::from_value(&json!(u64::MAX)).expect("u64 id");
        assert_eq!(id, Id::Unsigned(u64::MAX));
        assert_eq!(id.to_value(), json!(u64::MAX));
        assert_eq!(id.to_string(), "18446744073709551615");
        assert!(id.as_number().is_none());

        assert_eq!(Id::from(7u64), Id::Number(7));
        assert_eq!(Id::from_value(&json!(-3)), Some(Id::Number(-3)));
    }

    #[test]
    fn error_code_classification() {
        for code in [
            ErrorCode::ParseError,
            ErrorCode::InvalidRequest,
            ErrorCode::MethodNotFound,
            ErrorCode::InvalidParams,
            ErrorCode::InternalError,
            ErrorCode::ServerError,
        ] {
            assert_eq!(ErrorCode::from_code(code.code()), code);
        }
        assert_eq!(ErrorCode::from_code(42), ErrorCode::Application(42));
    }

    #[test]
    fn params_views() {
        let positional = Params::positional(vec![json!(1), json!(2)]);
        assert_eq!(positional.args().len(), 2);
        assert!(positional.kwargs().is_none());
        assert_eq!(positional.arg(1), Some(&json!(2)));

        let mut kwargs = Map::new();
        kwargs.insert("foo".into(), json!("x"));
        let named = Params::named(kwargs);
        assert!(named.args().is_empty());
        assert_eq!(named.kwarg("foo"), Some(&json!("x")));
        assert!(Params::none().is_empty());
    }

    #[test]
    fn params_parse_tuple() {
        let params = Params::positional(vec![json!(2), json!(3)]);
        let (a, b): (i64, i64) = params.parse().expect("tuple");
        assert_eq!(a + b, 5);

        let bad = Params::positional(vec![json!("two")]);
        assert!(bad.parse::<(i64, i64)>().is_err());
    }

    #[test]
    fn error_object_display() {
        let err = ErrorObject::new(12, "boom").with_data(json!({"k": 1}));
        assert_eq!(err.to_string(), "boom [12]: {\"k\":1}");
        let err = ErrorObject::standard(ErrorCode::MethodNotFound);
        assert_eq!(err.to_string(), "Method not found [-32601]: null");
    }
}
