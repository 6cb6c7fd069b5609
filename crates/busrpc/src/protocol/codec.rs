// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! JSON wire codec for request and response envelopes.
//!
//! Encoding never fails. Decoding returns a [`DecodeError`] that the router
//! turns into an error reply; nothing here panics on bad input.

use crate::protocol::types::{ErrorCode, ErrorObject, Id, Params, Request, Response};
use serde_json::{Map, Value};
use thiserror::Error;

/// Why an inbound payload could not be decoded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    /// Not UTF-8 JSON at all
    #[error("parse error: {0}")]
    Parse(String),

    /// Valid JSON but not a well-formed request.
    ///
    /// `id` holds the request id when it could be recovered. `notification`
    /// is true when the request carried no id member at all.
    #[error("invalid request: {reason}")]
    InvalidRequest {
        id: Option<Id>,
        notification: bool,
        reason: String,
    },

    /// Valid JSON but not a well-formed response
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl DecodeError {
    /// Standard error kind reported on the wire.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            DecodeError::Parse(_) => ErrorCode::ParseError,
            DecodeError::InvalidRequest { .. } | DecodeError::InvalidResponse(_) => {
                ErrorCode::InvalidRequest
            }
        }
    }
}

/// Encode a request. The `id` member is omitted for notifications.
pub fn encode_request(request: &Request) -> Vec<u8> {
    let mut obj = Map::new();
    if let Some(id) = &request.id {
        obj.insert("id".into(), id.to_value());
    }
    obj.insert("params".into(), request.params.to_value());
    Value::Object(obj).to_string().into_bytes()
}

/// Decode a request.
pub fn decode_request(bytes: &[u8]) -> Result<Request, DecodeError> {
    let mut obj = match parse_json(bytes)? {
        Value::Object(obj) => obj,
        other => {
            return Err(DecodeError::InvalidRequest {
                id: None,
                notification: false,
                reason: format!("expected object, got {}", json_kind(&other)),
            })
        }
    };

    let (id, notification) = match obj.remove("id") {
        None | Some(Value::Null) => (None, true),
        Some(raw) => match Id::from_value(&raw) {
            Some(id) => (Some(id), false),
            None => {
                return Err(DecodeError::InvalidRequest {
                    id: None,
                    notification: false,
                    reason: format!("unsupported id {}", raw),
                })
            }
        },
    };

    let params = match obj.remove("params") {
        None => Params::none(),
        Some(Value::Array(args)) => Params::Positional(args),
        Some(Value::Object(kwargs)) => Params::Named(kwargs),
        Some(other) => {
            return Err(DecodeError::InvalidRequest {
                id,
                notification,
                reason: format!("params must be array or object, got {}", json_kind(&other)),
            })
        }
    };

    Ok(Request { id, params })
}

/// Encode a response. `id` is written as `null` when absent.
pub fn encode_response(response: &Response) -> Vec<u8> {
    let mut obj = Map::new();
    obj.insert(
        "id".into(),
        response.id.as_ref().map_or(Value::Null, Id::to_value),
    );
    match &response.outcome {
        Ok(result) => {
            obj.insert("result".into(), result.clone());
        }
        Err(error) => {
            obj.insert("error".into(), error_to_value(error));
        }
    }
    Value::Object(obj).to_string().into_bytes()
}

/// Decode a response.
///
/// A `null` error member counts as absent and a missing result decodes as
/// `null`, so peers that emit both members are accepted.
pub fn decode_response(bytes: &[u8]) -> Result<Response, DecodeError> {
    let mut obj = match parse_json(bytes)? {
        Value::Object(obj) => obj,
        other => {
            return Err(DecodeError::InvalidResponse(format!(
                "expected object, got {}",
                json_kind(&other)
            )))
        }
    };

    let id = match obj.remove("id") {
        None | Some(Value::Null) => None,
        Some(raw) => Some(
            Id::from_value(&raw)
                .ok_or_else(|| DecodeError::InvalidResponse(format!("unsupported id {}", raw)))?,
        ),
    };

    match obj.remove("error") {
        None | Some(Value::Null) => Ok(Response::success(
            id,
            obj.remove("result").unwrap_or(Value::Null),
        )),
        Some(raw) => {
            let error: ErrorObject = serde_json::from_value(raw)
                .map_err(|e| DecodeError::InvalidResponse(format!("malformed error: {}", e)))?;
            Ok(Response::error(id, error))
        }
    }
}

fn parse_json(bytes: &[u8]) -> Result<Value, DecodeError> {
    let text = std::str::from_utf8(bytes).map_err(|e| DecodeError::Parse(e.to_string()))?;
    serde_json::from_str(text).map_err(|e| DecodeError::Parse(e.to_string()))
}

fn error_to_value(error: &ErrorObject) -> Value {
    let mut obj = Map::new();
    obj.insert("code".into(), Value::from(error.code));
    obj.insert("message".into(), Value::String(error.message.clone()));
    if let Some(data) = &error.data {
        obj.insert("data".into(), data.clone());
    }
    Value::Object(obj)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn value_of(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).expect("valid json")
    }

    #[test]
    fn request_roundtrip_positional() {
        let request = Request::call(Id::Number(1), Params::positional(vec![json!(2), json!(3)]));
        let decoded = decode_request(&encode_request(&request)).expect("decode");
        assert_eq!(decoded, request);
    }

    #[test]
    fn request_roundtrip_named_and_string_id() {
        let mut kwargs = Map::new();
        kwargs.insert("foo".into(), json!(1));
        kwargs.insert("bar".into(), json!({"nested": [true, null]}));
        let request = Request::call(Id::from("abc"), Params::named(kwargs));
        let decoded = decode_request(&encode_request(&request)).expect("decode");
        assert_eq!(decoded, request);
    }

    #[test]
    fn request_roundtrip_empty_params() {
        for params in [Params::none(), Params::named(Map::new())] {
            let request = Request::notification(params);
            let decoded = decode_request(&encode_request(&request)).expect("decode");
            assert_eq!(decoded, request);
        }
    }

    #[test]
    fn notification_omits_id() {
        let bytes = encode_request(&Request::notification(Params::none()));
        assert!(value_of(&bytes).get("id").is_none());
    }

    #[test]
    fn large_ids_are_exact() {
        for id in [i64::MAX, i64::MIN, (1 << 53) + 1] {
            let request = Request::call(Id::Number(id), Params::none());
            let decoded = decode_request(&encode_request(&request)).expect("decode");
            assert_eq!(decoded.id, Some(Id::Number(id)));
        }

        let request = decode_request(br#"{"id": 18446744073709551615, "params": []}"#)
            .expect("u64 id");
        assert_eq!(request.id, Some(Id::Unsigned(u64::MAX)));
        let reply = encode_response(&Response::success(request.id, json!(1)));
        assert_eq!(value_of(&reply), json!({"id": u64::MAX, "result": 1}));
    }

    #[test]
    fn decode_request_defaults() {
        let request = decode_request(br#"{"id": 3}"#).expect("decode");
        assert_eq!(request.id, Some(Id::Number(3)));
        assert_eq!(request.params, Params::none());

        let request = decode_request(br#"{"id": null, "params": [1]}"#).expect("decode");
        assert!(request.is_notification());
    }

    #[test]
    fn decode_request_parse_errors() {
        assert!(matches!(decode_request(b"{not json"), Err(DecodeError::Parse(_))));
        assert!(matches!(decode_request(&[0xff, 0xfe]), Err(DecodeError::Parse(_))));
        assert!(matches!(decode_request(b""), Err(DecodeError::Parse(_))));
    }

    #[test]
    fn decode_request_invalid_shapes() {
        match decode_request(br#"{"id": 9, "params": 5}"#) {
            Err(DecodeError::InvalidRequest {
                id, notification, ..
            }) => {
                assert_eq!(id, Some(Id::Number(9)));
                assert!(!notification);
            }
            other => panic!("unexpected {:?}", other),
        }

        match decode_request(br#"{"params": "x"}"#) {
            Err(DecodeError::InvalidRequest {
                id, notification, ..
            }) => {
                assert_eq!(id, None);
                assert!(notification);
            }
            other => panic!("unexpected {:?}", other),
        }

        match decode_request(br#"{"id": 1.5, "params": []}"#) {
            Err(DecodeError::InvalidRequest {
                id, notification, ..
            }) => {
                assert_eq!(id, None);
                assert!(!notification);
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(matches!(
            decode_request(b"[1, 2]"),
            Err(DecodeError::InvalidRequest { id: None, .. })
        ));
    }

    #[test]
    fn response_wire_shape() {
        let ok = encode_response(&Response::success(Some(Id::Number(1)), json!(5)));
        assert_eq!(value_of(&ok), json!({"id": 1, "result": 5}));

        let err = encode_response(&Response::error(
            None,
            ErrorObject::standard(ErrorCode::ParseError),
        ));
        assert_eq!(
            value_of(&err),
            json!({"id": null, "error": {"code": -32700, "message": "Parse error"}})
        );
    }

    #[test]
    fn response_null_result_is_kept() {
        let response = Response::success(Some(Id::Number(4)), Value::Null);
        let decoded = decode_response(&encode_response(&response)).expect("decode");
        assert_eq!(decoded, response);
    }

    #[test]
    fn decode_response_tolerates_both_members() {
        let decoded =
            decode_response(br#"{"id": 2, "result": 7, "error": null}"#).expect("decode");
        assert_eq!(decoded.result(), Some(&json!(7)));

        let decoded = decode_response(
            br#"{"id": 2, "result": null, "error": {"code": 5, "message": "no", "data": [1]}}"#,
        )
        .expect("decode");
        let error = decoded.error_object().expect("error");
        assert_eq!(error.code, 5);
        assert_eq!(error.data, Some(json!([1])));
    }

    #[test]
    fn decode_response_rejects_garbage() {
        assert!(matches!(decode_response(b"nope"), Err(DecodeError::Parse(_))));
        assert!(matches!(
            decode_response(b"42"),
            Err(DecodeError::InvalidResponse(_))
        ));
        assert!(matches!(
            decode_response(br#"{"id": 1, "error": {"code": "x"}}"#),
            Err(DecodeError::InvalidResponse(_))
        ));
    }
}
