// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire protocol: envelope types and their JSON codec.
//!
//! # Envelopes
//!
//! ```text
//! request       {"id": 1, "params": [2, 3]}
//! notification  {"params": {"foo": 1, "bar": 2}}
//! success       {"id": 1, "result": 5}
//! error         {"id": 1, "error": {"code": -32601, "message": "Method not found"}}
//! ```

mod codec;
mod types;

pub use codec::{decode_request, decode_response, encode_request, encode_response, DecodeError};
pub use types::{
    ErrorCode, ErrorObject, Id, Params, Request, Response, INTERNAL_ERROR, INVALID_PARAMS,
    INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR, SERVER_ERROR,
};
