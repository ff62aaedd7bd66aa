//! Request extraction shared by every `/api` handler.
//!
//! The shared key may arrive as JSON body field `apiKey` (alias `key`) or as
//! a query parameter of the same names. Body fields win over the query.
//! Only `application/json` bodies are parsed; any other body reads as `{}`.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequest, Query, Request};
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use serde_json::{Map, Value};
use tasbridge_core::ValidationError;

use crate::error::ApiError;

/// Control bodies are a handful of integers.
pub const MAX_BODY_BYTES: usize = 16 * 1024;

const KEY_FIELDS: [&str; 2] = ["apiKey", "key"];

/// Parsed `/api` request: presented key, JSON body and caller address.
#[derive(Debug)]
pub struct ApiRequest {
    pub key: Option<String>,
    pub body: Value,
    /// Remote IP, or `"unknown"` when the listener does not record it.
    pub origin: String,
}

impl<S> FromRequest<S> for ApiRequest
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let (parts, body) = req.into_parts();

        let origin = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".into());

        let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .map(|Query(q)| q)
            .unwrap_or_default();

        let body = if is_json(&parts.headers) {
            let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
                .await
                .map_err(|e| ApiError::BadRequest(format!("failed to read request body: {e}")))?;
            if bytes.iter().all(u8::is_ascii_whitespace) {
                Value::Object(Map::new())
            } else {
                serde_json::from_slice(&bytes)
                    .map_err(|e| ApiError::BadRequest(format!("malformed JSON body: {e}")))?
            }
        } else {
            Value::Object(Map::new())
        };

        let key = presented_key(&body, &query);
        Ok(Self { key, body, origin })
    }
}

/// `application/json`, with or without parameters such as `charset`.
fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

fn presented_key(body: &Value, query: &HashMap<String, String>) -> Option<String> {
    let from_body = KEY_FIELDS
        .iter()
        .find_map(|field| body.get(field).and_then(Value::as_str));
    let from_query = || KEY_FIELDS.iter().find_map(|field| query.get(*field).map(String::as_str));
    from_body.or_else(from_query).map(str::to_string)
}

/// Read `field` as a JSON integer. Floats, strings and absent fields are
/// rejected rather than coerced.
pub fn integer_field(body: &Value, field: &'static str) -> Result<i64, ValidationError> {
    body.get(field)
        .and_then(Value::as_i64)
        .ok_or(ValidationError::NotAnInteger { field })
}
