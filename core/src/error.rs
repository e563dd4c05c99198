//! Error types for the marketplace API client.
//!
//! # Design
//! Every non-2xx response except 401 lands in a single `Status` variant
//! carrying the extracted message, the status code and the body, so callers
//! branch on data rather than on a variant per status. 401 is not an error
//! at all: `ApiClient::parse` turns it into `Reply::AuthRequired`.

use serde_json::Value;
use thiserror::Error;

use crate::http::Body;

/// Errors returned by `ApiClient` and `Session` calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (DNS, connect, abort).
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-2xx status other than 401.
    #[error("HTTP {status}: {message}")]
    Status {
        status: u16,
        message: String,
        error_type: Option<String>,
        body: Body,
    },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Human-readable message. For `Status` errors this is the server's
    /// message (or the configured fallback).
    pub fn message(&self) -> String {
        match self {
            ApiError::Status { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Pull a message out of an error body.
///
/// Accepts a top-level `message`, the server's `{"error": {"message"}}`
/// envelope, or a bare `{"error": "..."}` string. Empty strings count as
/// no message.
pub(crate) fn extract_message(body: &Value) -> Option<String> {
    let top_level = body.get("message").and_then(Value::as_str);
    let nested = match body.get("error") {
        Some(Value::String(message)) => Some(message.as_str()),
        Some(error) => error.get("message").and_then(Value::as_str),
        None => None,
    };
    top_level
        .filter(|m| !m.is_empty())
        .or(nested.filter(|m| !m.is_empty()))
        .map(str::to_string)
}

pub(crate) fn extract_error_type(body: &Value) -> Option<String> {
    body.get("error")
        .and_then(|error| error.get("type"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
