//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! These types describe HTTP requests and responses as plain data. The
//! `ApiClient` builds `HttpRequest` values and parses `HttpResponse` values
//! without touching the network; a `Transport` (or any other host code)
//! performs the actual round-trip.
//!
//! Header lists are ordered `(name, value)` pairs. Names are compared
//! case-insensitively wherever the client merges or looks them up.

use std::fmt;

use serde_json::{Map, Value};

use crate::multipart::MultipartForm;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of an outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Serialized JSON text, sent with the JSON content type.
    Json(String),
    /// Multi-part form. The transport converts it to its own multipart type,
    /// which encodes it and sets the boundary content type.
    Multipart(MultipartForm),
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl HttpRequest {
    /// Look up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// An HTTP response described as plain data.
///
/// Constructed by the transport after executing an `HttpRequest`, then passed
/// to `ApiClient::parse`.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }
}

pub(crate) fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// A response body, tagged by whether it parsed as JSON.
///
/// Unparsable bodies are never an error. They are kept verbatim so callers
/// can tell an empty object apart from, say, an HTML error page.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Parsed(Value),
    Unparsed(String),
}

impl Body {
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str(raw) {
            Ok(value) => Body::Parsed(value),
            Err(e) => {
                tracing::debug!(error = %e, len = raw.len(), "response body is not JSON");
                Body::Unparsed(raw.to_string())
            }
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, Body::Parsed(_))
    }

    /// The parsed value, or an empty object when the body did not parse.
    pub fn value(&self) -> Value {
        match self {
            Body::Parsed(value) => value.clone(),
            Body::Unparsed(_) => Value::Object(Map::new()),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Body::Parsed(value) => value,
            Body::Unparsed(_) => Value::Object(Map::new()),
        }
    }

    /// Deserialize the body into a typed value.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, crate::ApiError> {
        match self {
            Body::Parsed(value) => serde_json::from_value(value.clone())
                .map_err(|e| crate::ApiError::DeserializationError(e.to_string())),
            Body::Unparsed(raw) => Err(crate::ApiError::DeserializationError(format!(
                "body is not JSON ({} bytes)",
                raw.len()
            ))),
        }
    }
}

/// Normalized view of any raw response: `{status, body, ok}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    pub status: u16,
    pub body: Body,
    pub ok: bool,
}

impl ResponseEnvelope {
    pub fn from_response(response: &HttpResponse) -> Self {
        Self {
            status: response.status,
            body: Body::parse(&response.body),
            ok: response.is_success(),
        }
    }
}
