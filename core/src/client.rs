//! HTTP request builder and response parser for the marketplace API.
//!
//! # Design
//! `ApiClient` holds the validated config and the current bearer credential,
//! nothing else. Every verb is split into a `build_*` method that produces an
//! `HttpRequest` and a single `parse` method that consumes the
//! `HttpResponse`. The caller (a `Transport`, or any host) executes the
//! round-trip in between, so the core stays free of I/O.
//!
//! Headers are snapshotted when a request is built. Changing the credential
//! afterwards does not touch requests that are already in flight.

use serde::Serialize;

use crate::config::{ClientConfig, ConfigError};
use crate::error::{extract_error_type, extract_message, ApiError};
use crate::http::{Body, HttpMethod, HttpRequest, HttpResponse, RequestBody};
use crate::multipart::{FileUpload, MultipartForm};
use crate::params::Params;
use crate::store::CredentialStore;

/// Field name a file is uploaded under unless the caller picks another.
pub const DEFAULT_FILE_FIELD: &str = "file";

const CONTENT_TYPE: &str = "Content-Type";
const AUTHORIZATION: &str = "Authorization";
const JSON: &str = "application/json";

/// What a request carries.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Empty,
    Json(String),
    Multipart(MultipartForm),
}

impl Payload {
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, ApiError> {
        serde_json::to_string(value)
            .map(Payload::Json)
            .map_err(|e| ApiError::SerializationError(e.to_string()))
    }
}

impl From<MultipartForm> for Payload {
    fn from(form: MultipartForm) -> Self {
        Payload::Multipart(form)
    }
}

/// Outcome of a request that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Data(Body),
    /// The server answered 401. The caller should send the user to
    /// `redirect_path`; nothing is retried.
    AuthRequired { redirect_path: String },
}

impl Reply {
    /// The body, if this is not an auth redirect.
    pub fn data(self) -> Option<Body> {
        match self {
            Reply::Data(body) => Some(body),
            Reply::AuthRequired { .. } => None,
        }
    }

    pub fn is_auth_required(&self) -> bool {
        matches!(self, Reply::AuthRequired { .. })
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    config: ClientConfig,
    base_url: String,
    credential: Option<String>,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(Self {
            config,
            base_url,
            credential: None,
        })
    }

    /// Client rooted at `base_url` with every other option at its default.
    pub fn configure(base_url: &str) -> Result<Self, ConfigError> {
        Self::new(ClientConfig::new(base_url))
    }

    /// Client whose credential is seeded from `store` under the configured
    /// token key.
    pub fn with_store(config: ClientConfig, store: &dyn CredentialStore) -> Result<Self, ConfigError> {
        let mut client = Self::new(config)?;
        let token = store.get(&client.config.token_key);
        client.set_credential(token.as_deref());
        Ok(client)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Set or clear the bearer token. An empty token clears it.
    pub fn set_credential(&mut self, token: Option<&str>) {
        self.credential = token.filter(|t| !t.is_empty()).map(str::to_string);
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn default_headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![
            (CONTENT_TYPE.to_string(), JSON.to_string()),
            ("Accept".to_string(), JSON.to_string()),
            ("X-Requested-With".to_string(), "XMLHttpRequest".to_string()),
        ];
        if let Some(token) = &self.credential {
            headers.push((AUTHORIZATION.to_string(), format!("Bearer {token}")));
        }
        headers
    }

    pub fn url_for(&self, endpoint: &str) -> String {
        if endpoint.is_empty() || endpoint.starts_with('/') {
            format!("{}{endpoint}", self.base_url)
        } else {
            format!("{}/{endpoint}", self.base_url)
        }
    }

    /// Build a request for any verb. Per-call `overrides` replace default
    /// headers of the same name.
    pub fn build(
        &self,
        method: HttpMethod,
        endpoint: &str,
        payload: Payload,
        overrides: &[(&str, &str)],
    ) -> HttpRequest {
        let mut headers = self.default_headers();
        for (name, value) in overrides {
            match headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
                Some(existing) => existing.1 = value.to_string(),
                None => headers.push((name.to_string(), value.to_string())),
            }
        }

        let body = match payload {
            Payload::Empty => None,
            Payload::Json(text) => Some(RequestBody::Json(text)),
            Payload::Multipart(form) => {
                headers.retain(|(k, _)| !k.eq_ignore_ascii_case(CONTENT_TYPE));
                Some(RequestBody::Multipart(form))
            }
        };

        let request = HttpRequest {
            method,
            url: self.url_for(endpoint),
            headers,
            body,
        };
        tracing::debug!(
            method = %request.method,
            url = %request.url,
            authenticated = self.credential.is_some(),
            "built request"
        );
        request
    }

    pub fn build_get(&self, endpoint: &str, query: &Params) -> HttpRequest {
        let endpoint = if query.is_empty() {
            endpoint.to_string()
        } else {
            let sep = if endpoint.contains('?') { '&' } else { '?' };
            format!("{endpoint}{sep}{}", query.to_query_string())
        };
        self.build(HttpMethod::Get, &endpoint, Payload::Empty, &[])
    }

    pub fn build_post<T: Serialize + ?Sized>(&self, endpoint: &str, payload: &T) -> Result<HttpRequest, ApiError> {
        Ok(self.build(HttpMethod::Post, endpoint, Payload::json(payload)?, &[]))
    }

    pub fn build_put<T: Serialize + ?Sized>(&self, endpoint: &str, payload: &T) -> Result<HttpRequest, ApiError> {
        Ok(self.build(HttpMethod::Put, endpoint, Payload::json(payload)?, &[]))
    }

    pub fn build_patch<T: Serialize + ?Sized>(&self, endpoint: &str, payload: &T) -> Result<HttpRequest, ApiError> {
        Ok(self.build(HttpMethod::Patch, endpoint, Payload::json(payload)?, &[]))
    }

    pub fn build_delete(&self, endpoint: &str) -> HttpRequest {
        self.build(HttpMethod::Delete, endpoint, Payload::Empty, &[])
    }

    pub fn build_delete_with<T: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        payload: &T,
    ) -> Result<HttpRequest, ApiError> {
        Ok(self.build(HttpMethod::Delete, endpoint, Payload::json(payload)?, &[]))
    }

    /// POST `file` under `field_name`, followed by the `extra` scalar fields.
    pub fn build_upload(&self, endpoint: &str, file: FileUpload, field_name: &str, extra: &Params) -> HttpRequest {
        let form = extra
            .iter()
            .fold(MultipartForm::new().file(field_name, file), |form, (k, v)| {
                form.text(k, v)
            });
        self.build(HttpMethod::Post, endpoint, form.into(), &[])
    }

    /// Login view with `current_path` as the post-login target.
    pub fn login_redirect(&self, current_path: &str) -> String {
        format!(
            "{}?redirect={}",
            self.config.login_path,
            urlencoding::encode(current_path)
        )
    }

    /// Interpret a response. `current_path` is where the user is now, used
    /// as the redirect target when the server demands re-authentication.
    pub fn parse(&self, response: HttpResponse, current_path: &str) -> Result<Reply, ApiError> {
        if response.status == 401 {
            let redirect_path = self.login_redirect(current_path);
            tracing::warn!(redirect = %redirect_path, "server requires authentication");
            return Ok(Reply::AuthRequired { redirect_path });
        }

        let body = Body::parse(&response.body);
        if !response.is_success() {
            let value = body.value();
            let message = extract_message(&value).unwrap_or_else(|| self.config.error_fallback.clone());
            tracing::debug!(status = response.status, %message, "request failed");
            return Err(ApiError::Status {
                status: response.status,
                message,
                error_type: extract_error_type(&value),
                body,
            });
        }

        tracing::debug!(status = response.status, parsed = body.is_parsed(), "request succeeded");
        Ok(Reply::Data(body))
    }
}
