//! Client configuration.
//!
//! Every recognized option is a field with a default. The config is checked
//! once, when an `ApiClient` is constructed, and never re-read afterwards.

use thiserror::Error;
use url::Url;

pub const DEFAULT_LOGIN_PATH: &str = "/auth/login";
pub const DEFAULT_TOKEN_KEY: &str = "auth_token";
pub const DEFAULT_ERROR_FALLBACK: &str = "An error occurred";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("MARKET_API_URL is not set")]
    MissingBaseUrl,

    #[error("invalid base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("login path must start with '/': {0:?}")]
    InvalidLoginPath(String),

    #[error("credential storage key must not be empty")]
    EmptyTokenKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Root prepended to every endpoint, e.g. `https://shop.example/api`.
    pub base_url: String,
    /// Login view the caller is sent to on 401.
    pub login_path: String,
    /// Storage key the bearer token is seeded from.
    pub token_key: String,
    /// Message used when an error body carries none.
    pub error_fallback: String,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            token_key: DEFAULT_TOKEN_KEY.to_string(),
            error_fallback: DEFAULT_ERROR_FALLBACK.to_string(),
        }
    }

    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    pub fn with_token_key(mut self, key: impl Into<String>) -> Self {
        self.token_key = key.into();
        self
    }

    pub fn with_error_fallback(mut self, message: impl Into<String>) -> Self {
        self.error_fallback = message.into();
        self
    }

    /// Load from the process environment, reading a `.env` file first if
    /// one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Unset or empty optional
    /// variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let base_url = var("MARKET_API_URL").ok_or(ConfigError::MissingBaseUrl)?;
        let mut config = Self::new(base_url);
        if let Some(path) = var("MARKET_LOGIN_PATH") {
            config.login_path = path;
        }
        if let Some(key) = var("MARKET_TOKEN_KEY") {
            config.token_key = key;
        }
        if let Some(message) = var("MARKET_ERROR_FALLBACK") {
            config.error_fallback = message;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason,
        };
        let url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme {:?}", url.scheme())));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(invalid("query and fragment are not allowed".to_string()));
        }
        if !self.login_path.starts_with('/') {
            return Err(ConfigError::InvalidLoginPath(self.login_path.clone()));
        }
        if self.token_key.is_empty() {
            return Err(ConfigError::EmptyTokenKey);
        }
        Ok(())
    }
}
