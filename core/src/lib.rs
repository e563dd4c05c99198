//! Request/session client for the marketplace API.
//!
//! # Overview
//! Turns application actions into authenticated HTTP requests and normalizes
//! the responses. `ApiClient` builds `HttpRequest` values and parses
//! `HttpResponse` values without touching the network (host-does-IO pattern);
//! `Session` pairs it with a `Transport` for async callers.
//!
//! # Design
//! - `ApiClient` holds only its validated config and the bearer credential.
//! - A 401 is returned as `Reply::AuthRequired { redirect_path }` for the UI
//!   layer to act on; the client never navigates or retries.
//! - Bodies that fail to parse as JSON are kept as `Body::Unparsed` and read
//!   as an empty object, so a parse failure never becomes an error.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod multipart;
pub mod params;
pub mod session;
pub mod store;
pub mod transport;
pub mod types;

pub use client::{ApiClient, Payload, Reply, DEFAULT_FILE_FIELD};
pub use config::{ClientConfig, ConfigError};
pub use error::ApiError;
pub use http::{Body, HttpMethod, HttpRequest, HttpResponse, RequestBody, ResponseEnvelope};
pub use multipart::{FileUpload, FormPart, MultipartForm};
pub use params::Params;
pub use session::Session;
pub use store::{CredentialStore, FileStore, MemoryStore};
pub use transport::{ReqwestTransport, Transport};
pub use types::{CreateProduct, CurrentUser, Product, UpdateProduct, UploadReceipt, UploadedFile};
