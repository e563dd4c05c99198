//! Async request/session layer: `ApiClient` plus a `Transport`.
//!
//! # Design
//! Each call builds its request first (snapshotting headers), awaits the
//! transport, then hands the response to `ApiClient::parse`. There is no
//! queue, de-duplication, retry or timeout; concurrent calls complete in
//! whatever order the network answers. Callers that want a timeout race the
//! future against their own timer.

use serde::Serialize;

use crate::client::{ApiClient, Payload, Reply, DEFAULT_FILE_FIELD};
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest};
use crate::multipart::FileUpload;
use crate::params::Params;
use crate::transport::Transport;

pub struct Session<T> {
    client: ApiClient,
    transport: T,
    current_path: String,
}

impl<T: Transport> Session<T> {
    pub fn new(client: ApiClient, transport: T) -> Self {
        Self {
            client,
            transport,
            current_path: "/".to_string(),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn set_credential(&mut self, token: Option<&str>) {
        self.client.set_credential(token);
    }

    /// Where the user currently is; becomes the post-login redirect target
    /// on 401.
    pub fn set_current_path(&mut self, path: impl Into<String>) {
        self.current_path = path.into();
    }

    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    async fn execute(&self, request: HttpRequest) -> Result<Reply, ApiError> {
        let response = self.transport.execute(request).await?;
        self.client.parse(response, &self.current_path)
    }

    pub async fn send(
        &self,
        method: HttpMethod,
        endpoint: &str,
        payload: Payload,
        overrides: &[(&str, &str)],
    ) -> Result<Reply, ApiError> {
        let request = self.client.build(method, endpoint, payload, overrides);
        self.execute(request).await
    }

    pub async fn get(&self, endpoint: &str, query: &Params) -> Result<Reply, ApiError> {
        let request = self.client.build_get(endpoint, query);
        self.execute(request).await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, endpoint: &str, payload: &B) -> Result<Reply, ApiError> {
        let request = self.client.build_post(endpoint, payload)?;
        self.execute(request).await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, endpoint: &str, payload: &B) -> Result<Reply, ApiError> {
        let request = self.client.build_put(endpoint, payload)?;
        self.execute(request).await
    }

    pub async fn patch<B: Serialize + ?Sized>(&self, endpoint: &str, payload: &B) -> Result<Reply, ApiError> {
        let request = self.client.build_patch(endpoint, payload)?;
        self.execute(request).await
    }

    pub async fn delete(&self, endpoint: &str) -> Result<Reply, ApiError> {
        let request = self.client.build_delete(endpoint);
        self.execute(request).await
    }

    pub async fn delete_with<B: Serialize + ?Sized>(&self, endpoint: &str, payload: &B) -> Result<Reply, ApiError> {
        let request = self.client.build_delete_with(endpoint, payload)?;
        self.execute(request).await
    }

    /// Upload `file` under the default `file` field.
    pub async fn upload(&self, endpoint: &str, file: FileUpload, extra: &Params) -> Result<Reply, ApiError> {
        self.upload_as(endpoint, file, DEFAULT_FILE_FIELD, extra).await
    }

    pub async fn upload_as(
        &self,
        endpoint: &str,
        file: FileUpload,
        field_name: &str,
        extra: &Params,
    ) -> Result<Reply, ApiError> {
        let request = self.client.build_upload(endpoint, file, field_name, extra);
        self.execute(request).await
    }
}
