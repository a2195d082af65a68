use std::sync::Arc;

use async_trait::async_trait;
use lightbox_core::{mime_for_filename, StoredAsset};
use lightbox_store::{BlobResolver, ExternalBlob, HttpResolver, SchemeResolver};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, RequestBuilder, StatusCode};
use tracing::debug;

use crate::{AssetRecord, MediaService, ServiceError};

/// Async HTTP client implementation of MediaService.
/// Connects to a running collaborator.
pub struct HttpService {
    base_url: String,
    client: Client,
    api_key: Option<String>,
    resolver: Arc<dyn BlobResolver>,
}

impl HttpService {
    pub fn new(base_url: &str) -> Self {
        Self::build(base_url, None)
    }

    pub fn with_api_key(base_url: &str, key: String) -> Self {
        Self::build(base_url, Some(key))
    }

    fn build(base_url: &str, api_key: Option<String>) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        let client = Client::new();
        // Content fetches carry the same credentials as API calls.
        let resolver = Arc::new(SchemeResolver::with_http(HttpResolver::with_client(
            client.clone(),
            api_key.clone(),
        )));
        Self {
            base_url,
            client,
            api_key,
            resolver,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn with_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("Authorization", format!("Bearer {key}")),
            None => builder,
        }
    }

    /// Make a listing locator absolute. Paths are taken relative to the base URL.
    fn absolute_locator(&self, locator: &str) -> String {
        if locator.starts_with("http://")
            || locator.starts_with("https://")
            || locator.starts_with("data:")
        {
            locator.to_string()
        } else if locator.starts_with('/') {
            format!("{}{locator}", self.base_url)
        } else {
            format!("{}/{locator}", self.base_url)
        }
    }

    fn to_record(&self, stored: StoredAsset) -> AssetRecord {
        let locator = self.absolute_locator(&stored.locator);
        AssetRecord::from_stored(stored, locator, self.resolver.clone())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ServiceError> {
        let builder = self.client.get(format!("{}{path}", self.base_url));
        let resp = self
            .with_auth(builder)
            .send()
            .await
            .map_err(transport_error)?;
        handle_response(resp).await
    }

    async fn delete_req(&self, path: &str) -> Result<(), ServiceError> {
        let builder = self.client.delete(format!("{}{path}", self.base_url));
        let resp = self
            .with_auth(builder)
            .send()
            .await
            .map_err(transport_error)?;
        expect_success(resp).await
    }

    /// Send one blob as a streamed request body. Progress is reported as the
    /// transport consumes the body.
    async fn upload(
        &self,
        builder: RequestBuilder,
        blob: ExternalBlob,
        filename: &str,
    ) -> Result<(), ServiceError> {
        let stream = blob.into_transfer().await?;
        debug!(filename, bytes = stream.len(), "uploading");
        let builder = builder
            .query(&[("filename", filename)])
            .header("Content-Type", mime_for_filename(filename))
            .body(Body::wrap_stream(stream));
        let resp = self
            .with_auth(builder)
            .send()
            .await
            .map_err(transport_error)?;
        expect_success(resp).await
    }
}

fn transport_error(e: reqwest::Error) -> ServiceError {
    if e.is_connect() || e.is_timeout() {
        ServiceError::Unavailable(e.to_string())
    } else {
        ServiceError::Internal(e.to_string())
    }
}

async fn handle_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ServiceError> {
    let status = resp.status();
    if status.is_success() {
        resp.json::<T>()
            .await
            .map_err(|e| ServiceError::Internal(format!("json decode: {e}")))
    } else {
        Err(parse_error_with_status(status, resp).await)
    }
}

async fn expect_success(resp: reqwest::Response) -> Result<(), ServiceError> {
    let status = resp.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(parse_error_with_status(status, resp).await)
    }
}

async fn parse_error_with_status(status: StatusCode, resp: reqwest::Response) -> ServiceError {
    let body = resp.text().await.unwrap_or_default();
    let msg = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v["error"].as_str().map(String::from))
        .unwrap_or(body);
    match status {
        StatusCode::NOT_FOUND => ServiceError::NotFound(msg),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            ServiceError::InvalidInput(msg)
        }
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
            ServiceError::Unavailable(msg)
        }
        _ => ServiceError::Internal(msg),
    }
}

#[async_trait]
impl MediaService for HttpService {
    /// Health endpoint is NOT authenticated.
    async fn health_check(&self) -> Result<(), ServiceError> {
        let resp = self
            .client
            .get(format!("{}/api/health", self.base_url))
            .send()
            .await
            .map_err(transport_error)?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ServiceError::Unavailable(format!(
                "health check failed: {}",
                resp.status()
            )))
        }
    }

    async fn add_image(&self, blob: ExternalBlob, filename: &str) -> Result<(), ServiceError> {
        let builder = self.client.post(format!("{}/api/images", self.base_url));
        self.upload(builder, blob, filename).await
    }

    async fn list_images(&self) -> Result<Vec<AssetRecord>, ServiceError> {
        let stored: Vec<StoredAsset> = self.get_json("/api/images").await?;
        Ok(stored.into_iter().map(|s| self.to_record(s)).collect())
    }

    async fn remove_image(&self, index: u64) -> Result<(), ServiceError> {
        self.delete_req(&format!("/api/images/{index}")).await
    }

    async fn clear_images(&self) -> Result<(), ServiceError> {
        self.delete_req("/api/images").await
    }

    async fn set_images(
        &self,
        blobs: Vec<ExternalBlob>,
        filenames: Vec<String>,
    ) -> Result<(), ServiceError> {
        if blobs.len() != filenames.len() {
            return Err(ServiceError::InvalidInput(format!(
                "{} blobs for {} filenames",
                blobs.len(),
                filenames.len()
            )));
        }

        // Every body is prepared before the single request goes out.
        let mut form = Form::new();
        for (blob, filename) in blobs.into_iter().zip(filenames) {
            let stream = blob.into_transfer().await?;
            let len = stream.len();
            let part = Part::stream_with_length(Body::wrap_stream(stream), len)
                .file_name(filename.clone())
                .mime_str(mime_for_filename(&filename))
                .map_err(|e| ServiceError::Internal(format!("multipart: {e}")))?;
            form = form.part("file", part);
        }

        let builder = self
            .client
            .put(format!("{}/api/images", self.base_url))
            .multipart(form);
        let resp = self
            .with_auth(builder)
            .send()
            .await
            .map_err(transport_error)?;
        expect_success(resp).await
    }

    async fn set_document(&self, blob: ExternalBlob, filename: &str) -> Result<(), ServiceError> {
        let builder = self.client.put(format!("{}/api/document", self.base_url));
        self.upload(builder, blob, filename).await
    }

    async fn get_document(&self) -> Result<Option<AssetRecord>, ServiceError> {
        let stored: Option<StoredAsset> = self.get_json("/api/document").await?;
        Ok(stored.map(|s| self.to_record(s)))
    }

    async fn clear_document(&self) -> Result<(), ServiceError> {
        self.delete_req("/api/document").await
    }
}
