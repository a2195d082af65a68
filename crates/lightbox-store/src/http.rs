use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};

use crate::{BlobResolver, RetrievalError};

/// Fetches blob bytes over HTTP(S), optionally with a bearer token.
#[derive(Clone)]
pub struct HttpResolver {
    client: Client,
    api_key: Option<String>,
}

impl std::fmt::Debug for HttpResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResolver").finish_non_exhaustive()
    }
}

impl HttpResolver {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            api_key: None,
        }
    }

    pub fn with_client(client: Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }
}

impl Default for HttpResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobResolver for HttpResolver {
    async fn fetch(&self, locator: &str) -> Result<Bytes, RetrievalError> {
        let mut builder = self.client.get(locator);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }
        let resp = builder
            .send()
            .await
            .map_err(|e| RetrievalError::Network(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(RetrievalError::NotFound(locator.to_string()));
        }
        if !status.is_success() {
            return Err(RetrievalError::Network(format!("get {locator}: status {status}")));
        }
        resp.bytes()
            .await
            .map_err(|e| RetrievalError::Network(format!("read body: {e}")))
    }
}
