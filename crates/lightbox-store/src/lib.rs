mod blob;
mod data_uri;
mod http;
mod materialize;
mod progress;
mod resource;

pub use blob::{ExternalBlob, DEFAULT_CHUNK_SIZE};
pub use data_uri::{decode_data_uri, encode_data_uri};
pub use http::HttpResolver;
pub use materialize::{Materialized, MaterializedSet, Materializer};
pub use progress::{ProgressFn, ProgressReporter, TransferStream};
pub use resource::{LocalResource, LocalResourceHandle, RegistryStats, ResourceRegistry};

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, Clone, thiserror::Error)]
pub enum RetrievalError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid locator: {0}")]
    InvalidLocator(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("retrieval error: {0}")]
    Internal(String),
}

/// Resolves a locator into the bytes it references.
#[async_trait]
pub trait BlobResolver: Send + Sync {
    async fn fetch(&self, locator: &str) -> Result<Bytes, RetrievalError>;
}

/// Routes `data:` locators to the inline decoder and `http(s):` locators to
/// an [`HttpResolver`].
pub struct SchemeResolver {
    http: HttpResolver,
}

impl SchemeResolver {
    pub fn new() -> Self {
        Self {
            http: HttpResolver::new(),
        }
    }

    pub fn with_http(http: HttpResolver) -> Self {
        Self { http }
    }
}

impl Default for SchemeResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobResolver for SchemeResolver {
    async fn fetch(&self, locator: &str) -> Result<Bytes, RetrievalError> {
        if locator.starts_with("data:") {
            decode_data_uri(locator)
        } else if locator.starts_with("http://") || locator.starts_with("https://") {
            self.http.fetch(locator).await
        } else {
            Err(RetrievalError::InvalidLocator(locator.to_string()))
        }
    }
}

/// Process-wide resolver used by [`ExternalBlob::from_locator`].
pub fn default_resolver() -> Arc<dyn BlobResolver> {
    static DEFAULT: OnceLock<Arc<SchemeResolver>> = OnceLock::new();
    DEFAULT
        .get_or_init(|| Arc::new(SchemeResolver::new()))
        .clone()
}
