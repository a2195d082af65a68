use async_trait::async_trait;
use lightbox_store::{ExternalBlob, RetrievalError};
use thiserror::Error;

use crate::AssetRecord;

#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RetrievalError> for ServiceError {
    fn from(e: RetrievalError) -> Self {
        match e {
            RetrievalError::NotFound(msg) => ServiceError::NotFound(msg),
            RetrievalError::InvalidLocator(msg) => ServiceError::InvalidInput(msg),
            RetrievalError::Network(msg) => ServiceError::Unavailable(msg),
            RetrievalError::Internal(msg) => ServiceError::Internal(msg),
        }
    }
}

/// The remote media store.
///
/// Client components program against this trait.
/// `HttpService` talks to a running collaborator over REST.
/// `LocalService` keeps everything in process memory.
///
/// Uploads take the blob by value and consume it; any progress observer
/// attached to the blob is driven as the bytes are transferred.
#[async_trait]
pub trait MediaService: Send + Sync {
    async fn health_check(&self) -> Result<(), ServiceError>;

    // -- Images --
    async fn add_image(&self, blob: ExternalBlob, filename: &str) -> Result<(), ServiceError>;
    async fn list_images(&self) -> Result<Vec<AssetRecord>, ServiceError>;
    async fn remove_image(&self, index: u64) -> Result<(), ServiceError>;
    async fn clear_images(&self) -> Result<(), ServiceError>;
    /// Replace the whole collection in one call. Nothing is committed unless
    /// every blob transfers.
    async fn set_images(
        &self,
        blobs: Vec<ExternalBlob>,
        filenames: Vec<String>,
    ) -> Result<(), ServiceError>;

    // -- Document --
    async fn set_document(&self, blob: ExternalBlob, filename: &str) -> Result<(), ServiceError>;
    async fn get_document(&self) -> Result<Option<AssetRecord>, ServiceError>;
    async fn clear_document(&self) -> Result<(), ServiceError>;
}
