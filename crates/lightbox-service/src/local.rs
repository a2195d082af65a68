use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use lightbox_core::Timestamp;
use lightbox_store::ExternalBlob;

use crate::{AssetRecord, MediaService, ServiceError};

struct StoredBlob {
    filename: String,
    uploaded_at: Timestamp,
    bytes: Bytes,
}

impl StoredBlob {
    fn to_record(&self) -> AssetRecord {
        AssetRecord {
            filename: self.filename.clone(),
            uploaded_at: self.uploaded_at,
            blob: ExternalBlob::from_bytes(self.bytes.clone()),
        }
    }
}

#[derive(Default)]
struct State {
    images: Vec<StoredBlob>,
    document: Option<StoredBlob>,
}

/// In-memory implementation. Uploads are drained chunk by chunk so observers
/// see progress the same way they would over the network.
#[derive(Default)]
pub struct LocalService {
    state: Mutex<State>,
}

impl LocalService {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn receive(blob: ExternalBlob, filename: &str) -> Result<StoredBlob, ServiceError> {
        if filename.trim().is_empty() {
            return Err(ServiceError::InvalidInput("filename is required".into()));
        }
        let bytes = blob.into_transfer().await?.collect_bytes().await;
        Ok(StoredBlob {
            filename: filename.to_string(),
            uploaded_at: Timestamp::now(),
            bytes,
        })
    }
}

#[async_trait]
impl MediaService for LocalService {
    async fn health_check(&self) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn add_image(&self, blob: ExternalBlob, filename: &str) -> Result<(), ServiceError> {
        let stored = Self::receive(blob, filename).await?;
        self.lock().images.push(stored);
        Ok(())
    }

    async fn list_images(&self) -> Result<Vec<AssetRecord>, ServiceError> {
        Ok(self.lock().images.iter().map(StoredBlob::to_record).collect())
    }

    async fn remove_image(&self, index: u64) -> Result<(), ServiceError> {
        let mut state = self.lock();
        let len = state.images.len();
        match usize::try_from(index) {
            Ok(i) if i < len => {
                state.images.remove(i);
                Ok(())
            }
            _ => Err(ServiceError::NotFound(format!(
                "image {index} (collection has {len})"
            ))),
        }
    }

    async fn clear_images(&self) -> Result<(), ServiceError> {
        self.lock().images.clear();
        Ok(())
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
        let mut received = Vec::with_capacity(blobs.len());
        for (blob, filename) in blobs.into_iter().zip(&filenames) {
            received.push(Self::receive(blob, filename).await?);
        }
        self.lock().images = received;
        Ok(())
    }

    async fn set_document(&self, blob: ExternalBlob, filename: &str) -> Result<(), ServiceError> {
        let stored = Self::receive(blob, filename).await?;
        self.lock().document = Some(stored);
        Ok(())
    }

    async fn get_document(&self) -> Result<Option<AssetRecord>, ServiceError> {
        Ok(self.lock().document.as_ref().map(StoredBlob::to_record))
    }

    async fn clear_document(&self) -> Result<(), ServiceError> {
        self.lock().document = None;
        Ok(())
    }
}
