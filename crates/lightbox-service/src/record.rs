use std::sync::Arc;

use lightbox_core::{mime_for_filename, StoredAsset, Timestamp};
use lightbox_store::{BlobResolver, ExternalBlob};

/// Server-confirmed asset: what was stored, when, and a handle to its bytes.
#[derive(Debug, Clone)]
pub struct AssetRecord {
    pub filename: String,
    pub uploaded_at: Timestamp,
    pub blob: ExternalBlob,
}

impl AssetRecord {
    /// Bind a listing entry to the resolver that can fetch its bytes.
    /// `locator` should already be absolute.
    pub fn from_stored(
        stored: StoredAsset,
        locator: String,
        resolver: Arc<dyn BlobResolver>,
    ) -> Self {
        Self {
            filename: stored.filename,
            uploaded_at: stored.uploaded_at,
            blob: ExternalBlob::from_locator_with(locator, resolver),
        }
    }

    pub fn mime(&self) -> &'static str {
        mime_for_filename(&self.filename)
    }
}
