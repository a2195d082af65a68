use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::{
    default_resolver, encode_data_uri, BlobResolver, ProgressFn, ProgressReporter,
    RetrievalError, TransferStream,
};

/// Opaque handle to blob bytes: either held locally, ready to be uploaded,
/// or living at the collaborator behind a locator.
///
/// Cloning is cheap; local bytes are reference counted.
#[derive(Clone)]
pub struct ExternalBlob {
    source: BlobSource,
    progress: Option<ProgressFn>,
    chunk_size: usize,
}

/// Upload body chunk size used unless a blob asks for another.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Clone)]
enum BlobSource {
    Bytes(Bytes),
    Remote {
        locator: String,
        resolver: Arc<dyn BlobResolver>,
    },
}

impl fmt::Debug for ExternalBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("ExternalBlob");
        match &self.source {
            BlobSource::Bytes(bytes) => d.field("len", &bytes.len()),
            BlobSource::Remote { locator, .. } => d.field("locator", locator),
        };
        d.field("observed", &self.progress.is_some()).finish()
    }
}

impl ExternalBlob {
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            source: BlobSource::Bytes(bytes.into()),
            progress: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Reference bytes that already live elsewhere. The locator is not
    /// checked until the bytes are requested.
    pub fn from_locator(locator: impl Into<String>) -> Self {
        Self::from_locator_with(locator, default_resolver())
    }

    pub fn from_locator_with(locator: impl Into<String>, resolver: Arc<dyn BlobResolver>) -> Self {
        Self {
            source: BlobSource::Remote {
                locator: locator.into(),
                resolver,
            },
            progress: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Observe the upload of this blob. The callback sees non-decreasing
    /// percentages and usually a final 100, but completion is only ever
    /// signalled by the upload call returning.
    pub fn with_upload_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    /// Granularity of progress reports during upload. Zero is treated as one.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn is_local(&self) -> bool {
        matches!(self.source, BlobSource::Bytes(_))
    }

    /// Byte length, when known without a fetch.
    pub fn len_hint(&self) -> Option<u64> {
        match &self.source {
            BlobSource::Bytes(bytes) => Some(bytes.len() as u64),
            BlobSource::Remote { .. } => None,
        }
    }

    pub async fn get_bytes(&self) -> Result<Bytes, RetrievalError> {
        match &self.source {
            BlobSource::Bytes(bytes) => Ok(bytes.clone()),
            BlobSource::Remote { locator, resolver } => resolver.fetch(locator).await,
        }
    }

    /// A URI a renderer can dereference without going through
    /// [`get_bytes`](Self::get_bytes). Local bytes are inlined as a `data:`
    /// URI with no specific content type.
    pub fn direct_locator(&self) -> String {
        match &self.source {
            BlobSource::Bytes(bytes) => encode_data_uri("application/octet-stream", bytes),
            BlobSource::Remote { locator, .. } => locator.clone(),
        }
    }

    /// Turn the blob into an upload body that reports progress to the
    /// observer registered with [`with_upload_progress`](Self::with_upload_progress).
    pub async fn into_transfer(self) -> Result<TransferStream, RetrievalError> {
        let data = self.get_bytes().await?;
        let reporter = self.progress.map(ProgressReporter::new);
        Ok(TransferStream::new(data, self.chunk_size, reporter))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    struct FixedResolver(&'static [u8]);

    #[async_trait]
    impl BlobResolver for FixedResolver {
        async fn fetch(&self, locator: &str) -> Result<Bytes, RetrievalError> {
            if locator == "mem://ok" {
                Ok(Bytes::from_static(self.0))
            } else {
                Err(RetrievalError::NotFound(locator.to_string()))
            }
        }
    }

    #[tokio::test]
    async fn local_bytes_are_returned_repeatedly() {
        let blob = ExternalBlob::from_bytes(vec![1u8, 2, 3]);
        assert!(blob.is_local());
        assert_eq!(blob.len_hint(), Some(3));
        assert_eq!(blob.get_bytes().await.unwrap().as_ref(), &[1, 2, 3]);
        assert_eq!(blob.get_bytes().await.unwrap().as_ref(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn remote_blob_defers_validation_to_fetch() {
        let resolver: Arc<dyn BlobResolver> = Arc::new(FixedResolver(b"remote"));
        let good = ExternalBlob::from_locator_with("mem://ok", resolver.clone());
        let bad = ExternalBlob::from_locator_with("mem://gone", resolver);

        assert_eq!(good.direct_locator(), "mem://ok");
        assert_eq!(good.len_hint(), None);
        assert_eq!(good.get_bytes().await.unwrap().as_ref(), b"remote");
        assert!(matches!(
            bad.get_bytes().await,
            Err(RetrievalError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn direct_locator_of_local_bytes_is_a_data_uri() {
        let blob = ExternalBlob::from_bytes(&b"hi"[..]);
        let uri = blob.direct_locator();
        assert_eq!(uri, "data:application/octet-stream;base64,aGk=");

        let roundtrip = ExternalBlob::from_locator(uri);
        assert_eq!(roundtrip.get_bytes().await.unwrap().as_ref(), b"hi");
    }

    #[tokio::test]
    async fn transfer_reports_to_registered_observer() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let blob = ExternalBlob::from_bytes(vec![0u8; 8])
            .with_upload_progress(move |p| sink.lock().unwrap().push(p))
            .with_chunk_size(4);

        let body = blob.into_transfer().await.unwrap();
        assert_eq!(body.collect_bytes().await.len(), 8);
        assert_eq!(*seen.lock().unwrap(), vec![50.0, 100.0]);
    }
}
