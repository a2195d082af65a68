use futures::future::try_join_all;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{ExternalBlob, LocalResourceHandle, ResourceRegistry, RetrievalError};

/// Outcome of a materialization that was allowed to finish.
#[derive(Debug)]
pub enum Materialized {
    Ready(LocalResourceHandle),
    /// The token was cancelled while the bytes were in flight. Nothing was
    /// left registered.
    Discarded,
}

impl Materialized {
    pub fn into_handle(self) -> Option<LocalResourceHandle> {
        match self {
            Materialized::Ready(handle) => Some(handle),
            Materialized::Discarded => None,
        }
    }
}

#[derive(Debug)]
pub enum MaterializedSet {
    Ready(Vec<LocalResourceHandle>),
    Discarded,
}

/// Turns blob bytes into local resources registered with a
/// [`ResourceRegistry`].
#[derive(Debug, Clone, Default)]
pub struct Materializer {
    registry: ResourceRegistry,
}

impl Materializer {
    pub fn new(registry: ResourceRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub async fn materialize(
        &self,
        blob: &ExternalBlob,
        mime: &str,
        cancel: &CancellationToken,
    ) -> Result<Materialized, RetrievalError> {
        let bytes = blob.get_bytes().await?;
        if cancel.is_cancelled() {
            debug!(len = bytes.len(), "discarding late materialization");
            return Ok(Materialized::Discarded);
        }
        Ok(Materialized::Ready(self.registry.create(bytes, mime)))
    }

    /// Materialize several blobs concurrently. If the token fires before
    /// all of them land, every resource created for this call is released.
    /// The first retrieval failure wins and releases the rest as well.
    pub async fn materialize_all(
        &self,
        blobs: &[(ExternalBlob, String)],
        cancel: &CancellationToken,
    ) -> Result<MaterializedSet, RetrievalError> {
        let results = try_join_all(
            blobs
                .iter()
                .map(|(blob, mime)| self.materialize(blob, mime, cancel)),
        )
        .await?;

        if cancel.is_cancelled() {
            debug!(count = results.len(), "discarding late materialization set");
            return Ok(MaterializedSet::Discarded);
        }

        let mut handles = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Materialized::Ready(handle) => handles.push(handle),
                Materialized::Discarded => return Ok(MaterializedSet::Discarded),
            }
        }
        Ok(MaterializedSet::Ready(handles))
    }
}
