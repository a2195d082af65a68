use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use lightbox_service::{AssetRecord, MediaService, ServiceError};
use lightbox_store::ExternalBlob;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Images,
    Document,
}

impl CacheKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKey::Images => "images",
            CacheKey::Document => "document",
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable view of one cache key. `generation` grows with every
/// committed value, so consumers can tell whether their derived state is
/// older than what the cache holds.
#[derive(Debug)]
pub struct Snapshot<T> {
    pub data: Arc<T>,
    pub generation: u64,
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            generation: self.generation,
        }
    }
}

struct Slot<T> {
    value: Option<Snapshot<T>>,
    stale: bool,
    /// Bumped by every invalidation; a fetch that started under an older
    /// epoch commits its value but leaves the slot stale.
    epoch: u64,
    /// Epoch the current value was fetched under. A late fetch from an
    /// earlier epoch never replaces it.
    committed_epoch: u64,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            value: None,
            stale: true,
            epoch: 0,
            committed_epoch: 0,
        }
    }
}

#[derive(Default)]
struct CacheInner {
    images: Slot<Vec<AssetRecord>>,
    document: Slot<Option<AssetRecord>>,
    generation: u64,
}

/// Last known collaborator state for each key, re-fetched lazily after
/// invalidation.
///
/// Reads are disabled (return `None`) until the connection is marked ready.
/// Values are replaced wholesale, never edited in place. Mutations go
/// through [`mutate`](Self::mutate) so the key is invalidated only once the
/// collaborator confirms success.
pub struct RemoteCache {
    service: Arc<dyn MediaService>,
    ready: AtomicBool,
    inner: Mutex<CacheInner>,
}

impl RemoteCache {
    pub fn new(service: Arc<dyn MediaService>) -> Self {
        Self {
            service,
            ready: AtomicBool::new(false),
            inner: Mutex::new(CacheInner::default()),
        }
    }

    pub fn service(&self) -> &Arc<dyn MediaService> {
        &self.service
    }

    /// Probe the collaborator and enable reads once it answers.
    pub async fn connect(&self) -> Result<(), ServiceError> {
        self.service.health_check().await?;
        self.mark_ready();
        info!("collaborator connection ready");
        Ok(())
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub async fn images(&self) -> Result<Option<Snapshot<Vec<AssetRecord>>>, ServiceError> {
        self.read(CacheKey::Images, images_slot, self.service.list_images())
            .await
    }

    pub async fn document(&self) -> Result<Option<Snapshot<Option<AssetRecord>>>, ServiceError> {
        self.read(CacheKey::Document, document_slot, self.service.get_document())
            .await
    }

    /// Last committed images, stale or not, without touching the network.
    pub fn peek_images(&self) -> Option<Snapshot<Vec<AssetRecord>>> {
        self.lock().images.value.clone()
    }

    pub fn peek_document(&self) -> Option<Snapshot<Option<AssetRecord>>> {
        self.lock().document.value.clone()
    }

    pub fn is_stale(&self, key: CacheKey) -> bool {
        let inner = self.lock();
        match key {
            CacheKey::Images => inner.images.stale,
            CacheKey::Document => inner.document.stale,
        }
    }

    pub fn invalidate(&self, key: CacheKey) {
        let mut inner = self.lock();
        match key {
            CacheKey::Images => mark_stale(&mut inner.images),
            CacheKey::Document => mark_stale(&mut inner.document),
        }
        debug!(%key, "cache invalidated");
    }

    /// Run a collaborator mutation. On success the key is invalidated so the
    /// next read re-fetches; on failure the last known view is kept.
    pub async fn mutate<T, F>(&self, key: CacheKey, op: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        match op.await {
            Ok(value) => {
                self.invalidate(key);
                Ok(value)
            }
            Err(e) => {
                warn!(%key, error = %e, "mutation failed, keeping cached view");
                Err(e)
            }
        }
    }

    pub async fn add_image(&self, blob: ExternalBlob, filename: &str) -> Result<(), ServiceError> {
        self.mutate(CacheKey::Images, self.service.add_image(blob, filename))
            .await
    }

    pub async fn set_images(
        &self,
        blobs: Vec<ExternalBlob>,
        filenames: Vec<String>,
    ) -> Result<(), ServiceError> {
        self.mutate(CacheKey::Images, self.service.set_images(blobs, filenames))
            .await
    }

    pub async fn remove_image(&self, index: u64) -> Result<(), ServiceError> {
        self.mutate(CacheKey::Images, self.service.remove_image(index))
            .await
    }

    pub async fn clear_images(&self) -> Result<(), ServiceError> {
        self.mutate(CacheKey::Images, self.service.clear_images())
            .await
    }

    pub async fn set_document(&self, blob: ExternalBlob, filename: &str) -> Result<(), ServiceError> {
        self.mutate(CacheKey::Document, self.service.set_document(blob, filename))
            .await
    }

    pub async fn clear_document(&self) -> Result<(), ServiceError> {
        self.mutate(CacheKey::Document, self.service.clear_document())
            .await
    }

    async fn read<T, F>(
        &self,
        key: CacheKey,
        slot: fn(&mut CacheInner) -> &mut Slot<T>,
        fetch: F,
    ) -> Result<Option<Snapshot<T>>, ServiceError>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        if !self.is_ready() {
            return Ok(None);
        }

        let started_epoch = {
            let mut inner = self.lock();
            let slot = slot(&mut *inner);
            if let (false, Some(snapshot)) = (slot.stale, &slot.value) {
                return Ok(Some(snapshot.clone()));
            }
            slot.epoch
        };

        debug!(%key, "fetching");
        let value = fetch.await?;

        let mut guard = self.lock();
        let inner = &mut *guard;
        let newer = {
            let current = slot(inner);
            current
                .value
                .as_ref()
                .filter(|_| current.committed_epoch > started_epoch)
                .cloned()
        };
        if let Some(newer) = newer {
            debug!(%key, "discarding fetch that predates the last invalidation");
            return Ok(Some(newer));
        }

        inner.generation += 1;
        let generation = inner.generation;
        let slot = slot(inner);
        let snapshot = Snapshot {
            data: Arc::new(value),
            generation,
        };
        slot.value = Some(snapshot.clone());
        slot.committed_epoch = started_epoch;
        slot.stale = slot.epoch != started_epoch;
        Ok(Some(snapshot))
    }
}

fn images_slot(inner: &mut CacheInner) -> &mut Slot<Vec<AssetRecord>> {
    &mut inner.images
}

fn document_slot(inner: &mut CacheInner) -> &mut Slot<Option<AssetRecord>> {
    &mut inner.document
}

fn mark_stale<T>(slot: &mut Slot<T>) {
    slot.stale = true;
    slot.epoch += 1;
}

#[cfg(test)]
mod tests {
    use lightbox_service::LocalService;

    use super::*;

    #[tokio::test]
    async fn reads_are_disabled_until_ready() {
        let cache = RemoteCache::new(Arc::new(LocalService::new()));
        assert!(cache.images().await.unwrap().is_none());
        assert!(cache.document().await.unwrap().is_none());

        cache.connect().await.unwrap();
        let images = cache.images().await.unwrap().unwrap();
        assert!(images.data.is_empty());
    }

    #[tokio::test]
    async fn repeated_reads_share_one_snapshot() {
        let cache = RemoteCache::new(Arc::new(LocalService::new()));
        cache.mark_ready();
        let first = cache.images().await.unwrap().unwrap();
        let second = cache.images().await.unwrap().unwrap();
        assert_eq!(first.generation, second.generation);
        assert!(Arc::ptr_eq(&first.data, &second.data));
    }

    #[tokio::test]
    async fn successful_mutation_invalidates_only_its_key() {
        let cache = RemoteCache::new(Arc::new(LocalService::new()));
        cache.mark_ready();
        let images = cache.images().await.unwrap().unwrap();
        cache.document().await.unwrap();

        cache
            .add_image(ExternalBlob::from_bytes(&b"img"[..]), "a.png")
            .await
            .unwrap();
        assert!(cache.is_stale(CacheKey::Images));
        assert!(!cache.is_stale(CacheKey::Document));

        // Stale data is still visible until the next read.
        assert!(cache.peek_images().unwrap().data.is_empty());

        let refreshed = cache.images().await.unwrap().unwrap();
        assert_eq!(refreshed.data.len(), 1);
        assert!(refreshed.generation > images.generation);
    }

    #[tokio::test]
    async fn failed_mutation_keeps_cached_view() {
        let cache = RemoteCache::new(Arc::new(LocalService::new()));
        cache.mark_ready();
        let before = cache.images().await.unwrap().unwrap();

        assert!(cache.remove_image(5).await.is_err());
        assert!(!cache.is_stale(CacheKey::Images));

        let after = cache.images().await.unwrap().unwrap();
        assert_eq!(before.generation, after.generation);
    }
}
