//! Test doubles for the client pipeline: a `MediaService` wrapper around
//! `LocalService` that can fail, count, gate and watch uploads, and a
//! `BlobResolver` whose fetches wait for an explicit go-ahead.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use lightbox_service::{AssetRecord, LocalService, MediaService, ServiceError};
use lightbox_store::{BlobResolver, ExternalBlob, RetrievalError};
use tokio::sync::Notify;

type ChunkHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
pub struct TestService {
    inner: LocalService,
    failing: Mutex<HashSet<String>>,
    reject_batches: AtomicBool,
    add_calls: Mutex<HashMap<String, usize>>,
    list_calls: AtomicUsize,
    upload_gate: Mutex<Option<Arc<Notify>>>,
    watcher: Mutex<Option<ChunkHook>>,
    listing: Mutex<Option<Vec<AssetRecord>>>,
    list_gate: Mutex<Option<Arc<Notify>>>,
}

impl TestService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_on(&self, filename: &str) {
        self.failing.lock().unwrap().insert(filename.to_string());
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
        self.reject_batches.store(false, Ordering::SeqCst);
    }

    pub fn reject_batches(&self) {
        self.reject_batches.store(true, Ordering::SeqCst);
    }

    pub fn add_calls(&self, filename: &str) -> usize {
        self.add_calls
            .lock()
            .unwrap()
            .get(filename)
            .copied()
            .unwrap_or(0)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Hold every upload until the returned gate is notified.
    pub fn gate_uploads(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.upload_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Run `watcher` after every chunk an upload consumes.
    pub fn watch_uploads(&self, watcher: impl Fn() + Send + Sync + 'static) {
        *self.watcher.lock().unwrap() = Some(Arc::new(watcher));
    }

    /// Serve this listing instead of what was uploaded.
    pub fn serve_listing(&self, records: Vec<AssetRecord>) {
        *self.listing.lock().unwrap() = Some(records);
    }

    /// Hold the next listing, after it has been taken, until the returned
    /// gate is notified. Later listings are not held.
    pub fn gate_next_listing(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.list_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    async fn drain(&self, blob: ExternalBlob) -> Result<ExternalBlob, ServiceError> {
        let gate = self.upload_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let watcher = self.watcher.lock().unwrap().clone();
        let mut stream = blob.into_transfer().await?;
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ServiceError::Internal(e.to_string()))?;
            out.extend_from_slice(&chunk);
            if let Some(watcher) = &watcher {
                watcher();
            }
        }
        Ok(ExternalBlob::from_bytes(out))
    }
}

#[async_trait]
impl MediaService for TestService {
    async fn health_check(&self) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn add_image(&self, blob: ExternalBlob, filename: &str) -> Result<(), ServiceError> {
        *self
            .add_calls
            .lock()
            .unwrap()
            .entry(filename.to_string())
            .or_default() += 1;
        let received = self.drain(blob).await?;
        if self.failing.lock().unwrap().contains(filename) {
            return Err(ServiceError::Unavailable(format!("{filename} rejected")));
        }
        self.inner.add_image(received, filename).await
    }

    async fn list_images(&self) -> Result<Vec<AssetRecord>, ServiceError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let listing = self.listing.lock().unwrap().clone();
        let gate = self.list_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        match listing {
            Some(records) => Ok(records),
            None => self.inner.list_images().await,
        }
    }

    async fn remove_image(&self, index: u64) -> Result<(), ServiceError> {
        self.inner.remove_image(index).await
    }

    async fn clear_images(&self) -> Result<(), ServiceError> {
        self.inner.clear_images().await
    }

    async fn set_images(
        &self,
        blobs: Vec<ExternalBlob>,
        filenames: Vec<String>,
    ) -> Result<(), ServiceError> {
        let mut received = Vec::with_capacity(blobs.len());
        for blob in blobs {
            received.push(self.drain(blob).await?);
        }
        if self.reject_batches.load(Ordering::SeqCst) {
            return Err(ServiceError::InvalidInput("batch rejected".into()));
        }
        self.inner.set_images(received, filenames).await
    }

    async fn set_document(&self, blob: ExternalBlob, filename: &str) -> Result<(), ServiceError> {
        let received = self.drain(blob).await?;
        self.inner.set_document(received, filename).await
    }

    async fn get_document(&self) -> Result<Option<AssetRecord>, ServiceError> {
        self.inner.get_document().await
    }

    async fn clear_document(&self) -> Result<(), ServiceError> {
        self.inner.clear_document().await
    }
}

/// Resolver whose fetches block until their locator's gate is opened.
#[derive(Default)]
pub struct GatedResolver {
    gates: Mutex<HashMap<String, Arc<Notify>>>,
}

impl GatedResolver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn gate(&self, locator: &str) -> Arc<Notify> {
        self.gates
            .lock()
            .unwrap()
            .entry(locator.to_string())
            .or_default()
            .clone()
    }

    pub fn open(&self, locator: &str) {
        self.gate(locator).notify_one();
    }
}

#[async_trait]
impl BlobResolver for GatedResolver {
    async fn fetch(&self, locator: &str) -> Result<Bytes, RetrievalError> {
        self.gate(locator).notified().await;
        Ok(Bytes::copy_from_slice(locator.as_bytes()))
    }
}

/// Let spawned tasks run until they park again.
pub async fn run_pending() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
