use std::sync::{Arc, Mutex, MutexGuard};

use lightbox_core::Timestamp;
use lightbox_service::{AssetRecord, ServiceError};
use lightbox_store::{Materializer, ResourceRegistry};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::{CacheKey, PreviewLoader, RemoteCache};

/// Cursor into an ordered record sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Slideshow {
    index: usize,
    len: usize,
}

impl Slideshow {
    pub fn new(len: usize) -> Self {
        Self { index: 0, len }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Adopt a new sequence length. Any change sends the cursor back to the
    /// first element; returns whether that happened.
    pub fn sync_len(&mut self, len: usize) -> bool {
        if self.len == len {
            return false;
        }
        self.len = len;
        self.index = 0;
        true
    }

    pub fn next(&mut self) {
        if self.len > 0 {
            self.index = (self.index + 1) % self.len;
        }
    }

    pub fn previous(&mut self) {
        if self.len > 0 {
            self.index = (self.index + self.len - 1) % self.len;
        }
    }

    /// Navigation controls are only shown with more than one element.
    pub fn show_nav(&self) -> bool {
        self.len > 1
    }

    /// "2 / 3" style position, when controls are shown.
    pub fn counter(&self) -> Option<String> {
        self.show_nav()
            .then(|| format!("{} / {}", self.index + 1, self.len))
    }

    /// Apply a navigation key. Ignored unless controls are shown.
    pub fn handle(&mut self, key: NavKey) -> bool {
        if !self.show_nav() {
            return false;
        }
        match key {
            NavKey::Next => self.next(),
            NavKey::Previous => self.previous(),
            NavKey::Other => return false,
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    Next,
    Previous,
    Other,
}

/// Process-wide key event fan-out. Viewers subscribe while mounted.
#[derive(Debug, Clone)]
pub struct KeyBus {
    tx: broadcast::Sender<NavKey>,
}

impl KeyBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    /// Publish a key. Returns how many listeners received it.
    pub fn send(&self, key: NavKey) -> usize {
        self.tx.send(key).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NavKey> {
        self.tx.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for KeyBus {
    fn default() -> Self {
        Self::new()
    }
}

/// What the viewer currently has to show.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerState {
    /// No listing yet: the connection is not ready or nothing was fetched.
    Disabled,
    Empty,
    Showing(Slide),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Slide {
    pub index: usize,
    pub len: usize,
    pub filename: String,
    pub uploaded_at: Timestamp,
    pub mime: &'static str,
    /// Local resource for this record, once the preview has loaded.
    pub resource: Option<String>,
    pub loading: bool,
    pub preview_error: Option<String>,
    pub show_nav: bool,
}

impl Slide {
    pub fn counter(&self) -> Option<String> {
        self.show_nav
            .then(|| format!("{} / {}", self.index + 1, self.len))
    }
}

struct Current {
    generation: u64,
    records: Arc<Vec<AssetRecord>>,
}

/// Drives presentation of one cache key: keeps the cursor in step with the
/// listing, previews every record through the materializer and reacts to
/// navigation keys while attached.
///
/// Dropping the controller detaches its key listener and releases its
/// preview resources.
pub struct ViewerController {
    key: CacheKey,
    cache: Arc<RemoteCache>,
    preview: PreviewLoader,
    slideshow: Arc<Mutex<Slideshow>>,
    current: Mutex<Option<Current>>,
    load_task: Mutex<Option<JoinHandle<bool>>>,
    listener: Option<JoinHandle<()>>,
}

impl ViewerController {
    pub fn new(key: CacheKey, cache: Arc<RemoteCache>, materializer: Materializer) -> Self {
        Self {
            key,
            cache,
            preview: PreviewLoader::new(materializer),
            slideshow: Arc::new(Mutex::new(Slideshow::default())),
            current: Mutex::new(None),
            load_task: Mutex::new(None),
            listener: None,
        }
    }

    pub fn key(&self) -> CacheKey {
        self.key
    }

    pub fn cache(&self) -> &Arc<RemoteCache> {
        &self.cache
    }

    pub fn registry(&self) -> &ResourceRegistry {
        self.preview.materializer().registry()
    }

    pub fn preview(&self) -> &PreviewLoader {
        &self.preview
    }

    fn slideshow(&self) -> MutexGuard<'_, Slideshow> {
        self.slideshow.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn current(&self) -> MutexGuard<'_, Option<Current>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start listening for navigation keys. A second call replaces the
    /// previous listener.
    pub fn attach(&mut self, bus: &KeyBus) {
        self.detach();
        let mut rx = bus.subscribe();
        let slideshow = self.slideshow.clone();
        self.listener = Some(tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(key) => {
                        let mut slideshow = slideshow.lock().unwrap_or_else(|e| e.into_inner());
                        slideshow.handle(key);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "viewer key listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }));
    }

    pub fn detach(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }

    pub fn is_attached(&self) -> bool {
        self.listener.is_some()
    }

    /// Read the key through the cache. When the listing changed since the
    /// last refresh, the cursor is re-synced and a preview load is started
    /// in the background. Returns whether anything changed.
    pub async fn refresh(&self) -> Result<bool, ServiceError> {
        let Some((generation, records)) = self.fetch().await? else {
            return Ok(false);
        };

        {
            let mut current = self.current();
            if current.as_ref().is_some_and(|c| c.generation >= generation) {
                return Ok(false);
            }
            *current = Some(Current {
                generation,
                records: records.clone(),
            });
        }
        self.slideshow().sync_len(records.len());

        let load = self.preview.start(&records);
        let task = tokio::spawn(load.run());
        let previous = self
            .load_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(task);
        // The superseded load has been cancelled already; let it wind down.
        drop(previous);
        Ok(true)
    }

    /// Wait for the most recently started preview load.
    pub async fn settle(&self) {
        let task = self
            .load_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    async fn fetch(&self) -> Result<Option<(u64, Arc<Vec<AssetRecord>>)>, ServiceError> {
        match self.key {
            CacheKey::Images => Ok(self
                .cache
                .images()
                .await?
                .map(|s| (s.generation, s.data))),
            CacheKey::Document => Ok(self.cache.document().await?.map(|s| {
                let records: Vec<AssetRecord> = s.data.iter().cloned().collect();
                (s.generation, Arc::new(records))
            })),
        }
    }

    pub fn next(&self) -> bool {
        self.slideshow().handle(NavKey::Next)
    }

    pub fn previous(&self) -> bool {
        self.slideshow().handle(NavKey::Previous)
    }

    pub fn cursor(&self) -> Slideshow {
        *self.slideshow()
    }

    pub fn view(&self) -> ViewerState {
        let current = self.current();
        let Some(current) = current.as_ref() else {
            return ViewerState::Disabled;
        };
        if current.records.is_empty() {
            return ViewerState::Empty;
        }

        let cursor = *self.slideshow();
        let index = cursor.index().min(current.records.len() - 1);
        let record = &current.records[index];
        ViewerState::Showing(Slide {
            index,
            len: current.records.len(),
            filename: record.filename.clone(),
            uploaded_at: record.uploaded_at,
            mime: record.mime(),
            resource: self.preview.uri_at(index),
            loading: self.preview.is_loading(),
            preview_error: self.preview.error(),
            show_nav: cursor.show_nav(),
        })
    }
}

impl Drop for ViewerController {
    fn drop(&mut self) {
        self.detach();
        if let Some(task) = self
            .load_task
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            task.abort();
        }
        self.preview.close();
    }
}
