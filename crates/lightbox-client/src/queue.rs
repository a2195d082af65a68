use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use lightbox_core::progress::{aggregate, scale_batch_progress};
use lightbox_core::{ItemId, ItemState, LocalFile, MediaKind, QueuedItem, ValidationError};
use lightbox_service::ServiceError;
use lightbox_store::ExternalBlob;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::{QueueConfig, RemoteCache, UploadError, UploadMode};

/// Outcome of a per-item submit: names of the files that went through and
/// of those that were put back to pending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

impl SubmitReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.succeeded.is_empty() && self.failed.is_empty()
    }
}

impl fmt::Display for SubmitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.failed.is_empty() {
            write!(f, "{} succeeded", self.succeeded.len())
        } else {
            write!(
                f,
                "{} succeeded, {} failed: {}",
                self.succeeded.len(),
                self.failed.len(),
                self.failed.join(", ")
            )
        }
    }
}

#[derive(Default)]
struct QueueState {
    order: Vec<ItemId>,
    items: HashMap<ItemId, QueuedItem>,
    /// Bumped on every visible change.
    version: u64,
    /// Scaled progress of the running atomic batch.
    batch_progress: Option<f64>,
    /// Items taken by the latest submit, and those of them with an outcome.
    round: Vec<ItemId>,
    settled: HashSet<ItemId>,
}

impl QueueState {
    fn touch(&mut self) {
        self.version += 1;
    }

    fn remove(&mut self, id: &ItemId) -> Option<QueuedItem> {
        let item = self.items.remove(id)?;
        self.order.retain(|other| other != id);
        self.touch();
        Some(item)
    }

    fn start_round(&mut self, ids: &[ItemId]) {
        if ids.is_empty() {
            return;
        }
        self.round = ids.to_vec();
        self.settled.clear();
    }

    fn settle(&mut self, id: &ItemId) {
        self.settled.insert(id.clone());
        self.touch();
    }

    /// Mean over the latest submit's items. Waiting items count as 0 and
    /// items with an outcome as 100, so the figure only moves forward.
    fn round_progress(&self) -> f64 {
        aggregate(self.round.iter().filter_map(|id| {
            if self.settled.contains(id) {
                return Some(100.0);
            }
            let item = self.items.get(id)?;
            Some(match item.state {
                ItemState::InTransfer => item.progress,
                _ => 0.0,
            })
        }))
    }

    fn ids_in(&self, pred: impl Fn(&QueuedItem) -> bool) -> Vec<ItemId> {
        self.order
            .iter()
            .filter(|id| self.items.get(*id).is_some_and(&pred))
            .cloned()
            .collect()
    }
}

/// Clears the submitting flag on every exit path.
struct SubmitGuard<'a>(&'a AtomicBool);

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Files waiting to go to one collaborator slot, with their transfer state.
///
/// Items are keyed by [`ItemId`] and exposed in insertion order. Finished
/// items are pruned after `prune_delay`; the timers are owned by the queue
/// and aborted when it is dropped.
pub struct UploadQueue {
    kind: MediaKind,
    config: QueueConfig,
    cache: Arc<RemoteCache>,
    state: Arc<Mutex<QueueState>>,
    pruners: Mutex<JoinSet<()>>,
    submitting: AtomicBool,
}

impl UploadQueue {
    pub fn new(kind: MediaKind, cache: Arc<RemoteCache>, config: QueueConfig) -> Self {
        Self {
            kind,
            config,
            cache,
            state: Arc::new(Mutex::new(QueueState::default())),
            pruners: Mutex::new(JoinSet::new()),
            submitting: AtomicBool::new(false),
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        lock_state(&self.state)
    }

    /// Add the files this queue accepts, in order; others are dropped with a
    /// debug log. A document queue keeps only the newest pending file.
    /// Returns how many files were queued.
    pub fn enqueue(&self, files: impl IntoIterator<Item = LocalFile>) -> usize {
        let mut accepted: Vec<QueuedItem> = files
            .into_iter()
            .filter(|file| {
                let ok = self.kind.accepts(&file.name, file.mime.as_deref());
                if !ok {
                    let err = ValidationError::UnsupportedType {
                        filename: file.name.clone(),
                        kind: self.kind.display_name(),
                    };
                    debug!(error = %err, "skipping file");
                }
                ok
            })
            .map(QueuedItem::new)
            .collect();

        if self.kind == MediaKind::Document {
            if let Some(last) = accepted.pop() {
                accepted = vec![last];
            }
        }
        if accepted.is_empty() {
            return 0;
        }

        let count = accepted.len();
        let mut state = self.lock();
        if self.kind == MediaKind::Document {
            for id in state.ids_in(|item| item.state == ItemState::Pending) {
                state.remove(&id);
            }
        }
        for item in accepted {
            state.order.push(item.id.clone());
            state.items.insert(item.id.clone(), item);
        }
        state.touch();
        count
    }

    /// Drop a pending item. Items in transfer or done stay.
    pub fn remove(&self, id: &ItemId) -> bool {
        let mut state = self.lock();
        match state.items.get(id) {
            Some(item) if item.state == ItemState::Pending => state.remove(id).is_some(),
            _ => false,
        }
    }

    pub fn items(&self) -> Vec<QueuedItem> {
        let state = self.lock();
        state
            .order
            .iter()
            .filter_map(|id| state.items.get(id).cloned())
            .collect()
    }

    pub fn get(&self, id: &ItemId) -> Option<QueuedItem> {
        self.lock().items.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending_count(&self) -> usize {
        self.lock()
            .items
            .values()
            .filter(|item| item.state == ItemState::Pending)
            .count()
    }

    pub fn version(&self) -> u64 {
        self.lock().version
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::SeqCst)
    }

    /// Overall progress of the latest submit: the scaled batch figure while
    /// an atomic submit runs, otherwise the mean over the submit's items.
    /// Items finished by earlier submits do not count.
    pub fn aggregate_progress(&self) -> f64 {
        let state = self.lock();
        match state.batch_progress {
            Some(batch) => batch,
            None => state.round_progress(),
        }
    }

    /// Upload every pending item. Per-item mode (and any document queue)
    /// reports per-file outcomes; atomic mode either commits the whole set
    /// or returns [`UploadError::BatchRejected`].
    pub async fn submit(&self) -> Result<SubmitReport, UploadError> {
        if self
            .submitting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(UploadError::Busy);
        }
        let _guard = SubmitGuard(&self.submitting);

        match (self.kind, self.config.mode) {
            (MediaKind::Image, UploadMode::Atomic) => self.submit_batch().await,
            _ => Ok(self.submit_each().await),
        }
    }

    async fn submit_each(&self) -> SubmitReport {
        let ids = {
            let mut state = self.lock();
            let ids = state.ids_in(|item| item.state == ItemState::Pending);
            state.start_round(&ids);
            ids
        };
        let mut report = SubmitReport::default();

        for id in ids {
            let Some(file) = self.begin(&id) else {
                continue;
            };
            info!(kind = %self.kind, file = %file.name, "uploading");

            let blob = ExternalBlob::from_bytes(file.bytes.clone())
                .with_chunk_size(self.config.chunk_size)
                .with_upload_progress(item_progress(self.state.clone(), id.clone()));
            let result = match self.kind {
                MediaKind::Image => self.cache.add_image(blob, &file.name).await,
                MediaKind::Document => self.cache.set_document(blob, &file.name).await,
            };

            match result {
                Ok(()) => {
                    info!(file = %file.name, "upload complete");
                    self.finish(&id);
                    report.succeeded.push(file.name);
                }
                Err(e) => {
                    warn!(file = %file.name, error = %e, "upload failed");
                    self.fail(&id, &e);
                    report.failed.push(file.name);
                }
            }
        }
        report
    }

    async fn submit_batch(&self) -> Result<SubmitReport, UploadError> {
        let (ids, files) = {
            let mut state = self.lock();
            let ids = state.ids_in(|item| item.state != ItemState::Done);
            let mut files = Vec::with_capacity(ids.len());
            for id in &ids {
                if let Some(item) = state.items.get_mut(id) {
                    item.begin_transfer();
                    files.push(item.file.clone());
                }
            }
            if !ids.is_empty() {
                state.batch_progress = Some(0.0);
            }
            state.start_round(&ids);
            state.touch();
            (ids, files)
        };
        if ids.is_empty() {
            return Ok(SubmitReport::default());
        }

        let total = ids.len();
        let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        let blobs = files
            .into_iter()
            .zip(&ids)
            .enumerate()
            .map(|(index, (file, id))| {
                ExternalBlob::from_bytes(file.bytes)
                    .with_chunk_size(self.config.chunk_size)
                    .with_upload_progress(batch_progress(
                        self.state.clone(),
                        id.clone(),
                        index,
                        total,
                    ))
            })
            .collect();
        info!(count = total, "uploading batch");

        match self.cache.set_images(blobs, names.clone()).await {
            Ok(()) => {
                info!(count = total, "batch committed");
                lock_state(&self.state).batch_progress = None;
                for id in &ids {
                    self.finish(id);
                }
                Ok(SubmitReport {
                    succeeded: names,
                    failed: Vec::new(),
                })
            }
            Err(source) => {
                warn!(count = total, error = %source, "batch rejected");
                lock_state(&self.state).batch_progress = None;
                for id in &ids {
                    self.fail(id, &source);
                }
                Err(UploadError::BatchRejected {
                    count: total,
                    source,
                })
            }
        }
    }

    fn begin(&self, id: &ItemId) -> Option<LocalFile> {
        let mut state = self.lock();
        let item = state.items.get_mut(id)?;
        if item.state != ItemState::Pending {
            return None;
        }
        item.begin_transfer();
        let file = item.file.clone();
        state.touch();
        Some(file)
    }

    fn finish(&self, id: &ItemId) {
        {
            let mut state = self.lock();
            if let Some(item) = state.items.get_mut(id) {
                item.complete();
            }
            state.settle(id);
        }
        self.schedule_prune(id.clone());
    }

    fn fail(&self, id: &ItemId, err: &ServiceError) {
        let mut state = self.lock();
        if let Some(item) = state.items.get_mut(id) {
            item.fail(err.to_string());
        }
        state.settle(id);
    }

    fn schedule_prune(&self, id: ItemId) {
        let state = self.state.clone();
        let delay = self.config.prune_delay;
        let mut pruners = self.pruners.lock().unwrap_or_else(|e| e.into_inner());
        while pruners.try_join_next().is_some() {}
        pruners.spawn(async move {
            tokio::time::sleep(delay).await;
            let mut state = lock_state(&state);
            if state.items.get(&id).is_some_and(QueuedItem::is_complete) {
                state.remove(&id);
            }
        });
    }
}

fn lock_state(state: &Mutex<QueueState>) -> MutexGuard<'_, QueueState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Progress callback bound to a single item. It can only ever write to the
/// item it was created for.
fn item_progress(
    state: Arc<Mutex<QueueState>>,
    id: ItemId,
) -> impl Fn(f64) + Send + Sync + 'static {
    move |pct| {
        let mut state = lock_state(&state);
        let changed = state
            .items
            .get_mut(&id)
            .is_some_and(|item| item.record_progress(pct));
        if changed {
            state.touch();
        }
    }
}

/// Progress callback for item `index` of an atomic batch: records the item's
/// own figure and advances the scaled batch figure.
fn batch_progress(
    state: Arc<Mutex<QueueState>>,
    id: ItemId,
    index: usize,
    total: usize,
) -> impl Fn(f64) + Send + Sync + 'static {
    move |pct| {
        let mut state = lock_state(&state);
        if let Some(item) = state.items.get_mut(&id) {
            item.record_progress(pct);
        }
        if let Some(scaled) = scale_batch_progress(index, total, pct) {
            if state.batch_progress.is_some_and(|current| scaled > current) {
                state.batch_progress = Some(scaled);
            }
        }
        state.touch();
    }
}
