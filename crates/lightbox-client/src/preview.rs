use std::sync::{Arc, Mutex, MutexGuard};

use lightbox_service::AssetRecord;
use lightbox_store::{ExternalBlob, LocalResourceHandle, MaterializedSet, Materializer};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub enum PreviewState {
    #[default]
    Idle,
    Loading,
    /// One live resource per record, in record order.
    Ready(Vec<LocalResourceHandle>),
    Failed(String),
}

struct PreviewInner {
    generation: u64,
    token: CancellationToken,
    state: PreviewState,
}

/// Keeps the local resources for the record set currently on screen.
///
/// Every [`start`](Self::start) supersedes the previous load: its token is
/// cancelled and its resources are released before the new ones are
/// committed. A load only writes its result back if it is still the newest.
#[derive(Clone)]
pub struct PreviewLoader {
    materializer: Materializer,
    inner: Arc<Mutex<PreviewInner>>,
}

/// A load that has been registered but not yet run.
pub struct PreviewLoad {
    loader: PreviewLoader,
    generation: u64,
    token: CancellationToken,
    blobs: Vec<(ExternalBlob, String)>,
}

impl PreviewLoader {
    pub fn new(materializer: Materializer) -> Self {
        Self {
            materializer,
            inner: Arc::new(Mutex::new(PreviewInner {
                generation: 0,
                token: CancellationToken::new(),
                state: PreviewState::Idle,
            })),
        }
    }

    pub fn materializer(&self) -> &Materializer {
        &self.materializer
    }

    fn lock(&self) -> MutexGuard<'_, PreviewInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Supersede whatever is loaded or loading with `records`.
    pub fn start(&self, records: &[AssetRecord]) -> PreviewLoad {
        let next = if records.is_empty() {
            PreviewState::Idle
        } else {
            PreviewState::Loading
        };
        let (generation, token, previous) = {
            let mut inner = self.lock();
            inner.token.cancel();
            inner.token = CancellationToken::new();
            inner.generation += 1;
            let previous = std::mem::replace(&mut inner.state, next);
            (inner.generation, inner.token.clone(), previous)
        };
        drop(previous);

        PreviewLoad {
            loader: self.clone(),
            generation,
            token,
            blobs: records
                .iter()
                .map(|r| (r.blob.clone(), r.mime().to_string()))
                .collect(),
        }
    }

    pub async fn load(&self, records: &[AssetRecord]) -> bool {
        self.start(records).run().await
    }

    /// Cancel any running load and release every resource.
    pub fn close(&self) {
        let previous = {
            let mut inner = self.lock();
            inner.token.cancel();
            inner.generation += 1;
            std::mem::take(&mut inner.state)
        };
        drop(previous);
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&PreviewState) -> R) -> R {
        f(&self.lock().state)
    }

    pub fn is_loading(&self) -> bool {
        self.with_state(|s| matches!(s, PreviewState::Loading))
    }

    pub fn error(&self) -> Option<String> {
        self.with_state(|s| match s {
            PreviewState::Failed(msg) => Some(msg.clone()),
            _ => None,
        })
    }

    /// URIs of the active resources, empty unless a load has completed.
    pub fn uris(&self) -> Vec<String> {
        self.with_state(|s| match s {
            PreviewState::Ready(handles) => handles.iter().map(|h| h.uri().to_string()).collect(),
            _ => Vec::new(),
        })
    }

    pub fn uri_at(&self, index: usize) -> Option<String> {
        self.with_state(|s| match s {
            PreviewState::Ready(handles) => handles.get(index).map(|h| h.uri().to_string()),
            _ => None,
        })
    }
}

impl PreviewLoad {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Materialize the records. Returns whether the result was committed;
    /// a superseded load releases what it built and leaves state alone.
    pub async fn run(self) -> bool {
        if self.blobs.is_empty() {
            return true;
        }
        let result = self
            .loader
            .materializer
            .materialize_all(&self.blobs, &self.token)
            .await;

        let mut inner = self.loader.lock();
        if inner.generation != self.generation || self.token.is_cancelled() {
            drop(inner);
            debug!(generation = self.generation, "discarding superseded preview");
            return false;
        }
        match result {
            Ok(MaterializedSet::Ready(handles)) => {
                inner.state = PreviewState::Ready(handles);
                true
            }
            Ok(MaterializedSet::Discarded) => false,
            Err(e) => {
                warn!(error = %e, "preview failed");
                inner.state = PreviewState::Failed(e.to_string());
                true
            }
        }
    }
}
