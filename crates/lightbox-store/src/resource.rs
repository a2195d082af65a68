use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use tracing::warn;
use uuid::Uuid;

const URI_PREFIX: &str = "blob:lightbox/";

/// An in-memory byte buffer registered under an ephemeral URI.
#[derive(Debug, Clone)]
pub struct LocalResource {
    pub bytes: Bytes,
    pub mime: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub created: u64,
    pub released: u64,
    pub live: usize,
}

#[derive(Default)]
struct RegistryInner {
    live: HashMap<Uuid, LocalResource>,
    created: u64,
    released: u64,
}

/// Table of live local resources, addressable by `blob:lightbox/<id>` URIs.
///
/// Entries are only added through [`create`](Self::create), which returns
/// the owning [`LocalResourceHandle`]; the entry lives exactly as long as
/// that handle.
#[derive(Clone, Default)]
pub struct ResourceRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("stats", &self.stats())
            .finish()
    }
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn create(&self, bytes: Bytes, mime: &str) -> LocalResourceHandle {
        let id = Uuid::new_v4();
        let len = bytes.len();
        {
            let mut inner = self.lock();
            inner.live.insert(
                id,
                LocalResource {
                    bytes,
                    mime: mime.to_string(),
                },
            );
            inner.created += 1;
        }
        LocalResourceHandle {
            id,
            uri: format!("{URI_PREFIX}{id}"),
            len,
            registry: self.clone(),
            released: false,
        }
    }

    /// Look up a live resource by URI. Released URIs resolve to `None`.
    pub fn resolve(&self, uri: &str) -> Option<LocalResource> {
        let id = uri.strip_prefix(URI_PREFIX)?.parse::<Uuid>().ok()?;
        self.lock().live.get(&id).cloned()
    }

    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    pub fn stats(&self) -> RegistryStats {
        let inner = self.lock();
        RegistryStats {
            created: inner.created,
            released: inner.released,
            live: inner.live.len(),
        }
    }

    fn release(&self, id: &Uuid) {
        let mut inner = self.lock();
        if inner.live.remove(id).is_some() {
            inner.released += 1;
        } else {
            warn!(%id, "release of unknown local resource");
        }
    }
}

/// Owning handle to a registered resource. Releasing it (explicitly, or by
/// dropping it) frees the bytes and invalidates the URI, exactly once.
pub struct LocalResourceHandle {
    id: Uuid,
    uri: String,
    len: usize,
    registry: ResourceRegistry,
    released: bool,
}

impl fmt::Debug for LocalResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalResourceHandle")
            .field("uri", &self.uri)
            .field("len", &self.len)
            .finish()
    }
}

impl LocalResourceHandle {
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.registry.release(&self.id);
        }
    }
}

impl Drop for LocalResourceHandle {
    fn drop(&mut self) {
        self.release_once();
    }
}
