use std::fmt;
use std::time::Duration;

use lightbox_store::DEFAULT_CHUNK_SIZE;

/// How a multi-file image submit reaches the collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadMode {
    /// One add call per file; failures are isolated to their item.
    #[default]
    PerItem,
    /// One replace call for the whole ordered set; all or nothing.
    Atomic,
}

impl UploadMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadMode::PerItem => "per-item",
            UploadMode::Atomic => "atomic",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            UploadMode::PerItem => "Per item",
            UploadMode::Atomic => "Atomic batch",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "per-item" | "per_item" => Some(UploadMode::PerItem),
            "atomic" => Some(UploadMode::Atomic),
            _ => None,
        }
    }
}

impl fmt::Display for UploadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// How long a finished item stays visible before it is pruned.
    pub prune_delay: Duration,
    /// Upload body chunk size; sets the granularity of progress reports.
    pub chunk_size: usize,
    pub mode: UploadMode,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            prune_delay: Duration::from_millis(1500),
            chunk_size: DEFAULT_CHUNK_SIZE,
            mode: UploadMode::default(),
        }
    }
}
