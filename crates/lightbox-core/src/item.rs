use std::fmt;

use serde::{Deserialize, Serialize};

use crate::LocalFile;

/// Session-unique identity of a queued file. Never derived from list
/// position, so pruning and reordering cannot misattribute progress.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(String);

impl ItemId {
    /// Build an id from name, size, modification time and a random salt.
    /// Collision resistant enough for one UI session; not a secret.
    pub fn generate(file: &LocalFile) -> Self {
        let salt: u32 = rand::random();
        Self(format!(
            "{}-{}-{}-{salt:08x}",
            file.name,
            file.size(),
            file.modified_ms
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Pending,
    InTransfer,
    Done,
}

impl ItemState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemState::Pending => "pending",
            ItemState::InTransfer => "in_transfer",
            ItemState::Done => "done",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ItemState::Pending => "Pending",
            ItemState::InTransfer => "Uploading",
            ItemState::Done => "Done",
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// One file awaiting or undergoing transfer.
///
/// A failed transfer puts the item back to `Pending` with `last_error` set,
/// so the next submit retries it.
#[derive(Debug, Clone)]
pub struct QueuedItem {
    pub id: ItemId,
    pub file: LocalFile,
    pub state: ItemState,
    /// Percentage of the current attempt, 0.0..=100.0.
    pub progress: f64,
    pub last_error: Option<String>,
}

impl QueuedItem {
    pub fn new(file: LocalFile) -> Self {
        Self {
            id: ItemId::generate(&file),
            file,
            state: ItemState::Pending,
            progress: 0.0,
            last_error: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.file.name
    }

    pub fn is_complete(&self) -> bool {
        self.state == ItemState::Done
    }

    pub fn is_failed(&self) -> bool {
        self.state == ItemState::Pending && self.last_error.is_some()
    }

    pub fn begin_transfer(&mut self) {
        self.state = ItemState::InTransfer;
        self.progress = 0.0;
    }

    /// Record a progress report for the running attempt. Reports that would
    /// move the percentage backwards, or arrive outside a transfer, are
    /// ignored. Returns whether the visible value changed.
    pub fn record_progress(&mut self, percentage: f64) -> bool {
        if self.state != ItemState::InTransfer {
            return false;
        }
        let pct = crate::progress::clamp_percent(percentage);
        if pct > self.progress {
            self.progress = pct;
            true
        } else {
            false
        }
    }

    pub fn complete(&mut self) {
        self.state = ItemState::Done;
        self.progress = 100.0;
        self.last_error = None;
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.state = ItemState::Pending;
        self.progress = 0.0;
        self.last_error = Some(reason.into());
    }
}
