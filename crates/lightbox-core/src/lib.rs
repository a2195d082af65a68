pub mod asset;
pub mod error;
pub mod file;
pub mod item;
pub mod media;
pub mod progress;

pub use asset::{StoredAsset, Timestamp};
pub use error::ValidationError;
pub use file::LocalFile;
pub use item::{ItemId, ItemState, QueuedItem};
pub use media::{mime_for_filename, MediaKind};
