pub mod cache;
pub mod config;
pub mod error;
pub mod notice;
pub mod preview;
pub mod queue;
pub mod viewer;

pub use cache::{CacheKey, RemoteCache, Snapshot};
pub use config::{QueueConfig, UploadMode};
pub use error::UploadError;
pub use notice::{Notice, NoticeLevel};
pub use preview::{PreviewLoad, PreviewLoader, PreviewState};
pub use queue::{SubmitReport, UploadQueue};
pub use viewer::{KeyBus, NavKey, Slide, Slideshow, ViewerController, ViewerState};
