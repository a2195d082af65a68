use lightbox_service::ServiceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("an upload is already running")]
    Busy,

    /// Atomic mode: the collaborator rejected the replace call and nothing
    /// was committed.
    #[error("batch of {count} rejected: {source}")]
    BatchRejected { count: usize, source: ServiceError },
}
