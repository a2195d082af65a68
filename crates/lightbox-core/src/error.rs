use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("unsupported file type for {kind}: {filename}")]
    UnsupportedType { filename: String, kind: &'static str },

    #[error("unreadable file {path}: {reason}")]
    Unreadable { path: String, reason: String },
}
