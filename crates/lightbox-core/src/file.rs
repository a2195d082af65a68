use std::path::Path;
use std::time::UNIX_EPOCH;

use bytes::Bytes;

use crate::ValidationError;

/// A file picked by the operator, held fully in memory until it is uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub name: String,
    pub bytes: Bytes,
    /// MIME type declared by whatever produced the file, if any.
    pub mime: Option<String>,
    /// Last-modified time in milliseconds since the epoch (0 when unknown).
    pub modified_ms: i64,
}

impl LocalFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
            mime: None,
            modified_ms: 0,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    pub fn with_modified_ms(mut self, modified_ms: i64) -> Self {
        self.modified_ms = modified_ms;
        self
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Read a file from disk. The file name (without directories) becomes
    /// the upload filename.
    pub async fn read(path: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let path = path.as_ref();
        let unreadable = |reason: String| ValidationError::Unreadable {
            path: path.display().to_string(),
            reason,
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| unreadable("not a file path".into()))?;
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| unreadable(e.to_string()))?;
        let modified_ms = tokio::fs::metadata(path)
            .await
            .ok()
            .and_then(|m| m.modified().ok())
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default();

        Ok(Self::new(name, data).with_modified_ms(modified_ms))
    }
}
