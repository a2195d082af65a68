use std::fmt;

use lightbox_core::MediaKind;

use crate::{SubmitReport, UploadError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A user-visible message produced at an operation boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }

    pub fn from_report(kind: MediaKind, report: &SubmitReport) -> Self {
        if report.has_failures() {
            return Self::error(format!("Upload failed: {report}"));
        }
        match (kind, report.succeeded.len()) {
            (_, 0) => Self::success("Nothing to upload."),
            (MediaKind::Document, _) => Self::success("PDF uploaded successfully."),
            (MediaKind::Image, 1) => Self::success("Image uploaded successfully."),
            (MediaKind::Image, n) => Self::success(format!("{n} images uploaded successfully.")),
        }
    }

    pub fn from_upload_error(err: &UploadError) -> Self {
        Self::error(format!("Upload failed: {err}"))
    }

    /// Outcome of a remove/clear style operation.
    pub fn from_result<E: fmt::Display>(
        result: &Result<(), E>,
        done: &str,
        action: &str,
    ) -> Self {
        match result {
            Ok(()) => Self::success(done),
            Err(e) => Self::error(format!("Failed to {action}: {e}")),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use lightbox_service::ServiceError;

    use super::*;

    #[test]
    fn report_notices() {
        let mut report = SubmitReport::default();
        assert_eq!(
            Notice::from_report(MediaKind::Image, &report).message,
            "Nothing to upload."
        );

        report.succeeded = vec!["a.png".into(), "b.png".into()];
        let notice = Notice::from_report(MediaKind::Image, &report);
        assert!(!notice.is_error());
        assert_eq!(notice.message, "2 images uploaded successfully.");

        report.failed = vec!["c.png".into()];
        let notice = Notice::from_report(MediaKind::Image, &report);
        assert!(notice.is_error());
        assert_eq!(notice.message, "Upload failed: 2 succeeded, 1 failed: c.png");
    }

    #[test]
    fn document_notice() {
        let report = SubmitReport {
            succeeded: vec!["guide.pdf".into()],
            failed: vec![],
        };
        assert_eq!(
            Notice::from_report(MediaKind::Document, &report).to_string(),
            "PDF uploaded successfully."
        );
    }

    #[test]
    fn error_notices() {
        let err = UploadError::BatchRejected {
            count: 3,
            source: ServiceError::Unavailable("down".into()),
        };
        assert_eq!(
            Notice::from_upload_error(&err).message,
            "Upload failed: batch of 3 rejected: service unavailable: down"
        );

        let failed: Result<(), ServiceError> = Err(ServiceError::NotFound("image 4".into()));
        let notice = Notice::from_result(&failed, "Image removed.", "remove image");
        assert_eq!(notice.message, "Failed to remove image: not found: image 4");
    }
}
