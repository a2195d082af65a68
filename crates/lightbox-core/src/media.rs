use std::fmt;

use serde::{Deserialize, Serialize};

/// Fallback type for extensions we don't recognize. Renderers sniff image
/// bytes anyway, so a generic image type is more useful than failing.
pub const DEFAULT_MIME: &str = "image/jpeg";

pub const DOCUMENT_MIME: &str = "application/pdf";

const IMAGE_EXTENSIONS: &[&str] = &["png", "gif", "webp", "jpg", "jpeg", "bmp", "svg", "avif"];

/// Which remote slot a file is destined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Document,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Document => "document",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            MediaKind::Image => "Image",
            MediaKind::Document => "PDF",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "image" => Some(MediaKind::Image),
            "document" => Some(MediaKind::Document),
            _ => None,
        }
    }

    /// Whether a file belongs in this slot. A declared MIME type wins over
    /// the filename extension when present.
    pub fn accepts(&self, filename: &str, declared_mime: Option<&str>) -> bool {
        let declared = declared_mime.map(str::trim).filter(|m| !m.is_empty());
        match (self, declared) {
            (MediaKind::Image, Some(mime)) => mime.starts_with("image/"),
            (MediaKind::Document, Some(mime)) => mime == DOCUMENT_MIME,
            (MediaKind::Image, None) => IMAGE_EXTENSIONS.contains(&extension(filename).as_str()),
            (MediaKind::Document, None) => extension(filename) == "pdf",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

fn extension(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Infer a MIME type from a filename extension.
pub fn mime_for_filename(filename: &str) -> &'static str {
    match extension(filename).as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "jpg" | "jpeg" => "image/jpeg",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "avif" => "image/avif",
        "pdf" => DOCUMENT_MIME,
        _ => DEFAULT_MIME,
    }
}
