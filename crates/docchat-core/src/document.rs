use anyhow::{Context, Result};
use bytes::Bytes;
use std::path::Path;

pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Media types the chat service can ingest
pub const SUPPORTED_MEDIA_TYPES: &[&str] = &[PDF_MEDIA_TYPE];

/// A document selected for the current session.
///
/// The bytes are reference counted, so cloning a `Document` for each request
/// does not copy the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub name: String,
    pub media_type: String,
    pub bytes: Bytes,
}

impl Document {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a document from disk, guessing its media type from the file name.
    ///
    /// Unsupported files are not read: the returned document has no bytes and
    /// is rejected when ingested.
    pub async fn open(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("not a file path: {}", path.display()))?;

        let media_type = guess_media_type(&name);
        if !SUPPORTED_MEDIA_TYPES.contains(&media_type) {
            return Ok(Self::new(name, media_type, Bytes::new()));
        }

        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(Self::new(name, media_type, bytes))
    }

    pub fn is_supported(&self) -> bool {
        SUPPORTED_MEDIA_TYPES.contains(&self.media_type.as_str())
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Map a file name to a media type by extension, the way a browser file picker does.
pub fn guess_media_type(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => PDF_MEDIA_TYPE,
        "txt" | "text" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}
