//! File intake: validate an upload and stage it as a [`DocumentHandle`].
//!
//! Validation looks only at what the upload *declares* (media type and byte
//! size), the same facts a file picker hands over before any byte is read.
//! Nothing is loaded until both checks pass, so a rejected upload costs no
//! I/O and leaves the session untouched.

use crate::error::Pdf2SpeechError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// The only accepted media type.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Bytes per page assumed by [`estimate_page_count`].
const ESTIMATE_BYTES_PER_PAGE: u64 = 100 * 1024;

/// Where an upload's bytes live.
#[derive(Debug, Clone)]
pub enum UploadSource {
    /// Bytes already in memory.
    Memory(Arc<[u8]>),
    /// A local file, read only after validation.
    Disk(PathBuf),
}

/// A file-like object with a declared media type and size.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub name: String,
    pub media_type: String,
    pub size: u64,
    pub source: UploadSource,
}

impl FileUpload {
    /// Wrap in-memory bytes.
    pub fn from_bytes(
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        let bytes: Arc<[u8]> = bytes.into();
        Self {
            name: name.into(),
            media_type: media_type.into(),
            size: bytes.len() as u64,
            source: UploadSource::Memory(bytes),
        }
    }

    /// Describe a local file without reading its contents.
    ///
    /// The media type comes from the `%PDF` magic bytes when present, else
    /// from the extension, the way a browser file picker would label it.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Pdf2SpeechError> {
        let path = path.as_ref().to_path_buf();

        let metadata = std::fs::metadata(&path).map_err(|e| io_to_intake(e, &path))?;
        if !metadata.is_file() {
            return Err(Pdf2SpeechError::FileNotFound { path });
        }

        let magic = read_magic(&path)?;
        let media_type = media_type_for(&path, &magic).to_string();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        debug!("Described upload {} ({}, {} bytes)", name, media_type, metadata.len());
        Ok(Self {
            name,
            media_type,
            size: metadata.len(),
            source: UploadSource::Disk(path),
        })
    }

    /// Read the upload's bytes.
    pub async fn read_bytes(&self) -> Result<Arc<[u8]>, Pdf2SpeechError> {
        match &self.source {
            UploadSource::Memory(bytes) => Ok(Arc::clone(bytes)),
            UploadSource::Disk(path) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|e| io_to_intake(e, path))?;
                Ok(bytes.into())
            }
        }
    }
}

/// An accepted, staged document plus its page count.
#[derive(Debug, Clone)]
pub struct DocumentHandle {
    name: String,
    media_type: String,
    size: u64,
    bytes: Arc<[u8]>,
    page_count: usize,
}

impl DocumentHandle {
    pub fn new(name: impl Into<String>, bytes: Arc<[u8]>, page_count: usize) -> Self {
        Self {
            name: name.into(),
            media_type: PDF_MEDIA_TYPE.to_string(),
            size: bytes.len() as u64,
            bytes,
            page_count,
        }
    }

    /// Same document with a known page count.
    pub fn with_page_count(mut self, page_count: usize) -> Self {
        self.page_count = page_count;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Summary suitable for display or JSON output.
    pub fn info(&self) -> DocumentInfo {
        DocumentInfo {
            file_name: self.name.clone(),
            size_bytes: self.size,
            size_display: format_file_size(self.size),
            page_count: self.page_count,
        }
    }
}

/// Display summary of a loaded document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentInfo {
    pub file_name: String,
    pub size_bytes: u64,
    pub size_display: String,
    pub page_count: usize,
}

/// Check an upload's declared type and size.
///
/// Type is checked before size; either failure is a validation error and
/// the caller must not touch its state.
pub fn validate(upload: &FileUpload, max_size: u64) -> Result<(), Pdf2SpeechError> {
    if upload.media_type != PDF_MEDIA_TYPE {
        return Err(Pdf2SpeechError::NotAPdf {
            name: upload.name.clone(),
            media_type: if upload.media_type.is_empty() {
                "of unknown type".to_string()
            } else {
                upload.media_type.clone()
            },
        });
    }
    if upload.size > max_size {
        return Err(Pdf2SpeechError::FileTooLarge {
            name: upload.name.clone(),
            size: upload.size,
            limit: max_size,
            size_display: format_file_size(upload.size),
            limit_display: format_file_size(max_size),
        });
    }
    info!("Accepted upload {} ({})", upload.name, format_file_size(upload.size));
    Ok(())
}

/// Deterministic page-count guess from the byte size: one page per 100 KiB,
/// at least one.
pub fn estimate_page_count(size: u64) -> usize {
    (size / ESTIMATE_BYTES_PER_PAGE).max(1) as usize
}

/// Human-readable size: `0 Bytes`, `1.5 KB`, `2.4 MB`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[unit])
}

fn read_magic(path: &Path) -> Result<[u8; 4], Pdf2SpeechError> {
    use std::io::Read;
    let mut magic = [0u8; 4];
    let mut f = std::fs::File::open(path).map_err(|e| io_to_intake(e, path))?;
    // Short files simply keep the zeroed tail.
    let _ = f.read(&mut magic).map_err(|e| io_to_intake(e, path))?;
    Ok(magic)
}

fn media_type_for(path: &Path, magic: &[u8; 4]) -> &'static str {
    if magic == b"%PDF" {
        return PDF_MEDIA_TYPE;
    }
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => PDF_MEDIA_TYPE,
        "txt" => "text/plain",
        "md" => "text/markdown",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

fn io_to_intake(e: std::io::Error, path: &Path) -> Pdf2SpeechError {
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => Pdf2SpeechError::PermissionDenied {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::NotFound => Pdf2SpeechError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => Pdf2SpeechError::Internal(format!("reading '{}': {e}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_FILE_SIZE;
    use std::io::Write;

    fn upload(media_type: &str, size: u64) -> FileUpload {
        FileUpload {
            name: "doc.pdf".into(),
            media_type: media_type.into(),
            size,
            source: UploadSource::Memory(Arc::from(Vec::new())),
        }
    }

    #[test]
    fn accepts_pdf_under_limit() {
        assert!(validate(&upload(PDF_MEDIA_TYPE, 2_400_000), MAX_FILE_SIZE).is_ok());
        assert!(validate(&upload(PDF_MEDIA_TYPE, MAX_FILE_SIZE), MAX_FILE_SIZE).is_ok());
    }

    #[test]
    fn rejects_other_media_types() {
        for ty in ["text/plain", "image/png", "", "application/PDF"] {
            let err = validate(&upload(ty, 10), MAX_FILE_SIZE).unwrap_err();
            assert!(matches!(err, Pdf2SpeechError::NotAPdf { .. }), "{ty}: {err}");
        }
    }

    #[test]
    fn rejects_oversize_regardless_of_type() {
        let err = validate(&upload(PDF_MEDIA_TYPE, MAX_FILE_SIZE + 1), MAX_FILE_SIZE).unwrap_err();
        assert!(matches!(err, Pdf2SpeechError::FileTooLarge { .. }));
        let err = validate(&upload("text/plain", MAX_FILE_SIZE + 1), MAX_FILE_SIZE).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn estimates_pages_from_size() {
        assert_eq!(estimate_page_count(0), 1);
        assert_eq!(estimate_page_count(50 * 1024), 1);
        assert_eq!(estimate_page_count(2_400_000), 23);
    }

    #[test]
    fn formats_sizes() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(2_400_000), "2.29 MB");
        assert_eq!(format_file_size(MAX_FILE_SIZE), "50 MB");
    }

    #[test]
    fn from_path_sniffs_pdf_magic() {
        let mut f = tempfile::Builder::new().suffix(".bin").tempfile().unwrap();
        f.write_all(b"%PDF-1.7\n").unwrap();
        let up = FileUpload::from_path(f.path()).unwrap();
        assert_eq!(up.media_type, PDF_MEDIA_TYPE);
        assert_eq!(up.size, 9);
    }

    #[test]
    fn from_path_uses_extension_otherwise() {
        let mut f = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        f.write_all(b"hello").unwrap();
        let up = FileUpload::from_path(f.path()).unwrap();
        assert_eq!(up.media_type, "text/plain");
    }

    #[test]
    fn from_path_missing_file() {
        let err = FileUpload::from_path("/definitely/not/here.pdf").unwrap_err();
        assert!(matches!(err, Pdf2SpeechError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn reads_bytes_after_validation() {
        let up = FileUpload::from_bytes("a.pdf", PDF_MEDIA_TYPE, b"%PDF-1.4".to_vec());
        assert_eq!(up.size, 8);
        assert_eq!(&*up.read_bytes().await.unwrap(), b"%PDF-1.4");
    }
}
