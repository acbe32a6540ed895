//! Text extraction: read the text layer of selected pages via pdfium.
//!
//! ## Why a trait?
//!
//! The pipeline only needs two facts from a document: how many pages it
//! has, and the text of page *n*. [`TextExtractor`] captures exactly that so
//! the session can be driven by pdfium in production and by an in-memory
//! page list in tests, without either side knowing about the other.
//!
//! ## Why blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and is not safe to call from async contexts. Both trait methods are
//! synchronous; the pipeline runs them inside `spawn_blocking` and receives
//! per-page results through a channel.

use crate::error::{PageError, Pdf2SpeechError};
use crate::output::PageResult;
use crate::pipeline::intake::DocumentHandle;
use crate::pipeline::postprocess;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Event emitted while pages are extracted.
#[derive(Debug, Clone)]
pub enum PageEvent {
    /// Extraction of the page is about to begin.
    Started(usize),
    /// The page finished, with text or with a [`PageError`].
    Finished(PageResult),
}

/// Source of per-page text for a staged document.
pub trait TextExtractor: Send + Sync {
    /// Number of pages in the document.
    fn page_count(&self, document: &DocumentHandle) -> Result<usize, Pdf2SpeechError>;

    /// Extract pages `first..=last` (1-indexed), reporting each through
    /// `on_page` in order.
    ///
    /// Per-page problems are reported as [`PageResult::error`] and never stop
    /// the loop. `Err` is reserved for failures that affect every page, such
    /// as a missing pdfium library or an unreadable document.
    fn extract_pages(
        &self,
        document: &DocumentHandle,
        first: usize,
        last: usize,
        on_page: &mut dyn FnMut(PageEvent),
    ) -> Result<(), Pdf2SpeechError>;
}

/// pdfium-backed extractor.
#[derive(Debug, Clone, Default)]
pub struct PdfiumExtractor {
    library: Option<PathBuf>,
    password: Option<String>,
}

impl PdfiumExtractor {
    pub fn new(library: Option<PathBuf>, password: Option<String>) -> Self {
        Self { library, password }
    }

    /// Bind to pdfium: explicit path → `PDFIUM_LIB_PATH` → working
    /// directory → system library.
    fn bind(&self) -> Result<Pdfium, Pdf2SpeechError> {
        let explicit = self
            .library
            .clone()
            .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

        let bindings = match explicit {
            Some(path) => {
                let lib = library_file(&path);
                debug!("Binding pdfium from {}", lib.display());
                Pdfium::bind_to_library(&lib)
            }
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| Pdf2SpeechError::PdfiumBindingFailed(format!("{e:?}")))?;

        Ok(Pdfium::new(bindings))
    }

    fn open<'a>(
        &self,
        pdfium: &'a Pdfium,
        document: &'a DocumentHandle,
    ) -> Result<PdfDocument<'a>, Pdf2SpeechError> {
        let password = self.password.as_deref();
        pdfium
            .load_pdf_from_byte_slice(document.bytes(), password)
            .map_err(|e| {
                let err_str = format!("{e:?}");
                let name = document.name().to_string();
                if err_str.contains("Password") || err_str.contains("password") {
                    if password.is_some() {
                        Pdf2SpeechError::WrongPassword { name }
                    } else {
                        Pdf2SpeechError::PasswordRequired { name }
                    }
                } else {
                    Pdf2SpeechError::CorruptPdf {
                        name,
                        detail: err_str,
                    }
                }
            })
    }
}

impl TextExtractor for PdfiumExtractor {
    fn page_count(&self, document: &DocumentHandle) -> Result<usize, Pdf2SpeechError> {
        let pdfium = self.bind()?;
        let doc = self.open(&pdfium, document)?;
        let total = doc.pages().len() as usize;
        info!("PDF loaded: {} pages", total);
        Ok(total)
    }

    fn extract_pages(
        &self,
        document: &DocumentHandle,
        first: usize,
        last: usize,
        on_page: &mut dyn FnMut(PageEvent),
    ) -> Result<(), Pdf2SpeechError> {
        let pdfium = self.bind()?;
        let doc = self.open(&pdfium, document)?;
        let pages = doc.pages();
        let total = pages.len() as usize;

        for page_num in first..=last {
            on_page(PageEvent::Started(page_num));
            let start = Instant::now();

            let text = if page_num == 0 || page_num > total {
                Err(PageError::OutOfRange {
                    page: page_num,
                    total,
                })
            } else {
                pages
                    .get((page_num - 1) as u16)
                    .and_then(|page| {
                        let text = page.text()?.all();
                        Ok(text)
                    })
                    .map_err(|e| PageError::ExtractFailed {
                        page: page_num,
                        detail: format!("{e:?}"),
                    })
            };

            let result = match text {
                Ok(raw) => {
                    let cleaned = postprocess::clean_page_text(&raw);
                    debug!("Page {}: {} chars of text", page_num, cleaned.len());
                    PageResult::ok(page_num, cleaned, start.elapsed())
                }
                Err(e) => {
                    warn!("{}", e);
                    PageResult::failed(page_num, e, start.elapsed())
                }
            };
            on_page(PageEvent::Finished(result));
        }

        Ok(())
    }
}

/// Resolve a directory to the platform library name inside it.
fn library_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(&path.to_path_buf())
    } else {
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_file_keeps_explicit_file() {
        let p = PathBuf::from("/opt/pdfium/libpdfium.so");
        assert_eq!(library_file(&p), p);
    }

    #[test]
    fn library_file_expands_directory() {
        let dir = tempfile::tempdir().unwrap();
        let lib = library_file(dir.path());
        assert!(lib.starts_with(dir.path()));
        assert!(lib.to_string_lossy().contains("pdfium"));
    }
}
