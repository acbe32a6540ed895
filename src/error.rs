//! Error types for the pdf2speech library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Pdf2SpeechError`]: **Fatal** for the operation that returned it: an
//!   upload was rejected, the PDF could not be opened, no page yielded any
//!   text, or the speech engine reported an error. None of these are fatal to
//!   the session; every path leaves the convert action available for retry.
//!
//! * [`PageError`]: **Non-fatal**: a single page failed to yield text but
//!   the remaining pages are fine. Stored inside
//!   [`crate::output::PageResult`] and logged; the run only fails when every
//!   selected page comes back empty.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2speech library.
#[derive(Debug, Error)]
pub enum Pdf2SpeechError {
    // ── Intake errors ─────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The upload does not declare itself as a PDF document.
    #[error("Please select a PDF file only. '{name}' is {media_type}.")]
    NotAPdf { name: String, media_type: String },

    /// The upload exceeds the configured size limit.
    #[error("File size exceeds {limit_display} limit. Please choose a smaller file. ('{name}' is {size_display})")]
    FileTooLarge {
        name: String,
        size: u64,
        limit: u64,
        size_display: String,
        limit_display: String,
    },

    // ── Session errors ────────────────────────────────────────────────────
    /// An operation needs a loaded document but none is staged.
    #[error("No PDF loaded. Select a PDF file first.")]
    NoDocument,

    /// A conversion is already running for this session.
    #[error("A conversion is already in progress")]
    ConversionInProgress,

    /// Playback was requested before any text was extracted.
    #[error("Nothing to speak yet. Convert a document first.")]
    NothingToSpeak,

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("Failed to load PDF '{name}': {detail}")]
    CorruptPdf { name: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{name}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { name: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{name}'")]
    WrongPassword { name: String },

    /// Every selected page came back without text.
    #[error(
        "No text found in pages {first}-{last}. \
The PDF might contain only images or be password protected."
    )]
    NoExtractableText { first: usize, last: usize },

    // ── Speech errors ─────────────────────────────────────────────────────
    /// The speech engine reported an error while speaking.
    #[error("Speech synthesis failed: {0}")]
    SynthesisFailed(String),

    /// No usable speech engine could be found on this host.
    #[error("Speech synthesis is not available: {0}\nInstall espeak-ng (Linux) or use --no-speech.")]
    SpeechUnavailable(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or binding-table validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to load PDF processing library: {0}\n\n\
You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium (file or directory).\n\
  • Install libpdfium system-wide.\n\
  • Use --estimate-pages --simulate to run without pdfium.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2SpeechError {
    /// True for errors raised by upload validation, before any state change.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Pdf2SpeechError::NotAPdf { .. } | Pdf2SpeechError::FileTooLarge { .. }
        )
    }
}

/// A non-fatal error for a single page.
///
/// Stored alongside [`crate::output::PageResult`] when a page fails.
/// Extraction continues with the next page.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// pdfium could not load the page or its text layer.
    #[error("Page {page}: text extraction failed: {detail}")]
    ExtractFailed { page: usize, detail: String },

    /// The page number lies outside the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    OutOfRange { page: usize, total: usize },
}
