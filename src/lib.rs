//! # pdf2speech
//!
//! Turn a PDF into a text transcript and read it aloud with the host's
//! speech engine.
//!
//! ## Why this crate?
//!
//! Reading a long PDF out loud needs three small things done carefully:
//! accept only what is really a PDF and not too big, pull the text out of the
//! pages the user picked, and hand that text to a speech engine while showing
//! honest progress. This crate does exactly that, with one explicit session
//! object instead of scattered UI state and a progress model driven by the
//! work that actually happened.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Intake    media type + size check, page count
//!  ├─ 2. Range     clamp start/end pages
//!  ├─ 3. Extract   text layer via pdfium (spawn_blocking)      10 → 40 %
//!  ├─ 4. Speech    host engine (espeak-ng / espeak / say)      50 → 70 %
//!  └─ 5. Output    <stem>_extracted_text.txt                   100 %
//! ```
//!
//! Simulated runs skip 3–4 and tick through the same phases on a timer,
//! producing a `<stem>_audio.mp3` placeholder.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2speech::{ConverterConfig, ConverterSession, FileUpload, SilentSpeechEngine};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = ConverterSession::new(ConverterConfig::default(), Arc::new(SilentSpeechEngine));
//!     session.load_file(FileUpload::from_path("document.pdf")?).await?;
//!     session.set_end_page(10);
//!     let output = session.start_conversion().await?;
//!     output.artifact.save_to(".")?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2speech` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod events;
pub mod notify;
pub mod output;
pub mod phase;
pub mod pipeline;
pub mod progress;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionMode, ConversionSettings, ConverterConfig, ConverterConfigBuilder, PageCounting,
    VoiceGender, DEFAULT_SPEED_WPM, MAX_FILE_SIZE, MAX_SPEED_WPM, MIN_SPEED_WPM,
};
pub use convert::{convert, convert_to_dir, inspect, Extraction, PipelineRun};
pub use error::{PageError, Pdf2SpeechError};
pub use events::{BindingTable, EventKind, EventOutcome, UiEvent};
pub use notify::{Notification, NotificationCenter, NotificationKind, NotificationListener, NotificationStage};
pub use output::{Artifact, ConversionOutput, ConversionStats, DownloadSlot, PageResult};
pub use phase::PipelinePhase;
pub use pipeline::extract::{PageEvent, PdfiumExtractor, TextExtractor};
pub use pipeline::intake::{DocumentHandle, DocumentInfo, FileUpload, PDF_MEDIA_TYPE};
pub use pipeline::range::{resolve_page_range, PageRange};
pub use pipeline::speech::{
    CommandSpeechEngine, SilentSpeechEngine, SpeechEngine, SpeechEvent, Utterance, Voice,
};
pub use progress::{
    ConversionProgressCallback, NoopProgressCallback, ProgressCallback, ProgressSnapshot,
};
pub use session::{ConverterSession, SessionStatus, SpeechToggle};
