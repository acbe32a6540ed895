//! Output types: per-page results, the downloadable artifact, run stats.

use crate::config::{ConversionMode, ConversionSettings};
use crate::error::{PageError, Pdf2SpeechError};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Outcome of extracting one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageResult {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Cleaned page text; empty when the page has no text layer or failed.
    pub text: String,
    pub duration_ms: u64,
    pub error: Option<PageError>,
}

impl PageResult {
    pub fn ok(page_num: usize, text: String, elapsed: Duration) -> Self {
        Self {
            page_num,
            text,
            duration_ms: elapsed.as_millis() as u64,
            error: None,
        }
    }

    pub fn failed(page_num: usize, error: PageError, elapsed: Duration) -> Self {
        Self {
            page_num,
            text: String::new(),
            duration_ms: elapsed.as_millis() as u64,
            error: Some(error),
        }
    }

    /// True when the page produced non-blank text.
    pub fn has_text(&self) -> bool {
        self.error.is_none() && !self.text.trim().is_empty()
    }
}

/// The downloadable output of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    /// Suggested download name, e.g. `report_extracted_text.txt`.
    pub file_name: String,
    /// `text/plain` or `audio/mpeg`.
    pub media_type: String,
    /// Name of the PDF the artifact was produced from.
    pub source_name: String,
    pub settings: ConversionSettings,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub contents: Vec<u8>,
}

impl Artifact {
    /// Placeholder audio artifact: a text body *describing* the audio that
    /// would have been produced.
    pub fn simulated_audio(
        source_name: &str,
        settings: &ConversionSettings,
        created_at: DateTime<Utc>,
    ) -> Self {
        let body = format!(
            "Simulated MP3 Audio File\n\
             Converted from: {source_name}\n\
             Speed: {} WPM, Voice: {}\n\
             Pages: {}-{} of {}\n\
             Generated: {}\n",
            settings.speed_wpm,
            settings.voice,
            settings.start_page,
            settings.end_page,
            settings.total_pages,
            timestamp(&created_at),
        );
        Self {
            file_name: format!("{}_audio.mp3", file_stem(source_name)),
            media_type: "audio/mpeg".to_string(),
            source_name: source_name.to_string(),
            settings: settings.clone(),
            created_at,
            contents: body.into_bytes(),
        }
    }

    /// Transcript artifact: a metadata header followed by the extracted text.
    pub fn extracted_text(
        source_name: &str,
        settings: &ConversionSettings,
        text: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        let body = format!(
            "PDF to Audio Converter - Extracted Text\n\
             Original file: {source_name}\n\
             Pages: {}-{} of {}\n\
             Speech speed: {} words per minute\n\
             Voice: {}\n\
             Extraction date: {}\n\
             \n{}\n\n{text}",
            settings.start_page,
            settings.end_page,
            settings.total_pages,
            settings.speed_wpm,
            settings.voice,
            timestamp(&created_at),
            "=".repeat(50),
        );
        Self {
            file_name: format!("{}_extracted_text.txt", file_stem(source_name)),
            media_type: "text/plain".to_string(),
            source_name: source_name.to_string(),
            settings: settings.clone(),
            created_at,
            contents: body.into_bytes(),
        }
    }

    /// Which kind of run produced this artifact.
    pub fn mode(&self) -> ConversionMode {
        if self.media_type == "audio/mpeg" {
            ConversionMode::Simulated
        } else {
            ConversionMode::Extract
        }
    }

    /// Write the artifact into `dir` under its file name.
    ///
    /// Uses a temp file in the same directory and an atomic rename so a
    /// crash never leaves a half-written file behind.
    pub fn save_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf, Pdf2SpeechError> {
        let dir = dir.as_ref();
        let path = dir.join(&self.file_name);
        let write_err = |source: std::io::Error| Pdf2SpeechError::OutputWriteFailed {
            path: path.clone(),
            source,
        };

        std::fs::create_dir_all(dir).map_err(write_err)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(&self.contents).map_err(write_err)?;
        tmp.persist(&path).map_err(|e| write_err(e.error))?;

        info!("Wrote {} ({} bytes)", path.display(), self.contents.len());
        Ok(path)
    }
}

/// Holds the latest artifact until it is collected, exactly once.
#[derive(Debug, Default)]
pub struct DownloadSlot {
    artifact: Option<Artifact>,
}

impl DownloadSlot {
    /// Replace whatever is staged with `artifact`.
    pub fn offer(&mut self, artifact: Artifact) {
        self.artifact = Some(artifact);
    }

    /// Collect the staged artifact; later calls return `None`.
    pub fn take(&mut self) -> Option<Artifact> {
        self.artifact.take()
    }

    pub fn peek(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    pub fn clear(&mut self) {
        self.artifact = None;
    }
}

/// Aggregate statistics for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionStats {
    /// Pages selected for the run.
    pub selected_pages: usize,
    /// Selected pages that produced text.
    pub pages_with_text: usize,
    /// Selected pages that failed outright.
    pub failed_pages: usize,
    pub word_count: usize,
    pub estimated_duration_secs: u64,
    pub extraction_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything a successful run produced.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    pub artifact: Artifact,
    /// Concatenated page text; `None` for simulated runs.
    pub extracted_text: Option<String>,
    pub pages: Vec<PageResult>,
    pub stats: ConversionStats,
}

/// File name with a trailing `.pdf` (any case) removed.
pub fn file_stem(name: &str) -> &str {
    let len = name.len();
    if len > 4 && name.is_char_boundary(len - 4) && name[len - 4..].eq_ignore_ascii_case(".pdf") {
        &name[..len - 4]
    } else {
        name
    }
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
