//! Configuration types for PDF-to-speech conversion.
//!
//! Two structs split the knobs by lifetime:
//!
//! * [`ConverterConfig`]: host-level behaviour fixed for the whole session
//!   (size limit, tick interval, speech fallback, extraction backend). Built
//!   via [`ConverterConfigBuilder`].
//! * [`ConversionSettings`]: the user's choices for a single run (speed,
//!   voice, page range), captured once when the run starts and never mutated
//!   afterwards.

use crate::error::Pdf2SpeechError;
use crate::pipeline::extract::TextExtractor;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Largest accepted upload: 50 MiB.
pub const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Slowest selectable speech speed, in words per minute.
pub const MIN_SPEED_WPM: u32 = 50;

/// Fastest selectable speech speed, in words per minute.
pub const MAX_SPEED_WPM: u32 = 400;

/// Speed selected before the user touches the slider.
pub const DEFAULT_SPEED_WPM: u32 = 150;

/// Configuration for a converter session.
///
/// Built via [`ConverterConfig::builder()`] or using
/// [`ConverterConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2speech::{ConversionMode, ConverterConfig};
///
/// let config = ConverterConfig::builder()
///     .mode(ConversionMode::Simulated)
///     .speech_fallback_ms(1500)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConverterConfig {
    /// How a run produces its artifact. Default: [`ConversionMode::Extract`].
    pub mode: ConversionMode,

    /// How the page count is determined at intake. Default: [`PageCounting::Parse`].
    pub page_counting: PageCounting,

    /// Largest accepted upload in bytes. Default: 50 MiB.
    pub max_file_size: u64,

    /// Assumed words per page for duration estimates. Default: 250.
    pub words_per_page: u32,

    /// Progress tick interval of the simulated pipeline in milliseconds. Default: 100.
    pub tick_interval_ms: u64,

    /// Delay after which synthesis counts as complete even without the
    /// engine's end event, in milliseconds. Default: 2000.
    ///
    /// Host engines speak in real time, so waiting for the end event of a
    /// 40-page document would block the artifact for half an hour. Playback
    /// keeps going after the fallback fires.
    pub speech_fallback_ms: u64,

    /// How long a notification stays on screen in milliseconds. Default: 4000.
    pub notification_ttl_ms: u64,

    /// Duration of the entry and exit animations in milliseconds. Default: 300.
    pub notification_animation_ms: u64,

    /// Language prefix voices must match (`lang.starts_with`). Default: "en".
    pub voice_language: String,

    /// Explicit pdfium library (file or directory). If None, checks
    /// `PDFIUM_LIB_PATH`, the working directory, then the system library.
    pub pdfium_library: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Pre-constructed text extractor. Takes precedence over the pdfium backend.
    pub extractor: Option<Arc<dyn TextExtractor>>,

    /// Receives phase, progress and per-page events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            mode: ConversionMode::default(),
            page_counting: PageCounting::default(),
            max_file_size: MAX_FILE_SIZE,
            words_per_page: 250,
            tick_interval_ms: 100,
            speech_fallback_ms: 2000,
            notification_ttl_ms: 4000,
            notification_animation_ms: 300,
            voice_language: "en".to_string(),
            pdfium_library: None,
            password: None,
            extractor: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConverterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterConfig")
            .field("mode", &self.mode)
            .field("page_counting", &self.page_counting)
            .field("max_file_size", &self.max_file_size)
            .field("words_per_page", &self.words_per_page)
            .field("tick_interval_ms", &self.tick_interval_ms)
            .field("speech_fallback_ms", &self.speech_fallback_ms)
            .field("notification_ttl_ms", &self.notification_ttl_ms)
            .field("voice_language", &self.voice_language)
            .field("pdfium_library", &self.pdfium_library)
            .field("extractor", &self.extractor.as_ref().map(|_| "<dyn TextExtractor>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConverterConfig {
    /// Create a new builder for `ConverterConfig`.
    pub fn builder() -> ConverterConfigBuilder {
        ConverterConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConverterConfig`].
#[derive(Debug)]
pub struct ConverterConfigBuilder {
    config: ConverterConfig,
}

impl ConverterConfigBuilder {
    pub fn mode(mut self, mode: ConversionMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn page_counting(mut self, counting: PageCounting) -> Self {
        self.config.page_counting = counting;
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    pub fn words_per_page(mut self, n: u32) -> Self {
        self.config.words_per_page = n.max(1);
        self
    }

    pub fn tick_interval_ms(mut self, ms: u64) -> Self {
        self.config.tick_interval_ms = ms;
        self
    }

    pub fn speech_fallback_ms(mut self, ms: u64) -> Self {
        self.config.speech_fallback_ms = ms;
        self
    }

    pub fn notification_ttl_ms(mut self, ms: u64) -> Self {
        self.config.notification_ttl_ms = ms;
        self
    }

    pub fn notification_animation_ms(mut self, ms: u64) -> Self {
        self.config.notification_animation_ms = ms;
        self
    }

    pub fn voice_language(mut self, prefix: impl Into<String>) -> Self {
        self.config.voice_language = prefix.into();
        self
    }

    pub fn pdfium_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library = Some(path.into());
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.config.extractor = Some(extractor);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConverterConfig, Pdf2SpeechError> {
        let c = &self.config;
        if c.max_file_size == 0 {
            return Err(Pdf2SpeechError::InvalidConfig(
                "max_file_size must be ≥ 1 byte".into(),
            ));
        }
        if c.tick_interval_ms == 0 {
            return Err(Pdf2SpeechError::InvalidConfig(
                "tick_interval_ms must be ≥ 1".into(),
            ));
        }
        if c.notification_ttl_ms < c.notification_animation_ms {
            return Err(Pdf2SpeechError::InvalidConfig(format!(
                "notification_ttl_ms ({}) must cover the {}ms entry animation",
                c.notification_ttl_ms, c.notification_animation_ms
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How a conversion run produces its artifact.
///
/// | Mode | Progress | Artifact |
/// |------|----------|----------|
/// | `Extract` | phase milestones driven by real page extraction and speech | `<stem>_extracted_text.txt` |
/// | `Simulated` | linear interpolation over the estimated duration | `<stem>_audio.mp3` placeholder |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConversionMode {
    /// Extract text page by page and hand it to the speech engine. (default)
    #[default]
    Extract,
    /// Tick through the phases on a timer and emit a placeholder audio file.
    Simulated,
}

/// How the page count is determined when a file is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageCounting {
    /// Open the document and read its page tree. (default)
    #[default]
    Parse,
    /// Derive a deterministic guess from the byte size (100 KiB per page).
    Estimate,
}

/// Preferred speaker gender for voice selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceGender {
    #[default]
    Male,
    Female,
}

impl VoiceGender {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceGender::Male => "male",
            VoiceGender::Female => "female",
        }
    }
}

impl fmt::Display for VoiceGender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VoiceGender {
    type Err = Pdf2SpeechError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Ok(VoiceGender::Male),
            "female" | "f" => Ok(VoiceGender::Female),
            other => Err(Pdf2SpeechError::InvalidConfig(format!(
                "voice must be 'male' or 'female', got '{other}'"
            ))),
        }
    }
}

// ── Per-run snapshot ─────────────────────────────────────────────────────

/// The user's choices for one run, captured once at conversion start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionSettings {
    /// Speech speed in words per minute (50–400).
    pub speed_wpm: u32,
    /// Preferred voice gender.
    pub voice: VoiceGender,
    /// First page to convert (1-indexed, inclusive).
    pub start_page: usize,
    /// Last page to convert (1-indexed, inclusive).
    pub end_page: usize,
    /// Page count of the whole document.
    pub total_pages: usize,
}

impl ConversionSettings {
    /// Number of pages in the selected range.
    pub fn page_count(&self) -> usize {
        self.end_page.saturating_sub(self.start_page) + 1
    }

    /// Engine speech rate, where 1.0 is the engine's normal pace (200 wpm).
    pub fn speech_rate(&self) -> f32 {
        (self.speed_wpm as f32 / 200.0).clamp(0.1, 10.0)
    }

    /// Estimated conversion time in whole seconds.
    ///
    /// `max(5, ceil(pages × words_per_page ÷ wpm × 30))`: a rough half-minute
    /// of work per minute of audio, never less than five seconds.
    pub fn estimated_duration_secs(&self, words_per_page: u32) -> u64 {
        let words = self.page_count() as u64 * words_per_page as u64;
        let wpm = self.speed_wpm.max(1) as u64;
        (words * 30).div_ceil(wpm).max(5)
    }
}

/// Clamp a requested speech speed into the selectable range.
pub fn clamp_speed(wpm: u32) -> u32 {
    wpm.clamp(MIN_SPEED_WPM, MAX_SPEED_WPM)
}
