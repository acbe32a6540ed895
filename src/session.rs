//! The converter session: one document, one set of form fields, one run at
//! a time.
//!
//! ## Why a session object?
//!
//! Every piece of user-visible state (the staged document, the speed, voice
//! and page fields, the current phase and progress, the extracted text and
//! the pending download) lives here and nowhere else. Handlers receive the
//! session by reference, so two sessions never share anything and tests can
//! build as many as they like.
//!
//! All methods take `&self`. State sits behind a mutex that is only held for
//! short, non-async sections, and the single-active-run rule is an atomic
//! claim. A session can therefore be shared (`Arc<ConverterSession>`) between
//! a running conversion and the handlers that keep reacting to input.

use crate::config::{
    clamp_speed, ConversionMode, ConversionSettings, ConverterConfig, VoiceGender,
    DEFAULT_SPEED_WPM,
};
use crate::convert::{self, PipelineRun};
use crate::error::Pdf2SpeechError;
use crate::notify::{NotificationCenter, NotificationListener};
use crate::output::{Artifact, ConversionOutput, DownloadSlot};
use crate::phase::PipelinePhase;
use crate::pipeline::extract::TextExtractor;
use crate::pipeline::intake::{self, DocumentHandle, DocumentInfo, FileUpload};
use crate::pipeline::range::{resolve_page_range, PageRange};
use crate::pipeline::speech::{self, SpeechEngine, SpeechEvent};
use crate::progress::{ConversionProgressCallback, ProgressCallback, ProgressSnapshot};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Debug)]
struct SessionState {
    document: Option<DocumentHandle>,
    speed_wpm: u32,
    voice: VoiceGender,
    start_page: usize,
    end_page: usize,
    phase: PipelinePhase,
    status: String,
    progress: ProgressSnapshot,
    extracted_text: Option<String>,
    last_settings: Option<ConversionSettings>,
    download: DownloadSlot,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            document: None,
            speed_wpm: DEFAULT_SPEED_WPM,
            voice: VoiceGender::default(),
            start_page: 1,
            end_page: 1,
            phase: PipelinePhase::Idle,
            status: PipelinePhase::Idle.status_text().to_string(),
            progress: ProgressSnapshot {
                percent: 0.0,
                remaining_secs: 0,
            },
            extracted_text: None,
            last_settings: None,
            download: DownloadSlot::default(),
        }
    }
}

impl SessionState {
    fn total_pages(&self) -> usize {
        self.document.as_ref().map_or(0, |d| d.page_count())
    }

    fn clear_run(&mut self) {
        self.phase = PipelinePhase::Idle;
        self.status = PipelinePhase::Idle.status_text().to_string();
        self.progress = ProgressSnapshot {
            percent: 0.0,
            remaining_secs: 0,
        };
        self.download.clear();
    }
}

/// Read-only view of a session for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub document: Option<DocumentInfo>,
    pub speed_wpm: u32,
    pub voice: VoiceGender,
    pub page_range: PageRange,
    pub phase: PipelinePhase,
    pub status: String,
    pub progress: ProgressSnapshot,
    pub converting: bool,
    pub has_text: bool,
    pub has_artifact: bool,
    pub speaking: bool,
}

/// Result of [`ConverterSession::toggle_speech`].
#[derive(Debug)]
pub enum SpeechToggle {
    /// Playback began; events for the utterance arrive on the channel.
    Started(mpsc::UnboundedReceiver<SpeechEvent>),
    /// Playback in progress was cancelled.
    Stopped,
}

/// Held while a run, an upload or a reset owns the session; releases the
/// claim on drop.
struct RunClaim(Arc<AtomicBool>);

impl RunClaim {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for RunClaim {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Mirrors run events into the session state, then forwards them to the
/// caller's callback.
struct SessionObserver {
    state: Arc<Mutex<SessionState>>,
    inner: Option<ProgressCallback>,
}

impl ConversionProgressCallback for SessionObserver {
    fn on_conversion_start(&self, settings: &ConversionSettings, estimated_secs: u64) {
        if let Some(cb) = &self.inner {
            cb.on_conversion_start(settings, estimated_secs);
        }
    }

    fn on_phase_change(&self, phase: PipelinePhase, status: &str) {
        {
            let mut st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            st.phase = phase;
            st.status = status.to_string();
        }
        if let Some(cb) = &self.inner {
            cb.on_phase_change(phase, status);
        }
    }

    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .progress = *snapshot;
        if let Some(cb) = &self.inner {
            cb.on_progress(snapshot);
        }
    }

    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        if let Some(cb) = &self.inner {
            cb.on_page_start(page_num, total_pages);
        }
    }

    fn on_page_complete(&self, page_num: usize, total_pages: usize, text_len: usize) {
        if let Some(cb) = &self.inner {
            cb.on_page_complete(page_num, total_pages, text_len);
        }
    }

    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        if let Some(cb) = &self.inner {
            cb.on_page_error(page_num, total_pages, error);
        }
    }

    fn on_conversion_complete(&self, phase: PipelinePhase, pages_with_text: usize) {
        if let Some(cb) = &self.inner {
            cb.on_conversion_complete(phase, pages_with_text);
        }
    }
}

/// A single user's converter.
pub struct ConverterSession {
    config: ConverterConfig,
    extractor: Arc<dyn TextExtractor>,
    engine: Arc<dyn SpeechEngine>,
    state: Arc<Mutex<SessionState>>,
    active: Arc<AtomicBool>,
    notifications: NotificationCenter,
}

impl std::fmt::Debug for ConverterSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterSession")
            .field("config", &self.config)
            .field("active", &self.active.load(Ordering::Acquire))
            .field("notifications", &self.notifications)
            .finish_non_exhaustive()
    }
}

impl ConverterSession {
    pub fn new(config: ConverterConfig, engine: Arc<dyn SpeechEngine>) -> Self {
        let notifications = NotificationCenter::new(
            Duration::from_millis(config.notification_ttl_ms),
            Duration::from_millis(config.notification_animation_ms),
        );
        Self {
            extractor: convert::resolve_extractor(&config),
            config,
            engine,
            state: Arc::new(Mutex::new(SessionState::default())),
            active: Arc::new(AtomicBool::new(false)),
            notifications,
        }
    }

    /// Route notifications to `listener` as they are pushed.
    pub fn with_notification_listener(mut self, listener: Arc<dyn NotificationListener>) -> Self {
        self.notifications.set_listener(listener);
        self
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Intake ───────────────────────────────────────────────────────────

    /// Validate and stage `upload`, replacing any previous document.
    ///
    /// Rejected uploads and unreadable documents leave the session exactly
    /// as it was. On success the page range becomes the whole document.
    pub async fn load_file(&self, upload: FileUpload) -> Result<DocumentInfo, Pdf2SpeechError> {
        let result = self.stage(upload).await;
        match &result {
            Ok(info) => {
                self.notifications
                    .success("PDF file uploaded and analyzed successfully!");
                info!("Loaded {} ({} pages)", info.file_name, info.page_count);
            }
            Err(e) => {
                let message = if e.is_validation() {
                    e.to_string()
                } else {
                    format!("Error processing PDF file: {e}")
                };
                self.notifications.error(message);
            }
        }
        result
    }

    async fn stage(&self, upload: FileUpload) -> Result<DocumentInfo, Pdf2SpeechError> {
        // Held until the new document is in place so no run can start on
        // the old one in between.
        let _claim = RunClaim::acquire(&self.active).ok_or(Pdf2SpeechError::ConversionInProgress)?;
        intake::validate(&upload, self.config.max_file_size)?;

        let bytes = upload.read_bytes().await?;
        let document = DocumentHandle::new(upload.name, bytes, 0);
        let total = convert::count_pages(&document, &self.config, &self.extractor).await?;
        let document = document.with_page_count(total);
        let info = document.info();

        if self.engine.is_speaking() {
            self.engine.cancel();
        }
        let mut st = self.lock();
        st.clear_run();
        st.document = Some(document);
        st.start_page = 1;
        st.end_page = total.max(1);
        st.extracted_text = None;
        st.last_settings = None;
        Ok(info)
    }

    // ── Settings fields ──────────────────────────────────────────────────

    /// Set the speech speed, clamped to 50–400 wpm. Returns the stored value.
    pub fn set_speed(&self, wpm: u32) -> u32 {
        let wpm = clamp_speed(wpm);
        self.lock().speed_wpm = wpm;
        wpm
    }

    pub fn set_voice(&self, voice: VoiceGender) {
        self.lock().voice = voice;
    }

    /// Edit the start field and re-resolve the range.
    pub fn set_start_page(&self, start: i64) -> PageRange {
        let mut st = self.lock();
        let range = resolve_page_range(start, st.end_page as i64, st.total_pages());
        (st.start_page, st.end_page) = (range.start, range.end);
        debug!("Page range {}-{}", range.start, range.end);
        range
    }

    /// Edit the end field and re-resolve the range.
    pub fn set_end_page(&self, end: i64) -> PageRange {
        let mut st = self.lock();
        let range = resolve_page_range(st.start_page as i64, end, st.total_pages());
        (st.start_page, st.end_page) = (range.start, range.end);
        debug!("Page range {}-{}", range.start, range.end);
        range
    }

    pub fn page_range(&self) -> PageRange {
        let st = self.lock();
        PageRange {
            start: st.start_page,
            end: st.end_page,
        }
    }

    /// Snapshot of the current fields, as a run would capture them.
    pub fn settings(&self) -> Result<ConversionSettings, Pdf2SpeechError> {
        let st = self.lock();
        let total = st
            .document
            .as_ref()
            .map(|d| d.page_count())
            .ok_or(Pdf2SpeechError::NoDocument)?;
        Ok(ConversionSettings {
            speed_wpm: st.speed_wpm,
            voice: st.voice,
            start_page: st.start_page,
            end_page: st.end_page,
            total_pages: total,
        })
    }

    // ── Status ───────────────────────────────────────────────────────────

    /// True while a run holds the session. Uploads and resets hold it
    /// briefly too.
    pub fn is_converting(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// A document is staged and no run is active.
    pub fn can_convert(&self) -> bool {
        !self.is_converting() && self.lock().document.is_some()
    }

    pub fn phase(&self) -> PipelinePhase {
        self.lock().phase
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.lock().progress
    }

    pub fn document(&self) -> Option<DocumentInfo> {
        self.lock().document.as_ref().map(DocumentHandle::info)
    }

    pub fn extracted_text(&self) -> Option<String> {
        self.lock().extracted_text.clone()
    }

    pub fn status(&self) -> SessionStatus {
        let speaking = self.engine.is_speaking();
        let converting = self.is_converting();
        let st = self.lock();
        SessionStatus {
            document: st.document.as_ref().map(DocumentHandle::info),
            speed_wpm: st.speed_wpm,
            voice: st.voice,
            page_range: PageRange {
                start: st.start_page,
                end: st.end_page,
            },
            phase: st.phase,
            status: st.status.clone(),
            progress: st.progress,
            converting,
            has_text: st.extracted_text.is_some(),
            has_artifact: st.download.peek().is_some(),
            speaking,
        }
    }

    // ── Conversion ───────────────────────────────────────────────────────

    /// Run one conversion with the current fields.
    ///
    /// Fails with [`Pdf2SpeechError::ConversionInProgress`] while another
    /// run is active; that run is not affected. On success the artifact is
    /// also staged for [`Self::take_artifact`].
    pub async fn start_conversion(&self) -> Result<ConversionOutput, Pdf2SpeechError> {
        let _claim = RunClaim::acquire(&self.active).ok_or(Pdf2SpeechError::ConversionInProgress)?;

        let (document, settings) = {
            let mut st = self.lock();
            let document = st.document.clone().ok_or(Pdf2SpeechError::NoDocument)?;
            let settings = ConversionSettings {
                speed_wpm: st.speed_wpm,
                voice: st.voice,
                start_page: st.start_page,
                end_page: st.end_page,
                total_pages: document.page_count(),
            };
            st.clear_run();
            st.last_settings = Some(settings.clone());
            (document, settings)
        };

        let observer: ProgressCallback = Arc::new(SessionObserver {
            state: Arc::clone(&self.state),
            inner: self.config.progress_callback.clone(),
        });
        let mut run = PipelineRun::start(settings, &self.config, observer)?;

        match self.drive(&mut run, &document).await {
            Ok(output) => {
                self.lock().download.offer(output.artifact.clone());
                self.notifications.success(format!(
                    "Conversion complete! {} is ready to download.",
                    output.artifact.file_name
                ));
                Ok(output)
            }
            Err(e) => {
                run.fail(&e);
                self.notifications.error(format!("Conversion failed: {e}"));
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        run: &mut PipelineRun,
        document: &DocumentHandle,
    ) -> Result<ConversionOutput, Pdf2SpeechError> {
        match self.config.mode {
            ConversionMode::Simulated => {
                run.simulate(&self.config).await?;
                run.finish(document.name(), None)
            }
            ConversionMode::Extract => {
                let extraction = run.extract(document, Arc::clone(&self.extractor)).await?;
                // Kept even if synthesis fails below.
                self.lock().extracted_text = Some(extraction.text.clone());
                run.synthesize(&extraction.text, self.engine.as_ref(), &self.config)
                    .await?;
                run.finish(document.name(), Some(extraction))
            }
        }
    }

    /// Collect the artifact of the last successful run. Yields it once.
    pub fn take_artifact(&self) -> Option<Artifact> {
        self.lock().download.take()
    }

    // ── Playback ─────────────────────────────────────────────────────────

    /// Stop playback if the engine is speaking, otherwise read the extracted
    /// text aloud with the last run's settings.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn toggle_speech(&self) -> Result<SpeechToggle, Pdf2SpeechError> {
        if self.engine.is_speaking() {
            self.engine.cancel();
            info!("Speech stopped");
            return Ok(SpeechToggle::Stopped);
        }

        let (text, settings) = {
            let st = self.lock();
            let text = st
                .extracted_text
                .clone()
                .ok_or(Pdf2SpeechError::NothingToSpeak)?;
            let settings = match &st.last_settings {
                Some(s) => s.clone(),
                None => ConversionSettings {
                    speed_wpm: st.speed_wpm,
                    voice: st.voice,
                    start_page: st.start_page,
                    end_page: st.end_page,
                    total_pages: st.total_pages(),
                },
            };
            (text, settings)
        };

        let utterance = speech::build_utterance(
            text,
            &settings,
            &self.engine.voices(),
            &self.config.voice_language,
        );
        let events = self.engine.speak(utterance)?;
        info!("Speech started");
        Ok(SpeechToggle::Started(events))
    }

    /// Resolve once the engine has stopped speaking, checking every `poll`.
    ///
    /// Playback started by the speech stage keeps going after a run
    /// finalizes; hosts that exit on completion wait here so it is not cut
    /// off.
    pub async fn wait_for_silence(&self, poll: Duration) {
        while self.engine.is_speaking() {
            tokio::time::sleep(poll).await;
        }
    }

    // ── Reset ────────────────────────────────────────────────────────────

    /// Drop the document and every derived value; keep speed and voice.
    pub fn reset(&self) -> Result<(), Pdf2SpeechError> {
        let _claim = RunClaim::acquire(&self.active).ok_or(Pdf2SpeechError::ConversionInProgress)?;
        if self.engine.is_speaking() {
            self.engine.cancel();
        }
        {
            let mut st = self.lock();
            st.clear_run();
            st.document = None;
            st.start_page = 1;
            st.end_page = 1;
            st.extracted_text = None;
            st.last_settings = None;
        }
        self.notifications.success("Upload area reset successfully!");
        Ok(())
    }
}
