//! The conversion run and the one-shot entry points.
//!
//! ## Why a `PipelineRun`?
//!
//! A run owns its phase and its progress tracker exclusively; nothing else
//! may move them. Each stage method advances the phase, reports the
//! milestones of that stage and returns a `Result`, so the driver in
//! [`crate::session`] can fail the run from a single place.
//!
//! ## Progress milestones (extract mode)
//!
//! ```text
//!  Analyzing ─▶ Extracting ──────────────▶ Synthesizing ─────────▶ Finalizing ─▶ Done
//!               10 ─ 10+30·i/n per page ─ 40   50 ─ 70 on speech start          100
//! ```
//!
//! Simulated runs move linearly with the timer instead (see
//! [`crate::pipeline::simulate`]).

use crate::config::{ConversionSettings, ConverterConfig, PageCounting};
use crate::error::Pdf2SpeechError;
use crate::output::{Artifact, ConversionOutput, ConversionStats, PageResult};
use crate::phase::PipelinePhase;
use crate::pipeline::extract::{PageEvent, PdfiumExtractor, TextExtractor};
use crate::pipeline::intake::{self, DocumentHandle, DocumentInfo, FileUpload};
use crate::pipeline::simulate::{self, SIM_STEPS};
use crate::pipeline::speech::{self, SpeechEngine, SpeechEvent};
use crate::pipeline::postprocess;
use crate::progress::{ProgressCallback, ProgressTracker};
use crate::session::ConverterSession;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Text pulled from the selected pages.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Non-empty pages joined with blank lines.
    pub text: String,
    pub pages: Vec<PageResult>,
    pub duration_ms: u64,
}

/// A single conversion run: settings snapshot, phase and progress.
pub struct PipelineRun {
    settings: ConversionSettings,
    callback: ProgressCallback,
    phase: PipelinePhase,
    tracker: ProgressTracker,
    estimated_secs: u64,
    pages_with_text: usize,
    started: Instant,
}

impl PipelineRun {
    /// Claim the settings snapshot and enter `Analyzing`.
    pub fn start(
        settings: ConversionSettings,
        config: &ConverterConfig,
        callback: ProgressCallback,
    ) -> Result<Self, Pdf2SpeechError> {
        let estimated_secs = settings.estimated_duration_secs(config.words_per_page);
        info!(
            "Starting conversion: pages {}-{} of {}, {} wpm, {} voice, ~{}",
            settings.start_page,
            settings.end_page,
            settings.total_pages,
            settings.speed_wpm,
            settings.voice,
            simulate::format_time(estimated_secs)
        );
        callback.on_conversion_start(&settings, estimated_secs);

        let mut run = Self {
            settings,
            callback,
            phase: PipelinePhase::Idle,
            tracker: ProgressTracker::new(estimated_secs),
            estimated_secs,
            pages_with_text: 0,
            started: Instant::now(),
        };
        run.enter(PipelinePhase::Analyzing, PipelinePhase::Analyzing.status_text())?;
        Ok(run)
    }

    pub fn phase(&self) -> PipelinePhase {
        self.phase
    }

    pub fn settings(&self) -> &ConversionSettings {
        &self.settings
    }

    pub fn estimated_secs(&self) -> u64 {
        self.estimated_secs
    }

    pub fn percent(&self) -> f64 {
        self.tracker.percent()
    }

    /// Move to `next` (or stay, if already there) and publish `status`.
    fn enter(&mut self, next: PipelinePhase, status: &str) -> Result<(), Pdf2SpeechError> {
        if self.phase != next {
            self.phase = self.phase.advance(next)?;
            debug!("Phase → {}", next);
        }
        self.callback.on_phase_change(self.phase, status);
        Ok(())
    }

    fn report(&mut self, percent: f64) {
        if let Some(snapshot) = self.tracker.advance(percent) {
            self.callback.on_progress(&snapshot);
        }
    }

    // ── Extract ──────────────────────────────────────────────────────────

    /// Extract the selected pages on a blocking thread.
    ///
    /// Per-page failures are reported and skipped. Fails with
    /// [`Pdf2SpeechError::NoExtractableText`] when no page yields text.
    pub async fn extract(
        &mut self,
        document: &DocumentHandle,
        extractor: Arc<dyn TextExtractor>,
    ) -> Result<Extraction, Pdf2SpeechError> {
        let extract_start = Instant::now();
        self.enter(PipelinePhase::Extracting, "Extracting text from PDF...")?;
        self.report(10.0);

        let (first, last) = (self.settings.start_page, self.settings.end_page);
        let n = self.settings.page_count();
        let (tx, mut rx) = mpsc::unbounded_channel::<PageEvent>();
        let doc = document.clone();

        let handle = tokio::task::spawn_blocking(move || {
            extractor.extract_pages(&doc, first, last, &mut |event: PageEvent| {
                let _ = tx.send(event);
            })
        });

        let mut pages: Vec<PageResult> = Vec::with_capacity(n);
        while let Some(event) = rx.recv().await {
            match event {
                PageEvent::Started(page_num) => {
                    self.callback.on_page_start(page_num, n);
                    let status = format!("Extracting text from page {page_num}...");
                    self.callback.on_phase_change(self.phase, &status);
                }
                PageEvent::Finished(result) => {
                    match &result.error {
                        None => self
                            .callback
                            .on_page_complete(result.page_num, n, result.text.len()),
                        Some(e) => {
                            warn!("Skipping page {}: {}", result.page_num, e);
                            self.callback
                                .on_page_error(result.page_num, n, &e.to_string())
                        }
                    }
                    pages.push(result);
                    self.report(10.0 + pages.len() as f64 / n as f64 * 30.0);
                }
            }
        }

        handle
            .await
            .map_err(|e| Pdf2SpeechError::Internal(format!("extraction task failed: {e}")))??;

        self.pages_with_text = pages.iter().filter(|p| p.has_text()).count();
        let text = postprocess::join_pages(
            pages
                .iter()
                .filter(|p| p.error.is_none())
                .map(|p| p.text.as_str()),
        );
        if text.trim().is_empty() {
            return Err(Pdf2SpeechError::NoExtractableText { first, last });
        }

        self.report(40.0);
        let duration_ms = extract_start.elapsed().as_millis() as u64;
        info!(
            "Extracted {} words from {}/{} pages in {}ms",
            postprocess::word_count(&text),
            self.pages_with_text,
            n,
            duration_ms
        );
        Ok(Extraction {
            text,
            pages,
            duration_ms,
        })
    }

    // ── Synthesize ───────────────────────────────────────────────────────

    /// Hand `text` to the speech engine and wait for it to start and end.
    ///
    /// If the end event has not arrived after `speech_fallback_ms`, the
    /// stage completes anyway and playback continues in the background.
    pub async fn synthesize(
        &mut self,
        text: &str,
        engine: &dyn SpeechEngine,
        config: &ConverterConfig,
    ) -> Result<(), Pdf2SpeechError> {
        self.enter(PipelinePhase::Synthesizing, PipelinePhase::Synthesizing.status_text())?;
        self.report(50.0);

        let utterance =
            speech::build_utterance(text, &self.settings, &engine.voices(), &config.voice_language);
        let mut events = engine.speak(utterance)?;

        let fallback = tokio::time::sleep(Duration::from_millis(config.speech_fallback_ms));
        tokio::pin!(fallback);

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(SpeechEvent::Started) => {
                        self.callback.on_phase_change(self.phase, "Generating audio file...");
                        self.report(70.0);
                    }
                    Some(SpeechEvent::Error(e)) => return Err(Pdf2SpeechError::SynthesisFailed(e)),
                    Some(SpeechEvent::Ended) | Some(SpeechEvent::Cancelled) | None => break,
                },
                _ = &mut fallback => {
                    debug!("Speech end not reported after {}ms, finalizing", config.speech_fallback_ms);
                    break;
                }
            }
        }
        Ok(())
    }

    // ── Simulate ─────────────────────────────────────────────────────────

    /// Tick through the weighted steps until the timer reaches 100%.
    pub async fn simulate(&mut self, config: &ConverterConfig) -> Result<(), Pdf2SpeechError> {
        let tick = Duration::from_millis(config.tick_interval_ms);
        let mut step = 0usize;
        let mut failure = None;

        simulate::run_simulation(self.estimated_secs, tick, |t| {
            if failure.is_some() {
                return;
            }
            if t.step != step {
                step = t.step;
                let s = SIM_STEPS[step];
                if let Err(e) = self.enter(s.phase, s.status) {
                    failure = Some(e);
                    return;
                }
            }
            self.report(t.percent);
        })
        .await;

        failure.map_or(Ok(()), Err)
    }

    // ── Finish / fail ────────────────────────────────────────────────────

    /// Build the artifact, report 100 and enter `Done`.
    ///
    /// `extraction` is `None` for simulated runs, which produce the
    /// placeholder audio artifact.
    pub fn finish(
        &mut self,
        source_name: &str,
        extraction: Option<Extraction>,
    ) -> Result<ConversionOutput, Pdf2SpeechError> {
        self.enter(PipelinePhase::Finalizing, PipelinePhase::Finalizing.status_text())?;

        let now = Utc::now();
        let (artifact, extracted_text, pages, extraction_ms) = match extraction {
            Some(ex) => (
                Artifact::extracted_text(source_name, &self.settings, &ex.text, now),
                Some(ex.text),
                ex.pages,
                ex.duration_ms,
            ),
            None => (
                Artifact::simulated_audio(source_name, &self.settings, now),
                None,
                Vec::new(),
                0,
            ),
        };

        if let Some(snapshot) = self.tracker.complete() {
            self.callback.on_progress(&snapshot);
        }
        self.enter(PipelinePhase::Done, PipelinePhase::Done.status_text())?;

        let stats = ConversionStats {
            selected_pages: self.settings.page_count(),
            pages_with_text: self.pages_with_text,
            failed_pages: pages.iter().filter(|p| p.error.is_some()).count(),
            word_count: extracted_text.as_deref().map_or(0, postprocess::word_count),
            estimated_duration_secs: self.estimated_secs,
            extraction_duration_ms: extraction_ms,
            total_duration_ms: self.started.elapsed().as_millis() as u64,
        };
        info!(
            "Conversion complete: {} ({} bytes) in {}ms",
            artifact.file_name,
            artifact.contents.len(),
            stats.total_duration_ms
        );
        self.callback
            .on_conversion_complete(PipelinePhase::Done, self.pages_with_text);

        Ok(ConversionOutput {
            artifact,
            extracted_text,
            pages,
            stats,
        })
    }

    /// Enter `Failed` and publish the error as the status line.
    pub fn fail(&mut self, error: &Pdf2SpeechError) {
        if self.phase.is_terminal() {
            return;
        }
        warn!("Conversion failed during {}: {}", self.phase, error);
        self.phase = PipelinePhase::Failed;
        self.callback
            .on_phase_change(PipelinePhase::Failed, &error.to_string());
        self.callback
            .on_conversion_complete(PipelinePhase::Failed, self.pages_with_text);
    }
}

// ── Helpers shared with the session ──────────────────────────────────────

/// The configured extractor, or pdfium.
pub(crate) fn resolve_extractor(config: &ConverterConfig) -> Arc<dyn TextExtractor> {
    match &config.extractor {
        Some(extractor) => Arc::clone(extractor),
        None => Arc::new(PdfiumExtractor::new(
            config.pdfium_library.clone(),
            config.password.clone(),
        )),
    }
}

/// Page count of `document` per the configured strategy.
pub(crate) async fn count_pages(
    document: &DocumentHandle,
    config: &ConverterConfig,
    extractor: &Arc<dyn TextExtractor>,
) -> Result<usize, Pdf2SpeechError> {
    match config.page_counting {
        PageCounting::Estimate => Ok(intake::estimate_page_count(document.size())),
        PageCounting::Parse => {
            let doc = document.clone();
            let extractor = Arc::clone(extractor);
            tokio::task::spawn_blocking(move || extractor.page_count(&doc))
                .await
                .map_err(|e| Pdf2SpeechError::Internal(format!("page count task failed: {e}")))?
        }
    }
}

// ── One-shot entry points ────────────────────────────────────────────────

/// Convert every page of a local PDF with default speed and voice.
///
/// Equivalent to loading the file into a fresh [`ConverterSession`] and
/// starting one conversion.
pub async fn convert(
    input: impl AsRef<Path>,
    config: &ConverterConfig,
    engine: Arc<dyn SpeechEngine>,
) -> Result<ConversionOutput, Pdf2SpeechError> {
    let session = ConverterSession::new(config.clone(), engine);
    session.load_file(FileUpload::from_path(input)?).await?;
    session.start_conversion().await
}

/// Convert a local PDF and write the artifact into `out_dir`.
pub async fn convert_to_dir(
    input: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
    config: &ConverterConfig,
    engine: Arc<dyn SpeechEngine>,
) -> Result<(PathBuf, ConversionStats), Pdf2SpeechError> {
    let output = convert(input, config, engine).await?;
    let path = output.artifact.save_to(out_dir)?;
    Ok((path, output.stats))
}

/// Validate a local PDF and report its name, size and page count without
/// converting anything.
pub async fn inspect(
    input: impl AsRef<Path>,
    config: &ConverterConfig,
) -> Result<DocumentInfo, Pdf2SpeechError> {
    let upload = FileUpload::from_path(input)?;
    intake::validate(&upload, config.max_file_size)?;
    let bytes = upload.read_bytes().await?;
    let document = DocumentHandle::new(upload.name, bytes, 0);
    let extractor = resolve_extractor(config);
    let total = count_pages(&document, config, &extractor).await?;
    Ok(document.with_page_count(total).info())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VoiceGender;
    use crate::pipeline::speech::SilentSpeechEngine;
    use crate::progress::{ConversionProgressCallback, ProgressSnapshot};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        phases: Mutex<Vec<PipelinePhase>>,
        percents: Mutex<Vec<f64>>,
    }

    impl ConversionProgressCallback for Recorder {
        fn on_phase_change(&self, phase: PipelinePhase, _status: &str) {
            let mut phases = self.phases.lock().unwrap();
            if phases.last() != Some(&phase) {
                phases.push(phase);
            }
        }

        fn on_progress(&self, snapshot: &ProgressSnapshot) {
            self.percents.lock().unwrap().push(snapshot.percent);
        }
    }

    struct Pages(Vec<&'static str>);

    impl TextExtractor for Pages {
        fn page_count(&self, _document: &DocumentHandle) -> Result<usize, Pdf2SpeechError> {
            Ok(self.0.len())
        }

        fn extract_pages(
            &self,
            _document: &DocumentHandle,
            first: usize,
            last: usize,
            on_page: &mut dyn FnMut(PageEvent),
        ) -> Result<(), Pdf2SpeechError> {
            for page in first..=last {
                on_page(PageEvent::Started(page));
                let text = self.0.get(page - 1).copied().unwrap_or_default();
                on_page(PageEvent::Finished(PageResult::ok(
                    page,
                    text.to_string(),
                    Duration::ZERO,
                )));
            }
            Ok(())
        }
    }

    fn settings(start: usize, end: usize) -> ConversionSettings {
        ConversionSettings {
            speed_wpm: 150,
            voice: VoiceGender::Female,
            start_page: start,
            end_page: end,
            total_pages: 4,
        }
    }

    fn document() -> DocumentHandle {
        DocumentHandle::new("book.pdf", Arc::from(b"%PDF-1.7".to_vec()), 4)
    }

    #[tokio::test]
    async fn extract_mode_hits_milestones() {
        let rec = Arc::new(Recorder::default());
        let config = ConverterConfig::default();
        let mut run = PipelineRun::start(settings(1, 4), &config, rec.clone()).unwrap();
        let extractor: Arc<dyn TextExtractor> = Arc::new(Pages(vec!["one", "", "three", "four"]));

        let ex = run.extract(&document(), extractor).await.unwrap();
        assert_eq!(ex.text, "one\n\nthree\n\nfour\n\n");
        run.synthesize(&ex.text, &SilentSpeechEngine, &config).await.unwrap();
        let out = run.finish("book.pdf", Some(ex)).unwrap();

        assert_eq!(out.artifact.file_name, "book_extracted_text.txt");
        assert_eq!(out.stats.pages_with_text, 3);
        assert_eq!(
            *rec.percents.lock().unwrap(),
            vec![10.0, 17.5, 25.0, 32.5, 40.0, 50.0, 70.0, 100.0]
        );
        assert_eq!(
            *rec.phases.lock().unwrap(),
            vec![
                PipelinePhase::Analyzing,
                PipelinePhase::Extracting,
                PipelinePhase::Synthesizing,
                PipelinePhase::Finalizing,
                PipelinePhase::Done
            ]
        );
    }

    #[tokio::test]
    async fn blank_range_fails_before_synthesis() {
        let rec = Arc::new(Recorder::default());
        let mut run =
            PipelineRun::start(settings(2, 2), &ConverterConfig::default(), rec.clone()).unwrap();
        let extractor: Arc<dyn TextExtractor> = Arc::new(Pages(vec!["one", "   "]));

        let err = run.extract(&document(), extractor).await.unwrap_err();
        assert!(matches!(err, Pdf2SpeechError::NoExtractableText { first: 2, last: 2 }));
        run.fail(&err);
        assert_eq!(run.phase(), PipelinePhase::Failed);
        assert!(!rec.phases.lock().unwrap().contains(&PipelinePhase::Synthesizing));
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_run_emits_placeholder_audio() {
        let rec = Arc::new(Recorder::default());
        let config = ConverterConfig::default();
        let mut run = PipelineRun::start(settings(1, 1), &config, rec.clone()).unwrap();
        // 1 page at 150 wpm: ceil(250 × 30 / 150) = 50 s.
        assert_eq!(run.estimated_secs(), 50);

        run.simulate(&config).await.unwrap();
        let out = run.finish("book.pdf", None).unwrap();
        assert_eq!(out.artifact.file_name, "book_audio.mp3");
        assert_eq!(run.phase(), PipelinePhase::Done);

        let percents = rec.percents.lock().unwrap();
        assert_eq!(percents.len(), 500);
        assert_eq!(percents.iter().filter(|p| **p == 100.0).count(), 1);
    }
}
