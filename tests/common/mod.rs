//! Shared fixtures for the integration suites: an in-memory page source and
//! a speech engine that plays back a fixed script.

#![allow(dead_code)]

use pdf2speech::{
    ConversionMode, ConverterConfig, ConverterSession, DocumentHandle, FileUpload, PageError,
    PageEvent, PageResult, Pdf2SpeechError, SpeechEngine, SpeechEvent, TextExtractor, Utterance,
    Voice, PDF_MEDIA_TYPE,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

// ── Page source ──────────────────────────────────────────────────────────────

/// Serves fixed page texts. `None` marks a page whose extraction fails.
pub struct MemoryExtractor {
    pages: Vec<Option<String>>,
    gate: Option<Mutex<std_mpsc::Receiver<()>>>,
    count_gate: Option<Mutex<std_mpsc::Receiver<()>>>,
}

impl MemoryExtractor {
    pub fn new<S: Into<String>>(pages: impl IntoIterator<Item = S>) -> Self {
        Self {
            pages: pages.into_iter().map(|p| Some(p.into())).collect(),
            gate: None,
            count_gate: None,
        }
    }

    pub fn with_pages(pages: Vec<Option<String>>) -> Self {
        Self {
            pages,
            gate: None,
            count_gate: None,
        }
    }

    /// Block before the first page until the returned sender fires (or is
    /// dropped), holding the run in `Extracting`.
    pub fn gated(mut self) -> (Self, std_mpsc::Sender<()>) {
        let (tx, rx) = std_mpsc::channel();
        self.gate = Some(Mutex::new(rx));
        (self, tx)
    }

    /// Block every page count until the returned sender fires once for it
    /// (or is dropped), holding the upload mid-analysis.
    pub fn gated_count(mut self) -> (Self, std_mpsc::Sender<()>) {
        let (tx, rx) = std_mpsc::channel();
        self.count_gate = Some(Mutex::new(rx));
        (self, tx)
    }
}

impl TextExtractor for MemoryExtractor {
    fn page_count(&self, _document: &DocumentHandle) -> Result<usize, Pdf2SpeechError> {
        if let Some(gate) = &self.count_gate {
            let rx = gate.lock().unwrap();
            let _ = rx.recv();
        }
        Ok(self.pages.len())
    }

    fn extract_pages(
        &self,
        _document: &DocumentHandle,
        first: usize,
        last: usize,
        on_page: &mut dyn FnMut(PageEvent),
    ) -> Result<(), Pdf2SpeechError> {
        if let Some(gate) = &self.gate {
            let rx = gate.lock().unwrap();
            let _ = rx.recv();
        }
        for page_num in first..=last {
            on_page(PageEvent::Started(page_num));
            let result = match self.pages.get(page_num - 1) {
                Some(Some(text)) => PageResult::ok(page_num, text.clone(), Duration::ZERO),
                Some(None) => PageResult::failed(
                    page_num,
                    PageError::ExtractFailed {
                        page: page_num,
                        detail: "damaged content stream".into(),
                    },
                    Duration::ZERO,
                ),
                None => PageResult::failed(
                    page_num,
                    PageError::OutOfRange {
                        page: page_num,
                        total: self.pages.len(),
                    },
                    Duration::ZERO,
                ),
            };
            on_page(PageEvent::Finished(result));
        }
        Ok(())
    }
}

/// Counts two pages for every document except `corrupt_name`, which does
/// not parse. Extraction always fails outright.
pub struct FailingExtractor {
    corrupt_name: String,
}

impl FailingExtractor {
    pub fn new(corrupt_name: impl Into<String>) -> Self {
        Self {
            corrupt_name: corrupt_name.into(),
        }
    }
}

impl TextExtractor for FailingExtractor {
    fn page_count(&self, document: &DocumentHandle) -> Result<usize, Pdf2SpeechError> {
        if document.name() == self.corrupt_name {
            return Err(Pdf2SpeechError::CorruptPdf {
                name: document.name().to_string(),
                detail: "no page tree".into(),
            });
        }
        Ok(2)
    }

    fn extract_pages(
        &self,
        _document: &DocumentHandle,
        _first: usize,
        _last: usize,
        _on_page: &mut dyn FnMut(PageEvent),
    ) -> Result<(), Pdf2SpeechError> {
        Err(Pdf2SpeechError::PdfiumBindingFailed(
            "libpdfium.so: cannot open shared object file".into(),
        ))
    }
}

// ── Speech engine ────────────────────────────────────────────────────────────

/// Emits `script` for every utterance. With `hold`, the channel stays open
/// after the script and the engine reports speaking until cancelled.
pub struct ScriptedSpeechEngine {
    script: Vec<SpeechEvent>,
    hold: bool,
    voices: Vec<Voice>,
    speaking: AtomicBool,
    live: Mutex<Option<mpsc::UnboundedSender<SpeechEvent>>>,
    pub spoken: Mutex<Vec<Utterance>>,
}

impl ScriptedSpeechEngine {
    pub fn new(script: Vec<SpeechEvent>) -> Self {
        Self {
            script,
            hold: false,
            voices: vec![
                Voice {
                    name: "Daniel".into(),
                    lang: "en-GB".into(),
                    id: "daniel".into(),
                },
                Voice {
                    name: "Samantha".into(),
                    lang: "en-US".into(),
                    id: "samantha".into(),
                },
            ],
            speaking: AtomicBool::new(false),
            live: Mutex::new(None),
            spoken: Mutex::new(Vec::new()),
        }
    }

    /// Starts and ends every utterance straight away.
    pub fn finishing() -> Self {
        Self::new(vec![SpeechEvent::Started, SpeechEvent::Ended])
    }

    /// Starts every utterance and keeps speaking until cancelled.
    pub fn holding() -> Self {
        let mut engine = Self::new(vec![SpeechEvent::Started]);
        engine.hold = true;
        engine
    }

    pub fn utterances(&self) -> Vec<Utterance> {
        self.spoken.lock().unwrap().clone()
    }
}

impl SpeechEngine for ScriptedSpeechEngine {
    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn speak(
        &self,
        utterance: Utterance,
    ) -> Result<mpsc::UnboundedReceiver<SpeechEvent>, Pdf2SpeechError> {
        self.cancel();
        self.spoken.lock().unwrap().push(utterance);
        let (tx, rx) = mpsc::unbounded_channel();
        for event in &self.script {
            let _ = tx.send(event.clone());
        }
        if self.hold {
            self.speaking.store(true, Ordering::SeqCst);
            *self.live.lock().unwrap() = Some(tx);
        }
        Ok(rx)
    }

    fn cancel(&self) {
        if let Some(tx) = self.live.lock().unwrap().take() {
            let _ = tx.send(SpeechEvent::Cancelled);
        }
        self.speaking.store(false, Ordering::SeqCst);
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }
}

// ── Builders ─────────────────────────────────────────────────────────────────

/// A declared-PDF upload of exactly `size` bytes.
pub fn pdf_upload(name: &str, size: usize) -> FileUpload {
    let mut bytes = b"%PDF-1.7\n".to_vec();
    bytes.resize(size.max(9), b' ');
    FileUpload::from_bytes(name, PDF_MEDIA_TYPE, bytes)
}

pub fn extract_session(
    extractor: impl TextExtractor + 'static,
    engine: Arc<dyn SpeechEngine>,
) -> ConverterSession {
    let config = ConverterConfig::builder()
        .mode(ConversionMode::Extract)
        .extractor(Arc::new(extractor))
        .build()
        .unwrap();
    ConverterSession::new(config, engine)
}
