//! Declarative event bindings.
//!
//! Input reaches the session as [`UiEvent`]s. A [`BindingTable`] maps each
//! [`EventKind`] to exactly one handler; [`BindingTable::validate`] checks
//! that mapping once at startup so a missing or doubled binding is a
//! configuration error instead of a silently dead control.
//!
//! ```rust
//! use pdf2speech::BindingTable;
//!
//! let table = BindingTable::standard();
//! table.validate().unwrap();
//! ```

use crate::config::VoiceGender;
use crate::error::Pdf2SpeechError;
use crate::output::ConversionOutput;
use crate::pipeline::intake::{DocumentInfo, FileUpload};
use crate::pipeline::range::PageRange;
use crate::pipeline::speech::SpeechEvent;
use crate::session::{ConverterSession, SpeechToggle};
use futures::future::BoxFuture;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::debug;

/// Something the user did.
#[derive(Debug, Clone)]
pub enum UiEvent {
    FileSelected(FileUpload),
    FileDropped(FileUpload),
    SpeedChanged(u32),
    VoiceChanged(VoiceGender),
    StartPageChanged(i64),
    EndPageChanged(i64),
    ConvertClicked,
    SpeechToggled,
    ResetClicked,
}

/// Discriminant of [`UiEvent`], used as the binding key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    FileSelected,
    FileDropped,
    SpeedChanged,
    VoiceChanged,
    StartPageChanged,
    EndPageChanged,
    ConvertClicked,
    SpeechToggled,
    ResetClicked,
}

impl EventKind {
    pub const ALL: [EventKind; 9] = [
        EventKind::FileSelected,
        EventKind::FileDropped,
        EventKind::SpeedChanged,
        EventKind::VoiceChanged,
        EventKind::StartPageChanged,
        EventKind::EndPageChanged,
        EventKind::ConvertClicked,
        EventKind::SpeechToggled,
        EventKind::ResetClicked,
    ];
}

impl UiEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            UiEvent::FileSelected(_) => EventKind::FileSelected,
            UiEvent::FileDropped(_) => EventKind::FileDropped,
            UiEvent::SpeedChanged(_) => EventKind::SpeedChanged,
            UiEvent::VoiceChanged(_) => EventKind::VoiceChanged,
            UiEvent::StartPageChanged(_) => EventKind::StartPageChanged,
            UiEvent::EndPageChanged(_) => EventKind::EndPageChanged,
            UiEvent::ConvertClicked => EventKind::ConvertClicked,
            UiEvent::SpeechToggled => EventKind::SpeechToggled,
            UiEvent::ResetClicked => EventKind::ResetClicked,
        }
    }
}

/// What a handler did, for the host to render.
#[derive(Debug)]
pub enum EventOutcome {
    Loaded(DocumentInfo),
    SpeedSet(u32),
    VoiceSet(VoiceGender),
    RangeSet(PageRange),
    Converted(Box<ConversionOutput>),
    SpeechStarted(mpsc::UnboundedReceiver<SpeechEvent>),
    SpeechStopped,
    Reset,
}

/// An event handler: borrows the session for the duration of the future.
pub type Handler =
    for<'a> fn(&'a ConverterSession, UiEvent) -> BoxFuture<'a, Result<EventOutcome, Pdf2SpeechError>>;

struct Binding {
    kind: EventKind,
    name: &'static str,
    handler: Handler,
}

/// Event-to-handler table.
#[derive(Default)]
pub struct BindingTable {
    bindings: Vec<Binding>,
}

impl std::fmt::Debug for BindingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.bindings.iter().map(|b| (b.kind, b.name)))
            .finish()
    }
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a binding. Duplicates are allowed here and rejected by
    /// [`Self::validate`].
    pub fn bind(mut self, kind: EventKind, name: &'static str, handler: Handler) -> Self {
        self.bindings.push(Binding {
            kind,
            name,
            handler,
        });
        self
    }

    /// Every event bound to its session operation.
    pub fn standard() -> Self {
        Self::new()
            .bind(EventKind::FileSelected, "load_file", on_file)
            .bind(EventKind::FileDropped, "load_file", on_file)
            .bind(EventKind::SpeedChanged, "set_speed", on_speed)
            .bind(EventKind::VoiceChanged, "set_voice", on_voice)
            .bind(EventKind::StartPageChanged, "set_start_page", on_range)
            .bind(EventKind::EndPageChanged, "set_end_page", on_range)
            .bind(EventKind::ConvertClicked, "start_conversion", on_convert)
            .bind(EventKind::SpeechToggled, "toggle_speech", on_speech)
            .bind(EventKind::ResetClicked, "reset", on_reset)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Check that every [`EventKind`] is bound exactly once.
    pub fn validate(&self) -> Result<(), Pdf2SpeechError> {
        let mut counts: HashMap<EventKind, usize> = HashMap::new();
        for b in &self.bindings {
            *counts.entry(b.kind).or_default() += 1;
        }

        let mut problems = Vec::new();
        for kind in EventKind::ALL {
            match counts.get(&kind).copied().unwrap_or(0) {
                1 => {}
                0 => problems.push(format!("{kind:?} is not bound")),
                n => problems.push(format!("{kind:?} is bound {n} times")),
            }
        }

        if problems.is_empty() {
            debug!("Binding table valid: {} events", self.bindings.len());
            Ok(())
        } else {
            Err(Pdf2SpeechError::InvalidConfig(format!(
                "event bindings: {}",
                problems.join(", ")
            )))
        }
    }

    /// Route `event` to its handler.
    pub async fn dispatch(
        &self,
        session: &ConverterSession,
        event: UiEvent,
    ) -> Result<EventOutcome, Pdf2SpeechError> {
        let kind = event.kind();
        let binding = self
            .bindings
            .iter()
            .find(|b| b.kind == kind)
            .ok_or_else(|| Pdf2SpeechError::InvalidConfig(format!("{kind:?} is not bound")))?;
        debug!("Dispatching {:?} → {}", kind, binding.name);
        (binding.handler)(session, event).await
    }
}

// ── Standard handlers ────────────────────────────────────────────────────

fn mismatch(expected: &str, event: &UiEvent) -> Pdf2SpeechError {
    Pdf2SpeechError::Internal(format!("{expected} handler received {:?}", event.kind()))
}

fn on_file(session: &ConverterSession, event: UiEvent) -> BoxFuture<'_, Result<EventOutcome, Pdf2SpeechError>> {
    Box::pin(async move {
        match event {
            UiEvent::FileSelected(upload) | UiEvent::FileDropped(upload) => {
                session.load_file(upload).await.map(EventOutcome::Loaded)
            }
            other => Err(mismatch("load_file", &other)),
        }
    })
}

fn on_speed(session: &ConverterSession, event: UiEvent) -> BoxFuture<'_, Result<EventOutcome, Pdf2SpeechError>> {
    Box::pin(async move {
        match event {
            UiEvent::SpeedChanged(wpm) => Ok(EventOutcome::SpeedSet(session.set_speed(wpm))),
            other => Err(mismatch("set_speed", &other)),
        }
    })
}

fn on_voice(session: &ConverterSession, event: UiEvent) -> BoxFuture<'_, Result<EventOutcome, Pdf2SpeechError>> {
    Box::pin(async move {
        match event {
            UiEvent::VoiceChanged(voice) => {
                session.set_voice(voice);
                Ok(EventOutcome::VoiceSet(voice))
            }
            other => Err(mismatch("set_voice", &other)),
        }
    })
}

fn on_range(session: &ConverterSession, event: UiEvent) -> BoxFuture<'_, Result<EventOutcome, Pdf2SpeechError>> {
    Box::pin(async move {
        match event {
            UiEvent::StartPageChanged(n) => Ok(EventOutcome::RangeSet(session.set_start_page(n))),
            UiEvent::EndPageChanged(n) => Ok(EventOutcome::RangeSet(session.set_end_page(n))),
            other => Err(mismatch("page range", &other)),
        }
    })
}

fn on_convert(session: &ConverterSession, event: UiEvent) -> BoxFuture<'_, Result<EventOutcome, Pdf2SpeechError>> {
    Box::pin(async move {
        match event {
            UiEvent::ConvertClicked => session
                .start_conversion()
                .await
                .map(|out| EventOutcome::Converted(Box::new(out))),
            other => Err(mismatch("start_conversion", &other)),
        }
    })
}

fn on_speech(session: &ConverterSession, event: UiEvent) -> BoxFuture<'_, Result<EventOutcome, Pdf2SpeechError>> {
    Box::pin(async move {
        match event {
            UiEvent::SpeechToggled => match session.toggle_speech()? {
                SpeechToggle::Started(events) => Ok(EventOutcome::SpeechStarted(events)),
                SpeechToggle::Stopped => Ok(EventOutcome::SpeechStopped),
            },
            other => Err(mismatch("toggle_speech", &other)),
        }
    })
}

fn on_reset(session: &ConverterSession, event: UiEvent) -> BoxFuture<'_, Result<EventOutcome, Pdf2SpeechError>> {
    Box::pin(async move {
        match event {
            UiEvent::ResetClicked => session.reset().map(|()| EventOutcome::Reset),
            other => Err(mismatch("reset", &other)),
        }
    })
}
