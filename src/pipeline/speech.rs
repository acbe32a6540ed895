//! Speech synthesis: voice selection and the host speech engine.
//!
//! [`SpeechEngine`] is a handle to whatever can read text aloud on this host.
//! An engine accepts one [`Utterance`] at a time and reports its life cycle
//! as [`SpeechEvent`]s on a channel, so the pipeline can wait for the start
//! and end events while playback itself runs on its own.
//!
//! [`CommandSpeechEngine`] drives the system's `espeak-ng`, `espeak` or
//! macOS `say` binary, feeding the text over stdin. [`SilentSpeechEngine`]
//! completes instantly and is used for `--no-speech` runs and tests.

use crate::config::{ConversionSettings, VoiceGender};
use crate::error::Pdf2SpeechError;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};

/// A voice offered by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    /// Display name, matched against the gender keywords.
    pub name: String,
    /// BCP 47-style language tag, e.g. `en-GB`.
    pub lang: String,
    /// Engine-specific identifier passed back when speaking.
    pub id: String,
}

/// One request to speak.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    /// `None` leaves the choice to the engine.
    pub voice: Option<Voice>,
    /// 1.0 is the engine's normal pace.
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

/// Life-cycle events of a single utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    Started,
    Ended,
    Cancelled,
    Error(String),
}

/// Something that can read text aloud.
///
/// `speak` must be called from within a Tokio runtime. Starting a new
/// utterance cancels the one in flight.
pub trait SpeechEngine: Send + Sync {
    /// Voices the engine can use.
    fn voices(&self) -> Vec<Voice>;

    /// Begin speaking. Events for this utterance arrive on the returned
    /// channel; the channel closes after the final event.
    fn speak(
        &self,
        utterance: Utterance,
    ) -> Result<mpsc::UnboundedReceiver<SpeechEvent>, Pdf2SpeechError>;

    /// Stop the current utterance, if any.
    fn cancel(&self);

    fn is_speaking(&self) -> bool;
}

// ── Voice selection ──────────────────────────────────────────────────────

/// Pick a voice for `gender` among voices whose language starts with
/// `lang_prefix`.
///
/// Name keywords decide the gender: `female`, `samantha` or `alex` for
/// female voices, `daniel` or `male` (but not `female`) for male ones.
/// Without a keyword match the first voice in the language wins; without any
/// voice in the language the engine default is used.
pub fn select_voice(voices: &[Voice], gender: VoiceGender, lang_prefix: &str) -> Option<Voice> {
    let in_lang: Vec<&Voice> = voices
        .iter()
        .filter(|v| v.lang.starts_with(lang_prefix))
        .collect();

    in_lang
        .iter()
        .find(|v| name_matches(&v.name, gender))
        .or_else(|| in_lang.first())
        .map(|v| (*v).clone())
}

fn name_matches(name: &str, gender: VoiceGender) -> bool {
    let name = name.to_lowercase();
    match gender {
        VoiceGender::Female => {
            name.contains("female") || name.contains("samantha") || name.contains("alex")
        }
        VoiceGender::Male => {
            (name.contains("male") && !name.contains("female")) || name.contains("daniel")
        }
    }
}

/// Build the utterance for a run: selected voice, rate from the speed
/// setting, neutral pitch and full volume.
pub fn build_utterance(
    text: impl Into<String>,
    settings: &ConversionSettings,
    voices: &[Voice],
    lang_prefix: &str,
) -> Utterance {
    let voice = select_voice(voices, settings.voice, lang_prefix);
    match &voice {
        Some(v) => debug!("Selected voice '{}' ({})", v.name, v.lang),
        None => debug!("No {} voice available, using engine default", lang_prefix),
    }
    Utterance {
        text: text.into(),
        voice,
        rate: settings.speech_rate(),
        pitch: 1.0,
        volume: 1.0,
    }
}

// ── Command-line engines ─────────────────────────────────────────────────

/// Speech binaries we know how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechBackend {
    EspeakNg,
    Espeak,
    Say,
}

impl SpeechBackend {
    pub fn program(self) -> &'static str {
        match self {
            SpeechBackend::EspeakNg => "espeak-ng",
            SpeechBackend::Espeak => "espeak",
            SpeechBackend::Say => "say",
        }
    }

    fn command(self, utterance: &Utterance) -> tokio::process::Command {
        // Rate 1.0 is 200 wpm; both binaries take absolute wpm.
        let wpm = (utterance.rate * 200.0).round() as u32;
        let mut cmd = tokio::process::Command::new(self.program());
        match self {
            SpeechBackend::EspeakNg | SpeechBackend::Espeak => {
                let voice = utterance.voice.as_ref().map_or("en", |v| v.id.as_str());
                cmd.arg("-v")
                    .arg(voice)
                    .arg("-s")
                    .arg(wpm.clamp(80, 500).to_string())
                    .arg("-p")
                    .arg(((utterance.pitch * 50.0) as u32).min(99).to_string())
                    .arg("-a")
                    .arg(((utterance.volume * 100.0) as u32).min(200).to_string())
                    .arg("--stdin");
            }
            SpeechBackend::Say => {
                if let Some(v) = &utterance.voice {
                    cmd.arg("-v").arg(&v.id);
                }
                cmd.arg("-r").arg(wpm.max(1).to_string());
            }
        }
        cmd
    }

    fn list_voices(self) -> Vec<Voice> {
        let (args, parse): (&[&str], fn(&str) -> Vec<Voice>) = match self {
            SpeechBackend::EspeakNg | SpeechBackend::Espeak => (&["--voices"], parse_espeak_voices),
            SpeechBackend::Say => (&["-v", "?"], parse_say_voices),
        };
        match std::process::Command::new(self.program()).args(args).output() {
            Ok(out) if out.status.success() => parse(&String::from_utf8_lossy(&out.stdout)),
            Ok(out) => {
                warn!("{} voice listing exited with {}", self.program(), out.status);
                Vec::new()
            }
            Err(e) => {
                warn!("Could not list {} voices: {}", self.program(), e);
                Vec::new()
            }
        }
    }
}

/// Parse `espeak-ng --voices`.
///
/// Columns: `Pty Language Age/Gender VoiceName File Other`. The gender
/// suffix of `Age/Gender` is folded into the name, and each English voice
/// also gets a female `+f3` variant so both genders are selectable.
pub fn parse_espeak_voices(listing: &str) -> Vec<Voice> {
    let mut voices = Vec::new();
    for line in listing.lines().skip(1) {
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() < 5 {
            continue;
        }
        let (lang, age_gender, name, file) = (cols[1], cols[2], cols[3], cols[4]);
        let gender = match age_gender.rsplit('/').next() {
            Some("F") => "female",
            _ => "male",
        };
        let pretty = name.replace('_', " ");
        voices.push(Voice {
            name: format!("{pretty} ({gender})"),
            lang: lang.to_string(),
            id: file.to_string(),
        });
        if gender == "male" && lang.starts_with("en") {
            voices.push(Voice {
                name: format!("{pretty} (female variant)"),
                lang: lang.to_string(),
                id: format!("{lang}+f3"),
            });
        }
    }
    voices
}

/// Parse `say -v '?'`: `Name  locale  # sample sentence`.
pub fn parse_say_voices(listing: &str) -> Vec<Voice> {
    listing
        .lines()
        .filter_map(|line| {
            let head = line.split('#').next()?.trim();
            let (name, locale) = head.rsplit_once(char::is_whitespace)?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some(Voice {
                name: name.to_string(),
                lang: locale.replace('_', "-"),
                id: name.to_string(),
            })
        })
        .collect()
}

/// First speech binary present on `PATH`.
pub fn detect_backend() -> Option<SpeechBackend> {
    let path = std::env::var_os("PATH")?;
    let dirs: Vec<PathBuf> = std::env::split_paths(&path).collect();
    [SpeechBackend::EspeakNg, SpeechBackend::Espeak, SpeechBackend::Say]
        .into_iter()
        .find(|b| dirs.iter().any(|d| d.join(b.program()).is_file()))
}

struct Playback {
    cancel: Arc<Notify>,
    done: Arc<AtomicBool>,
}

/// Engine backed by a speech binary on this host.
pub struct CommandSpeechEngine {
    backend: SpeechBackend,
    voices: Vec<Voice>,
    current: Mutex<Option<Playback>>,
}

impl CommandSpeechEngine {
    /// Find a speech binary on `PATH` and load its voice list.
    pub fn detect() -> Result<Self, Pdf2SpeechError> {
        let backend = detect_backend().ok_or_else(|| {
            Pdf2SpeechError::SpeechUnavailable("no espeak-ng, espeak or say on PATH".into())
        })?;
        Ok(Self::with_backend(backend))
    }

    pub fn with_backend(backend: SpeechBackend) -> Self {
        let voices = backend.list_voices();
        info!("Speech engine: {} ({} voices)", backend.program(), voices.len());
        Self {
            backend,
            voices,
            current: Mutex::new(None),
        }
    }

    pub fn backend(&self) -> SpeechBackend {
        self.backend
    }
}

impl SpeechEngine for CommandSpeechEngine {
    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn speak(
        &self,
        utterance: Utterance,
    ) -> Result<mpsc::UnboundedReceiver<SpeechEvent>, Pdf2SpeechError> {
        self.cancel();

        let program = self.backend.program();
        let mut child = self
            .backend
            .command(&utterance)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Pdf2SpeechError::SpeechUnavailable(format!("{program}: {e}")))?;

        let cancel = Arc::new(Notify::new());
        let done = Arc::new(AtomicBool::new(false));
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(Playback {
            cancel: Arc::clone(&cancel),
            done: Arc::clone(&done),
        });

        if let Some(mut stdin) = child.stdin.take() {
            let text = utterance.text;
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(text.as_bytes()).await {
                    debug!("{} closed stdin early: {}", program, e);
                }
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(SpeechEvent::Started);
        tokio::spawn(async move {
            let event = tokio::select! {
                status = child.wait() => match status {
                    Ok(s) if s.success() => SpeechEvent::Ended,
                    Ok(s) => SpeechEvent::Error(format!("{program} exited with {s}")),
                    Err(e) => SpeechEvent::Error(e.to_string()),
                },
                _ = cancel.notified() => {
                    let _ = child.kill().await;
                    SpeechEvent::Cancelled
                }
            };
            done.store(true, Ordering::SeqCst);
            debug!("{} finished: {:?}", program, event);
            let _ = tx.send(event);
        });

        Ok(rx)
    }

    fn cancel(&self) {
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(p) = current.as_ref() {
            if !p.done.load(Ordering::SeqCst) {
                p.cancel.notify_one();
            }
        }
    }

    fn is_speaking(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|p| !p.done.load(Ordering::SeqCst))
    }
}

/// Engine that finishes every utterance immediately without sound.
#[derive(Debug, Default)]
pub struct SilentSpeechEngine;

impl SpeechEngine for SilentSpeechEngine {
    fn voices(&self) -> Vec<Voice> {
        Vec::new()
    }

    fn speak(
        &self,
        utterance: Utterance,
    ) -> Result<mpsc::UnboundedReceiver<SpeechEvent>, Pdf2SpeechError> {
        debug!("Silent engine skipping {} chars", utterance.text.len());
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(SpeechEvent::Started);
        let _ = tx.send(SpeechEvent::Ended);
        Ok(rx)
    }

    fn cancel(&self) {}

    fn is_speaking(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(name: &str, lang: &str) -> Voice {
        Voice {
            name: name.into(),
            lang: lang.into(),
            id: name.into(),
        }
    }

    fn settings(voice: VoiceGender, wpm: u32) -> ConversionSettings {
        ConversionSettings {
            speed_wpm: wpm,
            voice,
            start_page: 1,
            end_page: 1,
            total_pages: 1,
        }
    }

    #[test]
    fn female_keywords() {
        let voices = [voice("Daniel", "en-GB"), voice("Samantha", "en-US")];
        let v = select_voice(&voices, VoiceGender::Female, "en").unwrap();
        assert_eq!(v.name, "Samantha");
    }

    #[test]
    fn male_does_not_match_female() {
        let voices = [voice("English (female)", "en-GB"), voice("English (male)", "en-GB")];
        let v = select_voice(&voices, VoiceGender::Male, "en").unwrap();
        assert_eq!(v.name, "English (male)");
    }

    #[test]
    fn falls_back_to_first_language_match() {
        let voices = [voice("Thomas", "fr-FR"), voice("Fred", "en-US"), voice("Victoria", "en-US")];
        let v = select_voice(&voices, VoiceGender::Female, "en").unwrap();
        assert_eq!(v.name, "Fred");
    }

    #[test]
    fn alex_counts_as_female() {
        let voices = [voice("Daniel", "en-GB"), voice("Fred", "en-US"), voice("Alex", "en-US")];
        let v = select_voice(&voices, VoiceGender::Female, "en").unwrap();
        assert_eq!(v.name, "Alex");
        let v = select_voice(&voices, VoiceGender::Male, "en").unwrap();
        assert_eq!(v.name, "Daniel");
    }

    #[test]
    fn no_language_match_means_engine_default() {
        let voices = [voice("Thomas", "fr-FR")];
        assert!(select_voice(&voices, VoiceGender::Male, "en").is_none());
        assert!(select_voice(&[], VoiceGender::Male, "en").is_none());
    }

    #[test]
    fn utterance_uses_speed_setting() {
        let u = build_utterance("hi", &settings(VoiceGender::Male, 300), &[], "en");
        assert!((u.rate - 1.5).abs() < f32::EPSILON);
        assert_eq!(u.pitch, 1.0);
        assert_eq!(u.volume, 1.0);
        assert!(u.voice.is_none());
    }

    #[test]
    fn parses_espeak_listing() {
        let listing = "Pty Language       Age/Gender VoiceName          File                 Other Languages\n \
 5  af              --/M      Afrikaans          gmw/af\n \
 2  en-gb           --/M      English_(Great_Britain) gmw/en\n \
 5  en-us           --/F      English_(America)  gmw/en-US\n";
        let voices = parse_espeak_voices(listing);
        assert_eq!(voices.len(), 4);
        assert_eq!(voices[1].name, "English (Great Britain) (male)");
        assert_eq!(voices[2].id, "en-gb+f3");
        assert_eq!(voices[3].name, "English (America) (female)");
        let v = select_voice(&voices, VoiceGender::Female, "en").unwrap();
        assert_eq!(v.id, "en-gb+f3");
    }

    #[test]
    fn parses_say_listing() {
        let listing = "Alex                en_US    # Most people recognize me by my voice.\n\
Bad News            en_US    # The light you see at the end of the tunnel is the headlamp.\n\
Thomas              fr_FR    # Bonjour, je m'appelle Thomas.\n";
        let voices = parse_say_voices(listing);
        assert_eq!(voices.len(), 3);
        assert_eq!(voices[1].name, "Bad News");
        assert_eq!(voices[1].lang, "en-US");
        assert_eq!(voices[2].lang, "fr-FR");
    }

    #[test]
    fn espeak_command_args() {
        let u = Utterance {
            text: "x".into(),
            voice: None,
            rate: 0.75,
            pitch: 1.0,
            volume: 1.0,
        };
        let cmd = SpeechBackend::EspeakNg.command(&u);
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, ["-v", "en", "-s", "150", "-p", "50", "-a", "100", "--stdin"]);
    }

    #[tokio::test]
    async fn silent_engine_starts_and_ends() {
        let engine = SilentSpeechEngine;
        let mut rx = engine.speak(build_utterance("hello", &settings(VoiceGender::Female, 150), &[], "en")).unwrap();
        assert_eq!(rx.recv().await, Some(SpeechEvent::Started));
        assert_eq!(rx.recv().await, Some(SpeechEvent::Ended));
        assert_eq!(rx.recv().await, None);
        assert!(!engine.is_speaking());
    }
}
