//! CLI binary for pdf2speech.
//!
//! A thin shim over the library crate: flags become `UiEvent`s that are
//! dispatched to a `ConverterSession` through the standard binding table,
//! and the resulting artifact is written to disk.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2speech::pipeline::simulate::format_time;
use pdf2speech::{
    inspect, BindingTable, CommandSpeechEngine, ConversionMode, ConversionProgressCallback,
    ConversionSettings, ConverterConfig, ConverterSession, EventOutcome, FileUpload,
    Notification, NotificationKind, NotificationListener, PageCounting, PipelinePhase,
    ProgressCallback, ProgressSnapshot, SilentSpeechEngine, SpeechEngine, UiEvent, VoiceGender,
};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a percentage bar whose message carries the
/// status line and the remaining-time estimate.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Latest status line and remaining seconds, combined into the message.
    line: Mutex<(String, u64)>,
    page_errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold:>12}  [{bar:42.green/238}] {pos:>3}%  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(SPINNER);

        bar.set_style(style);
        bar.set_prefix("Ready");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            line: Mutex::new((String::new(), 0)),
            page_errors: AtomicUsize::new(0),
        })
    }

    fn redraw(&self) {
        let line = self.line.lock().unwrap_or_else(|e| e.into_inner());
        let (status, remaining) = &*line;
        if *remaining > 0 {
            self.bar.set_message(format!(
                "{status}  {}",
                dim(&format!("{} left", format_time(*remaining)))
            ));
        } else {
            self.bar.set_message(status.clone());
        }
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, settings: &ConversionSettings, estimated_secs: u64) {
        self.bar.println(format!(
            "{} {}  {}",
            cyan("◆"),
            bold(&format!(
                "Converting pages {}-{} of {}",
                settings.start_page, settings.end_page, settings.total_pages
            )),
            dim(&format!(
                "{} wpm, {} voice, estimated time: {}",
                settings.speed_wpm,
                settings.voice,
                format_time(estimated_secs)
            )),
        ));
        self.line
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .1 = estimated_secs;
    }

    fn on_phase_change(&self, phase: PipelinePhase, status: &str) {
        self.bar.set_prefix(phase.to_string());
        self.line
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .0 = status.to_string();
        self.redraw();
    }

    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        self.bar.set_position(snapshot.percent.round() as u64);
        self.line
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .1 = snapshot.remaining_secs;
        self.redraw();
    }

    fn on_page_complete(&self, page_num: usize, total: usize, text_len: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}  {}",
            green("✓"),
            page_num,
            dim(&format!("{text_len:>6} chars  ({total} selected)")),
        ));
    }

    fn on_page_error(&self, page_num: usize, _total: usize, error: &str) {
        self.page_errors.fetch_add(1, Ordering::SeqCst);
        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} Page {:>3}  {}", red("✗"), page_num, red(&msg)));
    }

    fn on_conversion_complete(&self, phase: PipelinePhase, pages_with_text: usize) {
        self.bar.finish_and_clear();
        let errors = self.page_errors.load(Ordering::SeqCst);
        if phase == PipelinePhase::Done && errors > 0 {
            eprintln!(
                "{} {} pages with text, {} skipped",
                cyan("⚠"),
                bold(&pages_with_text.to_string()),
                red(&errors.to_string())
            );
        }
    }
}

// ── Notifications on stderr ──────────────────────────────────────────────────

/// Prints notifications as coloured lines, above the progress bar when one
/// is active.
struct CliNotifier {
    bar: Option<ProgressBar>,
    quiet: bool,
}

impl NotificationListener for CliNotifier {
    fn on_notification(&self, n: &Notification) {
        if self.quiet && n.kind != NotificationKind::Error {
            return;
        }
        let line = match n.kind {
            NotificationKind::Success => format!("{} {}", green("✔"), n.message),
            NotificationKind::Error => format!("{} {}", red("✘"), red(&n.message)),
            NotificationKind::Info => format!("{} {}", cyan("ℹ"), n.message),
        };
        match &self.bar {
            Some(bar) if !bar.is_finished() => bar.println(line),
            _ => eprintln!("{line}"),
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract pages 1-10 and read them aloud with a female voice
  pdf2speech --start 1 --end 10 --voice female report.pdf

  # Read again from the start if the speech stage already finished
  pdf2speech --play book.pdf

  # Transcript only, no speech engine needed
  pdf2speech --no-speech -o out/ paper.pdf

  # Simulated run with the size-based page estimate (no pdfium needed)
  pdf2speech --simulate --estimate-pages slides.pdf

  # Inspect file name, size and page count
  pdf2speech --inspect-only document.pdf

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  PDF2SPEECH_*            Every flag can also be set via its variable
  RUST_LOG                Override the log filter

SPEECH ENGINES:
  espeak-ng, espeak (Linux) or say (macOS) are detected on PATH.
  Without one, conversions still produce the transcript.
  The program stays open until reading ends; Ctrl-C stops playback.
"#;

/// Convert PDF files to text and read them aloud.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2speech",
    version,
    about = "Convert PDF files to text and read them aloud",
    long_about = "Extract the text of selected PDF pages, read it aloud with the host's speech \
engine and save a transcript. Simulated mode produces a placeholder audio file on a timer instead.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path.
    input: PathBuf,

    /// Directory to write the artifact into.
    #[arg(short, long = "output-dir", env = "PDF2SPEECH_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Speech speed in words per minute (50–400).
    #[arg(long, env = "PDF2SPEECH_SPEED", default_value_t = pdf2speech::DEFAULT_SPEED_WPM,
          value_parser = clap::value_parser!(u32).range(50..=400))]
    speed: u32,

    /// Voice gender preference.
    #[arg(long, env = "PDF2SPEECH_VOICE", value_enum, default_value = "male")]
    voice: VoiceArg,

    /// First page to convert (1-indexed).
    #[arg(long, env = "PDF2SPEECH_START", allow_negative_numbers = true)]
    start: Option<i64>,

    /// Last page to convert (1-indexed, inclusive).
    #[arg(long, env = "PDF2SPEECH_END", allow_negative_numbers = true)]
    end: Option<i64>,

    /// Tick through the phases on a timer and emit a placeholder audio file.
    #[arg(long, env = "PDF2SPEECH_SIMULATE")]
    simulate: bool,

    /// Estimate the page count from the file size instead of parsing.
    #[arg(long, env = "PDF2SPEECH_ESTIMATE_PAGES")]
    estimate_pages: bool,

    /// Do not use a speech engine; only extract text.
    #[arg(long, env = "PDF2SPEECH_NO_SPEECH")]
    no_speech: bool,

    /// After converting, start reading again if playback already finished.
    #[arg(long, env = "PDF2SPEECH_PLAY", conflicts_with_all = ["no_speech", "simulate"])]
    play: bool,

    /// Finish the speech stage after this many ms even without an end event.
    #[arg(long, env = "PDF2SPEECH_FALLBACK_MS", default_value_t = 2000)]
    fallback_ms: u64,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2SPEECH_PASSWORD")]
    password: Option<String>,

    /// Path to libpdfium (file or directory).
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Print file name, size and page count only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Output structured JSON instead of human-readable text.
    #[arg(long, env = "PDF2SPEECH_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2SPEECH_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2SPEECH_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2SPEECH_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum VoiceArg {
    Male,
    Female,
}

impl From<VoiceArg> for VoiceGender {
    fn from(v: VoiceArg) -> Self {
        match v {
            VoiceArg::Male => VoiceGender::Male,
            VoiceArg::Female => VoiceGender::Female,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(&cli, progress.clone().map(|p| p as ProgressCallback))?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let info = inspect(&cli.input, &config)
            .await
            .context("Failed to inspect PDF")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&info).context("Failed to serialize document info")?
            );
        } else {
            println!("File:   {}", info.file_name);
            println!("Size:   {} ({} bytes)", info.size_display, info.size_bytes);
            println!("Pages:  {}", info.page_count);
        }
        return Ok(());
    }

    // ── Session ──────────────────────────────────────────────────────────
    let engine = speech_engine(&cli);
    let session = ConverterSession::new(config, engine).with_notification_listener(Arc::new(
        CliNotifier {
            bar: progress.as_ref().map(|p| p.bar.clone()),
            quiet: cli.quiet || cli.json,
        },
    ));

    let table = BindingTable::standard();
    table.validate().context("Event bindings are incomplete")?;

    // ── Drive the session like a user would ──────────────────────────────
    let upload = FileUpload::from_path(&cli.input)
        .with_context(|| format!("Failed to open {}", cli.input.display()))?;
    let outcome = table
        .dispatch(&session, UiEvent::FileSelected(upload))
        .await
        .context("Upload rejected")?;
    if let EventOutcome::Loaded(info) = &outcome {
        if !cli.quiet && !cli.json {
            eprintln!(
                "{} {}  {}",
                cyan("◆"),
                bold(&info.file_name),
                dim(&format!("{}, {} pages", info.size_display, info.page_count))
            );
        }
    }

    let mut edits = vec![
        UiEvent::SpeedChanged(cli.speed),
        UiEvent::VoiceChanged(cli.voice.into()),
    ];
    edits.extend(cli.start.map(UiEvent::StartPageChanged));
    edits.extend(cli.end.map(UiEvent::EndPageChanged));
    for event in edits {
        table.dispatch(&session, event).await?;
    }

    let output = match table.dispatch(&session, UiEvent::ConvertClicked).await {
        Ok(EventOutcome::Converted(output)) => output,
        Ok(other) => anyhow::bail!("unexpected outcome from convert: {other:?}"),
        Err(e) => return Err(anyhow::Error::new(e).context("Conversion failed")),
    };

    let artifact = session
        .take_artifact()
        .context("Conversion finished without an artifact")?;
    let path = artifact
        .save_to(&cli.output_dir)
        .context("Failed to save artifact")?;

    // ── Report ───────────────────────────────────────────────────────────
    if cli.json {
        let report = serde_json::json!({
            "artifact_path": path,
            "artifact": &output.artifact,
            "stats": &output.stats,
            "pages": &output.pages,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise output")?
        );
    } else if !cli.quiet {
        let s = &output.stats;
        eprintln!(
            "{}  {}/{} pages with text  {} words  {}ms  →  {}",
            if s.failed_pages == 0 { green("✔") } else { cyan("⚠") },
            s.pages_with_text,
            s.selected_pages,
            s.word_count,
            s.total_duration_ms,
            bold(&path.display().to_string()),
        );
    }

    // Playback outlives the run; exiting would kill the speech process.
    if cli.play && !session.status().speaking {
        table
            .dispatch(&session, UiEvent::SpeechToggled)
            .await
            .context("Playback failed")?;
    }
    if session.status().speaking {
        play_to_end(&table, &session, cli.quiet).await?;
    }

    Ok(())
}

/// Map CLI args to `ConverterConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConverterConfig> {
    let mut builder = ConverterConfig::builder()
        .mode(if cli.simulate {
            ConversionMode::Simulated
        } else {
            ConversionMode::Extract
        })
        .page_counting(if cli.estimate_pages {
            PageCounting::Estimate
        } else {
            PageCounting::Parse
        })
        .speech_fallback_ms(cli.fallback_ms);

    if let Some(ref path) = cli.pdfium_lib {
        builder = builder.pdfium_library(path);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// The host speech engine, or a silent one when speech is off or missing.
fn speech_engine(cli: &Cli) -> Arc<dyn SpeechEngine> {
    if cli.no_speech || cli.simulate {
        return Arc::new(SilentSpeechEngine);
    }
    match CommandSpeechEngine::detect() {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            if !cli.quiet {
                eprintln!("{} {}", cyan("⚠"), e);
            }
            Arc::new(SilentSpeechEngine)
        }
    }
}

/// Wait for playback to end. Ctrl-C stops it.
async fn play_to_end(table: &BindingTable, session: &ConverterSession, quiet: bool) -> Result<()> {
    if !quiet {
        eprintln!("{} Playing… {}", cyan("▶"), dim("(Ctrl-C to stop)"));
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            if session.status().speaking {
                table.dispatch(session, UiEvent::SpeechToggled).await?;
            }
        }
        _ = session.wait_for_silence(Duration::from_millis(250)) => {}
    }
    Ok(())
}
