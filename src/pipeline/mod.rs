//! Pipeline stages for PDF-to-speech conversion.
//!
//! Each submodule implements one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! intake ──▶ range ──▶ extract ──▶ postprocess ──▶ speech
//! (upload)   (pages)   (pdfium)    (cleanup)       (host engine)
//!                 └──────────▶ simulate (timer-driven runs)
//! ```
//!
//! 1. [`intake`]  : validate the declared media type and size, stage the bytes
//! 2. [`range`]   : clamp the start/end page fields against the page count
//! 3. [`extract`]: read the text layer page by page; blocking, because
//!    pdfium is not async-safe
//! 4. [`postprocess`]: deterministic cleanup so the text reads well aloud
//! 5. [`speech`]  : pick a voice and drive the host speech engine
//! 6. [`simulate`]: the timer that stands in for 3–5 in simulated runs

pub mod extract;
pub mod intake;
pub mod postprocess;
pub mod range;
pub mod simulate;
pub mod speech;
