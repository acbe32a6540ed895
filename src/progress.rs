//! Progress reporting: the callback trait and the monotonic tracker.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConverterConfigBuilder::progress_callback`] to receive
//! phase changes, percentage updates and per-page events as a run advances.
//!
//! [`ProgressTracker`] owns the percentage while a run is live. It never lets
//! the value go backwards and reports 100 exactly once, so a callback can
//! drive a progress bar without guarding against jitter.
//!
//! # Example
//!
//! ```rust
//! use pdf2speech::{ConversionProgressCallback, ConverterConfig, ProgressSnapshot};
//! use std::sync::{Arc, Mutex};
//!
//! struct LastPercent(Mutex<f64>);
//!
//! impl ConversionProgressCallback for LastPercent {
//!     fn on_progress(&self, snapshot: &ProgressSnapshot) {
//!         *self.0.lock().unwrap() = snapshot.percent;
//!     }
//! }
//!
//! let cb = Arc::new(LastPercent(Mutex::new(0.0)));
//! let config = ConverterConfig::builder()
//!     .progress_callback(cb as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::config::ConversionSettings;
use crate::phase::PipelinePhase;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Called by the conversion pipeline as it moves through a run.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Extraction happens on a blocking thread but events
/// are delivered from the async side, one at a time.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once when a run claims the pipeline.
    ///
    /// # Arguments
    /// * `settings`: the snapshot this run will use
    /// * `estimated_secs`: estimated total duration
    fn on_conversion_start(&self, settings: &ConversionSettings, estimated_secs: u64) {
        let _ = (settings, estimated_secs);
    }

    /// Called on every phase transition and on status-line changes within
    /// a phase.
    fn on_phase_change(&self, phase: PipelinePhase, status: &str) {
        let _ = (phase, status);
    }

    /// Called whenever the percentage moves forward.
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        let _ = snapshot;
    }

    /// Called just before a page's text is extracted.
    ///
    /// # Arguments
    /// * `page_num`: 1-indexed page number
    /// * `total_pages`: pages selected for this run
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page yields its text (possibly empty).
    fn on_page_complete(&self, page_num: usize, total_pages: usize, text_len: usize) {
        let _ = (page_num, total_pages, text_len);
    }

    /// Called when a page fails; extraction continues with the next page.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after a run ends.
    ///
    /// # Arguments
    /// * `phase`: `Done` or `Failed`
    /// * `pages_with_text`: selected pages that produced text
    fn on_conversion_complete(&self, phase: PipelinePhase, pages_with_text: usize) {
        let _ = (phase, pages_with_text);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConverterConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

/// Point-in-time view of a run's progress.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Percentage in `[0, 100]`.
    pub percent: f64,
    /// Estimated seconds left.
    pub remaining_secs: u64,
}

/// Seconds left when `percent` of an `estimated_total_secs` run is done.
pub fn remaining_secs(estimated_total_secs: u64, percent: f64) -> u64 {
    let left = (100.0 - percent.clamp(0.0, 100.0)) / 100.0;
    (estimated_total_secs as f64 * left).ceil() as u64
}

/// Monotonic percentage owned by a single run.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    percent: f64,
    estimated_total_secs: u64,
    completed: bool,
}

impl ProgressTracker {
    pub fn new(estimated_total_secs: u64) -> Self {
        Self {
            percent: 0.0,
            estimated_total_secs,
            completed: false,
        }
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            percent: self.percent,
            remaining_secs: remaining_secs(self.estimated_total_secs, self.percent),
        }
    }

    /// Move to `percent`. Returns the new snapshot, or `None` when the value
    /// would not move forward or the run already reached 100.
    pub fn advance(&mut self, percent: f64) -> Option<ProgressSnapshot> {
        if self.completed || percent.is_nan() {
            return None;
        }
        let percent = percent.clamp(0.0, 100.0);
        if percent <= self.percent {
            debug!(
                "ignoring non-increasing progress {:.1} (at {:.1})",
                percent, self.percent
            );
            return None;
        }
        self.percent = percent;
        if percent >= 100.0 {
            self.completed = true;
        }
        Some(self.snapshot())
    }

    /// Force 100. Returns `None` if 100 was already reported.
    pub fn complete(&mut self) -> Option<ProgressSnapshot> {
        self.advance(100.0)
    }
}
