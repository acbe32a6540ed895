//! Simulated conversion: tick through the phases on a timer.
//!
//! The run lasts the estimated duration. Every tick moves the percentage
//! linearly (`ticks × 100 / total_ticks`), and the status line follows a
//! fixed table of weighted steps.

use crate::phase::PipelinePhase;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// One weighted step of the simulated run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimStep {
    pub phase: PipelinePhase,
    /// Share of the whole run; the table sums to 1.
    pub weight: f64,
    pub status: &'static str,
}

pub const SIM_STEPS: [SimStep; 5] = [
    SimStep {
        phase: PipelinePhase::Analyzing,
        weight: 0.1,
        status: "Analyzing PDF content...",
    },
    SimStep {
        phase: PipelinePhase::Extracting,
        weight: 0.3,
        status: "Extracting text from pages...",
    },
    SimStep {
        phase: PipelinePhase::Synthesizing,
        weight: 0.2,
        status: "Processing text for speech synthesis...",
    },
    SimStep {
        phase: PipelinePhase::Synthesizing,
        weight: 0.3,
        status: "Generating audio with selected voice...",
    },
    SimStep {
        phase: PipelinePhase::Finalizing,
        weight: 0.1,
        status: "Finalizing MP3 file...",
    },
];

/// Index into [`SIM_STEPS`] of the step covering `percent`.
pub fn step_index(percent: f64) -> usize {
    let mut cumulative = 0.0;
    for (i, step) in SIM_STEPS.iter().enumerate() {
        cumulative += step.weight * 100.0;
        // Small epsilon so 40.0 lands in step 2 despite 0.1 + 0.3 rounding.
        if percent < cumulative - 1e-9 {
            return i;
        }
    }
    SIM_STEPS.len() - 1
}

/// Human-readable duration: `45 seconds`, `2 minutes`, `8m 20s`.
pub fn format_time(secs: u64) -> String {
    if secs < 60 {
        return format!("{secs} seconds");
    }
    let (m, s) = (secs / 60, secs % 60);
    match (m, s) {
        (1, 0) => "1 minute".to_string(),
        (m, 0) => format!("{m} minutes"),
        (m, s) => format!("{m}m {s}s"),
    }
}

/// One timer update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimTick {
    pub percent: f64,
    pub step: usize,
}

/// Run the timer until it reaches 100%, calling `on_tick` after every tick.
///
/// The last call always carries `percent == 100.0`.
pub async fn run_simulation(estimated_secs: u64, tick: Duration, mut on_tick: impl FnMut(SimTick)) {
    let tick_ms = tick.as_millis().max(1) as u64;
    let total_ticks = (estimated_secs.saturating_mul(1000) / tick_ms).max(1);
    debug!("Simulating {}s as {} ticks of {}ms", estimated_secs, total_ticks, tick_ms);

    let mut timer = interval_at(Instant::now() + tick, tick);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    for n in 1..=total_ticks {
        timer.tick().await;
        let percent = (n as f64 * 100.0 / total_ticks as f64).min(100.0);
        on_tick(SimTick {
            percent,
            step: step_index(percent),
        });
    }
}
