//! Pipeline phases and their legal transitions.
//!
//! ```text
//! Idle ─▶ Analyzing ─▶ Extracting ─▶ Synthesizing ─▶ Finalizing ─▶ Done
//!   │         │             │              │              │
//!   └─────────┴─────────────┴──────────────┴──────────────┴──▶ Failed
//! ```
//!
//! Transitions only move forward. `Done` and `Failed` are terminal for the
//! run; a new run starts from a fresh `Idle`.

use crate::error::Pdf2SpeechError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discrete stage of the conversion state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PipelinePhase {
    #[default]
    Idle,
    Analyzing,
    Extracting,
    Synthesizing,
    Finalizing,
    Done,
    Failed,
}

impl PipelinePhase {
    fn rank(self) -> u8 {
        match self {
            PipelinePhase::Idle => 0,
            PipelinePhase::Analyzing => 1,
            PipelinePhase::Extracting => 2,
            PipelinePhase::Synthesizing => 3,
            PipelinePhase::Finalizing => 4,
            PipelinePhase::Done => 5,
            PipelinePhase::Failed => 6,
        }
    }

    /// True once the run has finished, successfully or not.
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelinePhase::Done | PipelinePhase::Failed)
    }

    /// True while a run owns the pipeline.
    pub fn is_active(self) -> bool {
        !self.is_terminal() && self != PipelinePhase::Idle
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: PipelinePhase) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            PipelinePhase::Failed => true,
            PipelinePhase::Done => self == PipelinePhase::Finalizing,
            _ => next.rank() > self.rank(),
        }
    }

    /// Move to `next`, rejecting backwards or out-of-terminal transitions.
    pub fn advance(self, next: PipelinePhase) -> Result<PipelinePhase, Pdf2SpeechError> {
        if self.can_advance_to(next) {
            Ok(next)
        } else {
            Err(Pdf2SpeechError::Internal(format!(
                "illegal phase transition {self} → {next}"
            )))
        }
    }

    /// Default status line shown while in this phase.
    pub fn status_text(self) -> &'static str {
        match self {
            PipelinePhase::Idle => "Ready",
            PipelinePhase::Analyzing => "Analyzing PDF content...",
            PipelinePhase::Extracting => "Extracting text from PDF...",
            PipelinePhase::Synthesizing => "Converting text to speech...",
            PipelinePhase::Finalizing => "Finalizing output...",
            PipelinePhase::Done => "Conversion complete",
            PipelinePhase::Failed => "Conversion failed",
        }
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelinePhase::Idle => "idle",
            PipelinePhase::Analyzing => "analyzing",
            PipelinePhase::Extracting => "extracting",
            PipelinePhase::Synthesizing => "synthesizing",
            PipelinePhase::Finalizing => "finalizing",
            PipelinePhase::Done => "done",
            PipelinePhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PipelinePhase::*;

    #[test]
    fn forward_path_is_legal() {
        let mut p = Idle;
        for next in [Analyzing, Extracting, Synthesizing, Finalizing, Done] {
            p = p.advance(next).expect("forward step");
        }
        assert_eq!(p, Done);
    }

    #[test]
    fn backwards_is_rejected() {
        assert!(!Synthesizing.can_advance_to(Extracting));
        assert!(Extracting.advance(Analyzing).is_err());
        assert!(!Extracting.can_advance_to(Extracting));
    }

    #[test]
    fn any_live_phase_can_fail() {
        for p in [Idle, Analyzing, Extracting, Synthesizing, Finalizing] {
            assert!(p.can_advance_to(Failed), "{p} should be able to fail");
        }
    }

    #[test]
    fn terminal_phases_are_sticky() {
        assert!(!Done.can_advance_to(Analyzing));
        assert!(!Failed.can_advance_to(Idle));
        assert!(!Failed.can_advance_to(Failed));
    }

    #[test]
    fn done_only_after_finalizing() {
        assert!(!Synthesizing.can_advance_to(Done));
        assert!(Finalizing.can_advance_to(Done));
    }

    #[test]
    fn activity() {
        assert!(!Idle.is_active());
        assert!(Extracting.is_active());
        assert!(!Done.is_active());
    }
}
