//! Where a relay run is, and how it got there.
//!
//! A run walks `Idle → Triggering → Locating → Summarizing → Posting → Done`.
//! Any step can drop to `Failed` instead, after which the run is over. The
//! log of accepted moves ends up in the `RunReport`.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Step of a relay run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Channel resolved, nothing posted yet.
    Idle,
    /// `reportify` is running.
    Triggering,
    /// Picking the newest run under the reports root.
    Locating,
    /// Gemini request in flight.
    Summarizing,
    /// Summary chunks going out.
    Posting,
    /// Summary delivered. Terminal.
    Done,
    /// No report, or an unhandled error. Terminal.
    Failed,
}

impl PipelineState {
    /// `Done` and `Failed` end the run.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Triggering => write!(f, "Triggering"),
            Self::Locating => write!(f, "Locating"),
            Self::Summarizing => write!(f, "Summarizing"),
            Self::Posting => write!(f, "Posting"),
            Self::Done => write!(f, "Done"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Allowed moves. Everything not listed is rejected.
///
/// ```text
/// Idle → Triggering | Failed
/// Triggering → Locating | Failed
/// Locating → Summarizing | Failed
/// Summarizing → Posting | Failed
/// Posting → Done | Failed
/// ```
fn is_legal_transition(from: PipelineState, to: PipelineState) -> bool {
    use PipelineState::*;

    if to == Failed && !from.is_terminal() {
        return true;
    }

    matches!(
        (from, to),
        (Idle, Triggering)
            | (Triggering, Locating)
            | (Locating, Summarizing)
            | (Summarizing, Posting)
            | (Posting, Done)
    )
}

/// One accepted move, as kept in the run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: PipelineState,
    pub to: PipelineState,
    /// Milliseconds since the run started.
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// A move the table does not allow, e.g. posting before a summary exists.
#[derive(Debug, Clone)]
pub struct IllegalTransition {
    pub from: PipelineState,
    pub to: PipelineState,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Illegal state transition: {} → {}", self.from, self.to)
    }
}

impl std::error::Error for IllegalTransition {}

/// Current step of one run plus the moves that led there.
pub struct StateMachine {
    current: PipelineState,
    created_at: Instant,
    transitions: Vec<TransitionRecord>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            current: PipelineState::Idle,
            created_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> PipelineState {
        self.current
    }

    /// Move to `to`, recording `reason` alongside it.
    pub fn advance(
        &mut self,
        to: PipelineState,
        reason: Option<&str>,
    ) -> Result<(), IllegalTransition> {
        if !is_legal_transition(self.current, to) {
            return Err(IllegalTransition {
                from: self.current,
                to,
            });
        }

        let record = TransitionRecord {
            from: self.current,
            to,
            elapsed_ms: self.created_at.elapsed().as_millis() as u64,
            reason: reason.map(String::from),
        };

        tracing::debug!(from = %self.current, to = %to, "State transition");

        self.transitions.push(record);
        self.current = to;
        Ok(())
    }

    /// Stop the run. Rejected once the run has already ended.
    pub fn fail(&mut self, reason: &str) -> Result<(), IllegalTransition> {
        self.advance(PipelineState::Failed, Some(reason))
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// The move log, for the run report.
    pub fn into_transitions(self) -> Vec<TransitionRecord> {
        self.transitions
    }

    /// One-line history, e.g. `Idle → Done (812ms) [Triggering → … → Done]`.
    pub fn summary(&self) -> String {
        let states: Vec<String> = self.transitions.iter().map(|t| t.to.to_string()).collect();
        let mut out = format!(
            "{} → {} ({}ms)",
            PipelineState::Idle,
            self.current,
            self.created_at.elapsed().as_millis(),
        );
        if !states.is_empty() {
            out.push_str(&format!(" [{}]", states.join(" → ")));
        }
        out
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
