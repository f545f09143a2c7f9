//! Resolution state machine: explicit stages and legal transition guards.
//!
//! The controller calls `advance()` to move between stages. Each call checks
//! the edge against the transition table and appends it to the log, so an
//! outcome always carries the exact path the run took.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Stages of one ticket's run.
///
/// Every run starts at `Classifying` and ends at `Delivering` or `Escalating`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionState {
    /// Mapping the ticket to a category.
    Classifying,
    /// Fetching supporting documents (fresh or refined).
    Retrieving,
    /// Generating a candidate response.
    Drafting,
    /// Waiting on the reviewer's verdict.
    Reviewing,
    /// Draft rejected with budget left; feedback carried into the next pass.
    Retrying,
    /// Draft approved. Terminal.
    Delivering,
    /// Handed to a human. Terminal.
    Escalating,
}

impl ResolutionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivering | Self::Escalating)
    }
}

impl fmt::Display for ResolutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classifying => write!(f, "Classifying"),
            Self::Retrieving => write!(f, "Retrieving"),
            Self::Drafting => write!(f, "Drafting"),
            Self::Reviewing => write!(f, "Reviewing"),
            Self::Retrying => write!(f, "Retrying"),
            Self::Delivering => write!(f, "Delivering"),
            Self::Escalating => write!(f, "Escalating"),
        }
    }
}

/// Legal edges:
/// ```text
/// Classifying → Retrieving
/// Retrieving → Drafting
/// Drafting → Reviewing
/// Reviewing → Delivering | Retrying
/// Retrying → Retrieving
/// any non-terminal → Escalating
/// ```
fn is_legal_transition(from: ResolutionState, to: ResolutionState) -> bool {
    use ResolutionState::*;

    if to == Escalating && !from.is_terminal() {
        return true;
    }

    matches!(
        (from, to),
        (Classifying, Retrieving)
            | (Retrieving, Drafting)
            | (Drafting, Reviewing)
            | (Reviewing, Delivering)
            | (Reviewing, Retrying)
            | (Retrying, Retrieving)
    )
}

/// A single recorded transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: ResolutionState,
    pub to: ResolutionState,
    /// Attempt number at the time of transition (0 before the first draft).
    pub attempt: u32,
    /// Milliseconds since the run started.
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Attempted edge not in the transition table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal state transition: {from} → {to}")]
pub struct IllegalTransition {
    pub from: ResolutionState,
    pub to: ResolutionState,
}

/// Tracks the current stage and the full transition log for one run.
#[derive(Debug)]
pub struct StateMachine {
    current: ResolutionState,
    attempt: u32,
    started_at: Instant,
    transitions: Vec<TransitionRecord>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            current: ResolutionState::Classifying,
            attempt: 0,
            started_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> ResolutionState {
        self.current
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Start the next draft+review cycle. Returns the new attempt number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    pub fn advance(
        &mut self,
        to: ResolutionState,
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
            attempt: self.attempt,
            elapsed_ms: self.elapsed_ms(),
            reason: reason.map(String::from),
        };

        tracing::debug!(
            from = %self.current,
            to = %to,
            attempt = self.attempt,
            "State transition"
        );

        self.transitions.push(record);
        self.current = to;
        Ok(())
    }

    /// Move to `Escalating`; legal from every non-terminal stage.
    pub fn escalate(&mut self, reason: &str) -> Result<(), IllegalTransition> {
        self.advance(ResolutionState::Escalating, Some(reason))
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    pub fn into_transitions(self) -> Vec<TransitionRecord> {
        self.transitions
    }

    /// One-line history, e.g. `Classifying → Delivering (12ms, 5 transitions)`.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "{} → {} ({}ms, {} transitions)",
            ResolutionState::Classifying,
            self.current,
            self.elapsed_ms(),
            self.transitions.len(),
        );
        if !self.transitions.is_empty() {
            let path: Vec<String> = self.transitions.iter().map(|t| t.to.to_string()).collect();
            out.push_str(&format!(" [{}]", path.join(" → ")));
        }
        out
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
