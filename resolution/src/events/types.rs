//! Event types emitted during a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::outcome::FailureKind;
use crate::state_machine::ResolutionState;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolutionEvent {
    /// A ticket entered the controller.
    RunStarted {
        ticket_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A collaborator stage began.
    StageEntered {
        ticket_id: String,
        stage: ResolutionState,
        attempt: u32,
        timestamp: DateTime<Utc>,
    },

    /// A collaborator stage returned a result.
    StageCompleted {
        ticket_id: String,
        stage: ResolutionState,
        attempt: u32,
        duration_ms: u64,
        /// Short description of the result ("Billing", "3 documents", ...).
        result: String,
        timestamp: DateTime<Utc>,
    },

    /// A collaborator stage could not produce a result.
    StageFailed {
        ticket_id: String,
        stage: ResolutionState,
        attempt: u32,
        duration_ms: u64,
        failure: FailureKind,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// Terminal outcome decided.
    RunFinished {
        ticket_id: String,
        outcome: String,
        category: Option<Category>,
        attempt_count: u32,
        elapsed_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

impl ResolutionEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::RunStarted { timestamp, .. } => *timestamp,
            Self::StageEntered { timestamp, .. } => *timestamp,
            Self::StageCompleted { timestamp, .. } => *timestamp,
            Self::StageFailed { timestamp, .. } => *timestamp,
            Self::RunFinished { timestamp, .. } => *timestamp,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run_started",
            Self::StageEntered { .. } => "stage_entered",
            Self::StageCompleted { .. } => "stage_completed",
            Self::StageFailed { .. } => "stage_failed",
            Self::RunFinished { .. } => "run_finished",
        }
    }

    pub fn ticket_id(&self) -> &str {
        match self {
            Self::RunStarted { ticket_id, .. }
            | Self::StageEntered { ticket_id, .. }
            | Self::StageCompleted { ticket_id, .. }
            | Self::StageFailed { ticket_id, .. }
            | Self::RunFinished { ticket_id, .. } => ticket_id,
        }
    }

    /// Stage this event refers to, if stage-scoped.
    pub fn stage(&self) -> Option<ResolutionState> {
        match self {
            Self::StageEntered { stage, .. }
            | Self::StageCompleted { stage, .. }
            | Self::StageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
