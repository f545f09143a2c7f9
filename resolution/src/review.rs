//! Drafts, review verdicts and the per-attempt record.

use serde::{Deserialize, Serialize};

use crate::context::{ContextBundle, ContextSummary};

/// One candidate response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    /// Attempt that produced this draft (1-indexed).
    pub attempt: u32,
    /// Response text.
    pub text: String,
    /// Rejection feedback the generator was given, if this is a retry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

/// Reviewer judgement on a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReviewVerdict {
    Approved {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notes: Option<String>,
    },
    Rejected {
        feedback: String,
    },
}

impl ReviewVerdict {
    pub fn approved() -> Self {
        Self::Approved { notes: None }
    }

    pub fn approved_with_notes(notes: impl Into<String>) -> Self {
        Self::Approved {
            notes: Some(notes.into()),
        }
    }

    pub fn rejected(feedback: impl Into<String>) -> Self {
        Self::Rejected {
            feedback: feedback.into(),
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved { .. })
    }

    /// Rejection feedback, `None` for approvals.
    pub fn feedback(&self) -> Option<&str> {
        match self {
            Self::Approved { .. } => None,
            Self::Rejected { feedback } => Some(feedback),
        }
    }

    /// A rejection must say why; its text is the only refinement signal
    /// for the next attempt.
    pub fn honours_contract(&self) -> bool {
        match self {
            Self::Approved { .. } => true,
            Self::Rejected { feedback } => !feedback.trim().is_empty(),
        }
    }
}

impl std::fmt::Display for ReviewVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Approved { .. } => write!(f, "approved"),
            Self::Rejected { .. } => write!(f, "rejected"),
        }
    }
}

/// A complete draft+review cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub context: ContextBundle,
    pub draft: Draft,
    pub verdict: ReviewVerdict,
    /// Wall-clock time from retrieval start to verdict.
    pub duration_ms: u64,
}

/// What the outcome sink keeps of an attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub attempt: u32,
    pub context: ContextSummary,
    pub draft: String,
    pub verdict: ReviewVerdict,
}

impl From<&AttemptRecord> for AttemptSummary {
    fn from(record: &AttemptRecord) -> Self {
        Self {
            attempt: record.attempt,
            context: record.context.summary(),
            draft: record.draft.text.clone(),
            verdict: record.verdict.clone(),
        }
    }
}
