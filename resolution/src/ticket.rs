//! Ticket: the immutable customer request that starts a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Maximum subject length in characters.
pub const MAX_SUBJECT_CHARS: usize = 200;
/// Maximum description length in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 5000;

/// Rejected ticket input. Raised before a run exists, so never an escalation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TicketError {
    #[error("subject must be a non-empty string")]
    EmptySubject,

    #[error("description must be a non-empty string")]
    EmptyDescription,

    #[error("subject must be {max} characters or less (got {len})")]
    SubjectTooLong { len: usize, max: usize },

    #[error("description must be {max} characters or less (got {len})")]
    DescriptionTooLong { len: usize, max: usize },
}

/// A submitted support ticket.
///
/// Fields are private: a `Ticket` is built once through [`Ticket::new`] and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    id: String,
    subject: String,
    description: String,
    submitted_at: DateTime<Utc>,
}

impl Ticket {
    /// Validate and normalise raw input into a ticket with a fresh id.
    pub fn new(subject: &str, description: &str) -> Result<Self, TicketError> {
        Self::with_id(Uuid::new_v4().to_string(), subject, description)
    }

    /// Same as [`Ticket::new`] but with a caller-supplied id (e.g. from an
    /// upstream helpdesk).
    pub fn with_id(
        id: impl Into<String>,
        subject: &str,
        description: &str,
    ) -> Result<Self, TicketError> {
        let subject = clean_text(subject);
        let description = clean_text(description);

        if subject.is_empty() {
            return Err(TicketError::EmptySubject);
        }
        if description.is_empty() {
            return Err(TicketError::EmptyDescription);
        }

        let subject_len = subject.chars().count();
        if subject_len > MAX_SUBJECT_CHARS {
            return Err(TicketError::SubjectTooLong {
                len: subject_len,
                max: MAX_SUBJECT_CHARS,
            });
        }
        let description_len = description.chars().count();
        if description_len > MAX_DESCRIPTION_CHARS {
            return Err(TicketError::DescriptionTooLong {
                len: description_len,
                max: MAX_DESCRIPTION_CHARS,
            });
        }

        Ok(Self {
            id: id.into(),
            subject,
            description,
            submitted_at: Utc::now(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    /// Subject and description joined, the text classifiers see.
    pub fn text(&self) -> String {
        format!("{} {}", self.subject, self.description)
    }
}

/// Collapse whitespace runs to single spaces and drop control characters.
pub fn clean_text(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| word.chars().filter(|c| !c.is_control()).collect::<String>())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
