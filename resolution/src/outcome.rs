//! Terminal results of a run.

use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::review::AttemptRecord;
use crate::state_machine::TransitionRecord;

/// Message shown to the customer when a ticket goes to a human.
pub const ESCALATION_NOTICE: &str = "This ticket has been escalated to our human support team \
for personalized assistance. A support specialist will review your case and provide a detailed \
response within our standard response time. Thank you for your patience.";

const SIGN_OFF: &str = "Best regards,\nCustomer Support Team";

/// Which collaborator could not produce a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Classification,
    Retrieval,
    Generation,
    Review,
    /// The controller attempted an illegal transition.
    Workflow,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Classification => write!(f, "classification failure"),
            Self::Retrieval => write!(f, "retrieval failure"),
            Self::Generation => write!(f, "generation failure"),
            Self::Review => write!(f, "review failure"),
            Self::Workflow => write!(f, "workflow violation"),
        }
    }
}

/// Why a ticket was escalated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EscalationReason {
    /// Every attempt was rejected; carries the last rejection text.
    PolicyRejection { feedback: String },
    /// A collaborator failed outright.
    Failure { failure: FailureKind, error: String },
}

impl EscalationReason {
    /// The reason text recorded for human agents.
    pub fn message(&self) -> &str {
        match self {
            Self::PolicyRejection { feedback } => feedback,
            Self::Failure { error, .. } => error,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::PolicyRejection { .. } => None,
            Self::Failure { failure, .. } => Some(*failure),
        }
    }
}

impl std::fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PolicyRejection { feedback } => write!(f, "rejected: {}", feedback),
            Self::Failure { failure, error } => write!(f, "{}: {}", failure, error),
        }
    }
}

/// An approved response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub ticket_id: String,
    pub category: Category,
    /// Approved draft text, unchanged.
    pub response: String,
    /// All cycles, the approved one last.
    pub attempts: Vec<AttemptRecord>,
    pub transitions: Vec<TransitionRecord>,
}

impl Delivery {
    pub fn attempt_count(&self) -> u32 {
        self.attempts.len() as u32
    }

    /// Response with the category closing and sign-off appended.
    pub fn customer_reply(&self) -> String {
        format_response(&self.response, self.category)
    }
}

/// A ticket handed to a human.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Escalation {
    pub ticket_id: String,
    /// `None` when classification itself failed.
    pub category: Option<Category>,
    pub reason: EscalationReason,
    /// Attempt number in progress when the run stopped; 0 if no attempt
    /// started (classification failure).
    pub attempt_count: u32,
    /// Completed draft+review cycles, in order.
    pub attempts: Vec<AttemptRecord>,
    pub transitions: Vec<TransitionRecord>,
}

/// Terminal result of `resolve`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Delivered(Delivery),
    Escalated(Escalation),
}

impl Outcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }

    pub fn is_escalated(&self) -> bool {
        matches!(self, Self::Escalated(_))
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Delivered(_) => "delivered",
            Self::Escalated(_) => "escalated",
        }
    }

    pub fn ticket_id(&self) -> &str {
        match self {
            Self::Delivered(d) => &d.ticket_id,
            Self::Escalated(e) => &e.ticket_id,
        }
    }

    pub fn category(&self) -> Option<Category> {
        match self {
            Self::Delivered(d) => Some(d.category),
            Self::Escalated(e) => e.category,
        }
    }

    pub fn attempt_count(&self) -> u32 {
        match self {
            Self::Delivered(d) => d.attempt_count(),
            Self::Escalated(e) => e.attempt_count,
        }
    }

    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            Self::Delivered(d) => &d.attempts,
            Self::Escalated(e) => &e.attempts,
        }
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        match self {
            Self::Delivered(d) => &d.transitions,
            Self::Escalated(e) => &e.transitions,
        }
    }

    /// What the customer sees.
    pub fn customer_message(&self) -> String {
        match self {
            Self::Delivered(d) => d.customer_reply(),
            Self::Escalated(_) => ESCALATION_NOTICE.to_string(),
        }
    }
}

/// Format an approved draft for the customer.
pub fn format_response(draft: &str, category: Category) -> String {
    format!("{}\n\n{}\n\n{}", draft.trim(), category.closing(), SIGN_OFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_response_appends_closing() {
        let reply = format_response("  Your refund is on its way.\n", Category::Billing);
        assert!(reply.starts_with("Your refund is on its way.\n\n"));
        assert!(reply.contains("additional billing questions"));
        assert!(reply.ends_with("Customer Support Team"));
    }

    #[test]
    fn test_reason_message() {
        let reason = EscalationReason::PolicyRejection {
            feedback: "no citation".into(),
        };
        assert_eq!(reason.message(), "no citation");
        assert_eq!(reason.failure_kind(), None);
        assert_eq!(reason.to_string(), "rejected: no citation");

        let reason = EscalationReason::Failure {
            failure: FailureKind::Retrieval,
            error: "index offline".into(),
        };
        assert_eq!(reason.failure_kind(), Some(FailureKind::Retrieval));
        assert_eq!(reason.to_string(), "retrieval failure: index offline");
    }

    #[test]
    fn test_outcome_serde_tag() {
        let outcome = Outcome::Escalated(Escalation {
            ticket_id: "t-1".into(),
            category: None,
            reason: EscalationReason::Failure {
                failure: FailureKind::Classification,
                error: "model offline".into(),
            },
            attempt_count: 0,
            attempts: vec![],
            transitions: vec![],
        });
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "escalated");
        assert_eq!(json["reason"]["kind"], "failure");
        assert_eq!(json["reason"]["failure"], "classification");

        let restored: Outcome = serde_json::from_value(json).unwrap();
        assert_eq!(restored, outcome);
        assert_eq!(restored.customer_message(), ESCALATION_NOTICE);
    }
}
