//! Draft reviewer agents.
//!
//! Both reviewers see only the ticket, the retrieved documents and the
//! draft. A rejection always carries feedback for the next attempt.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use resolution::{CollaboratorError, ContextBundle, Draft, ReviewVerdict, Reviewer, Ticket};
use tracing::debug;

use crate::knowledge::tokenize;
use crate::llm::{ChatModel, ChatRequest};
use crate::prompts;

/// LLM reviewer expecting `APPROVED` or `REJECTED: <feedback>`.
pub struct LlmReviewer {
    model: Arc<dyn ChatModel>,
}

impl LlmReviewer {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

/// Negations of APPROVED that count as a rejection.
const NEGATED_APPROVALS: &[&str] = &["NOT APPROVED", "UNAPPROVED", "DISAPPROVED"];

/// Parse a reviewer reply into a verdict.
///
/// The first line decides. When it carries neither keyword the whole reply
/// is searched: REJECTED first, then a negated approval ("not approved"),
/// then APPROVED. A negated approval is a rejection whose feedback is the
/// rest of the reply. A reply with no keyword at all is invalid output.
pub fn parse_verdict(reply: &str) -> Result<ReviewVerdict, CollaboratorError> {
    let reply = reply.trim();
    // ASCII upper-casing keeps byte offsets aligned with `reply`.
    let upper = reply.to_ascii_uppercase();
    let lead = upper.len() - upper.trim_start_matches(|c: char| !c.is_alphanumeric()).len();

    if upper[lead..].starts_with("APPROVED") {
        let notes = strip_separator(&reply[lead + "APPROVED".len()..]);
        return Ok(if notes.is_empty() {
            ReviewVerdict::approved()
        } else {
            ReviewVerdict::approved_with_notes(notes)
        });
    }
    if upper[lead..].starts_with("REJECTED") {
        let feedback = strip_separator(&reply[lead + "REJECTED".len()..]);
        return Ok(ReviewVerdict::rejected(feedback));
    }
    if let Some(at) = upper.find("REJECTED") {
        let feedback = strip_separator(&reply[at + "REJECTED".len()..]);
        return Ok(ReviewVerdict::rejected(feedback));
    }
    if let Some((at, len)) = NEGATED_APPROVALS
        .iter()
        .filter_map(|phrase| upper.find(phrase).map(|at| (at, phrase.len())))
        .min()
    {
        let feedback = strip_separator(&reply[at + len..]);
        return Ok(ReviewVerdict::rejected(if feedback.is_empty() {
            reply
        } else {
            feedback
        }));
    }
    if upper.contains("APPROVED") {
        return Ok(ReviewVerdict::approved_with_notes(reply));
    }
    Err(CollaboratorError::InvalidOutput(format!(
        "review reply has no verdict: {}",
        reply.chars().take(80).collect::<String>()
    )))
}

fn strip_separator(text: &str) -> &str {
    let is_separator = |c: char| matches!(c, ':' | '-' | '*' | '.' | ',') || c.is_whitespace();
    text.trim_start_matches(is_separator).trim_end()
}

#[async_trait]
impl Reviewer for LlmReviewer {
    fn name(&self) -> &str {
        "llm-reviewer"
    }

    async fn review(
        &self,
        ticket: &Ticket,
        context: &ContextBundle,
        draft: &Draft,
    ) -> Result<ReviewVerdict, CollaboratorError> {
        let request = ChatRequest::new(prompts::review_prompt(ticket, context, draft))
            .system(prompts::REVIEWER_PREAMBLE)
            .temperature(0.1)
            .max_tokens(500);
        let reply = self.model.complete(request).await?;
        let verdict = parse_verdict(&reply)?;
        debug!(attempt = draft.attempt, verdict = %verdict, "Draft reviewed");
        Ok(verdict)
    }
}

/// Offline rule-based reviewer.
#[derive(Debug, Clone)]
pub struct PolicyReviewer {
    pub min_chars: usize,
    pub forbidden_phrases: Vec<String>,
}

const MIN_DRAFT_CHARS: usize = 80;

/// Phrases a support reply must never contain.
const FORBIDDEN_PHRASES: &[&str] = &[
    "send us your password",
    "share your password",
    "your password is",
    "full card number",
    "we guarantee",
];

/// Shortest word that counts as evidence of grounding.
const MIN_EVIDENCE_CHARS: usize = 4;

impl Default for PolicyReviewer {
    fn default() -> Self {
        Self {
            min_chars: MIN_DRAFT_CHARS,
            forbidden_phrases: FORBIDDEN_PHRASES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

fn significant_words(text: &str) -> HashSet<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| !t.contains(' ') && t.chars().count() >= MIN_EVIDENCE_CHARS)
        .collect()
}

impl PolicyReviewer {
    /// Every rule the draft breaks, as feedback sentences.
    pub fn violations(&self, ticket: &Ticket, context: &ContextBundle, draft: &str) -> Vec<String> {
        let mut problems = Vec::new();
        let lowered = draft.to_lowercase();

        if draft.trim().chars().count() < self.min_chars {
            problems.push(
                "The reply is too short to resolve the issue; explain the concrete next steps."
                    .to_string(),
            );
        }

        for phrase in &self.forbidden_phrases {
            if lowered.contains(phrase.as_str()) {
                problems.push(format!("Remove \"{phrase}\"; it violates support policy."));
            }
        }

        let draft_words = significant_words(draft);
        let subject_words = significant_words(ticket.subject());
        if !subject_words.is_empty() && subject_words.is_disjoint(&draft_words) {
            problems.push(format!(
                "Acknowledge the customer's issue (\"{}\") directly.",
                ticket.subject()
            ));
        }

        if let Some(top) = context.documents().first() {
            let grounded = context
                .documents()
                .iter()
                .any(|doc| !significant_words(&doc.content).is_disjoint(&draft_words));
            if !grounded {
                problems.push(format!(
                    "Ground the reply in the documentation, starting with {}.",
                    top.id
                ));
            }
        }

        problems
    }
}

#[async_trait]
impl Reviewer for PolicyReviewer {
    fn name(&self) -> &str {
        "policy-reviewer"
    }

    async fn review(
        &self,
        ticket: &Ticket,
        context: &ContextBundle,
        draft: &Draft,
    ) -> Result<ReviewVerdict, CollaboratorError> {
        let problems = self.violations(ticket, context, &draft.text);
        if problems.is_empty() {
            Ok(ReviewVerdict::approved())
        } else {
            Ok(ReviewVerdict::rejected(problems.join(" ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockChatModel;
    use resolution::{Category, ContextDocument};

    fn ticket() -> Ticket {
        Ticket::new("Refund request", "I was charged twice for my subscription.").unwrap()
    }

    fn draft(text: &str) -> Draft {
        Draft {
            attempt: 1,
            text: text.into(),
            feedback: None,
        }
    }

    fn refund_context() -> ContextBundle {
        ContextBundle::new(
            Category::Billing,
            "refund",
            false,
            vec![ContextDocument {
                id: "refund_policy".into(),
                content: "Duplicate charges are refunded within five business days.".into(),
                relevance_score: 0.5,
                category: Category::Billing,
            }],
        )
    }

    #[test]
    fn test_parse_approved() {
        assert_eq!(parse_verdict("APPROVED").unwrap(), ReviewVerdict::approved());
        assert_eq!(
            parse_verdict("**Approved** - clear and accurate").unwrap(),
            ReviewVerdict::approved_with_notes("clear and accurate")
        );
    }

    #[test]
    fn test_parse_rejected_keeps_feedback() {
        assert_eq!(
            parse_verdict("REJECTED: mention the refund window\nand apologise").unwrap(),
            ReviewVerdict::rejected("mention the refund window\nand apologise")
        );
        assert_eq!(
            parse_verdict("Review complete.\nNot approved. REJECTED: cite the policy").unwrap(),
            ReviewVerdict::rejected("cite the policy")
        );
    }

    #[test]
    fn test_parse_negated_approval_is_rejection() {
        assert_eq!(
            parse_verdict("Not approved. The reply never states the refund window.").unwrap(),
            ReviewVerdict::rejected("The reply never states the refund window.")
        );
        assert_eq!(
            parse_verdict("Verdict: disapproved, too vague").unwrap(),
            ReviewVerdict::rejected("too vague")
        );
        let verdict = parse_verdict("This draft is unapproved").unwrap();
        assert!(!verdict.is_approved());
        assert!(verdict.honours_contract());
    }

    #[test]
    fn test_parse_rejected_without_feedback_is_empty() {
        let verdict = parse_verdict("REJECTED").unwrap();
        assert!(!verdict.honours_contract());
    }

    #[test]
    fn test_parse_unclear_reply_is_invalid() {
        assert!(matches!(
            parse_verdict("Looks fine to me"),
            Err(CollaboratorError::InvalidOutput(_))
        ));
    }

    #[tokio::test]
    async fn test_llm_reviewer_round_trip() {
        let mut mock = MockChatModel::new();
        mock.expect_complete()
            .withf(|req| req.max_tokens == 500 && req.prompt.contains("Draft Reply"))
            .times(1)
            .returning(|_| Ok("REJECTED: state when the refund arrives".to_string()));

        let reviewer = LlmReviewer::new(Arc::new(mock));
        let verdict = reviewer
            .review(&ticket(), &refund_context(), &draft("We will look into it."))
            .await
            .unwrap();
        assert_eq!(verdict.feedback(), Some("state when the refund arrives"));
    }

    #[tokio::test]
    async fn test_policy_reviewer_approves_grounded_reply() {
        let text = "Thank you for your refund request. Duplicate charges are refunded within \
                    five business days, so the second charge will return to your card soon.";
        let verdict = PolicyReviewer::default()
            .review(&ticket(), &refund_context(), &draft(text))
            .await
            .unwrap();
        assert!(verdict.is_approved(), "{verdict:?}");
    }

    #[tokio::test]
    async fn test_policy_reviewer_rejects_with_reasons() {
        let verdict = PolicyReviewer::default()
            .review(
                &ticket(),
                &refund_context(),
                &draft("Please send us your password."),
            )
            .await
            .unwrap();
        let feedback = verdict.feedback().unwrap();
        assert!(feedback.contains("too short"));
        assert!(feedback.contains("send us your password"));
        assert!(feedback.contains("Refund request"));
        assert!(feedback.contains("refund_policy"));
    }

    #[test]
    fn test_policy_reviewer_skips_grounding_without_context() {
        let empty = ContextBundle::empty(Category::Billing, "q", false);
        let text = "Your refund request has been received and our billing team will process it \
                    within the next few business days.";
        assert!(PolicyReviewer::default()
            .violations(&ticket(), &empty, text)
            .is_empty());
    }
}
