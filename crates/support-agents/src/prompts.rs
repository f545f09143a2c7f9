//! Prompt text for each LLM-backed agent.
//!
//! Prompt versioning: bump `PROMPT_VERSION` whenever prompt content changes,
//! so a logged reply can be traced back to the prompt that produced it.

use resolution::{Category, ContextBundle, Draft, Ticket};

/// Prompt version. Bump on any prompt content change.
pub const PROMPT_VERSION: &str = "1.2.0";

pub const CLASSIFIER_PREAMBLE: &str = "\
You route customer support tickets. Classify each ticket into exactly one category:
- Billing: payment, refunds, subscription, pricing issues
- Technical: API, integration, bugs, performance issues
- Security: authentication, permissions, data security
- General: account management, general questions

Respond with only the category name: Billing, Technical, Security, or General.";

pub const GENERATOR_PREAMBLE: &str = "\
You are an experienced, empathetic customer support agent. Read the customer's ticket \
carefully and respond as a helpful human would: personalized, understanding and \
solution-focused.

Rules:
- Acknowledge the customer's specific situation and reference details from the ticket.
- Ground every factual statement in the provided documentation. If the documentation \
does not cover something, say what you can help with and suggest next steps instead \
of guessing.
- Never ask the customer to share a password or full card number.
- Provide actionable steps when possible.
- Do not add a signature; one is appended automatically.";

pub const REVIEWER_PREAMBLE: &str = "\
You review customer support replies before they are sent.

Criteria:
1. Accuracy: every claim is supported by the provided documentation.
2. Completeness: the reply addresses the customer's issue.
3. Professionalism: the tone is appropriate.
4. Policy compliance: no requests for passwords or full card numbers, no promises \
the documentation does not back.

Respond with exactly one of:
APPROVED
REJECTED: <specific, actionable feedback for the next draft>";

pub fn classify_prompt(ticket: &Ticket) -> String {
    format!(
        "Ticket Subject: {}\nTicket Description: {}",
        ticket.subject(),
        ticket.description()
    )
}

pub fn generate_prompt(
    ticket: &Ticket,
    category: Category,
    context: &ContextBundle,
    feedback: Option<&str>,
) -> String {
    let documentation = if context.is_empty() {
        "No specific documentation available for this issue.".to_string()
    } else {
        context.render()
    };
    let mut prompt = format!(
        "## Customer Ticket\n\nSubject: {}\nDetails: {}\nCategory: {}\n\n\
         ## Available Documentation\n\n{}",
        ticket.subject(),
        ticket.description(),
        category,
        documentation
    );
    if let Some(feedback) = feedback {
        prompt.push_str(&format!(
            "\n\n## Reviewer Feedback On The Previous Draft\n\n{feedback}\n\n\
             Write a new reply that resolves this feedback."
        ));
    }
    prompt.push_str("\n\nWrite the reply to the customer.");
    prompt
}

pub fn review_prompt(ticket: &Ticket, context: &ContextBundle, draft: &Draft) -> String {
    let documentation = if context.is_empty() {
        "(none)".to_string()
    } else {
        context.render()
    };
    format!(
        "## Original Ticket\n\nSubject: {}\nDescription: {}\n\n\
         ## Available Documentation\n\n{}\n\n## Draft Reply\n\n{}",
        ticket.subject(),
        ticket.description(),
        documentation,
        draft.text
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use resolution::ContextDocument;

    fn ticket() -> Ticket {
        Ticket::new("Refund", "Charged twice").unwrap()
    }

    #[test]
    fn test_generate_prompt_without_context_or_feedback() {
        let bundle = ContextBundle::empty(Category::Billing, "refund", false);
        let prompt = generate_prompt(&ticket(), Category::Billing, &bundle, None);
        assert!(prompt.contains("Category: Billing"));
        assert!(prompt.contains("No specific documentation"));
        assert!(!prompt.contains("Reviewer Feedback"));
    }

    #[test]
    fn test_generate_prompt_includes_feedback_and_documents() {
        let bundle = ContextBundle::new(
            Category::Billing,
            "refund",
            true,
            vec![ContextDocument {
                id: "refund_policy".into(),
                content: "Refunds within 30 days.".into(),
                relevance_score: 0.4,
                category: Category::Billing,
            }],
        );
        let prompt = generate_prompt(
            &ticket(),
            Category::Billing,
            &bundle,
            Some("state the refund window"),
        );
        assert!(prompt.contains("Document 1 (refund_policy): Refunds within 30 days."));
        assert!(prompt.contains("state the refund window"));
    }

    #[test]
    fn test_review_prompt_contains_draft() {
        let bundle = ContextBundle::empty(Category::General, "q", false);
        let draft = Draft {
            attempt: 1,
            text: "Hello there".into(),
            feedback: None,
        };
        let prompt = review_prompt(&ticket(), &bundle, &draft);
        assert!(prompt.ends_with("Hello there"));
        assert!(prompt.contains("(none)"));
    }
}
