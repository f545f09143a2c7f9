//! Draft generator agents.

use std::sync::Arc;

use async_trait::async_trait;
use resolution::{Category, CollaboratorError, GenerationRequest, Generator};

use crate::llm::{ChatModel, ChatRequest};
use crate::prompts;

/// LLM generator grounded on the retrieved documents.
pub struct LlmGenerator {
    model: Arc<dyn ChatModel>,
}

impl LlmGenerator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Generator for LlmGenerator {
    fn name(&self) -> &str {
        "llm-generator"
    }

    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, CollaboratorError> {
        let prompt = prompts::generate_prompt(
            request.ticket,
            request.category,
            request.context,
            request.feedback,
        );
        let chat = ChatRequest::new(prompt)
            .system(prompts::GENERATOR_PREAMBLE)
            .temperature(0.1)
            .max_tokens(1000);
        Ok(self.model.complete(chat).await?)
    }
}

/// Offline generator: category-specific template with the ticket's own
/// details and any retrieved guidance quoted in.
#[derive(Debug, Default)]
pub struct TemplateGenerator;

const EXCERPT_CHARS: usize = 100;

fn excerpt(text: &str) -> String {
    if text.chars().count() > EXCERPT_CHARS {
        let head: String = text.chars().take(EXCERPT_CHARS).collect();
        format!("{}...", head.trim_end())
    } else {
        text.to_string()
    }
}

fn steps(category: Category) -> &'static str {
    match category {
        Category::Billing => {
            "1. Check your account dashboard for recent transactions.\n\
             2. Review your subscription details in account settings.\n\
             3. Contact our billing team at billing@company.com for charges, refunds and \
             subscription changes."
        }
        Category::Technical => {
            "1. Refresh your browser or restart the app.\n\
             2. Make sure you are on the latest version.\n\
             3. Clear your browser cache if you use the web interface.\n\
             4. If the issue persists, send us the error message, the steps to reproduce it \
             and your browser or device details."
        }
        Category::Security => {
            "1. Change your password immediately.\n\
             2. Enable two-factor authentication if it is not already active.\n\
             3. Review recent account activity and sign out of all devices.\n\
             4. Contact our security team at security@company.com with full details."
        }
        Category::General => {
            "1. Check our help documentation for common solutions.\n\
             2. If this is account-related, log into your account dashboard.\n\
             3. Reply with what you were trying to accomplish and any error messages so we can \
             give you a more targeted answer."
        }
    }
}

#[async_trait]
impl Generator for TemplateGenerator {
    fn name(&self) -> &str {
        "template-generator"
    }

    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, CollaboratorError> {
        let ticket = request.ticket;
        let mut draft = format!(
            "Thank you for contacting us about \"{}\".\n\n\
             I understand you're experiencing: {}\n\n",
            ticket.subject(),
            excerpt(ticket.description())
        );

        if let Some(top) = request.context.documents().first() {
            draft.push_str(&format!(
                "Based on our documentation, here is what applies to your case:\n{}\n\n",
                top.content
            ));
        }

        draft.push_str(&format!(
            "Here is what I recommend for this {} issue:\n{}",
            request.category.slug(),
            steps(request.category)
        ));
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockChatModel;
    use resolution::{ContextBundle, ContextDocument, Ticket};

    fn ticket() -> Ticket {
        Ticket::new("Double charge", "I was charged twice for the March invoice.").unwrap()
    }

    #[tokio::test]
    async fn test_llm_generator_passes_feedback() {
        let mut mock = MockChatModel::new();
        mock.expect_complete()
            .withf(|req| req.max_tokens == 1000 && req.prompt.contains("add the refund window"))
            .times(1)
            .returning(|_| Ok("We refunded the duplicate charge.".to_string()));

        let ticket = ticket();
        let context = ContextBundle::empty(Category::Billing, "q", true);
        let request = GenerationRequest {
            ticket: &ticket,
            category: Category::Billing,
            context: &context,
            feedback: Some("add the refund window"),
            attempt: 2,
        };
        let draft = LlmGenerator::new(Arc::new(mock))
            .generate(&request)
            .await
            .unwrap();
        assert_eq!(draft, "We refunded the duplicate charge.");
    }

    #[tokio::test]
    async fn test_template_quotes_top_document() {
        let ticket = ticket();
        let context = ContextBundle::new(
            Category::Billing,
            "q",
            false,
            vec![
                ContextDocument {
                    id: "low".into(),
                    content: "Invoices are emailed monthly.".into(),
                    relevance_score: 0.2,
                    category: Category::Billing,
                },
                ContextDocument {
                    id: "high".into(),
                    content: "Duplicate charges are refunded within 5 business days.".into(),
                    relevance_score: 0.7,
                    category: Category::Billing,
                },
            ],
        );
        let request = GenerationRequest {
            ticket: &ticket,
            category: Category::Billing,
            context: &context,
            feedback: None,
            attempt: 1,
        };

        let draft = TemplateGenerator.generate(&request).await.unwrap();
        assert!(draft.contains("\"Double charge\""));
        assert!(draft.contains("refunded within 5 business days"));
        assert!(!draft.contains("Invoices are emailed monthly"));
        assert!(draft.contains("billing@company.com"));
    }

    #[test]
    fn test_excerpt_truncates_long_text() {
        let long = "word ".repeat(40);
        let short = excerpt(&long);
        assert!(short.ends_with("..."));
        assert!(short.chars().count() <= EXCERPT_CHARS + 3);
        assert_eq!(excerpt("short"), "short");
    }
}
