//! Ticket classifier agents.

use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use resolution::{Category, Classifier, CollaboratorError, Ticket};
use tracing::debug;

use crate::llm::{ChatModel, ChatRequest};
use crate::prompts;

/// LLM classifier. Replies outside the closed category set are a failure,
/// never a silent default.
pub struct LlmClassifier {
    model: Arc<dyn ChatModel>,
}

impl LlmClassifier {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Accept the bare label, or a first line that is one.
    pub fn parse_reply(reply: &str) -> Result<Category, CollaboratorError> {
        Category::from_str(reply)
            .or_else(|_| Category::from_str(reply.lines().next().unwrap_or_default()))
            .map_err(|e| CollaboratorError::InvalidOutput(e.to_string()))
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    fn name(&self) -> &str {
        "llm-classifier"
    }

    async fn classify(&self, ticket: &Ticket) -> Result<Category, CollaboratorError> {
        let request = ChatRequest::new(prompts::classify_prompt(ticket))
            .system(prompts::CLASSIFIER_PREAMBLE)
            .temperature(0.1)
            .max_tokens(50);
        let reply = self.model.complete(request).await?;
        let category = Self::parse_reply(&reply)?;
        debug!(%category, prompt_version = prompts::PROMPT_VERSION, "Classified ticket");
        Ok(category)
    }
}

static BILLING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(bill|payment|charge|refund|price)").expect("BILLING_RE regex should compile")
});
static TECHNICAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(api|error|bug|technical|integration)")
        .expect("TECHNICAL_RE regex should compile")
});
static SECURITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(security|password|login|access|authentication)")
        .expect("SECURITY_RE regex should compile")
});

/// Offline keyword classifier. Checks Billing, Technical, then Security
/// keywords (word prefixes) and falls back to General.
#[derive(Debug, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn categorize(text: &str) -> Category {
        let text = text.to_lowercase();
        if BILLING_RE.is_match(&text) {
            Category::Billing
        } else if TECHNICAL_RE.is_match(&text) {
            Category::Technical
        } else if SECURITY_RE.is_match(&text) {
            Category::Security
        } else {
            Category::General
        }
    }
}

#[async_trait]
impl Classifier for KeywordClassifier {
    fn name(&self) -> &str {
        "keyword-classifier"
    }

    async fn classify(&self, ticket: &Ticket) -> Result<Category, CollaboratorError> {
        Ok(Self::categorize(&ticket.text()))
    }
}
