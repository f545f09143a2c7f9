//! Collaborator contracts the controller drives.
//!
//! Each stage is an async trait awaited to completion before the next stage
//! starts. Implementations signal "cannot produce a result at all" with a
//! [`CollaboratorError`]; a weak result (empty bundle, poor draft) is returned
//! as a normal value and left for review to judge.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::category::Category;
use crate::context::ContextBundle;
use crate::review::{Draft, ReviewVerdict};
use crate::ticket::Ticket;

/// Unrecoverable collaborator failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("invalid output: {0}")]
    InvalidOutput(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Maps a ticket to exactly one [`Category`].
#[async_trait]
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;

    async fn classify(&self, ticket: &Ticket) -> Result<Category, CollaboratorError>;
}

/// Parameters for one retrieval pass.
#[derive(Debug, Clone)]
pub struct RetrievalRequest<'a> {
    pub ticket: &'a Ticket,
    pub category: Category,
    /// Previous rejection text; `Some` on refinement passes.
    pub feedback: Option<&'a str>,
    pub top_k: usize,
    pub min_relevance: f32,
    /// Also search [`Category::related`] collections when the primary one
    /// yields fewer than `top_k` documents.
    pub include_related: bool,
}

impl RetrievalRequest<'_> {
    pub fn is_refinement(&self) -> bool {
        self.feedback.is_some()
    }

    /// Query text for the document store.
    ///
    /// First pass weights the subject twice; refinement appends the review
    /// feedback as an extra signal.
    pub fn query(&self) -> String {
        match self.feedback {
            None => format!(
                "{} {} {}",
                self.ticket.subject(),
                self.ticket.subject(),
                self.ticket.description()
            )
            .to_lowercase(),
            Some(feedback) => format!(
                "{} {} {}",
                self.ticket.subject(),
                self.ticket.description(),
                feedback
            ),
        }
    }
}

/// Returns supporting documents. Must not modify the document store.
#[async_trait]
pub trait Retriever: Send + Sync {
    fn name(&self) -> &str;

    async fn retrieve(
        &self,
        request: &RetrievalRequest<'_>,
    ) -> Result<ContextBundle, CollaboratorError>;
}

/// Inputs for one draft.
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    pub ticket: &'a Ticket,
    pub category: Category,
    pub context: &'a ContextBundle,
    pub feedback: Option<&'a str>,
    pub attempt: u32,
}

/// Produces candidate response text.
#[async_trait]
pub trait Generator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, CollaboratorError>;
}

/// Judges a draft. Rejections must carry non-empty feedback.
#[async_trait]
pub trait Reviewer: Send + Sync {
    fn name(&self) -> &str;

    async fn review(
        &self,
        ticket: &Ticket,
        context: &ContextBundle,
        draft: &Draft,
    ) -> Result<ReviewVerdict, CollaboratorError>;
}
