//! Retrieved supporting documents.

use serde::{Deserialize, Serialize};

use crate::category::Category;

/// One retrieved document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextDocument {
    /// Source identifier (file name, article id, URL).
    pub id: String,
    /// Document text.
    pub content: String,
    /// Similarity score from the retriever, higher is better.
    pub relevance_score: f32,
    /// Collection the document came from.
    pub category: Category,
}

/// The ranked result of one retrieval pass.
///
/// A bundle is produced fresh for every pass and not modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextBundle {
    /// Primary category searched.
    pub category: Category,
    /// Query text handed to the document store.
    pub query: String,
    /// Whether review feedback was folded into the query.
    pub refined: bool,
    documents: Vec<ContextDocument>,
}

/// Compact view of a bundle kept in escalation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSummary {
    pub document_ids: Vec<String>,
    pub top_score: Option<f32>,
    pub refined: bool,
}

impl ContextBundle {
    /// Build a bundle, ordering documents by descending relevance.
    pub fn new(
        category: Category,
        query: impl Into<String>,
        refined: bool,
        mut documents: Vec<ContextDocument>,
    ) -> Self {
        documents.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        Self {
            category,
            query: query.into(),
            refined,
            documents,
        }
    }

    /// A bundle with no documents. Not an error; review decides whether the
    /// draft is grounded enough.
    pub fn empty(category: Category, query: impl Into<String>, refined: bool) -> Self {
        Self::new(category, query, refined, Vec::new())
    }

    pub fn documents(&self) -> &[ContextDocument] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn top_score(&self) -> Option<f32> {
        self.documents.first().map(|d| d.relevance_score)
    }

    pub fn summary(&self) -> ContextSummary {
        ContextSummary {
            document_ids: self.documents.iter().map(|d| d.id.clone()).collect(),
            top_score: self.top_score(),
            refined: self.refined,
        }
    }

    /// Documents rendered as numbered blocks for prompts.
    pub fn render(&self) -> String {
        self.documents
            .iter()
            .enumerate()
            .map(|(i, doc)| format!("Document {} ({}): {}", i + 1, doc.id, doc.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
