//! Per-category knowledge base with TF-IDF retrieval.
//!
//! Documents live in `{data_dir}/{category}_docs.json`, each file a JSON list
//! of `{content, source?, tags?, priority?}` objects. Every category gets its
//! own TF-IDF index (unigrams + bigrams, English stop words removed,
//! smoothed idf, L2-normalised vectors) and queries are scored by cosine
//! similarity against it.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use resolution::{
    Category, CollaboratorError, ContextBundle, ContextDocument, RetrievalRequest, Retriever,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Vocabulary cap per category index.
const MAX_FEATURES: usize = 1000;

/// Two or more word characters, the usual TF-IDF token definition.
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("TOKEN_RE regex should compile"));

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself",
    "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just",
    "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once",
    "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same", "she",
    "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself",
    "yourselves",
];

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("failed to read knowledge base file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("knowledge base file {path} is not a JSON list: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// One entry of a `{category}_docs.json` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KbDocument {
    pub content: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_priority")]
    pub priority: String,
}

fn default_priority() -> String {
    "normal".to_string()
}

impl KbDocument {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: None,
            tags: Vec::new(),
            priority: default_priority(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

// ── TF-IDF ──────────────────────────────────────────────────────────

/// Lower-cased unigrams and bigrams with stop words removed.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = TOKEN_RE
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|w| !STOP_WORDS.contains(w))
        .collect();

    let mut terms: Vec<String> = words.iter().map(|w| w.to_string()).collect();
    terms.extend(words.windows(2).map(|pair| format!("{} {}", pair[0], pair[1])));
    terms
}

type SparseVector = HashMap<usize, f32>;

/// TF-IDF index over one document collection.
#[derive(Debug, Default)]
pub struct TfIdfIndex {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f32>,
    vectors: Vec<SparseVector>,
}

impl TfIdfIndex {
    pub fn fit(texts: &[&str]) -> Self {
        let tokenized: Vec<Vec<String>> = texts.iter().map(|t| tokenize(t)).collect();

        let mut term_totals: HashMap<&str, usize> = HashMap::new();
        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for terms in &tokenized {
            let mut seen: Vec<&str> = Vec::new();
            for term in terms {
                *term_totals.entry(term).or_default() += 1;
                if !seen.contains(&term.as_str()) {
                    seen.push(term);
                    *doc_freq.entry(term).or_default() += 1;
                }
            }
        }

        // Keep the most frequent terms; ties broken alphabetically so the
        // vocabulary is stable across runs.
        let mut ranked: Vec<(&str, usize)> = term_totals.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        ranked.truncate(MAX_FEATURES);

        let n_docs = texts.len() as f32;
        let mut vocabulary = HashMap::with_capacity(ranked.len());
        let mut idf = Vec::with_capacity(ranked.len());
        for (index, (term, _)) in ranked.iter().enumerate() {
            let df = doc_freq.get(term).copied().unwrap_or(0) as f32;
            vocabulary.insert(term.to_string(), index);
            idf.push(((1.0 + n_docs) / (1.0 + df)).ln() + 1.0);
        }

        let mut index = Self {
            vocabulary,
            idf,
            vectors: Vec::new(),
        };
        index.vectors = tokenized.iter().map(|terms| index.vectorize(terms)).collect();
        index
    }

    fn vectorize(&self, terms: &[String]) -> SparseVector {
        let mut vector = SparseVector::new();
        for term in terms {
            if let Some(&i) = self.vocabulary.get(term) {
                *vector.entry(i).or_default() += 1.0;
            }
        }
        for (i, weight) in vector.iter_mut() {
            *weight *= self.idf[*i];
        }
        let norm = vector.values().map(|w| w * w).sum::<f32>().sqrt();
        if norm > 0.0 {
            for weight in vector.values_mut() {
                *weight /= norm;
            }
        }
        vector
    }

    /// Cosine similarity of `query` against every indexed document.
    pub fn scores(&self, query: &str) -> Vec<f32> {
        let query = self.vectorize(&tokenize(query));
        self.vectors
            .iter()
            .map(|doc| {
                query
                    .iter()
                    .filter_map(|(i, q)| doc.get(i).map(|d| q * d))
                    .sum::<f32>()
            })
            .collect()
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

// ── Knowledge base ──────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Collection {
    documents: Vec<(String, KbDocument)>,
    index: TfIdfIndex,
}

impl Collection {
    fn build(category: Category, documents: Vec<KbDocument>) -> Self {
        let documents: Vec<(String, KbDocument)> = documents
            .into_iter()
            .enumerate()
            .map(|(i, doc)| {
                let id = doc
                    .source
                    .clone()
                    .unwrap_or_else(|| format!("{}_doc_{}", category.slug(), i));
                (id, doc)
            })
            .collect();
        let texts: Vec<&str> = documents.iter().map(|(_, d)| d.content.as_str()).collect();
        let index = TfIdfIndex::fit(&texts);
        Self { documents, index }
    }
}

/// Read-only document store, one TF-IDF index per category.
#[derive(Debug, Default)]
pub struct KnowledgeBase {
    collections: BTreeMap<Category, Collection>,
}

impl KnowledgeBase {
    /// Load `{category}_docs.json` for every category. Missing files give an
    /// empty collection; entries without `content` are skipped.
    pub fn load(dir: &Path) -> Result<Self, KnowledgeError> {
        let mut documents = BTreeMap::new();
        for category in Category::ALL {
            let path = dir.join(format!("{}_docs.json", category.slug()));
            if !path.exists() {
                warn!(path = %path.display(), "Knowledge base file not found");
                documents.insert(category, Vec::new());
                continue;
            }
            let raw = std::fs::read_to_string(&path).map_err(|source| KnowledgeError::Read {
                path: path.clone(),
                source,
            })?;
            let entries: Vec<serde_json::Value> =
                serde_json::from_str(&raw).map_err(|source| KnowledgeError::Parse {
                    path: path.clone(),
                    source,
                })?;

            let mut valid = Vec::with_capacity(entries.len());
            for (i, entry) in entries.into_iter().enumerate() {
                match serde_json::from_value::<KbDocument>(entry) {
                    Ok(doc) => valid.push(doc),
                    Err(e) => warn!(path = %path.display(), entry = i, "Skipping document: {e}"),
                }
            }
            info!(%category, count = valid.len(), "Loaded knowledge base documents");
            documents.insert(category, valid);
        }
        Ok(Self::from_documents(documents))
    }

    pub fn from_documents(documents: BTreeMap<Category, Vec<KbDocument>>) -> Self {
        let collections = documents
            .into_iter()
            .map(|(category, docs)| (category, Collection::build(category, docs)))
            .collect();
        Self { collections }
    }

    pub fn document_count(&self, category: Category) -> usize {
        self.collections
            .get(&category)
            .map(|c| c.documents.len())
            .unwrap_or(0)
    }

    /// Document counts for every category, including empty ones.
    pub fn counts(&self) -> BTreeMap<Category, usize> {
        Category::ALL
            .into_iter()
            .map(|c| (c, self.document_count(c)))
            .collect()
    }

    pub fn total_documents(&self) -> usize {
        self.collections.values().map(|c| c.documents.len()).sum()
    }

    /// Top `top_k` documents of one category scoring at least `min_relevance`.
    pub fn search(
        &self,
        category: Category,
        query: &str,
        top_k: usize,
        min_relevance: f32,
    ) -> Vec<ContextDocument> {
        let Some(collection) = self.collections.get(&category) else {
            return Vec::new();
        };
        if collection.index.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<ContextDocument> = collection
            .index
            .scores(query)
            .into_iter()
            .zip(&collection.documents)
            .filter(|(score, _)| *score >= min_relevance)
            .map(|(score, (id, doc))| ContextDocument {
                id: id.clone(),
                content: doc.content.clone(),
                relevance_score: score,
                category,
            })
            .collect();
        hits.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        hits.truncate(top_k);
        hits
    }
}

/// [`Retriever`] over a [`KnowledgeBase`].
///
/// Searches the ticket's category first, or General when that category has
/// no documents, and tops up from related categories when that yields fewer
/// than `top_k` documents.
pub struct KnowledgeRetriever {
    knowledge: Arc<KnowledgeBase>,
}

impl KnowledgeRetriever {
    pub fn new(knowledge: Arc<KnowledgeBase>) -> Self {
        Self { knowledge }
    }
}

#[async_trait]
impl Retriever for KnowledgeRetriever {
    fn name(&self) -> &str {
        "tfidf-retriever"
    }

    async fn retrieve(
        &self,
        request: &RetrievalRequest<'_>,
    ) -> Result<ContextBundle, CollaboratorError> {
        let query = request.query();
        let searched = if self.knowledge.document_count(request.category) == 0 {
            warn!(category = %request.category, "No documents for category, searching General");
            Category::General
        } else {
            request.category
        };
        let mut hits = self
            .knowledge
            .search(searched, &query, request.top_k, request.min_relevance);

        if request.include_related && hits.len() < request.top_k {
            for &related in request.category.related() {
                if related == searched {
                    continue;
                }
                let remaining = request.top_k - hits.len();
                hits.extend(
                    self.knowledge
                        .search(related, &query, remaining, request.min_relevance),
                );
                if hits.len() >= request.top_k {
                    break;
                }
            }
        }

        hits.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        hits.truncate(request.top_k);
        debug!(
            category = %request.category,
            refined = request.is_refinement(),
            count = hits.len(),
            "Retrieved context"
        );
        Ok(ContextBundle::new(
            request.category,
            query,
            request.is_refinement(),
            hits,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resolution::Ticket;

    fn sample_kb() -> KnowledgeBase {
        let mut docs = BTreeMap::new();
        docs.insert(
            Category::Billing,
            vec![
                KbDocument::new(
                    "Refunds are issued to the original payment method within 5 business days.",
                )
                .with_source("refund_policy"),
                KbDocument::new("Invoices are emailed on the first day of each billing cycle.")
                    .with_source("invoices"),
            ],
        );
        docs.insert(
            Category::General,
            vec![KbDocument::new(
                "Update your account email address from the profile settings page.",
            )],
        );
        docs.insert(Category::Technical, Vec::new());
        KnowledgeBase::from_documents(docs)
    }

    #[test]
    fn test_tokenize_drops_stop_words_and_adds_bigrams() {
        let terms = tokenize("The refund is late");
        assert_eq!(terms, vec!["refund", "late", "refund late"]);
    }

    #[test]
    fn test_tokenize_ignores_single_characters() {
        assert!(tokenize("a b c").is_empty());
    }

    #[test]
    fn test_scores_rank_matching_document_first() {
        let index = TfIdfIndex::fit(&["refund payment issued", "password reset link"]);
        let scores = index.scores("where is my refund");
        assert!(scores[0] > 0.0);
        assert_eq!(scores[1], 0.0);
    }

    #[test]
    fn test_identical_text_scores_one() {
        let index = TfIdfIndex::fit(&["refund payment issued", "password reset link"]);
        let scores = index.scores("password reset link");
        assert!((scores[1] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_vocabulary_capped() {
        let texts: Vec<String> = (0..700).map(|i| format!("term{i} other{i}")).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let index = TfIdfIndex::fit(&refs);
        assert_eq!(index.vocabulary_len(), MAX_FEATURES);
    }

    #[test]
    fn test_search_respects_threshold_and_ids() {
        let kb = sample_kb();
        let hits = kb.search(Category::Billing, "refund payment", 3, 0.1);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "refund_policy");
        assert_eq!(hits[0].category, Category::Billing);

        assert!(kb.search(Category::Billing, "refund payment", 3, 0.99).is_empty());
        assert!(kb.search(Category::Technical, "refund", 3, 0.0).is_empty());
        assert!(kb.search(Category::Security, "refund", 3, 0.0).is_empty());
    }

    #[test]
    fn test_generated_ids_for_unnamed_documents() {
        let kb = sample_kb();
        let hits = kb.search(Category::General, "account email", 3, 0.0);
        assert_eq!(hits[0].id, "general_doc_0");
    }

    #[test]
    fn test_counts_cover_every_category() {
        let counts = sample_kb().counts();
        assert_eq!(counts.len(), 4);
        assert_eq!(counts[&Category::Billing], 2);
        assert_eq!(counts[&Category::Security], 0);
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("billing_docs.json"),
            r#"[{"content": "Refund policy text", "source": "refunds", "tags": ["refund"]},
                {"title": "missing content"}]"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("security_docs.json"), "[]").unwrap();

        let kb = KnowledgeBase::load(dir.path()).unwrap();
        assert_eq!(kb.document_count(Category::Billing), 1);
        assert_eq!(kb.document_count(Category::Security), 0);
        assert_eq!(kb.document_count(Category::Technical), 0);
        assert_eq!(kb.total_documents(), 1);
    }

    #[test]
    fn test_load_rejects_non_list() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("general_docs.json"), r#"{"content": "x"}"#).unwrap();
        assert!(matches!(
            KnowledgeBase::load(dir.path()),
            Err(KnowledgeError::Parse { .. })
        ));
    }

    fn refund_and_email_ticket() -> Ticket {
        Ticket::new("Refund and account email", "Refund my payment, update email").unwrap()
    }

    #[tokio::test]
    async fn test_retriever_tops_up_from_related_categories() {
        let retriever = KnowledgeRetriever::new(Arc::new(sample_kb()));
        let ticket = refund_and_email_ticket();
        let request = RetrievalRequest {
            ticket: &ticket,
            category: Category::Billing,
            feedback: None,
            top_k: 3,
            min_relevance: 0.05,
            include_related: true,
        };

        let bundle = retriever.retrieve(&request).await.unwrap();
        assert!(!bundle.refined);
        assert!(bundle
            .documents()
            .iter()
            .any(|d| d.category == Category::General));
        assert!(bundle.len() <= 3);
        let scores: Vec<f32> = bundle.documents().iter().map(|d| d.relevance_score).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[tokio::test]
    async fn test_retriever_without_related_stays_in_category() {
        let retriever = KnowledgeRetriever::new(Arc::new(sample_kb()));
        let ticket = refund_and_email_ticket();
        let request = RetrievalRequest {
            ticket: &ticket,
            category: Category::Billing,
            feedback: Some("mention the email"),
            top_k: 5,
            min_relevance: 0.0,
            include_related: false,
        };

        let bundle = retriever.retrieve(&request).await.unwrap();
        assert!(bundle.refined);
        assert!(bundle
            .documents()
            .iter()
            .all(|d| d.category == Category::Billing));
    }

    #[tokio::test]
    async fn test_retriever_falls_back_to_general_for_empty_category() {
        let retriever = KnowledgeRetriever::new(Arc::new(sample_kb()));
        let ticket =
            Ticket::new("Change email", "How do I update my account email address?").unwrap();
        let request = RetrievalRequest {
            ticket: &ticket,
            category: Category::Technical,
            feedback: None,
            top_k: 3,
            min_relevance: 0.05,
            include_related: false,
        };

        let bundle = retriever.retrieve(&request).await.unwrap();
        assert_eq!(bundle.category, Category::Technical);
        assert_eq!(bundle.len(), 1);
        assert_eq!(bundle.documents()[0].category, Category::General);
        assert_eq!(bundle.documents()[0].id, "general_doc_0");
    }
}
