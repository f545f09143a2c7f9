//! Collaborator agents for the resolution controller.
//!
//! Each stage has an LLM-backed agent and an offline fallback. The
//! `AgentFactory` picks one set based on whether a model endpoint is
//! configured, and wires them into a `ResolutionController`.

pub mod classifier;
pub mod generator;
pub mod reviewer;

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use resolution::{
    Classifier, Generator, JsonlOutcomeSink, ResolutionController, Retriever, Reviewer,
    SharedEventBus,
};
use tracing::info;

use crate::config::AgentConfig;
use crate::knowledge::{KnowledgeBase, KnowledgeRetriever};
use crate::llm::{ChatModel, OpenAiCompatClient};
use classifier::{KeywordClassifier, LlmClassifier};
use generator::{LlmGenerator, TemplateGenerator};
use reviewer::{LlmReviewer, PolicyReviewer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentMode {
    /// Classifier, generator and reviewer call the chat model.
    Llm,
    /// Keyword classifier, template generator, rule-based reviewer.
    Offline,
}

impl fmt::Display for AgentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Llm => write!(f, "llm"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// Factory that builds all collaborators from an `AgentConfig`.
pub struct AgentFactory {
    config: AgentConfig,
    knowledge: Arc<KnowledgeBase>,
    model: Option<Arc<dyn ChatModel>>,
}

impl AgentFactory {
    /// Load the knowledge base and, unless `offline` is set or no API key is
    /// configured, build the chat-model client.
    pub fn new(config: &AgentConfig, offline: bool) -> Result<Self> {
        let knowledge = KnowledgeBase::load(&config.data_dir).with_context(|| {
            format!(
                "Failed to load knowledge base from {}",
                config.data_dir.display()
            )
        })?;

        let model: Option<Arc<dyn ChatModel>> = if offline || !config.llm.is_configured() {
            None
        } else {
            let client =
                OpenAiCompatClient::new(&config.llm).context("Failed to build LLM client")?;
            Some(Arc::new(client))
        };

        let factory = Self {
            config: config.clone(),
            knowledge: Arc::new(knowledge),
            model,
        };
        info!(
            mode = %factory.mode(),
            documents = factory.knowledge.total_documents(),
            "Agent factory ready"
        );
        Ok(factory)
    }

    /// Assemble from parts, e.g. a mock chat model in tests.
    pub fn from_parts(
        config: AgentConfig,
        knowledge: Arc<KnowledgeBase>,
        model: Option<Arc<dyn ChatModel>>,
    ) -> Self {
        Self {
            config,
            knowledge,
            model,
        }
    }

    pub fn mode(&self) -> AgentMode {
        if self.model.is_some() {
            AgentMode::Llm
        } else {
            AgentMode::Offline
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeBase> {
        &self.knowledge
    }

    pub fn build_classifier(&self) -> Arc<dyn Classifier> {
        match &self.model {
            Some(model) => Arc::new(LlmClassifier::new(model.clone())),
            None => Arc::new(KeywordClassifier),
        }
    }

    pub fn build_retriever(&self) -> Arc<dyn Retriever> {
        Arc::new(KnowledgeRetriever::new(self.knowledge.clone()))
    }

    pub fn build_generator(&self) -> Arc<dyn Generator> {
        match &self.model {
            Some(model) => Arc::new(LlmGenerator::new(model.clone())),
            None => Arc::new(TemplateGenerator),
        }
    }

    pub fn build_reviewer(&self) -> Arc<dyn Reviewer> {
        match &self.model {
            Some(model) => Arc::new(LlmReviewer::new(model.clone())),
            None => Arc::new(PolicyReviewer::default()),
        }
    }

    /// Wire every collaborator into a controller that appends outcomes to
    /// the configured JSONL log and publishes on `events`.
    pub fn build_controller(&self, events: SharedEventBus) -> ResolutionController {
        ResolutionController::new(
            self.build_classifier(),
            self.build_retriever(),
            self.build_generator(),
            self.build_reviewer(),
        )
        .with_config(self.config.resolution.clone())
        .with_sink(Arc::new(JsonlOutcomeSink::new(self.config.outcome_log.clone())))
        .with_event_bus(events)
    }
}
