//! Support Agents Library
//!
//! Concrete collaborators for the `resolution` controller:
//! - LLM classifier, generator and reviewer over an OpenAI-compatible endpoint
//! - Offline keyword classifier, template generator and policy reviewer
//! - Per-category knowledge base with TF-IDF retrieval
//! - Agent factory, batch runner, event logger and status report used by the CLI

pub mod agents;
pub mod batch;
pub mod config;
pub mod knowledge;
pub mod llm;
pub mod prompts;
pub mod status;
pub mod telemetry;

pub use agents::{AgentFactory, AgentMode};
pub use batch::{load_tickets, resolve_batch, BatchEntry, BatchReport, TicketInput};
pub use config::{AgentConfig, LlmEndpoint};
pub use knowledge::{KbDocument, KnowledgeBase, KnowledgeError, KnowledgeRetriever};
pub use llm::{ChatModel, ChatRequest, LlmError, OpenAiCompatClient};
pub use status::SystemStatus;
pub use telemetry::{spawn_event_logger, EventLogSummary};
