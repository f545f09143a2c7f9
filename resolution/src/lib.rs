//! Ticket resolution core
//!
//! Drives a support ticket through classify → retrieve → draft → review,
//! retrying with reviewer feedback and escalating to a human when the
//! attempt budget runs out or a collaborator fails.
//!
//! # Modules
//!
//! - `controller`: the [`ResolutionController`] stage loop
//! - `collaborators`: traits the controller calls out to
//! - `state_machine`: stages and legal transitions
//! - `outcome`: terminal [`Outcome`] values
//! - `events`: broadcast of stage-level progress
//! - `sink`: outcome recording and the JSONL history reader
//! - `config`: attempt budget and retrieval parameters
//!
//! # Usage
//!
//! ```ignore
//! let controller = ResolutionController::new(classifier, retriever, generator, reviewer)
//!     .with_config(ResolutionConfig::default())
//!     .with_sink(Arc::new(JsonlOutcomeSink::new("logs/outcomes.jsonl")));
//! let outcome = controller.resolve(Ticket::new(subject, description)?).await;
//! ```

pub mod category;
pub mod collaborators;
pub mod config;
pub mod context;
pub mod controller;
pub mod events;
pub mod outcome;
pub mod review;
pub mod run_state;
pub mod sink;
pub mod state_machine;
pub mod ticket;

// Re-export key controller types
pub use controller::ResolutionController;
pub use config::{
    ConfigError, ResolutionConfig, RetrievalConfig, RetrievalPass, DEFAULT_MAX_ATTEMPTS,
};
pub use run_state::RunState;

// Re-export collaborator seams
pub use collaborators::{
    Classifier, CollaboratorError, GenerationRequest, Generator, RetrievalRequest, Retriever,
    Reviewer,
};

// Re-export data types
pub use category::{Category, UnknownCategory};
pub use context::{ContextBundle, ContextDocument, ContextSummary};
pub use outcome::{
    format_response, Delivery, Escalation, EscalationReason, FailureKind, Outcome,
    ESCALATION_NOTICE,
};
pub use review::{AttemptRecord, AttemptSummary, Draft, ReviewVerdict};
pub use state_machine::{IllegalTransition, ResolutionState, StateMachine, TransitionRecord};
pub use ticket::{clean_text, Ticket, TicketError, MAX_DESCRIPTION_CHARS, MAX_SUBJECT_CHARS};

// Re-export recording types
pub use events::{EventBus, ResolutionEvent, SharedEventBus};
pub use sink::{
    CategoryStats, JsonlOutcomeSink, MemoryOutcomeSink, OutcomeLog, OutcomeRecord, OutcomeSink,
    OutcomeStats, SinkError,
};
