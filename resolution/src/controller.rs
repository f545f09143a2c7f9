//! Resolution controller: drives one ticket through the stage sequence.
//!
//! ```text
//! Classifying ─▶ Retrieving ─▶ Drafting ─▶ Reviewing ──approved──▶ Delivering
//!                    ▲                         │
//!                    │                         ├─rejected, budget left──▶ Retrying
//!                    └─────────────────────────┼──────────────────────────────┘
//!                                              └─rejected, budget spent─▶ Escalating
//! collaborator failure in any stage ────────────────────────────────────▶ Escalating
//! ```
//!
//! Stages run strictly one after another. Collaborator failures are never
//! retried here: the first one ends the run with an escalation. `resolve`
//! always returns an [`Outcome`]; nothing propagates past it.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn, Instrument};

use crate::category::Category;
use crate::collaborators::{
    Classifier, CollaboratorError, GenerationRequest, Generator, RetrievalRequest, Retriever,
    Reviewer,
};
use crate::config::ResolutionConfig;
use crate::context::ContextBundle;
use crate::events::{EventBus, ResolutionEvent, SharedEventBus};
use crate::outcome::{EscalationReason, FailureKind, Outcome};
use crate::review::{AttemptRecord, Draft, ReviewVerdict};
use crate::run_state::RunState;
use crate::sink::{OutcomeRecord, OutcomeSink};
use crate::state_machine::ResolutionState;
use crate::ticket::Ticket;

pub struct ResolutionController {
    classifier: Arc<dyn Classifier>,
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn Generator>,
    reviewer: Arc<dyn Reviewer>,
    sinks: Vec<Arc<dyn OutcomeSink>>,
    events: SharedEventBus,
    config: ResolutionConfig,
}

impl ResolutionController {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn Generator>,
        reviewer: Arc<dyn Reviewer>,
    ) -> Self {
        Self {
            classifier,
            retriever,
            generator,
            reviewer,
            sinks: Vec::new(),
            events: EventBus::new().shared(),
            config: ResolutionConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ResolutionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn OutcomeSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_event_bus(mut self, events: SharedEventBus) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &ResolutionConfig {
        &self.config
    }

    pub fn events(&self) -> &SharedEventBus {
        &self.events
    }

    /// Run a ticket to its terminal outcome and hand it to every sink.
    pub async fn resolve(&self, ticket: Ticket) -> Outcome {
        let span = tracing::info_span!("resolve", ticket_id = %ticket.id());
        async move {
            self.events.publish(ResolutionEvent::RunStarted {
                ticket_id: ticket.id().to_string(),
                timestamp: Utc::now(),
            });
            info!(subject = %ticket.subject(), "Resolving ticket");

            let mut run = RunState::new(ticket.clone(), self.config.max_attempts);
            let result = self.run_stages(&mut run).await;
            let elapsed_ms = run.elapsed_ms();

            let outcome = match result {
                Ok(response) => run.deliver(response),
                Err(reason) => {
                    warn!(reason = %reason, attempt = run.attempt(), "Escalating ticket");
                    run.escalate(reason)
                }
            };

            info!(
                outcome = outcome.tag(),
                category = ?outcome.category(),
                attempts = outcome.attempt_count(),
                elapsed_ms,
                "Ticket resolved"
            );
            self.events.publish(ResolutionEvent::RunFinished {
                ticket_id: outcome.ticket_id().to_string(),
                outcome: outcome.tag().to_string(),
                category: outcome.category(),
                attempt_count: outcome.attempt_count(),
                elapsed_ms,
                timestamp: Utc::now(),
            });

            self.record(&outcome, &ticket).await;
            outcome
        }
        .instrument(span)
        .await
    }

    /// The stage loop. `Ok` carries the approved response text; `Err` the
    /// escalation reason.
    async fn run_stages(&self, run: &mut RunState) -> Result<String, EscalationReason> {
        let category = self.classify(run).await?;
        run.set_category(category);
        run.advance(ResolutionState::Retrieving, Some(&category.to_string()))?;

        loop {
            let attempt = run.begin_attempt();
            let feedback = run.last_feedback().map(str::to_owned);
            let started = Instant::now();

            let context = self.retrieve(run, category, feedback.as_deref()).await?;
            run.advance(ResolutionState::Drafting, None)?;

            let text = self
                .generate(run, category, &context, feedback.as_deref())
                .await?;
            let draft = Draft {
                attempt,
                text,
                feedback,
            };
            run.advance(ResolutionState::Reviewing, None)?;

            let verdict = self.review(run, &context, &draft).await?;
            let response = draft.text.clone();
            run.record_attempt(AttemptRecord {
                attempt,
                context,
                draft,
                verdict: verdict.clone(),
                duration_ms: started.elapsed().as_millis() as u64,
            });

            match verdict {
                ReviewVerdict::Approved { .. } => {
                    run.advance(ResolutionState::Delivering, Some("approved"))?;
                    return Ok(response);
                }
                ReviewVerdict::Rejected { feedback } => {
                    if !run.has_budget() {
                        debug!(attempt, "Attempt budget spent");
                        return Err(EscalationReason::PolicyRejection { feedback });
                    }
                    info!(attempt, feedback = %feedback, "Draft rejected, retrying with feedback");
                    run.advance(ResolutionState::Retrying, Some(&feedback))?;
                    run.advance(ResolutionState::Retrieving, None)?;
                }
            }
        }
    }

    async fn classify(&self, run: &RunState) -> Result<Category, EscalationReason> {
        self.stage(
            run,
            ResolutionState::Classifying,
            FailureKind::Classification,
            self.classifier.name(),
            self.classifier.classify(run.ticket()),
            |category: &Category| category.to_string(),
        )
        .await
    }

    async fn retrieve(
        &self,
        run: &RunState,
        category: Category,
        feedback: Option<&str>,
    ) -> Result<ContextBundle, EscalationReason> {
        let pass = self.config.retrieval_pass(feedback.is_some());
        let request = RetrievalRequest {
            ticket: run.ticket(),
            category,
            feedback,
            top_k: pass.top_k,
            min_relevance: pass.min_relevance,
            include_related: self.config.retrieval.include_related,
        };
        self.stage(
            run,
            ResolutionState::Retrieving,
            FailureKind::Retrieval,
            self.retriever.name(),
            self.retriever.retrieve(&request),
            |bundle: &ContextBundle| format!("{} documents", bundle.len()),
        )
        .await
    }

    async fn generate(
        &self,
        run: &RunState,
        category: Category,
        context: &ContextBundle,
        feedback: Option<&str>,
    ) -> Result<String, EscalationReason> {
        let request = GenerationRequest {
            ticket: run.ticket(),
            category,
            context,
            feedback,
            attempt: run.attempt(),
        };
        let generator = &self.generator;
        self.stage(
            run,
            ResolutionState::Drafting,
            FailureKind::Generation,
            generator.name(),
            async {
                let text = generator.generate(&request).await?;
                if text.trim().is_empty() {
                    return Err(CollaboratorError::InvalidOutput("empty draft".into()));
                }
                Ok(text)
            },
            |text: &String| format!("{} chars", text.chars().count()),
        )
        .await
    }

    async fn review(
        &self,
        run: &RunState,
        context: &ContextBundle,
        draft: &Draft,
    ) -> Result<ReviewVerdict, EscalationReason> {
        let reviewer = &self.reviewer;
        self.stage(
            run,
            ResolutionState::Reviewing,
            FailureKind::Review,
            reviewer.name(),
            async {
                let verdict = reviewer.review(run.ticket(), context, draft).await?;
                if !verdict.honours_contract() {
                    return Err(CollaboratorError::InvalidOutput(
                        "rejection without feedback".into(),
                    ));
                }
                Ok(verdict)
            },
            |verdict: &ReviewVerdict| verdict.to_string(),
        )
        .await
    }

    /// Run one collaborator call with entry/completion events and timing.
    async fn stage<T, F>(
        &self,
        run: &RunState,
        stage: ResolutionState,
        failure: FailureKind,
        collaborator: &str,
        call: F,
        describe: impl FnOnce(&T) -> String,
    ) -> Result<T, EscalationReason>
    where
        F: Future<Output = Result<T, CollaboratorError>>,
    {
        let ticket_id = run.ticket().id().to_string();
        let attempt = run.attempt();
        self.events.publish(ResolutionEvent::StageEntered {
            ticket_id: ticket_id.clone(),
            stage,
            attempt,
            timestamp: Utc::now(),
        });

        let started = Instant::now();
        let result = call.await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(value) => {
                let summary = describe(&value);
                debug!(
                    %stage,
                    attempt,
                    collaborator,
                    duration_ms,
                    result = %summary,
                    "Stage completed"
                );
                self.events.publish(ResolutionEvent::StageCompleted {
                    ticket_id,
                    stage,
                    attempt,
                    duration_ms,
                    result: summary,
                    timestamp: Utc::now(),
                });
                Ok(value)
            }
            Err(err) => {
                let error = format!("{collaborator}: {err}");
                warn!(%stage, attempt, duration_ms, error = %error, "Stage failed");
                self.events.publish(ResolutionEvent::StageFailed {
                    ticket_id,
                    stage,
                    attempt,
                    duration_ms,
                    failure,
                    error: error.clone(),
                    timestamp: Utc::now(),
                });
                Err(EscalationReason::Failure { failure, error })
            }
        }
    }

    async fn record(&self, outcome: &Outcome, ticket: &Ticket) {
        if self.sinks.is_empty() {
            return;
        }
        let record = OutcomeRecord::from_outcome(outcome, ticket);
        for sink in &self.sinks {
            if let Err(e) = sink.record(&record).await {
                warn!(sink = sink.name(), "Failed to record outcome: {e}");
            }
        }
    }
}
