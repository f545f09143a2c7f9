//! RunState: everything the controller knows about one ticket's run.
//!
//! Created when a ticket is submitted, only appended to while the run is
//! live, and consumed when the terminal outcome is produced. Consuming `self`
//! in [`RunState::deliver`] / [`RunState::escalate`] is what guarantees a run
//! has exactly one outcome.

use crate::category::Category;
use crate::outcome::{Delivery, Escalation, EscalationReason, FailureKind, Outcome};
use crate::review::AttemptRecord;
use crate::state_machine::{IllegalTransition, ResolutionState, StateMachine};
use crate::ticket::Ticket;

impl From<IllegalTransition> for EscalationReason {
    fn from(err: IllegalTransition) -> Self {
        EscalationReason::Failure {
            failure: FailureKind::Workflow,
            error: err.to_string(),
        }
    }
}

#[derive(Debug)]
pub struct RunState {
    ticket: Ticket,
    category: Option<Category>,
    attempts: Vec<AttemptRecord>,
    machine: StateMachine,
    max_attempts: u32,
}

impl RunState {
    /// `max_attempts` is clamped to at least one draft+review cycle.
    pub fn new(ticket: Ticket, max_attempts: u32) -> Self {
        Self {
            ticket,
            category: None,
            attempts: Vec::new(),
            machine: StateMachine::new(),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn ticket(&self) -> &Ticket {
        &self.ticket
    }

    pub fn category(&self) -> Option<Category> {
        self.category
    }

    /// Attach the classifier's answer. Only the first call takes effect.
    pub fn set_category(&mut self, category: Category) {
        if self.category.is_none() {
            self.category = Some(category);
        }
    }

    pub fn current(&self) -> ResolutionState {
        self.machine.current()
    }

    /// Attempt in progress (0 before the first draft).
    pub fn attempt(&self) -> u32 {
        self.machine.attempt()
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether another draft+review cycle may start.
    pub fn has_budget(&self) -> bool {
        self.machine.attempt() < self.max_attempts
    }

    pub fn begin_attempt(&mut self) -> u32 {
        self.machine.begin_attempt()
    }

    pub fn advance(
        &mut self,
        to: ResolutionState,
        reason: Option<&str>,
    ) -> Result<(), IllegalTransition> {
        self.machine.advance(to, reason)
    }

    pub fn record_attempt(&mut self, record: AttemptRecord) {
        self.attempts.push(record);
    }

    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    /// Rejection text from the most recent attempt, fed into the next one.
    pub fn last_feedback(&self) -> Option<&str> {
        self.attempts.last().and_then(|a| a.verdict.feedback())
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.machine.elapsed_ms()
    }

    pub fn summary(&self) -> String {
        self.machine.summary()
    }

    /// Finish with an approved response.
    ///
    /// Falls back to a workflow escalation when no category was recorded,
    /// which only happens if the controller skipped classification.
    pub fn deliver(self, response: String) -> Outcome {
        let Some(category) = self.category else {
            return self.escalate(EscalationReason::Failure {
                failure: FailureKind::Workflow,
                error: "delivery attempted without a category".into(),
            });
        };
        Outcome::Delivered(Delivery {
            ticket_id: self.ticket.id().to_string(),
            category,
            response,
            attempts: self.attempts,
            transitions: self.machine.into_transitions(),
        })
    }

    /// Finish by handing the ticket to a human.
    pub fn escalate(mut self, reason: EscalationReason) -> Outcome {
        if !self.machine.is_terminal() {
            // Legal from every non-terminal stage.
            let _ = self.machine.escalate(reason.message());
        }
        let attempt_count = self.machine.attempt();
        Outcome::Escalated(Escalation {
            ticket_id: self.ticket.id().to_string(),
            category: self.category,
            reason,
            attempt_count,
            attempts: self.attempts,
            transitions: self.machine.into_transitions(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextBundle;
    use crate::review::{Draft, ReviewVerdict};

    fn record(attempt: u32, verdict: ReviewVerdict) -> AttemptRecord {
        AttemptRecord {
            attempt,
            context: ContextBundle::empty(Category::Technical, "q", attempt > 1),
            draft: Draft {
                attempt,
                text: format!("draft {attempt}"),
                feedback: None,
            },
            verdict,
            duration_ms: 1,
        }
    }

    fn ticket() -> Ticket {
        Ticket::with_id("T-1", "API error", "500 on /orders").unwrap()
    }

    #[test]
    fn test_budget_tracking() {
        let mut run = RunState::new(ticket(), 2);
        assert!(run.has_budget());
        run.begin_attempt();
        assert!(run.has_budget());
        run.begin_attempt();
        assert!(!run.has_budget());
    }

    #[test]
    fn test_zero_max_attempts_clamped() {
        let run = RunState::new(ticket(), 0);
        assert_eq!(run.max_attempts(), 1);
    }

    #[test]
    fn test_last_feedback_follows_latest_attempt() {
        let mut run = RunState::new(ticket(), 2);
        assert_eq!(run.last_feedback(), None);
        run.record_attempt(record(1, ReviewVerdict::rejected("add steps")));
        assert_eq!(run.last_feedback(), Some("add steps"));
    }

    #[test]
    fn test_set_category_only_once() {
        let mut run = RunState::new(ticket(), 2);
        run.set_category(Category::Technical);
        run.set_category(Category::Billing);
        assert_eq!(run.category(), Some(Category::Technical));
    }

    #[test]
    fn test_escalate_before_classification() {
        let run = RunState::new(ticket(), 2);
        let outcome = run.escalate(EscalationReason::Failure {
            failure: FailureKind::Classification,
            error: "offline".into(),
        });
        let Outcome::Escalated(escalation) = outcome else {
            panic!("expected escalation");
        };
        assert_eq!(escalation.attempt_count, 0);
        assert_eq!(escalation.category, None);
        assert_eq!(escalation.transitions.len(), 1);
        assert_eq!(escalation.transitions[0].to, ResolutionState::Escalating);
    }

    #[test]
    fn test_deliver_without_category_is_workflow_escalation() {
        let run = RunState::new(ticket(), 2);
        let outcome = run.deliver("hello".into());
        let Outcome::Escalated(escalation) = outcome else {
            panic!("expected escalation");
        };
        assert_eq!(escalation.reason.failure_kind(), Some(FailureKind::Workflow));
    }

    #[test]
    fn test_illegal_transition_becomes_workflow_reason() {
        let reason: EscalationReason = IllegalTransition {
            from: ResolutionState::Classifying,
            to: ResolutionState::Delivering,
        }
        .into();
        assert_eq!(reason.failure_kind(), Some(FailureKind::Workflow));
        assert!(reason.message().contains("Classifying"));
    }
}
