//! Structured logging of controller events.
//!
//! A background task subscribes to the controller's event bus and turns
//! every `ResolutionEvent` into a `tracing` record. It ends when the last
//! handle to the bus is dropped and reports what it saw.

use resolution::{EventBus, ResolutionEvent};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Counts collected by the event logger over its lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventLogSummary {
    pub events: usize,
    pub runs_finished: usize,
    pub stage_failures: usize,
    /// Events dropped because the logger fell behind.
    pub lagged: u64,
}

fn log_event(event: &ResolutionEvent) {
    match event {
        ResolutionEvent::RunStarted { ticket_id, .. } => {
            info!(ticket_id = %ticket_id, "Run started");
        }
        ResolutionEvent::StageEntered {
            ticket_id,
            stage,
            attempt,
            ..
        } => {
            debug!(ticket_id = %ticket_id, %stage, attempt, "Stage entered");
        }
        ResolutionEvent::StageCompleted {
            ticket_id,
            stage,
            attempt,
            duration_ms,
            result,
            ..
        } => {
            info!(
                ticket_id = %ticket_id,
                %stage,
                attempt,
                duration_ms,
                result = %result,
                "Stage completed"
            );
        }
        ResolutionEvent::StageFailed {
            ticket_id,
            stage,
            attempt,
            duration_ms,
            failure,
            error,
            ..
        } => {
            warn!(
                ticket_id = %ticket_id,
                %stage,
                attempt,
                duration_ms,
                %failure,
                error = %error,
                "Stage failed"
            );
        }
        ResolutionEvent::RunFinished {
            ticket_id,
            outcome,
            category,
            attempt_count,
            elapsed_ms,
            ..
        } => {
            info!(
                ticket_id = %ticket_id,
                outcome = %outcome,
                category = ?category,
                attempt_count,
                elapsed_ms,
                "Run finished"
            );
        }
    }
}

/// Spawn the logger task. Subscribe happens before this returns, so no event
/// published afterwards is missed.
pub fn spawn_event_logger(bus: &EventBus) -> JoinHandle<EventLogSummary> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        let mut summary = EventLogSummary::default();
        loop {
            match rx.recv().await {
                Ok(event) => {
                    summary.events += 1;
                    match &event {
                        ResolutionEvent::RunFinished { .. } => summary.runs_finished += 1,
                        ResolutionEvent::StageFailed { .. } => summary.stage_failures += 1,
                        _ => {}
                    }
                    log_event(&event);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event logger lagged behind the event bus");
                    summary.lagged += skipped;
                }
                Err(RecvError::Closed) => break,
            }
        }
        summary
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use resolution::{FailureKind, ResolutionState};

    #[tokio::test]
    async fn test_logger_counts_until_bus_dropped() {
        let bus = EventBus::new();
        let handle = spawn_event_logger(&bus);

        bus.publish(ResolutionEvent::RunStarted {
            ticket_id: "T-1".into(),
            timestamp: Utc::now(),
        });
        bus.publish(ResolutionEvent::StageFailed {
            ticket_id: "T-1".into(),
            stage: ResolutionState::Classifying,
            attempt: 0,
            duration_ms: 3,
            failure: FailureKind::Classification,
            error: "down".into(),
            timestamp: Utc::now(),
        });
        bus.publish(ResolutionEvent::RunFinished {
            ticket_id: "T-1".into(),
            outcome: "escalated".into(),
            category: None,
            attempt_count: 0,
            elapsed_ms: 4,
            timestamp: Utc::now(),
        });
        drop(bus);

        let summary = handle.await.unwrap();
        assert_eq!(
            summary,
            EventLogSummary {
                events: 3,
                runs_finished: 1,
                stage_failures: 1,
                lagged: 0,
            }
        );
    }
}
