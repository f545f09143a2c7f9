//! Concurrent resolution of many tickets.
//!
//! Each ticket gets its own run inside the shared controller; a semaphore
//! bounds how many are in flight. Results come back in input order.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use resolution::{Outcome, ResolutionController, Ticket, TicketError};
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// One ticket as read from a batch file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TicketInput {
    #[serde(default)]
    pub id: Option<String>,
    pub subject: String,
    pub description: String,
}

impl TicketInput {
    pub fn into_ticket(self) -> Result<Ticket, TicketError> {
        match self.id {
            Some(id) => Ticket::with_id(id, &self.subject, &self.description),
            None => Ticket::new(&self.subject, &self.description),
        }
    }
}

/// Read tickets from a JSON array or from JSON Lines.
pub fn load_tickets(path: &Path) -> Result<Vec<TicketInput>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read tickets from {}", path.display()))?;
    parse_tickets(&raw).with_context(|| format!("Invalid ticket file {}", path.display()))
}

pub fn parse_tickets(raw: &str) -> Result<Vec<TicketInput>> {
    if raw.trim_start().starts_with('[') {
        return serde_json::from_str(raw).context("Failed to parse JSON ticket list");
    }
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("line {}: malformed ticket", i + 1))
        })
        .collect()
}

/// Result for one input, in input order.
#[derive(Debug)]
pub struct BatchEntry {
    pub index: usize,
    pub result: Result<Outcome, TicketError>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    pub fn delivered(&self) -> usize {
        self.outcomes().filter(|o| o.is_delivered()).count()
    }

    pub fn escalated(&self) -> usize {
        self.outcomes().filter(|o| o.is_escalated()).count()
    }

    /// Inputs rejected by validation before any run started.
    pub fn invalid(&self) -> usize {
        self.entries.iter().filter(|e| e.result.is_err()).count()
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &Outcome> {
        self.entries.iter().filter_map(|e| e.result.as_ref().ok())
    }
}

/// Resolve every input with at most `concurrency` tickets in flight.
pub async fn resolve_batch(
    controller: Arc<ResolutionController>,
    inputs: Vec<TicketInput>,
    concurrency: usize,
) -> Result<BatchReport> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut entries = Vec::with_capacity(inputs.len());
    let mut handles = Vec::new();

    for (index, input) in inputs.into_iter().enumerate() {
        let ticket = match input.into_ticket() {
            Ok(ticket) => ticket,
            Err(error) => {
                warn!(index, error = %error, "Skipping invalid ticket");
                entries.push(BatchEntry {
                    index,
                    result: Err(error),
                });
                continue;
            }
        };

        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .context("Batch semaphore closed")?;
        let controller = controller.clone();
        handles.push((
            index,
            tokio::spawn(async move {
                let outcome = controller.resolve(ticket).await;
                drop(permit);
                outcome
            }),
        ));
    }

    for (index, handle) in handles {
        let outcome = handle
            .await
            .with_context(|| format!("Resolution task for ticket #{index} failed"))?;
        entries.push(BatchEntry {
            index,
            result: Ok(outcome),
        });
    }
    entries.sort_by_key(|e| e.index);

    let report = BatchReport { entries };
    info!(
        delivered = report.delivered(),
        escalated = report.escalated(),
        invalid = report.invalid(),
        "Batch complete"
    );
    Ok(report)
}
