//! Outcome sinks: where terminal results are recorded.
//!
//! Sinks receive a flattened [`OutcomeRecord`] after the controller has
//! decided the outcome. A failing sink is logged by the controller and never
//! changes the outcome.
//!
//! Two sinks ship here:
//! - [`JsonlOutcomeSink`]: append-only `outcomes.jsonl`, one record per line
//! - [`MemoryOutcomeSink`]: in-process buffer for tests and embedding

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::category::Category;
use crate::outcome::{EscalationReason, Outcome};
use crate::review::AttemptSummary;
use crate::ticket::Ticket;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("outcome log I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("outcome record serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("malformed outcome record on line {line}: {message}")]
    Malformed { line: usize, message: String },
}

/// What gets persisted for a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OutcomeRecord {
    Delivered {
        ticket_id: String,
        category: Category,
        response: String,
        attempt_count: u32,
        recorded_at: DateTime<Utc>,
    },
    Escalated {
        ticket_id: String,
        ticket_subject: String,
        ticket_description: String,
        category: Option<Category>,
        reason: EscalationReason,
        attempt_count: u32,
        history: Vec<AttemptSummary>,
        recorded_at: DateTime<Utc>,
    },
}

impl OutcomeRecord {
    pub fn from_outcome(outcome: &Outcome, ticket: &Ticket) -> Self {
        match outcome {
            Outcome::Delivered(delivery) => Self::Delivered {
                ticket_id: delivery.ticket_id.clone(),
                category: delivery.category,
                response: delivery.response.clone(),
                attempt_count: delivery.attempt_count(),
                recorded_at: Utc::now(),
            },
            Outcome::Escalated(escalation) => Self::Escalated {
                ticket_id: escalation.ticket_id.clone(),
                ticket_subject: ticket.subject().to_string(),
                ticket_description: ticket.description().to_string(),
                category: escalation.category,
                reason: escalation.reason.clone(),
                attempt_count: escalation.attempt_count,
                history: escalation.attempts.iter().map(AttemptSummary::from).collect(),
                recorded_at: Utc::now(),
            },
        }
    }

    pub fn ticket_id(&self) -> &str {
        match self {
            Self::Delivered { ticket_id, .. } | Self::Escalated { ticket_id, .. } => ticket_id,
        }
    }

    pub fn category(&self) -> Option<Category> {
        match self {
            Self::Delivered { category, .. } => Some(*category),
            Self::Escalated { category, .. } => *category,
        }
    }

    pub fn attempt_count(&self) -> u32 {
        match self {
            Self::Delivered { attempt_count, .. } | Self::Escalated { attempt_count, .. } => {
                *attempt_count
            }
        }
    }

    pub fn is_escalated(&self) -> bool {
        matches!(self, Self::Escalated { .. })
    }
}

#[async_trait]
pub trait OutcomeSink: Send + Sync {
    fn name(&self) -> &str;

    async fn record(&self, record: &OutcomeRecord) -> Result<(), SinkError>;
}

/// Appends records to a JSONL file, creating it (and its parent directory)
/// on first write.
pub struct JsonlOutcomeSink {
    path: PathBuf,
    // Serialises appends from concurrently resolved tickets.
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonlOutcomeSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl OutcomeSink for JsonlOutcomeSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn record(&self, record: &OutcomeRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        tracing::debug!(
            path = %self.path.display(),
            ticket_id = record.ticket_id(),
            "Appended outcome record"
        );
        Ok(())
    }
}

/// Keeps records in memory.
#[derive(Default)]
pub struct MemoryOutcomeSink {
    records: Mutex<Vec<OutcomeRecord>>,
}

impl MemoryOutcomeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<OutcomeRecord> {
        self.lock().clone()
    }

    /// Recovers a poisoned lock; a push is never left half done.
    fn lock(&self) -> MutexGuard<'_, Vec<OutcomeRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl OutcomeSink for MemoryOutcomeSink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn record(&self, record: &OutcomeRecord) -> Result<(), SinkError> {
        self.lock().push(record.clone());
        Ok(())
    }
}

/// Per-category totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub delivered: usize,
    pub escalated: usize,
}

/// Aggregate view over an outcome log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeStats {
    pub total: usize,
    pub delivered: usize,
    pub escalated: usize,
    /// Escalations after every attempt was rejected.
    pub policy_escalations: usize,
    /// Escalations caused by a collaborator failure.
    pub failure_escalations: usize,
    pub escalation_rate: f64,
    pub average_attempts: f64,
    /// Keyed by category label; "Unclassified" for classification failures.
    pub by_category: BTreeMap<String, CategoryStats>,
}

/// Reads an outcome log written by [`JsonlOutcomeSink`].
pub struct OutcomeLog {
    records: Vec<OutcomeRecord>,
}

impl OutcomeLog {
    /// Load every record. A missing file is an empty log.
    pub fn read_from_file(path: &Path) -> Result<Self, SinkError> {
        let file = match std::fs::File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self {
                    records: Vec::new(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: OutcomeRecord =
                serde_json::from_str(&line).map_err(|e| SinkError::Malformed {
                    line: index + 1,
                    message: e.to_string(),
                })?;
            records.push(record);
        }
        Ok(Self { records })
    }

    pub fn from_records(records: Vec<OutcomeRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[OutcomeRecord] {
        &self.records
    }

    pub fn escalations(&self) -> impl Iterator<Item = &OutcomeRecord> {
        self.records.iter().filter(|r| r.is_escalated())
    }

    pub fn stats(&self) -> OutcomeStats {
        let mut stats = OutcomeStats {
            total: self.records.len(),
            ..OutcomeStats::default()
        };
        if stats.total == 0 {
            return stats;
        }

        let mut attempts = 0u64;
        for record in &self.records {
            attempts += u64::from(record.attempt_count());
            let label = record
                .category()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "Unclassified".to_string());
            let entry = stats.by_category.entry(label).or_default();

            match record {
                OutcomeRecord::Delivered { .. } => {
                    stats.delivered += 1;
                    entry.delivered += 1;
                }
                OutcomeRecord::Escalated { reason, .. } => {
                    stats.escalated += 1;
                    entry.escalated += 1;
                    match reason {
                        EscalationReason::PolicyRejection { .. } => stats.policy_escalations += 1,
                        EscalationReason::Failure { .. } => stats.failure_escalations += 1,
                    }
                }
            }
        }

        stats.escalation_rate = stats.escalated as f64 / stats.total as f64;
        stats.average_attempts = attempts as f64 / stats.total as f64;
        stats
    }
}
