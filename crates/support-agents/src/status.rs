//! System status report for the `status` command.

use std::collections::BTreeMap;
use std::fmt;

use resolution::{OutcomeLog, OutcomeStats};
use serde::Serialize;
use tracing::warn;

use crate::agents::AgentFactory;
use crate::llm::check_endpoint;
use crate::prompts::PROMPT_VERSION;

#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub mode: String,
    pub llm_url: String,
    pub llm_model: String,
    pub llm_configured: bool,
    /// `None` when the endpoint was not probed.
    pub llm_reachable: Option<bool>,
    pub prompt_version: String,
    pub max_attempts: u32,
    pub knowledge_base: BTreeMap<String, usize>,
    pub outcome_log: String,
    /// `None` when the outcome log could not be read.
    pub outcomes: Option<OutcomeStats>,
}

impl SystemStatus {
    /// Gather status. The endpoint is only probed when `probe` is set and an
    /// API key is configured.
    pub async fn collect(factory: &AgentFactory, probe: bool) -> Self {
        let config = factory.config();
        let llm_reachable = if probe && config.llm.is_configured() {
            Some(check_endpoint(&config.llm.url).await)
        } else {
            None
        };

        let outcomes = match OutcomeLog::read_from_file(&config.outcome_log) {
            Ok(log) => Some(log.stats()),
            Err(e) => {
                warn!(path = %config.outcome_log.display(), "Cannot read outcome log: {e}");
                None
            }
        };

        Self {
            mode: factory.mode().to_string(),
            llm_url: config.llm.url.clone(),
            llm_model: config.llm.model.clone(),
            llm_configured: config.llm.is_configured(),
            llm_reachable,
            prompt_version: PROMPT_VERSION.to_string(),
            max_attempts: config.resolution.max_attempts,
            knowledge_base: factory
                .knowledge()
                .counts()
                .into_iter()
                .map(|(category, count)| (category.to_string(), count))
                .collect(),
            outcome_log: config.outcome_log.display().to_string(),
            outcomes,
        }
    }
}

impl fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mode:            {}", self.mode)?;
        writeln!(f, "Model:           {} @ {}", self.llm_model, self.llm_url)?;
        let reachability = match (self.llm_configured, self.llm_reachable) {
            (false, _) => "not configured",
            (true, None) => "configured (not probed)",
            (true, Some(true)) => "reachable",
            (true, Some(false)) => "unreachable",
        };
        writeln!(f, "Endpoint:        {reachability}")?;
        writeln!(f, "Prompt version:  {}", self.prompt_version)?;
        writeln!(f, "Max attempts:    {}", self.max_attempts)?;
        writeln!(f, "Knowledge base:")?;
        for (category, count) in &self.knowledge_base {
            writeln!(f, "  {category:<10} {count} documents")?;
        }
        write!(f, "Outcome log:     {}", self.outcome_log)?;
        if let Some(stats) = &self.outcomes {
            write!(
                f,
                "\n  {} outcomes, {} delivered, {} escalated ({:.1}% escalation rate)",
                stats.total,
                stats.delivered,
                stats.escalated,
                stats.escalation_rate * 100.0
            )?;
        }
        Ok(())
    }
}
