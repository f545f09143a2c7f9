use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use resolution::ResolutionConfig;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LLM_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_LLM_MODEL: &str = "google/gemini-2.0-flash-exp:free";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_CONCURRENCY: usize = 4;

/// Chat-completions endpoint used by the LLM agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmEndpoint {
    pub url: String,
    /// `None` disables the LLM agents; the offline fallbacks are used instead.
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

impl LlmEndpoint {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

/// Top-level agent configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub llm: LlmEndpoint,
    /// Directory holding `{category}_docs.json` knowledge-base files.
    pub data_dir: PathBuf,
    /// JSONL file every outcome is appended to.
    pub outcome_log: PathBuf,
    /// Maximum tickets in flight for `batch`.
    pub concurrency: usize,
    pub resolution: ResolutionConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

/// Optional TOML overrides. Every field left out keeps the env/default value.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    data_dir: Option<PathBuf>,
    outcome_log: Option<PathBuf>,
    concurrency: Option<usize>,
    llm: Option<FileLlm>,
    resolution: Option<ResolutionConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileLlm {
    url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

impl AgentConfig {
    /// Build from an environment lookup (`SUPPORT_*`, with `OPENROUTER_API_KEY`
    /// accepted as the key fallback).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let timeout_secs = lookup("SUPPORT_LLM_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Self {
            llm: LlmEndpoint {
                url: lookup("SUPPORT_LLM_URL").unwrap_or_else(|| DEFAULT_LLM_URL.into()),
                api_key: lookup("SUPPORT_LLM_API_KEY").or_else(|| lookup("OPENROUTER_API_KEY")),
                model: lookup("SUPPORT_LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.into()),
                timeout_secs,
            },
            data_dir: lookup("SUPPORT_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            outcome_log: lookup("SUPPORT_OUTCOME_LOG")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("outcomes.jsonl")),
            concurrency: DEFAULT_CONCURRENCY,
            resolution: ResolutionConfig::default(),
        }
    }

    /// Environment defaults, then the TOML file on top when given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = path {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            config
                .apply_toml(&raw)
                .with_context(|| format!("Invalid config file {}", path.display()))?;
        }
        Ok(config)
    }

    pub fn apply_toml(&mut self, raw: &str) -> Result<()> {
        let file: FileConfig = toml::from_str(raw).context("Failed to parse TOML")?;

        if let Some(data_dir) = file.data_dir {
            self.data_dir = data_dir;
        }
        if let Some(outcome_log) = file.outcome_log {
            self.outcome_log = outcome_log;
        }
        if let Some(concurrency) = file.concurrency {
            anyhow::ensure!(concurrency >= 1, "concurrency must be at least 1");
            self.concurrency = concurrency;
        }
        if let Some(llm) = file.llm {
            if let Some(url) = llm.url {
                self.llm.url = url;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(api_key);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }
        if let Some(resolution) = file.resolution {
            resolution.validate()?;
            self.resolution = resolution;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = AgentConfig::from_lookup(|_| None);
        assert_eq!(config.llm.url, DEFAULT_LLM_URL);
        assert_eq!(config.llm.model, DEFAULT_LLM_MODEL);
        assert!(!config.llm.is_configured());
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.outcome_log, PathBuf::from("outcomes.jsonl"));
        assert_eq!(config.resolution.max_attempts, 2);
    }

    #[test]
    fn test_env_overrides() {
        let config = AgentConfig::from_lookup(lookup_from(&[
            ("SUPPORT_LLM_URL", "http://localhost:8080/v1"),
            ("SUPPORT_LLM_MODEL", "qwen"),
            ("SUPPORT_DATA_DIR", "/srv/kb"),
            ("SUPPORT_LLM_TIMEOUT_SECS", "15"),
            ("OPENROUTER_API_KEY", "sk-or"),
        ]));
        assert_eq!(config.llm.url, "http://localhost:8080/v1");
        assert_eq!(config.llm.model, "qwen");
        assert_eq!(config.llm.timeout_secs, 15);
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-or"));
        assert_eq!(config.data_dir, PathBuf::from("/srv/kb"));
    }

    #[test]
    fn test_support_key_wins_over_openrouter_key() {
        let config = AgentConfig::from_lookup(lookup_from(&[
            ("SUPPORT_LLM_API_KEY", "sk-support"),
            ("OPENROUTER_API_KEY", "sk-or"),
        ]));
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-support"));
    }

    #[test]
    fn test_toml_overrides_env() {
        let mut config = AgentConfig::from_lookup(lookup_from(&[("SUPPORT_LLM_MODEL", "env")]));
        config
            .apply_toml(
                r#"
outcome_log = "logs/outcomes.jsonl"
concurrency = 8

[llm]
model = "file"

[resolution]
max_attempts = 3
"#,
            )
            .unwrap();
        assert_eq!(config.llm.model, "file");
        assert_eq!(config.outcome_log, PathBuf::from("logs/outcomes.jsonl"));
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.resolution.max_attempts, 3);
        assert_eq!(config.llm.url, DEFAULT_LLM_URL);
    }

    #[test]
    fn test_toml_rejects_unknown_and_invalid() {
        let mut config = AgentConfig::from_lookup(|_| None);
        assert!(config.apply_toml("max_retries = 3").is_err());
        assert!(config.apply_toml("concurrency = 0").is_err());
        assert!(config
            .apply_toml("[resolution]\nmax_attempts = 0")
            .is_err());
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("support.toml");
        std::fs::write(&path, "data_dir = \"kb\"\n").unwrap();
        let config = AgentConfig::load(Some(&path)).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("kb"));

        assert!(AgentConfig::load(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
