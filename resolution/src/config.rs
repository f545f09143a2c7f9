//! Controller configuration.
//!
//! Loaded from TOML; every field has a default so a partial file is fine:
//!
//! ```toml
//! max_attempts = 2
//!
//! [retrieval]
//! include_related = true
//!
//! [retrieval.first_pass]
//! top_k = 3
//! min_relevance = 0.1
//!
//! [retrieval.refinement]
//! top_k = 5
//! min_relevance = 0.05
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Default number of draft+review cycles (1 initial + 1 retry).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Limits for one retrieval pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalPass {
    pub top_k: usize,
    pub min_relevance: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub first_pass: RetrievalPass,
    /// Wider, lower-threshold search used once review feedback is available.
    pub refinement: RetrievalPass,
    pub include_related: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            first_pass: RetrievalPass {
                top_k: 3,
                min_relevance: 0.1,
            },
            refinement: RetrievalPass {
                top_k: 5,
                min_relevance: 0.05,
            },
            include_related: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Total draft+review cycles before escalating.
    pub max_attempts: u32,
    pub retrieval: RetrievalConfig,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retrieval: RetrievalConfig::default(),
        }
    }
}

impl ResolutionConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be at least 1".into()));
        }
        for (name, pass) in [
            ("first_pass", &self.retrieval.first_pass),
            ("refinement", &self.retrieval.refinement),
        ] {
            if pass.top_k == 0 {
                return Err(ConfigError::Invalid(format!(
                    "retrieval.{name}.top_k must be at least 1"
                )));
            }
            if !(0.0..=1.0).contains(&pass.min_relevance) {
                return Err(ConfigError::Invalid(format!(
                    "retrieval.{name}.min_relevance must be within 0.0..=1.0"
                )));
            }
        }
        Ok(())
    }

    /// Pass parameters for first retrieval vs. feedback-driven refinement.
    pub fn retrieval_pass(&self, refinement: bool) -> RetrievalPass {
        if refinement {
            self.retrieval.refinement
        } else {
            self.retrieval.first_pass
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ResolutionConfig::default();
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.retrieval_pass(false).top_k, 3);
        assert_eq!(config.retrieval_pass(true).top_k, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = ResolutionConfig::from_toml_str("max_attempts = 3").unwrap();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.retrieval, RetrievalConfig::default());

        let config = ResolutionConfig::from_toml_str(
            "[retrieval]\ninclude_related = false\n[retrieval.refinement]\ntop_k = 8\nmin_relevance = 0.0\n",
        )
        .unwrap();
        assert!(!config.retrieval.include_related);
        assert_eq!(config.retrieval.refinement.top_k, 8);
        assert_eq!(config.retrieval.first_pass.top_k, 3);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            ResolutionConfig::from_toml_str("max_attempts = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ResolutionConfig::from_toml_str(
                "[retrieval.first_pass]\ntop_k = 3\nmin_relevance = 1.5\n"
            ),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ResolutionConfig::from_toml_str("max_attempts = \"two\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resolution.toml");
        std::fs::write(&path, "max_attempts = 1\n").unwrap();
        assert_eq!(ResolutionConfig::load(&path).unwrap().max_attempts, 1);
        assert!(matches!(
            ResolutionConfig::load(&dir.path().join("missing.toml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
