//! Configuration management for the resume matcher

use crate::error::{Result, ResumeMatchError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_MODEL: &str = "RESUME_MATCHER_MODEL";
pub const ENV_WEIGHTS: &str = "RESUME_MATCHER_WEIGHTS";
pub const ENV_MAX_TOKENS: &str = "RESUME_MATCHER_MAX_TOKENS";
pub const ENV_SKILL_VOCAB: &str = "RESUME_MATCHER_SKILL_VOCAB";

const WEIGHT_TOLERANCE: f32 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub models: ModelConfig,
    pub processing: ProcessingConfig,
    pub scoring: ScoringConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub models_dir: PathBuf,
    /// HuggingFace repo id, a directory under `models_dir`, or `hash[:dim]`
    pub model_identifier: String,
    pub max_input_tokens: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingConfig {
    pub skill_vocabulary_source: Option<PathBuf>,
    /// Role catalog for `recommend_roles`; the built-in one when unset
    pub role_catalog_source: Option<PathBuf>,
    pub extraction_timeout_ms: u64,
    pub inference_timeout_ms: u64,
    pub max_concurrency: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub skill_weight: f32,
    pub semantic_weight: f32,
    pub experience_weight: f32,
}

impl Default for Config {
    fn default() -> Self {
        let models_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".resume-matcher")
            .join("models");

        Self {
            models: ModelConfig {
                models_dir,
                model_identifier: "minishlab/potion-base-8M".to_string(),
                max_input_tokens: 512,
            },
            processing: ProcessingConfig {
                skill_vocabulary_source: None,
                role_catalog_source: None,
                extraction_timeout_ms: 10_000,
                inference_timeout_ms: 5_000,
                max_concurrency: 8,
            },
            scoring: ScoringConfig::default(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            skill_weight: 1.0 / 3.0,
            semantic_weight: 1.0 / 3.0,
            experience_weight: 1.0 / 3.0,
        }
    }
}

impl Config {
    /// Load from the user config directory, falling back to defaults
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            ResumeMatchError::Configuration(format!(
                "Failed to parse config '{}': {}",
                path.display(),
                e
            ))
        })
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| {
            ResumeMatchError::Configuration(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
            .join("resume-matcher")
            .join("config.toml")
    }

    /// Apply `RESUME_MATCHER_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup(ENV_MODEL) {
            self.models.model_identifier = model.trim().to_string();
        }

        if let Some(raw) = lookup(ENV_WEIGHTS) {
            self.scoring = ScoringConfig::parse_triple(&raw)?;
        }

        if let Some(raw) = lookup(ENV_MAX_TOKENS) {
            self.models.max_input_tokens = raw.trim().parse().map_err(|_| {
                ResumeMatchError::Configuration(format!("{} must be an integer, got '{}'", ENV_MAX_TOKENS, raw))
            })?;
        }

        if let Some(path) = lookup(ENV_SKILL_VOCAB) {
            self.processing.skill_vocabulary_source = Some(PathBuf::from(path.trim()));
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.scoring.validate()?;

        if self.models.max_input_tokens == 0 {
            return Err(ResumeMatchError::Configuration(
                "max_input_tokens must be greater than zero".to_string(),
            ));
        }
        if self.processing.max_concurrency == 0 {
            return Err(ResumeMatchError::Configuration(
                "max_concurrency must be greater than zero".to_string(),
            ));
        }
        if self.models.model_identifier.trim().is_empty() {
            return Err(ResumeMatchError::Configuration(
                "model_identifier must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_millis(self.processing.extraction_timeout_ms)
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(self.processing.inference_timeout_ms)
    }
}

impl ScoringConfig {
    /// Parse `"skill,semantic,experience"`
    fn parse_triple(raw: &str) -> Result<Self> {
        let parts: Vec<f32> = raw
            .split(',')
            .map(|p| p.trim().parse::<f32>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| {
                ResumeMatchError::Configuration(format!("{} must be three numbers, got '{}'", ENV_WEIGHTS, raw))
            })?;

        match parts.as_slice() {
            [skill, semantic, experience] => Ok(Self {
                skill_weight: *skill,
                semantic_weight: *semantic,
                experience_weight: *experience,
            }),
            _ => Err(ResumeMatchError::Configuration(format!(
                "{} must have exactly three weights, got {}",
                ENV_WEIGHTS,
                parts.len()
            ))),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let weights = [self.skill_weight, self.semantic_weight, self.experience_weight];

        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ResumeMatchError::Configuration(format!(
                "scoring weights must be non-negative, got {:?}",
                weights
            )));
        }

        let sum: f32 = weights.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(ResumeMatchError::Configuration(format!(
                "scoring weights must sum to 1.0, got {}",
                sum
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.models.max_input_tokens, 512);
    }

    #[test]
    fn test_env_overrides() {
        let vars = env(&[
            (ENV_MODEL, "hash:64"),
            (ENV_WEIGHTS, "0.5, 0.25, 0.25"),
            (ENV_MAX_TOKENS, "128"),
            (ENV_SKILL_VOCAB, "/etc/skills.txt"),
        ]);
        let mut config = Config::default();
        config.apply_overrides_from(|k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.models.model_identifier, "hash:64");
        assert_eq!(config.models.max_input_tokens, 128);
        assert_eq!(config.scoring.skill_weight, 0.5);
        assert_eq!(
            config.processing.skill_vocabulary_source,
            Some(PathBuf::from("/etc/skills.txt"))
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let vars = env(&[(ENV_WEIGHTS, "0.5,0.5,0.5")]);
        let mut config = Config::default();
        config.apply_overrides_from(|k| vars.get(k).cloned()).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_weights_rejected() {
        let vars = env(&[(ENV_WEIGHTS, "0.5,0.5")]);
        let mut config = Config::default();
        assert!(config.apply_overrides_from(|k| vars.get(k).cloned()).is_err());

        let vars = env(&[(ENV_WEIGHTS, "a,b,c")]);
        assert!(config.apply_overrides_from(|k| vars.get(k).cloned()).is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.models.model_identifier = "hash".to_string();
        config.processing.max_concurrency = 2;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_toml_is_configuration_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "models = 3").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ResumeMatchError::Configuration(_)));
    }
}
