//! Ensemble configuration file.
//!
//! ```toml
//! [pipeline]
//! call_timeout_secs = 300
//! default_quorum_min = 1
//!
//! [pipeline.retry]
//! max_attempts = 3
//!
//! [phases.draft]
//! providers = ["claude", "gemini", "chatgpt"]
//! quorum_min = 2
//!
//! [retrieval]
//! enabled = true
//! base_url = "http://localhost:8000"
//!
//! [[providers]]
//! id = "claude"
//! kind = "anthropic"
//! model = "claude-sonnet-4-5"
//! api_key_env = "ANTHROPIC_API_KEY"
//! ```
//!
//! A phase without its own section uses every declared provider and the
//! pipeline's default quorum.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cite_client::CiteConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{PhaseKind, ProviderId};
use crate::executor::{PhaseExecutor, RetryPolicy, DEFAULT_CALL_TIMEOUT};
use crate::orchestrator::{PhasePlan, PipelinePlan};

pub const ENV_CALL_TIMEOUT_SECS: &str = "ENSEMBLE_CALL_TIMEOUT_SECS";
pub const ENV_QUORUM_MIN: &str = "ENSEMBLE_QUORUM_MIN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Backend protocol spoken by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Anthropic,
    #[serde(alias = "chatgpt")]
    Openai,
    #[serde(alias = "google")]
    Gemini,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BackendKind::Anthropic => "anthropic",
            BackendKind::Openai => "openai",
            BackendKind::Gemini => "gemini",
        };
        write!(f, "{s}")
    }
}

/// One `[[providers]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub id: ProviderId,
    pub kind: BackendKind,
    pub model: String,
    /// Environment variable holding the API key. Backend default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub call_timeout_secs: u64,
    pub default_quorum_min: usize,
    pub retry: RetryPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            call_timeout_secs: DEFAULT_CALL_TIMEOUT.as_secs(),
            default_quorum_min: 1,
            retry: RetryPolicy::default(),
        }
    }
}

/// `[phases.<name>]`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PhaseSpec {
    #[serde(default)]
    pub providers: Vec<ProviderId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quorum_min: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PhaseSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<PhaseSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit: Option<PhaseSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judge: Option<PhaseSpec>,
}

impl PhaseSettings {
    fn get(&self, phase: PhaseKind) -> Option<&PhaseSpec> {
        match phase {
            PhaseKind::Draft => self.draft.as_ref(),
            PhaseKind::Edit => self.edit.as_ref(),
            PhaseKind::Judge => self.judge.as_ref(),
        }
    }

    fn specs_mut(&mut self) -> impl Iterator<Item = &mut PhaseSpec> {
        [&mut self.draft, &mut self.edit, &mut self.judge]
            .into_iter()
            .filter_map(Option::as_mut)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub cite: CiteConfig,
}

fn default_true() -> bool {
    true
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            cite: CiteConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EnsembleConfig {
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub phases: PhaseSettings,
    #[serde(default)]
    pub retrieval: RetrievalSettings,
    #[serde(default)]
    pub providers: Vec<ProviderSpec>,
}

impl EnsembleConfig {
    /// Read, apply environment overrides, validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&text)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate, ignoring the environment.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `ENSEMBLE_CALL_TIMEOUT_SECS` and `ENSEMBLE_QUORUM_MIN`.
    ///
    /// The quorum override replaces the default and every per-phase quorum.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(secs) = env_number::<u64>(ENV_CALL_TIMEOUT_SECS)? {
            self.pipeline.call_timeout_secs = secs;
        }
        if let Some(quorum) = env_number::<usize>(ENV_QUORUM_MIN)? {
            self.pipeline.default_quorum_min = quorum;
            for spec in self.phases.specs_mut() {
                spec.quorum_min = Some(quorum);
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.call_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.call_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.providers.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one [[providers]] entry is required".to_string(),
            ));
        }

        let mut declared = BTreeSet::new();
        for p in &self.providers {
            if p.id.as_str().trim().is_empty() {
                return Err(ConfigError::Invalid("provider id must not be empty".to_string()));
            }
            if p.model.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "provider {} has no model",
                    p.id
                )));
            }
            if !declared.insert(&p.id) {
                return Err(ConfigError::Invalid(format!(
                    "provider {} declared more than once",
                    p.id
                )));
            }
        }

        for phase in PhaseKind::ALL {
            let plan = self.phase_plan(phase);
            let mut seen = BTreeSet::new();
            for id in &plan.providers {
                if !declared.contains(id) {
                    return Err(ConfigError::Invalid(format!(
                        "{phase} phase uses undeclared provider {id}"
                    )));
                }
                if !seen.insert(id) {
                    return Err(ConfigError::Invalid(format!(
                        "{phase} phase lists provider {id} more than once"
                    )));
                }
            }
            if plan.providers.is_empty() {
                return Err(ConfigError::Invalid(format!("{phase} phase has no providers")));
            }
            if plan.quorum_min == 0 || plan.quorum_min > plan.providers.len() {
                return Err(ConfigError::Invalid(format!(
                    "{phase} phase quorum_min {} must be between 1 and {}",
                    plan.quorum_min,
                    plan.providers.len()
                )));
            }
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.call_timeout_secs)
    }

    pub fn executor(&self) -> PhaseExecutor {
        PhaseExecutor::new(self.call_timeout()).with_retry(self.pipeline.retry.clone())
    }

    pub fn provider_ids(&self) -> Vec<ProviderId> {
        self.providers.iter().map(|p| p.id.clone()).collect()
    }

    pub fn provider(&self, id: &ProviderId) -> Option<&ProviderSpec> {
        self.providers.iter().find(|p| &p.id == id)
    }

    /// Resolved providers and quorum for `phase`.
    pub fn phase_plan(&self, phase: PhaseKind) -> PhasePlan {
        let spec = self.phases.get(phase);
        let providers = match spec {
            Some(s) if !s.providers.is_empty() => s.providers.clone(),
            _ => self.provider_ids(),
        };
        let quorum_min = spec
            .and_then(|s| s.quorum_min)
            .unwrap_or(self.pipeline.default_quorum_min);
        PhasePlan::new(providers, quorum_min)
    }

    pub fn pipeline_plan(&self) -> PipelinePlan {
        PipelinePlan {
            draft: self.phase_plan(PhaseKind::Draft),
            edit: self.phase_plan(PhaseKind::Edit),
            judge: self.phase_plan(PhaseKind::Judge),
        }
    }
}

fn env_number<T: std::str::FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value }),
        Err(_) => Ok(None),
    }
}
