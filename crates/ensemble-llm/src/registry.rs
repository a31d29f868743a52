//! Build a [`ProviderRegistry`] from `[[providers]]` entries.

use std::sync::Arc;

use ensemble_core::{BackendKind, EnsembleConfig, ProviderRegistry, ProviderSpec};
use tracing::info;

use crate::adapter::ContractAdapter;
use crate::anthropic::{self, AnthropicBackend};
use crate::chat::{ChatBackend, ChatParams};
use crate::error::LlmError;
use crate::gemini::{self, GeminiBackend};
use crate::openai::{self, OpenAiBackend};

/// Environment variable consulted when a provider names none.
pub fn default_api_key_env(kind: BackendKind) -> &'static str {
    match kind {
        BackendKind::Anthropic => anthropic::DEFAULT_API_KEY_ENV,
        BackendKind::Openai => openai::DEFAULT_API_KEY_ENV,
        BackendKind::Gemini => gemini::DEFAULT_API_KEY_ENV,
    }
}

/// Registry with one [`ContractAdapter`] per configured provider, keys read
/// from the process environment.
pub fn build_registry(config: &EnsembleConfig) -> Result<ProviderRegistry, LlmError> {
    build_registry_with(config, |var| std::env::var(var).ok())
}

/// Same as [`build_registry`] with an explicit key lookup.
pub fn build_registry_with<F>(
    config: &EnsembleConfig,
    lookup_key: F,
) -> Result<ProviderRegistry, LlmError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut registry = ProviderRegistry::new();
    for spec in &config.providers {
        let adapter = build_adapter(spec, &lookup_key)?;
        info!(provider = %spec.id, kind = %spec.kind, model = %spec.model, "registered provider");
        registry.register(Arc::new(adapter));
    }
    Ok(registry)
}

/// One adapter for `spec`.
pub fn build_adapter<F>(spec: &ProviderSpec, lookup_key: F) -> Result<ContractAdapter, LlmError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = spec
        .api_key_env
        .as_deref()
        .unwrap_or_else(|| default_api_key_env(spec.kind));
    let api_key = lookup_key(var)
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            LlmError::Misconfigured(format!("provider {}: {var} is not set", spec.id))
        })?;

    let backend = build_backend(spec, api_key)?;
    let defaults = ChatParams::default();
    let params = ChatParams {
        max_tokens: spec.max_tokens.unwrap_or(defaults.max_tokens),
        temperature: spec.temperature.unwrap_or(defaults.temperature),
    };
    Ok(ContractAdapter::new(spec.id.clone(), backend).with_params(params))
}

pub fn build_backend(spec: &ProviderSpec, api_key: String) -> Result<Arc<dyn ChatBackend>, LlmError> {
    let model = spec.model.clone();
    let base_url = spec.base_url.clone();
    let backend: Arc<dyn ChatBackend> = match spec.kind {
        BackendKind::Anthropic => Arc::new(AnthropicBackend::new(api_key, model, base_url)?),
        BackendKind::Openai => Arc::new(OpenAiBackend::new(api_key, model, base_url)?),
        BackendKind::Gemini => Arc::new(GeminiBackend::new(api_key, model, base_url)?),
    };
    Ok(backend)
}
