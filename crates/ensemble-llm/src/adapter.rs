//! `ProviderAdapter` over any chat backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ensemble_core::{
    FailureKind, PhaseInput, PhaseKind, PhaseOutput, ProviderAdapter, ProviderId, ProviderOutcome,
};
use tracing::{debug, warn};

use crate::chat::{ChatBackend, ChatParams, ChatRequest};
use crate::extract::extract_json;
use crate::prompt;

/// Edit and judge answers carry whole integrated drafts plus metadata, so
/// they get this many times the draft token budget.
const LATER_PHASE_TOKEN_FACTOR: u32 = 3;

/// Turns a chat backend into a contract-validating provider.
pub struct ContractAdapter {
    id: ProviderId,
    backend: Arc<dyn ChatBackend>,
    params: ChatParams,
}

impl ContractAdapter {
    pub fn new(id: impl Into<ProviderId>, backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            id: id.into(),
            backend,
            params: ChatParams::default(),
        }
    }

    pub fn with_params(mut self, params: ChatParams) -> Self {
        self.params = params;
        self
    }

    pub fn backend(&self) -> &dyn ChatBackend {
        self.backend.as_ref()
    }

    /// Sampling parameters for `phase`.
    pub fn params_for(&self, phase: PhaseKind) -> ChatParams {
        let max_tokens = match phase {
            PhaseKind::Draft => self.params.max_tokens,
            PhaseKind::Edit | PhaseKind::Judge => self
                .params
                .max_tokens
                .saturating_mul(LATER_PHASE_TOKEN_FACTOR),
        };
        ChatParams {
            max_tokens,
            ..self.params
        }
    }
}

#[async_trait]
impl ProviderAdapter for ContractAdapter {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    async fn invoke(
        &self,
        phase: PhaseKind,
        input: &PhaseInput,
        timeout: Duration,
    ) -> ProviderOutcome {
        let messages = match prompt::messages(phase, input) {
            Ok(messages) => messages,
            Err(e) => {
                return ProviderOutcome::failure(
                    FailureKind::InvocationError,
                    format!("failed to serialize {phase} input: {e}"),
                )
            }
        };
        let request = ChatRequest {
            messages,
            params: self.params_for(phase),
            timeout,
        };

        let response = match self.backend.chat(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(provider = %self.id, backend = self.backend.name(), phase = %phase, error = %e, "provider call failed");
                return ProviderOutcome::failure(e.failure_kind(), e.to_string());
            }
        };
        debug!(
            provider = %self.id,
            model = %response.model,
            input_tokens = ?response.input_tokens,
            output_tokens = ?response.output_tokens,
            "provider answered"
        );

        let Some(raw) = extract_json(&response.content) else {
            return ProviderOutcome::failure(
                FailureKind::SchemaInvalid,
                "response contains no JSON object",
            );
        };
        match PhaseOutput::parse(phase, raw) {
            Ok(contract) => ProviderOutcome::success(contract),
            Err(e) => ProviderOutcome::failure(FailureKind::SchemaInvalid, e.to_string()),
        }
    }
}
