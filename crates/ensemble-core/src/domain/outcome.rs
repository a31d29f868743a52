//! Provider outcomes and the assembled result of one phase.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::contracts::PhaseOutput;
use crate::domain::digest::InputDigest;
use crate::domain::provider::{PhaseKind, ProviderId};

/// Why a provider call produced no usable contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The call exceeded its per-call bound.
    Timeout,
    /// Transport, authentication or rate-limit failure.
    InvocationError,
    /// The provider answered, but not in the phase's contract shape.
    SchemaInvalid,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::Timeout => "timeout",
            FailureKind::InvocationError => "invocation_error",
            FailureKind::SchemaInvalid => "schema_invalid",
        };
        write!(f, "{s}")
    }
}

/// The single outcome of one provider call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProviderOutcome {
    Success { contract: PhaseOutput },
    Failure { kind: FailureKind, message: String },
}

impl ProviderOutcome {
    pub fn success(contract: PhaseOutput) -> Self {
        ProviderOutcome::Success { contract }
    }

    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        ProviderOutcome::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(after: std::time::Duration) -> Self {
        Self::failure(
            FailureKind::Timeout,
            format!("no answer within {}ms", after.as_millis()),
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProviderOutcome::Success { .. })
    }

    pub fn contract(&self) -> Option<&PhaseOutput> {
        match self {
            ProviderOutcome::Success { contract } => Some(contract),
            ProviderOutcome::Failure { .. } => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            ProviderOutcome::Success { .. } => None,
            ProviderOutcome::Failure { kind, .. } => Some(*kind),
        }
    }

    /// Whether retrying the same call could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        self.failure_kind().is_some()
    }
}

/// One settled provider call, as recorded in a [`PhaseResult`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeEntry {
    pub provider: ProviderId,
    pub outcome: ProviderOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Attempts made, including the final one.
    pub attempts: u32,
}

impl OutcomeEntry {
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// Immutable fan-in of every call of one phase.
///
/// `succeeded_count` and `quorum_met` are derived at assembly time and cannot
/// drift from `outcomes`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseResult {
    phase: PhaseKind,
    input_digest: InputDigest,
    outcomes: Vec<OutcomeEntry>,
    succeeded_count: usize,
    quorum_min: usize,
    quorum_met: bool,
}

impl PhaseResult {
    /// Assemble a result from settled calls, given in fan-out order.
    pub fn assemble(
        phase: PhaseKind,
        input_digest: InputDigest,
        outcomes: Vec<OutcomeEntry>,
        quorum_min: usize,
    ) -> Self {
        let succeeded_count = outcomes.iter().filter(|e| e.outcome.is_success()).count();
        Self {
            phase,
            input_digest,
            outcomes,
            succeeded_count,
            quorum_min,
            quorum_met: succeeded_count >= quorum_min,
        }
    }

    pub fn phase(&self) -> PhaseKind {
        self.phase
    }

    pub fn input_digest(&self) -> &InputDigest {
        &self.input_digest
    }

    /// Every settled call, in fan-out order.
    pub fn outcomes(&self) -> &[OutcomeEntry] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn get(&self, provider: &ProviderId) -> Option<&ProviderOutcome> {
        self.outcomes
            .iter()
            .find(|e| &e.provider == provider)
            .map(|e| &e.outcome)
    }

    pub fn succeeded_count(&self) -> usize {
        self.succeeded_count
    }

    pub fn quorum_min(&self) -> usize {
        self.quorum_min
    }

    pub fn quorum_met(&self) -> bool {
        self.quorum_met
    }

    /// Successful contracts in fan-out order.
    pub fn successes(&self) -> impl Iterator<Item = (&ProviderId, &PhaseOutput)> {
        self.outcomes
            .iter()
            .filter_map(|e| e.outcome.contract().map(|c| (&e.provider, c)))
    }

    /// Failed calls in fan-out order.
    pub fn failures(&self) -> impl Iterator<Item = (&ProviderId, FailureKind, &str)> {
        self.outcomes.iter().filter_map(|e| match &e.outcome {
            ProviderOutcome::Failure { kind, message } => Some((&e.provider, *kind, message.as_str())),
            ProviderOutcome::Success { .. } => None,
        })
    }
}
