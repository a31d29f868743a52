//! Phase executor: concurrent fan-out, per-call timeout, full-barrier fan-in.
//!
//! Every provider of a phase receives the same `Arc<PhaseInput>`, so input
//! symmetry holds by construction; its digest is computed once and stamped on
//! the result. Each spawned task owns one call and returns exactly one
//! [`OutcomeEntry`]. Handles are joined in fan-out order, so the assembled
//! result does not depend on completion order.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::adapter::ProviderAdapter;
use crate::domain::{
    FailureKind, InputDigest, OutcomeEntry, PhaseError, PhaseInput, PhaseKind, PhaseResult,
    ProviderId, ProviderOutcome,
};
use crate::obs;

/// Default bound on a single provider call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(300);

/// Retry of failed calls within one fan-out slot.
///
/// Each attempt gets the full per-call timeout. `max_attempts = 1` disables
/// retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self::default()
    }

    /// Exponential backoff between attempts.
    pub fn exponential(max_attempts: u32, initial: Duration, max: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: initial.as_millis() as u64,
            max_backoff_ms: max.as_millis() as u64,
        }
    }

    /// Delay before attempt `attempt + 1`, given `attempt >= 1` attempts made.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(20);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Runs one phase across a set of providers.
#[derive(Debug, Clone)]
pub struct PhaseExecutor {
    call_timeout: Duration,
    retry: RetryPolicy,
}

impl Default for PhaseExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_CALL_TIMEOUT)
    }
}

impl PhaseExecutor {
    pub fn new(call_timeout: Duration) -> Self {
        Self {
            call_timeout,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Fan out `input` to every provider and wait for all calls to settle.
    ///
    /// Returns the assembled result, or [`PhaseError::QuorumNotMet`] carrying
    /// it when fewer than `quorum_min` calls succeeded.
    ///
    /// A `quorum_min` of zero or above the provider count is a setup error
    /// ([`PhaseError::InvalidQuorum`]) raised before any call, so no result
    /// is produced for it.
    pub async fn run(
        &self,
        phase: PhaseKind,
        providers: &[Arc<dyn ProviderAdapter>],
        input: PhaseInput,
        quorum_min: usize,
    ) -> Result<PhaseResult, PhaseError> {
        let result = self.settle(phase, providers, input, quorum_min).await?;
        if result.quorum_met() {
            Ok(result)
        } else {
            Err(PhaseError::QuorumNotMet {
                result: Box::new(result),
            })
        }
    }

    /// Like [`run`](Self::run) but returns the result whether or not quorum
    /// was met. Only setup mistakes are errors: wrong-phase input, an empty
    /// or duplicated provider set, and `quorum_min` outside `1..=providers`.
    #[instrument(skip_all, fields(phase = %phase, providers = providers.len(), quorum_min = quorum_min))]
    pub async fn settle(
        &self,
        phase: PhaseKind,
        providers: &[Arc<dyn ProviderAdapter>],
        input: PhaseInput,
        quorum_min: usize,
    ) -> Result<PhaseResult, PhaseError> {
        check_setup(phase, providers, &input, quorum_min)?;

        let digest = InputDigest::of(&input)?;
        obs::emit_phase_started(phase, providers.len(), digest.short());

        let input = Arc::new(input);
        let ids: Vec<ProviderId> = providers.iter().map(|p| p.id().clone()).collect();
        let handles: Vec<_> = providers
            .iter()
            .map(|adapter| {
                let adapter = Arc::clone(adapter);
                let input = Arc::clone(&input);
                let call_timeout = self.call_timeout;
                let retry = self.retry.clone();
                tokio::spawn(async move { call(adapter, phase, input, call_timeout, retry).await })
            })
            .collect();

        let settled = join_all(handles).await;

        let outcomes: Vec<OutcomeEntry> = ids
            .into_iter()
            .zip(settled)
            .map(|(provider, joined)| match joined {
                Ok(entry) => entry,
                Err(e) => {
                    let now = Utc::now();
                    OutcomeEntry {
                        provider,
                        outcome: ProviderOutcome::failure(
                            FailureKind::InvocationError,
                            format!("provider task aborted: {e}"),
                        ),
                        started_at: now,
                        finished_at: now,
                        attempts: 1,
                    }
                }
            })
            .collect();

        for entry in &outcomes {
            obs::emit_provider_settled(
                phase,
                &entry.provider,
                entry.outcome.failure_kind(),
                entry.attempts,
                entry.duration_ms(),
            );
        }

        let result = PhaseResult::assemble(phase, digest, outcomes, quorum_min);
        obs::emit_phase_settled(phase, result.succeeded_count(), result.len(), result.quorum_met());
        Ok(result)
    }
}

fn check_setup(
    phase: PhaseKind,
    providers: &[Arc<dyn ProviderAdapter>],
    input: &PhaseInput,
    quorum_min: usize,
) -> Result<(), PhaseError> {
    if input.phase() != phase {
        return Err(PhaseError::InputMismatch {
            expected: phase,
            actual: input.phase(),
        });
    }
    let ids: Vec<&ProviderId> = providers.iter().map(|p| p.id()).collect();
    check_plan(phase, &ids, quorum_min)
}

/// Provider set must be non-empty and distinct; `1 <= quorum_min <= len`.
pub(crate) fn check_plan(
    phase: PhaseKind,
    providers: &[&ProviderId],
    quorum_min: usize,
) -> Result<(), PhaseError> {
    if providers.is_empty() {
        return Err(PhaseError::NoProviders { phase });
    }
    if quorum_min == 0 || quorum_min > providers.len() {
        return Err(PhaseError::InvalidQuorum {
            phase,
            quorum_min,
            providers: providers.len(),
        });
    }
    let mut seen = BTreeSet::new();
    for id in providers {
        if !seen.insert(*id) {
            return Err(PhaseError::DuplicateProvider {
                phase,
                provider: (*id).clone(),
            });
        }
    }
    Ok(())
}

/// One fan-out slot: invoke with timeout, retrying per policy.
async fn call(
    adapter: Arc<dyn ProviderAdapter>,
    phase: PhaseKind,
    input: Arc<PhaseInput>,
    call_timeout: Duration,
    retry: RetryPolicy,
) -> OutcomeEntry {
    let provider = adapter.id().clone();
    let started_at = Utc::now();
    let max_attempts = retry.attempts();
    let mut attempts = 0;

    let outcome = loop {
        attempts += 1;
        let outcome = match tokio::time::timeout(
            call_timeout,
            adapter.invoke(phase, &input, call_timeout),
        )
        .await
        {
            Ok(outcome) => conform(phase, outcome),
            Err(_) => ProviderOutcome::timeout(call_timeout),
        };

        if !outcome.is_retryable() || attempts >= max_attempts {
            break outcome;
        }
        let delay = retry.backoff(attempts);
        debug!(
            provider = %provider,
            phase = %phase,
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            failure = ?outcome.failure_kind(),
            "retrying provider call"
        );
        tokio::time::sleep(delay).await;
    };

    OutcomeEntry {
        provider,
        outcome,
        started_at,
        finished_at: Utc::now(),
        attempts,
    }
}

/// A success must carry this phase's contract; anything else is a schema
/// failure and never reaches the next phase.
fn conform(phase: PhaseKind, outcome: ProviderOutcome) -> ProviderOutcome {
    match &outcome {
        ProviderOutcome::Success { contract } if contract.phase() != phase => {
            ProviderOutcome::failure(
                FailureKind::SchemaInvalid,
                format!("{} contract returned for {phase} phase", contract.phase()),
            )
        }
        ProviderOutcome::Success { contract } => match contract.validate() {
            Ok(()) => outcome,
            Err(e) => ProviderOutcome::failure(FailureKind::SchemaInvalid, e.to_string()),
        },
        ProviderOutcome::Failure { .. } => outcome,
    }
}
