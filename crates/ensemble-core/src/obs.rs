//! Structured observability hooks for ensemble run lifecycle events.
//!
//! This module provides:
//! - A run-scoped tracing span via `run_span`
//! - Emission functions for key lifecycle events: run start/finish/abort,
//!   phase fan-out and fan-in, per-provider settlement, retrieval
//!
//! Events are emitted at `info!` level (failures at `warn!`). Filter with
//! `RUST_LOG`; pass `--log-json` to the CLI for JSON lines.

use tracing::{info, warn};

use crate::domain::{FailureKind, PhaseKind, ProviderId};

/// Run-scoped span; attach with `tracing::Instrument::instrument` so every
/// event of the run carries `run_id`.
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("ensemble.run", run_id = %run_id)
}

/// Emit event: run started.
pub fn emit_run_started(run_id: &str, topic: &str) {
    info!(event = "run.started", run_id = %run_id, topic = %topic);
}

/// Emit event: run finished with every phase meeting quorum.
pub fn emit_run_finished(run_id: &str, duration_ms: u64, phases: usize) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        phases = phases,
    );
}

/// Emit event: run aborted because a phase fell short of quorum.
pub fn emit_run_aborted(run_id: &str, phase: PhaseKind, succeeded: usize, required: usize) {
    warn!(
        event = "run.aborted",
        run_id = %run_id,
        phase = %phase,
        succeeded = succeeded,
        required = required,
    );
}

/// Emit event: retrieval finished (an empty list covers the fallback case).
pub fn emit_retrieval_completed(results: usize, duration_ms: u64) {
    info!(event = "retrieval.completed", results = results, duration_ms = duration_ms);
}

/// Emit event: phase fan-out started.
pub fn emit_phase_started(phase: PhaseKind, providers: usize, input_digest: &str) {
    info!(
        event = "phase.started",
        phase = %phase,
        providers = providers,
        input_digest = %input_digest,
    );
}

/// Emit event: phase fan-in assembled.
pub fn emit_phase_settled(phase: PhaseKind, succeeded: usize, total: usize, quorum_met: bool) {
    info!(
        event = "phase.settled",
        phase = %phase,
        succeeded = succeeded,
        total = total,
        quorum_met = quorum_met,
    );
}

/// Emit event: one provider call settled. `failure` is `None` on success.
pub fn emit_provider_settled(
    phase: PhaseKind,
    provider: &ProviderId,
    failure: Option<FailureKind>,
    attempts: u32,
    duration_ms: i64,
) {
    match failure {
        None => info!(
            event = "provider.settled",
            phase = %phase,
            provider = %provider,
            success = true,
            attempts = attempts,
            duration_ms = duration_ms,
        ),
        Some(kind) => warn!(
            event = "provider.settled",
            phase = %phase,
            provider = %provider,
            success = false,
            failure = %kind,
            attempts = attempts,
            duration_ms = duration_ms,
        ),
    }
}
