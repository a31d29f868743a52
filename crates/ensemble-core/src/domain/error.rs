//! Error taxonomy for phase execution and pipeline runs.
//!
//! Per-provider failures are never errors here: they are recorded as
//! [`ProviderOutcome::Failure`](crate::domain::ProviderOutcome) values. Only
//! setup mistakes and whole-phase quorum failures propagate.

use crate::domain::outcome::PhaseResult;
use crate::domain::provider::{PhaseKind, ProviderId};
use crate::domain::run::PipelineRun;

/// A provider answer that does not match its phase contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("schema violation: {message}")]
pub struct SchemaError {
    pub message: String,
}

impl SchemaError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors produced by the phase executor.
#[derive(Debug, thiserror::Error)]
pub enum PhaseError {
    #[error("{phase} phase has no providers configured")]
    NoProviders { phase: PhaseKind },

    #[error("{phase} phase quorum {quorum_min} is invalid for {providers} provider(s)")]
    InvalidQuorum {
        phase: PhaseKind,
        quorum_min: usize,
        providers: usize,
    },

    #[error("provider {provider} listed more than once for {phase} phase")]
    DuplicateProvider {
        phase: PhaseKind,
        provider: ProviderId,
    },

    #[error("provider {provider} is not registered (needed by {phase} phase)")]
    UnknownProvider {
        phase: PhaseKind,
        provider: ProviderId,
    },

    #[error("{actual} input handed to {expected} phase")]
    InputMismatch {
        expected: PhaseKind,
        actual: PhaseKind,
    },

    #[error(
        "{} phase quorum not met: {} of {} required providers succeeded",
        .result.phase(),
        .result.succeeded_count(),
        .result.quorum_min()
    )]
    QuorumNotMet { result: Box<PhaseResult> },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors that end a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A phase fell short of its quorum. The partial run holds every phase
    /// result produced so far, including the failing one.
    #[error("run {} aborted at {phase} phase: {succeeded} of {required} required providers succeeded", .run.run_id)]
    QuorumNotMet {
        phase: PhaseKind,
        succeeded: usize,
        required: usize,
        run: Box<PipelineRun>,
    },

    #[error("phase setup error: {0}")]
    Phase(#[from] PhaseError),
}

impl PipelineError {
    /// The partial run, when the failure happened after the run started.
    pub fn partial_run(&self) -> Option<&PipelineRun> {
        match self {
            PipelineError::QuorumNotMet { run, .. } => Some(run),
            PipelineError::Phase(_) => None,
        }
    }

    /// Consume the error, keeping the partial run for diagnostics.
    pub fn into_partial_run(self) -> Option<PipelineRun> {
        match self {
            PipelineError::QuorumNotMet { run, .. } => Some(*run),
            PipelineError::Phase(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_display() {
        let err = SchemaError::new("rankings must not be empty");
        assert_eq!(err.to_string(), "schema violation: rankings must not be empty");
    }

    #[test]
    fn test_phase_error_display() {
        let err = PhaseError::DuplicateProvider {
            phase: PhaseKind::Edit,
            provider: ProviderId::from("gemini"),
        };
        let msg = err.to_string();
        assert!(msg.contains("gemini"));
        assert!(msg.contains("edit"));

        let err = PhaseError::InvalidQuorum {
            phase: PhaseKind::Draft,
            quorum_min: 0,
            providers: 3,
        };
        assert!(err.to_string().contains("quorum 0"));
    }

    #[test]
    fn test_setup_error_has_no_partial_run() {
        let err = PipelineError::from(PhaseError::NoProviders {
            phase: PhaseKind::Judge,
        });
        assert!(err.partial_run().is_none());
        assert!(err.into_partial_run().is_none());
    }
}
