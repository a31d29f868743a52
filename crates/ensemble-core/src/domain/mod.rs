//! Domain models for the ensemble pipeline.
//!
//! - `ProviderId`, `PhaseKind`: who runs, and when
//! - `PhaseInput`, `PhaseOutput`: typed per-phase contracts
//! - `ProviderOutcome`, `PhaseResult`: fan-in of one phase
//! - `RunRequest`, `PipelineRun`: one end-to-end execution

pub mod contracts;
pub mod digest;
pub mod error;
pub mod outcome;
pub mod provider;
pub mod run;

pub use contracts::{
    Attributed, CitationUse, DocumentType, Draft, DraftContract, DraftInput, EditContract,
    EditInput, IntegratedDraft, IntegrationNotes, JudgeContract, JudgeInput, PhaseInput,
    PhaseOutput, QualityAssessment, RankingEntry, Recommendations, ResearchNotes,
    SourceDocument,
};
pub use digest::InputDigest;
pub use error::{PhaseError, PipelineError, SchemaError};
pub use outcome::{FailureKind, OutcomeEntry, PhaseResult, ProviderOutcome};
pub use provider::{PhaseKind, ProviderId};
pub use run::{JudgeRanking, PipelineRun, RunRequest};
