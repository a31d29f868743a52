//! Ensemble Core Library
//!
//! Runs a fixed Draft -> Edit -> Judge pipeline across an ensemble of
//! independent providers. Each phase fans the same input out to every
//! configured provider, waits for all calls to settle, and hands every
//! success to the next phase. A phase that falls short of its quorum ends the
//! run.

pub mod adapter;
pub mod config;
pub mod domain;
pub mod executor;
pub mod fakes;
pub mod obs;
pub mod orchestrator;
pub mod progress;
pub mod telemetry;

pub use adapter::{ProviderAdapter, ProviderRegistry};

pub use config::{
    BackendKind, ConfigError, EnsembleConfig, PhaseSpec, PipelineSettings, ProviderSpec,
    RetrievalSettings,
};

pub use domain::{
    Attributed, DocumentType, DraftContract, DraftInput, EditContract, EditInput, FailureKind,
    InputDigest, JudgeContract, JudgeInput, JudgeRanking, OutcomeEntry, PhaseError, PhaseInput,
    PhaseKind, PhaseOutput, PhaseResult, PipelineError, PipelineRun, ProviderId, ProviderOutcome,
    RunRequest, SchemaError, SourceDocument,
};

pub use executor::{PhaseExecutor, RetryPolicy, DEFAULT_CALL_TIMEOUT};

pub use orchestrator::{Orchestrator, PhasePlan, PipelinePlan};

pub use progress::{PipelineProgress, ProgressSink, Stage, StageStatus};

pub use telemetry::init_tracing;
