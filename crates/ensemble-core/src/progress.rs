//! Progress notifications for callers driving a run interactively.

use serde::Serialize;

use crate::domain::{PhaseKind, ProviderId};

/// Pipeline stage a notification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Research,
    Drafting,
    Editing,
    Judging,
}

impl From<PhaseKind> for Stage {
    fn from(kind: PhaseKind) -> Self {
        match kind {
            PhaseKind::Draft => Stage::Drafting,
            PhaseKind::Edit => Stage::Editing,
            PhaseKind::Judge => Stage::Judging,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Research => "research",
            Stage::Drafting => "drafting",
            Stage::Editing => "editing",
            Stage::Judging => "judging",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Starting,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineProgress {
    pub stage: Stage,
    pub status: StageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderId>,
    pub message: String,
}

impl PipelineProgress {
    pub fn new(stage: Stage, status: StageStatus, message: impl Into<String>) -> Self {
        Self {
            stage,
            status,
            provider: None,
            message: message.into(),
        }
    }

    pub fn for_provider(mut self, provider: ProviderId) -> Self {
        self.provider = Some(provider);
        self
    }
}

/// Receives progress notifications. Must not block.
pub trait ProgressSink: Send + Sync {
    fn notify(&self, progress: PipelineProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(PipelineProgress) + Send + Sync,
{
    fn notify(&self, progress: PipelineProgress) {
        self(progress)
    }
}
