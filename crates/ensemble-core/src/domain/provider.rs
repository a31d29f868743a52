//! Provider identity and phase vocabulary.

use serde::{Deserialize, Serialize};

/// Opaque identifier for one generative backend.
///
/// Fixed at configuration time; used as the key of every phase result.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ProviderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The three pipeline phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Draft,
    Edit,
    Judge,
}

impl PhaseKind {
    /// All phases in the only order they may run.
    pub const ALL: [PhaseKind; 3] = [PhaseKind::Draft, PhaseKind::Edit, PhaseKind::Judge];

    /// The phase that consumes this phase's result, if any.
    pub fn next(self) -> Option<PhaseKind> {
        match self {
            PhaseKind::Draft => Some(PhaseKind::Edit),
            PhaseKind::Edit => Some(PhaseKind::Judge),
            PhaseKind::Judge => None,
        }
    }

    /// Zero-based position in the pipeline.
    pub fn index(self) -> usize {
        match self {
            PhaseKind::Draft => 0,
            PhaseKind::Edit => 1,
            PhaseKind::Judge => 2,
        }
    }

    /// Progressive form used in progress reporting ("drafting", ...).
    pub fn stage_name(self) -> &'static str {
        match self {
            PhaseKind::Draft => "drafting",
            PhaseKind::Edit => "editing",
            PhaseKind::Judge => "judging",
        }
    }
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PhaseKind::Draft => "draft",
            PhaseKind::Edit => "edit",
            PhaseKind::Judge => "judge",
        };
        write!(f, "{s}")
    }
}
