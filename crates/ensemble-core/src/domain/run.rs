//! Run request and the bundle handed to human review.

use chrono::{DateTime, Utc};
use cite_client::CitationResult;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::contracts::{DocumentType, DraftInput, EditContract, SourceDocument};
use crate::domain::outcome::PhaseResult;
use crate::domain::provider::{PhaseKind, ProviderId};

/// What the caller wants written.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub topic: String,
    pub outline: String,
    pub document_type: DocumentType,
    pub audience: String,
    pub target_length: Option<u32>,
    pub sources: Vec<SourceDocument>,
}

impl RunRequest {
    pub fn new(topic: impl Into<String>, outline: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            outline: outline.into(),
            document_type: DocumentType::Article,
            audience: "Legal academics and practitioners".to_string(),
            target_length: None,
            sources: Vec::new(),
        }
    }

    pub fn with_document_type(mut self, document_type: DocumentType) -> Self {
        self.document_type = document_type;
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }

    pub fn with_target_length(mut self, words: u32) -> Self {
        self.target_length = Some(words);
        self
    }

    pub fn with_source(mut self, source: SourceDocument) -> Self {
        self.sources.push(source);
        self
    }

    /// Draft-phase brief carrying the retrieved citations.
    pub fn brief(&self, citations: Vec<CitationResult>) -> DraftInput {
        DraftInput {
            topic: self.topic.clone(),
            outline: self.outline.clone(),
            document_type: self.document_type,
            audience: self.audience.clone(),
            target_length: self.target_length,
            sources: self.sources.clone(),
            citations,
        }
    }
}

/// One judge's ordering of the integrated drafts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JudgeRanking {
    pub judge: ProviderId,
    /// Draft sources, best first.
    pub order: Vec<ProviderId>,
}

/// Everything one pipeline execution produced.
///
/// A complete run holds exactly three phase results in Draft, Edit, Judge
/// order. A run aborted on quorum stops at the failing phase; later phases
/// are absent rather than empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub citation_results: Vec<CitationResult>,
    phase_results: Vec<PhaseResult>,
}

impl PipelineRun {
    pub(crate) fn start(run_id: Uuid, citation_results: Vec<CitationResult>) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            finished_at: None,
            citation_results,
            phase_results: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, result: PhaseResult) {
        debug_assert_eq!(result.phase().index(), self.phase_results.len());
        self.phase_results.push(result);
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn phase_results(&self) -> &[PhaseResult] {
        &self.phase_results
    }

    pub fn phase(&self, kind: PhaseKind) -> Option<&PhaseResult> {
        self.phase_results.iter().find(|r| r.phase() == kind)
    }

    /// All three phases ran and each met its quorum.
    pub fn is_complete(&self) -> bool {
        self.phase_results.len() == PhaseKind::ALL.len()
            && self.phase_results.iter().all(PhaseResult::quorum_met)
    }

    /// The integrated drafts the judges evaluated, by editor.
    pub fn candidate_edits(&self) -> Vec<(&ProviderId, &EditContract)> {
        self.phase(PhaseKind::Edit)
            .map(|r| {
                r.successes()
                    .filter_map(|(p, out)| out.as_edit().map(|c| (p, c)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Each judge's ordering, for the human reviewer. No winner is chosen.
    pub fn ranking_summary(&self) -> Vec<JudgeRanking> {
        self.phase(PhaseKind::Judge)
            .map(|r| {
                r.successes()
                    .filter_map(|(judge, out)| {
                        out.as_judge().map(|c| JudgeRanking {
                            judge: judge.clone(),
                            order: c.order(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}
