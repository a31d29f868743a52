//! Typed phase contracts.
//!
//! Every provider call receives a [`PhaseInput`] and must answer with the
//! matching [`PhaseOutput`] variant. Raw model output is parsed and
//! structurally validated by [`PhaseOutput::parse`] before anything downstream
//! may see it.

use std::collections::{BTreeMap, BTreeSet};

use cite_client::CitationResult;
use serde::{Deserialize, Serialize};

use crate::domain::error::SchemaError;
use crate::domain::provider::{PhaseKind, ProviderId};

/// Kind of document being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    #[default]
    Article,
    CasebookSection,
}

/// Reference material supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub path: String,
    pub title: String,
    pub content: String,
}

/// Draft phase input: the writing brief plus retrieval context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftInput {
    pub topic: String,
    pub outline: String,
    #[serde(default)]
    pub document_type: DocumentType,
    pub audience: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_length: Option<u32>,
    #[serde(default)]
    pub sources: Vec<SourceDocument>,
    /// Hits from the citation service, highest score first.
    #[serde(default)]
    pub citations: Vec<CitationResult>,
}

/// A contract tagged with the provider that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attributed<T> {
    pub provider: ProviderId,
    pub contract: T,
}

/// Edit phase input: every surviving draft, shown to every editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditInput {
    pub context: DraftInput,
    pub drafts: Vec<Attributed<DraftContract>>,
}

/// Judge phase input: every surviving integrated draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeInput {
    pub context: DraftInput,
    pub edits: Vec<Attributed<EditContract>>,
}

/// The payload fanned out, unchanged, to every provider of a phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PhaseInput {
    Draft(DraftInput),
    Edit(EditInput),
    Judge(JudgeInput),
}

impl PhaseInput {
    pub fn phase(&self) -> PhaseKind {
        match self {
            PhaseInput::Draft(_) => PhaseKind::Draft,
            PhaseInput::Edit(_) => PhaseKind::Edit,
            PhaseInput::Judge(_) => PhaseKind::Judge,
        }
    }

    /// The original brief, available in every phase.
    pub fn context(&self) -> &DraftInput {
        match self {
            PhaseInput::Draft(input) => input,
            PhaseInput::Edit(input) => &input.context,
            PhaseInput::Judge(input) => &input.context,
        }
    }

    /// Number of upstream candidates carried by this input (0 for Draft).
    pub fn candidate_count(&self) -> usize {
        match self {
            PhaseInput::Draft(_) => 0,
            PhaseInput::Edit(input) => input.drafts.len(),
            PhaseInput::Judge(input) => input.edits.len(),
        }
    }
}

// ---------------------------------------------------------------------------
// Draft contract
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationUse {
    pub id: String,
    pub full_citation: String,
    /// Where the citation came from (`cite-assist`, `web`, `provided`).
    #[serde(default)]
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub word_count: u32,
    #[serde(default)]
    pub citations_used: Vec<CitationUse>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResearchNotes {
    #[serde(default)]
    pub sources_consulted: Vec<String>,
    #[serde(default)]
    pub key_authorities: Vec<String>,
    #[serde(default)]
    pub gaps_identified: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftContract {
    pub draft: Draft,
    #[serde(default)]
    pub research_notes: ResearchNotes,
}

// ---------------------------------------------------------------------------
// Edit contract
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegratedDraft {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub word_count: u32,
}

/// How the editor combined the candidate drafts.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IntegrationNotes {
    /// Elements taken from each provider's draft, keyed by provider id.
    #[serde(default)]
    pub elements_by_source: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub original_additions: Vec<String>,
    #[serde(default)]
    pub elements_rejected: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub argument_strength: String,
    pub citation_accuracy: String,
    pub prose_quality: String,
    pub structural_coherence: String,
    #[serde(default)]
    pub remaining_weaknesses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditContract {
    pub integrated_draft: IntegratedDraft,
    pub integration_notes: IntegrationNotes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_assessment: Option<QualityAssessment>,
}

// ---------------------------------------------------------------------------
// Judge contract
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    /// Provider whose integrated draft is being ranked.
    pub draft_source: ProviderId,
    pub overall_score: f64,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Recommendations {
    #[serde(default)]
    pub for_human_review: Vec<String>,
    #[serde(default)]
    pub potential_improvements: Vec<String>,
    #[serde(default)]
    pub citation_concerns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeContract {
    /// Best first.
    pub rankings: Vec<RankingEntry>,
    #[serde(default)]
    pub recommendations: Recommendations,
}

impl JudgeContract {
    /// Ranked draft sources, best first.
    pub fn order(&self) -> Vec<ProviderId> {
        self.rankings.iter().map(|r| r.draft_source.clone()).collect()
    }
}

// ---------------------------------------------------------------------------
// Output envelope and validation
// ---------------------------------------------------------------------------

/// A validated provider answer for one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PhaseOutput {
    Draft(DraftContract),
    Edit(EditContract),
    Judge(JudgeContract),
}

fn require_text(field: &str, value: &str) -> Result<(), SchemaError> {
    if value.trim().is_empty() {
        return Err(SchemaError::new(format!("{field} must not be empty")));
    }
    Ok(())
}

impl PhaseOutput {
    pub fn phase(&self) -> PhaseKind {
        match self {
            PhaseOutput::Draft(_) => PhaseKind::Draft,
            PhaseOutput::Edit(_) => PhaseKind::Edit,
            PhaseOutput::Judge(_) => PhaseKind::Judge,
        }
    }

    /// Parse a raw JSON answer as `phase`'s contract and check its shape.
    pub fn parse(phase: PhaseKind, raw: serde_json::Value) -> Result<Self, SchemaError> {
        let output = match phase {
            PhaseKind::Draft => PhaseOutput::Draft(
                serde_json::from_value(raw).map_err(|e| SchemaError::new(e.to_string()))?,
            ),
            PhaseKind::Edit => PhaseOutput::Edit(
                serde_json::from_value(raw).map_err(|e| SchemaError::new(e.to_string()))?,
            ),
            PhaseKind::Judge => PhaseOutput::Judge(
                serde_json::from_value(raw).map_err(|e| SchemaError::new(e.to_string()))?,
            ),
        };
        output.validate()?;
        Ok(output)
    }

    /// Structural checks serde cannot express.
    pub fn validate(&self) -> Result<(), SchemaError> {
        match self {
            PhaseOutput::Draft(c) => {
                require_text("draft.title", &c.draft.title)?;
                require_text("draft.content", &c.draft.content)?;
            }
            PhaseOutput::Edit(c) => {
                require_text("integrated_draft.title", &c.integrated_draft.title)?;
                require_text("integrated_draft.content", &c.integrated_draft.content)?;
            }
            PhaseOutput::Judge(c) => {
                if c.rankings.is_empty() {
                    return Err(SchemaError::new("rankings must not be empty"));
                }
                let mut seen = BTreeSet::new();
                for entry in &c.rankings {
                    if !entry.overall_score.is_finite() {
                        return Err(SchemaError::new(format!(
                            "ranking for {} has non-finite score",
                            entry.draft_source
                        )));
                    }
                    if !seen.insert(entry.draft_source.clone()) {
                        return Err(SchemaError::new(format!(
                            "draft {} ranked more than once",
                            entry.draft_source
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn as_draft(&self) -> Option<&DraftContract> {
        match self {
            PhaseOutput::Draft(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_edit(&self) -> Option<&EditContract> {
        match self {
            PhaseOutput::Edit(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_judge(&self) -> Option<&JudgeContract> {
        match self {
            PhaseOutput::Judge(c) => Some(c),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn brief() -> DraftInput {
        DraftInput {
            topic: "The doctrine of consideration".to_string(),
            outline: "1. Introduction\n2. History".to_string(),
            document_type: DocumentType::Article,
            audience: "Legal academics".to_string(),
            target_length: Some(1500),
            sources: vec![],
            citations: vec![],
        }
    }

    #[test]
    fn test_draft_contract_parses_minimal_shape() {
        let out = PhaseOutput::parse(
            PhaseKind::Draft,
            json!({ "draft": { "title": "Consideration", "content": "Body text" } }),
        )
        .unwrap();
        let draft = out.as_draft().unwrap();
        assert_eq!(draft.draft.title, "Consideration");
        assert_eq!(draft.draft.word_count, 0);
        assert!(draft.research_notes.sources_consulted.is_empty());
        assert_eq!(out.phase(), PhaseKind::Draft);
    }

    #[test]
    fn test_draft_with_blank_title_is_rejected() {
        let err = PhaseOutput::parse(
            PhaseKind::Draft,
            json!({ "draft": { "title": "  ", "content": "Body" } }),
        )
        .unwrap_err();
        assert!(err.to_string().contains("draft.title"));
    }

    #[test]
    fn test_edit_requires_integration_notes() {
        let missing = PhaseOutput::parse(
            PhaseKind::Edit,
            json!({ "integrated_draft": { "title": "T", "content": "C" } }),
        );
        assert!(missing.is_err());

        let ok = PhaseOutput::parse(
            PhaseKind::Edit,
            json!({
                "integrated_draft": { "title": "T", "content": "C", "word_count": 2 },
                "integration_notes": { "elements_by_source": { "claude": ["thesis"] } }
            }),
        )
        .unwrap();
        let edit = ok.as_edit().unwrap();
        assert_eq!(edit.integration_notes.elements_by_source["claude"], vec!["thesis"]);
    }

    #[test]
    fn test_judge_rankings_are_checked() {
        let empty = PhaseOutput::parse(PhaseKind::Judge, json!({ "rankings": [] }));
        assert!(empty.is_err());

        let duplicate = PhaseOutput::parse(
            PhaseKind::Judge,
            json!({ "rankings": [
                { "draft_source": "claude", "overall_score": 9.0 },
                { "draft_source": "claude", "overall_score": 8.0 }
            ]}),
        );
        assert!(duplicate.unwrap_err().to_string().contains("more than once"));

        let ok = PhaseOutput::parse(
            PhaseKind::Judge,
            json!({ "rankings": [
                { "draft_source": "gemini", "overall_score": 9.0, "summary": "tight" },
                { "draft_source": "claude", "overall_score": 8.5 }
            ]}),
        )
        .unwrap();
        assert_eq!(
            ok.as_judge().unwrap().order(),
            vec![ProviderId::from("gemini"), ProviderId::from("claude")]
        );
    }

    #[test]
    fn test_wrong_phase_shape_is_schema_error() {
        let judge_shaped = json!({ "rankings": [{ "draft_source": "a", "overall_score": 1.0 }] });
        assert!(PhaseOutput::parse(PhaseKind::Draft, judge_shaped).is_err());
    }

    #[test]
    fn test_phase_input_exposes_context_and_candidates() {
        let draft = PhaseInput::Draft(brief());
        assert_eq!(draft.phase(), PhaseKind::Draft);
        assert_eq!(draft.candidate_count(), 0);

        let edit = PhaseInput::Edit(EditInput {
            context: brief(),
            drafts: vec![Attributed {
                provider: ProviderId::from("claude"),
                contract: DraftContract {
                    draft: Draft {
                        title: "T".to_string(),
                        content: "C".to_string(),
                        word_count: 1,
                        citations_used: vec![],
                    },
                    research_notes: ResearchNotes::default(),
                },
            }],
        });
        assert_eq!(edit.phase(), PhaseKind::Edit);
        assert_eq!(edit.candidate_count(), 1);
        assert_eq!(edit.context().topic, "The doctrine of consideration");

        let json = serde_json::to_value(&edit).unwrap();
        assert_eq!(json["phase"], "edit");
    }
}
