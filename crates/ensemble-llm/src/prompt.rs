//! Message framing for contract calls.
//!
//! The system message names the phase and the required JSON shape; the user
//! message is the serialized phase input. Writing guidance is left to the
//! deployment.

use ensemble_core::{PhaseInput, PhaseKind};

use crate::chat::Message;

const DRAFT_SHAPE: &str = r#"{"draft": {"title": string, "content": string, "word_count": integer, "citations_used": [{"id": string, "full_citation": string, "source": "cite-assist" | "web" | "provided"}]}, "research_notes": {"sources_consulted": [string], "key_authorities": [string], "gaps_identified": [string]}}"#;

const EDIT_SHAPE: &str = r#"{"integrated_draft": {"title": string, "content": string, "word_count": integer}, "integration_notes": {"elements_by_source": {"<provider>": [string]}, "original_additions": [string], "elements_rejected": [string]}, "quality_assessment": {"argument_strength": string, "citation_accuracy": string, "prose_quality": string, "structural_coherence": string, "remaining_weaknesses": [string]}}"#;

const JUDGE_SHAPE: &str = r#"{"rankings": [{"draft_source": "<provider>", "overall_score": number, "summary": string}], "recommendations": {"for_human_review": [string], "potential_improvements": [string], "citation_concerns": [string]}}"#;

fn task(phase: PhaseKind) -> &'static str {
    match phase {
        PhaseKind::Draft => {
            "Write a complete draft from the brief. Ground claims in the supplied citations and sources."
        }
        PhaseKind::Edit => {
            "Integrate the candidate drafts into one improved draft. Record which elements came from which provider."
        }
        PhaseKind::Judge => {
            "Rank every integrated draft, best first. Rank each provider exactly once."
        }
    }
}

fn shape(phase: PhaseKind) -> &'static str {
    match phase {
        PhaseKind::Draft => DRAFT_SHAPE,
        PhaseKind::Edit => EDIT_SHAPE,
        PhaseKind::Judge => JUDGE_SHAPE,
    }
}

/// System and user messages for one contract call.
pub fn messages(phase: PhaseKind, input: &PhaseInput) -> Result<Vec<Message>, serde_json::Error> {
    let system = format!(
        "You are taking part in the {} phase of a multi-author writing pipeline.\n{}\n\nRespond ONLY with a JSON object of this shape:\n{}",
        phase.stage_name(),
        task(phase),
        shape(phase)
    );
    let user = serde_json::to_string_pretty(input)?;
    Ok(vec![Message::system(system), Message::user(user)])
}
