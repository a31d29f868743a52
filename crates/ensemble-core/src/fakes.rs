//! In-memory fakes for the provider and retrieval seams (testing only)
//!
//! Provides `ScriptedProvider`, `StaticCitations` and `FailingCitations`,
//! which satisfy the trait contracts without any network access.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use cite_client::{CitationQuery, CitationResult, CitationSearch, RetrievalError};

use crate::adapter::ProviderAdapter;
use crate::domain::{
    Attributed, Draft, DraftContract, EditContract, FailureKind, IntegratedDraft,
    IntegrationNotes, JudgeContract, PhaseInput, PhaseKind, PhaseOutput, ProviderId,
    ProviderOutcome, RankingEntry, Recommendations, ResearchNotes,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// ScriptedProvider
// ---------------------------------------------------------------------------

/// What a [`ScriptedProvider`] does on one call.
#[derive(Debug, Clone)]
pub enum Script {
    /// Answer with a canned, valid contract derived from the input.
    Succeed,
    /// Answer with exactly this contract.
    Respond(PhaseOutput),
    /// Return a failure outcome of this kind.
    Fail(FailureKind),
    /// Never answer.
    Hang,
    /// Panic inside the call.
    Panic,
}

/// Provider fake driven by per-phase scripts.
///
/// Scripts queued for a phase are consumed one per call; the last one stays
/// in effect. Phases without a script succeed.
#[derive(Debug)]
pub struct ScriptedProvider {
    id: ProviderId,
    scripts: Mutex<HashMap<PhaseKind, VecDeque<Script>>>,
    delays: HashMap<PhaseKind, Duration>,
    calls: Mutex<Vec<PhaseKind>>,
    inputs: Mutex<Vec<PhaseInput>>,
    invocations: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(id: impl Into<ProviderId>) -> Self {
        Self {
            id: id.into(),
            scripts: Mutex::new(HashMap::new()),
            delays: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            inputs: Mutex::new(Vec::new()),
            invocations: AtomicUsize::new(0),
        }
    }

    /// Queue `script` for the next unscripted call of `phase`.
    pub fn on(self, phase: PhaseKind, script: Script) -> Self {
        lock(&self.scripts).entry(phase).or_default().push_back(script);
        self
    }

    /// Apply `script` to every phase.
    pub fn always(mut self, script: Script) -> Self {
        for phase in PhaseKind::ALL {
            self = self.on(phase, script.clone());
        }
        self
    }

    /// Sleep before answering in every phase.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        for phase in PhaseKind::ALL {
            self.delays.insert(phase, delay);
        }
        self
    }

    pub fn with_phase_delay(mut self, phase: PhaseKind, delay: Duration) -> Self {
        self.delays.insert(phase, delay);
        self
    }

    /// Total invocations, counted on entry.
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    pub fn calls(&self, phase: PhaseKind) -> usize {
        lock(&self.calls).iter().filter(|p| **p == phase).count()
    }

    /// Every input received, in call order.
    pub fn inputs(&self) -> Vec<PhaseInput> {
        lock(&self.inputs).clone()
    }

    fn next_script(&self, phase: PhaseKind) -> Script {
        let mut scripts = lock(&self.scripts);
        match scripts.get_mut(&phase) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(Script::Succeed),
            Some(queue) => queue.front().cloned().unwrap_or(Script::Succeed),
            None => Script::Succeed,
        }
    }

    /// A valid contract for `input`, attributed to this provider.
    pub fn canned(&self, input: &PhaseInput) -> PhaseOutput {
        canned_output(&self.id, input)
    }
}

/// A valid contract for `input` as `provider` would write it.
pub fn canned_output(provider: &ProviderId, input: &PhaseInput) -> PhaseOutput {
    match input {
        PhaseInput::Draft(brief) => {
            let content = format!("{provider} on {}", brief.topic);
            PhaseOutput::Draft(DraftContract {
                draft: Draft {
                    title: format!("{} ({provider})", brief.topic),
                    word_count: content.split_whitespace().count() as u32,
                    content,
                    citations_used: vec![],
                },
                research_notes: ResearchNotes {
                    sources_consulted: brief.citations.iter().map(|c| c.id.clone()).collect(),
                    ..ResearchNotes::default()
                },
            })
        }
        PhaseInput::Edit(edit) => {
            let elements_by_source: BTreeMap<String, Vec<String>> = edit
                .drafts
                .iter()
                .map(|d| (d.provider.to_string(), vec![d.contract.draft.title.clone()]))
                .collect();
            let content = edit
                .drafts
                .iter()
                .map(|d| d.contract.draft.content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n");
            PhaseOutput::Edit(EditContract {
                integrated_draft: IntegratedDraft {
                    title: format!("{} (edited by {provider})", edit.context.topic),
                    word_count: content.split_whitespace().count() as u32,
                    content,
                },
                integration_notes: IntegrationNotes {
                    elements_by_source,
                    ..IntegrationNotes::default()
                },
                quality_assessment: None,
            })
        }
        PhaseInput::Judge(judge) => {
            let rankings = judge
                .edits
                .iter()
                .enumerate()
                .map(|(i, Attributed { provider: source, .. })| RankingEntry {
                    draft_source: source.clone(),
                    overall_score: 10.0 - i as f64,
                    summary: format!("ranked by {provider}"),
                })
                .collect();
            PhaseOutput::Judge(JudgeContract {
                rankings,
                recommendations: Recommendations::default(),
            })
        }
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    async fn invoke(
        &self,
        phase: PhaseKind,
        input: &PhaseInput,
        _timeout: Duration,
    ) -> ProviderOutcome {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        lock(&self.calls).push(phase);
        lock(&self.inputs).push(input.clone());
        let script = self.next_script(phase);

        if let Some(delay) = self.delays.get(&phase) {
            tokio::time::sleep(*delay).await;
        }

        match script {
            Script::Succeed => ProviderOutcome::success(self.canned(input)),
            Script::Respond(contract) => ProviderOutcome::success(contract),
            Script::Fail(kind) => {
                ProviderOutcome::failure(kind, format!("{} scripted {kind}", self.id))
            }
            Script::Hang => std::future::pending().await,
            Script::Panic => panic!("{} scripted panic in {phase} phase", self.id),
        }
    }
}

// ---------------------------------------------------------------------------
// Retrieval fakes
// ---------------------------------------------------------------------------

/// Retrieval source returning a fixed result list and recording queries.
#[derive(Debug, Default)]
pub struct StaticCitations {
    results: Vec<CitationResult>,
    queries: Mutex<Vec<CitationQuery>>,
}

impl StaticCitations {
    pub fn new(results: Vec<CitationResult>) -> Self {
        Self {
            results,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<CitationQuery> {
        lock(&self.queries).clone()
    }
}

#[async_trait]
impl CitationSearch for StaticCitations {
    async fn search(&self, query: &CitationQuery) -> cite_client::Result<Vec<CitationResult>> {
        lock(&self.queries).push(query.clone());
        Ok(self.results.clone())
    }

    async fn health_check(&self) -> bool {
        true
    }
}

/// Retrieval source that is always unreachable.
#[derive(Debug, Default)]
pub struct FailingCitations {
    attempts: AtomicUsize,
}

impl FailingCitations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CitationSearch for FailingCitations {
    async fn search(&self, _query: &CitationQuery) -> cite_client::Result<Vec<CitationResult>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(RetrievalError::ServiceUnavailable {
            url: "memory://unreachable".to_string(),
            reason: "connection refused".to_string(),
        })
    }

    async fn health_check(&self) -> bool {
        false
    }
}

/// A chunk hit with the given id and score.
pub fn citation(id: &str, score: f64) -> CitationResult {
    CitationResult {
        id: id.to_string(),
        title: format!("Title {id}"),
        result_type: "chunk".to_string(),
        score,
        chunk_text: Some(format!("text of {id}")),
        chunk_index: Some(0),
        summary: None,
        authors: vec!["A. Author".to_string()],
        year: Some(2020),
        journal: None,
        volume: None,
        pages: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DocumentType, DraftInput};

    fn brief() -> PhaseInput {
        PhaseInput::Draft(DraftInput {
            topic: "Estoppel".to_string(),
            outline: "1. Intro".to_string(),
            document_type: DocumentType::Article,
            audience: "Lawyers".to_string(),
            target_length: None,
            sources: vec![],
            citations: vec![citation("X1", 0.9)],
        })
    }

    #[tokio::test]
    async fn test_scripts_are_consumed_then_sticky() {
        let provider = ScriptedProvider::new("claude")
            .on(PhaseKind::Draft, Script::Fail(FailureKind::InvocationError))
            .on(PhaseKind::Draft, Script::Succeed);
        let input = brief();
        let timeout = Duration::from_secs(1);

        let first = provider.invoke(PhaseKind::Draft, &input, timeout).await;
        let second = provider.invoke(PhaseKind::Draft, &input, timeout).await;
        let third = provider.invoke(PhaseKind::Draft, &input, timeout).await;

        assert_eq!(first.failure_kind(), Some(FailureKind::InvocationError));
        assert!(second.is_success());
        assert!(third.is_success());
        assert_eq!(provider.invocations(), 3);
        assert_eq!(provider.calls(PhaseKind::Draft), 3);
        assert_eq!(provider.inputs().len(), 3);
    }

    #[test]
    fn test_canned_outputs_validate() {
        let out = canned_output(&ProviderId::from("claude"), &brief());
        assert!(out.validate().is_ok());
        let draft = out.as_draft().unwrap();
        assert_eq!(draft.research_notes.sources_consulted, vec!["X1"]);
    }

    #[tokio::test]
    async fn test_failing_citations_degrade_safely() {
        let source = FailingCitations::new();
        let query = cite_client::CiteConfig::new("http://unused").query("waiver");
        assert!(source.search(&query).await.is_err());
        assert!(source.search_safe(&query).await.is_empty());
        assert_eq!(source.attempts(), 2);
        assert!(!source.health_check().await);
    }
}
