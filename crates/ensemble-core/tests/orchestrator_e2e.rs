//! End-to-end pipeline runs against scripted providers and retrieval fakes.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cite_client::{CitationQuery, CitationResult, CitationSearch, CiteConfig};

use ensemble_core::fakes::{citation, FailingCitations, Script, ScriptedProvider, StaticCitations};
use ensemble_core::{
    FailureKind, Orchestrator, PhaseExecutor, PhaseInput, PhaseKind, PhasePlan, PipelineError,
    PipelinePlan, PipelineProgress, ProviderId, ProviderRegistry, RunRequest, Stage, StageStatus,
};

const IDS: [&str; 3] = ["claude", "gemini", "chatgpt"];

fn ids() -> Vec<ProviderId> {
    IDS.iter().map(|id| ProviderId::from(*id)).collect()
}

fn request() -> RunRequest {
    RunRequest::new("The doctrine of consideration", "1. History\n2. Critique")
}

fn orchestrator(providers: &[Arc<ScriptedProvider>]) -> Orchestrator {
    let mut registry = ProviderRegistry::new();
    for p in providers {
        registry.register(Arc::clone(p) as Arc<dyn ensemble_core::ProviderAdapter>);
    }
    Orchestrator::new(registry, PhaseExecutor::new(Duration::from_secs(60)))
}

fn scripted() -> Vec<Arc<ScriptedProvider>> {
    IDS.iter().map(|id| Arc::new(ScriptedProvider::new(*id))).collect()
}

fn edit_inputs(provider: &ScriptedProvider) -> Vec<Vec<String>> {
    provider
        .inputs()
        .into_iter()
        .filter_map(|input| match input {
            PhaseInput::Edit(edit) => Some(
                edit.drafts
                    .iter()
                    .map(|d| d.provider.to_string())
                    .collect(),
            ),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_three_providers_all_succeed() {
    let providers = scripted();
    let run = orchestrator(&providers)
        .run(&request(), &ids(), 1)
        .await
        .unwrap();

    assert!(run.is_complete());
    assert!(run.finished_at.is_some());
    let phases: Vec<PhaseKind> = run.phase_results().iter().map(|r| r.phase()).collect();
    assert_eq!(phases, PhaseKind::ALL.to_vec());
    for result in run.phase_results() {
        assert!(result.quorum_met());
        assert_eq!(result.succeeded_count(), 3);
    }

    for p in &providers {
        let inputs = p.inputs();
        assert_eq!(inputs.len(), 3);
        assert_eq!(inputs[1].candidate_count(), 3, "edit input length");
        assert_eq!(inputs[2].candidate_count(), 3, "judge input length");
    }

    let summary = run.ranking_summary();
    assert_eq!(summary.len(), 3);
    assert!(summary.iter().all(|r| r.order.len() == 3));
    assert_eq!(run.candidate_edits().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_draft_timeout_with_quorum_two_threads_only_successes() {
    let providers = vec![
        Arc::new(ScriptedProvider::new("claude")),
        Arc::new(ScriptedProvider::new("gemini").on(PhaseKind::Draft, Script::Hang)),
        Arc::new(ScriptedProvider::new("chatgpt")),
    ];

    let run = orchestrator(&providers)
        .run(&request(), &ids(), 2)
        .await
        .unwrap();

    let draft = run.phase(PhaseKind::Draft).unwrap();
    assert_eq!(draft.succeeded_count(), 2);
    assert!(draft.quorum_met());
    assert_eq!(
        draft.get(&ProviderId::from("gemini")).and_then(|o| o.failure_kind()),
        Some(FailureKind::Timeout)
    );

    for p in &providers {
        assert_eq!(edit_inputs(p), vec![vec!["claude", "chatgpt"]]);
    }
    assert!(run.is_complete());
}

#[tokio::test(start_paused = true)]
async fn test_draft_quorum_failure_stops_the_run() {
    let providers = vec![
        Arc::new(ScriptedProvider::new("claude").always(Script::Hang)),
        Arc::new(ScriptedProvider::new("gemini").always(Script::Fail(FailureKind::SchemaInvalid))),
        Arc::new(ScriptedProvider::new("chatgpt")),
    ];

    let err = orchestrator(&providers)
        .run(&request(), &ids(), 2)
        .await
        .unwrap_err();

    let PipelineError::QuorumNotMet {
        phase,
        succeeded,
        required,
        ref run,
    } = err
    else {
        panic!("expected QuorumNotMet, got {err:?}");
    };
    assert_eq!(phase, PhaseKind::Draft);
    assert_eq!((succeeded, required), (1, 2));
    assert_eq!(run.phase_results().len(), 1);
    assert!(run.phase(PhaseKind::Edit).is_none());
    assert!(run.phase(PhaseKind::Judge).is_none());
    assert!(!run.is_complete());

    for p in &providers {
        assert_eq!(p.calls(PhaseKind::Edit), 0);
        assert_eq!(p.calls(PhaseKind::Judge), 0);
    }
    assert_eq!(err.partial_run().map(|r| r.phase_results().len()), Some(1));
}

#[tokio::test]
async fn test_edit_quorum_failure_keeps_completed_phases() {
    let providers = vec![
        Arc::new(ScriptedProvider::new("claude").on(PhaseKind::Edit, Script::Fail(FailureKind::InvocationError))),
        Arc::new(ScriptedProvider::new("gemini").on(PhaseKind::Edit, Script::Fail(FailureKind::InvocationError))),
        Arc::new(ScriptedProvider::new("chatgpt").on(PhaseKind::Edit, Script::Fail(FailureKind::SchemaInvalid))),
    ];

    let err = orchestrator(&providers)
        .run(&request(), &ids(), 1)
        .await
        .unwrap_err();

    let run = err.into_partial_run().unwrap();
    assert_eq!(run.phase_results().len(), 2);
    assert!(run.phase(PhaseKind::Draft).unwrap().quorum_met());
    let edit = run.phase(PhaseKind::Edit).unwrap();
    assert!(!edit.quorum_met());
    assert_eq!(edit.failures().count(), 3);
    assert!(run.phase(PhaseKind::Judge).is_none());
}

#[tokio::test]
async fn test_per_phase_plan() {
    let providers = scripted();
    let mut plan = PipelinePlan::uniform(ids(), 1);
    plan.judge = PhasePlan::new(vec![ProviderId::from("claude")], 1);

    let run = orchestrator(&providers)
        .run_with_plan(&request(), &plan)
        .await
        .unwrap();

    assert_eq!(run.phase(PhaseKind::Judge).unwrap().len(), 1);
    assert_eq!(providers[0].calls(PhaseKind::Judge), 1);
    assert_eq!(providers[1].calls(PhaseKind::Judge), 0);
}

#[tokio::test]
async fn test_retrieval_results_reach_drafters_in_score_order() {
    let providers = scripted();
    let source = Arc::new(StaticCitations::new(vec![
        citation("low", 0.4),
        citation("high", 0.9),
        citation("mid", 0.6),
    ]));
    let defaults = CiteConfig::new("http://unused").with_library(42);

    let run = orchestrator(&providers)
        .with_retrieval(Arc::clone(&source) as Arc<dyn CitationSearch>, defaults)
        .run(&request(), &ids(), 1)
        .await
        .unwrap();

    let ordered: Vec<&str> = run.citation_results.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ordered, vec!["high", "mid", "low"]);

    let queries = source.queries();
    assert_eq!(queries.len(), 1, "retrieval runs once per pipeline");
    assert_eq!(queries[0].text, "The doctrine of consideration");
    assert_eq!(queries[0].library_id, 42);

    match &providers[0].inputs()[0] {
        PhaseInput::Draft(brief) => assert_eq!(brief.citations.len(), 3),
        other => panic!("unexpected first input {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_retrieval_does_not_block_the_run() {
    let providers = scripted();
    let source = Arc::new(FailingCitations::new());

    let run = orchestrator(&providers)
        .with_retrieval(
            Arc::clone(&source) as Arc<dyn CitationSearch>,
            CiteConfig::new("http://unused"),
        )
        .run(&request(), &ids(), 3)
        .await
        .unwrap();

    assert_eq!(source.attempts(), 1);
    assert!(run.citation_results.is_empty());
    assert!(run.is_complete());
}

/// Retrieval source that never answers.
struct SilentCitations;

#[async_trait]
impl CitationSearch for SilentCitations {
    async fn search(&self, _query: &CitationQuery) -> cite_client::Result<Vec<CitationResult>> {
        std::future::pending().await
    }

    async fn health_check(&self) -> bool {
        false
    }
}

#[tokio::test(start_paused = true)]
async fn test_hanging_retrieval_is_bounded_by_its_timeout() {
    let providers = scripted();
    let started = tokio::time::Instant::now();

    let run = orchestrator(&providers)
        .with_retrieval(
            Arc::new(SilentCitations),
            CiteConfig::new("http://unused").with_timeout(Duration::from_secs(5)),
        )
        .run(&request(), &ids(), 1)
        .await
        .unwrap();

    assert!(run.citation_results.is_empty());
    assert!(run.is_complete());
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert!(started.elapsed() < Duration::from_secs(6));
}

#[tokio::test]
async fn test_progress_events_follow_the_pipeline() {
    let providers = vec![
        Arc::new(ScriptedProvider::new("claude")),
        Arc::new(ScriptedProvider::new("gemini").on(PhaseKind::Judge, Script::Fail(FailureKind::InvocationError))),
        Arc::new(ScriptedProvider::new("chatgpt")),
    ];
    let seen: Arc<Mutex<Vec<PipelineProgress>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let seen = Arc::clone(&seen);
        move |p: PipelineProgress| seen.lock().unwrap().push(p)
    };

    orchestrator(&providers)
        .with_retrieval(
            Arc::new(StaticCitations::new(vec![citation("X1", 0.85)])),
            CiteConfig::new("http://unused"),
        )
        .with_progress(Arc::new(sink))
        .run(&request(), &ids(), 1)
        .await
        .unwrap();

    let events = seen.lock().unwrap().clone();
    let stages: Vec<(Stage, StageStatus)> = events
        .iter()
        .filter(|p| p.provider.is_none())
        .map(|p| (p.stage, p.status))
        .collect();
    assert_eq!(
        stages,
        vec![
            (Stage::Research, StageStatus::Starting),
            (Stage::Research, StageStatus::Completed),
            (Stage::Drafting, StageStatus::Starting),
            (Stage::Drafting, StageStatus::Completed),
            (Stage::Editing, StageStatus::Starting),
            (Stage::Editing, StageStatus::Completed),
            (Stage::Judging, StageStatus::Starting),
            (Stage::Judging, StageStatus::Completed),
        ]
    );

    let provider_failures: Vec<&PipelineProgress> =
        events.iter().filter(|p| p.provider.is_some()).collect();
    assert_eq!(provider_failures.len(), 1);
    assert_eq!(provider_failures[0].stage, Stage::Judging);
    assert_eq!(provider_failures[0].status, StageStatus::Failed);
    assert_eq!(
        provider_failures[0].provider,
        Some(ProviderId::from("gemini"))
    );
}
