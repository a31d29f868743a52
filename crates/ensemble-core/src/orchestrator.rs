//! Pipeline orchestrator: retrieval, then Draft, Edit and Judge in sequence.
//!
//! Every successful contract of phase *i* is threaded, attributed to its
//! provider, into every call of phase *i+1*. A phase that misses its quorum
//! ends the run; the partial run travels inside the error.

use std::sync::Arc;
use std::time::Instant;

use cite_client::{normalize_order, CitationResult, CitationSearch, CiteConfig};
use tracing::{warn, Instrument};
use uuid::Uuid;

use crate::adapter::{ProviderAdapter, ProviderRegistry};
use crate::domain::{
    Attributed, DraftInput, EditInput, JudgeInput, PhaseError, PhaseInput, PhaseKind, PhaseResult,
    PipelineError, PipelineRun, ProviderId, RunRequest,
};
use crate::executor::{check_plan, PhaseExecutor};
use crate::obs;
use crate::progress::{PipelineProgress, ProgressSink, Stage, StageStatus};

/// Providers and quorum for one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhasePlan {
    pub providers: Vec<ProviderId>,
    pub quorum_min: usize,
}

impl PhasePlan {
    pub fn new(providers: Vec<ProviderId>, quorum_min: usize) -> Self {
        Self {
            providers,
            quorum_min,
        }
    }
}

/// One [`PhasePlan`] per phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelinePlan {
    pub draft: PhasePlan,
    pub edit: PhasePlan,
    pub judge: PhasePlan,
}

impl PipelinePlan {
    /// Same providers and quorum in every phase.
    pub fn uniform(providers: Vec<ProviderId>, quorum_min: usize) -> Self {
        let plan = PhasePlan::new(providers, quorum_min);
        Self {
            draft: plan.clone(),
            edit: plan.clone(),
            judge: plan,
        }
    }

    pub fn get(&self, phase: PhaseKind) -> &PhasePlan {
        match phase {
            PhaseKind::Draft => &self.draft,
            PhaseKind::Edit => &self.edit,
            PhaseKind::Judge => &self.judge,
        }
    }
}

struct Retrieval {
    source: Arc<dyn CitationSearch>,
    defaults: CiteConfig,
}

/// Drives one run end to end.
pub struct Orchestrator {
    registry: ProviderRegistry,
    executor: PhaseExecutor,
    retrieval: Option<Retrieval>,
    progress: Option<Arc<dyn ProgressSink>>,
}

impl Orchestrator {
    pub fn new(registry: ProviderRegistry, executor: PhaseExecutor) -> Self {
        Self {
            registry,
            executor,
            retrieval: None,
            progress: None,
        }
    }

    /// Query `source` before drafting. `defaults` supplies the query
    /// parameters and the retrieval time bound.
    pub fn with_retrieval(mut self, source: Arc<dyn CitationSearch>, defaults: CiteConfig) -> Self {
        self.retrieval = Some(Retrieval { source, defaults });
        self
    }

    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn executor(&self) -> &PhaseExecutor {
        &self.executor
    }

    /// Run all three phases with the same providers and quorum.
    pub async fn run(
        &self,
        request: &RunRequest,
        providers: &[ProviderId],
        quorum_min: usize,
    ) -> Result<PipelineRun, PipelineError> {
        self.run_with_plan(request, &PipelinePlan::uniform(providers.to_vec(), quorum_min))
            .await
    }

    /// Run all three phases, each with its own plan.
    ///
    /// Every plan is checked before anything is called, so a setup mistake
    /// never leaves a half-executed run behind.
    pub async fn run_with_plan(
        &self,
        request: &RunRequest,
        plan: &PipelinePlan,
    ) -> Result<PipelineRun, PipelineError> {
        let adapters = [
            self.resolve(PhaseKind::Draft, plan.get(PhaseKind::Draft))?,
            self.resolve(PhaseKind::Edit, plan.get(PhaseKind::Edit))?,
            self.resolve(PhaseKind::Judge, plan.get(PhaseKind::Judge))?,
        ];

        let run_id = Uuid::new_v4();
        let span = obs::run_span(&run_id.to_string());
        self.execute(run_id, request, plan, adapters)
            .instrument(span)
            .await
    }

    async fn execute(
        &self,
        run_id: Uuid,
        request: &RunRequest,
        plan: &PipelinePlan,
        adapters: [Vec<Arc<dyn ProviderAdapter>>; 3],
    ) -> Result<PipelineRun, PipelineError> {
        let started = Instant::now();
        let run_key = run_id.to_string();
        obs::emit_run_started(&run_key, &request.topic);

        let citations = self.retrieve(&request.topic).await;
        let brief = request.brief(citations.clone());
        let mut run = PipelineRun::start(run_id, citations);

        for (phase, providers) in PhaseKind::ALL.into_iter().zip(adapters) {
            let input = match run.phase_results().last() {
                None => PhaseInput::Draft(brief.clone()),
                Some(prev) => thread(phase, &brief, prev),
            };
            let quorum_min = plan.get(phase).quorum_min;

            self.notify(PipelineProgress::new(
                phase.into(),
                StageStatus::Starting,
                format!("Starting {} phase", phase.stage_name()),
            ));
            let result = self
                .executor
                .settle(phase, &providers, input, quorum_min)
                .await?;
            self.report(&result);

            let (succeeded, met) = (result.succeeded_count(), result.quorum_met());
            run.record(result);

            if !met {
                run.finish();
                obs::emit_run_aborted(&run_key, phase, succeeded, quorum_min);
                return Err(PipelineError::QuorumNotMet {
                    phase,
                    succeeded,
                    required: quorum_min,
                    run: Box::new(run),
                });
            }
        }

        run.finish();
        obs::emit_run_finished(
            &run_key,
            started.elapsed().as_millis() as u64,
            run.phase_results().len(),
        );
        Ok(run)
    }

    fn resolve(
        &self,
        phase: PhaseKind,
        plan: &PhasePlan,
    ) -> Result<Vec<Arc<dyn ProviderAdapter>>, PhaseError> {
        let ids: Vec<&ProviderId> = plan.providers.iter().collect();
        check_plan(phase, &ids, plan.quorum_min)?;
        plan.providers
            .iter()
            .map(|id| {
                self.registry
                    .get(id)
                    .ok_or_else(|| PhaseError::UnknownProvider {
                        phase,
                        provider: id.clone(),
                    })
            })
            .collect()
    }

    /// Safe retrieval bounded by the configured timeout. Never fails.
    async fn retrieve(&self, topic: &str) -> Vec<CitationResult> {
        let Some(retrieval) = &self.retrieval else {
            return Vec::new();
        };
        self.notify(PipelineProgress::new(
            Stage::Research,
            StageStatus::Starting,
            "Querying local citation database",
        ));

        let started = Instant::now();
        let bound = retrieval.defaults.timeout();
        let query = retrieval.defaults.query(topic).with_timeout(bound);
        let results = match tokio::time::timeout(bound, retrieval.source.search_safe(&query)).await
        {
            Ok(results) => normalize_order(results),
            Err(_) => {
                warn!(
                    timeout_ms = bound.as_millis() as u64,
                    "citation search timed out, continuing without citations"
                );
                Vec::new()
            }
        };

        obs::emit_retrieval_completed(results.len(), started.elapsed().as_millis() as u64);
        self.notify(PipelineProgress::new(
            Stage::Research,
            StageStatus::Completed,
            format!("Found {} relevant citations", results.len()),
        ));
        results
    }

    fn report(&self, result: &PhaseResult) {
        let stage = Stage::from(result.phase());
        for (provider, kind, message) in result.failures() {
            self.notify(
                PipelineProgress::new(stage, StageStatus::Failed, format!("{kind}: {message}"))
                    .for_provider(provider.clone()),
            );
        }
        let status = if result.quorum_met() {
            StageStatus::Completed
        } else {
            StageStatus::Failed
        };
        self.notify(PipelineProgress::new(
            stage,
            status,
            format!(
                "{}: {}/{} succeeded (quorum {})",
                result.phase().stage_name(),
                result.succeeded_count(),
                result.len(),
                result.quorum_min()
            ),
        ));
    }

    fn notify(&self, progress: PipelineProgress) {
        if let Some(sink) = &self.progress {
            sink.notify(progress);
        }
    }
}

/// Input for `phase` built from every success of the previous phase.
fn thread(phase: PhaseKind, brief: &DraftInput, prev: &PhaseResult) -> PhaseInput {
    match phase {
        PhaseKind::Draft => PhaseInput::Draft(brief.clone()),
        PhaseKind::Edit => PhaseInput::Edit(EditInput {
            context: brief.clone(),
            drafts: prev
                .successes()
                .filter_map(|(provider, out)| {
                    out.as_draft().map(|c| Attributed {
                        provider: provider.clone(),
                        contract: c.clone(),
                    })
                })
                .collect(),
        }),
        PhaseKind::Judge => PhaseInput::Judge(JudgeInput {
            context: brief.clone(),
            edits: prev
                .successes()
                .filter_map(|(provider, out)| {
                    out.as_edit().map(|c| Attributed {
                        provider: provider.clone(),
                        contract: c.clone(),
                    })
                })
                .collect(),
        }),
    }
}
