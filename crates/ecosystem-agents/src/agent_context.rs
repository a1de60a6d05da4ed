//! Stage execution contract.
//!
//! Every stage receives an immutable [`StageContext`] built from the stages
//! that already finished, and returns a payload or a [`StageError`]. The
//! [`run_stage`] boundary turns either into a `StageResult`.

use std::time::Instant;

use ecosystem_core::{
    EventCollector, Generation, LanguageBackend, ResearchBundle, SourceCounts, StageError,
    StageName, StagePayload, StageResult, StageStatus, StageTimings, Task, record_stage_metrics,
};
use indexmap::IndexMap;
use tracing::{Instrument, info, info_span, warn};

/// Snapshot of completed stages. Accessors fall back to empty/zero values when
/// a stage is missing or errored.
#[derive(Debug, Clone, Default)]
pub struct StageContext {
    stages: IndexMap<StageName, StageResult>,
}

impl StageContext {
    pub fn new(stages: IndexMap<StageName, StageResult>) -> Self {
        Self { stages }
    }

    pub fn result(&self, stage: StageName) -> Option<&StageResult> {
        self.stages.get(&stage)
    }

    pub fn research_narrative(&self) -> &str {
        self.result(StageName::Research)
            .and_then(StageResult::research)
            .map(|output| output.narrative.as_str())
            .unwrap_or_default()
    }

    pub fn research_bundle(&self) -> Option<&ResearchBundle> {
        self.result(StageName::Research)
            .and_then(StageResult::research)
            .map(|output| &output.bundle)
    }

    /// Counts of the Research bundle, if Research succeeded.
    pub fn research_counts(&self) -> Option<SourceCounts> {
        self.research_bundle().map(ResearchBundle::counts)
    }

    pub fn analysis_insights(&self) -> &str {
        self.result(StageName::Analysis)
            .and_then(StageResult::analysis)
            .map(|output| output.insights.as_str())
            .unwrap_or_default()
    }

    pub fn data_quality(&self) -> Option<f64> {
        self.result(StageName::Analysis)
            .and_then(StageResult::analysis)
            .map(|output| output.data_quality)
    }

    /// Elapsed seconds of the stages before Environment; errored or missing
    /// stages count as zero.
    pub fn timings(&self) -> StageTimings {
        let elapsed = |stage| {
            self.result(stage)
                .and_then(|result| result.elapsed_secs)
                .unwrap_or(0.0)
        };
        StageTimings {
            research: elapsed(StageName::Research),
            analysis: elapsed(StageName::Analysis),
            innovation: elapsed(StageName::Innovation),
        }
    }

    pub fn error_count(&self) -> usize {
        self.stages.values().filter(|result| result.is_error()).count()
    }
}

#[async_trait::async_trait]
pub trait StageAgent: Send + Sync {
    fn stage(&self) -> StageName;

    async fn execute(&self, task: &Task, context: &StageContext) -> Result<StagePayload, StageError>;
}

/// Narrative text plus whether it is the unconfigured sentinel. A failed call
/// is a stage error.
pub(crate) async fn narrate(backend: &LanguageBackend, prompt: &str) -> Result<(String, bool), StageError> {
    match backend.generate(prompt).await {
        Generation::Text(text) => Ok((text, false)),
        generation @ Generation::Unconfigured => Ok((generation.narrative(), true)),
        Generation::Failed { reason } => Err(StageError::Backend(reason)),
    }
}

/// Run one stage and convert its outcome into a `StageResult`.
pub async fn run_stage(
    agent: &dyn StageAgent,
    task: &Task,
    context: &StageContext,
    events: Option<&EventCollector>,
) -> StageResult {
    let stage = agent.stage();
    let span = info_span!("stage.run", stage = %stage, task_id = %task.id);

    async {
        if let Some(events) = events {
            events.emit_stage_started(&task.id, stage);
        }
        info!(title = %task.title, "stage started");

        let started = Instant::now();
        let outcome = agent.execute(task, context).await;
        let elapsed = started.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;

        record_stage_metrics(stage, outcome.is_ok(), elapsed.as_secs_f64() * 1000.0);

        match outcome {
            Ok(payload) => {
                let status = if payload.backend_degraded() {
                    StageStatus::Degraded
                } else {
                    StageStatus::Success
                };
                info!(elapsed_ms, degraded = payload.backend_degraded(), "stage completed");
                if let Some(events) = events {
                    events.emit_stage_finished(&task.id, stage, status, elapsed_ms);
                }
                StageResult::success(&task.id, payload, elapsed.as_secs_f64())
            }
            Err(err) => {
                warn!(error = %err, elapsed_ms, "stage failed");
                if let Some(events) = events {
                    events.emit_stage_finished(
                        &task.id,
                        stage,
                        StageStatus::Failure {
                            reason: err.to_string(),
                        },
                        elapsed_ms,
                    );
                }
                StageResult::failure(stage, &task.id, err.to_string())
            }
        }
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecosystem_core::{AnalysisOutput, InnovationOutput, TaskIdGenerator};

    struct Fixed(Result<StagePayload, StageError>);

    #[async_trait::async_trait]
    impl StageAgent for Fixed {
        fn stage(&self) -> StageName {
            StageName::Innovation
        }

        async fn execute(&self, _task: &Task, _context: &StageContext) -> Result<StagePayload, StageError> {
            self.0.clone()
        }
    }

    fn task() -> Task {
        Task::new(TaskIdGenerator::new().next_id(), "Robotics", "")
    }

    #[tokio::test]
    async fn error_becomes_error_shaped_result() {
        let agent = Fixed(Err(StageError::Backend("HTTP 500".into())));
        let result = run_stage(&agent, &task(), &StageContext::default(), None).await;
        assert!(result.is_error());
        assert!(result.elapsed_secs.is_none());
        assert_eq!(result.agent_id, "innovation_agent");
        assert_eq!(result.error(), Some("language backend call failed: HTTP 500"));
    }

    #[tokio::test]
    async fn success_emits_started_and_finished() {
        let (events, mut receiver) = EventCollector::new();
        let agent = Fixed(Ok(StagePayload::Innovation(InnovationOutput {
            ideas: "ideas".into(),
            breakthrough_potential: 0.85,
            commercial_viability: 0.78,
            backend_degraded: true,
        })));
        let result = run_stage(&agent, &task(), &StageContext::default(), Some(&events)).await;
        assert!(result.elapsed_secs.is_some());
        drop(events);

        let mut statuses = Vec::new();
        while let Some(event) = receiver.recv().await {
            if let ecosystem_core::PipelineEvent::StageFinished { status, .. } = event {
                statuses.push(status);
            }
        }
        assert_eq!(statuses, vec![StageStatus::Degraded]);
    }

    #[test]
    fn context_defaults_when_stages_are_missing_or_failed() {
        let mut stages = IndexMap::new();
        stages.insert(
            StageName::Research,
            StageResult::failure(StageName::Research, "task_1_1", "boom"),
        );
        stages.insert(
            StageName::Analysis,
            StageResult::success(
                "task_1_1",
                StagePayload::Analysis(AnalysisOutput {
                    insights: "insight".into(),
                    data_quality: 0.4,
                    backend_degraded: false,
                }),
                2.5,
            ),
        );
        let context = StageContext::new(stages);

        assert_eq!(context.research_narrative(), "");
        assert!(context.research_counts().is_none());
        assert_eq!(context.analysis_insights(), "insight");
        assert_eq!(context.data_quality(), Some(0.4));
        assert_eq!(context.error_count(), 1);
        assert_eq!(context.timings().total(), 2.5);
    }
}
