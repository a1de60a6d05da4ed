//! Fixed-order workflow execution.
//!
//! Stages run strictly in sequence; each one sees only the results of the
//! stages before it. A stage error is recorded and the run continues. A stage
//! that panics aborts the run and marks the workflow unsuccessful, but the
//! partial result is still returned and persisted.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use ecosystem_core::{
    AuditLog, Config, DataSourceGateway, EcosystemError, EventCollector, LanguageBackend,
    PerformanceMetrics, StageName, Task, TaskIdGenerator, TaskStatus, WorkflowLogInput,
    WorkflowResult, WorkflowStore, record_workflow_metrics, render_report,
};
use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};

use crate::agent_context::{StageAgent, StageContext, run_stage};
use crate::{AnalysisAgent, EnvironmentAgent, InnovationAgent, ResearchAgent};

/// The four stage agents in execution order.
#[derive(Clone)]
pub struct StagePipeline {
    agents: [Arc<dyn StageAgent>; 4],
}

impl StagePipeline {
    /// Each agent must report the stage of its slot.
    pub fn new(
        research: Arc<dyn StageAgent>,
        analysis: Arc<dyn StageAgent>,
        innovation: Arc<dyn StageAgent>,
        environment: Arc<dyn StageAgent>,
    ) -> Result<Self, EcosystemError> {
        let agents = [research, analysis, innovation, environment];
        for (expected, agent) in StageName::ORDER.iter().zip(&agents) {
            if agent.stage() != *expected {
                return Err(EcosystemError::InvalidConfiguration(format!(
                    "agent for the {expected} slot reports stage {}",
                    agent.stage()
                )));
            }
        }
        Ok(Self { agents })
    }

    /// The standard agents over one gateway and backend.
    pub fn standard(gateway: Arc<DataSourceGateway>, backend: LanguageBackend) -> Self {
        Self {
            agents: [
                Arc::new(ResearchAgent::new(gateway, backend.clone())),
                Arc::new(AnalysisAgent::new(backend.clone())),
                Arc::new(InnovationAgent::new(backend.clone())),
                Arc::new(EnvironmentAgent::new(backend)),
            ],
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, EcosystemError> {
        let gateway = DataSourceGateway::from_config(config)?;
        let backend = LanguageBackend::from_config(config)?;
        Ok(Self::standard(Arc::new(gateway), backend))
    }

    fn iter(&self) -> impl Iterator<Item = (StageName, &Arc<dyn StageAgent>)> {
        StageName::ORDER.into_iter().zip(self.agents.iter())
    }
}

pub struct Orchestrator {
    pipeline: StagePipeline,
    store: Arc<dyn WorkflowStore>,
    events: Option<EventCollector>,
    audit_log: Option<AuditLog>,
    ids: TaskIdGenerator,
    history: Arc<RwLock<Vec<Task>>>,
}

impl Orchestrator {
    pub fn new(pipeline: StagePipeline, store: Arc<dyn WorkflowStore>) -> Self {
        Self {
            pipeline,
            store,
            events: None,
            audit_log: None,
            ids: TaskIdGenerator::new(),
            history: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn with_events(mut self, events: EventCollector) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_audit_log(mut self, audit_log: AuditLog) -> Self {
        self.audit_log = Some(audit_log);
        self
    }

    pub fn create_task(&self, title: impl Into<String>, description: impl Into<String>) -> Task {
        let task = Task::new(self.ids.next_id(), title, description);
        info!(task_id = %task.id, title = %task.title, "task created");
        task
    }

    /// Run all four stages for `task`. Never fails; problems are recorded in
    /// the returned result.
    #[instrument(name = "workflow.execute", skip_all, fields(task_id = %task.id))]
    pub async fn execute(&self, task: &mut Task) -> WorkflowResult {
        info!(title = %task.title, "workflow started");
        task.status = TaskStatus::Running;

        let started = Instant::now();
        let mut result = WorkflowResult::new(&task.id, &task.title);
        let snapshot = Arc::new(task.clone());

        for (stage, agent) in self.pipeline.iter() {
            let context = StageContext::new(result.stages.clone());
            let agent = Arc::clone(agent);
            let stage_task = Arc::clone(&snapshot);
            let events = self.events.clone();

            let handle = tokio::spawn(async move {
                run_stage(agent.as_ref(), &stage_task, &context, events.as_ref()).await
            });

            match handle.await {
                Ok(stage_result) => {
                    result.stages.insert(stage, stage_result);
                }
                Err(join_error) => {
                    error!(stage = %stage, error = %join_error, "stage aborted; stopping workflow");
                    result.error = Some(format!("{stage} stage aborted: {join_error}"));
                    break;
                }
            }
        }

        result.finished_at = Some(Utc::now());
        result.metrics = aggregate_metrics(&result, started.elapsed().as_secs_f64());
        let success = result.metrics.workflow_success;

        task.status = if success {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };
        task.results = Some(result.clone());
        if success {
            self.history.write().await.push(task.clone());
        }

        if let Err(err) = self.store.insert(&result).await {
            warn!(error = %err, "failed to persist workflow result");
        }
        self.write_audit_record(&result);

        record_workflow_metrics(success);
        if let Some(events) = &self.events {
            events.emit_workflow_finished(&task.id, success, result.metrics.total_time_secs);
        }

        info!(
            success,
            failed_stages = result.metrics.failed_stages,
            total_secs = result.metrics.total_time_secs,
            "workflow finished"
        );
        result
    }

    pub fn report(&self, result: &WorkflowResult) -> String {
        render_report(result)
    }

    /// Tasks whose workflow completed, oldest first.
    pub async fn history(&self) -> Vec<Task> {
        self.history.read().await.clone()
    }

    pub async fn reset_history(&self) {
        self.history.write().await.clear();
    }

    fn write_audit_record(&self, result: &WorkflowResult) {
        let Some(audit_log) = &self.audit_log else {
            return;
        };

        let input = WorkflowLogInput {
            task_id: result.task_id.clone(),
            title: result.title.clone(),
            success: result.metrics.workflow_success,
            confidence: result.metrics.confidence_score,
            total_secs: result.metrics.total_time_secs,
            stages: result
                .stages
                .iter()
                .map(|(stage, stage_result)| {
                    (stage.to_string(), stage_result.error().map(str::to_string))
                })
                .collect(),
            error: result.error.clone(),
        };

        if let Err(err) = audit_log.record(input) {
            warn!(error = %err, "failed to write workflow audit record");
        }
    }
}

fn aggregate_metrics(result: &WorkflowResult, total_time_secs: f64) -> PerformanceMetrics {
    let research = result.research();
    PerformanceMetrics {
        total_time_secs,
        confidence_score: research.map(|output| output.confidence).unwrap_or(0.0),
        system_health: result
            .environment()
            .map(|output| output.metrics.health_score)
            .unwrap_or(0.0),
        data_sources: research.map(|output| output.source_counts).unwrap_or_default(),
        failed_stages: result.stages.values().filter(|stage| stage.is_error()).count(),
        workflow_success: result.error.is_none(),
    }
}
