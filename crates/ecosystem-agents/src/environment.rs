//! Environment stage: synthetic system metrics over the earlier stages plus
//! operational recommendations.

use ecosystem_core::scoring::{SystemMetricInputs, system_metrics};
use ecosystem_core::{
    EnvironmentOutput, LanguageBackend, StageError, StageName, StagePayload, SystemMetrics, Task,
};

use crate::agent_context::{StageAgent, StageContext, narrate};

pub struct EnvironmentAgent {
    backend: LanguageBackend,
}

impl EnvironmentAgent {
    pub fn new(backend: LanguageBackend) -> Self {
        Self { backend }
    }
}

/// Metric inputs taken from the context; missing stages contribute zeros.
pub fn metric_inputs(context: &StageContext) -> SystemMetricInputs {
    SystemMetricInputs {
        timings: context.timings(),
        error_count: context.error_count(),
        prior_data_quality: context.data_quality(),
        research_counts: context.research_counts(),
    }
}

#[async_trait::async_trait]
impl StageAgent for EnvironmentAgent {
    fn stage(&self) -> StageName {
        StageName::Environment
    }

    async fn execute(&self, task: &Task, context: &StageContext) -> Result<StagePayload, StageError> {
        let metrics = system_metrics(&metric_inputs(context));
        tracing::info!(
            task_id = %task.id,
            health = metrics.health_score,
            errors = metrics.error_count,
            "system metrics computed"
        );

        let prompt = environment_prompt(task, &metrics)?;
        let (recommendations, backend_degraded) = narrate(&self.backend, &prompt).await?;

        Ok(StagePayload::Environment(EnvironmentOutput {
            recommendations,
            metrics,
            backend_degraded,
        }))
    }
}

fn environment_prompt(task: &Task, metrics: &SystemMetrics) -> Result<String, StageError> {
    Ok(format!(
        "Analyze system performance and provide optimization recommendations:\n\
         \n\
         Current Performance Metrics:\n{metrics}\n\
         \n\
         Task Context: {title}\n\
         \n\
         Provide recommendations for:\n\
         1. System performance optimization strategies\n\
         2. Resource allocation and scaling approaches\n\
         3. Quality assurance and reliability measures\n\
         4. Cost optimization opportunities\n\
         5. Technology stack recommendations\n\
         6. Risk mitigation and security strategies\n\
         7. Deployment and maintenance best practices\n\
         8. Future scalability planning\n\
         \n\
         Focus on actionable recommendations with measurable outcomes.",
        metrics = serde_json::to_string_pretty(metrics)?,
        title = task.title,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecosystem_core::{StageResult, TaskIdGenerator};
    use indexmap::IndexMap;

    #[tokio::test]
    async fn completes_with_defaults_after_failed_stages() {
        let task = Task::new(TaskIdGenerator::new().next_id(), "Robotics", "");
        let mut stages = IndexMap::new();
        for stage in [StageName::Research, StageName::Analysis, StageName::Innovation] {
            stages.insert(stage, StageResult::failure(stage, &task.id, "backend down"));
        }

        let agent = EnvironmentAgent::new(LanguageBackend::Unconfigured);
        let payload = agent.execute(&task, &StageContext::new(stages)).await.unwrap();
        let StagePayload::Environment(output) = payload else {
            panic!("expected environment payload");
        };

        let metrics = output.metrics;
        assert_eq!(metrics.error_count, 3);
        assert!((metrics.health_score - 0.7).abs() < 1e-9);
        assert!((metrics.optimization_score - 0.9).abs() < 1e-9);
        assert_eq!(metrics.api_success_rate, 0.0);
        assert_eq!(metrics.total_elapsed_secs, 0.0);
    }

    #[test]
    fn prompt_embeds_metrics_json() {
        let task = Task::new("task_1_1", "Robotics", "");
        let metrics = system_metrics(&SystemMetricInputs::default());
        let prompt = environment_prompt(&task, &metrics).unwrap();
        assert!(prompt.contains("\"health_score\": 1.0"));
        assert!(prompt.contains("Task Context: Robotics"));
    }
}
