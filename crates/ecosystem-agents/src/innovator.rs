//! Innovation stage.

use ecosystem_core::scoring::{BREAKTHROUGH_POTENTIAL, COMMERCIAL_VIABILITY};
use ecosystem_core::{InnovationOutput, LanguageBackend, StageError, StageName, StagePayload, Task};

use crate::agent_context::{StageAgent, StageContext, narrate};

pub struct InnovationAgent {
    backend: LanguageBackend,
}

impl InnovationAgent {
    pub fn new(backend: LanguageBackend) -> Self {
        Self { backend }
    }
}

#[async_trait::async_trait]
impl StageAgent for InnovationAgent {
    fn stage(&self) -> StageName {
        StageName::Innovation
    }

    async fn execute(&self, task: &Task, context: &StageContext) -> Result<StagePayload, StageError> {
        tracing::debug!(task_id = %task.id, "generating innovation opportunities");
        let prompt = innovation_prompt(context.research_narrative(), context.analysis_insights());
        let (ideas, backend_degraded) = narrate(&self.backend, &prompt).await?;

        // scores are fixed, not derived from `ideas`
        Ok(StagePayload::Innovation(InnovationOutput {
            ideas,
            breakthrough_potential: BREAKTHROUGH_POTENTIAL,
            commercial_viability: COMMERCIAL_VIABILITY,
            backend_degraded,
        }))
    }
}

fn innovation_prompt(research: &str, analysis: &str) -> String {
    format!(
        "Based on the research findings and analysis, generate breakthrough innovation opportunities:\n\
         \n\
         Research Data:\n{research}\n\
         \n\
         Analysis Insights:\n{analysis}\n\
         \n\
         Generate innovative solutions including:\n\
         1. Disruptive technology opportunities with feasibility assessments\n\
         2. Cross-industry application potential and market sizes\n\
         3. Novel business model innovations\n\
         4. Technical breakthrough possibilities and timelines\n\
         5. Implementation strategies and resource requirements\n\
         6. Competitive advantage analysis\n\
         7. Investment potential and ROI projections\n\
         8. Market gap analysis and untapped opportunities\n\
         \n\
         Focus on commercially viable innovations that address real market needs.\n\
         Provide specific market size estimates and implementation timelines."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_threads_both_prior_narratives() {
        let prompt = innovation_prompt("R-text", "A-text");
        let research = prompt.find("R-text").unwrap();
        let analysis = prompt.find("A-text").unwrap();
        assert!(research < analysis);
    }

    #[tokio::test]
    async fn scores_are_the_fixed_constants() {
        let agent = InnovationAgent::new(LanguageBackend::Unconfigured);
        let task = Task::new("task_1_1", "Robotics", "");
        let StagePayload::Innovation(output) = agent.execute(&task, &StageContext::default()).await.unwrap() else {
            panic!("expected innovation payload");
        };
        assert_eq!(output.breakthrough_potential, 0.85);
        assert_eq!(output.commercial_viability, 0.78);
    }
}
