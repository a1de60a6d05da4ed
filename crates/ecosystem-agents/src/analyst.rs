//! Analysis stage: statistical and trend reading of the research narrative.

use ecosystem_core::scoring::data_quality;
use ecosystem_core::{
    AnalysisOutput, LanguageBackend, SourceCounts, StageError, StageName, StagePayload, Task,
};

use crate::agent_context::{StageAgent, StageContext, narrate};

pub struct AnalysisAgent {
    backend: LanguageBackend,
}

impl AnalysisAgent {
    pub fn new(backend: LanguageBackend) -> Self {
        Self { backend }
    }
}

#[async_trait::async_trait]
impl StageAgent for AnalysisAgent {
    fn stage(&self) -> StageName {
        StageName::Analysis
    }

    async fn execute(&self, task: &Task, context: &StageContext) -> Result<StagePayload, StageError> {
        let counts = context.research_counts().unwrap_or_default();
        tracing::debug!(task_id = %task.id, total = counts.total(), "analysing research output");

        let prompt = analysis_prompt(context.research_narrative(), &counts);
        let (insights, backend_degraded) = narrate(&self.backend, &prompt).await?;

        Ok(StagePayload::Analysis(AnalysisOutput {
            insights,
            data_quality: data_quality(&counts),
            backend_degraded,
        }))
    }
}

fn analysis_prompt(research: &str, counts: &SourceCounts) -> String {
    format!(
        "Analyze the following research findings and raw data sources:\n\
         \n\
         Research Findings:\n{research}\n\
         \n\
         Raw Data Summary:\n\
         - Academic Papers: {papers} papers\n\
         - News Articles: {news} articles\n\
         - GitHub Projects: {repos} repositories\n\
         \n\
         Provide comprehensive statistical and trend analysis including:\n\
         1. Quantitative patterns and correlations with specific numbers\n\
         2. Market growth rates and statistical projections\n\
         3. Technology adoption trends and timelines\n\
         4. Investment patterns and funding analysis\n\
         5. Competitive landscape insights\n\
         6. Risk factors and opportunity assessments\n\
         7. Geographic and demographic patterns\n\
         \n\
         Use actual data points from the sources to support your analysis.\n\
         Provide specific statistics and growth figures where possible.",
        papers = counts.papers,
        news = counts.news,
        repos = counts.repos,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_on_empty_context_with_zero_quality() {
        let agent = AnalysisAgent::new(LanguageBackend::Unconfigured);
        let task = Task::new("task_1_1", "Robotics", "");
        let payload = agent.execute(&task, &StageContext::default()).await.unwrap();

        let StagePayload::Analysis(output) = payload else {
            panic!("expected analysis payload");
        };
        assert_eq!(output.data_quality, 0.0);
        assert!(output.backend_degraded);
        assert_eq!(output.insights, ecosystem_core::UNCONFIGURED_SENTINEL);
    }

    #[test]
    fn prompt_reports_raw_counts() {
        let prompt = analysis_prompt("findings", &SourceCounts::new(10, 2, 8));
        assert!(prompt.contains("- Academic Papers: 10 papers"));
        assert!(prompt.contains("- GitHub Projects: 8 repositories"));
    }
}
