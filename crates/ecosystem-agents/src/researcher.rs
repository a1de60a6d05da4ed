//! Research stage: gathers live data and asks the backend for a grounded
//! summary.

use std::sync::Arc;

use ecosystem_core::scoring::research_confidence;
use ecosystem_core::{
    DataSourceGateway, LanguageBackend, ResearchOutput, SourceRecord, StageError, StageName,
    StagePayload, Task,
};

use crate::agent_context::{StageAgent, StageContext, narrate};

/// Records per source family embedded in the prompt.
pub const PREVIEW_PER_SOURCE: usize = 3;

pub struct ResearchAgent {
    gateway: Arc<DataSourceGateway>,
    backend: LanguageBackend,
}

impl ResearchAgent {
    pub fn new(gateway: Arc<DataSourceGateway>, backend: LanguageBackend) -> Self {
        Self { gateway, backend }
    }
}

#[async_trait::async_trait]
impl StageAgent for ResearchAgent {
    fn stage(&self) -> StageName {
        StageName::Research
    }

    async fn execute(&self, task: &Task, _context: &StageContext) -> Result<StagePayload, StageError> {
        let bundle = self.gateway.gather(&task.title, &task.description).await;
        let counts = bundle.counts();
        tracing::info!(
            task_id = %task.id,
            papers = counts.papers,
            news = counts.news,
            repos = counts.repos,
            "research data gathered"
        );

        let prompt = research_prompt(task, &bundle.preview(PREVIEW_PER_SOURCE))?;
        let (narrative, backend_degraded) = narrate(&self.backend, &prompt).await?;

        Ok(StagePayload::Research(ResearchOutput {
            narrative,
            confidence: research_confidence(&counts),
            source_counts: counts,
            bundle,
            backend_degraded,
        }))
    }
}

fn research_prompt(task: &Task, preview: &[SourceRecord]) -> Result<String, StageError> {
    let section = |kind| -> Result<String, StageError> {
        let records: Vec<&SourceRecord> = preview.iter().filter(|record| record.kind() == kind).collect();
        Ok(serde_json::to_string_pretty(&records)?)
    };

    Ok(format!(
        "Based on the following real research data, provide a comprehensive research analysis for: {title}\n\
         \n\
         Description: {description}\n\
         \n\
         Real Data Sources:\n\
         \n\
         Academic Papers (arXiv):\n{papers}\n\
         \n\
         Recent News:\n{news}\n\
         \n\
         GitHub Projects:\n{repos}\n\
         \n\
         Please provide:\n\
         1. Current state analysis with specific statistics from the data\n\
         2. Key trends and developments identified in the sources\n\
         3. Major players and organizations mentioned\n\
         4. Technical innovations and breakthroughs\n\
         5. Market dynamics and growth patterns\n\
         6. Confidence assessment based on data quality and sources\n\
         \n\
         Focus on factual insights derived from the actual data provided.\n\
         Provide specific numbers and statistics where available.",
        title = task.title,
        description = task.description,
        papers = section(ecosystem_core::SourceKind::Papers)?,
        news = section(ecosystem_core::SourceKind::News)?,
        repos = section(ecosystem_core::SourceKind::Repos)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecosystem_core::{Repo, ResearchBundle};

    #[test]
    fn prompt_embeds_capped_preview_by_family() {
        let bundle = ResearchBundle {
            search_terms: vec!["robotics technology".into()],
            repos: (0..5)
                .map(|i| Repo {
                    name: format!("org/robot-{i}"),
                    description: String::new(),
                    stars: i,
                    language: "Rust".into(),
                    updated: "2024-05-01T00:00:00Z".into(),
                    url: format!("https://github.com/org/robot-{i}"),
                })
                .collect(),
            ..Default::default()
        };
        let task = Task::new("task_1_1", "Robotics", "warehouse automation");
        let prompt = research_prompt(&task, &bundle.preview(PREVIEW_PER_SOURCE)).unwrap();

        assert!(prompt.contains("comprehensive research analysis for: Robotics"));
        assert!(prompt.contains("org/robot-2"));
        assert!(!prompt.contains("org/robot-3"));
        assert!(prompt.contains("Academic Papers (arXiv):\n[]"));
    }
}
