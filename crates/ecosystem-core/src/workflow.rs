//! Stage and workflow result structures shared by the agents, the store and
//! the report renderer.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::sources::{ResearchBundle, SourceCounts};

/// The four fixed pipeline stages, declared in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Research,
    Analysis,
    Innovation,
    Environment,
}

impl StageName {
    pub const ORDER: [StageName; 4] = [
        StageName::Research,
        StageName::Analysis,
        StageName::Innovation,
        StageName::Environment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Research => "research",
            StageName::Analysis => "analysis",
            StageName::Innovation => "innovation",
            StageName::Environment => "environment",
        }
    }

    pub fn agent_id(&self) -> &'static str {
        match self {
            StageName::Research => "research_agent",
            StageName::Analysis => "analysis_agent",
            StageName::Innovation => "innovation_agent",
            StageName::Environment => "environment_agent",
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchOutput {
    pub narrative: String,
    pub bundle: ResearchBundle,
    pub confidence: f64,
    pub source_counts: SourceCounts,
    pub backend_degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub insights: String,
    pub data_quality: f64,
    pub backend_degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InnovationOutput {
    pub ideas: String,
    pub breakthrough_potential: f64,
    pub commercial_viability: f64,
    pub backend_degraded: bool,
}

/// Elapsed seconds of the three stages preceding Environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTimings {
    pub research: f64,
    pub analysis: f64,
    pub innovation: f64,
}

impl StageTimings {
    pub fn total(&self) -> f64 {
        self.research + self.analysis + self.innovation
    }
}

/// Synthetic health indicators computed by the Environment stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub health_score: f64,
    pub optimization_score: f64,
    pub resource_utilization: f64,
    pub api_success_rate: f64,
    pub data_quality: f64,
    pub response_times: StageTimings,
    pub total_elapsed_secs: f64,
    pub error_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentOutput {
    pub recommendations: String,
    pub metrics: SystemMetrics,
    pub backend_degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StagePayload {
    Research(ResearchOutput),
    Analysis(AnalysisOutput),
    Innovation(InnovationOutput),
    Environment(EnvironmentOutput),
}

impl StagePayload {
    pub fn stage(&self) -> StageName {
        match self {
            StagePayload::Research(_) => StageName::Research,
            StagePayload::Analysis(_) => StageName::Analysis,
            StagePayload::Innovation(_) => StageName::Innovation,
            StagePayload::Environment(_) => StageName::Environment,
        }
    }

    /// Whether the narrative is the unconfigured-backend sentinel.
    pub fn backend_degraded(&self) -> bool {
        match self {
            StagePayload::Research(output) => output.backend_degraded,
            StagePayload::Analysis(output) => output.backend_degraded,
            StagePayload::Innovation(output) => output.backend_degraded,
            StagePayload::Environment(output) => output.backend_degraded,
        }
    }
}

/// Exactly one of a payload or an error string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Success(StagePayload),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub agent_id: String,
    pub stage: StageName,
    pub task_id: String,
    pub timestamp: DateTime<Utc>,
    /// Absent on the error path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_secs: Option<f64>,
    pub outcome: StageOutcome,
}

impl StageResult {
    pub fn success(task_id: impl Into<String>, payload: StagePayload, elapsed_secs: f64) -> Self {
        let stage = payload.stage();
        Self {
            agent_id: stage.agent_id().to_string(),
            stage,
            task_id: task_id.into(),
            timestamp: Utc::now(),
            elapsed_secs: Some(elapsed_secs),
            outcome: StageOutcome::Success(payload),
        }
    }

    pub fn failure(stage: StageName, task_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            agent_id: stage.agent_id().to_string(),
            stage,
            task_id: task_id.into(),
            timestamp: Utc::now(),
            elapsed_secs: None,
            outcome: StageOutcome::Error(error.into()),
        }
    }

    pub fn payload(&self) -> Option<&StagePayload> {
        match &self.outcome {
            StageOutcome::Success(payload) => Some(payload),
            StageOutcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            StageOutcome::Success(_) => None,
            StageOutcome::Error(err) => Some(err),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error().is_some()
    }

    pub fn research(&self) -> Option<&ResearchOutput> {
        match self.payload()? {
            StagePayload::Research(output) => Some(output),
            _ => None,
        }
    }

    pub fn analysis(&self) -> Option<&AnalysisOutput> {
        match self.payload()? {
            StagePayload::Analysis(output) => Some(output),
            _ => None,
        }
    }

    pub fn innovation(&self) -> Option<&InnovationOutput> {
        match self.payload()? {
            StagePayload::Innovation(output) => Some(output),
            _ => None,
        }
    }

    pub fn environment(&self) -> Option<&EnvironmentOutput> {
        match self.payload()? {
            StagePayload::Environment(output) => Some(output),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_time_secs: f64,
    pub confidence_score: f64,
    pub system_health: f64,
    pub data_sources: SourceCounts,
    pub failed_stages: usize,
    pub workflow_success: bool,
}

/// Aggregated outcome of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub task_id: String,
    pub title: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Insertion order is execution order.
    pub stages: IndexMap<StageName, StageResult>,
    pub metrics: PerformanceMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowResult {
    pub fn new(task_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            title: title.into(),
            started_at: Utc::now(),
            finished_at: None,
            stages: IndexMap::new(),
            metrics: PerformanceMetrics::default(),
            error: None,
        }
    }

    pub fn stage(&self, name: StageName) -> Option<&StageResult> {
        self.stages.get(&name)
    }

    pub fn research(&self) -> Option<&ResearchOutput> {
        self.stage(StageName::Research)?.research()
    }

    pub fn analysis(&self) -> Option<&AnalysisOutput> {
        self.stage(StageName::Analysis)?.analysis()
    }

    pub fn innovation(&self) -> Option<&InnovationOutput> {
        self.stage(StageName::Innovation)?.innovation()
    }

    pub fn environment(&self) -> Option<&EnvironmentOutput> {
        self.stage(StageName::Environment)?.environment()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_result_has_no_payload_or_elapsed() {
        let result = StageResult::failure(StageName::Analysis, "task_1_1", "backend down");
        assert_eq!(result.agent_id, "analysis_agent");
        assert!(result.payload().is_none());
        assert!(result.elapsed_secs.is_none());
        assert_eq!(result.error(), Some("backend down"));

        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("elapsed_secs").is_none());
        assert_eq!(json["outcome"]["error"], "backend down");
        assert!(json["outcome"].get("success").is_none());
    }

    #[test]
    fn success_result_derives_stage_from_payload() {
        let payload = StagePayload::Innovation(InnovationOutput {
            ideas: "ideas".into(),
            breakthrough_potential: 0.85,
            commercial_viability: 0.78,
            backend_degraded: false,
        });
        let result = StageResult::success("task_1_1", payload, 1.5);
        assert_eq!(result.stage, StageName::Innovation);
        assert_eq!(result.agent_id, "innovation_agent");
        assert!(result.error().is_none());
        assert_eq!(result.innovation().map(|o| o.commercial_viability), Some(0.78));
    }

    #[test]
    fn stage_map_round_trips_in_execution_order() {
        let mut result = WorkflowResult::new("task_1_1", "Title");
        for stage in StageName::ORDER {
            result
                .stages
                .insert(stage, StageResult::failure(stage, "task_1_1", "x"));
        }
        let raw = serde_json::to_string(&result).unwrap();
        let back: WorkflowResult = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, result);
        let order: Vec<_> = back.stages.keys().copied().collect();
        assert_eq!(order, StageName::ORDER.to_vec());
    }
}
