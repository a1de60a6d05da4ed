use std::fmt::Write;

use crate::workflow::WorkflowResult;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Render a workflow result as a markdown report.
///
/// Output depends only on `result`; the "Generated" line uses the workflow's
/// finish time (or its start time for an unfinished result).
pub fn render_report(result: &WorkflowResult) -> String {
    let mut output = String::new();
    let metrics = &result.metrics;
    let generated = result.finished_at.unwrap_or(result.started_at);

    let research = result.research();
    let analysis = result.analysis();
    let innovation = result.innovation();
    let environment = result.environment();
    let counts = research.map(|output| output.source_counts).unwrap_or_default();

    writeln!(output, "# Research & Innovation Report: {}", result.title).ok();
    writeln!(output).ok();
    writeln!(output, "**Generated:** {}", generated.format(TIMESTAMP_FORMAT)).ok();
    writeln!(output, "**Data Sources:** arXiv, news feeds, GitHub").ok();
    writeln!(output).ok();

    writeln!(output, "## Executive Summary").ok();
    writeln!(output, "- **Task ID:** {}", result.task_id).ok();
    writeln!(output, "- **Processing Time:** {:.2} seconds", metrics.total_time_secs).ok();
    let status = if metrics.workflow_success {
        "Completed Successfully"
    } else {
        "Failed"
    };
    writeln!(output, "- **Status:** {status}").ok();
    writeln!(output, "- **Confidence Score:** {}", percent(metrics.confidence_score)).ok();
    if metrics.failed_stages > 0 {
        writeln!(output, "- **Failed Stages:** {}", metrics.failed_stages).ok();
    }
    if let Some(error) = &result.error {
        writeln!(output, "- **Error:** {error}").ok();
    }
    writeln!(output).ok();

    writeln!(output, "## Data Sources Used").ok();
    writeln!(output, "- **Academic Papers:** {} from arXiv", counts.papers).ok();
    writeln!(output, "- **News Articles:** {} recent articles", counts.news).ok();
    writeln!(output, "- **GitHub Projects:** {} repositories", counts.repos).ok();
    writeln!(output).ok();

    section(
        &mut output,
        "Research Findings",
        research.map(|output| output.narrative.as_str()),
        "No research data available",
    );
    section(
        &mut output,
        "Analysis Insights",
        analysis.map(|output| output.insights.as_str()),
        "No analysis insights available",
    );
    section(
        &mut output,
        "Innovation Opportunities",
        innovation.map(|output| output.ideas.as_str()),
        "No innovation ideas available",
    );
    section(
        &mut output,
        "Environment Recommendations",
        environment.map(|output| output.recommendations.as_str()),
        "No environment recommendations available",
    );

    writeln!(output, "## Performance Metrics").ok();
    writeln!(
        output,
        "- **System Health:** {}",
        percent(environment.map(|output| output.metrics.health_score).unwrap_or(0.0))
    )
    .ok();
    writeln!(
        output,
        "- **Data Quality:** {}",
        percent(analysis.map(|output| output.data_quality).unwrap_or(0.0))
    )
    .ok();
    writeln!(
        output,
        "- **Innovation Potential:** {}",
        percent(innovation.map(|output| output.breakthrough_potential).unwrap_or(0.0))
    )
    .ok();
    writeln!(
        output,
        "- **Commercial Viability:** {}",
        percent(innovation.map(|output| output.commercial_viability).unwrap_or(0.0))
    )
    .ok();
    writeln!(output).ok();
    write!(output, "---\n*Generated from live paper, news and repository data*").ok();

    output
}

fn section(output: &mut String, heading: &str, body: Option<&str>, fallback: &str) {
    writeln!(output, "## {heading}").ok();
    let body = body.map(str::trim).filter(|text| !text.is_empty());
    writeln!(output, "{}", body.unwrap_or(fallback)).ok();
    writeln!(output).ok();
}

fn percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{ResearchBundle, SourceCounts};
    use crate::workflow::{
        AnalysisOutput, InnovationOutput, ResearchOutput, StageName, StagePayload, StageResult,
    };
    use chrono::{TimeZone, Utc};

    fn sample() -> WorkflowResult {
        let mut result = WorkflowResult::new("task_1700000000_1", "Quantum computing");
        result.started_at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        result.finished_at = Some(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 42).unwrap());
        result.stages.insert(
            StageName::Research,
            StageResult::success(
                &result.task_id,
                StagePayload::Research(ResearchOutput {
                    narrative: "Qubit fidelity is improving.".into(),
                    bundle: ResearchBundle::default(),
                    confidence: 0.62,
                    source_counts: SourceCounts::new(10, 0, 2),
                    backend_degraded: false,
                }),
                1.0,
            ),
        );
        result.stages.insert(
            StageName::Analysis,
            StageResult::success(
                &result.task_id,
                StagePayload::Analysis(AnalysisOutput {
                    insights: "Hardware is the bottleneck.".into(),
                    data_quality: 0.46,
                    backend_degraded: false,
                }),
                1.0,
            ),
        );
        result.stages.insert(
            StageName::Innovation,
            StageResult::failure(StageName::Innovation, &result.task_id, "language backend call failed: 500"),
        );
        result.metrics.total_time_secs = 42.0;
        result.metrics.confidence_score = 0.62;
        result.metrics.workflow_success = true;
        result.metrics.failed_stages = 1;
        result
    }

    #[test]
    fn sections_appear_in_fixed_order() {
        let report = render_report(&sample());
        let headings = [
            "# Research & Innovation Report",
            "## Executive Summary",
            "## Data Sources Used",
            "## Research Findings",
            "## Analysis Insights",
            "## Innovation Opportunities",
            "## Environment Recommendations",
            "## Performance Metrics",
        ];
        let positions: Vec<usize> = headings
            .iter()
            .map(|heading| report.find(heading).unwrap_or_else(|| panic!("missing {heading}")))
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn report_is_deterministic_and_uses_finish_time() {
        let result = sample();
        let first = render_report(&result);
        assert_eq!(first, render_report(&result));
        assert!(first.contains("**Generated:** 2024-05-01 09:00:42 UTC"));
    }

    #[test]
    fn missing_and_failed_stages_use_fallback_text() {
        let report = render_report(&sample());
        assert!(report.contains("No innovation ideas available"));
        assert!(report.contains("No environment recommendations available"));
        assert!(report.contains("- **Academic Papers:** 10 from arXiv"));
        assert!(report.contains("- **Confidence Score:** 62.0%"));
        assert!(report.contains("- **Data Quality:** 46.0%"));
        assert!(report.contains("- **System Health:** 0.0%"));
        assert!(report.contains("- **Failed Stages:** 1"));
    }
}
