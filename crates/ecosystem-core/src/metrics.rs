use anyhow::Result;
use once_cell::sync::OnceCell;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::{KeyValue, global};
use tracing::info;

use crate::workflow::StageName;

struct PipelineMetrics {
    stage_runs: Counter<u64>,
    stage_duration_ms: Histogram<f64>,
    workflow_runs: Counter<u64>,
}

static METRICS: OnceCell<PipelineMetrics> = OnceCell::new();

fn handles() -> &'static PipelineMetrics {
    METRICS.get_or_init(|| {
        let meter: Meter = global::meter("ecosystem.pipeline");
        PipelineMetrics {
            stage_runs: meter
                .u64_counter("stage_runs_total")
                .with_description("Total stage executions by stage and status")
                .init(),
            stage_duration_ms: meter
                .f64_histogram("stage_duration_ms")
                .with_description("Stage runtime in milliseconds")
                .init(),
            workflow_runs: meter
                .u64_counter("workflow_runs_total")
                .with_description("Total workflow executions by status")
                .init(),
        }
    })
}

/// Hint to operators that OTEL metrics export can be configured externally.
pub fn init_metrics_from_env(service_name: &str) -> Result<()> {
    if std::env::var("ECOSYSTEM_OTEL_METRICS_ENDPOINT").is_ok() {
        info!(
            target = "telemetry",
            "ECOSYSTEM_OTEL_METRICS_ENDPOINT detected for {service_name}. Configure an OTLP meter provider in your deployment to export pipeline metrics."
        );
    }
    Ok(())
}

/// Record a stage execution (no-op if no provider installed).
pub fn record_stage_metrics(stage: StageName, succeeded: bool, duration_ms: f64) {
    let metrics = handles();
    let attrs = [
        KeyValue::new("stage", stage.as_str()),
        KeyValue::new("status", if succeeded { "success" } else { "error" }),
    ];

    metrics.stage_runs.add(1, &attrs);
    metrics.stage_duration_ms.record(duration_ms, &attrs[..1]);
}

pub fn record_workflow_metrics(succeeded: bool) {
    let status = if succeeded { "success" } else { "failure" };
    handles()
        .workflow_runs
        .add(1, &[KeyValue::new("status", status)]);
}
