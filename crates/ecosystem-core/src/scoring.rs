//! Heuristic indicators derived from record counts and stage timings.
//!
//! None of these are statistical estimates. Every value returned here lies in
//! `[0, 1]`.

use crate::sources::{SourceCounts, SourceKind};
use crate::workflow::{StageTimings, SystemMetrics};

/// Innovation scores are fixed, not derived from stage content.
pub const BREAKTHROUGH_POTENTIAL: f64 = 0.85;
pub const COMMERCIAL_VIABILITY: f64 = 0.78;

/// Pipeline time budget used for resource utilization.
pub const TARGET_PIPELINE_SECS: f64 = 45.0;
/// Elapsed time after which system health starts to decay.
pub const HEALTH_GRACE_SECS: f64 = 60.0;
pub const HEALTH_FLOOR: f64 = 0.5;
/// Data quality assumed when the Analysis stage produced none.
pub const DEFAULT_DATA_QUALITY: f64 = 0.8;

pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// `min(0.25 * present, 0.75) + min(0.01 * total, 0.25)`.
pub fn research_confidence(counts: &SourceCounts) -> f64 {
    let base = (0.25 * counts.present_kinds() as f64).min(0.75);
    let volume = (0.01 * counts.total() as f64).min(0.25);
    clamp_unit(base + volume)
}

/// Papers weigh most, repositories least.
pub fn data_quality(counts: &SourceCounts) -> f64 {
    let papers = (0.1 * counts.papers as f64).min(0.4);
    let news = (0.05 * counts.news as f64).min(0.3);
    let repos = (0.03 * counts.repos as f64).min(0.3);
    clamp_unit(papers + news + repos)
}

/// Inputs for the Environment stage's synthetic metrics.
#[derive(Debug, Clone, Default)]
pub struct SystemMetricInputs {
    pub timings: StageTimings,
    /// Prior stages whose result is error-shaped.
    pub error_count: usize,
    pub prior_data_quality: Option<f64>,
    /// Counts from the Research bundle, when Research succeeded.
    pub research_counts: Option<SourceCounts>,
}

pub fn system_health(total_elapsed: f64, error_count: usize) -> f64 {
    let overrun = (total_elapsed - HEALTH_GRACE_SECS).max(0.0);
    let health = 1.0 - overrun * 0.01 - error_count as f64 * 0.1;
    clamp_unit(health.max(HEALTH_FLOOR))
}

pub fn optimization_score(prior_data_quality: f64) -> f64 {
    clamp_unit((prior_data_quality + 0.1).min(1.0))
}

pub fn resource_utilization(total_elapsed: f64) -> f64 {
    clamp_unit((TARGET_PIPELINE_SECS / total_elapsed.max(TARGET_PIPELINE_SECS)).min(1.0))
}

pub fn api_success_rate(counts: Option<&SourceCounts>) -> f64 {
    let succeeded = counts.map(SourceCounts::present_kinds).unwrap_or(0);
    clamp_unit(succeeded as f64 / SourceKind::ALL.len() as f64)
}

pub fn system_metrics(inputs: &SystemMetricInputs) -> SystemMetrics {
    let total = inputs.timings.total().max(0.0);
    let data_quality = clamp_unit(inputs.prior_data_quality.unwrap_or(DEFAULT_DATA_QUALITY));

    SystemMetrics {
        health_score: system_health(total, inputs.error_count),
        optimization_score: optimization_score(data_quality),
        resource_utilization: resource_utilization(total),
        api_success_rate: api_success_rate(inputs.research_counts.as_ref()),
        data_quality,
        response_times: inputs.timings,
        total_elapsed_secs: total,
        error_count: inputs.error_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn empty_bundle_confidence_is_zero() {
        assert_eq!(research_confidence(&SourceCounts::default()), 0.0);
    }

    #[test]
    fn confidence_combines_presence_and_volume() {
        // 2 families present, 12 items: 0.5 + 0.12
        assert!(approx(research_confidence(&SourceCounts::new(10, 0, 2)), 0.62));
        // saturates at 0.75 + 0.25
        assert!(approx(research_confidence(&SourceCounts::new(40, 40, 40)), 1.0));
    }

    #[test]
    fn confidence_is_monotonic_in_item_count() {
        let mut previous = 0.0;
        for papers in 1..60 {
            let score = research_confidence(&SourceCounts::new(papers, 1, 0));
            assert!(score >= previous, "dropped at {papers}");
            assert!((0.0..=1.0).contains(&score));
            previous = score;
        }
    }

    #[test]
    fn data_quality_caps_each_source() {
        assert!(approx(data_quality(&SourceCounts::new(2, 2, 10)), 0.2 + 0.1 + 0.3));
        assert!(approx(data_quality(&SourceCounts::new(100, 100, 100)), 1.0));
        assert_eq!(data_quality(&SourceCounts::default()), 0.0);
    }

    #[test]
    fn health_decays_after_grace_period_and_floors() {
        assert!(approx(system_health(30.0, 0), 1.0));
        assert!(approx(system_health(70.0, 1), 0.8));
        assert!(approx(system_health(500.0, 3), HEALTH_FLOOR));
    }

    #[test]
    fn utilization_is_full_under_target() {
        assert!(approx(resource_utilization(0.0), 1.0));
        assert!(approx(resource_utilization(30.0), 1.0));
        assert!(approx(resource_utilization(90.0), 0.5));
    }

    #[test]
    fn metrics_default_when_prior_stages_are_missing() {
        let metrics = system_metrics(&SystemMetricInputs {
            error_count: 1,
            ..Default::default()
        });
        assert!(approx(metrics.health_score, 0.9));
        assert!(approx(metrics.optimization_score, 0.9));
        assert_eq!(metrics.api_success_rate, 0.0);
        assert!(approx(metrics.resource_utilization, 1.0));
    }

    #[test]
    fn api_success_rate_counts_present_families() {
        let counts = SourceCounts::new(3, 0, 1);
        assert!(approx(api_success_rate(Some(&counts)), 2.0 / 3.0));
    }

    #[test]
    fn every_metric_stays_in_unit_interval() {
        for total in [0.0, 10.0, 59.9, 61.0, 1_000.0] {
            for errors in 0..4 {
                let metrics = system_metrics(&SystemMetricInputs {
                    timings: StageTimings {
                        research: total,
                        analysis: 0.0,
                        innovation: 0.0,
                    },
                    error_count: errors,
                    prior_data_quality: Some(0.95),
                    research_counts: Some(SourceCounts::new(1, 1, 1)),
                });
                for value in [
                    metrics.health_score,
                    metrics.optimization_score,
                    metrics.resource_utilization,
                    metrics.api_success_rate,
                    metrics.data_quality,
                ] {
                    assert!((0.0..=1.0).contains(&value));
                }
            }
        }
    }
}
