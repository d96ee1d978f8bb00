//! Observability infrastructure for the recommender
//!
//! Provides:
//! - Prometheus metrics (recommendation latency, outcomes, OOM floors, catalog overflows)
//! - Structured logging of recommendation events with tracing

use crate::models::{ResourceDimension, WorkloadRef};
use crate::recommender::Recommendation;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram,
    IntCounter, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for per-workload recommendation latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<RecommenderMetricsInner> = OnceLock::new();

struct RecommenderMetricsInner {
    recommendation_latency_seconds: Histogram,
    recommendations_generated: IntCounter,
    workloads_skipped: IntCounter,
    insufficient_data: IntCounterVec,
    oom_floor_applied: IntCounter,
    specification_quantized: IntCounter,
    catalog_exceeded: IntCounter,
}

impl RecommenderMetricsInner {
    fn new() -> Self {
        Self {
            recommendation_latency_seconds: register_histogram!(
                "resource_recommender_latency_seconds",
                "Time spent fetching samples and computing one workload recommendation",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register recommendation_latency_seconds"),

            recommendations_generated: register_int_counter!(
                "resource_recommender_recommendations_total",
                "Recommendations produced with both dimensions estimated"
            )
            .expect("Failed to register recommendations_total"),

            workloads_skipped: register_int_counter!(
                "resource_recommender_workloads_skipped_total",
                "Workloads skipped because samples could not be fetched"
            )
            .expect("Failed to register workloads_skipped_total"),

            insufficient_data: register_int_counter_vec!(
                "resource_recommender_insufficient_data_total",
                "Dimensions that had no samples in their history window",
                &["dimension"]
            )
            .expect("Failed to register insufficient_data_total"),

            oom_floor_applied: register_int_counter!(
                "resource_recommender_oom_floor_applied_total",
                "Memory recommendations raised by the OOM protection floor"
            )
            .expect("Failed to register oom_floor_applied_total"),

            specification_quantized: register_int_counter!(
                "resource_recommender_specification_quantized_total",
                "Recommendations rounded to a specification tier"
            )
            .expect("Failed to register specification_quantized_total"),

            catalog_exceeded: register_int_counter!(
                "resource_recommender_catalog_exceeded_total",
                "Recommendations larger than every specification tier"
            )
            .expect("Failed to register catalog_exceeded_total"),
        }
    }
}

/// Recommender metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the same
/// underlying metrics.
#[derive(Clone)]
pub struct RecommenderMetrics {
    _private: (),
}

impl Default for RecommenderMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RecommenderMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(RecommenderMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &RecommenderMetricsInner {
        GLOBAL_METRICS.get_or_init(RecommenderMetricsInner::new)
    }

    pub fn observe_latency(&self, duration_secs: f64) {
        self.inner().recommendation_latency_seconds.observe(duration_secs);
    }

    pub fn inc_workloads_skipped(&self) {
        self.inner().workloads_skipped.inc();
    }

    /// Count every outcome carried by a finished recommendation
    pub fn record(&self, recommendation: &Recommendation) {
        let inner = self.inner();
        if recommendation.is_complete() {
            inner.recommendations_generated.inc();
        }
        for error in recommendation.errors() {
            inner
                .insufficient_data
                .with_label_values(&[error.dimension.as_str()])
                .inc();
        }
        if recommendation.oom_floor_applied {
            inner.oom_floor_applied.inc();
        }
        if recommendation.quantization.is_applied() {
            inner.specification_quantized.inc();
        }
        if recommendation.quantization.exceeds_catalog() {
            inner.catalog_exceeded.inc();
        }
    }

    pub fn recommendations_generated(&self) -> u64 {
        self.inner().recommendations_generated.get()
    }

    pub fn insufficient_data(&self, dimension: ResourceDimension) -> u64 {
        self.inner()
            .insufficient_data
            .with_label_values(&[dimension.as_str()])
            .get()
    }
}

/// Render every registered metric in the Prometheus text format
pub fn gather_text() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Structured logger for recommendation events
#[derive(Clone)]
pub struct StructuredLogger {
    source: String,
}

impl StructuredLogger {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Log a finished recommendation and any per-dimension failures
    pub fn log_recommendation(&self, recommendation: &Recommendation, duration_us: u64) {
        for error in recommendation.errors() {
            warn!(
                event = "insufficient_data",
                source = %self.source,
                workload = %recommendation.workload,
                dimension = %error.dimension,
                "No samples in history window, dimension not recommended"
            );
        }

        if let Some(warning) = recommendation.exceeds_catalog_warning() {
            warn!(
                event = "catalog_exceeded",
                source = %self.source,
                workload = %recommendation.workload,
                entry = %warning.entry,
                cpu_cores = warning.cpu_cores,
                memory_bytes = warning.memory_bytes,
                "Recommendation exceeds the specification catalog"
            );
        }

        if recommendation.oom_floor_applied {
            info!(
                event = "oom_floor_applied",
                source = %self.source,
                workload = %recommendation.workload,
                floor_bytes = recommendation.oom_floor.unwrap_or_default(),
                "OOM protection raised memory recommendation"
            );
        }

        info!(
            event = "recommendation_generated",
            source = %self.source,
            workload = %recommendation.workload,
            cpu_cores = ?recommendation.cpu_cores(),
            memory_bytes = ?recommendation.memory_bytes(),
            specification = ?recommendation.quantization.specification().map(|s| s.to_string()),
            duration_us = duration_us,
            "Generated resource recommendation"
        );
    }

    /// Log a workload skipped for this cycle
    pub fn log_skipped(&self, workload: &WorkloadRef, reason: &str) {
        warn!(
            event = "workload_skipped",
            source = %self.source,
            workload = %workload,
            reason = %reason,
            "Workload skipped for this cycle"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_handle() {
        let metrics = RecommenderMetrics::new();
        metrics.observe_latency(0.001);
        metrics.inc_workloads_skipped();
        let text = gather_text().unwrap();
        assert!(text.contains("resource_recommender_workloads_skipped_total"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-runner");
        assert_eq!(logger.source, "test-runner");
    }
}
