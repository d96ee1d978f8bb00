//! Recommendation cycle runner
//!
//! Fetches sample windows for many workloads concurrently, bounds each fetch
//! with a timeout and runs the recommender on whatever arrived. A workload
//! whose samples cannot be fetched is reported as skipped for the cycle; the
//! runner never retries.

use crate::models::{ResourceDimension, WorkloadRef, WorkloadSamples};
use crate::observability::{RecommenderMetrics, StructuredLogger};
use crate::recommender::{Recommendation, ResourceRecommender};
use crate::sources::SampleSource;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

/// Default bound on a single sample fetch
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of workloads processed at once
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Configuration for the runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Maximum time a sample fetch may take before the workload is skipped
    pub fetch_timeout: Duration,
    /// Workloads recommended concurrently
    pub max_concurrency: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// Result of one workload in a cycle
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub workload: WorkloadRef,
    pub recommendation: Option<Recommendation>,
    pub skipped_reason: Option<String>,
    pub duration_us: u64,
}

/// Drives the recommender over a set of workloads
pub struct RecommendationRunner {
    recommender: Arc<ResourceRecommender>,
    source: Arc<dyn SampleSource>,
    config: RunnerConfig,
    metrics: RecommenderMetrics,
    logger: StructuredLogger,
}

impl RecommendationRunner {
    pub fn new(
        recommender: Arc<ResourceRecommender>,
        source: Arc<dyn SampleSource>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            recommender,
            source,
            config,
            metrics: RecommenderMetrics::new(),
            logger: StructuredLogger::new("recommendation-runner"),
        }
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Recommend every workload; outcomes are returned in input order
    pub async fn run(&self, workloads: Vec<WorkloadRef>, now: DateTime<Utc>) -> Vec<RunOutcome> {
        info!(
            workloads = workloads.len(),
            concurrency = self.config.max_concurrency,
            "Starting recommendation cycle"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        for (index, workload) in workloads.iter().cloned().enumerate() {
            let semaphore = semaphore.clone();
            let recommender = self.recommender.clone();
            let source = self.source.clone();
            let timeout = self.config.fetch_timeout;
            tasks.spawn(async move {
                // The semaphore lives as long as the cycle and is never closed.
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome =
                    recommend_one(&recommender, source.as_ref(), workload, timeout, now).await;
                (index, outcome)
            });
        }

        let mut outcomes: Vec<Option<RunOutcome>> = vec![None; workloads.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(e) => debug!(error = %e, "Recommendation task did not complete"),
            }
        }

        let outcomes: Vec<RunOutcome> = outcomes
            .into_iter()
            .zip(workloads)
            .map(|(outcome, workload)| {
                outcome.unwrap_or_else(|| RunOutcome {
                    workload,
                    recommendation: None,
                    skipped_reason: Some("recommendation task aborted".to_string()),
                    duration_us: 0,
                })
            })
            .collect();

        for outcome in &outcomes {
            self.metrics.observe_latency(outcome.duration_us as f64 / 1e6);
            match (&outcome.recommendation, &outcome.skipped_reason) {
                (Some(recommendation), _) => {
                    self.metrics.record(recommendation);
                    self.logger.log_recommendation(recommendation, outcome.duration_us);
                }
                (None, Some(reason)) => {
                    self.metrics.inc_workloads_skipped();
                    self.logger.log_skipped(&outcome.workload, reason);
                }
                (None, None) => {}
            }
        }

        info!(
            recommended = outcomes.iter().filter(|o| o.recommendation.is_some()).count(),
            skipped = outcomes.iter().filter(|o| o.skipped_reason.is_some()).count(),
            "Recommendation cycle finished"
        );
        outcomes
    }
}

async fn recommend_one(
    recommender: &ResourceRecommender,
    source: &dyn SampleSource,
    workload: WorkloadRef,
    timeout: Duration,
    now: DateTime<Utc>,
) -> RunOutcome {
    let start = Instant::now();
    let fetched = tokio::try_join!(
        fetch(recommender, source, &workload, ResourceDimension::Cpu, timeout, now),
        fetch(recommender, source, &workload, ResourceDimension::Memory, timeout, now),
    );

    let (recommendation, skipped_reason) = match fetched {
        Ok((cpu, memory)) => {
            let samples = WorkloadSamples { cpu, memory };
            (Some(recommender.recommend(&workload, &samples, now)), None)
        }
        Err(e) => (None, Some(format!("{:#}", e))),
    };

    RunOutcome {
        workload,
        recommendation,
        skipped_reason,
        duration_us: start.elapsed().as_micros() as u64,
    }
}

async fn fetch(
    recommender: &ResourceRecommender,
    source: &dyn SampleSource,
    workload: &WorkloadRef,
    dimension: ResourceDimension,
    timeout: Duration,
    now: DateTime<Utc>,
) -> Result<Vec<crate::models::Sample>> {
    let query = recommender.sample_query(dimension, now);
    match tokio::time::timeout(timeout, source.fetch(workload, &query)).await {
        Ok(result) => result.map_err(|e| e.context(format!("fetching {} samples", dimension))),
        Err(_) => Err(anyhow!(
            "fetching {} samples timed out after {:?}",
            dimension,
            timeout
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sample;
    use crate::sizing::SampleQuery;
    use crate::sources::{async_trait, InMemorySampleSource};
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap()
    }

    fn recommender() -> Arc<ResourceRecommender> {
        Arc::new(ResourceRecommender::new(&HashMap::new(), None).unwrap())
    }

    fn samples(value: f64) -> Vec<Sample> {
        (0..30)
            .map(|i| Sample::new(now() - chrono::Duration::minutes(i), value))
            .collect()
    }

    /// Source that never answers
    struct StalledSource;

    #[async_trait]
    impl SampleSource for StalledSource {
        async fn fetch(
            &self,
            _workload: &WorkloadRef,
            _query: &SampleQuery,
        ) -> Result<Vec<Sample>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_runs_workloads_in_input_order() {
        let source = Arc::new(InMemorySampleSource::new());
        let names = ["a", "b", "c", "d"];
        for (i, name) in names.iter().enumerate() {
            let w = WorkloadRef::new("default", *name);
            source.insert(&w, ResourceDimension::Cpu, samples(0.5 * (i + 1) as f64));
            source.insert(&w, ResourceDimension::Memory, samples(256.0 * 1024.0 * 1024.0));
        }

        let runner = RecommendationRunner::new(
            recommender(),
            source,
            RunnerConfig {
                max_concurrency: 2,
                ..Default::default()
            },
        );
        let workloads: Vec<_> = names.iter().map(|n| WorkloadRef::new("default", *n)).collect();
        let outcomes = runner.run(workloads.clone(), now()).await;

        assert_eq!(outcomes.len(), 4);
        let mut previous = 0.0;
        for (outcome, workload) in outcomes.iter().zip(&workloads) {
            assert_eq!(&outcome.workload, workload);
            let cpu = outcome.recommendation.as_ref().unwrap().cpu_cores().unwrap();
            assert!(cpu > previous);
            previous = cpu;
        }
    }

    #[tokio::test]
    async fn test_unknown_workload_is_skipped() {
        let runner = RecommendationRunner::new(
            recommender(),
            Arc::new(InMemorySampleSource::new()),
            RunnerConfig::default(),
        );
        let outcomes = runner.run(vec![WorkloadRef::new("default", "ghost")], now()).await;
        assert!(outcomes[0].recommendation.is_none());
        assert!(outcomes[0].skipped_reason.as_ref().unwrap().contains("no samples"));
    }

    #[tokio::test]
    async fn test_fetch_timeout_skips_workload() {
        let runner = RecommendationRunner::new(
            recommender(),
            Arc::new(StalledSource),
            RunnerConfig {
                fetch_timeout: Duration::from_millis(50),
                ..Default::default()
            },
        );
        let outcomes = runner.run(vec![WorkloadRef::new("default", "slow")], now()).await;
        assert!(outcomes[0].skipped_reason.as_ref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_empty_dimension_still_recommends_other() {
        let source = Arc::new(InMemorySampleSource::new());
        let w = WorkloadRef::new("default", "cpu-only");
        source.insert(&w, ResourceDimension::Cpu, samples(1.0));

        let runner = RecommendationRunner::new(recommender(), source, RunnerConfig::default());
        let outcomes = runner.run(vec![w], now()).await;
        let recommendation = outcomes[0].recommendation.as_ref().unwrap();
        assert!(recommendation.cpu.is_ok());
        assert!(recommendation.memory.is_err());
    }
}
