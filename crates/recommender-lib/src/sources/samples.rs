//! In-memory sample source

use super::{async_trait, SampleSource};
use crate::models::{ResourceDimension, Sample, WorkloadRef, WorkloadSamples};
use crate::sizing::SampleQuery;
use anyhow::{bail, Result};
use dashmap::DashMap;

/// Sample series held in memory, keyed by workload and dimension
#[derive(Debug, Default)]
pub struct InMemorySampleSource {
    series: DashMap<(WorkloadRef, ResourceDimension), Vec<Sample>>,
}

impl InMemorySampleSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append samples for one dimension of a workload
    pub fn insert(
        &self,
        workload: &WorkloadRef,
        dimension: ResourceDimension,
        samples: Vec<Sample>,
    ) {
        self.series
            .entry((workload.clone(), dimension))
            .or_default()
            .extend(samples);
    }

    /// Append both dimensions at once
    pub fn insert_workload(&self, workload: &WorkloadRef, samples: WorkloadSamples) {
        self.insert(workload, ResourceDimension::Cpu, samples.cpu);
        self.insert(workload, ResourceDimension::Memory, samples.memory);
    }

    pub fn contains(&self, workload: &WorkloadRef) -> bool {
        self.series.contains_key(&(workload.clone(), ResourceDimension::Cpu))
            || self.series.contains_key(&(workload.clone(), ResourceDimension::Memory))
    }
}

#[async_trait]
impl SampleSource for InMemorySampleSource {
    async fn fetch(&self, workload: &WorkloadRef, query: &SampleQuery) -> Result<Vec<Sample>> {
        if !self.contains(workload) {
            bail!("no samples known for workload {}", workload);
        }
        Ok(self
            .series
            .get(&(workload.clone(), query.dimension))
            .map(|series| {
                series
                    .iter()
                    .filter(|s| query.contains(s.timestamp))
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    #[tokio::test]
    async fn test_fetch_filters_window_and_dimension() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let source = InMemorySampleSource::new();
        let w = WorkloadRef::new("default", "api");
        source.insert(
            &w,
            ResourceDimension::Cpu,
            vec![
                Sample::new(now - chrono::Duration::hours(3), 1.0),
                Sample::new(now - chrono::Duration::minutes(30), 2.0),
            ],
        );

        let query = SampleQuery {
            dimension: ResourceDimension::Cpu,
            start: now - chrono::Duration::hours(1),
            end: now,
            step: Duration::from_secs(60),
        };
        let samples = source.fetch(&w, &query).await.unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, 2.0);

        let memory = SampleQuery {
            dimension: ResourceDimension::Memory,
            ..query
        };
        assert!(source.fetch(&w, &memory).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_workload_is_an_error() {
        let source = InMemorySampleSource::new();
        let query = SampleQuery {
            dimension: ResourceDimension::Cpu,
            start: Utc::now(),
            end: Utc::now(),
            step: Duration::from_secs(60),
        };
        assert!(source.fetch(&WorkloadRef::new("a", "b"), &query).await.is_err());
    }
}
