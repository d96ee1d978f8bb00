//! Collaborator interfaces consumed by the recommender
//!
//! The sizing core never fetches data itself. Utilization samples come from a
//! `SampleSource` and OOM events from an `OomRecorder`; both have in-memory
//! implementations used by the CLI and tests.

mod oom_recorder;
mod samples;

pub use oom_recorder::InMemoryOomRecorder;
pub use samples::InMemorySampleSource;

use crate::models::{OomEvent, Sample, WorkloadRef};
use crate::sizing::SampleQuery;
use anyhow::Result;
use chrono::{DateTime, Utc};

pub use async_trait::async_trait;

/// Supplies utilization samples for a workload
#[async_trait]
pub trait SampleSource: Send + Sync {
    /// Fetch the samples of `query.dimension` between `query.start` and `query.end`
    async fn fetch(&self, workload: &WorkloadRef, query: &SampleQuery) -> Result<Vec<Sample>>;
}

/// Read-only view of recorded OOM events
pub trait OomRecorder: Send + Sync {
    /// Events for `workload` with `since <= timestamp <= until`
    fn events(
        &self,
        workload: &WorkloadRef,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Vec<OomEvent>;
}
