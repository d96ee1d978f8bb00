//! Workload sample files
//!
//! ```json
//! {
//!   "workloads": [
//!     {
//!       "namespace": "shop",
//!       "workload": "checkout",
//!       "container": "app",
//!       "cpu": [{"timestamp": "2024-06-03T08:59:00Z", "value": 0.42}],
//!       "memory": [{"timestamp": "2024-06-03T08:59:00Z", "value": 314572800}],
//!       "oom_events": [{"timestamp": "2024-06-02T21:10:00Z", "memory_bytes": 524288000}]
//!     }
//!   ]
//! }
//! ```

use anyhow::{Context, Result};
use recommender_lib::sources::{InMemoryOomRecorder, InMemorySampleSource};
use recommender_lib::{OomEvent, Sample, WorkloadRef, WorkloadSamples};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct WorkloadFile {
    pub workloads: Vec<WorkloadEntry>,
}

#[derive(Debug, Deserialize)]
pub struct WorkloadEntry {
    pub namespace: String,
    pub workload: String,
    #[serde(default)]
    pub container: Option<String>,
    #[serde(default)]
    pub cpu: Vec<Sample>,
    #[serde(default)]
    pub memory: Vec<Sample>,
    #[serde(default)]
    pub oom_events: Vec<OomEvent>,
}

impl WorkloadEntry {
    pub fn workload_ref(&self) -> WorkloadRef {
        let workload = WorkloadRef::new(&self.namespace, &self.workload);
        match &self.container {
            Some(container) => workload.with_container(container),
            None => workload,
        }
    }
}

/// Collaborators populated from a workload file
pub struct LoadedWorkloads {
    pub workloads: Vec<WorkloadRef>,
    pub samples: InMemorySampleSource,
    pub oom_events: InMemoryOomRecorder,
}

impl WorkloadFile {
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read workload file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse workload file {}", path.display()))
    }

    pub fn load(self) -> LoadedWorkloads {
        let samples = InMemorySampleSource::new();
        let oom_events = InMemoryOomRecorder::new();
        let mut workloads = Vec::with_capacity(self.workloads.len());

        for entry in self.workloads {
            let workload = entry.workload_ref();
            for event in entry.oom_events {
                oom_events.record(&workload, event);
            }
            samples.insert_workload(
                &workload,
                WorkloadSamples {
                    cpu: entry.cpu,
                    memory: entry.memory,
                },
            );
            workloads.push(workload);
        }

        LoadedWorkloads {
            workloads,
            samples,
            oom_events,
        }
    }
}
