//! In-memory OOM event store

use super::OomRecorder;
use crate::models::{OomEvent, WorkloadRef};
use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Maximum events retained per workload
const MAX_EVENTS_PER_WORKLOAD: usize = 256;

/// Concurrent OOM event store keyed by workload
#[derive(Debug, Default)]
pub struct InMemoryOomRecorder {
    events: DashMap<WorkloadRef, Vec<OomEvent>>,
}

impl InMemoryOomRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event, keeping the newest `MAX_EVENTS_PER_WORKLOAD`
    pub fn record(&self, workload: &WorkloadRef, event: OomEvent) {
        let mut entry = self.events.entry(workload.clone()).or_default();
        entry.push(event);
        entry.sort_by_key(|e| e.timestamp);
        if entry.len() > MAX_EVENTS_PER_WORKLOAD {
            let excess = entry.len() - MAX_EVENTS_PER_WORKLOAD;
            entry.drain(0..excess);
        }
    }

    /// Drop events older than `cutoff` for every workload
    pub fn prune_before(&self, cutoff: DateTime<Utc>) {
        self.events.retain(|_, events| {
            events.retain(|e| e.timestamp >= cutoff);
            !events.is_empty()
        });
    }

    pub fn len(&self) -> usize {
        self.events.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OomRecorder for InMemoryOomRecorder {
    fn events(
        &self,
        workload: &WorkloadRef,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Vec<OomEvent> {
        self.events
            .get(workload)
            .map(|events| {
                events
                    .iter()
                    .filter(|e| e.timestamp >= since && e.timestamp <= until)
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }
}
