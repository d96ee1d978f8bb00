//! OOM protection floor for memory recommendations

use crate::models::{OomEvent, WorkloadRef};
use crate::params::OomProtectionParams;
use crate::sources::OomRecorder;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Memory value after the OOM floor has been considered
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuardedMemory {
    pub value: f64,
    /// `max(OOM memory) × bump ratio`, when events were found in the window
    pub floor: Option<f64>,
    /// Whether the floor raised the value
    pub applied: bool,
}

/// Raises memory recommendations to at least the last OOM value times a bump ratio
#[derive(Debug, Clone)]
pub struct OomFloorGuard {
    params: OomProtectionParams,
}

impl OomFloorGuard {
    pub fn new(params: OomProtectionParams) -> Self {
        Self { params }
    }

    pub fn is_enabled(&self) -> bool {
        self.params.enabled
    }

    /// Start of the OOM history window ending at `now`
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.params.history_length)
            .ok()
            .and_then(|history| now.checked_sub_signed(history))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Floor implied by the in-window events, if any
    pub fn floor(&self, events: &[OomEvent], now: DateTime<Utc>) -> Option<f64> {
        let start = self.window_start(now);
        events
            .iter()
            .filter(|e| e.timestamp >= start && e.timestamp <= now)
            .map(|e| e.memory_bytes)
            .filter(|m| m.is_finite())
            .reduce(f64::max)
            .map(|peak| peak * self.params.bump_ratio)
    }

    /// Apply the floor to a raw memory estimate given explicit events
    pub fn apply_events(&self, raw: f64, events: &[OomEvent], now: DateTime<Utc>) -> GuardedMemory {
        if !self.params.enabled {
            return GuardedMemory {
                value: raw,
                floor: None,
                applied: false,
            };
        }

        let floor = self.floor(events, now);
        match floor {
            Some(floor) if floor > raw => GuardedMemory {
                value: floor,
                floor: Some(floor),
                applied: true,
            },
            _ => GuardedMemory {
                value: raw,
                floor,
                applied: false,
            },
        }
    }

    /// Apply the floor using events from the recorder; no recorder means no events
    pub fn apply(
        &self,
        raw: f64,
        recorder: Option<&dyn OomRecorder>,
        workload: &WorkloadRef,
        now: DateTime<Utc>,
    ) -> GuardedMemory {
        let events = match (self.params.enabled, recorder) {
            (true, Some(recorder)) => recorder.events(workload, self.window_start(now), now),
            _ => Vec::new(),
        };
        let guarded = self.apply_events(raw, &events, now);
        if guarded.applied {
            debug!(
                workload = %workload,
                raw = raw,
                floor = guarded.value,
                events = events.len(),
                "OOM floor raised memory recommendation"
            );
        }
        guarded
    }
}
