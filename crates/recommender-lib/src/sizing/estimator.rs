//! Percentile estimator
//!
//! Feeds the history window of one dimension into a fresh decaying histogram,
//! reads the target percentile and applies margin and target utilization:
//! `raw = percentile × (1 + margin) / target_utilization`.

use super::histogram::{half_life_for, DecayingHistogram};
use crate::error::InsufficientDataError;
use crate::models::{ResourceDimension, Sample};
use crate::params::DimensionParams;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Window the sample source is asked to cover for one dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleQuery {
    pub dimension: ResourceDimension,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Resolution samples should be fetched at
    pub step: std::time::Duration,
}

impl SampleQuery {
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}

/// Output of a single dimension estimate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    /// Histogram value at the target percentile
    pub percentile_value: f64,
    /// Percentile scaled by margin and target utilization
    pub raw: f64,
    /// Samples that fell inside the history window
    pub samples_observed: usize,
}

/// Estimates one resource dimension from its sample window
#[derive(Debug, Clone)]
pub struct PercentileEstimator {
    params: DimensionParams,
}

impl PercentileEstimator {
    pub fn new(params: DimensionParams) -> Self {
        Self { params }
    }

    pub fn dimension(&self) -> ResourceDimension {
        self.params.dimension
    }

    /// The window this estimator reads when run at `now`
    pub fn query(&self, now: DateTime<Utc>) -> SampleQuery {
        let start = chrono::Duration::from_std(self.params.history_length)
            .ok()
            .and_then(|history| now.checked_sub_signed(history))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        SampleQuery {
            dimension: self.dimension(),
            start,
            end: now,
            step: self.params.sample_interval,
        }
    }

    /// An empty histogram shaped for this dimension
    pub fn histogram(&self) -> DecayingHistogram {
        DecayingHistogram::new(
            self.params.histogram,
            half_life_for(self.params.history_length),
        )
    }

    /// Observe every in-window sample, in order; returns how many were used
    pub fn ingest(
        &self,
        histogram: &mut DecayingHistogram,
        samples: &[Sample],
        now: DateTime<Utc>,
    ) -> usize {
        let window = self.query(now);
        let mut observed = 0;
        for sample in samples.iter().filter(|s| window.contains(s.timestamp)) {
            histogram.observe(sample.value, sample.timestamp);
            observed += 1;
        }
        if observed < samples.len() {
            debug!(
                dimension = %self.dimension(),
                dropped = samples.len() - observed,
                "Ignored samples outside the history window"
            );
        }
        observed
    }

    fn scale(&self, percentile_value: f64) -> f64 {
        percentile_value * (1.0 + self.params.margin_fraction) / self.params.target_utilization
    }

    /// Build a histogram from `samples` and estimate the recommended request
    pub fn estimate(
        &self,
        samples: &[Sample],
        now: DateTime<Utc>,
    ) -> Result<Estimate, InsufficientDataError> {
        let mut histogram = self.histogram();
        let samples_observed = self.ingest(&mut histogram, samples, now);
        let percentile_value = histogram.percentile(self.params.percentile)?;
        let raw = self.scale(percentile_value);

        debug!(
            dimension = %self.dimension(),
            samples = samples_observed,
            percentile = self.params.percentile,
            percentile_value = percentile_value,
            raw = raw,
            "Estimated resource request"
        );

        Ok(Estimate {
            percentile_value,
            raw,
            samples_observed,
        })
    }
}
