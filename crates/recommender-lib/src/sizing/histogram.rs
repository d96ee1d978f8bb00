//! Exponentially decaying linear histogram
//!
//! Fixed-width buckets over `[0, max_value]`. Each observation is weighted by
//! `2^((t - reference) / half_life)`, which is the same as discounting every
//! earlier observation by `0.5^(Δt / half_life)` but touches one bucket per
//! insert. When the exponent grows large the histogram is rescaled and the
//! reference moved forward so weights stay within f64 range.

use crate::error::{CheckpointError, InsufficientDataError};
use crate::params::HistogramOptions;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Number of half-lives that fit into one history window
pub const HALF_LIVES_PER_HISTORY: f64 = 7.0;

/// Rescale once new samples would weigh more than 2^MAX_DECAY_EXPONENT
const MAX_DECAY_EXPONENT: f64 = 100.0;

/// Half-life used for a given history length
pub fn half_life_for(history_length: Duration) -> Duration {
    history_length.div_f64(HALF_LIVES_PER_HISTORY)
}

/// Bucketed frequency estimator with recency weighting
#[derive(Debug, Clone)]
pub struct DecayingHistogram {
    options: HistogramOptions,
    half_life_secs: f64,
    weights: Vec<f64>,
    total_weight: f64,
    reference: Option<DateTime<Utc>>,
}

impl DecayingHistogram {
    pub fn new(options: HistogramOptions, half_life: Duration) -> Self {
        Self {
            options,
            half_life_secs: half_life.as_secs_f64().max(f64::MIN_POSITIVE),
            weights: vec![0.0; options.bucket_count()],
            total_weight: 0.0,
            reference: None,
        }
    }

    pub fn options(&self) -> &HistogramOptions {
        &self.options
    }

    pub fn bucket_count(&self) -> usize {
        self.weights.len()
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    pub fn is_empty(&self) -> bool {
        self.total_weight <= 0.0
    }

    /// Index of the bucket holding `value`; out-of-range values are clamped
    pub fn bucket_index(&self, value: f64) -> usize {
        // NaN and negatives fall through to the first bucket.
        if !(value > 0.0) {
            return 0;
        }
        let index = self.options.bucket_position(value).floor();
        (index as usize).min(self.weights.len() - 1)
    }

    /// Lower boundary of a bucket
    pub fn bucket_start(&self, index: usize) -> f64 {
        index as f64 * self.options.bucket_size
    }

    /// Add one observation of `value` at `timestamp`
    pub fn observe(&mut self, value: f64, timestamp: DateTime<Utc>) {
        self.observe_weighted(value, 1.0, timestamp);
    }

    /// Add an observation carrying `weight` units at `timestamp`
    pub fn observe_weighted(&mut self, value: f64, weight: f64, timestamp: DateTime<Utc>) {
        if !(weight > 0.0) || !weight.is_finite() {
            return;
        }

        let reference = *self.reference.get_or_insert(timestamp);
        let mut exponent = self.exponent(reference, timestamp);
        if exponent > MAX_DECAY_EXPONENT {
            self.shift_reference(timestamp);
            exponent = 0.0;
        }

        let decayed = weight * exponent.exp2();
        let index = self.bucket_index(value);
        self.weights[index] += decayed;
        self.total_weight += decayed;
    }

    fn exponent(&self, reference: DateTime<Utc>, timestamp: DateTime<Utc>) -> f64 {
        let elapsed = (timestamp - reference)
            .num_microseconds()
            .map(|us| us as f64 / 1e6)
            .unwrap_or_else(|| (timestamp - reference).num_seconds() as f64);
        elapsed / self.half_life_secs
    }

    /// Rescale all weights so that `timestamp` becomes the new reference
    fn shift_reference(&mut self, timestamp: DateTime<Utc>) {
        let Some(reference) = self.reference else {
            self.reference = Some(timestamp);
            return;
        };
        let factor = (-self.exponent(reference, timestamp)).exp2();
        self.total_weight = 0.0;
        for weight in self.weights.iter_mut() {
            *weight *= factor;
            self.total_weight += *weight;
        }
        self.reference = Some(timestamp);
    }

    /// Value below which fraction `p` of the total weight lies
    ///
    /// Linearly interpolated within the bucket where the cumulative weight
    /// crosses `p * total`. Fails when nothing has been observed.
    pub fn percentile(&self, p: f64) -> Result<f64, InsufficientDataError> {
        if self.is_empty() {
            return Err(InsufficientDataError);
        }

        let target = p.clamp(0.0, 1.0) * self.total_weight;
        let mut cumulative = 0.0;
        let mut last_nonempty = 0;
        for (index, &weight) in self.weights.iter().enumerate() {
            if weight <= 0.0 {
                continue;
            }
            last_nonempty = index;
            if cumulative + weight >= target {
                let fraction = ((target - cumulative) / weight).clamp(0.0, 1.0);
                return Ok(self.bucket_start(index) + fraction * self.options.bucket_size);
            }
            cumulative += weight;
        }

        // Summation drift left the target just above the accumulated total.
        Ok(self.bucket_start(last_nonempty + 1))
    }

    /// Snapshot the histogram for persistence between runs
    pub fn checkpoint(&self) -> HistogramCheckpoint {
        HistogramCheckpoint {
            reference: self.reference,
            total_weight: self.total_weight,
            buckets: self
                .weights
                .iter()
                .enumerate()
                .filter(|(_, w)| **w > 0.0)
                .map(|(i, w)| (i, *w))
                .collect(),
        }
    }

    /// Restore a histogram from a checkpoint taken with the same options
    pub fn from_checkpoint(
        options: HistogramOptions,
        half_life: Duration,
        checkpoint: &HistogramCheckpoint,
    ) -> Result<Self, CheckpointError> {
        let mut histogram = Self::new(options, half_life);
        let buckets = histogram.bucket_count();
        for (&index, &weight) in &checkpoint.buckets {
            if index >= buckets {
                return Err(CheckpointError::BucketOutOfRange { index, buckets });
            }
            if !weight.is_finite() || weight < 0.0 {
                return Err(CheckpointError::InvalidWeight { index, weight });
            }
            histogram.weights[index] = weight;
        }
        histogram.total_weight = histogram.weights.iter().sum();
        histogram.reference = checkpoint.reference;
        Ok(histogram)
    }
}

/// Serializable histogram state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramCheckpoint {
    pub reference: Option<DateTime<Utc>>,
    pub total_weight: f64,
    /// Non-empty buckets keyed by index
    pub buckets: BTreeMap<usize, f64>,
}
