//! Statistical sizing engine
//!
//! Samples flow through a decaying histogram per dimension, the percentile
//! estimator, the OOM floor (memory only) and, optionally, the specification
//! quantizer.

mod estimator;
mod histogram;
mod oom_guard;
mod quantizer;

#[cfg(test)]
mod tests;

pub use estimator::{Estimate, PercentileEstimator, SampleQuery};
pub use histogram::{half_life_for, DecayingHistogram, HistogramCheckpoint, HALF_LIVES_PER_HISTORY};
pub use oom_guard::{GuardedMemory, OomFloorGuard};
pub use quantizer::{Quantization, Specification, SpecificationCatalog};
