//! Resource recommendation library
//!
//! This crate provides the core functionality for:
//! - Resolving recommender parameters from a flat configuration map
//! - Percentile estimation over recency-weighted histograms
//! - OOM protection floors and specification quantization
//! - Collaborator interfaces for samples and OOM events
//! - Concurrent recommendation cycles and observability

pub mod error;
pub mod models;
pub mod observability;
pub mod params;
pub mod recommender;
pub mod runner;
pub mod sizing;
pub mod sources;

pub use error::{
    CatalogError, CheckpointError, ConfigError, DimensionError, ExceedsCatalogWarning,
    InsufficientDataError, RecommenderError,
};
pub use models::*;
pub use observability::{RecommenderMetrics, StructuredLogger};
pub use params::RecommenderParams;
pub use recommender::{DimensionRecommendation, Recommendation, ResourceRecommender};
pub use runner::{RecommendationRunner, RunOutcome, RunnerConfig};
