//! Error types for the recommender
//!
//! Construction-time failures (`ConfigError`, `CatalogError`) abort recommender
//! creation. `InsufficientDataError` is scoped to a single dimension of a single
//! run. `ExceedsCatalogWarning` is never returned as an `Err`; it travels on the
//! recommendation for the caller to log.

use crate::models::ResourceDimension;
use thiserror::Error;

/// Malformed or out-of-range configuration value
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for `{key}`: {reason}")]
    Malformed {
        key: String,
        value: String,
        reason: String,
    },

    #[error("value {value:?} for `{key}` is out of range: {reason}")]
    OutOfRange {
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    /// The configuration key that failed to resolve
    pub fn key(&self) -> &str {
        match self {
            ConfigError::Malformed { key, .. } | ConfigError::OutOfRange { key, .. } => key,
        }
    }
}

/// Empty, malformed or inconsistent specification catalog
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogError {
    #[error("specification catalog is empty")]
    Empty,

    #[error("malformed specification entry {entry:?}: {reason}")]
    MalformedEntry { entry: String, reason: String },

    #[error("duplicate specification entry {entry:?}")]
    Duplicate { entry: String },
}

/// A histogram was queried with zero total weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("insufficient data: histogram has no observations")]
pub struct InsufficientDataError;

/// A histogram checkpoint does not fit the histogram it is restored into
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CheckpointError {
    #[error("bucket index {index} is outside the histogram ({buckets} buckets)")]
    BucketOutOfRange { index: usize, buckets: usize },

    #[error("bucket {index} has invalid weight {weight}")]
    InvalidWeight { index: usize, weight: f64 },
}

/// No catalog entry dominates the requested pair; the largest entry was used
#[derive(Debug, Clone, PartialEq, Error)]
#[error("requested {cpu_cores} cores / {memory_bytes} bytes exceeds the catalog, using {entry}")]
pub struct ExceedsCatalogWarning {
    pub cpu_cores: f64,
    pub memory_bytes: f64,
    pub entry: String,
}

/// Failure to construct a recommender
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecommenderError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

/// Per-dimension failure inside one recommendation run
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{dimension}: {source}")]
pub struct DimensionError {
    pub dimension: ResourceDimension,
    #[source]
    pub source: InsufficientDataError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_names_key() {
        let err = ConfigError::Malformed {
            key: "oom-bump-ratio".to_string(),
            value: "abc".to_string(),
            reason: "not a float".to_string(),
        };
        assert_eq!(err.key(), "oom-bump-ratio");
        assert!(err.to_string().contains("oom-bump-ratio"));
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_dimension_error_display() {
        let err = DimensionError {
            dimension: ResourceDimension::Memory,
            source: InsufficientDataError,
        };
        assert!(err.to_string().starts_with("memory:"));
    }
}
