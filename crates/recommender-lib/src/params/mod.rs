//! Parameter resolution
//!
//! Turns the flat string-keyed recommender configuration into validated,
//! immutable parameter sets. Every absent key falls back to its documented
//! default; the first malformed or out-of-range value fails the whole
//! resolution and nothing partially resolved is returned.

mod parse;

pub use parse::{parse_bool, parse_duration, parse_float};

use crate::error::ConfigError;
use crate::models::ResourceDimension;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// Configuration keys understood by the resolver
pub mod keys {
    pub const CPU_SAMPLE_INTERVAL: &str = "cpu-sample-interval";
    pub const CPU_REQUEST_PERCENTILE: &str = "cpu-request-percentile";
    pub const CPU_REQUEST_MARGIN_FRACTION: &str = "cpu-request-margin-fraction";
    pub const CPU_TARGET_UTILIZATION: &str = "cpu-target-utilization";
    pub const CPU_MODEL_HISTORY_LENGTH: &str = "cpu-model-history-length";
    pub const CPU_HISTOGRAM_BUCKET_SIZE: &str = "cpu-histogram-bucket-size";
    pub const CPU_HISTOGRAM_MAX_VALUE: &str = "cpu-histogram-max-value";

    pub const MEM_SAMPLE_INTERVAL: &str = "mem-sample-interval";
    pub const MEM_REQUEST_PERCENTILE: &str = "mem-request-percentile";
    pub const MEM_REQUEST_MARGIN_FRACTION: &str = "mem-request-margin-fraction";
    pub const MEM_TARGET_UTILIZATION: &str = "mem-target-utilization";
    pub const MEM_MODEL_HISTORY_LENGTH: &str = "mem-model-history-length";
    pub const MEM_HISTOGRAM_BUCKET_SIZE: &str = "mem-histogram-bucket-size";
    pub const MEM_HISTOGRAM_MAX_VALUE: &str = "mem-histogram-max-value";

    pub const OOM_PROTECTION: &str = "oom-protection";
    pub const OOM_HISTORY_LENGTH: &str = "oom-history-length";
    pub const OOM_BUMP_RATIO: &str = "oom-bump-ratio";

    pub const SPECIFICATION: &str = "specification";
    pub const SPECIFICATION_CONFIG: &str = "specification-config";

    pub const ALL: &[&str] = &[
        CPU_SAMPLE_INTERVAL,
        CPU_REQUEST_PERCENTILE,
        CPU_REQUEST_MARGIN_FRACTION,
        CPU_TARGET_UTILIZATION,
        CPU_MODEL_HISTORY_LENGTH,
        CPU_HISTOGRAM_BUCKET_SIZE,
        CPU_HISTOGRAM_MAX_VALUE,
        MEM_SAMPLE_INTERVAL,
        MEM_REQUEST_PERCENTILE,
        MEM_REQUEST_MARGIN_FRACTION,
        MEM_TARGET_UTILIZATION,
        MEM_MODEL_HISTORY_LENGTH,
        MEM_HISTOGRAM_BUCKET_SIZE,
        MEM_HISTOGRAM_MAX_VALUE,
        OOM_PROTECTION,
        OOM_HISTORY_LENGTH,
        OOM_BUMP_RATIO,
        SPECIFICATION,
        SPECIFICATION_CONFIG,
    ];

    /// Whether `key` is understood by the resolver
    pub fn is_known(key: &str) -> bool {
        ALL.contains(&key)
    }
}

pub const DEFAULT_SAMPLE_INTERVAL: &str = "1m";
pub const DEFAULT_PERCENTILE: &str = "0.99";
pub const DEFAULT_MARGIN_FRACTION: &str = "0.15";
pub const DEFAULT_TARGET_UTILIZATION: &str = "1.0";
pub const DEFAULT_HISTORY_LENGTH: &str = "168h";
pub const DEFAULT_OOM_PROTECTION: &str = "true";
pub const DEFAULT_OOM_HISTORY_LENGTH: &str = "168h";
pub const DEFAULT_OOM_BUMP_RATIO: &str = "1.2";
pub const DEFAULT_CPU_HISTOGRAM_BUCKET_SIZE: &str = "0.1";
pub const DEFAULT_CPU_HISTOGRAM_MAX_VALUE: &str = "100";
/// 100 MiB
pub const DEFAULT_MEM_HISTOGRAM_BUCKET_SIZE: &str = "104857600";
pub const DEFAULT_MEM_HISTOGRAM_MAX_VALUE: &str = "104857600000";
pub const DEFAULT_SPECIFICATION: &str = "false";

/// Built-in catalog of `<cpu>c<memory GiB>g` tiers
pub const DEFAULT_SPECS: &str = "0.25c0.25g,0.25c0.5g,0.25c1g,0.5c0.5g,0.5c1g,1c1g,1c2g,1c4g,1c8g,\
2c2g,2c4g,2c8g,2c16g,4c4g,4c8g,4c16g,4c32g,8c8g,8c16g,8c32g,8c64g,16c32g,16c64g,16c128g,\
32c64g,32c128g,32c256g,64c128g,64c256g";

/// Shape of a linear-bucket histogram
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramOptions {
    pub bucket_size: f64,
    pub max_value: f64,
}

/// Largest number of buckets a histogram may be configured with
pub const MAX_HISTOGRAM_BUCKETS: usize = 1_000_000;

/// Relative tolerance for snapping a bucket position onto an exact boundary
const BOUNDARY_TOLERANCE: f64 = 1e-9;

impl HistogramOptions {
    /// `value` measured in buckets, snapped to an integer when within
    /// floating-point noise of one (0.3 / 0.1 is 2.9999999999999996)
    pub fn bucket_position(&self, value: f64) -> f64 {
        let position = value / self.bucket_size;
        let nearest = position.round();
        if (position - nearest).abs() <= nearest.abs() * BOUNDARY_TOLERANCE {
            nearest
        } else {
            position
        }
    }

    pub fn bucket_count(&self) -> usize {
        let count = self.bucket_position(self.max_value).ceil().max(1.0);
        if count.is_finite() {
            count as usize
        } else {
            usize::MAX
        }
    }
}

/// Parameters for estimating one resource dimension
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionParams {
    pub dimension: ResourceDimension,
    pub sample_interval: Duration,
    pub history_length: Duration,
    pub percentile: f64,
    pub margin_fraction: f64,
    pub target_utilization: f64,
    pub histogram: HistogramOptions,
}

/// OOM protection settings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OomProtectionParams {
    pub enabled: bool,
    pub history_length: Duration,
    pub bump_ratio: f64,
}

/// Specification quantization settings; the catalog is parsed by the recommender
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecificationParams {
    pub enabled: bool,
    pub catalog: String,
}

/// Fully resolved recommender parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommenderParams {
    pub cpu: DimensionParams,
    pub memory: DimensionParams,
    pub oom: OomProtectionParams,
    pub specification: SpecificationParams,
}

impl RecommenderParams {
    /// Resolve parameters from a configuration map, applying defaults for absent keys
    pub fn resolve(config: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let resolver = Resolver { config };

        let cpu = resolver.dimension(
            ResourceDimension::Cpu,
            DimensionKeys {
                sample_interval: keys::CPU_SAMPLE_INTERVAL,
                history_length: keys::CPU_MODEL_HISTORY_LENGTH,
                percentile: keys::CPU_REQUEST_PERCENTILE,
                margin_fraction: keys::CPU_REQUEST_MARGIN_FRACTION,
                target_utilization: keys::CPU_TARGET_UTILIZATION,
                bucket_size: (keys::CPU_HISTOGRAM_BUCKET_SIZE, DEFAULT_CPU_HISTOGRAM_BUCKET_SIZE),
                max_value: (keys::CPU_HISTOGRAM_MAX_VALUE, DEFAULT_CPU_HISTOGRAM_MAX_VALUE),
            },
        )?;
        let memory = resolver.dimension(
            ResourceDimension::Memory,
            DimensionKeys {
                sample_interval: keys::MEM_SAMPLE_INTERVAL,
                history_length: keys::MEM_MODEL_HISTORY_LENGTH,
                percentile: keys::MEM_REQUEST_PERCENTILE,
                margin_fraction: keys::MEM_REQUEST_MARGIN_FRACTION,
                target_utilization: keys::MEM_TARGET_UTILIZATION,
                bucket_size: (keys::MEM_HISTOGRAM_BUCKET_SIZE, DEFAULT_MEM_HISTOGRAM_BUCKET_SIZE),
                max_value: (keys::MEM_HISTOGRAM_MAX_VALUE, DEFAULT_MEM_HISTOGRAM_MAX_VALUE),
            },
        )?;

        let oom = OomProtectionParams {
            enabled: resolver.boolean(keys::OOM_PROTECTION, DEFAULT_OOM_PROTECTION)?,
            history_length: resolver.positive_duration(
                keys::OOM_HISTORY_LENGTH,
                DEFAULT_OOM_HISTORY_LENGTH,
            )?,
            bump_ratio: resolver.float_where(
                keys::OOM_BUMP_RATIO,
                DEFAULT_OOM_BUMP_RATIO,
                |v| v > 0.0,
                "must be greater than 0",
            )?,
        };

        let specification = SpecificationParams {
            enabled: resolver.boolean(keys::SPECIFICATION, DEFAULT_SPECIFICATION)?,
            catalog: resolver.raw(keys::SPECIFICATION_CONFIG, DEFAULT_SPECS).to_string(),
        };

        Ok(Self {
            cpu,
            memory,
            oom,
            specification,
        })
    }

    pub fn dimension(&self, dimension: ResourceDimension) -> &DimensionParams {
        match dimension {
            ResourceDimension::Cpu => &self.cpu,
            ResourceDimension::Memory => &self.memory,
        }
    }
}

impl Default for RecommenderParams {
    fn default() -> Self {
        // The defaults are constants that always validate.
        Self::resolve(&HashMap::new()).expect("default recommender parameters are valid")
    }
}

struct DimensionKeys {
    sample_interval: &'static str,
    history_length: &'static str,
    percentile: &'static str,
    margin_fraction: &'static str,
    target_utilization: &'static str,
    bucket_size: (&'static str, &'static str),
    max_value: (&'static str, &'static str),
}

struct Resolver<'a> {
    config: &'a HashMap<String, String>,
}

impl<'a> Resolver<'a> {
    fn raw(&self, key: &str, default: &'a str) -> &'a str {
        self.config.get(key).map(String::as_str).unwrap_or(default)
    }

    fn malformed(key: &str, value: &str, reason: String) -> ConfigError {
        ConfigError::Malformed {
            key: key.to_string(),
            value: value.to_string(),
            reason,
        }
    }

    fn out_of_range(key: &str, value: &str, reason: &str) -> ConfigError {
        ConfigError::OutOfRange {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    fn boolean(&self, key: &str, default: &'a str) -> Result<bool, ConfigError> {
        let value = self.raw(key, default);
        parse_bool(value).map_err(|reason| Self::malformed(key, value, reason))
    }

    fn positive_duration(&self, key: &str, default: &'a str) -> Result<Duration, ConfigError> {
        let value = self.raw(key, default);
        let duration = parse_duration(value).map_err(|reason| Self::malformed(key, value, reason))?;
        if duration.is_zero() {
            return Err(Self::out_of_range(key, value, "must be greater than 0"));
        }
        Ok(duration)
    }

    fn float_where(
        &self,
        key: &str,
        default: &'a str,
        valid: impl Fn(f64) -> bool,
        reason: &str,
    ) -> Result<f64, ConfigError> {
        let value = self.raw(key, default);
        let parsed = parse_float(value).map_err(|e| Self::malformed(key, value, e))?;
        if !valid(parsed) {
            return Err(Self::out_of_range(key, value, reason));
        }
        Ok(parsed)
    }

    fn dimension(
        &self,
        dimension: ResourceDimension,
        keys: DimensionKeys,
    ) -> Result<DimensionParams, ConfigError> {
        let sample_interval =
            self.positive_duration(keys.sample_interval, DEFAULT_SAMPLE_INTERVAL)?;
        let history_length = self.positive_duration(keys.history_length, DEFAULT_HISTORY_LENGTH)?;
        if history_length < sample_interval {
            return Err(Self::out_of_range(
                keys.history_length,
                self.raw(keys.history_length, DEFAULT_HISTORY_LENGTH),
                "must be at least the sample interval",
            ));
        }

        let percentile = self.float_where(
            keys.percentile,
            DEFAULT_PERCENTILE,
            |v| v > 0.0 && v < 1.0,
            "must be strictly between 0 and 1",
        )?;
        let margin_fraction = self.float_where(
            keys.margin_fraction,
            DEFAULT_MARGIN_FRACTION,
            |v| v >= 0.0,
            "must not be negative",
        )?;
        let target_utilization = self.float_where(
            keys.target_utilization,
            DEFAULT_TARGET_UTILIZATION,
            |v| v > 0.0,
            "must be greater than 0",
        )?;

        let (bucket_key, bucket_default) = keys.bucket_size;
        let bucket_size =
            self.float_where(bucket_key, bucket_default, |v| v > 0.0, "must be greater than 0")?;
        let (max_key, max_default) = keys.max_value;
        let max_value = self.float_where(
            max_key,
            max_default,
            |v| v > bucket_size,
            "must be greater than the histogram bucket size",
        )?;
        let histogram = HistogramOptions {
            bucket_size,
            max_value,
        };
        if histogram.bucket_count() > MAX_HISTOGRAM_BUCKETS {
            return Err(Self::out_of_range(
                bucket_key,
                self.raw(bucket_key, bucket_default),
                &format!(
                    "yields more than {} buckets up to {}",
                    MAX_HISTOGRAM_BUCKETS, max_value
                ),
            ));
        }

        Ok(DimensionParams {
            dimension,
            sample_interval,
            history_length,
            percentile,
            margin_fraction,
            target_utilization,
            histogram,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_applied_exactly() {
        let params = RecommenderParams::resolve(&HashMap::new()).unwrap();

        for dim in [&params.cpu, &params.memory] {
            assert_eq!(dim.sample_interval, Duration::from_secs(60));
            assert_eq!(dim.history_length, Duration::from_secs(168 * 3600));
            assert_eq!(dim.percentile, 0.99);
            assert_eq!(dim.margin_fraction, 0.15);
            assert_eq!(dim.target_utilization, 1.0);
        }
        assert_eq!(params.cpu.histogram.bucket_size, 0.1);
        assert_eq!(params.cpu.histogram.max_value, 100.0);
        assert_eq!(params.memory.histogram.bucket_size, 104_857_600.0);
        assert_eq!(params.memory.histogram.max_value, 104_857_600_000.0);
        assert!(params.oom.enabled);
        assert_eq!(params.oom.history_length, Duration::from_secs(168 * 3600));
        assert_eq!(params.oom.bump_ratio, 1.2);
        assert!(!params.specification.enabled);
        assert_eq!(params.specification.catalog, DEFAULT_SPECS);
    }

    #[test]
    fn test_overrides_are_per_dimension() {
        let params = RecommenderParams::resolve(&config(&[
            (keys::CPU_REQUEST_PERCENTILE, "0.95"),
            (keys::MEM_TARGET_UTILIZATION, "0.8"),
            (keys::MEM_SAMPLE_INTERVAL, "30s"),
        ]))
        .unwrap();

        assert_eq!(params.cpu.percentile, 0.95);
        assert_eq!(params.memory.percentile, 0.99);
        assert_eq!(params.memory.target_utilization, 0.8);
        assert_eq!(params.cpu.target_utilization, 1.0);
        assert_eq!(params.memory.sample_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let params = RecommenderParams::resolve(&config(&[("cpu-whatever", "x")])).unwrap();
        assert_eq!(params, RecommenderParams::default());
        assert!(!keys::is_known("cpu-whatever"));
        assert!(keys::is_known(keys::OOM_BUMP_RATIO));
        assert_eq!(keys::ALL.len(), 19);
    }

    #[test]
    fn test_malformed_values_name_the_key() {
        let cases = [
            (keys::CPU_SAMPLE_INTERVAL, "one minute"),
            (keys::MEM_MODEL_HISTORY_LENGTH, "7d"),
            (keys::OOM_PROTECTION, "yes"),
            (keys::SPECIFICATION, "maybe"),
            (keys::OOM_BUMP_RATIO, "1,2"),
            (keys::MEM_HISTOGRAM_BUCKET_SIZE, "100Mi"),
        ];
        for (key, value) in cases {
            let err = RecommenderParams::resolve(&config(&[(key, value)])).unwrap_err();
            assert!(matches!(err, ConfigError::Malformed { .. }), "{}: {:?}", key, err);
            assert_eq!(err.key(), key);
        }
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let cases = [
            (keys::CPU_REQUEST_PERCENTILE, "1.0"),
            (keys::CPU_REQUEST_PERCENTILE, "0"),
            (keys::MEM_REQUEST_MARGIN_FRACTION, "-0.1"),
            (keys::CPU_TARGET_UTILIZATION, "0"),
            (keys::CPU_HISTOGRAM_BUCKET_SIZE, "0"),
            (keys::CPU_HISTOGRAM_MAX_VALUE, "0.05"),
            (keys::OOM_BUMP_RATIO, "0"),
            (keys::OOM_HISTORY_LENGTH, "0"),
            (keys::CPU_MODEL_HISTORY_LENGTH, "30s"),
        ];
        for (key, value) in cases {
            let err = RecommenderParams::resolve(&config(&[(key, value)])).unwrap_err();
            assert!(matches!(err, ConfigError::OutOfRange { .. }), "{}: {:?}", key, err);
            assert_eq!(err.key(), key);
        }
    }

    #[test]
    fn test_bucket_count() {
        let params = RecommenderParams::default();
        assert_eq!(params.cpu.histogram.bucket_count(), 1000);
        assert_eq!(params.memory.histogram.bucket_count(), 1000);

        let uneven = HistogramOptions {
            bucket_size: 0.3,
            max_value: 1.0,
        };
        assert_eq!(uneven.bucket_count(), 4);

        // 1.1 / 0.1 is 11.000000000000002
        let boundary = HistogramOptions {
            bucket_size: 0.1,
            max_value: 1.1,
        };
        assert_eq!(boundary.bucket_count(), 11);
        assert_eq!(boundary.bucket_position(0.3), 3.0);
        assert_eq!(boundary.bucket_position(0.25), 2.5);
    }

    #[test]
    fn test_bucket_count_is_capped() {
        let err = RecommenderParams::resolve(&config(&[
            (keys::CPU_HISTOGRAM_BUCKET_SIZE, "1e-12"),
            (keys::CPU_HISTOGRAM_MAX_VALUE, "1e7"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { .. }), "{:?}", err);
        assert_eq!(err.key(), keys::CPU_HISTOGRAM_BUCKET_SIZE);

        let err = RecommenderParams::resolve(&config(&[(keys::MEM_HISTOGRAM_BUCKET_SIZE, "1")]))
            .unwrap_err();
        assert_eq!(err.key(), keys::MEM_HISTOGRAM_BUCKET_SIZE);

        let params = RecommenderParams::resolve(&config(&[
            (keys::CPU_HISTOGRAM_BUCKET_SIZE, "0.000001"),
            (keys::CPU_HISTOGRAM_MAX_VALUE, "1"),
        ]))
        .unwrap();
        assert_eq!(params.cpu.histogram.bucket_count(), MAX_HISTOGRAM_BUCKETS);
    }
}
