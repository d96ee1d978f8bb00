//! Resource recommender
//!
//! Owns the resolved parameters, one estimator per dimension, the OOM floor
//! guard and the specification catalog. Construction either fully succeeds or
//! returns an error; `recommend` is a pure computation over pre-fetched
//! samples.

use crate::error::{DimensionError, ExceedsCatalogWarning, RecommenderError};
use crate::models::{
    cores_to_millicores, cpu_quantity, memory_quantity, OomEvent, ResourceDimension,
    ResourceProfile, WorkloadRef, WorkloadSamples,
};
use crate::params::RecommenderParams;
use crate::sizing::{
    Estimate, GuardedMemory, OomFloorGuard, PercentileEstimator, Quantization, SampleQuery,
    SpecificationCatalog,
};
use crate::sources::OomRecorder;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Name this recommender registers under
pub const RESOURCE_RECOMMENDER: &str = "Resource";

/// Outcome for one dimension
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionRecommendation {
    pub estimate: Estimate,
    /// Value after the OOM floor (equal to `estimate.raw` for CPU)
    pub adjusted: f64,
    /// Final value after quantization
    pub value: f64,
}

/// Recommendation for one workload in one cycle
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub workload: WorkloadRef,
    pub generated_at: DateTime<Utc>,
    pub cpu: Result<DimensionRecommendation, DimensionError>,
    pub memory: Result<DimensionRecommendation, DimensionError>,
    pub oom_floor: Option<f64>,
    pub oom_floor_applied: bool,
    pub quantization: Quantization,
}

impl Recommendation {
    pub fn cpu_cores(&self) -> Option<f64> {
        self.cpu.as_ref().ok().map(|d| d.value)
    }

    pub fn memory_bytes(&self) -> Option<f64> {
        self.memory.as_ref().ok().map(|d| d.value)
    }

    /// Both dimensions produced a value
    pub fn is_complete(&self) -> bool {
        self.cpu.is_ok() && self.memory.is_ok()
    }

    pub fn errors(&self) -> Vec<&DimensionError> {
        [&self.cpu, &self.memory]
            .into_iter()
            .filter_map(|r| r.as_ref().err())
            .collect()
    }

    pub fn exceeds_catalog_warning(&self) -> Option<ExceedsCatalogWarning> {
        let cpu = self.cpu.as_ref().ok()?.adjusted;
        let memory = self.memory.as_ref().ok()?.adjusted;
        SpecificationCatalog::warning(cpu, memory, &self.quantization)
    }

    /// Serializable profile; `None` unless both dimensions have a value
    pub fn to_profile(&self) -> Option<ResourceProfile> {
        let cpu_millicores = cores_to_millicores(self.cpu_cores()?);
        let memory_bytes = self.memory_bytes()?.max(0.0).round() as u64;
        Some(ResourceProfile {
            workload: self.workload.clone(),
            cpu_request_millicores: cpu_millicores,
            memory_request_bytes: memory_bytes,
            cpu_quantity: cpu_quantity(cpu_millicores),
            memory_quantity: memory_quantity(memory_bytes),
            oom_floor_applied: self.oom_floor_applied,
            specification: self.quantization.specification().map(|s| s.to_string()),
            exceeds_catalog: self.quantization.exceeds_catalog(),
            generated_at: self.generated_at.timestamp(),
        })
    }
}

/// Percentile-based CPU and memory request recommender
pub struct ResourceRecommender {
    params: RecommenderParams,
    cpu: PercentileEstimator,
    memory: PercentileEstimator,
    oom_guard: OomFloorGuard,
    catalog: Option<SpecificationCatalog>,
    oom_recorder: Option<Arc<dyn OomRecorder>>,
}

impl std::fmt::Debug for ResourceRecommender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRecommender")
            .field("params", &self.params)
            .field("catalog", &self.catalog)
            .field("oom_recorder", &self.oom_recorder.is_some())
            .finish()
    }
}

impl ResourceRecommender {
    /// Build a recommender from a flat configuration map
    pub fn new(
        config: &HashMap<String, String>,
        oom_recorder: Option<Arc<dyn OomRecorder>>,
    ) -> Result<Self, RecommenderError> {
        let params = RecommenderParams::resolve(config)?;
        Self::from_params(params, oom_recorder)
    }

    /// Build a recommender from already resolved parameters
    pub fn from_params(
        params: RecommenderParams,
        oom_recorder: Option<Arc<dyn OomRecorder>>,
    ) -> Result<Self, RecommenderError> {
        // The catalog only matters, and is only validated, in specification mode.
        let catalog = if params.specification.enabled {
            Some(SpecificationCatalog::parse(&params.specification.catalog)?)
        } else {
            None
        };

        info!(
            recommender = RESOURCE_RECOMMENDER,
            cpu_percentile = params.cpu.percentile,
            mem_percentile = params.memory.percentile,
            oom_protection = params.oom.enabled,
            specification = params.specification.enabled,
            catalog_entries = catalog.as_ref().map(|c| c.len()).unwrap_or(0),
            "Resource recommender configured"
        );

        Ok(Self {
            cpu: PercentileEstimator::new(params.cpu.clone()),
            memory: PercentileEstimator::new(params.memory.clone()),
            oom_guard: OomFloorGuard::new(params.oom.clone()),
            catalog,
            oom_recorder,
            params,
        })
    }

    pub fn name(&self) -> &'static str {
        RESOURCE_RECOMMENDER
    }

    pub fn params(&self) -> &RecommenderParams {
        &self.params
    }

    pub fn catalog(&self) -> Option<&SpecificationCatalog> {
        self.catalog.as_ref()
    }

    pub fn estimator(&self, dimension: ResourceDimension) -> &PercentileEstimator {
        match dimension {
            ResourceDimension::Cpu => &self.cpu,
            ResourceDimension::Memory => &self.memory,
        }
    }

    /// Window the sample source should cover for `dimension` at `now`
    pub fn sample_query(&self, dimension: ResourceDimension, now: DateTime<Utc>) -> SampleQuery {
        self.estimator(dimension).query(now)
    }

    /// Recommend requests, reading OOM events from the configured recorder
    pub fn recommend(
        &self,
        workload: &WorkloadRef,
        samples: &WorkloadSamples,
        now: DateTime<Utc>,
    ) -> Recommendation {
        let recorder = self.oom_recorder.as_deref();
        self.run(workload, samples, now, |raw| {
            self.oom_guard.apply(raw, recorder, workload, now)
        })
    }

    /// Recommend requests against an explicit OOM event window
    pub fn recommend_with_events(
        &self,
        workload: &WorkloadRef,
        samples: &WorkloadSamples,
        oom_events: &[OomEvent],
        now: DateTime<Utc>,
    ) -> Recommendation {
        self.run(workload, samples, now, |raw| {
            self.oom_guard.apply_events(raw, oom_events, now)
        })
    }

    fn run(
        &self,
        workload: &WorkloadRef,
        samples: &WorkloadSamples,
        now: DateTime<Utc>,
        guard: impl FnOnce(f64) -> GuardedMemory,
    ) -> Recommendation {
        let estimate = |dimension: ResourceDimension| {
            self.estimator(dimension)
                .estimate(samples.series(dimension), now)
                .map_err(|source| DimensionError { dimension, source })
        };

        let cpu = estimate(ResourceDimension::Cpu).map(|estimate| DimensionRecommendation {
            adjusted: estimate.raw,
            value: estimate.raw,
            estimate,
        });

        let mut oom_floor = None;
        let mut oom_floor_applied = false;
        let memory = estimate(ResourceDimension::Memory).map(|estimate| {
            let guarded = guard(estimate.raw);
            oom_floor = guarded.floor;
            oom_floor_applied = guarded.applied;
            DimensionRecommendation {
                adjusted: guarded.value,
                value: guarded.value,
                estimate,
            }
        });

        let mut recommendation = Recommendation {
            workload: workload.clone(),
            generated_at: now,
            cpu,
            memory,
            oom_floor,
            oom_floor_applied,
            quantization: Quantization::NotApplied,
        };
        self.quantize(&mut recommendation);

        debug!(
            workload = %workload,
            cpu = ?recommendation.cpu_cores(),
            memory = ?recommendation.memory_bytes(),
            oom_floor_applied = recommendation.oom_floor_applied,
            quantized = recommendation.quantization.is_applied(),
            "Recommendation computed"
        );
        recommendation
    }

    fn quantize(&self, recommendation: &mut Recommendation) {
        let Some(catalog) = &self.catalog else {
            return;
        };
        let (Ok(cpu), Ok(memory)) = (&mut recommendation.cpu, &mut recommendation.memory) else {
            return;
        };

        let quantization = catalog.quantize(cpu.adjusted, memory.adjusted);
        if let Some(spec) = quantization.specification() {
            cpu.value = spec.cpu_cores;
            memory.value = spec.memory_bytes;
        }
        recommendation.quantization = quantization;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CatalogError, ConfigError};
    use crate::params::keys;

    fn config(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_construction_with_defaults() {
        let recommender = ResourceRecommender::new(&HashMap::new(), None).unwrap();
        assert_eq!(recommender.name(), "Resource");
        assert!(recommender.catalog().is_none());
        assert_eq!(recommender.params(), &RecommenderParams::default());
    }

    #[test]
    fn test_bad_config_aborts_construction() {
        let err = ResourceRecommender::new(&config(&[(keys::OOM_BUMP_RATIO, "high")]), None)
            .unwrap_err();
        assert!(matches!(err, RecommenderError::Config(ConfigError::Malformed { .. })));

        let oversized = config(&[
            (keys::CPU_HISTOGRAM_BUCKET_SIZE, "1e-12"),
            (keys::CPU_HISTOGRAM_MAX_VALUE, "1e7"),
        ]);
        let err = ResourceRecommender::new(&oversized, None).unwrap_err();
        assert!(matches!(err, RecommenderError::Config(ConfigError::OutOfRange { .. })));
    }

    #[test]
    fn test_bad_catalog_only_matters_in_specification_mode() {
        let bad = config(&[(keys::SPECIFICATION_CONFIG, "nonsense")]);
        assert!(ResourceRecommender::new(&bad, None).is_ok());

        let mut enabled = bad.clone();
        enabled.insert(keys::SPECIFICATION.to_string(), "true".to_string());
        let err = ResourceRecommender::new(&enabled, None).unwrap_err();
        assert!(matches!(err, RecommenderError::Catalog(CatalogError::MalformedEntry { .. })));

        enabled.insert(keys::SPECIFICATION_CONFIG.to_string(), String::new());
        let err = ResourceRecommender::new(&enabled, None).unwrap_err();
        assert_eq!(err, RecommenderError::Catalog(CatalogError::Empty));
    }

    #[test]
    fn test_specification_mode_loads_default_catalog() {
        let recommender =
            ResourceRecommender::new(&config(&[(keys::SPECIFICATION, "true")]), None).unwrap();
        assert_eq!(recommender.catalog().map(|c| c.len()), Some(29));
    }
}
