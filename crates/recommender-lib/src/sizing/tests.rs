//! End-to-end pipeline tests
//!
//! These drive `ResourceRecommender` with synthetic sample windows and OOM
//! histories and check the sizing scenarios the recommender is expected to
//! reproduce.

#[cfg(test)]
mod pipeline_tests {
    use crate::error::{DimensionError, InsufficientDataError};
    use crate::models::{
        OomEvent, ResourceDimension, Sample, WorkloadRef, WorkloadSamples, GIB, MIB,
    };
    use crate::params::keys;
    use crate::recommender::ResourceRecommender;
    use crate::sizing::{Quantization, Specification};
    use crate::sources::{InMemoryOomRecorder, OomRecorder};
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap()
    }

    fn workload() -> WorkloadRef {
        WorkloadRef::new("shop", "checkout").with_container("app")
    }

    /// `count` samples, one per minute ending at `now`, spread evenly over
    /// [low, high] in a scrambled order
    fn spread(count: i64, low: f64, high: f64) -> Vec<Sample> {
        (0..count)
            .map(|i| {
                let slot = (i * 7919) % count;
                let value = low + (high - low) * slot as f64 / (count - 1) as f64;
                Sample::new(now() - chrono::Duration::minutes(count - 1 - i), value)
            })
            .collect()
    }

    fn constant(count: i64, value: f64) -> Vec<Sample> {
        (0..count)
            .map(|i| Sample::new(now() - chrono::Duration::minutes(i), value))
            .collect()
    }

    fn recommender(pairs: &[(&str, &str)]) -> ResourceRecommender {
        let config: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ResourceRecommender::new(&config, None).unwrap()
    }

    #[test]
    fn test_uniform_cpu_window() {
        let samples = WorkloadSamples {
            cpu: spread(2000, 0.5, 1.5),
            memory: constant(100, 300.0 * MIB),
        };
        let rec = recommender(&[]).recommend(&workload(), &samples, now());

        let cpu = rec.cpu_cores().unwrap();
        assert!((cpu - 1.725).abs() <= 0.1 * 1.15, "cpu = {}", cpu);
    }

    #[test]
    fn test_empty_window_only_fails_that_dimension() {
        let samples = WorkloadSamples {
            cpu: spread(500, 0.2, 0.4),
            memory: Vec::new(),
        };
        let rec = recommender(&[]).recommend(&workload(), &samples, now());

        assert!(rec.cpu.is_ok());
        assert_eq!(
            rec.memory,
            Err(DimensionError {
                dimension: ResourceDimension::Memory,
                source: InsufficientDataError,
            })
        );
        assert!(!rec.is_complete());
        assert_eq!(rec.errors().len(), 1);
        assert!(rec.to_profile().is_none());
    }

    #[test]
    fn test_no_oom_events_keeps_raw_memory() {
        let recorder = Arc::new(InMemoryOomRecorder::new());
        let config = HashMap::new();
        let recorder_handle = recorder.clone() as Arc<dyn OomRecorder>;
        let recommender = ResourceRecommender::new(&config, Some(recorder_handle)).unwrap();

        let samples = WorkloadSamples {
            cpu: constant(60, 0.5),
            memory: spread(600, 200.0 * MIB, 400.0 * MIB),
        };
        let rec = recommender.recommend(&workload(), &samples, now());

        let memory = rec.memory.as_ref().unwrap();
        assert_eq!(memory.value, memory.estimate.raw);
        assert!(!rec.oom_floor_applied);
        assert_eq!(rec.oom_floor, None);
    }

    #[test]
    fn test_oom_event_raises_memory_floor() {
        // 20 MiB buckets keep the raw estimate close to the 350 MiB samples.
        let recorder = Arc::new(InMemoryOomRecorder::new());
        recorder.record(
            &workload(),
            OomEvent::new(now() - chrono::Duration::hours(6), 500.0 * MIB),
        );
        let config: HashMap<String, String> =
            [(keys::MEM_HISTOGRAM_BUCKET_SIZE.to_string(), (20.0 * MIB).to_string())].into();
        let recommender =
            ResourceRecommender::new(&config, Some(recorder as Arc<dyn OomRecorder>)).unwrap();

        let samples = WorkloadSamples {
            cpu: constant(60, 0.5),
            memory: constant(60, 341.0 * MIB),
        };
        let rec = recommender.recommend(&workload(), &samples, now());

        let memory = rec.memory.as_ref().unwrap();
        assert!(memory.estimate.raw < 500.0 * MIB);
        assert!(rec.oom_floor_applied);
        assert!((memory.value - 600.0 * MIB).abs() < 1.0);
        assert_eq!(rec.to_profile().unwrap().memory_request_bytes, 600 * 1024 * 1024);
    }

    #[test]
    fn test_old_oom_events_ignored() {
        let events = [OomEvent::new(now() - chrono::Duration::days(10), 5.0 * GIB)];
        let samples = WorkloadSamples {
            cpu: constant(60, 0.5),
            memory: constant(60, 300.0 * MIB),
        };
        let rec = recommender(&[]).recommend_with_events(&workload(), &samples, &events, now());
        assert!(!rec.oom_floor_applied);
        assert!(rec.memory_bytes().unwrap() < GIB);
    }

    #[test]
    fn test_specification_rounds_up() {
        let recommender = recommender(&[
            (keys::SPECIFICATION, "true"),
            (keys::SPECIFICATION_CONFIG, "1c2g,2c4g,4c8g"),
            (keys::CPU_REQUEST_MARGIN_FRACTION, "0"),
            (keys::MEM_REQUEST_MARGIN_FRACTION, "0"),
        ]);
        let samples = WorkloadSamples {
            cpu: constant(120, 1.15),
            memory: constant(120, 2.9 * GIB),
        };
        let rec = recommender.recommend(&workload(), &samples, now());

        assert_eq!(rec.quantization, Quantization::Matched(Specification::new(2.0, 4.0)));
        assert_eq!(rec.cpu_cores(), Some(2.0));
        assert_eq!(rec.memory_bytes(), Some(4.0 * GIB));
        assert!(rec.exceeds_catalog_warning().is_none());

        let profile = rec.to_profile().unwrap();
        assert_eq!(profile.cpu_quantity, "2");
        assert_eq!(profile.memory_quantity, "4Gi");
        assert_eq!(profile.specification.as_deref(), Some("2c4g"));
    }

    #[test]
    fn test_specification_overflow_is_flagged() {
        let recommender = recommender(&[
            (keys::SPECIFICATION, "true"),
            (keys::SPECIFICATION_CONFIG, "1c2g,2c4g"),
        ]);
        let samples = WorkloadSamples {
            cpu: constant(60, 7.0),
            memory: constant(60, 1.0 * GIB),
        };
        let rec = recommender.recommend(&workload(), &samples, now());

        assert_eq!(rec.quantization, Quantization::ExceedsCatalog(Specification::new(2.0, 4.0)));
        let warning = rec.exceeds_catalog_warning().unwrap();
        assert_eq!(warning.entry, "2c4g");
        assert!(warning.cpu_cores > 7.0);
        assert!(rec.to_profile().unwrap().exceeds_catalog);
    }

    #[test]
    fn test_quantization_skipped_without_both_dimensions() {
        let recommender = recommender(&[(keys::SPECIFICATION, "true")]);
        let samples = WorkloadSamples {
            cpu: constant(60, 1.0),
            memory: Vec::new(),
        };
        let rec = recommender.recommend(&workload(), &samples, now());
        assert_eq!(rec.quantization, Quantization::NotApplied);
        assert!(rec.cpu.is_ok());
    }

    #[test]
    fn test_adding_oom_event_never_lowers_final_memory() {
        let recommender = recommender(&[]);
        let samples = WorkloadSamples {
            cpu: constant(60, 0.5),
            memory: spread(300, 100.0 * MIB, 700.0 * MIB),
        };
        let mut events = Vec::new();
        let mut previous = recommender
            .recommend_with_events(&workload(), &samples, &events, now())
            .memory_bytes()
            .unwrap();
        for mib in [50.0, 900.0, 400.0, 1200.0] {
            events.push(OomEvent::new(now() - chrono::Duration::hours(1), mib * MIB));
            let current = recommender
                .recommend_with_events(&workload(), &samples, &events, now())
                .memory_bytes()
                .unwrap();
            assert!(current >= previous, "{} < {}", current, previous);
            previous = current;
        }
    }

    #[test]
    fn test_recommendation_is_deterministic() {
        let recommender = recommender(&[]);
        let samples = WorkloadSamples {
            cpu: spread(1000, 0.1, 3.0),
            memory: spread(1000, 64.0 * MIB, 2.0 * GIB),
        };
        let a = recommender.recommend(&workload(), &samples, now());
        let b = recommender.recommend(&workload(), &samples, now());
        assert_eq!(a, b);
    }
}
