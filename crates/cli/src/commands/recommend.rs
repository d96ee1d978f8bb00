//! Recommendation command

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use recommender_lib::observability::gather_text;
use recommender_lib::params::parse_duration;
use recommender_lib::sources::{OomRecorder, SampleSource};
use recommender_lib::{
    RecommendationRunner, ResourceProfile, ResourceRecommender, RunOutcome, RunnerConfig,
    StructuredLogger,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tabled::Tabled;

use crate::config::Settings;
use crate::input::WorkloadFile;
use crate::output::{
    color_flag, format_bytes, format_cpu, print_json, print_table, print_warning, OutputFormat,
};

/// Options for `rrec recommend`
pub struct RecommendOptions {
    pub input: PathBuf,
    pub now: Option<String>,
    pub concurrency: usize,
    pub fetch_timeout: String,
    pub metrics: bool,
}

/// Row for the recommendations table
#[derive(Tabled)]
struct RecommendationRow {
    #[tabled(rename = "Workload")]
    workload: String,
    #[tabled(rename = "CPU Req")]
    cpu_request: String,
    #[tabled(rename = "Mem Req")]
    memory_request: String,
    #[tabled(rename = "Spec")]
    specification: String,
    #[tabled(rename = "OOM Floor")]
    oom_floor: String,
    #[tabled(rename = "Notes")]
    notes: String,
}

/// JSON shape of one workload's outcome
#[derive(Debug, Serialize)]
struct OutcomeReport {
    workload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile: Option<ResourceProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cpu_cores: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    memory_bytes: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    skipped: Option<String>,
    duration_us: u64,
}

impl From<&RunOutcome> for OutcomeReport {
    fn from(outcome: &RunOutcome) -> Self {
        let recommendation = outcome.recommendation.as_ref();
        OutcomeReport {
            workload: outcome.workload.to_string(),
            profile: recommendation.and_then(|r| r.to_profile()),
            cpu_cores: recommendation.and_then(|r| r.cpu_cores()),
            memory_bytes: recommendation.and_then(|r| r.memory_bytes()),
            errors: recommendation
                .map(|r| r.errors().iter().map(|e| e.to_string()).collect())
                .unwrap_or_default(),
            skipped: outcome.skipped_reason.clone(),
            duration_us: outcome.duration_us,
        }
    }
}

/// Run one recommendation cycle over the workloads in the input file
pub async fn run(
    settings: &Settings,
    options: RecommendOptions,
    format: OutputFormat,
) -> Result<()> {
    let now = match &options.now {
        Some(now) => DateTime::parse_from_rfc3339(now)
            .with_context(|| format!("Invalid --now '{}', expected RFC 3339", now))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };
    let fetch_timeout = parse_duration(&options.fetch_timeout).map_err(|reason| {
        anyhow!("Invalid --fetch-timeout '{}': {}", options.fetch_timeout, reason)
    })?;

    let loaded = WorkloadFile::read(&options.input)?.load();
    let oom_events: Arc<dyn OomRecorder> = Arc::new(loaded.oom_events);
    let samples: Arc<dyn SampleSource> = Arc::new(loaded.samples);

    let recommender = ResourceRecommender::new(&settings.values, Some(oom_events))
        .context("Failed to configure recommender")?;
    let runner = RecommendationRunner::new(
        Arc::new(recommender),
        samples,
        RunnerConfig {
            fetch_timeout,
            max_concurrency: options.concurrency,
        },
    )
    .with_logger(StructuredLogger::new("rrec-cli"));

    let outcomes = runner.run(loaded.workloads, now).await;

    match format {
        OutputFormat::Json => {
            let reports: Vec<OutcomeReport> = outcomes.iter().map(OutcomeReport::from).collect();
            print_json(&reports)?;
            if options.metrics {
                eprintln!("{}", gather_text()?);
            }
        }
        OutputFormat::Table => {
            if outcomes.is_empty() {
                print_warning("No workloads in input file");
                return Ok(());
            }
            let rows: Vec<RecommendationRow> = outcomes.iter().map(row).collect();
            print_table(rows);
            println!("\nTotal: {} workloads", outcomes.len());

            for outcome in &outcomes {
                if let Some(reason) = &outcome.skipped_reason {
                    print_warning(&format!("{} skipped: {}", outcome.workload, reason));
                }
            }
            if options.metrics {
                println!("\n{}", gather_text()?);
            }
        }
    }

    Ok(())
}

fn row(outcome: &RunOutcome) -> RecommendationRow {
    let Some(recommendation) = &outcome.recommendation else {
        return RecommendationRow {
            workload: outcome.workload.to_string(),
            cpu_request: "-".to_string(),
            memory_request: "-".to_string(),
            specification: "-".to_string(),
            oom_floor: "-".to_string(),
            notes: color_flag(true, "skipped"),
        };
    };

    let mut notes: Vec<String> = recommendation
        .errors()
        .iter()
        .map(|e| format!("no {} data", e.dimension))
        .collect();
    if recommendation.quantization.exceeds_catalog() {
        notes.push("exceeds catalog".to_string());
    }

    RecommendationRow {
        workload: outcome.workload.to_string(),
        cpu_request: recommendation
            .cpu_cores()
            .map(|c| format_cpu(recommender_lib::cores_to_millicores(c)))
            .unwrap_or_else(|| "-".to_string()),
        memory_request: recommendation
            .memory_bytes()
            .map(|m| format_bytes(m.max(0.0).round() as u64))
            .unwrap_or_else(|| "-".to_string()),
        specification: recommendation
            .quantization
            .specification()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string()),
        oom_floor: color_flag(recommendation.oom_floor_applied, "applied"),
        notes: if notes.is_empty() {
            color_flag(false, "")
        } else {
            color_flag(true, &notes.join(", "))
        },
    }
}
