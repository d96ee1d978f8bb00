//! Parameter inspection

use anyhow::{Context, Result};
use colored::Colorize;
use recommender_lib::params::{keys, DimensionParams};
use recommender_lib::RecommenderParams;
use std::time::Duration;
use tabled::Tabled;

use crate::config::Settings;
use crate::output::{print_info, print_json, print_table, OutputFormat};

/// Row for the parameters table
#[derive(Tabled)]
struct ParamRow {
    #[tabled(rename = "Key")]
    key: &'static str,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Source")]
    source: String,
}

/// Show every resolved recommender parameter
pub fn show_params(settings: &Settings, format: OutputFormat) -> Result<()> {
    let params = RecommenderParams::resolve(&settings.values)
        .context("Invalid recommender configuration")?;

    match format {
        OutputFormat::Json => print_json(&params)?,
        OutputFormat::Table => {
            let rows = resolved_values(&params)
                .into_iter()
                .map(|(key, value)| ParamRow {
                    key,
                    value,
                    source: if settings.values.contains_key(key) {
                        "configured".green().to_string()
                    } else {
                        "default".dimmed().to_string()
                    },
                })
                .collect();
            print_table::<ParamRow>(rows);
            if let Some(file) = &settings.file {
                print_info(&format!("Config file: {}", file.display()));
            }
        }
    }

    Ok(())
}

fn resolved_values(params: &RecommenderParams) -> Vec<(&'static str, String)> {
    let mut values = Vec::with_capacity(keys::ALL.len());
    dimension_values(
        &mut values,
        &params.cpu,
        [
            keys::CPU_SAMPLE_INTERVAL,
            keys::CPU_MODEL_HISTORY_LENGTH,
            keys::CPU_REQUEST_PERCENTILE,
            keys::CPU_REQUEST_MARGIN_FRACTION,
            keys::CPU_TARGET_UTILIZATION,
            keys::CPU_HISTOGRAM_BUCKET_SIZE,
            keys::CPU_HISTOGRAM_MAX_VALUE,
        ],
    );
    dimension_values(
        &mut values,
        &params.memory,
        [
            keys::MEM_SAMPLE_INTERVAL,
            keys::MEM_MODEL_HISTORY_LENGTH,
            keys::MEM_REQUEST_PERCENTILE,
            keys::MEM_REQUEST_MARGIN_FRACTION,
            keys::MEM_TARGET_UTILIZATION,
            keys::MEM_HISTOGRAM_BUCKET_SIZE,
            keys::MEM_HISTOGRAM_MAX_VALUE,
        ],
    );
    values.push((keys::OOM_PROTECTION, params.oom.enabled.to_string()));
    values.push((keys::OOM_HISTORY_LENGTH, format_duration(params.oom.history_length)));
    values.push((keys::OOM_BUMP_RATIO, params.oom.bump_ratio.to_string()));
    values.push((keys::SPECIFICATION, params.specification.enabled.to_string()));
    values.push((keys::SPECIFICATION_CONFIG, params.specification.catalog.clone()));
    values
}

fn dimension_values(
    values: &mut Vec<(&'static str, String)>,
    dim: &DimensionParams,
    names: [&'static str; 7],
) {
    let [interval, history, percentile, margin, utilization, bucket, max] = names;
    values.push((interval, format_duration(dim.sample_interval)));
    values.push((history, format_duration(dim.history_length)));
    values.push((percentile, dim.percentile.to_string()));
    values.push((margin, dim.margin_fraction.to_string()));
    values.push((utilization, dim.target_utilization.to_string()));
    values.push((bucket, dim.histogram.bucket_size.to_string()));
    values.push((max, dim.histogram.max_value.to_string()));
}

/// Render as the largest whole unit, e.g. `168h`, `90s`
fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if duration.subsec_nanos() != 0 || secs == 0 {
        format!("{:?}", duration)
    } else if secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}
