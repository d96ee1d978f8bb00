//! Specification catalog listing

use anyhow::Result;
use recommender_lib::models::cores_to_millicores;
use tabled::Tabled;

use crate::config::Settings;
use crate::output::{format_bytes, format_cpu, print_json, print_table, OutputFormat};

use super::resolve_catalog;

#[derive(Tabled)]
struct SpecRow {
    #[tabled(rename = "Tier")]
    tier: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Memory")]
    memory: String,
}

/// Show the catalog tiers in quantization order
pub fn show_specs(
    settings: &Settings,
    catalog: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let catalog = resolve_catalog(settings, catalog)?;

    match format {
        OutputFormat::Json => print_json(catalog.entries())?,
        OutputFormat::Table => {
            let rows = catalog
                .entries()
                .iter()
                .map(|spec| SpecRow {
                    tier: spec.to_string(),
                    cpu: format_cpu(cores_to_millicores(spec.cpu_cores)),
                    memory: format_bytes(spec.memory_bytes as u64),
                })
                .collect();
            print_table::<SpecRow>(rows);
            println!("\nTotal: {} tiers", catalog.len());
        }
    }

    Ok(())
}
