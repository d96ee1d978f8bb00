//! One-off quantization of a CPU/memory pair

use anyhow::Result;
use recommender_lib::models::{cores_to_millicores, cpu_quantity, memory_quantity};
use recommender_lib::sizing::{Quantization, SpecificationCatalog};
use serde::Serialize;

use crate::config::Settings;
use crate::output::{
    parse_cpu, parse_memory_quantity, print_json, print_success, print_warning, OutputFormat,
};

use super::resolve_catalog;

#[derive(Debug, Serialize)]
struct QuantizeResult {
    requested_cpu_cores: f64,
    requested_memory_bytes: f64,
    specification: String,
    cpu: String,
    memory: String,
    exceeds_catalog: bool,
}

/// Round a (CPU, memory) pair up to the smallest dominating tier
pub fn quantize_pair(
    settings: &Settings,
    cpu: &str,
    memory: &str,
    catalog: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let cpu_cores = parse_cpu(cpu)?;
    let memory_bytes = parse_memory_quantity(memory)?;
    let catalog = resolve_catalog(settings, catalog)?;
    let result = quantize(&catalog, cpu_cores, memory_bytes);

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            if result.exceeds_catalog {
                print_warning(&format!(
                    "Request exceeds every tier, using the largest: {} ({} CPU, {} memory)",
                    result.specification, result.cpu, result.memory
                ));
            } else {
                print_success(&format!(
                    "{} ({} CPU, {} memory)",
                    result.specification, result.cpu, result.memory
                ));
            }
        }
    }

    Ok(())
}

fn quantize(catalog: &SpecificationCatalog, cpu_cores: f64, memory_bytes: f64) -> QuantizeResult {
    let quantization = catalog.quantize(cpu_cores, memory_bytes);
    // A parsed catalog is never empty, so quantization always selects a tier.
    let spec = match &quantization {
        Quantization::Matched(spec) | Quantization::ExceedsCatalog(spec) => *spec,
        Quantization::NotApplied => *catalog.largest(),
    };

    QuantizeResult {
        requested_cpu_cores: cpu_cores,
        requested_memory_bytes: memory_bytes,
        specification: spec.to_string(),
        cpu: cpu_quantity(cores_to_millicores(spec.cpu_cores)),
        memory: memory_quantity(spec.memory_bytes.round() as u64),
        exceeds_catalog: quantization.exceeds_catalog(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounds_up_to_dominating_tier() {
        let catalog = SpecificationCatalog::parse("1c2g,2c4g,4c8g").unwrap();
        let result = quantize(&catalog, 1.2, 3.0 * 1024.0 * 1024.0 * 1024.0);
        assert_eq!(result.specification, "2c4g");
        assert_eq!(result.cpu, "2");
        assert_eq!(result.memory, "4Gi");
        assert!(!result.exceeds_catalog);
    }

    #[test]
    fn test_overflow_uses_largest_tier() {
        let catalog = SpecificationCatalog::parse("1c2g,2c4g").unwrap();
        let result = quantize(&catalog, 8.0, 1024.0);
        assert_eq!(result.specification, "2c4g");
        assert!(result.exceeds_catalog);
    }
}
