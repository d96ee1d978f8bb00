//! CLI subcommands

pub mod params;
pub mod quantize;
pub mod recommend;
pub mod specs;

use anyhow::{Context, Result};
use recommender_lib::sizing::SpecificationCatalog;
use recommender_lib::RecommenderParams;

use crate::config::Settings;

/// Catalog from an explicit string, or the configured one
pub(crate) fn resolve_catalog(
    settings: &Settings,
    catalog: Option<String>,
) -> Result<SpecificationCatalog> {
    let source = match catalog {
        Some(catalog) => catalog,
        None => {
            RecommenderParams::resolve(&settings.values)
                .context("Invalid recommender configuration")?
                .specification
                .catalog
        }
    };
    SpecificationCatalog::parse(&source).context("Invalid specification catalog")
}
