//! Resource Recommender CLI
//!
//! A command-line tool for computing CPU and memory request recommendations
//! from recorded usage samples, inspecting resolved parameters and working
//! with specification catalogs.

mod commands;
mod config;
mod input;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{params, quantize, recommend, specs};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Resource Recommender CLI
#[derive(Parser)]
#[command(name = "rrec")]
#[command(author, version, about = "CLI for the Resource Recommender", long_about = None)]
pub struct Cli {
    /// Recommender configuration file (TOML, JSON or YAML)
    #[arg(long, env = "RREC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override a recommender key, e.g. --set oom-bump-ratio=1.5 (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compute recommendations for the workloads in a sample file
    Recommend {
        /// JSON workload file with CPU/memory samples and OOM events
        #[arg(long, short)]
        input: PathBuf,

        /// Evaluation time (RFC 3339); defaults to the current time
        #[arg(long)]
        now: Option<String>,

        /// Workloads recommended concurrently
        #[arg(long, default_value_t = 8)]
        concurrency: usize,

        /// Per-fetch timeout (e.g. 30s, 1m)
        #[arg(long, default_value = "30s")]
        fetch_timeout: String,

        /// Print Prometheus metrics after the run
        #[arg(long)]
        metrics: bool,
    },

    /// Show the resolved recommender parameters
    Params,

    /// Show the specification catalog
    Specs {
        /// Catalog string to parse instead of the configured one
        #[arg(long)]
        catalog: Option<String>,
    },

    /// Round a CPU/memory pair up to a catalog tier
    Quantize {
        /// CPU in cores (e.g. 1.2) or millicores (e.g. 1200m)
        #[arg(long)]
        cpu: String,

        /// Memory quantity (e.g. 3Gi, 512Mi, 3221225472)
        #[arg(long)]
        memory: String,

        /// Catalog string to use instead of the configured one
        #[arg(long)]
        catalog: Option<String>,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_env("RREC_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let settings = config::load(cli.config.as_deref(), &cli.overrides)?;

    match cli.command {
        Commands::Recommend {
            input,
            now,
            concurrency,
            fetch_timeout,
            metrics,
        } => {
            let options = recommend::RecommendOptions {
                input,
                now,
                concurrency,
                fetch_timeout,
                metrics,
            };
            recommend::run(&settings, options, cli.format).await?;
        }
        Commands::Params => {
            params::show_params(&settings, cli.format)?;
        }
        Commands::Specs { catalog } => {
            specs::show_specs(&settings, catalog, cli.format)?;
        }
        Commands::Quantize {
            cpu,
            memory,
            catalog,
        } => {
            quantize::quantize_pair(&settings, &cpu, &memory, catalog, cli.format)?;
        }
    }

    Ok(())
}
