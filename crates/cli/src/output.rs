//! Output formatting utilities

use anyhow::{bail, Result};
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print rows as a rounded table
pub fn print_table<T: Tabled>(rows: Vec<T>) {
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2}Gi", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2}Mi", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2}Ki", bytes as f64 / KB as f64)
    } else {
        format!("{}B", bytes)
    }
}

/// Format millicores as human-readable string
pub fn format_cpu(millicores: u64) -> String {
    if millicores >= 1000 {
        format!("{:.3}", millicores as f64 / 1000.0)
    } else {
        format!("{}m", millicores)
    }
}

/// Parse a CPU amount given in cores (`1.5`) or millicores (`1500m`)
pub fn parse_cpu(input: &str) -> Result<f64> {
    let input = input.trim();
    let cores = match input.strip_suffix('m') {
        Some(millis) => millis.parse::<f64>().map(|m| m / 1000.0),
        None => input.parse::<f64>(),
    };
    match cores {
        Ok(cores) if cores.is_finite() && cores >= 0.0 => Ok(cores),
        _ => bail!("Invalid CPU amount '{}'", input),
    }
}

/// Parse a memory quantity: plain bytes or a `Ki`/`Mi`/`Gi`/`Ti` (or `K`/`M`/`G`/`T`) suffix
pub fn parse_memory_quantity(input: &str) -> Result<f64> {
    const SUFFIXES: &[(&str, f64)] = &[
        ("Ki", 1024.0),
        ("Mi", 1024.0 * 1024.0),
        ("Gi", 1024.0 * 1024.0 * 1024.0),
        ("Ti", 1024.0 * 1024.0 * 1024.0 * 1024.0),
        ("K", 1e3),
        ("M", 1e6),
        ("G", 1e9),
        ("T", 1e12),
    ];

    let input = input.trim();
    let (number, multiplier) = SUFFIXES
        .iter()
        .find_map(|(suffix, multiplier)| input.strip_suffix(suffix).map(|n| (n, *multiplier)))
        .unwrap_or((input, 1.0));

    match number.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value * multiplier),
        _ => bail!("Invalid memory quantity '{}'", input),
    }
}

/// Color a yes/no flag
pub fn color_flag(flag: bool, when_set: &str) -> String {
    if flag {
        when_set.yellow().to_string()
    } else {
        "-".dimmed().to_string()
    }
}
