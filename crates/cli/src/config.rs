//! Configuration management for the CLI
//!
//! Recommender keys are layered, lowest precedence first, from the config
//! file, `RREC_*` environment variables and `--set key=value` overrides into
//! the flat string map the recommender resolves.

use anyhow::{bail, Context, Result};
use config::Source;
use recommender_lib::params::keys;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Prefix for recommender keys supplied through the environment
pub const ENV_PREFIX: &str = "RREC";

/// `RREC_*` variables read by the CLI itself rather than the recommender
const CLI_ENV_KEYS: &[&str] = &["config", "log"];

/// Flat recommender configuration plus where it came from
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub values: HashMap<String, String>,
    pub file: Option<PathBuf>,
}

/// Load settings from the given (or default) file, the environment and overrides
pub fn load(file: Option<&Path>, overrides: &[String]) -> Result<Settings> {
    match file {
        Some(path) => build(Some((path, true)), None, overrides),
        None => {
            let default = default_config_path();
            let candidate = default.as_deref().filter(|p| p.exists());
            build(candidate.map(|p| (p, false)), None, overrides)
        }
    }
}

/// Default config file location, `~/.config/rrec/recommender.toml`
pub fn default_config_path() -> Option<PathBuf> {
    let home = dirs_next::home_dir()?;
    Some(home.join(".config").join("rrec").join("recommender.toml"))
}

fn build(
    file: Option<(&Path, bool)>,
    env: Option<config::Map<String, String>>,
    overrides: &[String],
) -> Result<Settings> {
    let mut values = HashMap::new();

    // File and environment spell keys differently, so each layer is
    // normalized on its own before the next one is applied on top.
    if let Some((path, required)) = file {
        let source = config::File::from(path).required(required);
        collect_layer(source, &mut values)
            .with_context(|| format!("Failed to load config file {}", path.display()))?;
    }
    collect_layer(
        config::Environment::with_prefix(ENV_PREFIX).source(env),
        &mut values,
    )
    .context("Failed to read RREC_* environment variables")?;

    for entry in overrides {
        let (key, value) = parse_override(entry)?;
        values.insert(key, value);
    }

    debug!(keys = values.len(), "Recommender configuration loaded");
    Ok(Settings {
        values,
        file: file.map(|(path, _)| path.to_path_buf()),
    })
}

fn collect_layer<S>(source: S, values: &mut HashMap<String, String>) -> Result<()>
where
    S: config::Source + Send + Sync + 'static,
{
    let layer = config::Config::builder().add_source(source).build()?;
    for (key, value) in layer.collect()? {
        let key = normalize_key(&key);
        if CLI_ENV_KEYS.contains(&key.as_str()) {
            continue;
        }
        if !keys::is_known(&key) {
            warn!(key = %key, "Ignoring unknown recommender key");
            continue;
        }
        let value = value
            .into_string()
            .with_context(|| format!("Recommender key '{}' must be a scalar", key))?;
        values.insert(key, value);
    }
    Ok(())
}

/// `RREC_OOM_BUMP_RATIO` and `oom_bump_ratio` both become `oom-bump-ratio`
fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase().replace('_', "-")
}

fn parse_override(entry: &str) -> Result<(String, String)> {
    let Some((key, value)) = entry.split_once('=') else {
        bail!("Invalid --set '{}', expected KEY=VALUE", entry);
    };
    let key = normalize_key(key);
    if !keys::is_known(&key) {
        bail!("Unknown recommender key '{}'", key);
    }
    Ok((key, value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> Option<config::Map<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_layers_in_precedence_order() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "cpu-request-percentile = 0.9\noom-bump-ratio = 1.3\nspecification = true"
        )
        .unwrap();

        let settings = build(
            Some((file.path(), true)),
            env(&[("RREC_OOM_BUMP_RATIO", "1.5"), ("RREC_MEM_SAMPLE_INTERVAL", "30s")]),
            &["mem-sample-interval=15s".to_string()],
        )
        .unwrap();

        assert_eq!(settings.values["cpu-request-percentile"], "0.9");
        assert_eq!(settings.values["oom-bump-ratio"], "1.5");
        assert_eq!(settings.values["mem-sample-interval"], "15s");
        assert_eq!(settings.values["specification"], "true");
    }

    #[test]
    fn test_unknown_env_keys_dropped() {
        let settings = build(
            None,
            env(&[("RREC_LOG", "debug"), ("RREC_CONFIG", "/tmp/x")]),
            &[],
        )
        .unwrap();
        assert!(settings.values.is_empty());
    }

    #[test]
    fn test_override_syntax() {
        assert_eq!(
            parse_override("OOM_BUMP_RATIO= 2").unwrap(),
            ("oom-bump-ratio".to_string(), "2".to_string())
        );
        assert!(parse_override("oom-bump-ratio").is_err());
        assert!(parse_override("bump=2").is_err());
    }

    #[test]
    fn test_missing_required_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(build(Some((&missing, true)), env(&[]), &[]).is_err());
    }
}
