use std::path::Path;

use anyhow::{bail, Context, Result};
use facelib_core::{LibrarySource, DEFAULT_THRESHOLD};
use serde::Deserialize;

/// Runtime configuration, loaded from a TOML file and `FACELIB_*` overrides.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Maximum Euclidean distance accepted as a positive identification.
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    /// Seconds between library source checks in `serve`; 0 disables reloading.
    #[serde(default = "default_reload_interval")]
    pub reload_interval_secs: u64,
    pub library: LibrarySource,
}

fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

fn default_reload_interval() -> u64 {
    5
}

impl Config {
    /// Read `path` (if it exists), apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let text = if path.exists() {
            std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?
        } else {
            tracing::debug!(
                path = %path.display(),
                "config file not found, using environment only"
            );
            String::new()
        };
        Self::from_toml_and_env(&text, |key| std::env::var(key).ok())
    }

    fn from_toml_and_env(text: &str, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut table: toml::Table = toml::from_str(text).context("parsing config TOML")?;

        if let Some(v) = env("FACELIB_THRESHOLD") {
            let t: f64 = v.parse().context("FACELIB_THRESHOLD is not a number")?;
            table.insert("threshold".into(), toml::Value::Float(t));
        }
        if let Some(v) = env("FACELIB_RELOAD_INTERVAL_SECS") {
            let secs: i64 = v
                .parse()
                .context("FACELIB_RELOAD_INTERVAL_SECS is not an integer")?;
            table.insert("reload_interval_secs".into(), toml::Value::Integer(secs));
        }

        let kind = env("FACELIB_LIBRARY_KIND");
        let path = env("FACELIB_LIBRARY_PATH");
        if kind.is_some() || path.is_some() {
            let library = table
                .entry("library")
                .or_insert(toml::Value::Table(toml::Table::new()));
            let Some(library) = library.as_table_mut() else {
                bail!("`library` must be a table");
            };
            if let Some(kind) = kind {
                library.insert("kind".into(), toml::Value::String(kind));
            }
            if let Some(path) = path {
                library.insert("path".into(), toml::Value::String(path));
            }
        }

        let config: Config = toml::Value::Table(table)
            .try_into()
            .context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            bail!("threshold must be a finite number >= 0, got {}", self.threshold);
        }
        if self.library.path().as_os_str().is_empty() {
            bail!("library path is empty");
        }
        Ok(())
    }
}
