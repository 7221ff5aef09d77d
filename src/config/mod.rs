//! Configuration module
//!
//! Settings come from, in increasing precedence: built-in defaults, a config
//! file, `LOCKSTEP_*` environment variables and command-line flags.

mod env;
mod file;

pub use env::{print_env_help, EnvBuilder, EnvConfig, EnvGuard};
pub use file::ConfigFile;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::executor::DEFAULT_WORKERS;
use crate::output::OutputFormat;

/// Application configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Worker pool size
    pub workers: usize,

    /// Result output format (table, json, json-pretty, csv, summary)
    pub format: String,

    /// Colorize table output
    pub color: bool,

    /// Demo suite settings
    pub demo: DemoConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            format: "table".to_string(),
            color: true,
            demo: DemoConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read config file")?;

        let config: Self = if is_yaml_file(path.as_ref()) {
            serde_yaml::from_str(&content).context("Failed to parse YAML config")?
        } else {
            serde_json::from_str(&content).context("Failed to parse JSON config")?
        };

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = if is_yaml_file(path.as_ref()) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Parsed output format
    pub fn output_format(&self) -> Result<OutputFormat> {
        OutputFormat::from_str(&self.format)
            .with_context(|| format!("Unknown output format: {}", self.format))
    }
}

/// Settings of the bundled demo suite
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Number of demo items
    pub items: usize,

    /// Lines each item prints
    pub iterations: usize,

    /// Pause before each line, in milliseconds
    pub delay_ms: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            items: 10,
            iterations: 10,
            delay_ms: 100,
        }
    }
}

pub(crate) fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}
