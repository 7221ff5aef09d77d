//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

use super::AppConfig;

/// Environment variable prefix
const ENV_PREFIX: &str = "LOCKSTEP";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnvConfig {
    /// Pool size from LOCKSTEP_WORKERS
    pub workers: Option<usize>,
    /// Output format from LOCKSTEP_FORMAT
    pub format: Option<String>,
    /// Verbose from LOCKSTEP_VERBOSE
    pub verbose: Option<bool>,
    /// Config file from LOCKSTEP_CONFIG
    pub config_file: Option<String>,
    /// Disable colors from LOCKSTEP_NO_COLOR
    pub no_color: Option<bool>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            workers: get_env_parse("WORKERS"),
            format: get_env("FORMAT"),
            verbose: get_env_bool("VERBOSE"),
            config_file: get_env("CONFIG"),
            no_color: get_env_bool("NO_COLOR"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.workers.is_some()
            || self.format.is_some()
            || self.verbose.is_some()
            || self.config_file.is_some()
            || self.no_color.is_some()
    }

    /// Override the settings that are present in the environment
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(format) = &self.format {
            config.format = format.clone();
        }
        if let Some(no_color) = self.no_color {
            config.color = !no_color;
        }
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {}_WORKERS:   {:?}", ENV_PREFIX, self.workers);
        println!("  {}_FORMAT:    {:?}", ENV_PREFIX, self.format);
        println!("  {}_VERBOSE:   {:?}", ENV_PREFIX, self.verbose);
        println!("  {}_CONFIG:    {:?}", ENV_PREFIX, self.config_file);
        println!("  {}_NO_COLOR:  {:?}", ENV_PREFIX, self.no_color);
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

/// Builder for setting environment variables (useful for testing)
#[derive(Default)]
pub struct EnvBuilder {
    vars: Vec<(String, String)>,
}

impl EnvBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_WORKERS"), workers.to_string()));
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_FORMAT"), format.into()));
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_VERBOSE"), verbose.to_string()));
        self
    }

    pub fn no_color(mut self, no_color: bool) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_NO_COLOR"), no_color.to_string()));
        self
    }

    /// Apply environment variables
    pub fn apply(self) {
        for (key, value) in self.vars {
            env::set_var(key, value);
        }
    }

    /// Apply and return guard that restores on drop
    pub fn apply_scoped(self) -> EnvGuard {
        let previous: Vec<_> = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        self.apply();

        EnvGuard { previous }
    }
}

/// Guard that restores environment variables on drop
pub struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}

/// Print all LOCKSTEP environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_WORKERS     Worker pool size");
    println!("  {ENV_PREFIX}_FORMAT      Output format (table, json, json-pretty, csv, summary)");
    println!("  {ENV_PREFIX}_VERBOSE     Enable debug logging (true/false)");
    println!("  {ENV_PREFIX}_CONFIG      Path to configuration file");
    println!("  {ENV_PREFIX}_NO_COLOR    Disable colored output (true/false)");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_WORKERS=8");
    println!("  lockstep run --items 20");
}
