//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parallel work-item runner with ordered, non-interleaved reporting
#[derive(Parser, Debug)]
#[command(name = "lockstep")]
#[command(version)]
#[command(about = "Run work items in parallel, report them as if run one by one")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (default: first of ./lockstep.yaml, ~/.config/lockstep/config.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the demo suite
    Run(RunArgs),

    /// Manage the configuration file
    Config(ConfigArgs),

    /// Show environment variable overrides
    Env,
}

/// Arguments for run command
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Worker pool size
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Number of demo items
    #[arg(short, long)]
    pub items: Option<usize>,

    /// Lines each item prints
    #[arg(long)]
    pub iterations: Option<usize>,

    /// Pause before each line, in milliseconds
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Items that fail an assertion (comma-separated item numbers)
    #[arg(long, value_delimiter = ',')]
    pub fail: Vec<usize>,

    /// Items that return an error (comma-separated item numbers)
    #[arg(long, value_delimiter = ',')]
    pub error: Vec<usize>,

    /// Items that panic (comma-separated item numbers)
    #[arg(long, value_delimiter = ',')]
    pub panic: Vec<usize>,

    /// Output format (table, json, json-pretty, csv, summary)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Also save the summary to a file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write an example configuration file
    Init {
        /// Destination (default: ./lockstep.yaml)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,

    /// Check a configuration file
    Validate {
        /// File to check (default: the file that would be loaded)
        path: Option<PathBuf>,
    },
}
