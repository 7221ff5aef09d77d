//! lockstep - parallel work-item runner
//!
//! Runs a suite of work items on a worker pool and reports the results as if
//! the items had run one after another.
//!
//! ## Usage
//!
//! ```bash
//! # Run the demo suite on the default pool
//! lockstep run
//!
//! # 20 items on 8 workers, item 3 fails, items 5 and 7 error out
//! lockstep run --workers 8 --items 20 --fail 3 --error 5,7
//!
//! # Machine-readable summary
//! lockstep run --format json
//!
//! # Write an example configuration file
//! lockstep config init
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use lockstep::config::{print_env_help, AppConfig, ConfigFile, EnvConfig};
use lockstep::demo::DemoPlan;
use lockstep::models::RunSummary;
use lockstep::observer::ConsoleReporter;
use lockstep::output::{ResultFormatter, SharedSink};
use lockstep::utils::{init_logger, LogLevel};
use lockstep::RunReport;

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let env = EnvConfig::load();

    let verbose = args.verbose || env.verbose.unwrap_or(false);
    init_logger(LogLevel::from_verbose(verbose));

    match args.command {
        cli::Command::Run(run_args) => {
            let mut config = effective_config(args.config.as_deref(), &env)?;
            apply_run_args(&mut config, &run_args);
            run_demo(config, run_args).await?;
        }
        cli::Command::Config(config_args) => {
            manage_config(config_args, args.config.as_deref(), &env)?;
        }
        cli::Command::Env => {
            print_env_help();
            println!();
            env.print_summary();
        }
    }

    Ok(())
}

/// Config file named on the command line, then in the environment, then the
/// first one found in the standard locations
fn config_path(cli_path: Option<&Path>, env: &EnvConfig) -> Option<PathBuf> {
    cli_path
        .map(Path::to_path_buf)
        .or_else(|| env.config_file.as_ref().map(PathBuf::from))
        .or_else(ConfigFile::find)
}

fn load_config_file(cli_path: Option<&Path>, env: &EnvConfig) -> Result<ConfigFile> {
    match config_path(cli_path, env) {
        Some(path) => {
            debug!("Loading configuration from {}", path.display());
            ConfigFile::load(&path)
        }
        None => Ok(ConfigFile::default()),
    }
}

/// Defaults overridden by the config file, then by the environment
fn effective_config(cli_path: Option<&Path>, env: &EnvConfig) -> Result<AppConfig> {
    let mut config = load_config_file(cli_path, env)?.app;
    env.apply_to(&mut config);
    Ok(config)
}

fn apply_run_args(config: &mut AppConfig, args: &cli::RunArgs) {
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(items) = args.items {
        config.demo.items = items;
    }
    if let Some(iterations) = args.iterations {
        config.demo.iterations = iterations;
    }
    if let Some(delay_ms) = args.delay_ms {
        config.demo.delay_ms = delay_ms;
    }
    if let Some(format) = &args.format {
        config.format = format.clone();
    }
    if args.no_color {
        config.color = false;
    }
}

async fn run_demo(config: AppConfig, args: cli::RunArgs) -> Result<()> {
    let mut formatter = ResultFormatter::new(config.output_format()?);
    if !config.color {
        formatter = formatter.no_color();
    }

    let mut plan = DemoPlan::from_config(&config.demo);
    plan.fail = args.fail;
    plan.error = args.error;
    plan.panic = args.panic;
    let workers = config.workers;

    info!(
        "Running {} demo items on {} workers ({} lines each)",
        plan.items, workers, plan.iterations
    );

    // The suite blocks its calling thread until every item is reported.
    let reporter_formatter = formatter.clone();
    let (summary, report) = tokio::task::spawn_blocking(
        move || -> Result<(RunSummary, RunReport)> {
            let stdout = SharedSink::stdout();
            let suite = plan
                .build(workers)
                .with_output(stdout.clone(), SharedSink::stderr());
            let mut reporter =
                ConsoleReporter::new(stdout, reporter_formatter).with_suite(suite.name(), workers);

            let report = suite.run(&mut reporter).context("Demo run failed")?;
            let summary = reporter
                .summary()
                .with_duration_ms(report.elapsed.as_millis() as u64);
            Ok((summary, report))
        },
    )
    .await
    .context("Demo run task failed")??;

    if report.output_error {
        warn!("Some item output could not be written");
    }
    debug!(
        "{} hand-offs, {} observer events",
        report.handoffs, report.events
    );

    let rendered = formatter.format_summary(&summary);
    println!("{rendered}");

    if let Some(path) = args.output {
        std::fs::write(&path, &rendered)
            .with_context(|| format!("Failed to write summary: {}", path.display()))?;
        info!("Summary saved to {}", path.display());
    }

    if !summary.is_all_passed() {
        anyhow::bail!(
            "{} of {} items did not pass",
            summary.total - summary.passed,
            summary.total
        );
    }
    Ok(())
}

fn manage_config(args: cli::ConfigArgs, cli_path: Option<&Path>, env: &EnvConfig) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init { path, force } => {
            let path = path.unwrap_or_else(ConfigFile::default_path);
            if path.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {}. Use --force to overwrite.",
                    path.display()
                );
            }

            ConfigFile::example().save(&path)?;
            println!("✓ Configuration file created: {}", path.display());
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Show => {
            let mut config = load_config_file(cli_path, env)?;
            env.apply_to(&mut config.app);
            println!("{}", serde_yaml::to_string(&config)?);
        }

        cli::ConfigAction::Validate { path } => {
            let path = path
                .or_else(|| config_path(cli_path, env))
                .unwrap_or_else(ConfigFile::default_path);

            match ConfigFile::load(&path) {
                Ok(_) => {
                    println!("✓ Configuration file is valid: {}", path.display());
                }
                Err(e) => {
                    println!("✗ Configuration file is invalid: {}", path.display());
                    println!("  Error: {e:#}");
                    return Err(e);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_flags_override_config() {
        let mut config = AppConfig::default();
        let args = cli::RunArgs {
            workers: Some(2),
            delay_ms: Some(0),
            no_color: true,
            ..Default::default()
        };
        apply_run_args(&mut config, &args);

        assert_eq!(config.workers, 2);
        assert_eq!(config.demo.delay_ms, 0);
        assert_eq!(config.demo.items, 10);
        assert!(!config.color);
    }

    #[test]
    fn test_effective_config_precedence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lockstep.yaml");
        std::fs::write(&path, "app:\n  workers: 6\n  format: csv\n").unwrap();

        let env = EnvConfig {
            workers: Some(3),
            ..Default::default()
        };
        let config = effective_config(Some(&path), &env).unwrap();

        assert_eq!(config.workers, 3);
        assert_eq!(config.format, "csv");
    }
}
