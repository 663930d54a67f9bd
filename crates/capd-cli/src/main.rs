//! # capd CLI entry point
//!
//! Parses command-line flags, initializes logging, loads the environment
//! configuration and dispatches to the deploy or regions pipeline.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use capd_az::{HttpProbe, SystemRunner};
use capd_cli::config::DeployConfig;
use capd_cli::deploy::{Banners, Deployer};
use capd_cli::exit_code;
use capd_cli::report::{render_plan, render_report, OutputFormat};

/// Per-request timeout of the health probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Container app deployer.
///
/// Selects a policy-compliant region, provisions the registry, log workspace,
/// telemetry component and hosting environment, publishes the image and rolls
/// out the application. All settings come from environment variables
/// (LOCATION, PREFERRED_REGIONS, RESOURCE_GROUP, ACR_NAME, APP_NAME, ...).
#[derive(Parser, Debug)]
#[command(name = "capd", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log line format on standard error.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    /// Result format on standard output.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Provision, publish and roll out (the default).
    Deploy,

    /// Show the allow-list and the region a deployment would use.
    Regions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    tracing::debug!("capd v{} starting", env!("CARGO_PKG_VERSION"));

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = DeployConfig::from_env().context("invalid configuration")?;
    tracing::debug!(?config, "configuration loaded");

    let banners = match cli.output {
        OutputFormat::Text => Banners::Stdout,
        OutputFormat::Json => Banners::Stderr,
    };
    let probe = HttpProbe::new(PROBE_TIMEOUT).context("could not build the HTTP client")?;
    let deployer = Deployer::new(&config, SystemRunner, probe).with_banners(banners);

    let rendered = match cli.command.unwrap_or(Commands::Deploy) {
        Commands::Deploy => render_report(&deployer.deploy()?, cli.output)?,
        Commands::Regions => {
            let (_subscription, plan) = deployer.plan()?;
            render_plan(&plan, cli.output)?
        }
    };
    print!("{rendered}");
    Ok(())
}

/// Verbosity maps to a level filter unless `RUST_LOG` is set.
fn init_tracing(verbose: u8, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parse_no_arguments_deploys() {
        let cli = Cli::try_parse_from(["capd"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.verbose, 0);
        assert_eq!(cli.output, OutputFormat::Text);
        assert_eq!(cli.log_format, LogFormat::Text);
    }

    #[test]
    fn cli_parse_explicit_deploy() {
        let cli = Cli::try_parse_from(["capd", "deploy"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Deploy));
    }

    #[test]
    fn cli_parse_regions_with_json_output() {
        let cli = Cli::try_parse_from(["capd", "regions", "--output", "json"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Regions));
        assert_eq!(cli.output, OutputFormat::Json);
    }

    #[test]
    fn cli_parse_verbosity_count() {
        let cli = Cli::try_parse_from(["capd", "-vvv"]).unwrap();
        assert_eq!(cli.verbose, 3);
        let cli = Cli::try_parse_from(["capd", "deploy", "-v", "-v"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn cli_parse_json_logs() {
        let cli = Cli::try_parse_from(["capd", "--log-format", "json"]).unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn cli_rejects_unknown_output_format() {
        assert!(Cli::try_parse_from(["capd", "--output", "yaml"]).is_err());
    }

    #[test]
    fn cli_rejects_unknown_subcommand() {
        assert!(Cli::try_parse_from(["capd", "destroy"]).is_err());
    }
}
