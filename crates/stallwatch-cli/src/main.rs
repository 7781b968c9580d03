//! stallwatch - main thread stall watchdog CLI
//!
//! Runs a simulated event loop under the watchdog and validates watchdog
//! configuration files.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod config;
mod demo;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::WatchdogArgs;
use crate::demo::DemoArgs;

#[derive(Parser)]
#[command(name = "stallwatch")]
#[command(about = "Main thread stall watchdog - demo loop and configuration checks")]
#[command(version)]
struct Cli {
    /// Output format (human-readable or JSON)
    #[arg(long, global = true, help = "Output in JSON format for machine parsing")]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an event loop that blocks itself periodically under the watchdog
    Demo(DemoArgs),

    /// Validate a watchdog configuration file and print the effective config
    Validate {
        /// Path to a JSON configuration file
        path: PathBuf,

        #[command(flatten)]
        overrides: WatchdogArgs,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("stallwatch={log_level}").into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match execute_command(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                output::print_error_json(&e);
            } else {
                output::print_error_human(&e);
            }

            if e.downcast_ref::<stallwatch::WatchdogError>().is_some() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn execute_command(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Demo(args) => {
            let config = args.watchdog.resolve_from(args.config.as_deref())?;
            let report = demo::run(config, &args.plan())?;
            output::print_demo_report(&report, cli.json)
        }
        Commands::Validate { path, overrides } => {
            let config = overrides.resolve_from(Some(path.as_path()))?;
            output::print_config(&config, cli.json)
        }
    }
}
