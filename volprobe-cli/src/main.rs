//! volprobe -- end-to-end verification of the multi-host Docker volume plugin.
//!
//! # Usage
//! ```text
//! volprobe list
//! volprobe run --all -j 2
//! volprobe run access_across_groups group_quota --output json
//! volprobe config validate -c lab.toml
//! ```

mod cli;
mod commands;
mod error;
mod logging;
mod output;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use volprobe_core::config::{GeneralConfig, HarnessConfig};

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::output::OutputWriter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let general = logging_config(&cli.config, cli.log_level.as_deref()).await;
    if let Err(e) = logging::init_tracing(&general) {
        eprintln!("error: {e:#}");
        return ExitCode::from(2);
    }
    volprobe_core::metrics::describe_all();

    let writer = OutputWriter::new(cli.output);
    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args, &cli.config, &writer, cancel).await,
        Commands::List => commands::list::execute(&writer),
        Commands::Config(args) => commands::config::execute(args, &cli.config, &writer).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(exit_status(&e))
        }
    }
}

fn exit_status(err: &CliError) -> u8 {
    u8::try_from(err.exit_code()).unwrap_or(1)
}

/// `[general]` from the config file when it can be read, defaults otherwise.
///
/// Loading errors are reported by the subcommand itself, not here.
async fn logging_config(path: &Path, log_level: Option<&str>) -> GeneralConfig {
    let mut config = match tokio::fs::read_to_string(path).await {
        Ok(content) => HarnessConfig::parse(&content).unwrap_or_default(),
        Err(_) => HarnessConfig::default(),
    };
    config.apply_env_overrides();

    let mut general = config.general;
    if let Some(level) = log_level {
        general.log_level = level.to_owned();
    }
    general
}

/// First Ctrl-C cancels the run between steps so teardown still happens.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received, stopping after the current step");
                cancel.cancel();
            }
            Err(e) => warn!(error = %e, "failed to listen for ctrl-c"),
        }
    });
}
