//! CLI argument parsing using clap derive API
//!
//! Purely declarative: no side effects or I/O happen here.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// volprobe -- end-to-end verification harness for the multi-host Docker volume plugin.
///
/// Use `volprobe <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "volprobe", version, about, long_about = None)]
pub struct Cli {
    /// Path to the volprobe.toml configuration file.
    #[arg(short, long, default_value = "volprobe.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run catalog scenarios against the configured environment.
    Run(RunArgs),

    /// List the built-in scenario catalog.
    List,

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- run ----

/// Run one or more scenarios.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Scenario names (see `volprobe list`).
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    pub scenarios: Vec<String>,

    /// Run every scenario in the catalog.
    #[arg(short, long)]
    pub all: bool,

    /// Override `runner.max_parallel_scenarios`.
    #[arg(short = 'j', long)]
    pub parallel: Option<usize>,

    /// Send commands to a recording executor instead of the hosts.
    #[arg(long)]
    pub dry_run: bool,
}

// ---- config ----

/// Manage volprobe configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, environment, ssh, backend, verifier, runner).
        #[arg(long)]
        section: Option<String>,
    },
}
