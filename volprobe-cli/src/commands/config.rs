//! `volprobe config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use volprobe_core::config::HarnessConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

const SECTIONS: &str = "general, environment, ssh, backend, verifier, runner";

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, writer).await,
        ConfigAction::Show { section } => execute_show(config_path, section, writer).await,
    }
}

/// Load and validate the configuration file, reporting any errors.
///
/// Besides the bounds checked by `HarnessConfig::validate`, every catalog
/// scenario that cannot run in this environment is listed as a warning.
///
/// # Errors
///
/// Returns `CliError::Config` if validation fails.
async fn execute_validate(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %config_path.display(), "validating configuration");

    let report = match HarnessConfig::load(config_path).await {
        Ok(config) => ConfigValidationReport {
            source: config_path.display().to_string(),
            valid: true,
            errors: Vec::new(),
            warnings: unrunnable_scenarios(&config),
        },
        Err(e) => ConfigValidationReport {
            source: config_path.display().to_string(),
            valid: false,
            errors: vec![e.to_string()],
            warnings: Vec::new(),
        },
    };

    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }

    Ok(())
}

/// Catalog scenarios that would be skipped with this environment.
fn unrunnable_scenarios(config: &HarnessConfig) -> Vec<String> {
    volprobe_harness::catalog()
        .iter()
        .filter_map(
            |template| match volprobe_harness::prepare(template, &config.environment) {
                volprobe_harness::Prepared::Skipped { name, reason } => {
                    Some(format!("{name} will be skipped: {reason}"))
                }
                volprobe_harness::Prepared::Ready { .. } => None,
            },
        )
        .collect()
}

/// Display the effective configuration (file + env overrides + defaults).
///
/// # Errors
///
/// Returns `CliError::Core` if loading fails or `CliError::Command` if the
/// section name is unknown.
async fn execute_show(
    config_path: &Path,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(path = %config_path.display(), "loading configuration");

    let config = HarnessConfig::load(config_path).await?;

    let config_toml = match section.as_deref() {
        None => to_toml(&config),
        Some(name) => section_toml(&config, name)?,
    };

    let report = ConfigReport {
        source: config_path.display().to_string(),
        section,
        config_toml,
    };

    writer.render(&report)?;

    Ok(())
}

fn section_toml(config: &HarnessConfig, name: &str) -> Result<String, CliError> {
    Ok(match name {
        "general" => to_toml(&config.general),
        "environment" => to_toml(&config.environment),
        "ssh" => to_toml(&config.ssh),
        "backend" => to_toml(&config.backend),
        "verifier" => to_toml(&config.verifier),
        "runner" => to_toml(&config.runner),
        _ => {
            return Err(CliError::Command(format!(
                "unknown section: {} (expected: {})",
                name, SECTIONS
            )));
        }
    })
}

fn to_toml<T: Serialize>(value: &T) -> String {
    toml::to_string_pretty(value).unwrap_or_else(|e| format!("(serialization error: {})", e))
}

/// Effective configuration, optionally narrowed to one section.
#[derive(Serialize)]
pub struct ConfigReport {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Text rendering only
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let scope = match self.section {
            Some(ref section) => format!("[{section}]"),
            None => "all sections".to_owned(),
        };
        writeln!(
            w,
            "{} {} from {}",
            "Effective configuration:".bold(),
            scope,
            self.source
        )?;
        writeln!(w)?;
        write!(w, "{}", self.config_toml)
    }
}

/// Outcome of `config validate`.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    pub source: String,
    pub valid: bool,
    pub errors: Vec<String>,
    /// Scenarios the environment cannot run
    pub warnings: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let verdict = if self.valid {
            "valid".green().bold()
        } else {
            "invalid".red().bold()
        };
        writeln!(w, "{} is {}", self.source.bold(), verdict)?;

        for err in &self.errors {
            writeln!(w, "  {} {}", "error:".red(), err)?;
        }
        for warning in &self.warnings {
            writeln!(w, "  {} {}", "skip:".yellow(), warning)?;
        }
        Ok(())
    }
}
