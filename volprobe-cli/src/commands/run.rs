//! `volprobe run` command handler

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use volprobe_backend::{DryRunExecutor, RemoteExecutor, SshExecutor};
use volprobe_core::config::HarnessConfig;
use volprobe_harness::{
    Remote, RunMode, ScenarioReport, ScenarioRunner, ScenarioStatus, ScenarioTemplate,
    SuiteReport, run_suite, select,
};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `run` command.
///
/// The report is always rendered before the suite outcome is turned into an
/// error, so failed runs still print their diagnostics.
pub async fn execute(
    args: RunArgs,
    config_path: &Path,
    writer: &OutputWriter,
    cancel: CancellationToken,
) -> Result<(), CliError> {
    let mut config = HarnessConfig::load(config_path).await?;
    if let Some(parallel) = args.parallel {
        config.runner.max_parallel_scenarios = parallel;
        config.validate()?;
    }
    let config = Arc::new(config);

    let names = if args.all { Vec::new() } else { args.scenarios };
    let templates = select(&names)?;

    let mode = if args.dry_run {
        RunMode::DryRun
    } else {
        RunMode::Live
    };
    info!(
        scenarios = templates.len(),
        mode = ?mode,
        config = %config_path.display(),
        "starting scenario run"
    );

    let suite = match mode {
        RunMode::DryRun => {
            let executor = Arc::new(DryRunExecutor::new());
            run_with(executor, config, mode, &templates, cancel).await
        }
        RunMode::Live => {
            let executor = Arc::new(SshExecutor::new(config.ssh.clone()));
            run_with(executor, config, mode, &templates, cancel).await
        }
    };

    let report = RunReport::new(mode, suite);
    writer.render(&report)?;

    match CliError::from_suite(&report.suite) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn run_with<E: RemoteExecutor>(
    executor: Arc<E>,
    config: Arc<HarnessConfig>,
    mode: RunMode,
    templates: &[&'static ScenarioTemplate],
    cancel: CancellationToken,
) -> SuiteReport {
    let runner = ScenarioRunner::new(Remote::new(executor, config), cancel).with_mode(mode);
    run_suite(Arc::new(runner), templates).await
}

/// Suite result with per-status totals.
#[derive(Serialize)]
pub struct RunReport {
    pub mode: &'static str,
    pub summary: RunSummary,
    #[serde(flatten)]
    pub suite: SuiteReport,
}

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub aborted: usize,
    pub infrastructure_failures: usize,
    pub harness_bugs: usize,
    pub teardown_incomplete: usize,
}

impl RunReport {
    pub fn new(mode: RunMode, suite: SuiteReport) -> Self {
        let summary = RunSummary {
            total: suite.scenarios.len(),
            passed: suite.count(ScenarioStatus::Passed),
            failed: suite.count(ScenarioStatus::Failed),
            skipped: suite.count(ScenarioStatus::Skipped),
            aborted: suite.count(ScenarioStatus::Aborted),
            infrastructure_failures: suite.count(ScenarioStatus::InfrastructureFailure),
            harness_bugs: suite.count(ScenarioStatus::HarnessBug),
            teardown_incomplete: suite
                .scenarios
                .iter()
                .filter(|r| r.teardown_incomplete())
                .count(),
        };
        let mode = match mode {
            RunMode::Live => "live",
            RunMode::DryRun => "dry_run",
        };
        Self {
            mode,
            summary,
            suite,
        }
    }
}

fn status_label(status: ScenarioStatus) -> colored::ColoredString {
    use colored::Colorize;

    match status {
        ScenarioStatus::Passed => "PASS".green().bold(),
        ScenarioStatus::Failed => "FAIL".red().bold(),
        ScenarioStatus::Aborted => "ABORT".yellow().bold(),
        ScenarioStatus::InfrastructureFailure => "INFRA".magenta().bold(),
        ScenarioStatus::HarnessBug => "BUG".red().bold(),
        ScenarioStatus::Skipped => "SKIP".dimmed(),
    }
}

fn render_scenario(report: &ScenarioReport, w: &mut dyn Write) -> std::io::Result<()> {
    use colored::Colorize;

    if report.status == ScenarioStatus::Skipped {
        writeln!(w, "  {:<5}  {}", status_label(report.status), report.name)?;
    } else {
        writeln!(
            w,
            "  {:<5}  {}  [{}]  {} steps, {} ms",
            status_label(report.status),
            report.name.bold(),
            report.run_id,
            report.steps.len(),
            report.duration_ms
        )?;
    }

    if let Some(ref diagnostic) = report.diagnostic {
        match (diagnostic.step, diagnostic.operation.as_deref()) {
            (Some(step), Some(op)) => writeln!(w, "         step {step}: {op}")?,
            (Some(step), None) => writeln!(w, "         step {step}")?,
            _ => {}
        }
        writeln!(w, "         {}", diagnostic.message)?;
    }

    for failure in &report.teardown_failures {
        writeln!(
            w,
            "         {} {}: {}",
            "teardown".yellow(),
            failure.action,
            failure.error
        )?;
    }
    Ok(())
}

impl Render for RunReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Scenario Run ({})", self.mode.bold())?;
        for scenario in &self.suite.scenarios {
            render_scenario(scenario, w)?;
        }

        let s = &self.summary;
        writeln!(w)?;
        write!(
            w,
            "Summary: {} total, {} passed, {} failed, {} skipped",
            s.total,
            s.passed.to_string().green(),
            s.failed.to_string().red(),
            s.skipped
        )?;
        if s.infrastructure_failures > 0 {
            write!(w, ", {} infrastructure", s.infrastructure_failures)?;
        }
        if s.harness_bugs > 0 {
            write!(w, ", {} harness bugs", s.harness_bugs)?;
        }
        if s.aborted > 0 {
            write!(w, ", {} aborted", s.aborted)?;
        }
        writeln!(w)?;
        if s.teardown_incomplete > 0 {
            writeln!(
                w,
                "{} {} scenario(s) left resources behind",
                "Warning:".yellow().bold(),
                s.teardown_incomplete
            )?;
        }
        Ok(())
    }
}
