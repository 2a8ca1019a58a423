//! CLI-specific error types and exit code mapping

use volprobe_core::error::VolprobeError;
use volprobe_harness::{HarnessError, ScenarioStatus, SuiteReport};

/// CLI-specific error type.
///
/// The `exit_code()` method maps errors to process exit codes so that
/// CI jobs can tell a backend regression from a broken lab.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// At least one scenario observed behavior that disagrees with the model.
    #[error("scenario failure: {0}")]
    ScenarioFailed(String),

    /// Hosts could not be reached or commands timed out.
    #[error("infrastructure failure: {0}")]
    Infrastructure(String),

    /// A scenario or the model itself is inconsistent.
    #[error("harness bug: {0}")]
    HarnessBug(String),

    /// Every scenario passed, but some created resources were left behind.
    #[error("teardown incomplete: {0}")]
    TeardownIncomplete(String),

    /// The run was cancelled (Ctrl-C).
    #[error("run aborted: {0}")]
    Aborted(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from volprobe-core.
    #[error("{0}")]
    Core(#[from] VolprobeError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                                   |
    /// |------|-------------------------------------------|
    /// | 0    | Success                                   |
    /// | 1    | Scenario failure / general command error  |
    /// | 2    | Configuration error                       |
    /// | 3    | Infrastructure failure                    |
    /// | 4    | Harness bug                               |
    /// | 5    | Passed, but teardown left resources       |
    /// | 10   | IO error                                  |
    /// | 130  | Aborted                                   |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Infrastructure(_) => 3,
            Self::HarnessBug(_) => 4,
            Self::TeardownIncomplete(_) => 5,
            Self::Io(_) => 10,
            Self::Aborted(_) => 130,
            Self::Core(VolprobeError::Config(_)) => 2,
            Self::Core(e) if e.is_infrastructure() => 3,
            Self::JsonSerialize(_) | Self::Command(_) | Self::ScenarioFailed(_) | Self::Core(_) => {
                1
            }
        }
    }

    /// Derive the error for a finished suite, if any.
    ///
    /// The most severe scenario status wins. Teardown problems are only
    /// reported when nothing worse happened.
    pub fn from_suite(report: &SuiteReport) -> Option<Self> {
        let failing = |status: ScenarioStatus| {
            report
                .scenarios
                .iter()
                .filter(|r| r.status == status)
                .map(|r| r.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };

        match report.worst_status() {
            Some(status @ ScenarioStatus::HarnessBug) => Some(Self::HarnessBug(failing(status))),
            Some(status @ ScenarioStatus::InfrastructureFailure) => {
                Some(Self::Infrastructure(failing(status)))
            }
            Some(status @ ScenarioStatus::Failed) => Some(Self::ScenarioFailed(failing(status))),
            Some(status @ ScenarioStatus::Aborted) => Some(Self::Aborted(failing(status))),
            Some(_) => None,
            None if report.any_teardown_failures() => {
                let names = report
                    .scenarios
                    .iter()
                    .filter(|r| r.teardown_incomplete())
                    .map(|r| r.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                Some(Self::TeardownIncomplete(names))
            }
            None => None,
        }
    }
}

impl From<HarnessError> for CliError {
    fn from(e: HarnessError) -> Self {
        match e {
            HarnessError::UnknownScenario(_) => Self::Command(e.to_string()),
            HarnessError::Environment(_) => Self::Config(e.to_string()),
            other => Self::Core(other.into()),
        }
    }
}
