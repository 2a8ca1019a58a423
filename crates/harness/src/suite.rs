//! 시나리오 묶음 실행
//!
//! 카탈로그에서 고른 시나리오를 준비하고, 설정된 동시 실행 수만큼 병렬로
//! 실행한 뒤 카탈로그 순서로 보고서를 모읍니다. 시나리오마다 별도의 실행 ID와
//! 리소스 이름을 쓰므로 동시에 실행해도 서로의 볼륨과 그룹을 건드리지 않습니다.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use volprobe_backend::RemoteExecutor;
use volprobe_core::config::EnvironmentConfig;

use crate::catalog::{self, ScenarioContext, ScenarioTemplate};
use crate::error::HarnessError;
use crate::naming::ResourceNamer;
use crate::orchestrator::ScenarioRunner;
use crate::report::{Diagnostic, ScenarioReport, ScenarioStatus, SuiteReport};
use crate::scenario::Scenario;

/// 실행 준비 결과
#[derive(Debug)]
pub enum Prepared {
    Ready { scenario: Scenario, run_id: String },
    Skipped { name: String, reason: String },
}

/// 이름으로 템플릿을 고릅니다. 이름이 비어 있으면 전체 카탈로그를 반환합니다.
pub fn select(names: &[String]) -> Result<Vec<&'static ScenarioTemplate>, HarnessError> {
    if names.is_empty() {
        return Ok(catalog::catalog().iter().collect());
    }
    names
        .iter()
        .map(|name| catalog::find(name).ok_or_else(|| HarnessError::UnknownScenario(name.clone())))
        .collect()
}

/// 템플릿을 환경에 맞춰 구체화합니다. 환경이 부족하면 건너뜁니다.
pub fn prepare(template: &ScenarioTemplate, environment: &EnvironmentConfig) -> Prepared {
    let namer = ResourceNamer::new();
    let run_id = namer.run_id().to_owned();
    let mut ctx = ScenarioContext::new(environment, namer);

    let skipped = |reason: String| Prepared::Skipped {
        name: template.name.to_owned(),
        reason,
    };

    let scenario = match template.build(&mut ctx) {
        Ok(scenario) => scenario,
        Err(reason) => return skipped(HarnessError::Environment(reason).to_string()),
    };
    if let Err(e) = environment.require_hosts(scenario.min_hosts) {
        return skipped(e.to_string());
    }
    if scenario.requires_vsan && environment.vsan_datastore().is_none() {
        return skipped(HarnessError::Environment("no vsan datastore configured".to_owned()).to_string());
    }
    Prepared::Ready { scenario, run_id }
}

fn crashed(name: String, run_id: String, message: String) -> ScenarioReport {
    ScenarioReport {
        name,
        run_id,
        status: ScenarioStatus::HarnessBug,
        steps: Vec::new(),
        diagnostic: Some(Diagnostic {
            step: None,
            operation: None,
            message,
        }),
        teardown_failures: Vec::new(),
        duration_ms: 0,
    }
}

/// 고른 템플릿을 병렬로 실행합니다.
///
/// 동시 실행 수는 `runner.max_parallel_scenarios`로 제한됩니다.
/// 결과는 `templates` 순서를 따릅니다.
pub async fn run_suite<E: RemoteExecutor>(
    runner: Arc<ScenarioRunner<E>>,
    templates: &[&'static ScenarioTemplate],
) -> SuiteReport {
    let config = runner.remote().config();
    let environment = config.environment.clone();
    let max_parallel = config.runner.max_parallel_scenarios.max(1);
    let semaphore = Arc::new(Semaphore::new(max_parallel));

    info!(
        scenarios = templates.len(),
        max_parallel = max_parallel,
        "suite started"
    );

    let mut finished: Vec<(usize, ScenarioReport)> = Vec::with_capacity(templates.len());
    let mut tasks = JoinSet::new();
    let mut launched = Vec::new();

    for (index, template) in templates.iter().enumerate() {
        match prepare(template, &environment) {
            Prepared::Skipped { name, reason } => {
                warn!(scenario = name.as_str(), reason = reason.as_str(), "scenario skipped");
                finished.push((index, ScenarioReport::skipped(name, reason)));
            }
            Prepared::Ready { scenario, run_id } => {
                let runner = Arc::clone(&runner);
                let semaphore = Arc::clone(&semaphore);
                launched.push((index, scenario.name.clone(), run_id.clone()));
                tasks.spawn(async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        let report =
                            crashed(scenario.name, run_id, "suite semaphore closed".to_owned());
                        return (index, report);
                    };
                    (index, runner.run_with_id(&scenario, &run_id).await)
                });
            }
        }
    }

    let mut crash_reason = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(pair) => finished.push(pair),
            Err(e) => {
                error!(error = %e, "scenario task crashed");
                crash_reason = Some(format!("scenario task failed: {e}"));
            }
        }
    }

    // 패닉한 태스크는 결과가 없으므로 빠진 인덱스로 찾습니다.
    let reported: BTreeSet<usize> = finished.iter().map(|(index, _)| *index).collect();
    for (index, name, run_id) in launched {
        if !reported.contains(&index) {
            let reason = crash_reason
                .clone()
                .unwrap_or_else(|| "scenario task produced no report".to_owned());
            finished.push((index, crashed(name, run_id, reason)));
        }
    }

    finished.sort_by_key(|(index, _)| *index);
    let report = SuiteReport {
        scenarios: finished.into_iter().map(|(_, report)| report).collect(),
    };

    info!(
        passed = report.count(ScenarioStatus::Passed),
        failed = report.count(ScenarioStatus::Failed),
        skipped = report.count(ScenarioStatus::Skipped),
        teardown_incomplete = report.any_teardown_failures(),
        "suite finished"
    );
    report
}
