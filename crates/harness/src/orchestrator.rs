//! 시나리오 오케스트레이터
//!
//! 단계마다 다음을 순서대로 수행합니다.
//!
//! 1. 해석기로 예상 결과를 계산하고 모델 상태를 커밋
//! 2. 실제 명령을 렌더링해 실행 (전송 실패만 재시도)
//! 3. 관측 결과를 분류해 예상 결과와 비교
//! 4. 새 기대 상태 스냅샷을 기준으로 관측 지점 검증
//!
//! 불일치는 시나리오를 중단시키며, 정리는 결과와 무관하게 항상 실행됩니다.
//! 시나리오 안의 단계는 순차 실행되고 취소는 단계 경계에서만 확인합니다.

use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use volprobe_backend::{
    CommandOutput, ObservedOutcome, RemoteExecutor, classify, operation_invocation,
    outcome_matches,
};
use volprobe_core::metrics as m;
use volprobe_model::{
    ExpectedValue, Interpretation, Interpreter, ModelEnvironment, Operation, Outcome, StateModel,
};

use crate::error::{HarnessError, VerifyError};
use crate::remote::Remote;
use crate::report::{
    CheckRecord, CheckStatus, Diagnostic, ScenarioReport, ScenarioStatus, StepRecord,
};
use crate::scenario::{Expectation, Scenario, Step};
use crate::teardown::{Ledger, run_teardown};
use crate::verifier::{RetryPolicy, Verifier};

/// 실행 모드
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunMode {
    /// 실제 명령을 실행하고 관측 지점을 조회
    #[default]
    Live,
    /// 명령을 실행기로 보내지만 결과는 모델 값으로 간주하고 조회하지 않음
    DryRun,
}

/// 단계 실패로 시나리오를 멈출 때의 상태와 진단
#[derive(Debug)]
struct Abort {
    status: ScenarioStatus,
    diagnostic: Diagnostic,
}

impl Abort {
    fn new(status: ScenarioStatus, index: Option<usize>, op: Option<&Operation>, message: String) -> Self {
        Self {
            status,
            diagnostic: Diagnostic {
                step: index,
                operation: op.map(ToString::to_string),
                message,
            },
        }
    }

    fn at(status: ScenarioStatus, index: usize, op: &Operation, message: String) -> Self {
        Self::new(status, Some(index), Some(op), message)
    }
}

/// 시나리오 실행기
pub struct ScenarioRunner<E> {
    remote: Remote<E>,
    verifier: Verifier<E>,
    mode: RunMode,
    cancel: CancellationToken,
}

impl<E: RemoteExecutor> ScenarioRunner<E> {
    pub fn new(remote: Remote<E>, cancel: CancellationToken) -> Self {
        Self {
            verifier: Verifier::new(remote.clone()),
            remote,
            mode: RunMode::Live,
            cancel,
        }
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.verifier = Verifier::with_policy(self.remote.clone(), policy);
        self
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn remote(&self) -> &Remote<E> {
        &self.remote
    }

    /// 새 실행 ID로 시나리오를 실행합니다.
    pub async fn run(&self, scenario: &Scenario) -> ScenarioReport {
        let id = Uuid::new_v4().simple().to_string();
        self.run_with_id(scenario, &id[..8]).await
    }

    /// 시나리오를 실행하고 정리까지 마친 보고서를 반환합니다.
    pub async fn run_with_id(&self, scenario: &Scenario, run_id: &str) -> ScenarioReport {
        let started = Instant::now();
        let name = scenario.name.as_str();
        info!(
            scenario = name,
            run_id = run_id,
            steps = scenario.steps.len(),
            mode = ?self.mode,
            "scenario started"
        );

        let mut model = StateModel::new(ModelEnvironment::from_config(
            &self.remote.config().environment,
        ));
        for (host, group) in &scenario.foreign_delete_grants {
            model.grant_foreign_delete(host.clone(), group.clone());
        }
        let mut interpreter = Interpreter::new(model);
        let mut ledger = Ledger::new(interpreter.model().snapshot());
        let mut records = Vec::with_capacity(scenario.steps.len());

        let result = self
            .run_steps(scenario, &mut interpreter, &mut ledger, &mut records)
            .await;
        let teardown_failures = run_teardown(&self.remote, &ledger, name).await;

        let (status, diagnostic) = match result {
            Ok(()) => (ScenarioStatus::Passed, None),
            Err(abort) => (abort.status, Some(abort.diagnostic)),
        };
        let elapsed = started.elapsed();

        metrics::counter!(
            m::SCENARIOS_COMPLETED_TOTAL,
            m::LABEL_SCENARIO => scenario.name.clone(),
            m::LABEL_STATUS => status.as_str()
        )
        .increment(1);
        metrics::histogram!(m::SCENARIO_DURATION_SECONDS, m::LABEL_SCENARIO => scenario.name.clone())
            .record(elapsed.as_secs_f64());

        if status == ScenarioStatus::Passed {
            info!(
                scenario = name,
                run_id = run_id,
                duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                teardown_failures = teardown_failures.len(),
                "scenario passed"
            );
        } else {
            error!(
                scenario = name,
                run_id = run_id,
                status = %status,
                diagnostic = diagnostic.as_ref().map_or("", |d| d.message.as_str()),
                "scenario did not pass"
            );
        }

        ScenarioReport {
            name: scenario.name.clone(),
            run_id: run_id.to_owned(),
            status,
            steps: records,
            diagnostic,
            teardown_failures,
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }

    async fn run_steps(
        &self,
        scenario: &Scenario,
        interpreter: &mut Interpreter,
        ledger: &mut Ledger,
        records: &mut Vec<StepRecord>,
    ) -> Result<(), Abort> {
        for (offset, step) in scenario.steps.iter().enumerate() {
            let index = offset + 1;
            if self.cancel.is_cancelled() {
                warn!(scenario = %scenario.name, step = index, "scenario cancelled");
                return Err(Abort::new(
                    ScenarioStatus::Aborted,
                    Some(index),
                    None,
                    "cancelled before step".to_owned(),
                ));
            }
            self.run_step(scenario, index, step, interpreter, ledger, records)
                .await?;
        }
        Ok(())
    }

    async fn run_step(
        &self,
        scenario: &Scenario,
        index: usize,
        step: &Step,
        interpreter: &mut Interpreter,
        ledger: &mut Ledger,
        records: &mut Vec<StepRecord>,
    ) -> Result<(), Abort> {
        let op = &step.operation;
        let name = scenario.name.as_str();
        let before = interpreter.model().snapshot();

        let interpretation = interpreter.interpret(op).map_err(|e| {
            Abort::at(
                ScenarioStatus::HarnessBug,
                index,
                op,
                HarnessError::from(e).to_string(),
            )
        })?;
        if let Expectation::Explicit(declared) = step.expect {
            if declared != interpretation.outcome {
                let conflict = HarnessError::ExpectationConflict {
                    step: index,
                    operation: op.to_string(),
                    declared: declared.to_string(),
                    derived: interpretation.outcome.to_string(),
                };
                return Err(Abort::at(
                    ScenarioStatus::HarnessBug,
                    index,
                    op,
                    conflict.to_string(),
                ));
            }
        }
        let expected = interpretation.outcome;

        let invocation = operation_invocation(op, &self.remote.render_context()).map_err(|e| {
            Abort::at(
                ScenarioStatus::HarnessBug,
                index,
                op,
                HarnessError::from(e).to_string(),
            )
        })?;

        debug!(scenario = name, step = index, operation = %op, expected = %expected, "executing step");
        metrics::counter!(m::STEPS_EXECUTED_TOTAL, m::LABEL_SCENARIO => scenario.name.clone())
            .increment(1);

        let mut record = StepRecord {
            index,
            operation: op.to_string(),
            expected: expected.to_string(),
            observed: None,
            output: String::new(),
            checks: Vec::new(),
        };

        let output = match self.remote.run_with_retry(&invocation, name).await {
            Ok(output) => output,
            Err(e) => {
                let status = if e.is_transport() {
                    ScenarioStatus::InfrastructureFailure
                } else {
                    ScenarioStatus::HarnessBug
                };
                records.push(record);
                return Err(Abort::at(status, index, op, e.to_string()));
            }
        };

        let observed = match self.mode {
            RunMode::Live => classify(&output, invocation.kind),
            RunMode::DryRun => modeled_outcome(expected),
        };
        record.observed = Some(observed.to_string());
        record.output = output.combined();

        if observed == ObservedOutcome::Success {
            ledger.record(op, &before);
        }

        if !outcome_matches(expected, &observed) {
            metrics::counter!(m::STEP_OUTCOME_MISMATCHES_TOTAL, m::LABEL_SCENARIO => scenario.name.clone())
                .increment(1);
            warn!(
                scenario = name,
                step = index,
                operation = %op,
                expected = %expected,
                observed = %observed,
                "step outcome mismatch"
            );
            let message = mismatch_message(op, expected, &observed, &output, records);
            records.push(record);
            return Err(Abort::at(ScenarioStatus::Failed, index, op, message));
        }

        if self.mode == RunMode::Live {
            if let Err(message) = compare_output(&interpretation, &output) {
                records.push(record);
                return Err(Abort::at(ScenarioStatus::Failed, index, op, message));
            }
        }

        let checked = self.run_checks(step, &interpretation, &mut record).await;
        records.push(record);
        checked.map_err(|(status, message)| Abort::at(status, index, op, message))
    }

    async fn run_checks(
        &self,
        step: &Step,
        interpretation: &Interpretation,
        record: &mut StepRecord,
    ) -> Result<(), (ScenarioStatus, String)> {
        for check in &step.checks {
            let expected: ExpectedValue = match &check.expected {
                Some(value) => value.clone(),
                None => interpretation
                    .snapshot
                    .expected(&check.probe)
                    .map_err(|e| (ScenarioStatus::HarnessBug, HarnessError::from(e).to_string()))?,
            };

            let mut check_record = CheckRecord {
                probe: check.probe.to_string(),
                expected: expected.to_string(),
                status: CheckStatus::Unprobed,
                error: None,
            };
            if self.mode == RunMode::DryRun {
                record.checks.push(check_record);
                continue;
            }

            match self.verifier.check(&expected, &check.probe).await {
                Ok(()) => {
                    check_record.status = CheckStatus::Matched;
                    record.checks.push(check_record);
                }
                Err(e) => {
                    let status = match &e {
                        VerifyError::Mismatch { .. } => ScenarioStatus::Failed,
                        VerifyError::Transport { .. } => ScenarioStatus::InfrastructureFailure,
                        VerifyError::Unprobeable { .. } => ScenarioStatus::HarnessBug,
                    };
                    check_record.status = CheckStatus::Mismatched;
                    check_record.error = Some(e.to_string());
                    record.checks.push(check_record);
                    return Err((status, e.to_string()));
                }
            }
        }
        Ok(())
    }
}

/// dry-run에서는 모델의 예상 결과를 관측 결과로 사용합니다.
fn modeled_outcome(expected: Outcome) -> ObservedOutcome {
    match expected {
        Outcome::Success => ObservedOutcome::Success,
        Outcome::Failure(class) => ObservedOutcome::Rejected {
            class: Some(class),
            message: String::new(),
        },
    }
}

/// 읽기 연산의 출력이 기록된 파일 내용과 같은지
fn compare_output(interpretation: &Interpretation, output: &CommandOutput) -> Result<(), String> {
    let Some(expected) = &interpretation.expected_output else {
        return Ok(());
    };
    let actual = output.stdout.trim_end_matches(['\n', '\r']);
    if actual == expected {
        Ok(())
    } else {
        Err(format!("read returned {actual:?}, expected {expected:?}"))
    }
}

fn mismatch_message(
    op: &Operation,
    expected: Outcome,
    observed: &ObservedOutcome,
    output: &CommandOutput,
    history: &[StepRecord],
) -> String {
    let mut message = format!(
        "{op}: expected {expected}, observed {observed}\noutput: {}",
        output.combined().trim()
    );
    if !history.is_empty() {
        message.push_str("\nhistory:");
        for step in history {
            message.push_str(&format!(
                "\n  {}. {} -> {}",
                step.index,
                step.operation,
                step.observed.as_deref().unwrap_or("not executed")
            ));
        }
    }
    message
}
