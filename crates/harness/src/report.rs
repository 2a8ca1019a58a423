//! 시나리오 실행 보고서
//!
//! 보고서는 단계 기록 전체를 담으며 CLI가 텍스트나 JSON으로 출력합니다.

use std::fmt;

use serde::Serialize;

/// 시나리오 최종 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    /// 모든 단계와 관측 지점이 일치
    Passed,
    /// 백엔드 동작이 모델과 다름
    Failed,
    /// 취소됨
    Aborted,
    /// 호스트 접근 불가 등 인프라 장애
    InfrastructureFailure,
    /// 시나리오 또는 모델 오류
    HarnessBug,
    /// 환경이 시나리오 요구사항을 만족하지 않음
    Skipped,
}

impl ScenarioStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
            Self::InfrastructureFailure => "infrastructure_failure",
            Self::HarnessBug => "harness_bug",
            Self::Skipped => "skipped",
        }
    }

    /// 실패로 집계되는 상태인지
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Passed | Self::Skipped)
    }
}

impl fmt::Display for ScenarioStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 관측 지점 판정
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Matched,
    Mismatched,
    /// 조회하지 않음 (dry-run)
    Unprobed,
}

/// 관측 지점 하나의 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckRecord {
    pub probe: String,
    pub expected: String,
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 실행된 단계 기록
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub index: usize,
    pub operation: String,
    pub expected: String,
    /// 관측 결과. 명령을 실행하지 못했으면 `None`
    pub observed: Option<String>,
    /// 명령 출력 (stdout + stderr)
    pub output: String,
    pub checks: Vec<CheckRecord>,
}

/// 실패 진단
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// 실패한 단계 번호
    pub step: Option<usize>,
    pub operation: Option<String>,
    pub message: String,
}

/// 정리 작업 실패
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeardownFailure {
    pub action: String,
    pub error: String,
}

/// 시나리오 하나의 실행 보고서
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub run_id: String,
    pub status: ScenarioStatus,
    pub steps: Vec<StepRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<Diagnostic>,
    pub teardown_failures: Vec<TeardownFailure>,
    pub duration_ms: u64,
}

impl ScenarioReport {
    /// 실행하지 않은 시나리오 보고서
    pub fn skipped(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            run_id: String::new(),
            status: ScenarioStatus::Skipped,
            steps: Vec::new(),
            diagnostic: Some(Diagnostic {
                step: None,
                operation: None,
                message: reason.into(),
            }),
            teardown_failures: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn passed(&self) -> bool {
        self.status == ScenarioStatus::Passed
    }

    /// 본 실행은 통과했지만 정리가 일부 실패함
    pub fn teardown_incomplete(&self) -> bool {
        !self.teardown_failures.is_empty()
    }
}

/// 여러 시나리오의 실행 결과
#[derive(Debug, Clone, Default, Serialize)]
pub struct SuiteReport {
    pub scenarios: Vec<ScenarioReport>,
}

impl SuiteReport {
    pub fn count(&self, status: ScenarioStatus) -> usize {
        self.scenarios.iter().filter(|r| r.status == status).count()
    }

    pub fn all_passed(&self) -> bool {
        self.scenarios.iter().all(|r| !r.status.is_failure())
    }

    pub fn any_teardown_failures(&self) -> bool {
        self.scenarios.iter().any(ScenarioReport::teardown_incomplete)
    }

    /// 가장 심각한 상태 (하네스 버그 > 인프라 > 실패 > 취소)
    pub fn worst_status(&self) -> Option<ScenarioStatus> {
        const ORDER: [ScenarioStatus; 4] = [
            ScenarioStatus::HarnessBug,
            ScenarioStatus::InfrastructureFailure,
            ScenarioStatus::Failed,
            ScenarioStatus::Aborted,
        ];
        ORDER
            .into_iter()
            .find(|status| self.scenarios.iter().any(|r| r.status == *status))
    }
}
