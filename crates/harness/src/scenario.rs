//! 시나리오 정의
//!
//! 시나리오는 연산 단계의 순서 목록입니다. 각 단계는 예상 결과
//! (모델이 계산하거나 명시)와 실행 뒤 확인할 관측 지점을 가집니다.

use serde::{Deserialize, Serialize};
use volprobe_core::types::{GroupName, HostId};
use volprobe_model::{ExpectedValue, FailureClass, Operation, Outcome, ProbeSpec};

/// 단계의 예상 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    /// 모델이 계산한 결과를 그대로 사용
    #[default]
    Derived,
    /// 시나리오 작성자가 명시. 모델 결과와 다르면 하네스 버그
    Explicit(Outcome),
}

/// 관측 지점. `expected`가 없으면 모델 스냅샷에서 계산합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    pub probe: ProbeSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<ExpectedValue>,
}

/// 시나리오 단계
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub operation: Operation,
    #[serde(default)]
    pub expect: Expectation,
    #[serde(default)]
    pub checks: Vec<Check>,
}

impl Step {
    pub fn new(operation: impl Into<Operation>) -> Self {
        Self {
            operation: operation.into(),
            expect: Expectation::Derived,
            checks: Vec::new(),
        }
    }

    pub fn expect(mut self, outcome: Outcome) -> Self {
        self.expect = Expectation::Explicit(outcome);
        self
    }

    pub fn expect_success(self) -> Self {
        self.expect(Outcome::Success)
    }

    pub fn expect_failure(self, class: FailureClass) -> Self {
        self.expect(Outcome::Failure(class))
    }

    /// 모델 기대값과 비교할 관측 지점 추가
    pub fn check(mut self, probe: ProbeSpec) -> Self {
        self.checks.push(Check {
            probe,
            expected: None,
        });
        self
    }

    /// 고정 기대값과 비교할 관측 지점 추가
    pub fn check_value(mut self, probe: ProbeSpec, expected: ExpectedValue) -> Self {
        self.checks.push(Check {
            probe,
            expected: Some(expected),
        });
        self
    }
}

/// 실행 가능한 시나리오
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// 필요한 최소 Docker 호스트 수
    #[serde(default = "default_min_hosts")]
    pub min_hosts: usize,
    /// vSAN 데이터스토어 필요 여부
    #[serde(default)]
    pub requires_vsan: bool,
    /// 다른 그룹의 볼륨 삭제가 허용된 (호스트, 그룹)
    #[serde(default)]
    pub foreign_delete_grants: Vec<(HostId, GroupName)>,
    pub steps: Vec<Step>,
}

fn default_min_hosts() -> usize {
    1
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            min_hosts: default_min_hosts(),
            requires_vsan: false,
            foreign_delete_grants: Vec::new(),
            steps: Vec::new(),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn min_hosts(mut self, count: usize) -> Self {
        self.min_hosts = count;
        self
    }

    pub fn requires_vsan(mut self) -> Self {
        self.requires_vsan = true;
        self
    }

    pub fn grant_foreign_delete(mut self, host: impl Into<HostId>, group: GroupName) -> Self {
        self.foreign_delete_grants.push((host.into(), group));
        self
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps.extend(steps);
        self
    }
}
