//! 연산 결과 분류

use std::fmt;

use serde::{Deserialize, Serialize};

/// 백엔드가 연산을 거부할 때 예상되는 실패 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// 단일 볼륨 최대 크기 또는 그룹 총량 초과
    QuotaExceeded,
    /// 생성 권한 없음, 다른 그룹의 볼륨 접근, 읽기 전용 볼륨 쓰기
    AccessDenied,
    /// 호스트의 그룹에서 볼 수 없는 볼륨 조회
    NotVisible,
    /// 이름 규칙 위반 또는 알 수 없는 데이터스토어
    InvalidName,
    /// 생성 옵션 위반
    InvalidOption,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuotaExceeded => "quota_exceeded",
            Self::AccessDenied => "access_denied",
            Self::NotVisible => "not_visible",
            Self::InvalidName => "invalid_name",
            Self::InvalidOption => "invalid_option",
        }
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 연산의 예상 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "class", rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure(FailureClass),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn failure_class(&self) -> Option<FailureClass> {
        match self {
            Self::Success => None,
            Self::Failure(class) => Some(*class),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Failure(class) => write!(f, "failure({class})"),
        }
    }
}
