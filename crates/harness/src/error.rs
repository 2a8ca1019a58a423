//! 하네스 에러 타입
//!
//! [`HarnessError`]는 시나리오 실행을 멈추게 하는 하네스 쪽 문제를,
//! [`VerifyError`]는 검증기의 관측 실패를 표현합니다.

use volprobe_backend::BackendError;
use volprobe_core::error::{ModelFault, VerificationError, VolprobeError};
use volprobe_model::ModelError;

/// 검증기 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    /// 재시도 예산을 모두 쓴 뒤에도 관측값이 기대값과 다름
    #[error("mismatch on {probe}: expected {expected}, observed {actual} after {attempts} attempts")]
    Mismatch {
        probe: String,
        expected: String,
        actual: String,
        attempts: u32,
    },

    /// 모든 시도가 전송 실패
    #[error("probe {probe} unreachable after {attempts} attempts: {source}")]
    Transport {
        probe: String,
        attempts: u32,
        #[source]
        source: BackendError,
    },

    /// 조회 명령을 만들 수 없음 (설정에 없는 호스트, 지원하지 않는 관점)
    #[error("cannot probe {probe}: {source}")]
    Unprobeable {
        probe: String,
        #[source]
        source: BackendError,
    },
}

impl VerifyError {
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

/// 하네스 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// 시나리오에 적힌 예상 결과가 모델 계산과 다름 (시나리오 작성 오류)
    #[error("step {step} ({operation}): declared {declared} but the model derives {derived}")]
    ExpectationConflict {
        step: usize,
        operation: String,
        declared: String,
        derived: String,
    },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Verify(#[from] VerifyError),

    /// 시나리오를 실행할 환경이 부족함
    #[error("environment unsuitable: {0}")]
    Environment(String),

    /// 카탈로그에 없는 시나리오 이름
    #[error("unknown scenario '{0}'")]
    UnknownScenario(String),
}

impl From<VerifyError> for VolprobeError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::Mismatch {
                probe,
                expected,
                actual,
                attempts,
            } => VolprobeError::Verification(VerificationError::Mismatch {
                probe,
                expected,
                actual,
                attempts,
            }),
            VerifyError::Transport { source, .. } | VerifyError::Unprobeable { source, .. } => {
                source.into()
            }
        }
    }
}

impl From<HarnessError> for VolprobeError {
    fn from(err: HarnessError) -> Self {
        match err {
            HarnessError::ExpectationConflict {
                step,
                operation,
                declared,
                derived,
            } => VolprobeError::Model(ModelFault::InvalidTransition {
                operation: format!("step {step}: {operation}"),
                reason: format!("declared {declared} but the model derives {derived}"),
            }),
            HarnessError::Model(e) => e.into(),
            HarnessError::Backend(e) => e.into(),
            HarnessError::Verify(e) => e.into(),
            HarnessError::Environment(what) => {
                VolprobeError::Config(volprobe_core::error::ConfigError::MissingEnvironment {
                    what,
                })
            }
            HarnessError::UnknownScenario(name) => {
                VolprobeError::Config(volprobe_core::error::ConfigError::InvalidValue {
                    field: "scenario".to_owned(),
                    reason: format!("'{name}' is not in the catalog"),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_verify_error_is_infrastructure() {
        let err = VerifyError::Transport {
            probe: "refcount(v)@worker1".to_owned(),
            attempts: 3,
            source: BackendError::Timeout {
                host: "worker1".to_owned(),
                timeout_secs: 30,
            },
        };
        assert!(err.is_transport());
        let root: VolprobeError = err.into();
        assert!(root.is_infrastructure());
    }

    #[test]
    fn conflict_display_names_both_outcomes() {
        let err = HarnessError::ExpectationConflict {
            step: 3,
            operation: "create v on worker1".to_owned(),
            declared: "success".to_owned(),
            derived: "failure(quota_exceeded)".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("step 3"));
        assert!(msg.contains("failure(quota_exceeded)"));
        let root: VolprobeError = err.into();
        assert!(!root.is_infrastructure());
    }
}
