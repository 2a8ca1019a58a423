//! 상태 모델 에러 타입
//!
//! [`ModelError`]는 하네스 자체의 버그를 나타냅니다. 백엔드가 거부할 것으로
//! 예상되는 연산(쿼터 초과, 권한 없음 등)은 에러가 아니라
//! [`Outcome`](crate::outcome::Outcome)으로 반환됩니다.

use volprobe_core::error::{ModelFault, VolprobeError};

/// 상태 모델 도메인 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// 현재 모델 상태에서 허용되지 않는 연산
    #[error("invalid transition for '{operation}': {reason}")]
    InvalidTransition {
        /// 연산 요약
        operation: String,
        /// 거부 사유
        reason: String,
    },

    /// 모델에서 기대값을 계산할 수 없는 관측 대상
    #[error("cannot derive expectation for '{observable}': {reason}")]
    Unobservable {
        /// 관측 대상 요약
        observable: String,
        /// 사유
        reason: String,
    },
}

impl ModelError {
    pub(crate) fn invalid(operation: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidTransition {
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unobservable(observable: impl ToString, reason: impl Into<String>) -> Self {
        Self::Unobservable {
            observable: observable.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<ModelError> for VolprobeError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::InvalidTransition { operation, reason } => {
                VolprobeError::Model(ModelFault::InvalidTransition { operation, reason })
            }
            ModelError::Unobservable { observable, reason } => {
                VolprobeError::Model(ModelFault::Unobservable { observable, reason })
            }
        }
    }
}
