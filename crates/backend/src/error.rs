//! 백엔드 에러 타입
//!
//! [`BackendError`]는 원격 명령 실행과 출력 해석 중의 실패를 표현합니다.
//! 백엔드가 연산을 거부한 것은 에러가 아니라
//! [`ObservedOutcome`](crate::classify::ObservedOutcome)으로 보고됩니다.

use volprobe_core::error::{ConfigError, TransportError, VerificationError, VolprobeError};

/// 백엔드 도메인 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// SSH 연결 실패 (종료 코드 255)
    #[error("transport to '{host}' failed: {reason}")]
    Transport {
        /// 대상 호스트 별칭
        host: String,
        /// 실패 사유 (ssh stderr)
        reason: String,
    },

    /// 호출자가 지정한 시간 안에 명령이 끝나지 않음
    #[error("command on '{host}' timed out after {timeout_secs}s")]
    Timeout {
        /// 대상 호스트 별칭
        host: String,
        /// 적용된 타임아웃
        timeout_secs: u64,
    },

    /// 로컬 프로세스 생성 실패
    #[error("failed to spawn '{program}': {reason}")]
    Spawn {
        /// 실행 파일
        program: String,
        /// 실패 사유
        reason: String,
    },

    /// 조회 명령 출력 해석 실패
    #[error("cannot parse {what}: {reason}")]
    Parse {
        /// 해석 대상
        what: String,
        /// 실패 사유
        reason: String,
    },

    /// 설정에 없는 호스트
    #[error("unknown host '{0}'")]
    UnknownHost(String),
}

impl BackendError {
    /// 재시도하면 성공할 수 있는 전송 계층 실패인지
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Timeout { .. } | Self::Spawn { .. }
        )
    }

    pub(crate) fn parse(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            what: what.into(),
            reason: reason.into(),
        }
    }
}

impl From<BackendError> for VolprobeError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Transport { host, reason } => {
                VolprobeError::Transport(TransportError::Unreachable { host, reason })
            }
            BackendError::Timeout { host, timeout_secs } => {
                VolprobeError::Transport(TransportError::Timeout { host, timeout_secs })
            }
            BackendError::Spawn { program, reason } => {
                VolprobeError::Transport(TransportError::Spawn(format!("{program}: {reason}")))
            }
            BackendError::Parse { what, reason } => {
                VolprobeError::Verification(VerificationError::Unparsable {
                    probe: what,
                    reason,
                })
            }
            BackendError::UnknownHost(host) => VolprobeError::Config(ConfigError::InvalidValue {
                field: "environment.hosts".to_owned(),
                reason: format!("host '{host}' is not configured"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_retryable() {
        let err = BackendError::Transport {
            host: "worker1".to_owned(),
            reason: "connection refused".to_owned(),
        };
        assert!(err.is_transport());
        assert!(!BackendError::UnknownHost("x".to_owned()).is_transport());
    }

    #[test]
    fn timeout_converts_to_infrastructure_error() {
        let err: VolprobeError = BackendError::Timeout {
            host: "worker1".to_owned(),
            timeout_secs: 30,
        }
        .into();
        assert!(err.is_infrastructure());
        assert!(err.to_string().contains("30s"));
    }

    #[test]
    fn parse_error_converts_to_verification_error() {
        let err: VolprobeError = BackendError::parse("volume status", "not json").into();
        assert!(matches!(
            err,
            VolprobeError::Verification(VerificationError::Unparsable { .. })
        ));
    }
}
