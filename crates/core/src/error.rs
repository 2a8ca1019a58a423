//! 에러 타입 — 도메인별 에러 정의
//!
//! 각 크레이트는 자체 에러 enum을 가지고, `From` 구현으로
//! [`VolprobeError`]로 변환되어 상위 레이어에서 `?`로 전파됩니다.

/// volprobe 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum VolprobeError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 상태 모델 에러 (하네스 버그)
    #[error("model error: {0}")]
    Model(#[from] ModelFault),

    /// 원격 실행 전송 에러 (인프라 장애)
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// 검증 실패 (관측 상태 불일치)
    #[error("verification error: {0}")]
    Verification(#[from] VerificationError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl VolprobeError {
    /// 인프라 장애(호스트 접근 불가 등)인지 여부를 반환합니다.
    ///
    /// 로직 실패와 구분하여 보고할 때 사용합니다.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Io(_))
    }
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// 시나리오 실행에 필요한 환경 정보 누락
    #[error("environment is missing {what}")]
    MissingEnvironment { what: String },
}

/// 상태 모델 에러
#[derive(Debug, thiserror::Error)]
pub enum ModelFault {
    /// 현재 상태에서 허용되지 않는 연산
    #[error("invalid transition for '{operation}': {reason}")]
    InvalidTransition { operation: String, reason: String },

    /// 기대값을 계산할 수 없는 관측 대상
    #[error("cannot derive expectation for '{observable}': {reason}")]
    Unobservable { observable: String, reason: String },
}

/// 원격 실행 전송 에러
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// 호스트에 연결할 수 없음
    #[error("host '{host}' unreachable: {reason}")]
    Unreachable { host: String, reason: String },

    /// 명령 실행 시간 초과
    #[error("command on '{host}' timed out after {timeout_secs}s")]
    Timeout { host: String, timeout_secs: u64 },

    /// 로컬 프로세스 생성 실패
    #[error("failed to spawn transport process: {0}")]
    Spawn(String),
}

/// 검증 에러
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    /// 재시도 예산 소진 후에도 관측값이 기대값과 다름
    #[error("mismatch on {probe}: expected {expected}, observed {actual} after {attempts} attempts")]
    Mismatch {
        probe: String,
        expected: String,
        actual: String,
        attempts: u32,
    },

    /// 명령 출력 파싱 실패
    #[error("unparsable output for {probe}: {reason}")]
    Unparsable { probe: String, reason: String },
}
