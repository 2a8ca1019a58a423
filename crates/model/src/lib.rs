//! volprobe 상태 모델
//!
//! 볼륨 플러그인 클러스터가 시나리오 동안 어떤 상태여야 하는지를 순수하게 계산합니다.
//! I/O가 없으므로 하네스 없이도 단독으로 테스트할 수 있습니다.
//!
//! # 모듈 구성
//!
//! - [`name`]: 볼륨 이름 문법 (`base[@datastore]`)
//! - [`options`]: 생성 옵션 (`-o key=value`) 검증
//! - [`storage_policy`]: vSAN 스토리지 정책 내용 검증
//! - [`group`]: vmgroup 레코드와 데이터스토어별 정책
//! - [`operation`]: 하네스가 발행하는 도메인 연산
//! - [`state`]: 불변 스냅샷 기반 상태 모델
//! - [`interpreter`]: 연산별 예상 결과와 상태 변경 계산
//! - [`observable`]: 관측 대상과 기대값
//! - [`outcome`]: 예상 결과 분류
//! - [`error`]: 도메인 에러 타입
//!
//! # 흐름
//!
//! ```text
//! Operation -> Interpreter::interpret -> (Outcome, ExpectedStateSnapshot)
//!                                              |
//!                            ProbeSpec -> snapshot.expected() -> ExpectedValue
//! ```

pub mod error;
pub mod group;
pub mod interpreter;
pub mod name;
pub mod observable;
pub mod operation;
pub mod options;
pub mod outcome;
pub mod state;
pub mod storage_policy;

#[cfg(test)]
mod test_support;

// --- 주요 타입 re-export ---

// 에러
pub use error::ModelError;

// 상태 모델
pub use interpreter::{Interpretation, Interpreter};
pub use state::{
    AttachmentKey, ExpectedStateSnapshot, ModelEnvironment, Resolution, StateModel, VolumeKey,
    VolumeRecord,
};

// 연산과 결과
pub use operation::{CreateVolume, MembershipChange, Operation};
pub use outcome::{FailureClass, Outcome};

// 관측
pub use observable::{AttachState, ExpectedValue, Observable, ObservableValue, ProbeSpec, ProbeView};

// 그룹/이름/옵션
pub use group::{DatastorePolicy, GroupRecord, PolicyUpdate, SizeLimit};
pub use name::{NameError, VolumeName};
pub use options::{OptionError, VolumeOptions};
pub use storage_policy::StoragePolicy;
