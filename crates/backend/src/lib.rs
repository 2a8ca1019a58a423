//! volprobe 백엔드 경계
//!
//! 상태 모델의 연산과 조회 스펙을 실제 관리 CLI / Docker 명령으로 바꾸고,
//! 원격 호스트에서 실행한 뒤 그 출력을 해석합니다.
//!
//! # 모듈 구성
//!
//! - [`executor`]: [`RemoteExecutor`] trait, SSH/dry-run 실행기, 대상 해석
//! - [`command`]: 타입 있는 명령 렌더링 (`docker ...`, `vmdkops_admin.py ...`)
//! - [`parse`]: 조회 출력 파서 (상태 JSON, 관리 CLI 표)
//! - [`classify`]: 실패 메시지 분류와 예상 결과 비교
//! - [`error`]: 도메인 에러 타입

pub mod classify;
pub mod command;
pub mod error;
pub mod executor;
pub mod parse;

// --- 주요 타입 re-export ---

pub use classify::{ObservedOutcome, classify, outcome_matches};
pub use command::{Invocation, InvocationKind, RenderContext, operation_invocation, probe_invocation};
pub use error::BackendError;
pub use executor::{
    CommandLine, CommandOutput, DryRunExecutor, RemoteExecutor, RemoteTarget, SshExecutor,
    TargetRef, TargetResolver,
};
pub use parse::parse_probe;
