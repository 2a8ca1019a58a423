//! # volprobe-harness
//!
//! 상태 모델과 백엔드 어댑터를 묶어 시나리오를 실행하는 하네스입니다.
//!
//! # 모듈 구성
//!
//! - [`naming`]: 실행마다 겹치지 않는 볼륨, 컨테이너, 그룹 이름
//! - [`remote`]: 타임아웃과 전송 재시도를 적용한 원격 실행
//! - [`verifier`]: 관측값이 기대값에 수렴할 때까지 재시도하는 검증기
//! - [`scenario`]: 단계와 검사로 이루어진 시나리오 정의
//! - [`orchestrator`]: 단계 실행, 결과 비교, 보고서 작성
//! - [`teardown`]: 시나리오가 만든 리소스 기록과 역순 정리
//! - [`report`]: 시나리오와 묶음 실행 보고서
//! - [`catalog`]: 기본 시나리오 카탈로그
//! - [`suite`]: 카탈로그 시나리오 병렬 실행
//!
//! ```text
//! catalog ──▶ suite ──▶ ScenarioRunner ──▶ Interpreter (모델)
//!                            │
//!                            ├──▶ Remote ──▶ RemoteExecutor
//!                            ├──▶ Verifier
//!                            └──▶ Ledger ──▶ teardown
//! ```

pub mod catalog;
pub mod error;
pub mod naming;
pub mod orchestrator;
pub mod remote;
pub mod report;
pub mod scenario;
pub mod suite;
pub mod teardown;
pub mod verifier;

// --- 주요 타입 re-export ---

pub use error::{HarnessError, VerifyError};
pub use naming::ResourceNamer;
pub use orchestrator::{RunMode, ScenarioRunner};
pub use remote::Remote;
pub use report::{
    CheckRecord, CheckStatus, Diagnostic, ScenarioReport, ScenarioStatus, StepRecord,
    SuiteReport, TeardownFailure,
};
pub use scenario::{Check, Expectation, Scenario, Step};
pub use suite::{Prepared, prepare, run_suite, select};
pub use verifier::{RetryPolicy, Verifier};

// 카탈로그
pub use catalog::{ScenarioContext, ScenarioTemplate, catalog, find};
