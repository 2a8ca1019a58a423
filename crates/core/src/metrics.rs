//! 메트릭 상수 및 설명 등록
//!
//! 하네스가 기록하는 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::histogram!()`
//! 매크로를 호출합니다. 레코더가 설치되지 않았으면 기록은 무시됩니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `volprobe_`
//! - 모듈명: `scenario_`, `step_`, `probe_`, `teardown_`
//! - 접미어: `_total` (counter), `_seconds` (histogram)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(volprobe_core::metrics::STEPS_EXECUTED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 시나리오 이름 레이블 키
pub const LABEL_SCENARIO: &str = "scenario";

/// 관측 대상 레이블 키 (availability, refcount, ...)
pub const LABEL_OBSERVABLE: &str = "observable";

/// 결과 레이블 키 (passed, failed, aborted, ...)
pub const LABEL_STATUS: &str = "status";

// ─── 시나리오 메트릭 ────────────────────────────────────────────────

/// 완료된 시나리오 수 (counter, label: status)
pub const SCENARIOS_COMPLETED_TOTAL: &str = "volprobe_scenarios_completed_total";

/// 시나리오 소요 시간 (histogram, 초)
pub const SCENARIO_DURATION_SECONDS: &str = "volprobe_scenario_duration_seconds";

// ─── 스텝 메트릭 ────────────────────────────────────────────────────

/// 실행된 스텝 수 (counter)
pub const STEPS_EXECUTED_TOTAL: &str = "volprobe_step_executed_total";

/// 관측 결과가 모델 예측과 다른 스텝 수 (counter)
pub const STEP_OUTCOME_MISMATCHES_TOTAL: &str = "volprobe_step_outcome_mismatches_total";

/// 전송 실패로 재시도된 원격 명령 수 (counter)
pub const TRANSPORT_RETRIES_TOTAL: &str = "volprobe_step_transport_retries_total";

// ─── 검증기 메트릭 ──────────────────────────────────────────────────

/// 관측 시도 수 (counter, label: observable)
pub const PROBE_ATTEMPTS_TOTAL: &str = "volprobe_probe_attempts_total";

/// 재시도 예산 소진 후 불일치로 끝난 검증 수 (counter, label: observable)
pub const PROBE_MISMATCHES_TOTAL: &str = "volprobe_probe_mismatches_total";

// ─── 정리 메트릭 ────────────────────────────────────────────────────

/// 실패한 정리 작업 수 (counter)
pub const TEARDOWN_FAILURES_TOTAL: &str = "volprobe_teardown_failures_total";

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 프로세스 시작 시 한 번 호출합니다. 레코더가 없으면 아무 일도 하지 않습니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!(
        SCENARIOS_COMPLETED_TOTAL,
        "Total number of scenarios completed, by final status"
    );
    describe_histogram!(
        SCENARIO_DURATION_SECONDS,
        "Wall-clock duration of a scenario including teardown, in seconds"
    );
    describe_counter!(
        STEPS_EXECUTED_TOTAL,
        "Total number of scenario steps issued against the backend"
    );
    describe_counter!(
        STEP_OUTCOME_MISMATCHES_TOTAL,
        "Steps whose observed outcome differed from the predicted outcome"
    );
    describe_counter!(
        TRANSPORT_RETRIES_TOTAL,
        "Remote commands retried after a transport failure"
    );
    describe_counter!(
        PROBE_ATTEMPTS_TOTAL,
        "Total number of read-only probe attempts made by the verifier"
    );
    describe_counter!(
        PROBE_MISMATCHES_TOTAL,
        "Checkpoints that still mismatched after the retry budget"
    );
    describe_counter!(
        TEARDOWN_FAILURES_TOTAL,
        "Cleanup actions that failed during scenario teardown"
    );
}
