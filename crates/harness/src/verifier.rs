//! 검증기 — 관측 상태를 기대값과 비교합니다.
//!
//! 백엔드는 최종적으로 일관되므로 불일치는 지수 백오프
//! (`base_delay * 2^n`, `max_delay` 상한)로 `max_attempts`번까지 다시 조회합니다.
//! 검증기는 조회 명령만 실행하며 상태를 바꾸지 않습니다.

use std::time::Duration;

use tracing::{debug, warn};
use volprobe_backend::{BackendError, RemoteExecutor, parse_probe, probe_invocation};
use volprobe_core::config::VerifierConfig;
use volprobe_core::metrics as m;
use volprobe_model::{ExpectedValue, ObservableValue, ProbeSpec};

use crate::error::VerifyError;
use crate::remote::Remote;

/// 조회 재시도 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub probe_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &VerifierConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
        }
    }

    /// `attempt`번째 재시도 전 대기 시간 (0부터)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&VerifierConfig::default())
    }
}

/// 조회 스펙을 실행하고 기대값과 비교하는 검증기
pub struct Verifier<E> {
    remote: Remote<E>,
    policy: RetryPolicy,
}

impl<E: RemoteExecutor> Verifier<E> {
    pub fn new(remote: Remote<E>) -> Self {
        let policy = RetryPolicy::from_config(&remote.config().verifier);
        Self { remote, policy }
    }

    pub fn with_policy(remote: Remote<E>, policy: RetryPolicy) -> Self {
        Self { remote, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// 한 번 조회해서 관측값을 반환합니다.
    pub async fn observe(&self, spec: &ProbeSpec) -> Result<ObservableValue, BackendError> {
        let invocation = probe_invocation(spec, &self.remote.render_context())?;
        let output = self.remote.run(&invocation, self.policy.probe_timeout).await?;
        parse_probe(spec, &output, &self.remote.config().environment)
    }

    /// 관측값이 기대값과 같아질 때까지 백오프하며 조회합니다.
    pub async fn check(&self, expected: &ExpectedValue, spec: &ProbeSpec) -> Result<(), VerifyError> {
        let ctx = self.remote.render_context();
        let invocation = probe_invocation(spec, &ctx).map_err(|source| VerifyError::Unprobeable {
            probe: spec.to_string(),
            source,
        })?;
        let kind = spec.observable.kind();
        let environment = &self.remote.config().environment;

        let mut last_actual: Option<String> = None;
        let mut last_transport: Option<BackendError> = None;

        for attempt in 0..self.policy.max_attempts {
            if attempt > 0 {
                let delay = self.policy.delay_for(attempt - 1);
                debug!(
                    probe = %spec,
                    attempt = attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "probe mismatch, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            metrics::counter!(m::PROBE_ATTEMPTS_TOTAL, m::LABEL_OBSERVABLE => kind).increment(1);

            let observed = match self.remote.run(&invocation, self.policy.probe_timeout).await {
                Ok(output) => parse_probe(spec, &output, environment),
                Err(e) => Err(e),
            };

            match observed {
                Ok(actual) if actual == *expected => {
                    debug!(probe = %spec, value = %actual, attempts = attempt + 1, "probe matched");
                    return Ok(());
                }
                Ok(actual) => last_actual = Some(actual.to_string()),
                Err(e) if e.is_transport() => {
                    warn!(probe = %spec, error = %e, "probe transport failure");
                    last_transport = Some(e);
                }
                Err(e @ BackendError::Parse { .. }) => {
                    last_actual = Some(format!("unreadable ({e})"));
                }
                Err(source) => {
                    return Err(VerifyError::Unprobeable {
                        probe: spec.to_string(),
                        source,
                    });
                }
            }
        }

        let attempts = self.policy.max_attempts;
        match (last_actual, last_transport) {
            (None, Some(source)) => Err(VerifyError::Transport {
                probe: spec.to_string(),
                attempts,
                source,
            }),
            (actual, _) => {
                metrics::counter!(m::PROBE_MISMATCHES_TOTAL, m::LABEL_OBSERVABLE => kind)
                    .increment(1);
                let actual = actual.unwrap_or_else(|| "nothing".to_owned());
                warn!(
                    probe = %spec,
                    expected = %expected,
                    actual = actual.as_str(),
                    attempts = attempts,
                    "probe mismatch after retry budget"
                );
                Err(VerifyError::Mismatch {
                    probe: spec.to_string(),
                    expected: expected.to_string(),
                    actual,
                    attempts,
                })
            }
        }
    }
}
