//! 원격 실행 래퍼
//!
//! 실행기, 대상 해석기, 설정을 묶어 렌더링된 [`Invocation`]을 타임아웃과 함께
//! 실행합니다. 전송 실패 재시도는 여기서만 일어납니다.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use volprobe_backend::{
    BackendError, CommandOutput, Invocation, RemoteExecutor, RenderContext, TargetResolver,
};
use volprobe_core::config::HarnessConfig;
use volprobe_core::metrics as m;

/// 실행기와 환경 설정을 공유하는 원격 실행 핸들
pub struct Remote<E> {
    executor: Arc<E>,
    resolver: TargetResolver,
    config: Arc<HarnessConfig>,
}

impl<E> Clone for Remote<E> {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
            resolver: self.resolver.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<E: RemoteExecutor> Remote<E> {
    pub fn new(executor: Arc<E>, config: Arc<HarnessConfig>) -> Self {
        let resolver = TargetResolver::from_config(&config.environment);
        Self {
            executor,
            resolver,
            config,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn executor(&self) -> &Arc<E> {
        &self.executor
    }

    pub fn render_context(&self) -> RenderContext<'_> {
        RenderContext::new(&self.config.backend, &self.config.environment)
    }

    /// 명령 실행 타임아웃 (`runner.command_timeout_secs`)
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.config.runner.command_timeout_secs)
    }

    /// 한 번 실행합니다. 시간이 초과되면 [`BackendError::Timeout`]
    pub async fn run(
        &self,
        invocation: &Invocation,
        timeout: Duration,
    ) -> Result<CommandOutput, BackendError> {
        let target = self.resolver.resolve(&invocation.target)?;
        debug!(host = %target.label, command = %invocation.command, "executing");

        match tokio::time::timeout(timeout, self.executor.execute(target, &invocation.command))
            .await
        {
            Ok(result) => result,
            Err(_elapsed) => Err(BackendError::Timeout {
                host: target.label.clone(),
                timeout_secs: timeout.as_secs(),
            }),
        }
    }

    /// 전송 실패만 `runner.transport_retries`번까지 재시도합니다.
    pub async fn run_with_retry(
        &self,
        invocation: &Invocation,
        scenario: &str,
    ) -> Result<CommandOutput, BackendError> {
        let max_retries = self.config.runner.transport_retries;
        let backoff_base = Duration::from_millis(self.config.verifier.base_delay_ms);
        let timeout = self.command_timeout();
        let mut last_error = None;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                let backoff = backoff_base * attempt;
                warn!(
                    scenario = scenario,
                    target = %invocation.target,
                    attempt = attempt,
                    backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                    "retrying command after transport failure"
                );
                metrics::counter!(m::TRANSPORT_RETRIES_TOTAL, m::LABEL_SCENARIO => scenario.to_owned())
                    .increment(1);
                tokio::time::sleep(backoff).await;
            }

            match self.run(invocation, timeout).await {
                Ok(output) => return Ok(output),
                Err(e) if e.is_transport() => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| BackendError::Transport {
            host: invocation.target.to_string(),
            reason: "no attempt made".to_owned(),
        }))
    }
}
