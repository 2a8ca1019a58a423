//! 원격 명령 실행기
//!
//! [`RemoteExecutor`]는 Docker 호스트와 관리 호스트에서 셸 명령을 실행하는
//! 경계입니다. 운영 환경은 [`SshExecutor`], 시나리오 점검은 [`DryRunExecutor`]를
//! 사용하며 테스트에서는 시뮬레이터를 주입합니다.
//!
//! 실행기는 재시도와 타임아웃을 적용하지 않습니다. 호출자(오케스트레이터, 검증기)가
//! `tokio::time::timeout`으로 감싸고 재시도 정책을 결정합니다.
//!
//! ```text
//!  Orchestrator / Verifier
//!           │
//!           ▼
//!   ┌────────────────┐
//!   │ RemoteExecutor │ (trait)
//!   └────────────────┘
//!      │          │
//!      ▼          ▼
//!  SshExecutor  DryRunExecutor
//!      │
//!      ▼
//!  ssh user@host -- <command>
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use volprobe_core::config::{EnvironmentConfig, SshConfig};
use volprobe_core::types::HostId;

use crate::error::BackendError;

/// ssh가 연결 자체에 실패했을 때의 종료 코드
pub const SSH_TRANSPORT_EXIT_CODE: i32 = 255;

const ADMIN_LABEL: &str = "admin";

/// 명령을 실행할 원격 대상
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    /// 로그/에러에 쓰는 이름 (호스트 별칭 또는 `admin`)
    pub label: String,
    /// SSH 접속 주소
    pub address: String,
}

impl RemoteTarget {
    pub fn new(label: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            address: address.into(),
        }
    }
}

/// 원격 셸에 그대로 전달되는 명령 한 줄
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine(String);

impl CommandLine {
    pub fn new(line: impl Into<String>) -> Self {
        Self(line.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 명령 실행 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    /// 성공 출력
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    /// 실패 출력
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// stdout과 stderr를 합친 텍스트 (실패 메시지 분류용)
    pub fn combined(&self) -> String {
        match (self.stdout.trim(), self.stderr.trim()) {
            ("", err) => err.to_owned(),
            (out, "") => out.to_owned(),
            (out, err) => format!("{out}\n{err}"),
        }
    }
}

/// 원격 명령 실행 추상화
///
/// 시나리오 병렬 실행을 위해 `Send + Sync + 'static`을 요구합니다.
pub trait RemoteExecutor: Send + Sync + 'static {
    /// 대상에서 명령을 실행합니다.
    ///
    /// 명령이 0이 아닌 코드로 끝나도 `Ok`를 반환합니다. `Err`는 명령이 대상에
    /// 도달하지 못한 경우(연결 실패, 프로세스 생성 실패)에만 사용됩니다.
    fn execute(
        &self,
        target: &RemoteTarget,
        command: &CommandLine,
    ) -> impl Future<Output = Result<CommandOutput, BackendError>> + Send;
}

impl<E: RemoteExecutor> RemoteExecutor for Arc<E> {
    fn execute(
        &self,
        target: &RemoteTarget,
        command: &CommandLine,
    ) -> impl Future<Output = Result<CommandOutput, BackendError>> + Send {
        (**self).execute(target, command)
    }
}

/// `ssh` 프로세스로 명령을 실행하는 운영용 실행기
#[derive(Debug, Clone)]
pub struct SshExecutor {
    config: SshConfig,
}

impl SshExecutor {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    /// `ssh`에 넘길 인자 목록
    pub fn build_args(&self, target: &RemoteTarget, command: &CommandLine) -> Vec<String> {
        let mut args = vec![
            "-o".to_owned(),
            "BatchMode=yes".to_owned(),
            "-o".to_owned(),
            format!("ConnectTimeout={}", self.config.connect_timeout_secs),
            "-p".to_owned(),
            self.config.port.to_string(),
        ];
        if !self.config.identity_file.is_empty() {
            args.push("-i".to_owned());
            args.push(self.config.identity_file.clone());
        }
        for option in &self.config.extra_options {
            args.push("-o".to_owned());
            args.push(option.clone());
        }
        if self.config.user.is_empty() {
            args.push(target.address.clone());
        } else {
            args.push(format!("{}@{}", self.config.user, target.address));
        }
        args.push("--".to_owned());
        args.push(command.as_str().to_owned());
        args
    }
}

impl RemoteExecutor for SshExecutor {
    async fn execute(
        &self,
        target: &RemoteTarget,
        command: &CommandLine,
    ) -> Result<CommandOutput, BackendError> {
        debug!(host = %target.label, command = %command, "executing remote command");

        let output = Command::new("ssh")
            .args(self.build_args(target, command))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| BackendError::Spawn {
                program: "ssh".to_owned(),
                reason: e.to_string(),
            })?;

        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if exit_code == SSH_TRANSPORT_EXIT_CODE {
            warn!(host = %target.label, stderr = stderr.trim(), "ssh transport failure");
            return Err(BackendError::Transport {
                host: target.label.clone(),
                reason: stderr.trim().to_owned(),
            });
        }

        debug!(host = %target.label, exit_code, "remote command finished");
        Ok(CommandOutput {
            stdout,
            stderr,
            exit_code,
        })
    }
}

/// 명령을 기록만 하고 항상 성공을 반환하는 실행기
#[derive(Debug, Default)]
pub struct DryRunExecutor {
    commands: Mutex<Vec<(String, String)>>,
}

impl DryRunExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 기록된 `(대상, 명령)` 목록
    pub async fn commands(&self) -> Vec<(String, String)> {
        self.commands.lock().await.clone()
    }
}

impl RemoteExecutor for DryRunExecutor {
    async fn execute(
        &self,
        target: &RemoteTarget,
        command: &CommandLine,
    ) -> Result<CommandOutput, BackendError> {
        debug!(host = %target.label, command = %command, "dry-run command");
        self.commands
            .lock()
            .await
            .push((target.label.clone(), command.as_str().to_owned()));
        Ok(CommandOutput::ok(""))
    }
}

/// 명령이 실행될 위치
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetRef {
    Host(HostId),
    Admin,
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host(host) => host.fmt(f),
            Self::Admin => f.write_str(ADMIN_LABEL),
        }
    }
}

/// 호스트 별칭을 SSH 접속 대상으로 변환합니다.
#[derive(Debug, Clone)]
pub struct TargetResolver {
    admin: RemoteTarget,
    hosts: BTreeMap<HostId, RemoteTarget>,
}

impl TargetResolver {
    pub fn from_config(env: &EnvironmentConfig) -> Self {
        let hosts = env
            .hosts
            .iter()
            .map(|h| (h.id(), RemoteTarget::new(h.alias.clone(), h.address.clone())))
            .collect();
        Self {
            admin: RemoteTarget::new(ADMIN_LABEL, env.admin_host.clone()),
            hosts,
        }
    }

    pub fn resolve(&self, target: &TargetRef) -> Result<&RemoteTarget, BackendError> {
        match target {
            TargetRef::Admin => Ok(&self.admin),
            TargetRef::Host(host) => self
                .hosts
                .get(host)
                .ok_or_else(|| BackendError::UnknownHost(host.to_string())),
        }
    }
}
