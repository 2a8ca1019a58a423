//! 설정 관리 — volprobe.toml 파싱 및 런타임 설정
//!
//! [`HarnessConfig`]는 테스트 환경(호스트, 데이터스토어), SSH 전송,
//! 백엔드 CLI 경로, 검증기 재시도 정책, 실행기 설정을 담는 최상위 구조체입니다.
//! 프로세스 전역 상태 없이 시나리오 실행기에 명시적으로 전달됩니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`VOLPROBE_SSH_USER=root` 형식)
//! 3. 설정 파일 (`volprobe.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), volprobe_core::error::VolprobeError> {
//! use volprobe_core::config::HarnessConfig;
//!
//! let config = HarnessConfig::load("volprobe.toml").await?;
//! let config = HarnessConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, VolprobeError};
use crate::types::{DatastoreName, HostId, VM_DATASTORE};

/// volprobe 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// 일반 설정 (로깅)
    #[serde(default)]
    pub general: GeneralConfig,
    /// 테스트 환경 (호스트, 데이터스토어)
    #[serde(default)]
    pub environment: EnvironmentConfig,
    /// SSH 전송 설정
    #[serde(default)]
    pub ssh: SshConfig,
    /// 백엔드 CLI 설정
    #[serde(default)]
    pub backend: BackendConfig,
    /// 검증기 재시도 정책
    #[serde(default)]
    pub verifier: VerifierConfig,
    /// 시나리오 실행기 설정
    #[serde(default)]
    pub runner: RunnerConfig,
}

/// 설정 상한값 상수
const MAX_VERIFY_ATTEMPTS: u32 = 20;
const MAX_BACKOFF_MS: u64 = 120_000;
const MAX_TIMEOUT_SECS: u64 = 3600;
const MAX_PARALLEL_SCENARIOS: usize = 32;
const MAX_TRANSPORT_RETRIES: u32 = 10;

impl HarnessConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, VolprobeError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, VolprobeError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VolprobeError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                VolprobeError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, VolprobeError> {
        toml::from_str(toml_str).map_err(|e| {
            VolprobeError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `VOLPROBE_{SECTION}_{FIELD}`
    ///
    /// 호스트 목록은 `VOLPROBE_ENVIRONMENT_HOSTS`에
    /// `alias=role:address:vm_name` 항목을 쉼표로 구분하여 지정합니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "VOLPROBE_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "VOLPROBE_GENERAL_LOG_FORMAT");

        // Environment
        override_string(
            &mut self.environment.admin_host,
            "VOLPROBE_ENVIRONMENT_ADMIN_HOST",
        );
        override_csv(
            &mut self.environment.datastores,
            "VOLPROBE_ENVIRONMENT_DATASTORES",
        );
        override_string(
            &mut self.environment.vm_datastore,
            "VOLPROBE_ENVIRONMENT_VM_DATASTORE",
        );
        if let Ok(val) = std::env::var("VOLPROBE_ENVIRONMENT_HOSTS") {
            match parse_host_list(&val) {
                Ok(hosts) => self.environment.hosts = hosts,
                Err(reason) => warn!(
                    env_key = "VOLPROBE_ENVIRONMENT_HOSTS",
                    reason = reason.as_str(),
                    "failed to parse host list from env var, ignoring"
                ),
            }
        }

        // SSH
        override_string(&mut self.ssh.user, "VOLPROBE_SSH_USER");
        override_parsed(&mut self.ssh.port, "VOLPROBE_SSH_PORT");
        override_string(&mut self.ssh.identity_file, "VOLPROBE_SSH_IDENTITY_FILE");
        override_parsed(
            &mut self.ssh.connect_timeout_secs,
            "VOLPROBE_SSH_CONNECT_TIMEOUT_SECS",
        );

        // Backend
        override_string(&mut self.backend.admin_cli, "VOLPROBE_BACKEND_ADMIN_CLI");
        override_string(
            &mut self.backend.volume_driver,
            "VOLPROBE_BACKEND_VOLUME_DRIVER",
        );
        override_string(
            &mut self.backend.shared_driver,
            "VOLPROBE_BACKEND_SHARED_DRIVER",
        );
        override_string(&mut self.backend.helper_image, "VOLPROBE_BACKEND_HELPER_IMAGE");

        // Verifier
        override_parsed(
            &mut self.verifier.max_attempts,
            "VOLPROBE_VERIFIER_MAX_ATTEMPTS",
        );
        override_parsed(
            &mut self.verifier.base_delay_ms,
            "VOLPROBE_VERIFIER_BASE_DELAY_MS",
        );
        override_parsed(
            &mut self.verifier.max_delay_ms,
            "VOLPROBE_VERIFIER_MAX_DELAY_MS",
        );
        override_parsed(
            &mut self.verifier.probe_timeout_secs,
            "VOLPROBE_VERIFIER_PROBE_TIMEOUT_SECS",
        );

        // Runner
        override_parsed(
            &mut self.runner.command_timeout_secs,
            "VOLPROBE_RUNNER_COMMAND_TIMEOUT_SECS",
        );
        override_parsed(
            &mut self.runner.max_parallel_scenarios,
            "VOLPROBE_RUNNER_MAX_PARALLEL_SCENARIOS",
        );
        override_parsed(
            &mut self.runner.transport_retries,
            "VOLPROBE_RUNNER_TRANSPORT_RETRIES",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// 환경 정보(호스트, 데이터스토어)의 존재 여부는 검사하지 않습니다.
    /// 시나리오 실행 전에는 [`EnvironmentConfig::require_hosts`]로 별도 확인합니다.
    pub fn validate(&self) -> Result<(), VolprobeError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        let mut aliases = BTreeSet::new();
        for host in &self.environment.hosts {
            if host.alias.is_empty() || host.address.is_empty() {
                return Err(invalid(
                    "environment.hosts",
                    "alias and address must not be empty".to_owned(),
                ));
            }
            if !aliases.insert(host.alias.as_str()) {
                return Err(invalid(
                    "environment.hosts",
                    format!("duplicate host alias '{}'", host.alias),
                ));
            }
        }

        let mut datastores = BTreeSet::new();
        for ds in &self.environment.datastores {
            if ds.is_empty() || ds.contains('@') {
                return Err(invalid(
                    "environment.datastores",
                    format!("invalid datastore name '{ds}'"),
                ));
            }
            if !datastores.insert(ds.as_str()) {
                return Err(invalid(
                    "environment.datastores",
                    format!("duplicate datastore '{ds}'"),
                ));
            }
        }

        if self.environment.vm_datastore.is_empty() {
            return Err(invalid(
                "environment.vm_datastore",
                "must not be empty".to_owned(),
            ));
        }

        if self.verifier.max_attempts == 0 || self.verifier.max_attempts > MAX_VERIFY_ATTEMPTS {
            return Err(invalid(
                "verifier.max_attempts",
                format!("must be 1-{MAX_VERIFY_ATTEMPTS}"),
            ));
        }

        if self.verifier.max_delay_ms > MAX_BACKOFF_MS
            || self.verifier.base_delay_ms > self.verifier.max_delay_ms
        {
            return Err(invalid(
                "verifier.base_delay_ms",
                format!("must satisfy base_delay_ms <= max_delay_ms <= {MAX_BACKOFF_MS}"),
            ));
        }

        if self.verifier.probe_timeout_secs == 0
            || self.verifier.probe_timeout_secs > MAX_TIMEOUT_SECS
        {
            return Err(invalid(
                "verifier.probe_timeout_secs",
                format!("must be 1-{MAX_TIMEOUT_SECS}"),
            ));
        }

        if self.runner.command_timeout_secs == 0
            || self.runner.command_timeout_secs > MAX_TIMEOUT_SECS
        {
            return Err(invalid(
                "runner.command_timeout_secs",
                format!("must be 1-{MAX_TIMEOUT_SECS}"),
            ));
        }

        if self.runner.max_parallel_scenarios == 0
            || self.runner.max_parallel_scenarios > MAX_PARALLEL_SCENARIOS
        {
            return Err(invalid(
                "runner.max_parallel_scenarios",
                format!("must be 1-{MAX_PARALLEL_SCENARIOS}"),
            ));
        }

        if self.runner.transport_retries > MAX_TRANSPORT_RETRIES {
            return Err(invalid(
                "runner.transport_retries",
                format!("must be 0-{MAX_TRANSPORT_RETRIES}"),
            ));
        }

        if self.backend.admin_cli.is_empty() || self.backend.helper_image.is_empty() {
            return Err(invalid(
                "backend",
                "admin_cli and helper_image must not be empty".to_owned(),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> VolprobeError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 호스트 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostRole {
    /// 스웜 매니저
    Manager,
    /// 스웜 워커
    Worker,
}

/// Docker 호스트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// 시나리오에서 사용하는 별칭 (예: `manager1`)
    pub alias: String,
    /// SSH 접속 주소
    pub address: String,
    /// 하이퍼바이저에 등록된 VM 이름 (vmgroup 멤버십에 사용)
    pub vm_name: String,
    /// 역할
    pub role: HostRole,
}

impl HostConfig {
    pub fn id(&self) -> HostId {
        HostId::new(self.alias.clone())
    }
}

/// 테스트 환경 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// 관리 CLI를 실행할 하이퍼바이저 호스트 주소
    pub admin_host: String,
    /// Docker 호스트 목록
    pub hosts: Vec<HostConfig>,
    /// 볼륨을 만들 수 있는 데이터스토어 목록
    pub datastores: Vec<String>,
    /// VM 데이터스토어 별칭 (기본 그룹의 기본 데이터스토어)
    pub vm_datastore: String,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            admin_host: String::new(),
            hosts: Vec::new(),
            datastores: Vec::new(),
            vm_datastore: VM_DATASTORE.to_owned(),
        }
    }
}

impl EnvironmentConfig {
    /// 별칭으로 호스트 설정을 찾습니다.
    pub fn host(&self, alias: &str) -> Option<&HostConfig> {
        self.hosts.iter().find(|h| h.alias == alias)
    }

    /// VM 이름으로 호스트 설정을 찾습니다.
    pub fn host_by_vm_name(&self, vm_name: &str) -> Option<&HostConfig> {
        self.hosts.iter().find(|h| h.vm_name == vm_name)
    }

    /// 지정한 역할의 호스트 목록
    pub fn hosts_with_role(&self, role: HostRole) -> impl Iterator<Item = &HostConfig> {
        self.hosts.iter().filter(move |h| h.role == role)
    }

    /// 모델이 알고 있어야 하는 모든 데이터스토어 (VM 별칭 포함)
    pub fn all_datastores(&self) -> BTreeSet<DatastoreName> {
        let mut set: BTreeSet<DatastoreName> = self
            .datastores
            .iter()
            .map(|d| DatastoreName::new(d.clone()))
            .collect();
        set.insert(DatastoreName::new(self.vm_datastore.clone()));
        set
    }

    /// vSAN 데이터스토어 (이름이 `vsan`으로 시작하는 첫 번째 항목)
    pub fn vsan_datastore(&self) -> Option<DatastoreName> {
        self.datastores
            .iter()
            .map(|d| DatastoreName::new(d.clone()))
            .find(DatastoreName::is_vsan)
    }

    /// 시나리오 실행에 필요한 최소 환경을 확인합니다.
    pub fn require_hosts(&self, count: usize) -> Result<(), ConfigError> {
        if self.hosts.len() < count {
            return Err(ConfigError::MissingEnvironment {
                what: format!("{count} docker hosts (found {})", self.hosts.len()),
            });
        }
        if self.admin_host.is_empty() {
            return Err(ConfigError::MissingEnvironment {
                what: "admin_host".to_owned(),
            });
        }
        Ok(())
    }
}

/// SSH 전송 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    /// 접속 사용자
    pub user: String,
    /// 포트
    pub port: u16,
    /// 개인키 경로 (비어 있으면 ssh 기본값 사용)
    pub identity_file: String,
    /// 연결 타임아웃 (초)
    pub connect_timeout_secs: u64,
    /// 추가 `-o` 옵션 (예: `StrictHostKeyChecking=no`)
    pub extra_options: Vec<String>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: "root".to_owned(),
            port: 22,
            identity_file: String::new(),
            connect_timeout_secs: 10,
            extra_options: vec![
                "StrictHostKeyChecking=no".to_owned(),
                "UserKnownHostsFile=/dev/null".to_owned(),
            ],
        }
    }
}

/// 백엔드 CLI 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// 하이퍼바이저의 관리 CLI 경로
    pub admin_cli: String,
    /// 일반 볼륨 드라이버 이름
    pub volume_driver: String,
    /// 공유 볼륨 드라이버 이름
    pub shared_driver: String,
    /// 볼륨 마운트/입출력에 사용할 컨테이너 이미지
    pub helper_image: String,
    /// 컨테이너 내부 마운트 경로
    pub mount_path: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            admin_cli: "/usr/lib/vmware/vmdkops/bin/vmdkops_admin.py".to_owned(),
            volume_driver: "vsphere".to_owned(),
            shared_driver: "vfile".to_owned(),
            helper_image: "busybox".to_owned(),
            mount_path: "/vol".to_owned(),
        }
    }
}

/// 검증기 재시도 정책
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// 최대 관측 시도 횟수
    pub max_attempts: u32,
    /// 백오프 기본 간격 (밀리초), 시도마다 두 배
    pub base_delay_ms: u64,
    /// 백오프 상한 (밀리초)
    pub max_delay_ms: u64,
    /// 관측 1회 타임아웃 (초)
    pub probe_timeout_secs: u64,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
            probe_timeout_secs: 30,
        }
    }
}

/// 시나리오 실행기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// 원격 명령 1회 타임아웃 (초)
    pub command_timeout_secs: u64,
    /// 동시에 실행할 시나리오 수
    pub max_parallel_scenarios: usize,
    /// 전송 실패 시 재시도 횟수
    pub transport_retries: u32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: 120,
            max_parallel_scenarios: 1,
            transport_retries: 2,
        }
    }
}

/// `alias=role:address:vm_name,...` 형식의 호스트 목록을 파싱합니다.
pub fn parse_host_list(value: &str) -> Result<Vec<HostConfig>, String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (alias, rest) = entry
                .split_once('=')
                .ok_or_else(|| format!("host entry '{entry}' is missing '='"))?;
            let mut parts = rest.splitn(3, ':');
            let role = match parts.next() {
                Some("manager") => HostRole::Manager,
                Some("worker") => HostRole::Worker,
                other => {
                    return Err(format!(
                        "host entry '{entry}' has invalid role {other:?} (expected manager or worker)"
                    ));
                }
            };
            let address = parts
                .next()
                .filter(|a| !a.is_empty())
                .ok_or_else(|| format!("host entry '{entry}' is missing an address"))?;
            let vm_name = parts.next().filter(|v| !v.is_empty()).unwrap_or(address);
            Ok(HostConfig {
                alias: alias.trim().to_owned(),
                address: address.to_owned(),
                vm_name: vm_name.to_owned(),
                role,
            })
        })
        .collect()
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

/// 숫자 필드 오버라이드. 파싱에 실패하면 경고만 남기고 기존 값을 유지합니다.
fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str) {
    let Ok(val) = std::env::var(env_key) else {
        return;
    };
    match val.trim().parse::<T>() {
        Ok(parsed) => *target = parsed,
        Err(_) => warn!(
            env_key,
            value = val.as_str(),
            expected = std::any::type_name::<T>(),
            "failed to parse env var, ignoring"
        ),
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
