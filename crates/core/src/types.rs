//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 호스트, 그룹(vmgroup), 데이터스토어 식별자와 볼륨 크기/접근 모드를 정의합니다.
//! 상태 모델, 명령 렌더러, 검증기가 모두 이 타입들로 데이터를 교환합니다.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 명시적 멤버십이 없는 호스트가 속하는 기본 그룹 이름
pub const DEFAULT_GROUP: &str = "_DEFAULT";

/// 모든 데이터스토어를 가리키는 와일드카드 정책 키
pub const ALL_DATASTORES: &str = "_ALL_DS";

/// 호스트 VM이 위치한 데이터스토어의 별칭
pub const VM_DATASTORE: &str = "_VM_DS";

/// 볼륨 생성 시 크기 옵션이 없을 때의 기본 크기 (MB)
pub const DEFAULT_VOLUME_SIZE_MB: u64 = 100;

/// Docker 호스트 식별자 (설정 파일의 alias)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostId(String);

impl HostId {
    /// 새 호스트 식별자를 생성합니다.
    pub fn new(alias: impl Into<String>) -> Self {
        Self(alias.into())
    }

    /// 문자열 참조를 반환합니다.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HostId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// vmgroup 이름
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupName(String);

impl GroupName {
    /// 새 그룹 이름을 생성합니다.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// 암묵적 기본 그룹(`_DEFAULT`)을 반환합니다.
    pub fn default_group() -> Self {
        Self(DEFAULT_GROUP.to_owned())
    }

    /// 기본 그룹인지 여부
    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_GROUP
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// 데이터스토어 이름
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatastoreName(String);

impl DatastoreName {
    /// 새 데이터스토어 이름을 생성합니다.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// VM 데이터스토어 별칭(`_VM_DS`)을 반환합니다.
    pub fn vm_datastore() -> Self {
        Self(VM_DATASTORE.to_owned())
    }

    /// 와일드카드(`_ALL_DS`)인지 여부
    pub fn is_wildcard(&self) -> bool {
        self.0 == ALL_DATASTORES
    }

    /// vSAN 데이터스토어인지 여부 (이름이 `vsan`으로 시작)
    pub fn is_vsan(&self) -> bool {
        self.0.starts_with("vsan")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatastoreName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DatastoreName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// 볼륨 접근 모드
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum AccessMode {
    /// 읽기/쓰기
    #[default]
    ReadWrite,
    /// 읽기 전용
    ReadOnly,
}

impl AccessMode {
    /// 백엔드 CLI에서 사용하는 문자열 표현
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadWrite => "read-write",
            Self::ReadOnly => "read-only",
        }
    }

    pub fn is_writable(&self) -> bool {
        matches!(self, Self::ReadWrite)
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "read-write" => Ok(Self::ReadWrite),
            "read-only" => Ok(Self::ReadOnly),
            other => Err(format!(
                "invalid access mode '{other}' (expected read-write or read-only)"
            )),
        }
    }
}

/// 볼륨 크기 (MB 단위)
///
/// `10gb`, `1023mb`, `1TB` 형식을 파싱합니다. 단위는 대소문자를 구분하지 않으며
/// 단위 없는 숫자나 알 수 없는 접미어(`100mbb`)는 거부합니다.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SizeMb(u64);

impl SizeMb {
    pub const fn mb(value: u64) -> Self {
        Self(value)
    }

    pub const fn gb(value: u64) -> Self {
        Self(value * 1024)
    }

    pub const fn as_mb(&self) -> u64 {
        self.0
    }

    /// 덧셈 (오버플로 시 `None`)
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }
}

impl fmt::Display for SizeMb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}mb", self.0)
    }
}

impl FromStr for SizeMb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let split = lower
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("size '{s}' has no unit (expected mb, gb or tb)"))?;
        let (digits, unit) = lower.split_at(split);
        if digits.is_empty() {
            return Err(format!("size '{s}' has no numeric part"));
        }
        let value: u64 = digits
            .parse()
            .map_err(|e| format!("size '{s}' is not a valid number: {e}"))?;
        let multiplier = match unit {
            "mb" => 1,
            "gb" => 1024,
            "tb" => 1024 * 1024,
            other => return Err(format!("size '{s}' has unknown unit '{other}'")),
        };
        value
            .checked_mul(multiplier)
            .map(Self)
            .ok_or_else(|| format!("size '{s}' overflows"))
    }
}
