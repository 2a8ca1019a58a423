//! vmgroup 레코드와 데이터스토어별 접근 정책

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use volprobe_core::types::{AccessMode, ALL_DATASTORES, DatastoreName, GroupName, SizeMb};

/// 크기 제한 값 (`0`은 무제한으로 렌더링)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeLimit {
    Unlimited,
    Limit(SizeMb),
}

impl SizeLimit {
    pub fn as_option(self) -> Option<SizeMb> {
        match self {
            Self::Unlimited => None,
            Self::Limit(size) => Some(size),
        }
    }
}

impl From<Option<SizeMb>> for SizeLimit {
    fn from(value: Option<SizeMb>) -> Self {
        value.map_or(Self::Unlimited, Self::Limit)
    }
}

impl fmt::Display for SizeLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => f.write_str("unlimited"),
            Self::Limit(size) => size.fmt(f),
        }
    }
}

/// 그룹의 데이터스토어별 접근 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatastorePolicy {
    pub allow_create: bool,
    pub access: AccessMode,
    /// `None`이면 무제한
    pub max_volume_size: Option<SizeMb>,
    /// `None`이면 무제한
    pub total_size: Option<SizeMb>,
}

impl DatastorePolicy {
    /// 생성 허용, 읽기/쓰기, 무제한
    pub fn full_access() -> Self {
        Self {
            allow_create: true,
            access: AccessMode::ReadWrite,
            max_volume_size: None,
            total_size: None,
        }
    }

    /// 부분 업데이트를 적용한 새 정책을 반환합니다.
    pub fn updated(&self, update: &PolicyUpdate) -> Self {
        Self {
            allow_create: update.allow_create.unwrap_or(self.allow_create),
            access: update.access.unwrap_or(self.access),
            max_volume_size: update
                .max_volume_size
                .map_or(self.max_volume_size, SizeLimit::as_option),
            total_size: update
                .total_size
                .map_or(self.total_size, SizeLimit::as_option),
        }
    }

    /// 이 정책 전체를 다시 설정하는 업데이트 (정리 단계에서 사용)
    pub fn as_update(&self) -> PolicyUpdate {
        PolicyUpdate {
            allow_create: Some(self.allow_create),
            access: Some(self.access),
            max_volume_size: Some(self.max_volume_size.into()),
            total_size: Some(self.total_size.into()),
        }
    }
}

/// `vmgroup access set`의 부분 업데이트. `None` 필드는 변경하지 않습니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyUpdate {
    pub allow_create: Option<bool>,
    pub access: Option<AccessMode>,
    pub max_volume_size: Option<SizeLimit>,
    pub total_size: Option<SizeLimit>,
}

impl PolicyUpdate {
    pub fn allow_create(mut self, allow: bool) -> Self {
        self.allow_create = Some(allow);
        self
    }

    pub fn access(mut self, mode: AccessMode) -> Self {
        self.access = Some(mode);
        self
    }

    pub fn max_volume_size(mut self, size: SizeMb) -> Self {
        self.max_volume_size = Some(SizeLimit::Limit(size));
        self
    }

    pub fn total_size(mut self, size: SizeMb) -> Self {
        self.total_size = Some(SizeLimit::Limit(size));
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for PolicyUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(allow) = self.allow_create {
            parts.push(format!("allow-create={allow}"));
        }
        if let Some(mode) = self.access {
            parts.push(format!("access={mode}"));
        }
        if let Some(max) = self.max_volume_size {
            parts.push(format!("maxsize={max}"));
        }
        if let Some(total) = self.total_size {
            parts.push(format!("totalsize={total}"));
        }
        f.write_str(&parts.join(" "))
    }
}

/// vmgroup 레코드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub name: GroupName,
    pub default_datastore: DatastoreName,
    pub policies: BTreeMap<DatastoreName, DatastorePolicy>,
}

impl GroupRecord {
    /// 새 그룹: 기본 데이터스토어에 대한 전체 권한 정책을 가집니다.
    pub fn new(name: GroupName, default_datastore: DatastoreName) -> Self {
        let mut policies = BTreeMap::new();
        policies.insert(default_datastore.clone(), DatastorePolicy::full_access());
        Self {
            name,
            default_datastore,
            policies,
        }
    }

    /// 암묵적 기본 그룹: `_ALL_DS` 와일드카드 정책으로 모든 데이터스토어 생성을 허용합니다.
    pub fn implicit_default(vm_datastore: DatastoreName) -> Self {
        let mut policies = BTreeMap::new();
        policies.insert(
            DatastoreName::new(ALL_DATASTORES),
            DatastorePolicy::full_access(),
        );
        Self {
            name: GroupName::default_group(),
            default_datastore: vm_datastore,
            policies,
        }
    }

    /// 명시적 정책이 없으면 와일드카드 정책을 적용합니다.
    pub fn effective_policy(&self, datastore: &DatastoreName) -> Option<&DatastorePolicy> {
        self.policies
            .get(datastore)
            .or_else(|| self.policies.get(&DatastoreName::new(ALL_DATASTORES)))
    }
}
