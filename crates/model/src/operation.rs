//! 도메인 연산 정의
//!
//! 시나리오는 백엔드 CLI 문자열이 아니라 [`Operation`] 값으로 기술됩니다.
//! 실제 명령 문법은 백엔드 크레이트의 렌더러에서만 생성됩니다.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use volprobe_core::types::{AccessMode, DatastoreName, GroupName, HostId, SizeMb};

use crate::group::PolicyUpdate;
use crate::options::OPT_SIZE;

/// 멤버십 변경 방향
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipChange {
    Add,
    Remove,
}

/// 볼륨 생성 요청
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateVolume {
    /// 요청 이름 (`base` 또는 `base@datastore`)
    pub name: String,
    /// 명령을 실행할 Docker 호스트
    pub host: HostId,
    /// 호스트가 속해 있어야 하는 그룹 (지정 시 검사)
    pub group: Option<GroupName>,
    /// 이름에 `@`가 없을 때 붙일 데이터스토어
    pub datastore: Option<DatastoreName>,
    pub size: Option<SizeMb>,
    /// 공유 드라이버로 생성
    pub shared: bool,
    pub opts: BTreeMap<String, String>,
}

impl CreateVolume {
    pub fn new(name: impl Into<String>, host: impl Into<HostId>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            group: None,
            datastore: None,
            size: None,
            shared: false,
            opts: BTreeMap::new(),
        }
    }

    pub fn in_group(mut self, group: GroupName) -> Self {
        self.group = Some(group);
        self
    }

    pub fn on_datastore(mut self, datastore: DatastoreName) -> Self {
        self.datastore = Some(datastore);
        self
    }

    pub fn size(mut self, size: SizeMb) -> Self {
        self.size = Some(size);
        self
    }

    pub fn shared(mut self) -> Self {
        self.shared = true;
        self
    }

    pub fn opt(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.opts.insert(key.into(), value.into());
        self
    }

    /// 백엔드에 전달되는 이름. `datastore`가 지정되면 `name@datastore`
    pub fn requested_name(&self) -> String {
        match &self.datastore {
            Some(ds) if !self.name.contains('@') => format!("{}@{}", self.name, ds),
            _ => self.name.clone(),
        }
    }

    /// `size` 필드를 반영한 최종 `-o` 옵션 맵 (필드가 우선)
    pub fn effective_options(&self) -> BTreeMap<String, String> {
        let mut opts = self.opts.clone();
        if let Some(size) = self.size {
            opts.insert(OPT_SIZE.to_owned(), size.to_string());
        }
        opts
    }
}

impl From<CreateVolume> for Operation {
    fn from(op: CreateVolume) -> Self {
        Self::CreateVolume(op)
    }
}

/// 하네스가 백엔드에 발행하는 도메인 연산
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    CreateVolume(CreateVolume),
    AttachVolume {
        name: String,
        host: HostId,
        container: String,
        reentrant: bool,
    },
    DetachVolume {
        name: String,
        host: HostId,
        container: String,
        reentrant: bool,
    },
    DeleteVolume {
        name: String,
        host: HostId,
    },
    SetGroupPolicy {
        group: GroupName,
        datastore: DatastoreName,
        policy: PolicyUpdate,
    },
    SetGroupMembership {
        group: GroupName,
        host: HostId,
        change: MembershipChange,
    },
    CreateGroup {
        group: GroupName,
        default_datastore: DatastoreName,
    },
    RemoveGroup {
        group: GroupName,
        remove_volumes: bool,
    },
    SetVolumeAccess {
        name: String,
        group: GroupName,
        mode: AccessMode,
    },
    WriteVolume {
        name: String,
        host: HostId,
        container: String,
        file: String,
        data: String,
    },
    ReadVolume {
        name: String,
        host: HostId,
        container: String,
        file: String,
    },
    InspectVolume {
        name: String,
        host: HostId,
    },
    CreateStoragePolicy {
        name: String,
        content: String,
    },
}

impl Operation {
    pub fn attach(name: impl Into<String>, host: impl Into<HostId>, container: impl Into<String>) -> Self {
        Self::AttachVolume {
            name: name.into(),
            host: host.into(),
            container: container.into(),
            reentrant: false,
        }
    }

    pub fn detach(name: impl Into<String>, host: impl Into<HostId>, container: impl Into<String>) -> Self {
        Self::DetachVolume {
            name: name.into(),
            host: host.into(),
            container: container.into(),
            reentrant: false,
        }
    }

    pub fn delete(name: impl Into<String>, host: impl Into<HostId>) -> Self {
        Self::DeleteVolume {
            name: name.into(),
            host: host.into(),
        }
    }

    pub fn inspect(name: impl Into<String>, host: impl Into<HostId>) -> Self {
        Self::InspectVolume {
            name: name.into(),
            host: host.into(),
        }
    }

    pub fn set_policy(group: GroupName, datastore: DatastoreName, policy: PolicyUpdate) -> Self {
        Self::SetGroupPolicy {
            group,
            datastore,
            policy,
        }
    }

    pub fn add_member(group: GroupName, host: impl Into<HostId>) -> Self {
        Self::SetGroupMembership {
            group,
            host: host.into(),
            change: MembershipChange::Add,
        }
    }

    pub fn remove_member(group: GroupName, host: impl Into<HostId>) -> Self {
        Self::SetGroupMembership {
            group,
            host: host.into(),
            change: MembershipChange::Remove,
        }
    }

    /// 연산을 실행하는 Docker 호스트. 관리 CLI 연산이면 `None`
    pub fn host(&self) -> Option<&HostId> {
        match self {
            Self::CreateVolume(op) => Some(&op.host),
            Self::AttachVolume { host, .. }
            | Self::DetachVolume { host, .. }
            | Self::DeleteVolume { host, .. }
            | Self::WriteVolume { host, .. }
            | Self::ReadVolume { host, .. }
            | Self::InspectVolume { host, .. } => Some(host),
            Self::SetGroupPolicy { .. }
            | Self::SetGroupMembership { .. }
            | Self::CreateGroup { .. }
            | Self::RemoveGroup { .. }
            | Self::SetVolumeAccess { .. }
            | Self::CreateStoragePolicy { .. } => None,
        }
    }

    /// 짧은 연산 종류 이름 (로그 필드용)
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateVolume(_) => "create_volume",
            Self::AttachVolume { .. } => "attach_volume",
            Self::DetachVolume { .. } => "detach_volume",
            Self::DeleteVolume { .. } => "delete_volume",
            Self::SetGroupPolicy { .. } => "set_group_policy",
            Self::SetGroupMembership { .. } => "set_group_membership",
            Self::CreateGroup { .. } => "create_group",
            Self::RemoveGroup { .. } => "remove_group",
            Self::SetVolumeAccess { .. } => "set_volume_access",
            Self::WriteVolume { .. } => "write_volume",
            Self::ReadVolume { .. } => "read_volume",
            Self::InspectVolume { .. } => "inspect_volume",
            Self::CreateStoragePolicy { .. } => "create_storage_policy",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateVolume(op) => {
                write!(f, "create {} on {}", op.requested_name(), op.host)?;
                if op.shared {
                    f.write_str(" [shared]")?;
                }
                for (k, v) in op.effective_options() {
                    write!(f, " -o {k}={v}")?;
                }
                Ok(())
            }
            Self::AttachVolume {
                name,
                host,
                container,
                ..
            } => write!(f, "attach {name} on {host} as {container}"),
            Self::DetachVolume {
                name,
                host,
                container,
                ..
            } => write!(f, "detach {name} on {host} from {container}"),
            Self::DeleteVolume { name, host } => write!(f, "delete {name} on {host}"),
            Self::SetGroupPolicy {
                group,
                datastore,
                policy,
            } => write!(f, "access set {group}/{datastore} {policy}"),
            Self::SetGroupMembership {
                group,
                host,
                change,
            } => match change {
                MembershipChange::Add => write!(f, "add {host} to {group}"),
                MembershipChange::Remove => write!(f, "remove {host} from {group}"),
            },
            Self::CreateGroup {
                group,
                default_datastore,
            } => write!(f, "create group {group} on {default_datastore}"),
            Self::RemoveGroup {
                group,
                remove_volumes,
            } => {
                write!(f, "remove group {group}")?;
                if *remove_volumes {
                    f.write_str(" with volumes")?;
                }
                Ok(())
            }
            Self::SetVolumeAccess { name, group, mode } => {
                write!(f, "set access of {name} in {group} to {mode}")
            }
            Self::WriteVolume {
                name, host, file, ..
            } => write!(f, "write {name}:{file} on {host}"),
            Self::ReadVolume {
                name, host, file, ..
            } => write!(f, "read {name}:{file} on {host}"),
            Self::InspectVolume { name, host } => write!(f, "inspect {name} on {host}"),
            Self::CreateStoragePolicy { name, .. } => write!(f, "create storage policy {name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requested_name_appends_datastore_once() {
        let op = CreateVolume::new("vol1", "worker1").on_datastore(DatastoreName::new("ds1"));
        assert_eq!(op.requested_name(), "vol1@ds1");

        let op = CreateVolume::new("vol1@ds2", "worker1").on_datastore(DatastoreName::new("ds1"));
        assert_eq!(op.requested_name(), "vol1@ds2");
    }

    #[test]
    fn size_field_overrides_size_option() {
        let op = CreateVolume::new("vol1", "worker1")
            .opt("size", "10gb")
            .size(SizeMb::gb(1));
        assert_eq!(op.effective_options().get("size").unwrap(), "1024mb");
    }

    #[test]
    fn display_is_compact() {
        let op: Operation = CreateVolume::new("vol1", "worker1")
            .shared()
            .size(SizeMb::gb(1))
            .into();
        assert_eq!(op.to_string(), "create vol1 on worker1 [shared] -o size=1024mb");
        assert_eq!(
            Operation::attach("vol1", "manager1", "c1").to_string(),
            "attach vol1 on manager1 as c1"
        );
    }

    #[test]
    fn admin_operations_have_no_host() {
        let op = Operation::CreateGroup {
            group: GroupName::new("g1"),
            default_datastore: DatastoreName::new("ds1"),
        };
        assert!(op.host().is_none());
        assert_eq!(
            Operation::delete("v", "worker1").host(),
            Some(&HostId::new("worker1"))
        );
    }

    #[test]
    fn operation_serializes_with_tag() {
        let op = Operation::delete("vol1", "worker1");
        let json = serde_json::to_string(&op).unwrap();
        assert!(json.contains("\"op\":\"delete_volume\""));
        let back: Operation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, op);
    }
}
