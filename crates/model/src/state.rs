//! 상태 모델 — 시나리오 동안 기대되는 볼륨/그룹/연결 상태
//!
//! [`StateModel`]은 시나리오 하나가 단독으로 소유합니다. 모든 맵은 `Arc`로
//! 공유되며 변경 시 `Arc::make_mut`으로 복사되므로, [`ExpectedStateSnapshot`]은
//! 이전 스냅샷에 영향을 주지 않고 저렴하게 복제됩니다.
//!
//! 연산은 먼저 변경 계획(`Vec<Mutation>`)으로 계산된 뒤 한 번에 커밋됩니다.
//! 계획 단계에서 실패하면 모델은 전혀 바뀌지 않습니다.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use volprobe_core::config::EnvironmentConfig;
use volprobe_core::types::{AccessMode, DatastoreName, GroupName, HostId, SizeMb};

use crate::error::ModelError;
use crate::group::{DatastorePolicy, GroupRecord};
use crate::interpreter;
use crate::name::VolumeName;
use crate::operation::Operation;
use crate::options::VolumeOptions;
use crate::storage_policy::StoragePolicy;

/// 볼륨 식별자: `{group, datastore}` 범위 안에서 base 이름이 유일합니다.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VolumeKey {
    pub group: GroupName,
    pub datastore: DatastoreName,
    pub base: String,
}

impl fmt::Display for VolumeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} ({})", self.base, self.datastore, self.group)
    }
}

/// 볼륨 레코드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeRecord {
    pub key: VolumeKey,
    /// 생성 시 요청한 이름 그대로
    pub requested_name: String,
    pub size: SizeMb,
    pub access: AccessMode,
    pub shared: bool,
    pub options: VolumeOptions,
    /// 생성 시점의 논리 시각
    pub created_seq: u64,
    /// 하네스가 기록한 파일 내용
    pub files: BTreeMap<String, String>,
}

/// 열린 연결 식별자
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AttachmentKey {
    pub volume: VolumeKey,
    pub host: HostId,
    pub container: String,
}

/// 호스트 관점에서 볼륨 이름을 해석한 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// 호스트의 그룹이 소유한 볼륨
    Owned(VolumeKey),
    /// 다른 그룹이 소유한 볼륨
    Foreign(VolumeKey),
    /// 어느 그룹에도 없음
    Missing,
}

impl Resolution {
    pub fn key(&self) -> Option<&VolumeKey> {
        match self {
            Self::Owned(key) | Self::Foreign(key) => Some(key),
            Self::Missing => None,
        }
    }
}

/// 모델이 알고 있는 고정 환경 (호스트, 데이터스토어)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelEnvironment {
    pub hosts: BTreeSet<HostId>,
    pub datastores: BTreeSet<DatastoreName>,
    /// 기본 그룹의 기본 데이터스토어
    pub vm_datastore: DatastoreName,
}

impl ModelEnvironment {
    pub fn from_config(env: &EnvironmentConfig) -> Self {
        Self {
            hosts: env.hosts.iter().map(|h| h.id()).collect(),
            datastores: env.all_datastores(),
            vm_datastore: DatastoreName::new(env.vm_datastore.clone()),
        }
    }
}

/// 상태 변경 단위. 해석기가 계획하고 [`StateModel`]이 커밋합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Mutation {
    InsertVolume(Box<VolumeRecord>),
    RemoveVolume(VolumeKey),
    SetVolumeAccess(VolumeKey, AccessMode),
    WriteFile {
        volume: VolumeKey,
        file: String,
        data: String,
    },
    Attach(AttachmentKey),
    Detach(AttachmentKey),
    SetPolicy {
        group: GroupName,
        datastore: DatastoreName,
        policy: DatastorePolicy,
    },
    /// `None`이면 기본 그룹으로 복귀
    SetMembership {
        host: HostId,
        group: Option<GroupName>,
    },
    InsertGroup(GroupRecord),
    RemoveGroup(GroupName),
    InsertStoragePolicy(StoragePolicy),
}

/// 불변 기대 상태 스냅샷
#[derive(Debug, Clone)]
pub struct ExpectedStateSnapshot {
    pub(crate) seq: u64,
    pub(crate) env: Arc<ModelEnvironment>,
    pub(crate) volumes: Arc<BTreeMap<VolumeKey, VolumeRecord>>,
    pub(crate) groups: Arc<BTreeMap<GroupName, GroupRecord>>,
    /// 기본 그룹이 아닌 명시적 멤버십만 저장
    pub(crate) membership: Arc<BTreeMap<HostId, GroupName>>,
    /// 값은 마운트 마커
    pub(crate) attachments: Arc<BTreeMap<AttachmentKey, u64>>,
    pub(crate) storage_policies: Arc<BTreeMap<String, StoragePolicy>>,
    pub(crate) foreign_delete_grants: Arc<BTreeSet<(HostId, GroupName)>>,
}

impl ExpectedStateSnapshot {
    fn initial(env: ModelEnvironment) -> Self {
        let default = GroupRecord::implicit_default(env.vm_datastore.clone());
        let mut groups = BTreeMap::new();
        groups.insert(default.name.clone(), default);
        Self {
            seq: 0,
            env: Arc::new(env),
            volumes: Arc::default(),
            groups: Arc::new(groups),
            membership: Arc::default(),
            attachments: Arc::default(),
            storage_policies: Arc::default(),
            foreign_delete_grants: Arc::default(),
        }
    }

    /// 커밋된 상태 변경 횟수
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn environment(&self) -> &ModelEnvironment {
        &self.env
    }

    pub fn knows_host(&self, host: &HostId) -> bool {
        self.env.hosts.contains(host)
    }

    pub fn knows_datastore(&self, datastore: &DatastoreName) -> bool {
        self.env.datastores.contains(datastore)
    }

    /// 호스트의 현재 그룹 (명시적 멤버십이 없으면 기본 그룹)
    pub fn host_group(&self, host: &HostId) -> GroupName {
        self.membership
            .get(host)
            .cloned()
            .unwrap_or_else(GroupName::default_group)
    }

    pub fn group(&self, name: &GroupName) -> Option<&GroupRecord> {
        self.groups.get(name)
    }

    pub fn groups(&self) -> impl Iterator<Item = &GroupRecord> {
        self.groups.values()
    }

    /// 그룹의 멤버 호스트. 기본 그룹은 명시적 멤버십이 없는 모든 호스트입니다.
    pub fn members(&self, group: &GroupName) -> BTreeSet<HostId> {
        if group.is_default() {
            self.env
                .hosts
                .iter()
                .filter(|h| !self.membership.contains_key(*h))
                .cloned()
                .collect()
        } else {
            self.membership
                .iter()
                .filter(|(_, g)| *g == group)
                .map(|(h, _)| h.clone())
                .collect()
        }
    }

    pub fn effective_policy(
        &self,
        group: &GroupName,
        datastore: &DatastoreName,
    ) -> Option<&DatastorePolicy> {
        self.groups.get(group)?.effective_policy(datastore)
    }

    pub fn volume(&self, key: &VolumeKey) -> Option<&VolumeRecord> {
        self.volumes.get(key)
    }

    pub fn volumes(&self) -> impl Iterator<Item = &VolumeRecord> {
        self.volumes.values()
    }

    /// 그룹이 데이터스토어에서 사용 중인 총 크기
    pub fn usage(&self, group: &GroupName, datastore: &DatastoreName) -> SizeMb {
        let total = self
            .volumes
            .values()
            .filter(|v| &v.key.group == group && &v.key.datastore == datastore)
            .map(|v| v.size.as_mb())
            .sum();
        SizeMb::mb(total)
    }

    /// 볼륨에 열린 연결 수 (공유 볼륨의 전역 refcount)
    pub fn refcount(&self, key: &VolumeKey) -> usize {
        self.attachments_of(key).count()
    }

    pub fn attachments_of<'a>(
        &'a self,
        key: &'a VolumeKey,
    ) -> impl Iterator<Item = (&'a AttachmentKey, u64)> + 'a {
        self.attachments
            .iter()
            .filter(move |(a, _)| &a.volume == key)
            .map(|(a, marker)| (a, *marker))
    }

    pub fn attachments(&self) -> impl Iterator<Item = (&AttachmentKey, u64)> {
        self.attachments.iter().map(|(a, marker)| (a, *marker))
    }

    /// 볼륨 자체 모드와 그룹/데이터스토어 정책 모드가 모두 read-write일 때만 쓰기 가능
    pub fn effective_access(&self, key: &VolumeKey) -> Option<AccessMode> {
        let volume = self.volumes.get(key)?;
        let policy_mode = self
            .effective_policy(&key.group, &key.datastore)
            .map_or(AccessMode::ReadWrite, |p| p.access);
        if volume.access.is_writable() && policy_mode.is_writable() {
            Some(AccessMode::ReadWrite)
        } else {
            Some(AccessMode::ReadOnly)
        }
    }

    pub fn storage_policy(&self, name: &str) -> Option<&StoragePolicy> {
        self.storage_policies.get(name)
    }

    pub fn storage_policies(&self) -> impl Iterator<Item = &StoragePolicy> {
        self.storage_policies.values()
    }

    pub fn foreign_delete_granted(&self, host: &HostId, group: &GroupName) -> bool {
        self.foreign_delete_grants
            .contains(&(host.clone(), group.clone()))
    }

    /// 그룹의 기본 데이터스토어를 기준으로 이름을 볼륨 키 후보로 바꿉니다.
    pub fn key_in_group(&self, name: &VolumeName, group: &GroupName) -> Option<VolumeKey> {
        let datastore = match name.datastore() {
            Some(ds) => ds.clone(),
            None => self.groups.get(group)?.default_datastore.clone(),
        };
        Some(VolumeKey {
            group: group.clone(),
            datastore,
            base: name.base().to_owned(),
        })
    }

    /// 호스트 관점에서 볼륨 이름을 해석합니다.
    ///
    /// `@datastore`가 없으면 호스트 그룹의 기본 데이터스토어를 사용합니다.
    /// 다른 그룹의 볼륨은 명시한 데이터스토어, 또는 그 그룹의 기본 데이터스토어에서
    /// base 이름이 같을 때 `Foreign`으로 찾습니다.
    pub fn resolve(&self, raw_name: &str, host: &HostId) -> Resolution {
        let Ok(name) = VolumeName::parse(raw_name) else {
            return Resolution::Missing;
        };

        let group = self.host_group(host);
        if let Some(key) = self.key_in_group(&name, &group) {
            if self.volumes.contains_key(&key) {
                return Resolution::Owned(key);
            }
        }

        self.volumes
            .keys()
            .find(|key| {
                key.group != group
                    && key.base == name.base()
                    && match name.datastore() {
                        Some(ds) => &key.datastore == ds,
                        None => self
                            .groups
                            .get(&key.group)
                            .is_some_and(|g| g.default_datastore == key.datastore),
                    }
            })
            .cloned()
            .map_or(Resolution::Missing, Resolution::Foreign)
    }

    /// 관리 호스트 관점: 소유 그룹과 무관하게 base 이름(및 명시한 데이터스토어)으로 찾습니다.
    pub fn find_any(&self, raw_name: &str) -> Option<&VolumeRecord> {
        let name = VolumeName::parse(raw_name).ok()?;
        self.volumes.values().find(|v| {
            v.key.base == name.base() && name.datastore().is_none_or(|ds| &v.key.datastore == ds)
        })
    }
}

/// 시나리오 하나의 기대 상태를 소유하는 상태 모델
#[derive(Debug, Clone)]
pub struct StateModel {
    current: ExpectedStateSnapshot,
    next_marker: u64,
}

impl StateModel {
    pub fn new(env: ModelEnvironment) -> Self {
        Self {
            current: ExpectedStateSnapshot::initial(env),
            next_marker: 1,
        }
    }

    /// 현재 상태의 불변 스냅샷
    pub fn snapshot(&self) -> ExpectedStateSnapshot {
        self.current.clone()
    }

    /// 현재 상태 참조 (복제 없이 조회할 때)
    pub fn state(&self) -> &ExpectedStateSnapshot {
        &self.current
    }

    pub fn host_group(&self, host: &HostId) -> GroupName {
        self.current.host_group(host)
    }

    pub fn resolve(&self, raw_name: &str, host: &HostId) -> Resolution {
        self.current.resolve(raw_name, host)
    }

    /// 다른 그룹 호스트의 삭제를 허용하도록 선언합니다 (시나리오 단위).
    pub fn grant_foreign_delete(&mut self, host: HostId, group: GroupName) {
        Arc::make_mut(&mut self.current.foreign_delete_grants).insert((host, group));
    }

    /// 연산을 적용하고 새 스냅샷을 반환합니다.
    ///
    /// 예상 실패 결과(쿼터 초과 등)는 상태를 바꾸지 않으며 에러도 아닙니다.
    /// 결과 분류가 필요하면 [`Interpreter`](crate::interpreter::Interpreter)를 사용합니다.
    pub fn apply(&mut self, op: &Operation) -> Result<ExpectedStateSnapshot, ModelError> {
        let plan = interpreter::plan(&self.current, op)?;
        self.commit(plan.mutations);
        Ok(self.snapshot())
    }

    pub(crate) fn commit(&mut self, mutations: Vec<Mutation>) {
        if mutations.is_empty() {
            return;
        }
        let state = &mut self.current;
        for mutation in mutations {
            match mutation {
                Mutation::InsertVolume(record) => {
                    Arc::make_mut(&mut state.volumes).insert(record.key.clone(), *record);
                }
                Mutation::RemoveVolume(key) => {
                    Arc::make_mut(&mut state.volumes).remove(&key);
                }
                Mutation::SetVolumeAccess(key, mode) => {
                    if let Some(volume) = Arc::make_mut(&mut state.volumes).get_mut(&key) {
                        volume.access = mode;
                    }
                }
                Mutation::WriteFile { volume, file, data } => {
                    if let Some(volume) = Arc::make_mut(&mut state.volumes).get_mut(&volume) {
                        volume.files.insert(file, data);
                    }
                }
                Mutation::Attach(key) => {
                    let marker = self.next_marker;
                    self.next_marker += 1;
                    Arc::make_mut(&mut state.attachments).insert(key, marker);
                }
                Mutation::Detach(key) => {
                    Arc::make_mut(&mut state.attachments).remove(&key);
                }
                Mutation::SetPolicy {
                    group,
                    datastore,
                    policy,
                } => {
                    if let Some(record) = Arc::make_mut(&mut state.groups).get_mut(&group) {
                        record.policies.insert(datastore, policy);
                    }
                }
                Mutation::SetMembership { host, group } => {
                    let membership = Arc::make_mut(&mut state.membership);
                    match group {
                        Some(group) => membership.insert(host, group),
                        None => membership.remove(&host),
                    };
                }
                Mutation::InsertGroup(record) => {
                    Arc::make_mut(&mut state.groups).insert(record.name.clone(), record);
                }
                Mutation::RemoveGroup(name) => {
                    Arc::make_mut(&mut state.groups).remove(&name);
                }
                Mutation::InsertStoragePolicy(policy) => {
                    Arc::make_mut(&mut state.storage_policies).insert(policy.name.clone(), policy);
                }
            }
        }
        state.seq += 1;
        debug!(seq = state.seq, "state model committed");
    }
}
