//! 연산 해석기 — 연산마다 예상 결과와 상태 변경을 계산합니다.
//!
//! 예상되는 백엔드 거부(쿼터 초과, 권한 없음, 잘못된 이름/옵션, 보이지 않는 볼륨)는
//! [`Outcome::Failure`]로 반환되며 상태를 바꾸지 않습니다. 현재 상태에서 발행될 수
//! 없는 연산만 [`ModelError::InvalidTransition`]이 됩니다.

use std::collections::BTreeMap;

use tracing::debug;
use volprobe_core::types::{DatastoreName, GroupName, HostId};

use crate::error::ModelError;
use crate::group::{GroupRecord, PolicyUpdate};
use crate::name::VolumeName;
use crate::operation::{CreateVolume, MembershipChange, Operation};
use crate::options::{FsType, VolumeOptions, XFS_MAX_NAME_CHARS};
use crate::outcome::{FailureClass, Outcome};
use crate::state::{
    AttachmentKey, ExpectedStateSnapshot, Mutation, Resolution, StateModel, VolumeKey,
    VolumeRecord,
};
use crate::storage_policy::StoragePolicy;

/// 해석 결과
#[derive(Debug, Clone)]
pub struct Interpretation {
    /// 실제 명령의 예상 결과
    pub outcome: Outcome,
    /// 연산 적용 후 기대 상태
    pub snapshot: ExpectedStateSnapshot,
    /// 성공 시 명령이 출력해야 하는 내용 (볼륨 읽기)
    pub expected_output: Option<String>,
}

/// 상태 모델을 소유하고 연산을 해석하는 해석기
#[derive(Debug, Clone)]
pub struct Interpreter {
    model: StateModel,
}

impl Interpreter {
    pub fn new(model: StateModel) -> Self {
        Self { model }
    }

    /// 연산을 해석하고 성공 결과면 상태 변경을 커밋합니다.
    pub fn interpret(&mut self, op: &Operation) -> Result<Interpretation, ModelError> {
        let Plan {
            outcome,
            mutations,
            expected_output,
        } = plan(self.model.state(), op)?;

        debug!(
            operation = %op,
            outcome = %outcome,
            mutations = mutations.len(),
            "operation interpreted"
        );

        self.model.commit(mutations);
        Ok(Interpretation {
            outcome,
            snapshot: self.model.snapshot(),
            expected_output,
        })
    }

    /// 모델을 바꾸지 않고 예상 결과만 계산합니다.
    pub fn preview(&self, op: &Operation) -> Result<Outcome, ModelError> {
        plan(self.model.state(), op).map(|p| p.outcome)
    }

    pub fn model(&self) -> &StateModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut StateModel {
        &mut self.model
    }

    pub fn into_model(self) -> StateModel {
        self.model
    }
}

/// 커밋 전 변경 계획
#[derive(Debug)]
pub(crate) struct Plan {
    pub(crate) outcome: Outcome,
    pub(crate) mutations: Vec<Mutation>,
    pub(crate) expected_output: Option<String>,
}

impl Plan {
    fn success(mutations: Vec<Mutation>) -> Self {
        Self {
            outcome: Outcome::Success,
            mutations,
            expected_output: None,
        }
    }

    fn failure(class: FailureClass) -> Self {
        Self {
            outcome: Outcome::Failure(class),
            mutations: Vec::new(),
            expected_output: None,
        }
    }
}

pub(crate) fn plan(state: &ExpectedStateSnapshot, op: &Operation) -> Result<Plan, ModelError> {
    match op {
        Operation::CreateVolume(create) => plan_create(state, op, create),
        Operation::AttachVolume {
            name,
            host,
            container,
            reentrant,
        } => plan_attach(state, op, name, host, container, *reentrant),
        Operation::DetachVolume {
            name,
            host,
            container,
            reentrant,
        } => plan_detach(state, op, name, host, container, *reentrant),
        Operation::DeleteVolume { name, host } => plan_delete(state, op, name, host),
        Operation::SetGroupPolicy {
            group,
            datastore,
            policy,
        } => plan_set_policy(state, op, group, datastore, policy),
        Operation::SetGroupMembership {
            group,
            host,
            change,
        } => plan_membership(state, op, group, host, *change),
        Operation::CreateGroup {
            group,
            default_datastore,
        } => plan_create_group(state, op, group, default_datastore),
        Operation::RemoveGroup {
            group,
            remove_volumes,
        } => plan_remove_group(state, op, group, *remove_volumes),
        Operation::SetVolumeAccess { name, group, mode } => {
            let key = key_in_existing_group(state, op, name, group)?;
            Ok(Plan::success(vec![Mutation::SetVolumeAccess(key, *mode)]))
        }
        Operation::WriteVolume {
            name,
            host,
            container,
            file,
            data,
        } => {
            let Some(key) = io_target(state, op, name, host, container)? else {
                return Ok(Plan::failure(FailureClass::AccessDenied));
            };
            if state.effective_access(&key).is_some_and(|m| !m.is_writable()) {
                return Ok(Plan::failure(FailureClass::AccessDenied));
            }
            Ok(Plan::success(vec![Mutation::WriteFile {
                volume: key,
                file: file.clone(),
                data: data.clone(),
            }]))
        }
        Operation::ReadVolume {
            name,
            host,
            container,
            file,
        } => {
            let Some(key) = io_target(state, op, name, host, container)? else {
                return Ok(Plan::failure(FailureClass::AccessDenied));
            };
            let content = state
                .volume(&key)
                .and_then(|v| v.files.get(file))
                .ok_or_else(|| ModelError::invalid(op, format!("file '{file}' was never written")))?;
            Ok(Plan {
                expected_output: Some(content.clone()),
                ..Plan::success(Vec::new())
            })
        }
        Operation::InspectVolume { name, host } => {
            require_host(state, op, host)?;
            match state.resolve(name, host) {
                Resolution::Owned(_) => Ok(Plan::success(Vec::new())),
                Resolution::Foreign(_) | Resolution::Missing => {
                    Ok(Plan::failure(FailureClass::NotVisible))
                }
            }
        }
        Operation::CreateStoragePolicy { name, content } => {
            if state.storage_policy(name).is_some() {
                return Err(ModelError::invalid(op, "storage policy already exists"));
            }
            Ok(Plan::success(vec![Mutation::InsertStoragePolicy(
                StoragePolicy::new(name.clone(), content.clone()),
            )]))
        }
    }
}

fn require_host(
    state: &ExpectedStateSnapshot,
    op: &Operation,
    host: &HostId,
) -> Result<(), ModelError> {
    if state.knows_host(host) {
        Ok(())
    } else {
        Err(ModelError::invalid(op, format!("unknown host '{host}'")))
    }
}

fn plan_create(
    state: &ExpectedStateSnapshot,
    op: &Operation,
    create: &CreateVolume,
) -> Result<Plan, ModelError> {
    require_host(state, op, &create.host)?;
    if create.datastore.is_some() && create.name.contains('@') {
        return Err(ModelError::invalid(
            op,
            "datastore given both in the name and as a field",
        ));
    }

    let group = state.host_group(&create.host);
    if let Some(expected) = &create.group {
        if expected != &group {
            return Err(ModelError::invalid(
                op,
                format!("host '{}' is in group '{group}', not '{expected}'", create.host),
            ));
        }
    }

    let requested = create.requested_name();
    let name = match VolumeName::parse(&requested) {
        Ok(name) => name,
        Err(e) => {
            debug!(name = requested.as_str(), reason = %e, "volume name rejected");
            return Ok(Plan::failure(FailureClass::InvalidName));
        }
    };

    let key = state
        .key_in_group(&name, &group)
        .ok_or_else(|| ModelError::invalid(op, format!("group '{group}' does not exist")))?;
    if !state.knows_datastore(&key.datastore) {
        return Ok(Plan::failure(FailureClass::InvalidName));
    }

    let options = match VolumeOptions::parse(&create.effective_options()) {
        Ok(options) => options,
        Err(e) => {
            debug!(reason = %e, "volume options rejected");
            return Ok(Plan::failure(FailureClass::InvalidOption));
        }
    };
    if options.fstype == Some(FsType::Xfs) && name.base_len() > XFS_MAX_NAME_CHARS {
        return Ok(Plan::failure(FailureClass::InvalidOption));
    }

    let mut files = BTreeMap::new();
    if let Some(source) = &options.clone_from {
        match state.resolve(source, &create.host) {
            Resolution::Owned(source_key) => {
                if let Some(source) = state.volume(&source_key) {
                    files = source.files.clone();
                }
            }
            Resolution::Foreign(_) | Resolution::Missing => {
                return Ok(Plan::failure(FailureClass::InvalidOption));
            }
        }
    }

    if let Some(policy_name) = &options.vsan_policy {
        let usable = key.datastore.is_vsan()
            && state.storage_policy(policy_name).is_some_and(|p| p.valid);
        if !usable {
            return Ok(Plan::failure(FailureClass::InvalidOption));
        }
    }

    if state.volume(&key).is_some() {
        return Err(ModelError::invalid(op, format!("volume {key} already exists")));
    }

    let Some(policy) = state
        .effective_policy(&group, &key.datastore)
        .filter(|p| p.allow_create)
    else {
        return Ok(Plan::failure(FailureClass::AccessDenied));
    };

    let size = options.size_or_default();
    if policy.max_volume_size.is_some_and(|max| size > max) {
        return Ok(Plan::failure(FailureClass::QuotaExceeded));
    }
    if let Some(total) = policy.total_size {
        let used = state.usage(&group, &key.datastore);
        if used.checked_add(size).is_none_or(|after| after > total) {
            return Ok(Plan::failure(FailureClass::QuotaExceeded));
        }
    }

    let record = VolumeRecord {
        key,
        requested_name: requested,
        size,
        access: options.access.unwrap_or_default(),
        shared: create.shared,
        options,
        created_seq: state.seq() + 1,
        files,
    };
    Ok(Plan::success(vec![Mutation::InsertVolume(Box::new(record))]))
}

fn plan_attach(
    state: &ExpectedStateSnapshot,
    op: &Operation,
    name: &str,
    host: &HostId,
    container: &str,
    reentrant: bool,
) -> Result<Plan, ModelError> {
    require_host(state, op, host)?;
    let key = match state.resolve(name, host) {
        Resolution::Owned(key) => key,
        Resolution::Foreign(_) => return Ok(Plan::failure(FailureClass::AccessDenied)),
        Resolution::Missing => return Err(ModelError::invalid(op, "no such volume")),
    };

    let attachment = AttachmentKey {
        volume: key.clone(),
        host: host.clone(),
        container: container.to_owned(),
    };
    if state.attachments.contains_key(&attachment) {
        return if reentrant {
            Ok(Plan::success(Vec::new()))
        } else {
            Err(ModelError::invalid(op, "volume is already attached to this container"))
        };
    }
    if container_in_use(state, host, container) {
        return Err(ModelError::invalid(
            op,
            format!("container '{container}' is already running on '{host}'"),
        ));
    }
    check_single_host(state, op, &key, host)?;

    Ok(Plan::success(vec![Mutation::Attach(attachment)]))
}

fn plan_detach(
    state: &ExpectedStateSnapshot,
    op: &Operation,
    name: &str,
    host: &HostId,
    container: &str,
    reentrant: bool,
) -> Result<Plan, ModelError> {
    require_host(state, op, host)?;
    let parsed = VolumeName::parse(name).map_err(|e| ModelError::invalid(op, e.to_string()))?;

    // 연결 이후 호스트의 그룹이 바뀌었을 수 있으므로 가시성과 무관하게 찾습니다.
    let found = state
        .attachments
        .keys()
        .find(|a| {
            &a.host == host
                && a.container == container
                && a.volume.base == parsed.base()
                && parsed.datastore().is_none_or(|ds| &a.volume.datastore == ds)
        })
        .cloned();

    match found {
        Some(attachment) => Ok(Plan::success(vec![Mutation::Detach(attachment)])),
        None if reentrant => Ok(Plan::success(Vec::new())),
        None => Err(ModelError::invalid(op, "no open attachment to detach")),
    }
}

fn plan_delete(
    state: &ExpectedStateSnapshot,
    op: &Operation,
    name: &str,
    host: &HostId,
) -> Result<Plan, ModelError> {
    require_host(state, op, host)?;
    let key = match state.resolve(name, host) {
        Resolution::Owned(key) => key,
        Resolution::Foreign(key) => {
            if !state.foreign_delete_granted(host, &key.group) {
                return Ok(Plan::failure(FailureClass::AccessDenied));
            }
            key
        }
        Resolution::Missing => return Err(ModelError::invalid(op, "no such volume")),
    };

    let open = state.refcount(&key);
    if open > 0 {
        return Err(ModelError::invalid(
            op,
            format!("{open} attachment(s) still open"),
        ));
    }
    Ok(Plan::success(vec![Mutation::RemoveVolume(key)]))
}

fn plan_set_policy(
    state: &ExpectedStateSnapshot,
    op: &Operation,
    group: &GroupName,
    datastore: &DatastoreName,
    update: &PolicyUpdate,
) -> Result<Plan, ModelError> {
    let record = state
        .group(group)
        .ok_or_else(|| ModelError::invalid(op, format!("unknown group '{group}'")))?;
    if !datastore.is_wildcard() && !state.knows_datastore(datastore) {
        return Err(ModelError::invalid(
            op,
            format!("unknown datastore '{datastore}'"),
        ));
    }
    if update.is_empty() {
        return Err(ModelError::invalid(op, "policy update changes nothing"));
    }
    let current = record.effective_policy(datastore).ok_or_else(|| {
        ModelError::invalid(
            op,
            format!("group '{group}' has no access entry for '{datastore}'"),
        )
    })?;

    Ok(Plan::success(vec![Mutation::SetPolicy {
        group: group.clone(),
        datastore: datastore.clone(),
        policy: current.updated(update),
    }]))
}

fn plan_membership(
    state: &ExpectedStateSnapshot,
    op: &Operation,
    group: &GroupName,
    host: &HostId,
    change: MembershipChange,
) -> Result<Plan, ModelError> {
    require_host(state, op, host)?;
    if group.is_default() {
        return Err(ModelError::invalid(
            op,
            "membership of the default group is implicit",
        ));
    }
    if state.group(group).is_none() {
        return Err(ModelError::invalid(op, format!("unknown group '{group}'")));
    }

    let current = state.host_group(host);
    let mutation = match change {
        MembershipChange::Add => {
            if &current == group {
                return Err(ModelError::invalid(op, "host is already a member"));
            }
            if !current.is_default() {
                return Err(ModelError::invalid(
                    op,
                    format!("host already belongs to group '{current}'"),
                ));
            }
            Mutation::SetMembership {
                host: host.clone(),
                group: Some(group.clone()),
            }
        }
        MembershipChange::Remove => {
            if &current != group {
                return Err(ModelError::invalid(op, "host is not a member"));
            }
            Mutation::SetMembership {
                host: host.clone(),
                group: None,
            }
        }
    };
    Ok(Plan::success(vec![mutation]))
}

fn plan_create_group(
    state: &ExpectedStateSnapshot,
    op: &Operation,
    group: &GroupName,
    default_datastore: &DatastoreName,
) -> Result<Plan, ModelError> {
    if group.is_default() || state.group(group).is_some() {
        return Err(ModelError::invalid(op, "group already exists"));
    }
    if default_datastore.is_wildcard() || !state.knows_datastore(default_datastore) {
        return Err(ModelError::invalid(
            op,
            format!("unknown datastore '{default_datastore}'"),
        ));
    }
    Ok(Plan::success(vec![Mutation::InsertGroup(GroupRecord::new(
        group.clone(),
        default_datastore.clone(),
    ))]))
}

fn plan_remove_group(
    state: &ExpectedStateSnapshot,
    op: &Operation,
    group: &GroupName,
    remove_volumes: bool,
) -> Result<Plan, ModelError> {
    if group.is_default() {
        return Err(ModelError::invalid(op, "the default group cannot be removed"));
    }
    if state.group(group).is_none() {
        return Err(ModelError::invalid(op, format!("unknown group '{group}'")));
    }

    let mut mutations: Vec<Mutation> = state
        .members(group)
        .into_iter()
        .map(|host| Mutation::SetMembership { host, group: None })
        .collect();

    if remove_volumes {
        for volume in state.volumes().filter(|v| &v.key.group == group) {
            if state.refcount(&volume.key) > 0 {
                return Err(ModelError::invalid(
                    op,
                    format!("volume {} still has open attachments", volume.key),
                ));
            }
            mutations.push(Mutation::RemoveVolume(volume.key.clone()));
        }
    }

    mutations.push(Mutation::RemoveGroup(group.clone()));
    Ok(Plan::success(mutations))
}

fn key_in_existing_group(
    state: &ExpectedStateSnapshot,
    op: &Operation,
    name: &str,
    group: &GroupName,
) -> Result<VolumeKey, ModelError> {
    if state.group(group).is_none() {
        return Err(ModelError::invalid(op, format!("unknown group '{group}'")));
    }
    let parsed = VolumeName::parse(name).map_err(|e| ModelError::invalid(op, e.to_string()))?;
    state
        .key_in_group(&parsed, group)
        .filter(|key| state.volume(key).is_some())
        .ok_or_else(|| ModelError::invalid(op, format!("no volume '{name}' in group '{group}'")))
}

/// 임시 컨테이너로 볼륨을 읽거나 쓸 때의 대상. 다른 그룹 볼륨이면 `None`.
fn io_target(
    state: &ExpectedStateSnapshot,
    op: &Operation,
    name: &str,
    host: &HostId,
    container: &str,
) -> Result<Option<VolumeKey>, ModelError> {
    require_host(state, op, host)?;
    let key = match state.resolve(name, host) {
        Resolution::Owned(key) => key,
        Resolution::Foreign(_) => return Ok(None),
        Resolution::Missing => return Err(ModelError::invalid(op, "no such volume")),
    };
    if container_in_use(state, host, container) {
        return Err(ModelError::invalid(
            op,
            format!("container '{container}' is already running on '{host}'"),
        ));
    }
    check_single_host(state, op, &key, host)?;
    Ok(Some(key))
}

fn container_in_use(state: &ExpectedStateSnapshot, host: &HostId, container: &str) -> bool {
    state
        .attachments
        .keys()
        .any(|a| &a.host == host && a.container == container)
}

/// 공유 볼륨이 아니면 한 번에 한 호스트에서만 연결할 수 있습니다.
fn check_single_host(
    state: &ExpectedStateSnapshot,
    op: &Operation,
    key: &VolumeKey,
    host: &HostId,
) -> Result<(), ModelError> {
    let shared = state.volume(key).is_some_and(|v| v.shared);
    if !shared && state.attachments_of(key).any(|(a, _)| &a.host != host) {
        return Err(ModelError::invalid(
            op,
            "non-shared volume is attached on another host",
        ));
    }
    Ok(())
}
