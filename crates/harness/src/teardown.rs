//! 시나리오 정리
//!
//! [`Ledger`]는 실제로 성공한 연산이 만든 리소스를 기록합니다. 모델이 실패를
//! 예상했지만 백엔드가 성공한 경우도 기록되므로 불일치 뒤에도 정리됩니다.
//! 정리 순서: 컨테이너, 멤버십 복원, 볼륨, 생성한 그룹, 정책 복원,
//! 볼륨 접근 모드 복원, 스토리지 정책.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{info, warn};
use volprobe_backend::command::{AdminCommand, DockerCommand};
use volprobe_backend::{Invocation, InvocationKind, RemoteExecutor, RenderContext, TargetRef};
use volprobe_core::metrics as m;
use volprobe_core::types::{AccessMode, DatastoreName, GroupName, HostId};
use volprobe_model::name::VolumeName;
use volprobe_model::{DatastorePolicy, ExpectedStateSnapshot, MembershipChange, Operation};

use crate::remote::Remote;
use crate::report::TeardownFailure;

/// 시나리오에서 만든 볼륨
#[derive(Debug, Clone, PartialEq, Eq)]
struct CreatedVolume {
    /// 생성 명령에 쓴 이름 (`@datastore` 포함 가능)
    name: String,
    base: String,
    creator: HostId,
    /// 생성 시점의 생성 호스트 그룹
    group: GroupName,
}

/// 정리 작업 하나
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownAction {
    pub description: String,
    pub invocation: Invocation,
}

/// 시나리오가 만든 리소스와 바꾼 설정의 기록
#[derive(Debug, Clone)]
pub struct Ledger {
    initial: ExpectedStateSnapshot,
    containers: BTreeSet<(HostId, String)>,
    volumes: Vec<CreatedVolume>,
    /// 적용 순서대로 기록. 역순으로 되돌립니다.
    memberships: Vec<(GroupName, HostId, MembershipChange)>,
    created_groups: Vec<GroupName>,
    /// 시나리오 전부터 있던 그룹의 원래 정책
    policies: BTreeMap<(GroupName, DatastoreName), DatastorePolicy>,
    /// 시나리오 전부터 있던 볼륨의 원래 접근 모드
    volume_access: BTreeMap<(String, GroupName), AccessMode>,
    storage_policies: Vec<String>,
}

impl Ledger {
    pub fn new(initial: ExpectedStateSnapshot) -> Self {
        Self {
            initial,
            containers: BTreeSet::new(),
            volumes: Vec::new(),
            memberships: Vec::new(),
            created_groups: Vec::new(),
            policies: BTreeMap::new(),
            volume_access: BTreeMap::new(),
            storage_policies: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
            && self.volumes.is_empty()
            && self.memberships.is_empty()
            && self.created_groups.is_empty()
            && self.policies.is_empty()
            && self.volume_access.is_empty()
            && self.storage_policies.is_empty()
    }

    /// 백엔드에서 성공한 연산을 기록합니다. `before`는 연산 직전 모델 상태입니다.
    pub fn record(&mut self, op: &Operation, before: &ExpectedStateSnapshot) {
        match op {
            Operation::CreateVolume(create) => {
                let name = create.requested_name();
                self.volumes.push(CreatedVolume {
                    base: base_of(&name),
                    name,
                    creator: create.host.clone(),
                    group: create
                        .group
                        .clone()
                        .unwrap_or_else(|| before.host_group(&create.host)),
                });
            }
            Operation::AttachVolume {
                host, container, ..
            } => {
                self.containers.insert((host.clone(), container.clone()));
            }
            Operation::DetachVolume {
                host, container, ..
            } => {
                self.containers.remove(&(host.clone(), container.clone()));
            }
            Operation::DeleteVolume { name, host } => {
                let target = before
                    .resolve(name, host)
                    .key()
                    .map(|key| (key.group.clone(), key.base.clone()));
                let position = self.volumes.iter().position(|v| match &target {
                    Some((group, base)) => &v.group == group && &v.base == base,
                    None => &v.name == name,
                });
                if let Some(idx) = position {
                    self.volumes.remove(idx);
                }
            }
            Operation::SetGroupMembership {
                group,
                host,
                change,
            } => self.memberships.push((group.clone(), host.clone(), *change)),
            Operation::CreateGroup { group, .. } => self.created_groups.push(group.clone()),
            Operation::RemoveGroup {
                group,
                remove_volumes,
            } => {
                let created = self.created_groups.contains(group);
                self.created_groups.retain(|g| g != group);
                self.memberships.retain(|(g, _, _)| g != group);
                self.policies.retain(|(g, _), _| g != group);
                if *remove_volumes {
                    self.volumes.retain(|v| &v.group != group);
                }
                if !created {
                    warn!(group = %group, "pre-existing group removed, it will not be restored");
                }
            }
            Operation::SetGroupPolicy {
                group, datastore, ..
            } => {
                if self.created_groups.contains(group) {
                    return;
                }
                let key = (group.clone(), datastore.clone());
                if self.policies.contains_key(&key) {
                    return;
                }
                if let Some(original) = self.initial.effective_policy(group, datastore) {
                    self.policies.insert(key, *original);
                }
            }
            Operation::SetVolumeAccess { name, group, .. } => {
                let original = VolumeName::parse(name)
                    .ok()
                    .and_then(|parsed| self.initial.key_in_group(&parsed, group))
                    .and_then(|key| self.initial.volume(&key))
                    .map(|v| v.access);
                if let Some(mode) = original {
                    self.volume_access
                        .entry((name.clone(), group.clone()))
                        .or_insert(mode);
                }
            }
            Operation::CreateStoragePolicy { name, .. } => {
                if !self.storage_policies.contains(name) {
                    self.storage_policies.push(name.clone());
                }
            }
            Operation::WriteVolume { .. }
            | Operation::ReadVolume { .. }
            | Operation::InspectVolume { .. } => {}
        }
    }

    /// 정리 명령 목록을 만듭니다. 만들 수 없는 작업은 실패로 돌려줍니다.
    pub fn plan(&self, ctx: &RenderContext<'_>) -> (Vec<TeardownAction>, Vec<TeardownFailure>) {
        let mut actions = Vec::new();
        let mut failures = Vec::new();
        let cli = ctx.backend.admin_cli.as_str();
        let admin = |description: String, command: AdminCommand| TeardownAction {
            description,
            invocation: Invocation {
                target: TargetRef::Admin,
                command: command.render(cli),
                kind: InvocationKind::Generic,
            },
        };
        let docker = |description: String, host: &HostId, command: DockerCommand| TeardownAction {
            description,
            invocation: Invocation {
                target: TargetRef::Host(host.clone()),
                command: command.render(),
                kind: InvocationKind::Generic,
            },
        };

        for (host, container) in &self.containers {
            actions.push(docker(
                format!("remove container {container} on {host}"),
                host,
                DockerCommand::RemoveContainer {
                    container: container.clone(),
                },
            ));
        }

        for (group, host, change) in self.memberships.iter().rev() {
            let Some(vm) = ctx.environment.host(host.as_str()).map(|h| h.vm_name.clone()) else {
                failures.push(TeardownFailure {
                    action: format!("revert membership of {host} in {group}"),
                    error: format!("unknown host '{host}'"),
                });
                continue;
            };
            let group = group.clone();
            let (description, command) = match change {
                MembershipChange::Add => (
                    format!("remove {host} from {group}"),
                    AdminCommand::VmRm { group, vm },
                ),
                MembershipChange::Remove => (
                    format!("add {host} back to {group}"),
                    AdminCommand::VmAdd { group, vm },
                ),
            };
            actions.push(admin(description, command));
        }

        for volume in &self.volumes {
            if self.created_groups.contains(&volume.group) {
                continue;
            }
            let description = format!("delete volume {}", volume.name);
            match self.delete_host(volume) {
                Some(host) => actions.push(docker(
                    description,
                    &host,
                    DockerCommand::VolumeRm {
                        name: volume.name.clone(),
                    },
                )),
                None => failures.push(TeardownFailure {
                    action: description,
                    error: format!("no host in group '{}' can see the volume", volume.group),
                }),
            }
        }

        for group in &self.created_groups {
            actions.push(admin(
                format!("remove group {group}"),
                AdminCommand::GroupRm {
                    group: group.clone(),
                    remove_volumes: true,
                },
            ));
        }

        for ((group, datastore), policy) in &self.policies {
            actions.push(admin(
                format!("restore access policy {group}/{datastore}"),
                AdminCommand::AccessSet {
                    group: group.clone(),
                    datastore: datastore.clone(),
                    update: policy.as_update(),
                },
            ));
        }

        for ((volume, group), mode) in &self.volume_access {
            actions.push(admin(
                format!("restore access of {volume} in {group}"),
                AdminCommand::VolumeSetAccess {
                    volume: volume.clone(),
                    group: group.clone(),
                    mode: *mode,
                },
            ));
        }

        for name in &self.storage_policies {
            actions.push(admin(
                format!("remove storage policy {name}"),
                AdminCommand::PolicyRm { name: name.clone() },
            ));
        }

        (actions, failures)
    }

    /// 멤버십 복원 뒤 볼륨을 볼 수 있는 호스트. 생성 호스트를 우선합니다.
    fn delete_host(&self, volume: &CreatedVolume) -> Option<HostId> {
        if self.initial.host_group(&volume.creator) == volume.group {
            return Some(volume.creator.clone());
        }
        self.initial.members(&volume.group).into_iter().next()
    }
}

fn base_of(name: &str) -> String {
    VolumeName::parse(name).map_or_else(|_| name.to_owned(), |n| n.base().to_owned())
}

/// 정리 작업을 모두 실행하고 실패를 모읍니다. 실패해도 다음 작업을 계속합니다.
pub async fn run_teardown<E: RemoteExecutor>(
    remote: &Remote<E>,
    ledger: &Ledger,
    scenario: &str,
) -> Vec<TeardownFailure> {
    let (actions, mut failures) = ledger.plan(&remote.render_context());
    if actions.is_empty() && failures.is_empty() {
        return failures;
    }
    info!(scenario = scenario, actions = actions.len(), "running teardown");

    for action in actions {
        let error = match remote.run_with_retry(&action.invocation, scenario).await {
            Ok(output) if output.success() => continue,
            Ok(output) => format!("exit {}: {}", output.exit_code, output.combined()),
            Err(e) => e.to_string(),
        };
        warn!(
            scenario = scenario,
            action = action.description.as_str(),
            error = error.as_str(),
            "teardown action failed"
        );
        failures.push(TeardownFailure {
            action: action.description,
            error,
        });
    }

    if !failures.is_empty() {
        metrics::counter!(m::TEARDOWN_FAILURES_TOTAL, m::LABEL_SCENARIO => scenario.to_owned())
            .increment(failures.len() as u64);
    }
    failures
}
