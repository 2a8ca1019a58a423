//! 관리 CLI / Docker 명령 렌더링
//!
//! 도메인 연산과 조회 스펙은 여기서만 구체적인 명령 문자열이 됩니다.
//! 인자는 원격 셸에서 해석되므로 [`shell_quote`]로 감쌉니다.

use std::collections::BTreeMap;

use volprobe_core::config::{BackendConfig, EnvironmentConfig};
use volprobe_core::types::{AccessMode, DatastoreName, GroupName, HostId};
use volprobe_model::group::{PolicyUpdate, SizeLimit};
use volprobe_model::observable::{Observable, ProbeSpec, ProbeView};
use volprobe_model::operation::{MembershipChange, Operation};

use crate::error::BackendError;
use crate::executor::{CommandLine, TargetRef};

/// 셸 인자 하나로 안전하게 감쌉니다. 특수문자가 없으면 그대로 둡니다.
pub fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_@%+=:,./-".contains(c));
    if safe {
        arg.to_owned()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Docker 호스트에서 실행하는 명령
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockerCommand {
    VolumeCreate {
        driver: String,
        name: String,
        options: BTreeMap<String, String>,
    },
    VolumeRm {
        name: String,
    },
    VolumeLs,
    VolumeInspect {
        name: String,
    },
    /// 볼륨을 연결한 채 대기하는 컨테이너
    RunDetached {
        container: String,
        volume: String,
        image: String,
        mount: String,
    },
    RemoveContainer {
        container: String,
    },
    WriteFile {
        container: Option<String>,
        volume: String,
        image: String,
        mount: String,
        file: String,
        data: String,
    },
    ReadFile {
        container: Option<String>,
        volume: String,
        image: String,
        mount: String,
        file: String,
    },
}

impl DockerCommand {
    pub fn render(&self) -> CommandLine {
        let line = match self {
            Self::VolumeCreate {
                driver,
                name,
                options,
            } => {
                let mut line = format!(
                    "docker volume create --driver={} --name={}",
                    shell_quote(driver),
                    shell_quote(name)
                );
                for (key, value) in options {
                    line.push_str(" -o ");
                    line.push_str(&shell_quote(&format!("{key}={value}")));
                }
                line
            }
            Self::VolumeRm { name } => format!("docker volume rm {}", shell_quote(name)),
            Self::VolumeLs => "docker volume ls --format '{{.Name}}'".to_owned(),
            Self::VolumeInspect { name } => format!(
                "docker volume inspect --format '{{{{json .Status}}}}' {}",
                shell_quote(name)
            ),
            Self::RunDetached {
                container,
                volume,
                image,
                mount,
            } => format!(
                "docker run -d --name {} -v {} {} tail -f /dev/null",
                shell_quote(container),
                shell_quote(&format!("{volume}:{mount}")),
                shell_quote(image)
            ),
            Self::RemoveContainer { container } => {
                format!("docker rm -f {}", shell_quote(container))
            }
            Self::WriteFile {
                container,
                volume,
                image,
                mount,
                file,
                data,
            } => {
                let script = format!(
                    "echo {} > {}",
                    shell_quote(data),
                    shell_quote(&format!("{mount}/{file}"))
                );
                run_once(container.as_deref(), volume, mount, image, &script)
            }
            Self::ReadFile {
                container,
                volume,
                image,
                mount,
                file,
            } => {
                let script = format!("cat {}", shell_quote(&format!("{mount}/{file}")));
                run_once(container.as_deref(), volume, mount, image, &script)
            }
        };
        CommandLine::new(line)
    }
}

fn run_once(container: Option<&str>, volume: &str, mount: &str, image: &str, script: &str) -> String {
    let name = container
        .map(|c| format!(" --name {}", shell_quote(c)))
        .unwrap_or_default();
    format!(
        "docker run --rm{name} -v {} {} sh -c {}",
        shell_quote(&format!("{volume}:{mount}")),
        shell_quote(image),
        shell_quote(script)
    )
}

/// 관리 호스트에서 실행하는 관리 CLI 명령
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    GroupCreate {
        group: GroupName,
        default_datastore: DatastoreName,
    },
    GroupRm {
        group: GroupName,
        remove_volumes: bool,
    },
    VmAdd {
        group: GroupName,
        vm: String,
    },
    VmRm {
        group: GroupName,
        vm: String,
    },
    VmLs {
        group: GroupName,
    },
    AccessSet {
        group: GroupName,
        datastore: DatastoreName,
        update: PolicyUpdate,
    },
    AccessLs {
        group: GroupName,
    },
    PolicyCreate {
        name: String,
        content: String,
    },
    PolicyRm {
        name: String,
    },
    VolumeSetAccess {
        volume: String,
        group: GroupName,
        mode: AccessMode,
    },
    VolumeLs,
}

impl AdminCommand {
    /// `cli`는 관리 스크립트 경로
    pub fn render(&self, cli: &str) -> CommandLine {
        let args = match self {
            Self::GroupCreate {
                group,
                default_datastore,
            } => format!(
                "vmgroup create --name {} --default-datastore {}",
                shell_quote(group.as_str()),
                shell_quote(default_datastore.as_str())
            ),
            Self::GroupRm {
                group,
                remove_volumes,
            } => {
                let mut args = format!("vmgroup rm --name {}", shell_quote(group.as_str()));
                if *remove_volumes {
                    args.push_str(" --remove-volumes");
                }
                args
            }
            Self::VmAdd { group, vm } => format!(
                "vmgroup vm add --name {} --vm-list {}",
                shell_quote(group.as_str()),
                shell_quote(vm)
            ),
            Self::VmRm { group, vm } => format!(
                "vmgroup vm rm --name {} --vm-list {}",
                shell_quote(group.as_str()),
                shell_quote(vm)
            ),
            Self::VmLs { group } => {
                format!("vmgroup vm ls --name {}", shell_quote(group.as_str()))
            }
            Self::AccessSet {
                group,
                datastore,
                update,
            } => {
                let mut args = format!(
                    "vmgroup access set --name {} --datastore {}",
                    shell_quote(group.as_str()),
                    shell_quote(datastore.as_str())
                );
                if let Some(allow) = update.allow_create {
                    args.push_str(if allow {
                        " --allow-create True"
                    } else {
                        " --allow-create False"
                    });
                }
                if let Some(mode) = update.access {
                    args.push_str(&format!(" --access {mode}"));
                }
                if let Some(max) = update.max_volume_size {
                    args.push_str(&format!(" --volume-maxsize {}", size_arg(max)));
                }
                if let Some(total) = update.total_size {
                    args.push_str(&format!(" --volume-totalsize {}", size_arg(total)));
                }
                args
            }
            Self::AccessLs { group } => {
                format!("vmgroup access ls --name {}", shell_quote(group.as_str()))
            }
            Self::PolicyCreate { name, content } => format!(
                "policy create --name {} --content {}",
                shell_quote(name),
                shell_quote(content)
            ),
            Self::PolicyRm { name } => format!("policy rm --name {}", shell_quote(name)),
            Self::VolumeSetAccess {
                volume,
                group,
                mode,
            } => format!(
                "volume set --volume={} --vmgroup={} --options=access={mode}",
                shell_quote(volume),
                shell_quote(group.as_str())
            ),
            Self::VolumeLs => "volume ls".to_owned(),
        };
        CommandLine::new(format!("{} {args}", shell_quote(cli)))
    }
}

/// 무제한은 `0`으로 렌더링
fn size_arg(limit: SizeLimit) -> String {
    match limit {
        SizeLimit::Unlimited => "0".to_owned(),
        SizeLimit::Limit(size) => size.to_string(),
    }
}

/// 실행 결과를 어떻게 분류할지
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationKind {
    /// 볼륨 생성: 실패 메시지에 daemon 접두어가 있어야 함
    Create,
    Generic,
}

/// 렌더링된 명령과 실행 위치
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub target: TargetRef,
    pub command: CommandLine,
    pub kind: InvocationKind,
}

impl Invocation {
    fn docker(host: &HostId, command: DockerCommand) -> Self {
        Self {
            target: TargetRef::Host(host.clone()),
            command: command.render(),
            kind: InvocationKind::Generic,
        }
    }
}

/// 렌더링에 필요한 설정
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub backend: &'a BackendConfig,
    pub environment: &'a EnvironmentConfig,
}

impl<'a> RenderContext<'a> {
    pub fn new(backend: &'a BackendConfig, environment: &'a EnvironmentConfig) -> Self {
        Self {
            backend,
            environment,
        }
    }

    fn vm_name(&self, host: &HostId) -> Result<&'a str, BackendError> {
        self.environment
            .host(host.as_str())
            .map(|h| h.vm_name.as_str())
            .ok_or_else(|| BackendError::UnknownHost(host.to_string()))
    }

    fn admin(&self, command: AdminCommand) -> Invocation {
        Invocation {
            target: TargetRef::Admin,
            command: command.render(&self.backend.admin_cli),
            kind: InvocationKind::Generic,
        }
    }

    fn image(&self) -> String {
        self.backend.helper_image.clone()
    }

    fn mount(&self) -> String {
        self.backend.mount_path.clone()
    }
}

/// 도메인 연산을 실제 명령으로 렌더링합니다.
pub fn operation_invocation(
    op: &Operation,
    ctx: &RenderContext<'_>,
) -> Result<Invocation, BackendError> {
    let invocation = match op {
        Operation::CreateVolume(create) => {
            let driver = if create.shared {
                &ctx.backend.shared_driver
            } else {
                &ctx.backend.volume_driver
            };
            Invocation {
                kind: InvocationKind::Create,
                ..Invocation::docker(
                    &create.host,
                    DockerCommand::VolumeCreate {
                        driver: driver.clone(),
                        name: create.requested_name(),
                        options: create.effective_options(),
                    },
                )
            }
        }
        Operation::AttachVolume {
            name,
            host,
            container,
            ..
        } => Invocation::docker(
            host,
            DockerCommand::RunDetached {
                container: container.clone(),
                volume: name.clone(),
                image: ctx.image(),
                mount: ctx.mount(),
            },
        ),
        Operation::DetachVolume {
            host, container, ..
        } => Invocation::docker(
            host,
            DockerCommand::RemoveContainer {
                container: container.clone(),
            },
        ),
        Operation::DeleteVolume { name, host } => {
            Invocation::docker(host, DockerCommand::VolumeRm { name: name.clone() })
        }
        Operation::InspectVolume { name, host } => {
            Invocation::docker(host, DockerCommand::VolumeInspect { name: name.clone() })
        }
        Operation::WriteVolume {
            name,
            host,
            container,
            file,
            data,
        } => Invocation::docker(
            host,
            DockerCommand::WriteFile {
                container: Some(container.clone()),
                volume: name.clone(),
                image: ctx.image(),
                mount: ctx.mount(),
                file: file.clone(),
                data: data.clone(),
            },
        ),
        Operation::ReadVolume {
            name,
            host,
            container,
            file,
        } => Invocation::docker(
            host,
            DockerCommand::ReadFile {
                container: Some(container.clone()),
                volume: name.clone(),
                image: ctx.image(),
                mount: ctx.mount(),
                file: file.clone(),
            },
        ),
        Operation::SetGroupPolicy {
            group,
            datastore,
            policy,
        } => ctx.admin(AdminCommand::AccessSet {
            group: group.clone(),
            datastore: datastore.clone(),
            update: *policy,
        }),
        Operation::SetGroupMembership {
            group,
            host,
            change,
        } => {
            let vm = ctx.vm_name(host)?.to_owned();
            let group = group.clone();
            ctx.admin(match change {
                MembershipChange::Add => AdminCommand::VmAdd { group, vm },
                MembershipChange::Remove => AdminCommand::VmRm { group, vm },
            })
        }
        Operation::CreateGroup {
            group,
            default_datastore,
        } => ctx.admin(AdminCommand::GroupCreate {
            group: group.clone(),
            default_datastore: default_datastore.clone(),
        }),
        Operation::RemoveGroup {
            group,
            remove_volumes,
        } => ctx.admin(AdminCommand::GroupRm {
            group: group.clone(),
            remove_volumes: *remove_volumes,
        }),
        Operation::SetVolumeAccess { name, group, mode } => {
            ctx.admin(AdminCommand::VolumeSetAccess {
                volume: name.clone(),
                group: group.clone(),
                mode: *mode,
            })
        }
        Operation::CreateStoragePolicy { name, content } => {
            ctx.admin(AdminCommand::PolicyCreate {
                name: name.clone(),
                content: content.clone(),
            })
        }
    };
    Ok(invocation)
}

/// 조회 스펙을 읽기 전용 명령으로 렌더링합니다.
pub fn probe_invocation(
    spec: &ProbeSpec,
    ctx: &RenderContext<'_>,
) -> Result<Invocation, BackendError> {
    let invocation = match (&spec.observable, &spec.view) {
        (Observable::Availability { .. }, ProbeView::Host(host)) => {
            Invocation::docker(host, DockerCommand::VolumeLs)
        }
        (Observable::Availability { .. }, ProbeView::Admin) => ctx.admin(AdminCommand::VolumeLs),
        (
            Observable::RefCount { volume }
            | Observable::AccessMode { volume }
            | Observable::AttachStatus { volume },
            ProbeView::Host(host),
        ) => Invocation::docker(
            host,
            DockerCommand::VolumeInspect {
                name: volume.clone(),
            },
        ),
        (Observable::Membership { group }, ProbeView::Admin) => {
            ctx.admin(AdminCommand::VmLs {
                group: group.clone(),
            })
        }
        (Observable::CreateAllowed { group, .. }, ProbeView::Admin) => {
            ctx.admin(AdminCommand::AccessLs {
                group: group.clone(),
            })
        }
        (Observable::FileContent { volume, file }, ProbeView::Host(host)) => Invocation::docker(
            host,
            DockerCommand::ReadFile {
                container: None,
                volume: volume.clone(),
                image: ctx.image(),
                mount: ctx.mount(),
                file: file.clone(),
            },
        ),
        _ => {
            return Err(BackendError::parse(
                spec.to_string(),
                "no read command for this view",
            ));
        }
    };
    Ok(invocation)
}

#[cfg(test)]
mod tests {
    use volprobe_core::config::{HostConfig, HostRole};
    use volprobe_core::types::SizeMb;
    use volprobe_model::operation::CreateVolume;

    use super::*;

    fn environment() -> EnvironmentConfig {
        EnvironmentConfig {
            admin_host: "esx01".to_owned(),
            hosts: vec![HostConfig {
                alias: "worker1".to_owned(),
                address: "10.0.0.2".to_owned(),
                vm_name: "VM1".to_owned(),
                role: HostRole::Worker,
            }],
            datastores: vec!["datastore1".to_owned()],
            ..EnvironmentConfig::default()
        }
    }

    #[test]
    fn quote_leaves_plain_words_alone() {
        assert_eq!(shell_quote("vol1@datastore1"), "vol1@datastore1");
        assert_eq!(shell_quote("size=10gb"), "size=10gb");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn create_renders_driver_and_options() {
        let backend = BackendConfig::default();
        let env = environment();
        let ctx = RenderContext::new(&backend, &env);
        let op: Operation = CreateVolume::new("vol1", "worker1")
            .on_datastore(DatastoreName::new("datastore1"))
            .size(SizeMb::gb(1))
            .opt("diskformat", "thin")
            .into();

        let inv = operation_invocation(&op, &ctx).unwrap();
        assert_eq!(inv.kind, InvocationKind::Create);
        assert_eq!(inv.target, TargetRef::Host(HostId::new("worker1")));
        assert_eq!(
            inv.command.as_str(),
            "docker volume create --driver=vsphere --name=vol1@datastore1 \
             -o diskformat=thin -o size=1024mb"
        );
    }

    #[test]
    fn shared_create_uses_shared_driver() {
        let backend = BackendConfig::default();
        let env = environment();
        let ctx = RenderContext::new(&backend, &env);
        let op: Operation = CreateVolume::new("sv", "worker1").shared().into();
        let inv = operation_invocation(&op, &ctx).unwrap();
        assert!(inv.command.as_str().contains("--driver=vfile"));
    }

    #[test]
    fn write_quotes_script_once() {
        let cmd = DockerCommand::WriteFile {
            container: Some("w1".to_owned()),
            volume: "vol1".to_owned(),
            image: "busybox".to_owned(),
            mount: "/vol".to_owned(),
            file: "test.txt".to_owned(),
            data: "hello world".to_owned(),
        };
        assert_eq!(
            cmd.render().as_str(),
            r"docker run --rm --name w1 -v vol1:/vol busybox sh -c 'echo '\''hello world'\'' > /vol/test.txt'"
        );
    }

    #[test]
    fn membership_uses_vm_name() {
        let backend = BackendConfig::default();
        let env = environment();
        let ctx = RenderContext::new(&backend, &env);
        let op = Operation::add_member(GroupName::new("vg1"), "worker1");
        let inv = operation_invocation(&op, &ctx).unwrap();
        assert_eq!(inv.target, TargetRef::Admin);
        assert!(inv
            .command
            .as_str()
            .ends_with("vmgroup vm add --name vg1 --vm-list VM1"));

        let unknown = Operation::add_member(GroupName::new("vg1"), "ghost");
        assert!(matches!(
            operation_invocation(&unknown, &ctx),
            Err(BackendError::UnknownHost(_))
        ));
    }

    #[test]
    fn access_set_renders_only_changed_fields() {
        let cmd = AdminCommand::AccessSet {
            group: GroupName::new("vg1"),
            datastore: DatastoreName::new("datastore1"),
            update: PolicyUpdate::default()
                .allow_create(true)
                .max_volume_size(SizeMb::gb(1))
                .total_size(SizeMb::gb(2)),
        };
        assert_eq!(
            cmd.render("/opt/admin.py").as_str(),
            "/opt/admin.py vmgroup access set --name vg1 --datastore datastore1 \
             --allow-create True --volume-maxsize 1024mb --volume-totalsize 2048mb"
        );

        let unlimited = AdminCommand::AccessSet {
            group: GroupName::new("vg1"),
            datastore: DatastoreName::new("datastore1"),
            update: PolicyUpdate {
                total_size: Some(SizeLimit::Unlimited),
                ..PolicyUpdate::default()
            },
        };
        assert!(unlimited.render("a").as_str().ends_with("--volume-totalsize 0"));
    }

    #[test]
    fn volume_set_access_renders_options() {
        let cmd = AdminCommand::VolumeSetAccess {
            volume: "vol1@datastore1".to_owned(),
            group: GroupName::default_group(),
            mode: AccessMode::ReadOnly,
        };
        assert!(cmd.render("admin").as_str().ends_with(
            "volume set --volume=vol1@datastore1 --vmgroup=_DEFAULT --options=access=read-only"
        ));
    }

    #[test]
    fn probes_render_read_commands() {
        let backend = BackendConfig::default();
        let env = environment();
        let ctx = RenderContext::new(&backend, &env);

        let refcount = ProbeSpec::on_host(
            Observable::RefCount {
                volume: "sv".to_owned(),
            },
            "worker1",
        );
        assert_eq!(
            probe_invocation(&refcount, &ctx).unwrap().command.as_str(),
            "docker volume inspect --format '{{json .Status}}' sv"
        );

        let members = ProbeSpec::admin(Observable::Membership {
            group: GroupName::new("vg1"),
        });
        let inv = probe_invocation(&members, &ctx).unwrap();
        assert_eq!(inv.target, TargetRef::Admin);
        assert!(inv.command.as_str().ends_with("vmgroup vm ls --name vg1"));

        let invalid = ProbeSpec::admin(Observable::RefCount {
            volume: "sv".to_owned(),
        });
        assert!(probe_invocation(&invalid, &ctx).is_err());
    }
}
