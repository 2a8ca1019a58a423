//! 기본 시나리오 카탈로그
//!
//! 각 템플릿은 환경 설정과 이름 생성기로 구체적인 [`Scenario`]를 만듭니다.
//! 대부분의 단계는 예상 결과를 모델에 맡기고, 백엔드 동작을 문서화하는
//! 단계만 결과를 명시합니다.

use volprobe_core::config::EnvironmentConfig;
use volprobe_core::types::{AccessMode, DatastoreName, GroupName, HostId, SizeMb};
use volprobe_model::{
    CreateVolume, FailureClass, Observable, Operation, PolicyUpdate, ProbeSpec,
};

use crate::naming::ResourceNamer;
use crate::scenario::{Scenario, Step};

/// 시나리오를 만들 때 쓰는 환경과 이름 생성기
pub struct ScenarioContext<'a> {
    pub environment: &'a EnvironmentConfig,
    pub namer: ResourceNamer,
}

impl<'a> ScenarioContext<'a> {
    pub fn new(environment: &'a EnvironmentConfig, namer: ResourceNamer) -> Self {
        Self { environment, namer }
    }

    /// 설정 순서로 `idx`번째 Docker 호스트
    pub fn host(&self, idx: usize) -> Result<HostId, String> {
        self.environment
            .hosts
            .get(idx)
            .map(|h| h.id())
            .ok_or_else(|| format!("needs at least {} docker hosts", idx + 1))
    }

    pub fn datastore(&self, idx: usize) -> Result<DatastoreName, String> {
        self.environment
            .datastores
            .get(idx)
            .map(|d| DatastoreName::new(d.clone()))
            .ok_or_else(|| format!("needs at least {} datastores", idx + 1))
    }

    /// 새 그룹의 기본 데이터스토어. 두 번째가 없으면 첫 번째를 씁니다.
    pub fn group_datastore(&self) -> Result<DatastoreName, String> {
        self.datastore(1).or_else(|_| self.datastore(0))
    }

    pub fn vm_datastore(&self) -> DatastoreName {
        DatastoreName::new(self.environment.vm_datastore.clone())
    }

    pub fn vsan(&self) -> Result<DatastoreName, String> {
        self.environment
            .vsan_datastore()
            .ok_or_else(|| "no vsan datastore configured".to_owned())
    }
}

type BuildFn = fn(&mut ScenarioContext<'_>) -> Result<Scenario, String>;

/// 카탈로그 항목
#[derive(Debug)]
pub struct ScenarioTemplate {
    pub name: &'static str,
    pub description: &'static str,
    build: BuildFn,
}

impl ScenarioTemplate {
    /// 시나리오를 만듭니다. 환경이 부족하면 사유를 반환합니다.
    pub fn build(&self, ctx: &mut ScenarioContext<'_>) -> Result<Scenario, String> {
        let scenario = (self.build)(ctx)?;
        Ok(Scenario {
            name: self.name.to_owned(),
            description: self.description.to_owned(),
            ..scenario
        })
    }
}

const CATALOG: &[ScenarioTemplate] = &[
    ScenarioTemplate {
        name: "shared_volume_lifecycle",
        description: "shared volume attached from two hosts, cross-host IO, refcount tracking",
        build: shared_volume_lifecycle,
    },
    ScenarioTemplate {
        name: "volume_name_limits",
        description: "100-character names are accepted, 101-character names rejected",
        build: volume_name_limits,
    },
    ScenarioTemplate {
        name: "valid_volume_names",
        description: "special characters, digit suffixes, @datastore routing, unicode",
        build: valid_volume_names,
    },
    ScenarioTemplate {
        name: "invalid_volume_names",
        description: "over-long names, 6-digit suffix, unknown datastore",
        build: invalid_volume_names,
    },
    ScenarioTemplate {
        name: "valid_volume_options",
        description: "size, diskformat, attach-as, fstype, access and clone-from options",
        build: valid_volume_options,
    },
    ScenarioTemplate {
        name: "invalid_volume_options",
        description: "malformed option values, unknown keys, missing clone source",
        build: invalid_volume_options,
    },
    ScenarioTemplate {
        name: "default_group_lifecycle",
        description: "create, attach, detach and delete in the default group",
        build: default_group_lifecycle,
    },
    ScenarioTemplate {
        name: "access_across_groups",
        description: "volumes of the default group are hidden from members of another group",
        build: access_across_groups,
    },
    ScenarioTemplate {
        name: "default_group_create_privilege",
        description: "revoking allow-create on the default group blocks new volumes",
        build: default_group_create_privilege,
    },
    ScenarioTemplate {
        name: "non_default_group_create",
        description: "volume lifecycle inside a new vmgroup",
        build: non_default_group_create,
    },
    ScenarioTemplate {
        name: "group_quota",
        description: "max volume size and total size quotas are inclusive",
        build: group_quota,
    },
    ScenarioTemplate {
        name: "access_update_round_trip",
        description: "read-only access blocks writes from every host until restored",
        build: access_update_round_trip,
    },
    ScenarioTemplate {
        name: "vsan_policy",
        description: "vsan-policy-name accepts valid policies and rejects missing or invalid ones",
        build: vsan_policy,
    },
];

/// 전체 카탈로그
pub fn catalog() -> &'static [ScenarioTemplate] {
    CATALOG
}

pub fn find(name: &str) -> Option<&'static ScenarioTemplate> {
    CATALOG.iter().find(|t| t.name == name)
}

// --- probe helpers ---

fn available(volume: &str, host: &HostId) -> ProbeSpec {
    ProbeSpec::on_host(
        Observable::Availability {
            volume: volume.to_owned(),
        },
        host.clone(),
    )
}

fn admin_available(volume: &str) -> ProbeSpec {
    ProbeSpec::admin(Observable::Availability {
        volume: volume.to_owned(),
    })
}

fn refcount(volume: &str, host: &HostId) -> ProbeSpec {
    ProbeSpec::on_host(
        Observable::RefCount {
            volume: volume.to_owned(),
        },
        host.clone(),
    )
}

fn attach_status(volume: &str, host: &HostId) -> ProbeSpec {
    ProbeSpec::on_host(
        Observable::AttachStatus {
            volume: volume.to_owned(),
        },
        host.clone(),
    )
}

fn access_mode(volume: &str, host: &HostId) -> ProbeSpec {
    ProbeSpec::on_host(
        Observable::AccessMode {
            volume: volume.to_owned(),
        },
        host.clone(),
    )
}

fn membership(group: &GroupName) -> ProbeSpec {
    ProbeSpec::admin(Observable::Membership {
        group: group.clone(),
    })
}

fn create_allowed(group: &GroupName, datastore: &DatastoreName) -> ProbeSpec {
    ProbeSpec::admin(Observable::CreateAllowed {
        group: group.clone(),
        datastore: datastore.clone(),
    })
}

fn write(volume: &str, host: &HostId, container: String, file: &str, data: &str) -> Step {
    Step::new(Operation::WriteVolume {
        name: volume.to_owned(),
        host: host.clone(),
        container,
        file: file.to_owned(),
        data: data.to_owned(),
    })
}

fn read(volume: &str, host: &HostId, container: String, file: &str) -> Step {
    Step::new(Operation::ReadVolume {
        name: volume.to_owned(),
        host: host.clone(),
        container,
        file: file.to_owned(),
    })
}

fn create_group(group: &GroupName, datastore: &DatastoreName) -> Step {
    Step::new(Operation::CreateGroup {
        group: group.clone(),
        default_datastore: datastore.clone(),
    })
    .expect_success()
}

fn remove_group(group: &GroupName, remove_volumes: bool) -> Step {
    Step::new(Operation::RemoveGroup {
        group: group.clone(),
        remove_volumes,
    })
}

// --- scenarios ---

const SHARED_DATA: &str = "1234567890ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const TEST_FILE: &str = "test.txt";

fn shared_volume_lifecycle(ctx: &mut ScenarioContext<'_>) -> Result<Scenario, String> {
    let manager = ctx.host(0)?;
    let worker1 = ctx.host(1)?;
    let worker2 = ctx.host(2)?;
    let volume = ctx.namer.volume("shared");
    let container = ctx.namer.container("c");
    let io = ctx.namer.container("io");

    let mut scenario = Scenario::new("shared_volume_lifecycle")
        .min_hosts(3)
        .step(
            Step::new(CreateVolume::new(volume.clone(), worker1.clone()).shared())
                .expect_success()
                .check(available(&volume, &worker1))
                .check(available(&volume, &manager)),
        )
        .step(
            Step::new(Operation::attach(&volume, manager.clone(), container.clone()))
                .check(refcount(&volume, &worker1)),
        )
        .step(
            Step::new(Operation::attach(&volume, worker1.clone(), container.clone()))
                .check(refcount(&volume, &manager))
                .check(attach_status(&volume, &worker1)),
        );

    for (writer, reader) in [(&manager, &worker1), (&worker1, &manager)] {
        scenario = scenario
            .step(write(&volume, writer, io.clone(), TEST_FILE, SHARED_DATA).expect_success())
            .step(read(&volume, reader, io.clone(), TEST_FILE).expect_success());
    }

    Ok(scenario
        .step(
            Step::new(Operation::detach(&volume, manager.clone(), container.clone()))
                .check(refcount(&volume, &worker1)),
        )
        .step(
            Step::new(Operation::detach(&volume, worker1.clone(), container))
                .check(refcount(&volume, &worker1))
                .check(attach_status(&volume, &worker2)),
        )
        .step(
            Step::new(Operation::delete(&volume, worker2))
                .expect_success()
                .check(available(&volume, &worker1))
                .check(admin_available(&volume)),
        ))
}

fn volume_name_limits(ctx: &mut ScenarioContext<'_>) -> Result<Scenario, String> {
    let host = ctx.host(0)?;
    let longest = ctx.namer.volume_of_len(100);
    let too_long = ctx.namer.volume_of_len(101);

    Ok(Scenario::new("volume_name_limits")
        .step(
            Step::new(CreateVolume::new(longest.clone(), host.clone()))
                .expect_success()
                .check(available(&longest, &host)),
        )
        .step(
            Step::new(CreateVolume::new(too_long.clone(), host.clone()))
                .expect_failure(FailureClass::InvalidName)
                .check(available(&too_long, &host)),
        )
        .step(Step::new(Operation::delete(&longest, host.clone())).check(available(&longest, &host))))
}

fn valid_volume_names(ctx: &mut ScenarioContext<'_>) -> Result<Scenario, String> {
    let host = ctx.host(0)?;
    let ds = ctx.datastore(0)?;
    let run = ctx.namer.run_id().to_owned();

    let names = [
        ctx.namer.volume_of_len(100),
        format!("{}-****-###", ctx.namer.volume("Volume")),
        format!("Volume-{run}-00000"),
        format!("Volume-{run}-0000000"),
        format!("{}@{ds}", ctx.namer.volume("abc")),
        format!("{}@@@@{ds}", ctx.namer.volume("abc")),
        ctx.namer.volume("Volume-ä½ "),
    ];

    Ok(Scenario::new("valid_volume_names").steps(names.into_iter().map(|name| {
        Step::new(CreateVolume::new(name.clone(), host.clone()))
            .expect_success()
            .check(available(&name, &host))
    })))
}

fn invalid_volume_names(ctx: &mut ScenarioContext<'_>) -> Result<Scenario, String> {
    let host = ctx.host(0)?;
    let run = ctx.namer.run_id().to_owned();

    let names = [
        ctx.namer.volume_of_len(101),
        format!("Volume-{run}-000000"),
        format!("{}@invalidDatastore", ctx.namer.volume("Volume")),
    ];

    Ok(Scenario::new("invalid_volume_names").steps(names.into_iter().map(|name| {
        Step::new(CreateVolume::new(name, host.clone())).expect_failure(FailureClass::InvalidName)
    })))
}

fn valid_volume_options(ctx: &mut ScenarioContext<'_>) -> Result<Scenario, String> {
    let host = ctx.host(0)?;
    let source = ctx.namer.volume("clone_src");

    let options = [
        ("size", "10gb".to_owned()),
        ("diskformat", "zeroedthick".to_owned()),
        ("diskformat", "thin".to_owned()),
        ("diskformat", "eagerzeroedthick".to_owned()),
        ("attach-as", "independent_persistent".to_owned()),
        ("attach-as", "persistent".to_owned()),
        ("fstype", "ext4".to_owned()),
        ("access", "read-only".to_owned()),
        ("access", "read-write".to_owned()),
        ("clone-from", source.clone()),
    ];

    let mut scenario = Scenario::new("valid_volume_options").step(
        Step::new(CreateVolume::new(source.clone(), host.clone()))
            .expect_success()
            .check(available(&source, &host)),
    );
    for (key, value) in options {
        let name = ctx.namer.volume("valid_opts");
        scenario = scenario.step(
            Step::new(CreateVolume::new(name.clone(), host.clone()).opt(key, value))
                .expect_success()
                .check(available(&name, &host)),
        );
    }

    // xfs는 12자 이하 이름만 허용
    let xfs = ctx.namer.volume_of_len(12);
    Ok(scenario.step(
        Step::new(CreateVolume::new(xfs.clone(), host.clone()).opt("fstype", "xfs"))
            .expect_success()
            .check(available(&xfs, &host)),
    ))
}

fn invalid_volume_options(ctx: &mut ScenarioContext<'_>) -> Result<Scenario, String> {
    let host = ctx.host(0)?;
    let missing_source = ctx.namer.volume("IDontExist");

    let options = [
        ("diskformat", "zeroedthickk".to_owned()),
        ("diskformat", "zeroedthick,thin".to_owned()),
        ("size", "100mbb".to_owned()),
        ("size", "100gbEE".to_owned()),
        ("sizes", "100mb".to_owned()),
        ("fstype", "xfs_ext".to_owned()),
        ("access", "read-write-both".to_owned()),
        ("access", "write-only".to_owned()),
        ("clone-from", missing_source),
    ];

    let mut scenario = Scenario::new("invalid_volume_options");
    for (key, value) in options {
        let name = ctx.namer.volume("invalid_opts");
        scenario = scenario.step(
            Step::new(CreateVolume::new(name, host.clone()).opt(key, value))
                .expect_failure(FailureClass::InvalidOption),
        );
    }

    let long_xfs = ctx.namer.volume_of_len(13);
    Ok(scenario.step(
        Step::new(CreateVolume::new(long_xfs, host).opt("fstype", "xfs"))
            .expect_failure(FailureClass::InvalidOption),
    ))
}

fn default_group_lifecycle(ctx: &mut ScenarioContext<'_>) -> Result<Scenario, String> {
    let host = ctx.host(0)?;
    let volume = ctx.namer.volume("vmgroup");
    let container = ctx.namer.container("vmgroup");

    Ok(Scenario::new("default_group_lifecycle")
        .step(
            Step::new(
                CreateVolume::new(volume.clone(), host.clone()).in_group(GroupName::default_group()),
            )
            .expect_success()
            .check(available(&volume, &host))
            .check(admin_available(&volume)),
        )
        .step(
            Step::new(Operation::attach(&volume, host.clone(), container.clone()))
                .expect_success()
                .check(attach_status(&volume, &host)),
        )
        .step(
            Step::new(Operation::detach(&volume, host.clone(), container))
                .check(attach_status(&volume, &host)),
        )
        .step(
            Step::new(Operation::delete(&volume, host.clone()))
                .expect_success()
                .check(available(&volume, &host)),
        ))
}

fn access_across_groups(ctx: &mut ScenarioContext<'_>) -> Result<Scenario, String> {
    let vm1 = ctx.host(0)?;
    let vm2 = ctx.host(1)?;
    let ds = ctx.group_datastore()?;
    let group = GroupName::new(ctx.namer.group("vmgroup_test"));
    let volume = ctx.namer.volume("vmgroup");

    Ok(Scenario::new("access_across_groups")
        .min_hosts(2)
        .step(Step::new(CreateVolume::new(volume.clone(), vm1.clone())).expect_success())
        .step(create_group(&group, &ds))
        .step(Step::new(Operation::add_member(group.clone(), vm1.clone())).check(membership(&group)))
        .step(
            Step::new(Operation::inspect(&volume, vm1.clone()))
                .expect_failure(FailureClass::NotVisible)
                .check(available(&volume, &vm1))
                .check(available(&volume, &vm2)),
        )
        .step(
            Step::new(Operation::delete(&volume, vm1.clone()))
                .expect_failure(FailureClass::AccessDenied),
        )
        .step(
            Step::new(Operation::delete(&volume, vm2))
                .expect_success()
                .check(admin_available(&volume)),
        )
        .step(Step::new(Operation::remove_member(group.clone(), vm1)).check(membership(&group)))
        .step(remove_group(&group, false)))
}

fn default_group_create_privilege(ctx: &mut ScenarioContext<'_>) -> Result<Scenario, String> {
    let host = ctx.host(0)?;
    let default = GroupName::default_group();
    let ds = ctx.vm_datastore();
    let first = ctx.namer.volume("vmgroup");
    let second = ctx.namer.volume("vmgroup");
    let container = ctx.namer.container("vmgroup");

    Ok(Scenario::new("default_group_create_privilege")
        .step(Step::new(CreateVolume::new(first.clone(), host.clone())).expect_success())
        .step(Step::new(Operation::attach(&first, host.clone(), container.clone())))
        .step(
            Step::new(Operation::set_policy(
                default.clone(),
                ds.clone(),
                PolicyUpdate::default().allow_create(false),
            ))
            .check(create_allowed(&default, &ds)),
        )
        .step(
            Step::new(CreateVolume::new(second.clone(), host.clone()))
                .expect_failure(FailureClass::AccessDenied)
                .check(available(&second, &host)),
        )
        .step(
            Step::new(Operation::set_policy(
                default.clone(),
                ds.clone(),
                PolicyUpdate::default().allow_create(true),
            ))
            .check(create_allowed(&default, &ds)),
        )
        .step(Step::new(Operation::detach(&first, host.clone(), container)))
        .step(Step::new(Operation::delete(&first, host)).expect_success()))
}

fn non_default_group_create(ctx: &mut ScenarioContext<'_>) -> Result<Scenario, String> {
    let host = ctx.host(0)?;
    let ds = ctx.group_datastore()?;
    let group = GroupName::new(ctx.namer.group("vmgroup_test"));
    let volume = ctx.namer.volume("vmgroup");
    let container = ctx.namer.container("vmgroup");

    Ok(Scenario::new("non_default_group_create")
        .step(create_group(&group, &ds).check(create_allowed(&group, &ds)))
        .step(Step::new(Operation::add_member(group.clone(), host.clone())).check(membership(&group)))
        .step(
            Step::new(CreateVolume::new(volume.clone(), host.clone()).in_group(group.clone()))
                .expect_success()
                .check(available(&volume, &host)),
        )
        .step(
            Step::new(Operation::attach(&volume, host.clone(), container.clone()))
                .check(attach_status(&volume, &host)),
        )
        .step(Step::new(Operation::detach(&volume, host.clone(), container)))
        .step(Step::new(Operation::delete(&volume, host.clone())).expect_success())
        .step(Step::new(Operation::remove_member(group.clone(), host)).check(membership(&group)))
        .step(remove_group(&group, true)))
}

fn group_quota(ctx: &mut ScenarioContext<'_>) -> Result<Scenario, String> {
    let host = ctx.host(0)?;
    let ds = ctx.group_datastore()?;
    let group = GroupName::new(ctx.namer.group("vmgroup_test"));
    let first = ctx.namer.volume("quota");
    let second = ctx.namer.volume("quota");
    let third = ctx.namer.volume("quota");

    let limits = |total: SizeMb| {
        PolicyUpdate::default()
            .allow_create(true)
            .max_volume_size(SizeMb::gb(1))
            .total_size(total)
    };
    let sized = |name: &str, size: &str| {
        Step::new(
            CreateVolume::new(name.to_owned(), host.clone())
                .in_group(group.clone())
                .opt("size", size),
        )
    };

    Ok(Scenario::new("group_quota")
        .step(create_group(&group, &ds))
        .step(Step::new(Operation::add_member(group.clone(), host.clone())))
        .step(Step::new(Operation::set_policy(group.clone(), ds.clone(), limits(SizeMb::gb(1)))))
        .step(sized(&first, "1gb").expect_success().check(available(&first, &host)))
        .step(sized(&second, "1gb").expect_failure(FailureClass::QuotaExceeded))
        .step(sized(&third, "1023mb").expect_failure(FailureClass::QuotaExceeded))
        .step(Step::new(Operation::set_policy(group.clone(), ds, limits(SizeMb::gb(2)))))
        .step(sized(&second, "1024mb").expect_success().check(available(&second, &host)))
        .step(sized(&third, "1mb").expect_failure(FailureClass::QuotaExceeded))
        .step(Step::new(Operation::delete(&first, host.clone())))
        .step(Step::new(Operation::delete(&second, host.clone())))
        .step(Step::new(Operation::remove_member(group.clone(), host.clone())))
        .step(remove_group(&group, false)))
}

fn access_update_round_trip(ctx: &mut ScenarioContext<'_>) -> Result<Scenario, String> {
    let vm1 = ctx.host(0)?;
    let vm2 = ctx.host(1)?;
    let ds = ctx.datastore(0)?;
    let volume = format!("{}@{ds}", ctx.namer.volume("vol_access"));
    let default = GroupName::default_group();
    let data1 = "message_by_host1";
    let data2 = "message_by_host2";

    let set_access = |mode: AccessMode| {
        Step::new(Operation::SetVolumeAccess {
            name: volume.clone(),
            group: default.clone(),
            mode,
        })
        .expect_success()
        .check(access_mode(&volume, &vm1))
    };

    let mut c = || ctx.namer.container("vol_access");
    let steps = vec![
        Step::new(CreateVolume::new(volume.clone(), vm1.clone())).expect_success(),
        write(&volume, &vm1, c(), TEST_FILE, data1).expect_success(),
        read(&volume, &vm2, c(), TEST_FILE).expect_success(),
        write(&volume, &vm2, c(), TEST_FILE, data2).expect_success(),
        set_access(AccessMode::ReadOnly),
        write(&volume, &vm1, c(), TEST_FILE, data1).expect_failure(FailureClass::AccessDenied),
        write(&volume, &vm2, c(), TEST_FILE, data2).expect_failure(FailureClass::AccessDenied),
        read(&volume, &vm1, c(), TEST_FILE).expect_success(),
        set_access(AccessMode::ReadWrite),
        write(&volume, &vm1, c(), TEST_FILE, data1).expect_success(),
        write(&volume, &vm2, c(), TEST_FILE, data2).expect_success(),
        Step::new(Operation::delete(&volume, vm1.clone())).expect_success(),
    ];

    Ok(Scenario::new("access_update_round_trip")
        .min_hosts(2)
        .steps(steps))
}

fn vsan_policy(ctx: &mut ScenarioContext<'_>) -> Result<Scenario, String> {
    let host = ctx.host(0)?;
    let vsan = ctx.vsan()?;
    let valid = ctx.namer.volume("validPolicy");
    let invalid = ctx.namer.volume("invalidPolicy");
    let missing = ctx.namer.volume("IDontExist");
    let volume = format!("{}@{vsan}", ctx.namer.volume("vsanVol"));

    let mut scenario = Scenario::new("vsan_policy")
        .requires_vsan()
        .step(
            Step::new(Operation::CreateStoragePolicy {
                name: valid.clone(),
                content: r#"(("proportionalCapacity" i50)("hostFailuresToTolerate" i0))"#.to_owned(),
            })
            .expect_success(),
        )
        .step(
            Step::new(Operation::CreateStoragePolicy {
                name: invalid.clone(),
                content: r#"(("wrongKey" i50)"#.to_owned(),
            })
            .expect_success(),
        )
        .step(
            Step::new(CreateVolume::new(volume.clone(), host.clone()).opt("vsan-policy-name", valid))
                .expect_success()
                .check(available(&volume, &host)),
        );

    for policy in [missing, invalid] {
        let name = format!("{}@{vsan}", ctx.namer.volume("vsanVol"));
        scenario = scenario.step(
            Step::new(CreateVolume::new(name, host.clone()).opt("vsan-policy-name", policy))
                .expect_failure(FailureClass::InvalidOption),
        );
    }
    Ok(scenario)
}
