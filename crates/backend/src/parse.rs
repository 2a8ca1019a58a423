//! 조회 명령 출력 파서
//!
//! Docker CLI와 관리 CLI의 출력을 [`ObservableValue`]로 바꿉니다.
//! 관리 CLI 표는 `---` 구분선 아래의 행을 공백으로 나눠 읽습니다.

use std::collections::BTreeSet;

use serde_json::Value;
use volprobe_core::config::EnvironmentConfig;
use volprobe_core::types::{ALL_DATASTORES, AccessMode, DatastoreName};
use volprobe_model::name::VolumeName;
use volprobe_model::observable::{AttachState, Observable, ObservableValue, ProbeSpec, ProbeView};

use crate::error::BackendError;
use crate::executor::CommandOutput;

/// `docker volume inspect --format '{{json .Status}}'`에서 읽은 값
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeStatus {
    pub refcount: Option<u32>,
    pub access: Option<AccessMode>,
    pub attached: Option<bool>,
}

const REFCOUNT_KEYS: [&str; 3] = ["Global Refcount", "GlobalRefcount", "refcount"];

/// 볼륨 상태 JSON을 해석합니다. 모르는 키는 무시합니다.
pub fn parse_volume_status(text: &str) -> Result<VolumeStatus, BackendError> {
    let value: Value = serde_json::from_str(text.trim())
        .map_err(|e| BackendError::parse("volume status", e.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| BackendError::parse("volume status", "expected a JSON object"))?;

    let refcount = REFCOUNT_KEYS
        .iter()
        .find_map(|key| object.get(*key))
        .map(|v| match v {
            Value::Number(n) => n
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| BackendError::parse("refcount", format!("invalid number {n}"))),
            Value::String(s) => s
                .trim()
                .parse::<u32>()
                .map_err(|e| BackendError::parse("refcount", e.to_string())),
            other => Err(BackendError::parse("refcount", format!("unexpected value {other}"))),
        })
        .transpose()?;

    let access = object
        .get("access")
        .and_then(Value::as_str)
        .map(|s| s.parse::<AccessMode>())
        .transpose()
        .map_err(|e| BackendError::parse("access", e))?;

    let attached = object
        .get("status")
        .or_else(|| object.get("Status"))
        .and_then(Value::as_str)
        .map(|s| match s.trim().to_ascii_lowercase().as_str() {
            "attached" | "mounted" => Ok(true),
            "detached" | "unmounted" | "ready" => Ok(false),
            other => Err(BackendError::parse("attach status", format!("unknown status '{other}'"))),
        })
        .transpose()?;

    Ok(VolumeStatus {
        refcount,
        access,
        attached,
    })
}

/// 관리 CLI 표에서 구분선 아래의 행들을 열 단위로 돌려줍니다.
///
/// 구분선이 없으면 첫 줄을 헤더로 보고 건너뜁니다.
pub fn table_rows(text: &str) -> Vec<Vec<&str>> {
    let lines: Vec<&str> = text.lines().collect();
    let is_separator =
        |l: &str| l.contains('-') && l.chars().all(|c| c == '-' || c.is_whitespace());
    let start = lines
        .iter()
        .position(|l| is_separator(l))
        .map_or(1, |i| i + 1);

    lines
        .into_iter()
        .skip(start)
        .map(|l| l.split_whitespace().collect::<Vec<_>>())
        .filter(|cols| !cols.is_empty())
        .collect()
}

/// `vmgroup vm ls` 출력의 VM 이름 (두 번째 열)
pub fn parse_vm_list(text: &str) -> Vec<String> {
    table_rows(text)
        .into_iter()
        .filter_map(|cols| cols.get(1).map(|s| (*s).to_owned()))
        .collect()
}

/// `vmgroup access ls` 한 행
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRow {
    pub datastore: DatastoreName,
    pub allow_create: bool,
}

/// `vmgroup access ls` 출력을 해석합니다. 두 번째 열이 `True`/`False`여야 합니다.
pub fn parse_access_table(text: &str) -> Result<Vec<AccessRow>, BackendError> {
    table_rows(text)
        .into_iter()
        .map(|cols| {
            let (Some(ds), Some(allow)) = (cols.first(), cols.get(1)) else {
                return Err(BackendError::parse("access table", "row has fewer than 2 columns"));
            };
            let allow_create = match allow.to_ascii_lowercase().as_str() {
                "true" => true,
                "false" => false,
                other => {
                    return Err(BackendError::parse(
                        "access table",
                        format!("invalid allow_create value '{other}'"),
                    ));
                }
            };
            Ok(AccessRow {
                datastore: DatastoreName::new(*ds),
                allow_create,
            })
        })
        .collect()
}

/// 표시된 이름(`base[@ds]`)이 요청한 이름과 같은 볼륨인지
fn name_matches(listed_base: &str, listed_ds: Option<&str>, requested: &str) -> bool {
    let Ok(name) = VolumeName::parse(requested) else {
        return listed_base == requested;
    };
    listed_base == name.base()
        && match (name.datastore(), listed_ds) {
            (Some(want), Some(have)) => want.as_str() == have,
            _ => true,
        }
}

/// `docker volume ls --format '{{.Name}}'` 출력에 볼륨이 있는지
pub fn docker_volume_listed(text: &str, requested: &str) -> bool {
    text.lines().map(str::trim).filter(|l| !l.is_empty()).any(|line| {
        let (base, ds) = match line.split_once('@') {
            Some((base, ds)) => (base, Some(ds)),
            None => (line, None),
        };
        name_matches(base, ds, requested)
    })
}

/// 관리 CLI `volume ls` 표(볼륨, 데이터스토어, ...)에 볼륨이 있는지
pub fn admin_volume_listed(text: &str, requested: &str) -> bool {
    table_rows(text)
        .into_iter()
        .any(|cols| name_matches(cols[0], cols.get(1).copied(), requested))
}

/// 조회 결과를 관측값으로 해석합니다.
pub fn parse_probe(
    spec: &ProbeSpec,
    output: &CommandOutput,
    environment: &EnvironmentConfig,
) -> Result<ObservableValue, BackendError> {
    if !output.success() {
        return Err(BackendError::parse(
            spec.to_string(),
            format!("probe exited with {}: {}", output.exit_code, output.combined()),
        ));
    }
    let stdout = output.stdout.as_str();

    let value = match (&spec.observable, &spec.view) {
        (Observable::Availability { volume }, ProbeView::Host(_)) => {
            ObservableValue::Flag(docker_volume_listed(stdout, volume))
        }
        (Observable::Availability { volume }, ProbeView::Admin) => {
            ObservableValue::Flag(admin_volume_listed(stdout, volume))
        }
        (Observable::RefCount { .. }, _) => {
            let count = parse_volume_status(stdout)?
                .refcount
                .ok_or_else(|| BackendError::parse(spec.to_string(), "no refcount in status"))?;
            ObservableValue::Count(count)
        }
        (Observable::AccessMode { .. }, _) => {
            let mode = parse_volume_status(stdout)?
                .access
                .ok_or_else(|| BackendError::parse(spec.to_string(), "no access in status"))?;
            ObservableValue::Access(mode)
        }
        (Observable::AttachStatus { .. }, _) => {
            let status = parse_volume_status(stdout)?;
            // 공유 볼륨은 상태 문자열 대신 refcount만 보고할 수 있음
            let attached = status
                .attached
                .or(status.refcount.map(|n| n > 0))
                .ok_or_else(|| BackendError::parse(spec.to_string(), "no attach status"))?;
            ObservableValue::Attach(if attached {
                AttachState::Attached
            } else {
                AttachState::Detached
            })
        }
        (Observable::Membership { .. }, _) => {
            let members: BTreeSet<String> = parse_vm_list(stdout)
                .into_iter()
                .map(|vm| {
                    environment
                        .host_by_vm_name(&vm)
                        .map_or(vm, |h| h.alias.clone())
                })
                .collect();
            ObservableValue::Members(members)
        }
        (Observable::CreateAllowed { datastore, .. }, _) => {
            let rows = parse_access_table(stdout)?;
            let wildcard = DatastoreName::new(ALL_DATASTORES);
            let row = rows
                .iter()
                .find(|r| &r.datastore == datastore)
                .or_else(|| rows.iter().find(|r| r.datastore == wildcard));
            ObservableValue::Flag(row.is_some_and(|r| r.allow_create))
        }
        (Observable::FileContent { .. }, _) => {
            ObservableValue::Text(stdout.trim_end_matches(['\n', '\r']).to_owned())
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use volprobe_core::config::{HostConfig, HostRole};
    use volprobe_core::types::GroupName;

    use super::*;

    const VM_LS: &str = "\
Uuid                                  Name
------------------------------------  ----
564d1a2b-0000-0000-0000-000000000001  VM1
564d1a2b-0000-0000-0000-000000000002  VM2
";

    const ACCESS_LS: &str = "\
Datastore   Allow_create  Max_volume_size  Total_size
----------  ------------  ---------------  ----------
_ALL_DS     True          0B               0B
datastore1  False         1.00GB           2.00GB
";

    const ADMIN_VOLUME_LS: &str = "\
Volume  Datastore   VMGroup   Capacity  Used
------  ----------  --------  --------  ----
vol1    datastore1  _DEFAULT  100MB     13MB
vol2    _VM_DS      vg1       1.00GB    0B
";

    fn environment() -> EnvironmentConfig {
        EnvironmentConfig {
            hosts: vec![HostConfig {
                alias: "worker1".to_owned(),
                address: "10.0.0.2".to_owned(),
                vm_name: "VM1".to_owned(),
                role: HostRole::Worker,
            }],
            ..EnvironmentConfig::default()
        }
    }

    #[test]
    fn status_reads_shared_refcount() {
        let status =
            parse_volume_status(r#"{"Global Refcount":2,"Mounted":"true","Status":"Mounted"}"#)
                .unwrap();
        assert_eq!(status.refcount, Some(2));
        assert_eq!(status.attached, Some(true));
    }

    #[test]
    fn status_reads_access_and_detached() {
        let status = parse_volume_status(
            r#"{"access":"read-only","attach-as":"independent_persistent","status":"detached"}"#,
        )
        .unwrap();
        assert_eq!(status.access, Some(AccessMode::ReadOnly));
        assert_eq!(status.attached, Some(false));
        assert_eq!(status.refcount, None);
    }

    #[test]
    fn status_accepts_string_refcount() {
        let status = parse_volume_status(r#"{"GlobalRefcount":"3"}"#).unwrap();
        assert_eq!(status.refcount, Some(3));
    }

    #[test]
    fn status_rejects_non_object() {
        assert!(parse_volume_status("[]").is_err());
        assert!(parse_volume_status("not json").is_err());
        assert!(parse_volume_status(r#"{"status":"exploded"}"#).is_err());
    }

    #[test]
    fn vm_list_second_column() {
        assert_eq!(parse_vm_list(VM_LS), vec!["VM1", "VM2"]);
        assert!(parse_vm_list("Uuid  Name\n----  ----\n").is_empty());
    }

    #[test]
    fn access_table_rows() {
        let rows = parse_access_table(ACCESS_LS).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].allow_create);
        assert_eq!(rows[1].datastore, DatastoreName::new("datastore1"));
        assert!(!rows[1].allow_create);
        assert!(parse_access_table("h\n-\nds maybe\n").is_err());
    }

    #[test]
    fn docker_listing_matches_base_and_datastore() {
        let listing = "vol1@datastore1\nother@_VM_DS\n";
        assert!(docker_volume_listed(listing, "vol1"));
        assert!(docker_volume_listed(listing, "vol1@datastore1"));
        assert!(!docker_volume_listed(listing, "vol1@vsanDatastore"));
        assert!(!docker_volume_listed(listing, "vol"));
    }

    #[test]
    fn admin_listing_matches_rows() {
        assert!(admin_volume_listed(ADMIN_VOLUME_LS, "vol2"));
        assert!(admin_volume_listed(ADMIN_VOLUME_LS, "vol1@datastore1"));
        assert!(!admin_volume_listed(ADMIN_VOLUME_LS, "vol1@_VM_DS"));
    }

    #[test]
    fn membership_maps_vm_names_to_aliases() {
        let spec = ProbeSpec::admin(Observable::Membership {
            group: GroupName::new("vg1"),
        });
        let value = parse_probe(&spec, &CommandOutput::ok(VM_LS), &environment()).unwrap();
        let expected: BTreeSet<String> = ["worker1".to_owned(), "VM2".to_owned()].into();
        assert_eq!(value, ObservableValue::Members(expected));
    }

    #[test]
    fn create_allowed_falls_back_to_wildcard() {
        let probe = |ds: &str| {
            ProbeSpec::admin(Observable::CreateAllowed {
                group: GroupName::default_group(),
                datastore: DatastoreName::new(ds),
            })
        };
        let out = CommandOutput::ok(ACCESS_LS);
        let env = environment();
        assert_eq!(
            parse_probe(&probe("datastore1"), &out, &env).unwrap(),
            ObservableValue::Flag(false)
        );
        assert_eq!(
            parse_probe(&probe("vsanDatastore"), &out, &env).unwrap(),
            ObservableValue::Flag(true)
        );
    }

    #[test]
    fn file_content_strips_trailing_newline() {
        let spec = ProbeSpec::on_host(
            Observable::FileContent {
                volume: "vol1".to_owned(),
                file: "f".to_owned(),
            },
            "worker1",
        );
        let value =
            parse_probe(&spec, &CommandOutput::ok("message_by_worker1\n"), &environment()).unwrap();
        assert_eq!(value, ObservableValue::Text("message_by_worker1".to_owned()));
    }

    #[test]
    fn failed_probe_is_parse_error() {
        let spec = ProbeSpec::on_host(
            Observable::RefCount {
                volume: "vol1".to_owned(),
            },
            "worker1",
        );
        let err = parse_probe(
            &spec,
            &CommandOutput::failed(1, "Error: No such volume: vol1"),
            &environment(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("No such volume"));
    }
}
