//! Simulated vDVS cluster.
//!
//! [`SimulatedCluster`] implements [`RemoteExecutor`] by parsing the rendered
//! docker / admin CLI command lines, applying them to its own state model and
//! printing output in the formats the real tools use. Faults can be switched on
//! to make the backend disagree with the model.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Mutex;

use volprobe_backend::classify::CREATE_ERROR_PREFIX;
use volprobe_backend::{BackendError, CommandLine, CommandOutput, RemoteExecutor, RemoteTarget};
use volprobe_core::config::{BackendConfig, EnvironmentConfig};
use volprobe_core::types::{AccessMode, DatastoreName, GroupName, HostId, SizeMb};
use volprobe_model::group::SizeLimit;
use volprobe_model::{
    CreateVolume, ExpectedStateSnapshot, FailureClass, Interpreter, ModelEnvironment, Operation,
    Outcome, PolicyUpdate, Resolution, StateModel,
};

/// Backend misbehaviour switches
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// `docker volume rm` ignores vmgroup isolation
    pub foreign_delete_allowed: bool,
    /// added to every reported shared-volume refcount
    pub refcount_skew: u32,
    /// hosts (or `admin`) that refuse ssh connections
    pub unreachable: BTreeSet<String>,
    /// `docker rm -f` fails on every host
    pub container_removal_fails: bool,
}

struct SimState {
    interpreter: Interpreter,
    faults: Faults,
    log: Vec<(String, String)>,
}

pub struct SimulatedCluster {
    environment: EnvironmentConfig,
    backend: BackendConfig,
    state: Mutex<SimState>,
}

impl SimulatedCluster {
    pub fn new(environment: EnvironmentConfig) -> Self {
        Self::with_faults(environment, Faults::default())
    }

    pub fn with_faults(environment: EnvironmentConfig, faults: Faults) -> Self {
        let model = StateModel::new(ModelEnvironment::from_config(&environment));
        Self {
            environment,
            backend: BackendConfig::default(),
            state: Mutex::new(SimState {
                interpreter: Interpreter::new(model),
                faults,
                log: Vec::new(),
            }),
        }
    }

    /// Every executed command as `(target label, command line)`
    pub fn log(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().log.clone()
    }

    /// Commands executed on one target
    pub fn commands_on(&self, label: &str) -> Vec<String> {
        self.log()
            .into_iter()
            .filter(|(l, _)| l == label)
            .map(|(_, c)| c)
            .collect()
    }

    pub fn snapshot(&self) -> ExpectedStateSnapshot {
        self.state.lock().unwrap().interpreter.model().snapshot()
    }

    /// No volumes, attachments, groups or changed policies left behind
    pub fn is_clean(&self) -> bool {
        let snapshot = self.snapshot();
        let initial = StateModel::new(ModelEnvironment::from_config(&self.environment)).snapshot();
        let default = GroupName::default_group();
        snapshot.volumes().next().is_none()
            && snapshot.attachments().next().is_none()
            && snapshot.groups().count() == initial.groups().count()
            && self.environment.all_datastores().iter().all(|ds| {
                snapshot.effective_policy(&default, ds) == initial.effective_policy(&default, ds)
            })
    }

    pub fn set_faults(&self, faults: Faults) {
        self.state.lock().unwrap().faults = faults;
    }

    fn handle(&self, target: &RemoteTarget, command: &CommandLine) -> Result<CommandOutput, BackendError> {
        let mut state = self.state.lock().unwrap();
        state
            .log
            .push((target.label.clone(), command.as_str().to_owned()));
        if state.faults.unreachable.contains(&target.label) {
            return Err(BackendError::Transport {
                host: target.label.clone(),
                reason: "ssh: connect to host: Connection refused".to_owned(),
            });
        }

        let words = shell_words(command.as_str());
        let words: Vec<&str> = words.iter().map(String::as_str).collect();
        let output = if target.label == "admin" {
            self.admin(&mut state, words.get(1..).unwrap_or_default())
        } else {
            self.docker(&mut state, &HostId::new(target.label.clone()), &words)
        };
        Ok(output)
    }

    fn docker(&self, state: &mut SimState, host: &HostId, words: &[&str]) -> CommandOutput {
        match words {
            ["docker", "volume", "create", driver, name, options @ ..] => {
                let driver = driver.trim_start_matches("--driver=");
                let name = name.trim_start_matches("--name=");
                let mut create = CreateVolume::new(name, host.clone());
                if driver == self.backend.shared_driver {
                    create = create.shared();
                }
                for pair in options.chunks(2) {
                    if let [_, kv] = pair {
                        let (k, v) = kv.split_once('=').unwrap_or((*kv, ""));
                        create = create.opt(k, v);
                    }
                }
                let prefix = format!("{CREATE_ERROR_PREFIX} {name}: VolumeDriver.Create:");
                apply(state, &create.into(), &prefix, name)
            }
            ["docker", "volume", "rm", name] => {
                if state.faults.foreign_delete_allowed {
                    if let Resolution::Foreign(key) = state.interpreter.model().resolve(name, host) {
                        state
                            .interpreter
                            .model_mut()
                            .grant_foreign_delete(host.clone(), key.group);
                    }
                }
                let prefix = format!("Error response from daemon: remove {name}: VolumeDriver.Remove:");
                apply(state, &Operation::delete(*name, host.clone()), &prefix, name)
            }
            ["docker", "volume", "ls", ..] => {
                let snapshot = state.interpreter.model().state();
                let listed: Vec<String> = snapshot
                    .volumes()
                    .filter(|v| {
                        matches!(
                            snapshot.resolve(&v.requested_name, host),
                            Resolution::Owned(ref key) if key == &v.key
                        )
                    })
                    .map(|v| format!("{}@{}\n", v.key.base, v.key.datastore))
                    .collect();
                CommandOutput::ok(listed.concat())
            }
            ["docker", "volume", "inspect", "--format", _, name] => {
                let snapshot = state.interpreter.model().state();
                let Resolution::Owned(key) = snapshot.resolve(name, host) else {
                    return CommandOutput::failed(1, format!("Error: No such volume: {name}"));
                };
                let Some(volume) = snapshot.volume(&key) else {
                    return CommandOutput::failed(1, format!("Error: No such volume: {name}"));
                };
                let refcount = snapshot.refcount(&key);
                let access = snapshot.effective_access(&key).unwrap_or_default();
                let status = if refcount > 0 { "attached" } else { "detached" };
                let json = if volume.shared {
                    let reported = u32::try_from(refcount).unwrap_or(u32::MAX)
                        + state.faults.refcount_skew;
                    serde_json::json!({
                        "Global Refcount": reported.to_string(),
                        "access": access.as_str(),
                    })
                } else {
                    serde_json::json!({
                        "access": access.as_str(),
                        "status": status,
                        "attach-as": "independent_persistent",
                    })
                };
                CommandOutput::ok(format!("{json}\n"))
            }
            ["docker", "run", "-d", "--name", container, "-v", mapping, ..] => {
                let volume = mapping.split_once(':').map_or(*mapping, |(v, _)| v);
                let prefix = "docker: Error response from daemon: VolumeDriver.Mount:";
                apply(
                    state,
                    &Operation::attach(volume, host.clone(), *container),
                    prefix,
                    volume,
                )
            }
            ["docker", "rm", "-f", container] => {
                if state.faults.container_removal_fails {
                    return CommandOutput::failed(1, "Error response from daemon: driver timeout");
                }
                let snapshot = state.interpreter.model().state();
                let attached = snapshot
                    .attachments()
                    .find(|(a, _)| &a.host == host && a.container == *container)
                    .and_then(|(a, _)| snapshot.volume(&a.volume))
                    .map(|v| v.requested_name.clone());
                let Some(volume) = attached else {
                    return CommandOutput::failed(1, format!("Error: No such container: {container}"));
                };
                let op = Operation::detach(volume.clone(), host.clone(), *container);
                apply(state, &op, "Error response from daemon: VolumeDriver.Unmount:", &volume)
            }
            ["docker", "run", "--rm", rest @ ..] => self.run_once(state, host, rest),
            _ => CommandOutput::failed(127, format!("unsupported command: {}", words.join(" "))),
        }
    }

    fn run_once(&self, state: &mut SimState, host: &HostId, words: &[&str]) -> CommandOutput {
        let (container, words) = match words {
            ["--name", container, rest @ ..] => ((*container).to_owned(), rest),
            rest => ("sim-probe".to_owned(), rest),
        };
        let ["-v", mapping, _image, "sh", "-c", script] = words else {
            return CommandOutput::failed(125, "docker: invalid run arguments");
        };
        let volume = mapping.split_once(':').map_or(*mapping, |(v, _)| v);
        let script = shell_words(script);
        let script: Vec<&str> = script.iter().map(String::as_str).collect();
        let file_of = |path: &str| path.rsplit('/').next().unwrap_or(path).to_owned();

        match script.as_slice() {
            ["echo", data, ">", path] => {
                let op = Operation::WriteVolume {
                    name: volume.to_owned(),
                    host: host.clone(),
                    container,
                    file: file_of(*path),
                    data: (*data).to_owned(),
                };
                let owned = matches!(
                    state.interpreter.model().resolve(volume, host),
                    Resolution::Owned(_)
                );
                if owned {
                    match state.interpreter.preview(&op) {
                        Ok(Outcome::Failure(FailureClass::AccessDenied)) => {
                            return CommandOutput::failed(
                                1,
                                format!("sh: can't create {path}: Read-only file system"),
                            );
                        }
                        Ok(_) => {}
                        Err(e) => return CommandOutput::failed(1, format!("docker: {e}")),
                    }
                }
                apply(state, &op, "docker: Error response from daemon: VolumeDriver.Mount:", volume)
            }
            ["cat", path] => {
                let op = Operation::ReadVolume {
                    name: volume.to_owned(),
                    host: host.clone(),
                    container,
                    file: file_of(*path),
                };
                match state.interpreter.interpret(&op) {
                    Ok(i) if i.outcome == Outcome::Success => {
                        CommandOutput::ok(format!("{}\n", i.expected_output.unwrap_or_default()))
                    }
                    Ok(i) => failure_output(&i.outcome, "docker: Error response from daemon:", volume),
                    Err(_) => CommandOutput::failed(1, format!("cat: can't open '{path}': No such file or directory")),
                }
            }
            _ => CommandOutput::failed(127, "sh: unsupported script"),
        }
    }

    fn admin(&self, state: &mut SimState, words: &[&str]) -> CommandOutput {
        let vm_host = |vm: &str| {
            self.environment
                .host_by_vm_name(vm)
                .map(|h| h.id())
                .unwrap_or_else(|| HostId::new(vm))
        };
        match words {
            ["vmgroup", "create", "--name", group, "--default-datastore", ds] => {
                let op = Operation::CreateGroup {
                    group: GroupName::new(*group),
                    default_datastore: DatastoreName::new(*ds),
                };
                apply(state, &op, "Error:", group)
            }
            ["vmgroup", "rm", "--name", group, flags @ ..] => {
                let op = Operation::RemoveGroup {
                    group: GroupName::new(*group),
                    remove_volumes: flags.contains(&"--remove-volumes"),
                };
                apply(state, &op, "Error:", group)
            }
            ["vmgroup", "vm", "add", "--name", group, "--vm-list", vm] => {
                let op = Operation::add_member(GroupName::new(*group), vm_host(*vm));
                apply(state, &op, "Error:", vm)
            }
            ["vmgroup", "vm", "rm", "--name", group, "--vm-list", vm] => {
                let op = Operation::remove_member(GroupName::new(*group), vm_host(*vm));
                apply(state, &op, "Error:", vm)
            }
            ["vmgroup", "vm", "ls", "--name", group] => {
                let snapshot = state.interpreter.model().state();
                let mut table = String::from("Uuid                                  Name\n----  ----\n");
                for (i, host) in snapshot.members(&GroupName::new(*group)).iter().enumerate() {
                    let vm = self
                        .environment
                        .host(host.as_str())
                        .map_or(host.as_str(), |h| h.vm_name.as_str());
                    table.push_str(&format!("564d0000-0000-0000-0000-{i:012}  {vm}\n"));
                }
                CommandOutput::ok(table)
            }
            ["vmgroup", "access", "set", "--name", group, "--datastore", ds, flags @ ..] => {
                let Some(update) = parse_access_flags(flags) else {
                    return CommandOutput::failed(2, "Error: invalid access arguments");
                };
                let op = Operation::set_policy(GroupName::new(*group), DatastoreName::new(*ds), update);
                apply(state, &op, "Error:", group)
            }
            ["vmgroup", "access", "ls", "--name", group] => {
                let snapshot = state.interpreter.model().state();
                let Some(record) = snapshot.group(&GroupName::new(*group)) else {
                    return CommandOutput::failed(1, format!("Error: vmgroup {group} not found"));
                };
                let size = |s: Option<SizeMb>| s.map_or("0B".to_owned(), |s| s.to_string());
                let mut table = String::from(
                    "Datastore  Allow_create  Max_volume_size  Total_size\n---------  ------------  ---------------  ----------\n",
                );
                for (ds, policy) in &record.policies {
                    let allow = if policy.allow_create { "True" } else { "False" };
                    table.push_str(&format!(
                        "{ds}  {allow}  {}  {}\n",
                        size(policy.max_volume_size),
                        size(policy.total_size)
                    ));
                }
                CommandOutput::ok(table)
            }
            ["policy", "create", "--name", name, "--content", content] => {
                let op = Operation::CreateStoragePolicy {
                    name: (*name).to_owned(),
                    content: (*content).to_owned(),
                };
                apply(state, &op, "Error:", name)
            }
            ["policy", "rm", "--name", _] => CommandOutput::ok(""),
            ["volume", "set", volume, group, options] => {
                let volume = volume.trim_start_matches("--volume=");
                let group = group.trim_start_matches("--vmgroup=");
                let Some(Ok(mode)) = options
                    .strip_prefix("--options=access=")
                    .map(str::parse::<AccessMode>)
                else {
                    return CommandOutput::failed(2, "Error: invalid options");
                };
                let op = Operation::SetVolumeAccess {
                    name: volume.to_owned(),
                    group: GroupName::new(group),
                    mode,
                };
                apply(state, &op, "Error:", volume)
            }
            ["volume", "ls"] => {
                let snapshot = state.interpreter.model().state();
                let mut table = String::from(
                    "Volume  Datastore  VMGroup  Capacity  Used\n------  ---------  -------  --------  ----\n",
                );
                for v in snapshot.volumes() {
                    table.push_str(&format!(
                        "{}  {}  {}  {}  0B\n",
                        v.key.base, v.key.datastore, v.key.group, v.size
                    ));
                }
                CommandOutput::ok(table)
            }
            _ => CommandOutput::failed(2, format!("usage error: {}", words.join(" "))),
        }
    }
}

impl RemoteExecutor for SimulatedCluster {
    fn execute(
        &self,
        target: &RemoteTarget,
        command: &CommandLine,
    ) -> impl Future<Output = Result<CommandOutput, BackendError>> + Send {
        let result = self.handle(target, command);
        async move { result }
    }
}

/// Applies `op` to the simulated backend and prints what the CLI would.
fn apply(state: &mut SimState, op: &Operation, prefix: &str, subject: &str) -> CommandOutput {
    match state.interpreter.interpret(op) {
        Ok(i) if i.outcome == Outcome::Success => CommandOutput::ok(format!("{subject}\n")),
        Ok(i) => failure_output(&i.outcome, prefix, subject),
        Err(e) => CommandOutput::failed(1, format!("{prefix} {e}")),
    }
}

fn failure_output(outcome: &Outcome, prefix: &str, subject: &str) -> CommandOutput {
    let reason = match outcome {
        Outcome::Failure(FailureClass::QuotaExceeded) => "Volume size exceeds the group quota",
        Outcome::Failure(FailureClass::AccessDenied) => "Access denied",
        Outcome::Failure(FailureClass::NotVisible) => "No such volume",
        Outcome::Failure(FailureClass::InvalidName) => "Invalid name",
        Outcome::Failure(FailureClass::InvalidOption) => "Invalid option",
        Outcome::Success => "",
    };
    CommandOutput::failed(1, format!("{prefix} {subject}: {reason}"))
}

fn parse_access_flags(flags: &[&str]) -> Option<PolicyUpdate> {
    let size = |s: &str| -> Option<SizeLimit> {
        if s == "0" {
            Some(SizeLimit::Unlimited)
        } else {
            s.parse::<SizeMb>().ok().map(SizeLimit::Limit)
        }
    };
    let mut update = PolicyUpdate::default();
    for pair in flags.chunks(2) {
        let [flag, value] = pair else {
            return None;
        };
        match *flag {
            "--allow-create" => update.allow_create = Some(value.eq_ignore_ascii_case("true")),
            "--access" => update.access = Some(value.parse().ok()?),
            "--volume-maxsize" => update.max_volume_size = Some(size(*value)?),
            "--volume-totalsize" => update.total_size = Some(size(*value)?),
            _ => return None,
        }
    }
    Some(update)
}

/// Splits a POSIX shell line into words, honouring single quotes and
/// backslash escapes (enough for what `shell_quote` produces).
pub fn shell_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                for q in chars.by_ref() {
                    if q == '\'' {
                        break;
                    }
                    current.push(q);
                }
            }
            '\\' => {
                in_word = true;
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}
