//! Teardown against the simulated cluster.

use volprobe_core::types::{DatastoreName, GroupName};
use volprobe_harness::{Scenario, ScenarioStatus, Step};
use volprobe_model::{CreateVolume, Operation, PolicyUpdate};

use crate::helpers::cluster::Faults;
use crate::helpers::config::{MANAGER, WORKER1, WORKER2};
use crate::helpers::simulated_runner;

#[tokio::test]
async fn test_e2e_teardown_removes_everything_a_passing_scenario_left() {
    // Given: a scenario that never cleans up after itself
    let (cluster, runner) = simulated_runner(Faults::default());
    let group = GroupName::new("vg_td000001_0001");
    let scenario = Scenario::new("leaky")
        .step(Step::new(CreateVolume::new("td-v1", WORKER1)).expect_success())
        .step(Step::new(Operation::attach("td-v1", WORKER1, "td-c1")))
        .step(Step::new(CreateVolume::new("td-shared", WORKER2).shared()))
        .step(Step::new(Operation::attach("td-shared", MANAGER, "td-c2")))
        .step(Step::new(Operation::attach("td-shared", WORKER2, "td-c2")))
        .step(Step::new(Operation::CreateGroup {
            group: group.clone(),
            default_datastore: DatastoreName::new("datastore1"),
        }))
        .step(Step::new(Operation::add_member(group.clone(), WORKER1)))
        .step(Step::new(Operation::set_policy(
            GroupName::default_group(),
            DatastoreName::new("datastore1"),
            PolicyUpdate::default().allow_create(false),
        )));

    // When
    let report = runner.run_with_id(&scenario, "td000001").await;

    // Then
    assert_eq!(report.status, ScenarioStatus::Passed, "{:?}", report.diagnostic);
    assert!(report.teardown_failures.is_empty(), "{:?}", report.teardown_failures);
    assert!(cluster.is_clean());

    // containers go before the volumes they hold
    let worker1 = cluster.commands_on(WORKER1);
    let rm_container = worker1.iter().position(|c| c == "docker rm -f td-c1").unwrap();
    let rm_volume = worker1
        .iter()
        .position(|c| c == "docker volume rm td-v1")
        .unwrap();
    assert!(rm_container < rm_volume);

    // the default group policy is restored to full access
    assert!(cluster.commands_on("admin").iter().any(|c| {
        c.contains("vmgroup access set --name _DEFAULT --datastore datastore1 --allow-create True")
    }));
}

#[tokio::test]
async fn test_e2e_teardown_failures_are_reported_not_fatal() {
    let (cluster, runner) = simulated_runner(Faults {
        container_removal_fails: true,
        ..Faults::default()
    });
    let scenario = Scenario::new("stuck")
        .step(Step::new(CreateVolume::new("td-v2", WORKER1)).expect_success())
        .step(Step::new(Operation::attach("td-v2", WORKER1, "td-c3")));

    let report = runner.run_with_id(&scenario, "td000002").await;

    // the scenario itself passed, only the cleanup is incomplete
    assert_eq!(report.status, ScenarioStatus::Passed);
    assert!(report.teardown_incomplete());
    // container removal fails, then the volume delete fails on the open attachment
    assert_eq!(report.teardown_failures.len(), 2, "{:?}", report.teardown_failures);
    assert!(report.teardown_failures[0].action.contains("td-c3"));
    assert!(!cluster.is_clean());
}
