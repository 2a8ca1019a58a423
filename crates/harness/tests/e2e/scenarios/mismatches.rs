//! Backend behaviour that disagrees with the model, and scenarios the model rejects.
//!
//! A misbehaving cluster must turn into a failed (or infrastructure) report
//! with a diagnostic naming the step, and teardown must still run.

use std::collections::BTreeSet;

use tokio_util::sync::CancellationToken;
use volprobe_harness::{
    CheckStatus, Remote, ResourceNamer, Scenario, ScenarioContext, ScenarioRunner, ScenarioStatus,
    Step, catalog,
};
use volprobe_model::{CreateVolume, FailureClass, Operation};

use crate::helpers::cluster::{Faults, SimulatedCluster};
use crate::helpers::config::{WORKER1, environment, test_config};
use crate::helpers::simulated_runner;

fn build(name: &str, run_id: &str) -> Scenario {
    let env = environment();
    let mut ctx = ScenarioContext::new(&env, ResourceNamer::with_run_id(run_id));
    catalog::find(name).unwrap().build(&mut ctx).unwrap()
}

#[tokio::test]
async fn test_e2e_foreign_delete_leak_fails_scenario() {
    // Given: a backend that lets any host delete any volume
    let (cluster, runner) = simulated_runner(Faults {
        foreign_delete_allowed: true,
        ..Faults::default()
    });
    let scenario = build("access_across_groups", "leak0001");

    // When
    let report = runner.run_with_id(&scenario, "leak0001").await;

    // Then: step 5 (delete from the isolated host) is the first divergence
    assert_eq!(report.status, ScenarioStatus::Failed);
    let diagnostic = report.diagnostic.as_ref().unwrap();
    assert_eq!(diagnostic.step, Some(5));
    assert!(
        diagnostic
            .message
            .contains("expected failure(access_denied), observed success"),
        "{}",
        diagnostic.message
    );
    assert!(diagnostic.message.contains("history:"));
    assert_eq!(report.steps.len(), 5);

    // teardown still reverted the membership and removed the group
    assert!(report.teardown_failures.is_empty(), "{:?}", report.teardown_failures);
    assert!(cluster.is_clean());
}

#[tokio::test]
async fn test_e2e_refcount_skew_exhausts_verifier() {
    let (cluster, runner) = simulated_runner(Faults {
        refcount_skew: 1,
        ..Faults::default()
    });
    let scenario = build("shared_volume_lifecycle", "skew0001");

    let report = runner.run_with_id(&scenario, "skew0001").await;

    assert_eq!(report.status, ScenarioStatus::Failed);
    assert_eq!(report.diagnostic.as_ref().unwrap().step, Some(2));
    let check = report.steps[1].checks.last().unwrap();
    assert_eq!(check.status, CheckStatus::Mismatched);
    assert_eq!(check.expected, "1");
    let error = check.error.as_deref().unwrap();
    assert!(error.contains("observed 2 after 3 attempts"), "{error}");

    // three probe attempts on worker1 (max_attempts = 3)
    let inspects = cluster
        .commands_on(WORKER1)
        .iter()
        .filter(|c| c.starts_with("docker volume inspect"))
        .count();
    assert_eq!(inspects, 3);

    // the attached container and the volume are cleaned up
    assert!(report.teardown_failures.is_empty());
    assert!(cluster.is_clean());
}

#[tokio::test]
async fn test_e2e_unreachable_host_is_infrastructure_failure() {
    let (cluster, runner) = simulated_runner(Faults {
        unreachable: BTreeSet::from([WORKER1.to_owned()]),
        ..Faults::default()
    });
    let scenario = build("shared_volume_lifecycle", "down0001");

    let report = runner.run_with_id(&scenario, "down0001").await;

    assert_eq!(report.status, ScenarioStatus::InfrastructureFailure);
    assert_eq!(report.diagnostic.as_ref().unwrap().step, Some(1));
    // one attempt plus transport_retries = 1
    assert_eq!(cluster.commands_on(WORKER1).len(), 2);
    assert!(cluster.is_clean());
}

#[tokio::test]
async fn test_e2e_conflicting_expectation_is_harness_bug() {
    let (cluster, runner) = simulated_runner(Faults::default());
    // a 101-character name can never be created
    let long = "v".repeat(101);
    let scenario = Scenario::new("conflict")
        .step(Step::new(CreateVolume::new(long, WORKER1)).expect_success());

    let report = runner.run_with_id(&scenario, "bug00001").await;

    assert_eq!(report.status, ScenarioStatus::HarnessBug);
    let message = &report.diagnostic.as_ref().unwrap().message;
    assert!(message.contains("declared success"), "{message}");
    assert!(message.contains("failure(invalid_name)"), "{message}");
    assert!(cluster.log().is_empty(), "nothing may reach the backend");
}

#[tokio::test]
async fn test_e2e_impossible_operation_is_harness_bug() {
    let (cluster, runner) = simulated_runner(Faults::default());
    // deleting a volume that was never created is not a meaningful test
    let scenario = Scenario::new("impossible").step(Step::new(Operation::delete("ghost", WORKER1)));

    let report = runner.run_with_id(&scenario, "bug00002").await;

    assert_eq!(report.status, ScenarioStatus::HarnessBug);
    assert!(cluster.log().is_empty());
}

#[tokio::test]
async fn test_e2e_cancelled_run_aborts_before_first_step() {
    let config = test_config();
    let cluster = std::sync::Arc::new(SimulatedCluster::new(config.environment.clone()));
    let cancel = CancellationToken::new();
    let runner = ScenarioRunner::new(Remote::new(std::sync::Arc::clone(&cluster), config), cancel.clone());
    cancel.cancel();

    let scenario = Scenario::new("cancelled").step(
        Step::new(CreateVolume::new("v1", WORKER1)).expect_success(),
    );
    let report = runner.run_with_id(&scenario, "stop0001").await;

    assert_eq!(report.status, ScenarioStatus::Aborted);
    assert_eq!(report.diagnostic.as_ref().unwrap().step, Some(1));
    assert!(cluster.log().is_empty());
}

#[tokio::test]
async fn test_e2e_explicit_failure_class_matches_backend() {
    // six trailing digits are rejected by both the model and the backend
    let (cluster, runner) = simulated_runner(Faults::default());
    let scenario = Scenario::new("explicit").step(
        Step::new(CreateVolume::new("Volume-000000", WORKER1))
            .expect_failure(FailureClass::InvalidName),
    );

    let report = runner.run_with_id(&scenario, "cls00001").await;

    assert_eq!(report.status, ScenarioStatus::Passed);
    assert_eq!(
        report.steps[0].observed.as_deref(),
        Some("failure(invalid_name)")
    );
    assert_eq!(cluster.commands_on(WORKER1).len(), 1);
}
