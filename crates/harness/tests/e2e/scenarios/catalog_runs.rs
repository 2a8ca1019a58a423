//! Catalog scenarios against a well-behaved simulated cluster.
//!
//! Every scenario must pass, tear down cleanly and leave the cluster as it
//! found it.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use volprobe_backend::DryRunExecutor;
use volprobe_harness::{
    CheckStatus, Remote, ResourceNamer, RunMode, ScenarioContext, ScenarioRunner, ScenarioStatus,
    catalog,
};

use crate::helpers::cluster::Faults;
use crate::helpers::config::{environment, test_config};
use crate::helpers::simulated_runner;

#[tokio::test]
async fn test_e2e_every_catalog_scenario_passes() {
    let env = environment();
    for template in catalog() {
        // Given: a fresh cluster per scenario
        let (cluster, runner) = simulated_runner(Faults::default());
        let mut ctx = ScenarioContext::new(&env, ResourceNamer::with_run_id("e2e00001"));
        let scenario = template.build(&mut ctx).expect("catalog scenario builds");

        // When
        let report = runner.run_with_id(&scenario, "e2e00001").await;

        // Then
        assert_eq!(
            report.status,
            ScenarioStatus::Passed,
            "{}: {:?}",
            template.name,
            report.diagnostic
        );
        assert!(
            report.teardown_failures.is_empty(),
            "{}: {:?}",
            template.name,
            report.teardown_failures
        );
        assert!(cluster.is_clean(), "{} left resources behind", template.name);
        assert!(
            report
                .steps
                .iter()
                .flat_map(|s| &s.checks)
                .all(|c| c.status == CheckStatus::Matched),
            "{}",
            template.name
        );
    }
}

#[tokio::test]
async fn test_e2e_shared_volume_reads_back_written_data() {
    let env = environment();
    let (_cluster, runner) = simulated_runner(Faults::default());
    let mut ctx = ScenarioContext::new(&env, ResourceNamer::with_run_id("e2e00002"));
    let scenario = catalog::find("shared_volume_lifecycle")
        .unwrap()
        .build(&mut ctx)
        .unwrap();

    let report = runner.run_with_id(&scenario, "e2e00002").await;

    assert!(report.passed());
    let reads: Vec<_> = report
        .steps
        .iter()
        .filter(|s| s.operation.starts_with("read"))
        .collect();
    assert_eq!(reads.len(), 2);
    for read in reads {
        assert_eq!(read.output, "1234567890ABCDEFGHIJKLMNOPQRSTUVWXYZ");
    }
}

#[tokio::test]
async fn test_e2e_quota_failures_are_classified() {
    let env = environment();
    let (cluster, runner) = simulated_runner(Faults::default());
    let mut ctx = ScenarioContext::new(&env, ResourceNamer::with_run_id("e2e00003"));
    let scenario = catalog::find("group_quota").unwrap().build(&mut ctx).unwrap();

    let report = runner.run_with_id(&scenario, "e2e00003").await;

    assert!(report.passed(), "{:?}", report.diagnostic);
    let quota_failures = report
        .steps
        .iter()
        .filter(|s| s.observed.as_deref() == Some("failure(quota_exceeded)"))
        .count();
    assert_eq!(quota_failures, 3);
    // the policy is set through the admin CLI with both limits
    assert!(
        cluster
            .commands_on("admin")
            .iter()
            .any(|c| c.contains("--volume-maxsize 1024mb --volume-totalsize 2048mb"))
    );
}

#[tokio::test]
async fn test_e2e_dry_run_passes_without_probing() {
    let config = test_config();
    let executor = Arc::new(DryRunExecutor::new());
    let remote = Remote::new(Arc::clone(&executor), Arc::clone(&config));
    let runner = ScenarioRunner::new(remote, CancellationToken::new()).with_mode(RunMode::DryRun);

    for template in catalog() {
        let mut ctx =
            ScenarioContext::new(&config.environment, ResourceNamer::with_run_id("dry00001"));
        let scenario = template.build(&mut ctx).unwrap();
        let report = runner.run_with_id(&scenario, "dry00001").await;

        assert_eq!(report.status, ScenarioStatus::Passed, "{}", template.name);
        assert!(
            report
                .steps
                .iter()
                .flat_map(|s| &s.checks)
                .all(|c| c.status == CheckStatus::Unprobed)
        );
    }

    // operations are rendered and recorded, listings are never issued
    let commands = executor.commands().await;
    assert!(!commands.is_empty());
    assert!(commands.iter().all(|(_, c)| !c.contains("volume ls")));
}
