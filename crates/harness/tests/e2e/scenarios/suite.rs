//! Parallel suite runs.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use volprobe_harness::{Remote, ScenarioRunner, ScenarioStatus, run_suite, select};

use crate::helpers::cluster::SimulatedCluster;
use crate::helpers::config::{parallel_config, test_config};

#[tokio::test]
async fn test_e2e_independent_scenarios_run_in_parallel() {
    // Given: scenarios that touch neither memberships nor default policies
    let config = parallel_config(3);
    let cluster = Arc::new(SimulatedCluster::new(config.environment.clone()));
    let runner = Arc::new(ScenarioRunner::new(
        Remote::new(Arc::clone(&cluster), config),
        CancellationToken::new(),
    ));
    let names: Vec<String> = [
        "volume_name_limits",
        "invalid_volume_options",
        "valid_volume_names",
        "shared_volume_lifecycle",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect();
    let templates = select(&names).unwrap();

    // When
    let report = run_suite(runner, &templates).await;

    // Then: catalog order is kept, every scenario used its own run id
    let reported: Vec<&str> = report.scenarios.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(reported, names);
    assert!(report.all_passed(), "{:?}", report.worst_status());
    let mut run_ids: Vec<&str> = report.scenarios.iter().map(|s| s.run_id.as_str()).collect();
    run_ids.sort_unstable();
    run_ids.dedup();
    assert_eq!(run_ids.len(), names.len());
    assert!(cluster.is_clean());
}

#[tokio::test]
async fn test_e2e_scenarios_needing_more_hosts_are_skipped() {
    let mut config = (*test_config()).clone();
    config.environment.hosts.truncate(1);
    let config = Arc::new(config);
    let cluster = Arc::new(SimulatedCluster::new(config.environment.clone()));
    let runner = Arc::new(ScenarioRunner::new(
        Remote::new(Arc::clone(&cluster), config),
        CancellationToken::new(),
    ));
    let templates =
        select(&["access_across_groups".to_owned(), "volume_name_limits".to_owned()]).unwrap();

    let report = run_suite(runner, &templates).await;

    assert_eq!(report.scenarios[0].status, ScenarioStatus::Skipped);
    assert_eq!(report.scenarios[1].status, ScenarioStatus::Passed);
    assert_eq!(report.count(ScenarioStatus::Skipped), 1);
    // skipped scenarios never reach the cluster
    assert!(
        cluster
            .log()
            .iter()
            .all(|(_, c)| !c.contains("vmgroup"))
    );
}
