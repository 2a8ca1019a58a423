//! Shared E2E test helpers.
//!
//! Provides the simulated cluster executor, a transcript replay executor, a
//! three-host test configuration and shortcuts for building scenario runners on top of them.

pub mod cluster;
pub mod config;
pub mod transcript;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use volprobe_harness::{Remote, ScenarioRunner};

use self::cluster::{Faults, SimulatedCluster};

/// Runner backed by a fresh simulated cluster with the given faults.
#[allow(dead_code)]
pub fn simulated_runner(faults: Faults) -> (Arc<SimulatedCluster>, ScenarioRunner<SimulatedCluster>) {
    let config = config::test_config();
    let cluster = Arc::new(SimulatedCluster::with_faults(config.environment.clone(), faults));
    let remote = Remote::new(Arc::clone(&cluster), config);
    (cluster, ScenarioRunner::new(remote, CancellationToken::new()))
}
