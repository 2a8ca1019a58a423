//! Test configuration for E2E tests.
//!
//! Three Docker hosts (`manager1`, `worker1`, `worker2`), one plain datastore
//! and one vSAN datastore. Verifier and transport delays are shrunk to
//! milliseconds so failing probes exhaust their budget quickly.

use std::sync::Arc;

use volprobe_core::config::{
    EnvironmentConfig, HarnessConfig, HostConfig, HostRole, RunnerConfig, VerifierConfig,
};

pub const MANAGER: &str = "manager1";
pub const WORKER1: &str = "worker1";
pub const WORKER2: &str = "worker2";

fn host(alias: &str, vm_name: &str, role: HostRole) -> HostConfig {
    HostConfig {
        alias: alias.to_owned(),
        address: format!("{alias}.lab.local"),
        vm_name: vm_name.to_owned(),
        role,
    }
}

pub fn environment() -> EnvironmentConfig {
    EnvironmentConfig {
        admin_host: "esx01.lab.local".to_owned(),
        hosts: vec![
            host(MANAGER, "VM-manager1", HostRole::Manager),
            host(WORKER1, "VM-worker1", HostRole::Worker),
            host(WORKER2, "VM-worker2", HostRole::Worker),
        ],
        datastores: vec!["datastore1".to_owned(), "vsanDatastore".to_owned()],
        ..EnvironmentConfig::default()
    }
}

pub fn test_config() -> Arc<HarnessConfig> {
    Arc::new(HarnessConfig {
        environment: environment(),
        verifier: VerifierConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 4,
            probe_timeout_secs: 5,
        },
        runner: RunnerConfig {
            command_timeout_secs: 5,
            max_parallel_scenarios: 1,
            transport_retries: 1,
        },
        ..HarnessConfig::default()
    })
}

/// `test_config` with a different parallelism limit
pub fn parallel_config(max_parallel: usize) -> Arc<HarnessConfig> {
    let mut config = (*test_config()).clone();
    config.runner.max_parallel_scenarios = max_parallel;
    Arc::new(config)
}
