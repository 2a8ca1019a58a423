//! Scenarios replayed against stderr text captured from a real vDVS setup.
//!
//! The simulated cluster shares the model's interpreter, so these tests pin
//! the classifier against the backend's own wording instead.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use volprobe_backend::CommandOutput;
use volprobe_core::types::{DatastoreName, GroupName, SizeMb};
use volprobe_harness::{Remote, Scenario, ScenarioRunner, ScenarioStatus, Step};
use volprobe_model::{CreateVolume, FailureClass, Operation, PolicyUpdate};

use crate::helpers::config::{WORKER1, test_config};
use crate::helpers::transcript::TranscriptBackend;

const VOLUME: &str = "quota-tr000001-0001";

/// Cap volumes on datastore1 at 1 GB, then ask for a 2 GB volume.
fn oversized_create() -> Scenario {
    let datastore = DatastoreName::new("datastore1");
    Scenario::new("oversized_create")
        .step(Step::new(Operation::set_policy(
            GroupName::default_group(),
            datastore.clone(),
            PolicyUpdate::default().max_volume_size(SizeMb::gb(1)),
        )))
        .step(
            Step::new(
                CreateVolume::new(VOLUME, WORKER1)
                    .on_datastore(datastore)
                    .size(SizeMb::gb(2)),
            )
            .expect_failure(FailureClass::QuotaExceeded),
        )
}

fn runner(backend: &Arc<TranscriptBackend>) -> ScenarioRunner<TranscriptBackend> {
    ScenarioRunner::new(
        Remote::new(Arc::clone(backend), test_config()),
        CancellationToken::new(),
    )
}

fn create_rejected(reason: &str) -> CommandOutput {
    CommandOutput::failed(
        1,
        format!("Error response from daemon: create {VOLUME}@datastore1: VolumeDriver.Create: {reason}"),
    )
}

#[tokio::test]
async fn test_e2e_transcript_quota_rejection_passes() {
    // Given: the backend rejects the create with its quota message
    let backend = Arc::new(TranscriptBackend::new().reply(
        WORKER1,
        "docker volume create",
        create_rejected("Volume size exceeds the max volume size limit"),
    ));

    // When
    let report = runner(&backend).run_with_id(&oversized_create(), "tr000001").await;

    // Then
    assert_eq!(report.status, ScenarioStatus::Passed, "{:?}", report.diagnostic);
    assert_eq!(
        report.steps[1].observed.as_deref(),
        Some("failure(quota_exceeded)")
    );
    assert!(report.teardown_failures.is_empty());
    assert_eq!(backend.commands_on(WORKER1).len(), 1);
}

#[tokio::test]
async fn test_e2e_transcript_privilege_rejection_on_quota_named_volume_fails() {
    // Given: the volume name contains "quota" but the backend refuses for
    // a different reason
    let backend = Arc::new(TranscriptBackend::new().reply(
        WORKER1,
        "docker volume create",
        create_rejected("No create privilege"),
    ));

    // When
    let report = runner(&backend).run_with_id(&oversized_create(), "tr000001").await;

    // Then: the rejection is classified by its reason, not by the name
    assert_eq!(report.status, ScenarioStatus::Failed);
    let diagnostic = report.diagnostic.as_ref().unwrap();
    assert_eq!(diagnostic.step, Some(2));
    assert!(
        diagnostic
            .message
            .contains("expected failure(quota_exceeded), observed failure(access_denied)"),
        "{}",
        diagnostic.message
    );
}
