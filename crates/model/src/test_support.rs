//! 단위 테스트 공용 픽스처

use volprobe_core::types::{DatastoreName, HostId};

use crate::state::ModelEnvironment;

/// 호스트 3대(manager1, worker1, worker2)와 데이터스토어 3개를 가진 환경
pub(crate) fn env() -> ModelEnvironment {
    ModelEnvironment {
        hosts: ["manager1", "worker1", "worker2"]
            .into_iter()
            .map(HostId::new)
            .collect(),
        datastores: ["_VM_DS", "datastore1", "vsanDatastore"]
            .into_iter()
            .map(DatastoreName::new)
            .collect(),
        vm_datastore: DatastoreName::vm_datastore(),
    }
}
