//! volprobe 공통 크레이트
//!
//! 다중 호스트 볼륨 플러그인 e2e 검증 하네스의 모든 크레이트가 공유하는
//! 식별자 타입, 에러 분류 체계, 설정, 메트릭 이름을 제공합니다.

pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, ModelFault, TransportError, VerificationError, VolprobeError};

// 설정
pub use config::{HarnessConfig, HostConfig, HostRole};

// 도메인 타입
pub use types::{AccessMode, DatastoreName, GroupName, HostId, SizeMb};
