//! 관측 대상과 기대값 계산
//!
//! 검증기는 [`ProbeSpec`]마다 실제 시스템을 조회하고, 같은 스펙으로
//! [`ExpectedStateSnapshot::expected`]가 계산한 값과 비교합니다.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use volprobe_core::types::{AccessMode, DatastoreName, GroupName, HostId};

use crate::error::ModelError;
use crate::state::{ExpectedStateSnapshot, Resolution, VolumeKey};

/// 실제 시스템에서 조회할 수 있는 속성
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Observable {
    /// 볼륨 목록에 나타나는지
    Availability { volume: String },
    /// 공유 볼륨의 전역 참조 수
    RefCount { volume: String },
    /// 볼륨 자체의 접근 모드 (`docker volume inspect`의 `access`)
    ///
    /// 그룹/데이터스토어 정책의 접근 모드는 반영하지 않습니다. 정책 때문에
    /// 쓰기가 막힌 볼륨도 자체 속성이 `read-write`이면 그대로 보고됩니다.
    AccessMode { volume: String },
    /// 볼륨 연결 상태
    AttachStatus { volume: String },
    /// 그룹 멤버 호스트
    Membership { group: GroupName },
    /// 그룹이 데이터스토어에 볼륨을 만들 수 있는지
    CreateAllowed {
        group: GroupName,
        datastore: DatastoreName,
    },
    /// 볼륨 안 파일 내용
    FileContent { volume: String, file: String },
}

impl Observable {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Availability { .. } => "availability",
            Self::RefCount { .. } => "refcount",
            Self::AccessMode { .. } => "access_mode",
            Self::AttachStatus { .. } => "attach_status",
            Self::Membership { .. } => "membership",
            Self::CreateAllowed { .. } => "create_allowed",
            Self::FileContent { .. } => "file_content",
        }
    }
}

impl fmt::Display for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Availability { volume }
            | Self::RefCount { volume }
            | Self::AccessMode { volume }
            | Self::AttachStatus { volume } => write!(f, "{}({volume})", self.kind()),
            Self::Membership { group } => write!(f, "membership({group})"),
            Self::CreateAllowed { group, datastore } => {
                write!(f, "create_allowed({group}, {datastore})")
            }
            Self::FileContent { volume, file } => write!(f, "file_content({volume}:{file})"),
        }
    }
}

/// 조회 관점
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeView {
    /// Docker 호스트에서 조회 (호스트 그룹 기준 가시성)
    Host(HostId),
    /// 관리 CLI로 조회
    Admin,
}

impl fmt::Display for ProbeView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host(host) => host.fmt(f),
            Self::Admin => f.write_str("admin"),
        }
    }
}

/// 관측 대상과 조회 관점
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSpec {
    pub observable: Observable,
    pub view: ProbeView,
}

impl ProbeSpec {
    pub fn on_host(observable: Observable, host: impl Into<HostId>) -> Self {
        Self {
            observable,
            view: ProbeView::Host(host.into()),
        }
    }

    pub fn admin(observable: Observable) -> Self {
        Self {
            observable,
            view: ProbeView::Admin,
        }
    }
}

impl fmt::Display for ProbeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.observable, self.view)
    }
}

/// 연결 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachState {
    Attached,
    Detached,
}

impl fmt::Display for AttachState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attached => f.write_str("attached"),
            Self::Detached => f.write_str("detached"),
        }
    }
}

/// 관측값. 실제 조회 결과와 기대값이 같은 타입을 씁니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ObservableValue {
    Flag(bool),
    Count(u32),
    Access(AccessMode),
    Attach(AttachState),
    Members(BTreeSet<String>),
    Text(String),
}

/// 모델이 계산한 기대값
pub type ExpectedValue = ObservableValue;

impl fmt::Display for ObservableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(flag) => flag.fmt(f),
            Self::Count(count) => count.fmt(f),
            Self::Access(mode) => mode.fmt(f),
            Self::Attach(state) => state.fmt(f),
            Self::Members(members) => {
                let joined: Vec<&str> = members.iter().map(String::as_str).collect();
                write!(f, "[{}]", joined.join(", "))
            }
            Self::Text(text) => write!(f, "{text:?}"),
        }
    }
}

impl ExpectedStateSnapshot {
    /// 조회 스펙에 대한 기대값을 계산합니다.
    ///
    /// 모델이 값을 결정할 수 없는 조합(예: 기본 그룹 멤버 목록, 비공유 볼륨 refcount)은
    /// [`ModelError::Unobservable`]을 반환합니다.
    pub fn expected(&self, spec: &ProbeSpec) -> Result<ExpectedValue, ModelError> {
        let fail = |reason: &str| ModelError::unobservable(spec, reason);

        match (&spec.observable, &spec.view) {
            (Observable::Availability { volume }, ProbeView::Host(host)) => Ok(
                ObservableValue::Flag(matches!(self.resolve(volume, host), Resolution::Owned(_))),
            ),
            (Observable::Availability { volume }, ProbeView::Admin) => {
                Ok(ObservableValue::Flag(self.find_any(volume).is_some()))
            }
            (Observable::RefCount { volume }, ProbeView::Host(host)) => {
                let key = self.owned(volume, host).ok_or_else(|| fail("volume is not visible"))?;
                if !self.volume(&key).is_some_and(|v| v.shared) {
                    return Err(fail("refcount is only reported for shared volumes"));
                }
                let count = u32::try_from(self.refcount(&key))
                    .map_err(|_| fail("refcount does not fit in u32"))?;
                Ok(ObservableValue::Count(count))
            }
            (Observable::AccessMode { volume }, ProbeView::Host(host)) => {
                let key = self.owned(volume, host).ok_or_else(|| fail("volume is not visible"))?;
                self.volume(&key)
                    .map(|v| ObservableValue::Access(v.access))
                    .ok_or_else(|| fail("volume is not visible"))
            }
            (Observable::AttachStatus { volume }, ProbeView::Host(host)) => {
                let key = self.owned(volume, host).ok_or_else(|| fail("volume is not visible"))?;
                let state = if self.refcount(&key) > 0 {
                    AttachState::Attached
                } else {
                    AttachState::Detached
                };
                Ok(ObservableValue::Attach(state))
            }
            (Observable::Membership { group }, ProbeView::Admin) => {
                if group.is_default() {
                    return Err(fail("default group membership is implicit"));
                }
                if self.group(group).is_none() {
                    return Err(fail("group does not exist"));
                }
                Ok(ObservableValue::Members(
                    self.members(group)
                        .into_iter()
                        .map(|h| h.as_str().to_owned())
                        .collect(),
                ))
            }
            (Observable::CreateAllowed { group, datastore }, ProbeView::Admin) => {
                if self.group(group).is_none() {
                    return Err(fail("group does not exist"));
                }
                Ok(ObservableValue::Flag(
                    self.effective_policy(group, datastore)
                        .is_some_and(|p| p.allow_create),
                ))
            }
            (Observable::FileContent { volume, file }, ProbeView::Host(host)) => {
                let key = self.owned(volume, host).ok_or_else(|| fail("volume is not visible"))?;
                self.volume(&key)
                    .and_then(|v| v.files.get(file))
                    .map(|content| ObservableValue::Text(content.clone()))
                    .ok_or_else(|| fail("file was never written"))
            }
            _ => Err(fail("not observable from this view")),
        }
    }

    fn owned(&self, volume: &str, host: &HostId) -> Option<VolumeKey> {
        match self.resolve(volume, host) {
            Resolution::Owned(key) => Some(key),
            Resolution::Foreign(_) | Resolution::Missing => None,
        }
    }
}
