//! 볼륨 생성 옵션 파싱 (`-o key=value`)
//!
//! 옵션 값 자체의 형식만 검사합니다. `clone-from` 대상의 가시성,
//! `vsan-policy-name`의 존재 여부, `fstype=xfs`의 이름 길이 제한처럼
//! 모델 상태가 필요한 검사는 해석기에서 수행합니다.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use volprobe_core::types::{AccessMode, DEFAULT_VOLUME_SIZE_MB, SizeMb};

/// xfs 파일시스템 볼륨 이름의 최대 길이
pub const XFS_MAX_NAME_CHARS: usize = 12;

pub const OPT_SIZE: &str = "size";
pub const OPT_DISK_FORMAT: &str = "diskformat";
pub const OPT_ATTACH_AS: &str = "attach-as";
pub const OPT_FSTYPE: &str = "fstype";
pub const OPT_ACCESS: &str = "access";
pub const OPT_CLONE_FROM: &str = "clone-from";
pub const OPT_VSAN_POLICY: &str = "vsan-policy-name";

/// 옵션 검증 실패 사유
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptionError {
    #[error("unknown volume option '{0}'")]
    UnknownKey(String),

    #[error("invalid value '{value}' for option '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// 디스크 프로비저닝 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskFormat {
    Thin,
    ZeroedThick,
    EagerZeroedThick,
}

impl FromStr for DiskFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "thin" => Ok(Self::Thin),
            "zeroedthick" => Ok(Self::ZeroedThick),
            "eagerzeroedthick" => Ok(Self::EagerZeroedThick),
            _ => Err("expected thin, zeroedthick or eagerzeroedthick".to_owned()),
        }
    }
}

/// 디스크 연결 모드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachAs {
    Persistent,
    IndependentPersistent,
}

impl FromStr for AttachAs {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "persistent" => Ok(Self::Persistent),
            "independent_persistent" => Ok(Self::IndependentPersistent),
            _ => Err("expected persistent or independent_persistent".to_owned()),
        }
    }
}

/// 파일시스템 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FsType {
    Ext4,
    Xfs,
}

impl FromStr for FsType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ext4" => Ok(Self::Ext4),
            "xfs" => Ok(Self::Xfs),
            _ => Err("expected ext4 or xfs".to_owned()),
        }
    }
}

/// 파싱된 볼륨 생성 옵션
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeOptions {
    pub size: Option<SizeMb>,
    pub disk_format: Option<DiskFormat>,
    pub attach_as: Option<AttachAs>,
    pub fstype: Option<FsType>,
    pub access: Option<AccessMode>,
    pub clone_from: Option<String>,
    pub vsan_policy: Option<String>,
}

impl VolumeOptions {
    /// `-o key=value` 맵을 파싱합니다. 첫 번째 위반 항목에서 멈춥니다.
    pub fn parse(raw: &BTreeMap<String, String>) -> Result<Self, OptionError> {
        let mut opts = Self::default();
        for (key, value) in raw {
            match key.as_str() {
                OPT_SIZE => opts.size = Some(parse_value(key, value)?),
                OPT_DISK_FORMAT => opts.disk_format = Some(parse_value(key, value)?),
                OPT_ATTACH_AS => opts.attach_as = Some(parse_value(key, value)?),
                OPT_FSTYPE => opts.fstype = Some(parse_value(key, value)?),
                OPT_ACCESS => opts.access = Some(parse_value(key, value)?),
                OPT_CLONE_FROM => opts.clone_from = Some(non_empty(key, value)?),
                OPT_VSAN_POLICY => opts.vsan_policy = Some(non_empty(key, value)?),
                other => return Err(OptionError::UnknownKey(other.to_owned())),
            }
        }
        Ok(opts)
    }

    /// 요청 크기, 없으면 기본 100MB
    pub fn size_or_default(&self) -> SizeMb {
        self.size.unwrap_or(SizeMb::mb(DEFAULT_VOLUME_SIZE_MB))
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, OptionError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.parse().map_err(|e: T::Err| OptionError::InvalidValue {
        key: key.to_owned(),
        value: value.to_owned(),
        reason: e.to_string(),
    })
}

fn non_empty(key: &str, value: &str) -> Result<String, OptionError> {
    if value.is_empty() {
        return Err(OptionError::InvalidValue {
            key: key.to_owned(),
            value: String::new(),
            reason: "must not be empty".to_owned(),
        });
    }
    Ok(value.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn parses_valid_options() {
        let parsed = VolumeOptions::parse(&opts(&[
            ("size", "10gb"),
            ("diskformat", "eagerzeroedthick"),
            ("attach-as", "independent_persistent"),
            ("fstype", "ext4"),
            ("access", "read-only"),
        ]))
        .unwrap();
        assert_eq!(parsed.size, Some(SizeMb::gb(10)));
        assert_eq!(parsed.disk_format, Some(DiskFormat::EagerZeroedThick));
        assert_eq!(parsed.attach_as, Some(AttachAs::IndependentPersistent));
        assert_eq!(parsed.fstype, Some(FsType::Ext4));
        assert_eq!(parsed.access, Some(AccessMode::ReadOnly));
    }

    #[test]
    fn empty_options_default_to_100mb() {
        let parsed = VolumeOptions::parse(&BTreeMap::new()).unwrap();
        assert_eq!(parsed.size_or_default(), SizeMb::mb(100));
    }

    #[test]
    fn rejects_invalid_values() {
        let cases = [
            ("diskformat", "zeroedthickk"),
            ("diskformat", "zeroedthick,thin"),
            ("size", "100mbb"),
            ("size", "100gbEE"),
            ("fstype", "xfs_ext"),
            ("access", "read-write-both"),
            ("access", "write-only"),
            ("clone-from", ""),
        ];
        for (key, value) in cases {
            let err = VolumeOptions::parse(&opts(&[(key, value)])).unwrap_err();
            assert!(
                matches!(err, OptionError::InvalidValue { .. }),
                "{key}={value} should be invalid"
            );
        }
    }

    #[test]
    fn rejects_unknown_key() {
        let err = VolumeOptions::parse(&opts(&[("sizes", "100mb")])).unwrap_err();
        assert_eq!(err, OptionError::UnknownKey("sizes".to_owned()));
    }
}
