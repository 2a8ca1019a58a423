//! 볼륨 이름 규칙
//!
//! 요청 이름은 `base[@datastore]` 형식입니다. `base`가 `{그룹, 데이터스토어}`
//! 범위 안에서 볼륨을 식별하고, 데이터스토어 부분은 생성 위치만 정합니다.

use std::fmt;

use serde::{Deserialize, Serialize};
use volprobe_core::types::DatastoreName;

/// 허용하는 base 이름 최대 길이 (유니코드 스칼라 값 기준)
pub const MAX_BASE_NAME_CHARS: usize = 100;

/// 끝의 ASCII 숫자 연속 길이가 정확히 이 값이면 거부
pub const REJECTED_DIGIT_SUFFIX_LEN: usize = 6;

/// 이름 검증 실패 사유
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("volume name has an empty base")]
    EmptyBase,

    #[error("volume name is {len} characters long (max {MAX_BASE_NAME_CHARS})")]
    TooLong { len: usize },

    #[error("volume name ends in exactly {REJECTED_DIGIT_SUFFIX_LEN} digits")]
    DigitSuffix,

    #[error("volume name has '@' but no datastore")]
    EmptyDatastore,
}

/// 파싱된 볼륨 이름
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VolumeName {
    base: String,
    datastore: Option<DatastoreName>,
}

impl VolumeName {
    /// 요청 이름을 파싱하고 검증합니다.
    ///
    /// `a@@@@ds`와 `a@ds@x`는 모두 `ds`로 갑니다. 빈 조각은 건너뛰고 base
    /// 다음의 첫 번째 비어 있지 않은 조각만 씁니다.
    pub fn parse(raw: &str) -> Result<Self, NameError> {
        let mut segments = raw.split('@');
        let base = segments.next().unwrap_or_default();
        if base.is_empty() {
            return Err(NameError::EmptyBase);
        }

        let len = base.chars().count();
        if len > MAX_BASE_NAME_CHARS {
            return Err(NameError::TooLong { len });
        }

        if trailing_digit_run(base) == REJECTED_DIGIT_SUFFIX_LEN {
            return Err(NameError::DigitSuffix);
        }

        let datastore = if raw.contains('@') {
            let ds = segments
                .find(|s| !s.is_empty())
                .ok_or(NameError::EmptyDatastore)?;
            Some(DatastoreName::new(ds))
        } else {
            None
        };

        Ok(Self {
            base: base.to_owned(),
            datastore,
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// `@`로 명시한 데이터스토어
    pub fn datastore(&self) -> Option<&DatastoreName> {
        self.datastore.as_ref()
    }

    /// base 이름의 문자 수
    pub fn base_len(&self) -> usize {
        self.base.chars().count()
    }
}

impl fmt::Display for VolumeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.datastore {
            Some(ds) => write!(f, "{}@{}", self.base, ds),
            None => f.write_str(&self.base),
        }
    }
}

fn trailing_digit_run(base: &str) -> usize {
    base.chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .count()
}
