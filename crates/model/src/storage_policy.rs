//! vSAN 스토리지 정책 내용 검증
//!
//! 정책 내용은 `(("capability" value)("capability" value))` 형태의 S-식입니다.
//! 관리 CLI는 내용과 무관하게 정책을 생성하지만, 잘못된 내용의 정책을
//! `vsan-policy-name` 옵션으로 사용하면 볼륨 생성이 실패합니다.

use serde::{Deserialize, Serialize};

/// 알려진 vSAN capability 이름
pub const KNOWN_CAPABILITIES: &[&str] = &[
    "cacheReservation",
    "checksumDisabled",
    "forceProvisioning",
    "hostFailuresToTolerate",
    "iopsLimit",
    "proportionalCapacity",
    "replicaPreference",
    "stripeWidth",
];

/// 관리 CLI로 생성한 이름 있는 스토리지 정책
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoragePolicy {
    pub name: String,
    pub content: String,
    /// 내용이 유효한 S-식인지 여부 (생성 시점에 계산)
    pub valid: bool,
}

impl StoragePolicy {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let valid = validate_content(&content).is_ok();
        Self {
            name: name.into(),
            content,
            valid,
        }
    }
}

/// 정책 내용을 검증합니다.
///
/// 괄호 균형, 2단계 중첩 제한, 각 규칙의 첫 원소가 알려진 capability 이름인지 확인합니다.
pub fn validate_content(content: &str) -> Result<(), String> {
    let mut depth = 0usize;
    let mut rules = 0usize;
    let mut expect_key = false;
    let mut chars = content.trim().chars();

    while let Some(c) = chars.next() {
        match c {
            '(' => {
                depth += 1;
                if depth > 2 {
                    return Err("rules nest deeper than two levels".to_owned());
                }
                expect_key = depth == 2;
            }
            ')' => {
                if expect_key {
                    return Err("empty rule".to_owned());
                }
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| "unbalanced ')'".to_owned())?;
            }
            '"' => {
                let mut token = String::new();
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == '"' {
                        closed = true;
                        break;
                    }
                    token.push(next);
                }
                if !closed {
                    return Err("unterminated string".to_owned());
                }
                if depth < 2 {
                    return Err(format!("string \"{token}\" outside a rule"));
                }
                if expect_key {
                    if !KNOWN_CAPABILITIES.contains(&token.as_str()) {
                        return Err(format!("unknown capability \"{token}\""));
                    }
                    rules += 1;
                    expect_key = false;
                }
            }
            c if c.is_whitespace() => {}
            other => {
                if depth < 2 {
                    return Err(format!("unexpected '{other}' outside a rule"));
                }
                if expect_key {
                    return Err("rule must start with a quoted capability name".to_owned());
                }
            }
        }
    }

    if depth != 0 {
        return Err("unbalanced '('".to_owned());
    }
    if rules == 0 {
        return Err("policy has no rules".to_owned());
    }
    Ok(())
}
