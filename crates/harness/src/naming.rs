//! 리소스 이름 생성
//!
//! 시나리오마다 짧은 실행 ID를 붙여 병렬 실행이나 이전 실행의 잔여물과
//! 이름이 겹치지 않게 합니다. 생성된 볼륨 이름은 끝자리 숫자 6개 규칙에
//! 걸리지 않습니다.

use uuid::Uuid;

const RUN_ID_LEN: usize = 8;

/// 시나리오 하나가 쓰는 이름 생성기
#[derive(Debug, Clone)]
pub struct ResourceNamer {
    run_id: String,
    counter: u32,
}

impl ResourceNamer {
    /// 무작위 실행 ID로 생성
    pub fn new() -> Self {
        let id = Uuid::new_v4().simple().to_string();
        Self::with_run_id(&id[..RUN_ID_LEN])
    }

    /// 고정 실행 ID로 생성 (테스트용)
    pub fn with_run_id(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_owned(),
            counter: 0,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    fn next(&mut self) -> u32 {
        self.counter += 1;
        self.counter
    }

    fn unique(&mut self, prefix: &str, separator: char) -> String {
        let n = self.next();
        avoid_digit_suffix(format!(
            "{prefix}{separator}{}{separator}{n:04}",
            self.run_id
        ))
    }

    pub fn volume(&mut self, prefix: &str) -> String {
        self.unique(prefix, '-')
    }

    pub fn container(&mut self, prefix: &str) -> String {
        self.unique(prefix, '-')
    }

    /// vmgroup 이름은 밑줄로 구분
    pub fn group(&mut self, prefix: &str) -> String {
        self.unique(prefix, '_')
    }

    /// 정확히 `len`자이고 문자로 끝나는 볼륨 이름
    ///
    /// 카운터(`g`..`z`)를 맨 앞에 두고 16진수 실행 ID를 잇습니다. 두 부분의
    /// 문자 집합이 겹치지 않으므로 `len`이 카운터 길이보다 길면 잘려도
    /// 이름이 겹치지 않습니다.
    pub fn volume_of_len(&mut self, len: usize) -> String {
        let n = self.next();
        let seed = format!("{}{}", alpha_counter(n), self.run_id);
        let mut name: String = seed
            .chars()
            .chain(std::iter::repeat('x'))
            .take(len)
            .collect();
        if name.ends_with(|c: char| c.is_ascii_digit()) {
            name.pop();
            name.push('a');
        }
        name
    }
}

impl Default for ResourceNamer {
    fn default() -> Self {
        Self::new()
    }
}

const COUNTER_DIGITS: u32 = 20;

/// 1 → `g`, 20 → `z`, 21 → `gg` (`g`..`z` 20진 bijective 표기)
fn alpha_counter(mut n: u32) -> String {
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push(char::from(b'g' + (n % COUNTER_DIGITS) as u8));
        n /= COUNTER_DIGITS;
    }
    letters.iter().rev().collect()
}

/// 끝자리 숫자가 정확히 6개이면 문자를 붙입니다.
fn avoid_digit_suffix(mut name: String) -> String {
    let trailing = name.chars().rev().take_while(char::is_ascii_digit).count();
    if trailing == 6 {
        name.push('x');
    }
    name
}
