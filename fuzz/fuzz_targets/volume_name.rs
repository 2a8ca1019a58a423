#![no_main]

use libfuzzer_sys::fuzz_target;
use volprobe_model::name::{MAX_BASE_NAME_CHARS, VolumeName};

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };

    // 허용된 이름은 길이 제한을 지키고 '@'를 base에 포함하지 않아야 한다
    if let Ok(name) = VolumeName::parse(raw) {
        assert!(name.base_len() <= MAX_BASE_NAME_CHARS);
        assert!(!name.base().contains('@'));
        assert!(!name.base().is_empty());
    }
});
