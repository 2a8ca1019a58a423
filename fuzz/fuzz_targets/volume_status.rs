#![no_main]

use libfuzzer_sys::fuzz_target;
use volprobe_backend::parse::parse_volume_status;

fuzz_target!(|data: &[u8]| {
    // `docker volume inspect` 출력은 임의의 JSON일 수 있다
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = parse_volume_status(text);
    }
});
