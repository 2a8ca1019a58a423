#![no_main]

use std::collections::BTreeMap;

use libfuzzer_sys::fuzz_target;
use volprobe_model::VolumeOptions;

fuzz_target!(|pairs: Vec<(String, String)>| {
    let raw: BTreeMap<String, String> = pairs.into_iter().collect();

    // 크래시나 패닉 없이 Ok 또는 Err을 반환해야 한다
    let _ = VolumeOptions::parse(&raw);
});
