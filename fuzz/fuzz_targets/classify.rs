#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use volprobe_backend::{CommandOutput, InvocationKind, ObservedOutcome, classify};

#[derive(Debug, Arbitrary)]
struct Input {
    stdout: String,
    stderr: String,
    exit_code: i32,
    create: bool,
}

fuzz_target!(|input: Input| {
    let kind = if input.create {
        InvocationKind::Create
    } else {
        InvocationKind::Generic
    };
    let output = CommandOutput {
        stdout: input.stdout,
        stderr: input.stderr,
        exit_code: input.exit_code,
    };

    // 종료 코드 0은 항상 성공으로 분류된다
    let observed = classify(&output, kind);
    if output.exit_code == 0 {
        assert_eq!(observed, ObservedOutcome::Success);
    }
});
