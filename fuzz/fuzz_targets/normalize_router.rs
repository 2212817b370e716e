#![no_main]

use std::path::Path;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use codewarden_scan_engine::{ToolKind, normalize_lenient};

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    kind: u8,
    raw: String,
}

fuzz_target!(|input: FuzzInput| {
    let kind = ToolKind::ALL[usize::from(input.kind) % ToolKind::ALL.len()];
    let root = Path::new("/nonexistent/codewarden-fuzz");
    // 어떤 입력이든 패닉 없이 빈 결과로 수렴해야 함
    let _ = normalize_lenient(kind, &input.raw, root);
});
