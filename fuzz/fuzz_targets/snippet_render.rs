#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use codewarden_scan_engine::normalize::render_snippet;

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    text: String,
    start_line: u32,
    end_line: Option<u32>,
}

fuzz_target!(|input: FuzzInput| {
    let total = input.text.lines().count() as u64;
    match render_snippet(&input.text, input.start_line, input.end_line) {
        Some(snippet) => {
            assert!(input.start_line >= 1);
            assert!(u64::from(input.start_line) <= total);
            let lines: Vec<&str> = snippet.split('\n').collect();
            assert!(!lines.is_empty());
            // 시작 줄은 항상 표시
            assert!(lines.iter().any(|l| l.starts_with('>')));
        }
        None => {
            assert!(input.start_line == 0 || u64::from(input.start_line) > total);
        }
    }
});
