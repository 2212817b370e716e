#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;
use codewarden_core::FindingType;
use codewarden_scan_engine::normalize::semgrep;

fuzz_target!(|data: &[u8]| {
    if let Ok(raw) = std::str::from_utf8(data) {
        // 존재하지 않는 루트: 스니펫 조회가 파일 시스템 밖으로 나가지 않음
        let root = Path::new("/nonexistent/codewarden-fuzz");
        if let Ok(findings) = semgrep::parse_findings(raw, root) {
            for f in &findings {
                assert_eq!(f.finding_type, FindingType::Sast);
                assert!(!f.title.trim().is_empty(), "title must never be blank");
                assert!(f.code_snippet.is_none());
                if let Some(ref cve) = f.cve {
                    assert!(cve.contains("CVE"));
                }
            }
        }
    }
});
