#![no_main]

use libfuzzer_sys::fuzz_target;
use codewarden_core::FindingType;
use codewarden_scan_engine::normalize::trivy;

fuzz_target!(|data: &[u8]| {
    if let Ok(raw) = std::str::from_utf8(data) {
        // 세 리포트 모두 같은 스키마를 공유하므로 같은 입력으로 검사
        if let Ok(components) = trivy::parse_sbom(raw) {
            for c in &components {
                assert!(!c.name.is_empty(), "component name must never be empty");
                assert!(!c.version.is_empty(), "component version must never be empty");
            }
        }
        if let Ok(vulns) = trivy::parse_vulnerabilities(raw) {
            for v in &vulns {
                assert_eq!(v.finding_type, FindingType::Sca);
                assert!(!v.title.is_empty());
            }
        }
        if let Ok(secrets) = trivy::parse_secrets(raw) {
            for s in &secrets {
                assert_eq!(s.finding_type, FindingType::Sast);
                assert_eq!(s.cwe.as_deref(), Some(trivy::HARDCODED_CREDENTIALS_CWE));
            }
        }
    }
});
