//! 도구 출력 정규화
//!
//! 각 정규화기는 도구의 원시 JSON 텍스트를 공통 엔티티(`NewVulnerability`,
//! `NewSbomComponent`)로 변환하는 순수 함수입니다. 저장소에는 접근하지 않습니다.
//!
//! | 도구 역할 | 정규화기 | 결과 |
//! |---|---|---|
//! | `Sbom` | [`trivy::parse_sbom`] | SBOM 컴포넌트 |
//! | `Vulnerability` | [`trivy::parse_vulnerabilities`] | `sca` 발견 항목 |
//! | `StaticAnalysis` | [`semgrep::parse_findings`] | `sast` 발견 항목 (+ 스니펫) |
//! | `Secret` | [`trivy::parse_secrets`] | `sast` 발견 항목 |
//!
//! 빈 출력은 결과 없음이고, 파싱할 수 없는 출력은 `ScanEngineError::Normalization`입니다.
//! 스캔 단계는 [`normalize_lenient`]로 이 에러를 로그로 남기고 빈 결과로 대체합니다.

pub mod ecosystem;
pub mod semgrep;
pub mod snippet;
pub mod trivy;

use std::path::Path;

use metrics::counter;
use tracing::warn;

use codewarden_core::metrics as m;
use codewarden_core::types::{NewSbomComponent, NewVulnerability};

use crate::error::ScanEngineError;
use crate::tool::ToolKind;

pub use ecosystem::canonical_ecosystem;
pub use snippet::{extract_snippet, render_snippet};

/// 정규화 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// SBOM 컴포넌트
    Components(Vec<NewSbomComponent>),
    /// 취약점 발견 항목
    Findings(Vec<NewVulnerability>),
}

impl Normalized {
    /// 역할에 맞는 빈 결과
    pub fn empty(kind: ToolKind) -> Self {
        match kind {
            ToolKind::Sbom => Self::Components(Vec::new()),
            _ => Self::Findings(Vec::new()),
        }
    }

    /// 엔티티 수
    pub fn len(&self) -> usize {
        match self {
            Self::Components(c) => c.len(),
            Self::Findings(f) => f.len(),
        }
    }

    /// 엔티티가 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 도구 역할에 맞는 정규화기로 원시 출력을 변환합니다.
///
/// `root`는 압축 해제 루트로, 정적 분석 결과의 경로 보정과 스니펫 추출에 쓰입니다.
///
/// # Errors
///
/// 출력이 기대한 JSON 형태가 아니면 `ScanEngineError::Normalization`
pub fn normalize(kind: ToolKind, raw: &str, root: &Path) -> Result<Normalized, ScanEngineError> {
    if raw.trim().is_empty() {
        return Ok(Normalized::empty(kind));
    }

    match kind {
        ToolKind::Sbom => trivy::parse_sbom(raw).map(Normalized::Components),
        ToolKind::Vulnerability => trivy::parse_vulnerabilities(raw).map(Normalized::Findings),
        ToolKind::StaticAnalysis => semgrep::parse_findings(raw, root).map(Normalized::Findings),
        ToolKind::Secret => trivy::parse_secrets(raw).map(Normalized::Findings),
    }
}

/// [`normalize`]와 같지만 파싱 실패를 빈 결과로 대체합니다.
///
/// 실패는 `warn!` 로그와 `codewarden_normalization_errors_total` 카운터로 남깁니다.
pub fn normalize_lenient(kind: ToolKind, raw: &str, root: &Path) -> Normalized {
    match normalize(kind, raw, root) {
        Ok(normalized) => normalized,
        Err(e) => {
            counter!(m::NORMALIZATION_ERRORS_TOTAL, m::LABEL_TOOL => kind.as_str()).increment(1);
            warn!(
                tool = %kind,
                error = %e,
                output_bytes = raw.len(),
                "discarding unparseable tool output"
            );
            Normalized::empty(kind)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_output_yields_nothing_for_every_tool() {
        let root = Path::new("/nonexistent");
        for kind in ToolKind::ALL {
            for raw in ["", "   \n\t"] {
                let normalized = normalize(kind, raw, root).unwrap();
                assert!(normalized.is_empty(), "{kind}");
                assert_eq!(normalized, Normalized::empty(kind));
            }
        }
    }

    #[test]
    fn non_json_output_is_error_but_lenient_is_empty() {
        let root = Path::new("/nonexistent");
        for kind in ToolKind::ALL {
            let raw = "FATAL: database download failed";
            assert!(normalize(kind, raw, root).is_err(), "{kind}");
            assert!(normalize_lenient(kind, raw, root).is_empty(), "{kind}");
        }
    }

    #[test]
    fn dispatches_by_kind() {
        let root = Path::new("/nonexistent");
        let sbom = r#"{"Results":[{"Type":"npm","Packages":[{"Name":"left-pad","Version":"1.0.0"}]}]}"#;
        match normalize(ToolKind::Sbom, sbom, root).unwrap() {
            Normalized::Components(c) => assert_eq!(c[0].name, "left-pad"),
            other => panic!("unexpected: {other:?}"),
        }

        let semgrep = r#"{"results":[{"check_id":"rule","extra":{"message":"m"}}]}"#;
        match normalize(ToolKind::StaticAnalysis, semgrep, root).unwrap() {
            Normalized::Findings(f) => assert_eq!(f[0].title, "m"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn empty_for_sbom_is_components() {
        assert!(matches!(
            Normalized::empty(ToolKind::Sbom),
            Normalized::Components(_)
        ));
        assert!(matches!(
            Normalized::empty(ToolKind::Secret),
            Normalized::Findings(_)
        ));
    }
}
