//! semgrep JSON 리포트 정규화
//!
//! ```json
//! {
//!   "results": [{
//!     "check_id": "javascript.express.security.audit.xss",
//!     "path": "src/app.js",
//!     "start": { "line": 50, "col": 5 },
//!     "end": { "line": 52, "col": 7 },
//!     "extra": {
//!       "message": "User input flows into a raw HTML response",
//!       "severity": "ERROR",
//!       "metadata": { "cwe": ["CWE-79: Cross-site Scripting"], "references": [] }
//!     }
//!   }],
//!   "errors": []
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Deserializer};
use tracing::warn;

use codewarden_core::types::{FindingType, NewVulnerability, Severity};

use super::snippet::{extract_snippet, relative_to_root};
use crate::error::ScanEngineError;

#[derive(Debug, Deserialize)]
struct Report {
    #[serde(default, deserialize_with = "null_as_default")]
    results: Vec<Finding>,
    #[serde(default, deserialize_with = "null_as_default")]
    errors: Vec<ReportError>,
}

/// 규칙 로딩 실패, 파싱 실패 등 semgrep이 `errors`에 남기는 항목
#[derive(Debug, Deserialize)]
struct ReportError {
    #[serde(default)]
    level: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Finding {
    #[serde(default)]
    check_id: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    start: Option<Position>,
    #[serde(default)]
    end: Option<Position>,
    #[serde(default, deserialize_with = "null_as_default")]
    extra: Extra,
}

#[derive(Debug, Deserialize)]
struct Position {
    #[serde(default)]
    line: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct Extra {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    metadata: Metadata,
}

#[derive(Debug, Default, Deserialize)]
struct Metadata {
    #[serde(default)]
    cwe: Option<OneOrMany>,
    #[serde(default, deserialize_with = "null_as_default")]
    references: Vec<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    shortlink: Option<String>,
}

/// semgrep 규칙마다 `cwe`가 문자열이거나 목록입니다.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn joined(self) -> Option<String> {
        let values: Vec<String> = match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        };
        let values: Vec<String> = values
            .into_iter()
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
            .collect();
        (!values.is_empty()).then(|| values.join(", "))
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// semgrep 심각도를 세 단계로 축약합니다.
///
/// `ERROR → high`, `WARNING → medium`, `INFO → low`, 그 외와 값 없음은 `medium`
pub fn map_severity(raw: Option<&str>) -> Severity {
    match raw.map(|s| s.trim().to_ascii_uppercase()).as_deref() {
        Some("ERROR") => Severity::High,
        Some("WARNING") => Severity::Medium,
        Some("INFO") => Severity::Low,
        _ => Severity::Medium,
    }
}

/// 참조 목록에서 CVE 식별자를 찾습니다.
///
/// `"CVE"`를 포함하는 첫 항목을 사용하고, 그 안에 `CVE-YYYY-NNNN` 형식의
/// 토큰이 있으면 토큰만 돌려줍니다.
pub fn find_cve(references: &[String]) -> Option<String> {
    let entry = references.iter().find(|r| r.contains("CVE"))?;
    Some(cve_token(entry).unwrap_or_else(|| entry.clone()))
}

fn cve_token(text: &str) -> Option<String> {
    text.match_indices("CVE-").find_map(|(idx, _)| {
        let rest = &text[idx + 4..];
        let year: String = rest.chars().take_while(char::is_ascii_digit).collect();
        if year.len() != 4 || rest[4..].chars().next() != Some('-') {
            return None;
        }
        let number: String = rest[5..].chars().take_while(char::is_ascii_digit).collect();
        (number.len() >= 4).then(|| format!("CVE-{year}-{number}"))
    })
}

/// semgrep 리포트를 `sast` 발견 항목으로 변환합니다.
///
/// 시작 줄이 있는 항목은 `root` 아래의 소스에서 스니펫을 추출합니다.
/// `errors` 항목은 발견 항목이 아니므로 경고 로그로만 남깁니다.
pub fn parse_findings(raw: &str, root: &Path) -> Result<Vec<NewVulnerability>, ScanEngineError> {
    let report: Report = serde_json::from_str(raw).map_err(|e| ScanEngineError::Normalization {
        tool: "static_analysis".to_owned(),
        reason: e.to_string(),
    })?;

    for error in &report.errors {
        warn!(
            tool = "static_analysis",
            level = error.level.as_deref().unwrap_or("unknown"),
            path = error.path.as_deref(),
            message = error.message.as_deref().unwrap_or("").trim(),
            "semgrep reported an error"
        );
    }

    let findings = report
        .results
        .into_iter()
        .map(|finding| convert(finding, root))
        .collect();
    Ok(findings)
}

fn convert(finding: Finding, root: &Path) -> NewVulnerability {
    let Finding {
        check_id,
        path,
        start,
        end,
        extra,
    } = finding;
    let Extra {
        message,
        severity,
        metadata,
    } = extra;

    let message = message.filter(|m| !m.trim().is_empty());
    let title = message
        .clone()
        .or_else(|| check_id.filter(|c| !c.trim().is_empty()))
        .unwrap_or_else(|| "Static analysis finding".to_owned());

    let reference = metadata
        .source
        .filter(|s| !s.trim().is_empty())
        .or(metadata.shortlink.filter(|s| !s.trim().is_empty()));
    let description = match (message, reference) {
        (Some(message), Some(link)) => Some(format!("{message}\n\nReference: {link}")),
        (Some(message), None) => Some(message),
        (None, Some(link)) => Some(format!("Reference: {link}")),
        (None, None) => None,
    };

    let start_line = start.and_then(|p| p.line);
    let end_line = end.and_then(|p| p.line);
    let code_snippet = match (start_line, path.as_deref()) {
        (Some(line), Some(path)) => extract_snippet(root, path, line, end_line),
        _ => None,
    };

    NewVulnerability {
        description,
        cve: find_cve(&metadata.references),
        file_path: path.map(|p| relative_to_root(root, &p)),
        line_number: start_line,
        end_line_number: end_line,
        cwe: metadata.cwe.and_then(OneOrMany::joined),
        fix_available: false,
        code_snippet,
        ..NewVulnerability::new(FindingType::Sast, map_severity(severity.as_deref()), title)
    }
}
