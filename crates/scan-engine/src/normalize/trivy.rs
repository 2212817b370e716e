//! trivy JSON 리포트 정규화
//!
//! trivy는 SBOM, 취약점, 시크릿 스캔 모두 같은 리포트 형식을 사용합니다.
//!
//! ```json
//! {
//!   "Results": [
//!     {
//!       "Target": "package-lock.json",
//!       "Type": "npm",
//!       "Packages": [{ "Name": "left-pad", "Version": "1.0.0", "Licenses": ["MIT"] }],
//!       "Vulnerabilities": [{ "VulnerabilityID": "CVE-2021-1234", "Severity": "HIGH" }],
//!       "Secrets": [{ "RuleID": "aws-access-key-id", "StartLine": 3, "Match": "AKIA****" }]
//!     }
//!   ]
//! }
//! ```
//!
//! 모든 목록 필드는 없거나 `null`이어도 빈 목록으로 처리합니다.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer};

use codewarden_core::types::{
    ComponentType, FindingType, NewSbomComponent, NewVulnerability, Severity,
};

use super::ecosystem::canonical_ecosystem;
use crate::error::ScanEngineError;

/// 하드코딩된 자격 증명 CWE
pub const HARDCODED_CREDENTIALS_CWE: &str = "CWE-798";

/// 값이 없는 패키지 필드의 대체 문자열
const UNKNOWN: &str = "unknown";

/// CVSS 점수를 우선 조회하는 공급자 순서
const CVSS_SOURCES: [&str; 2] = ["nvd", "redhat"];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Report {
    #[serde(default, deserialize_with = "null_as_default")]
    results: Vec<ReportResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ReportResult {
    #[serde(default)]
    target: Option<String>,
    #[serde(default, rename = "Type")]
    result_type: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    packages: Vec<Package>,
    #[serde(default, deserialize_with = "null_as_default")]
    vulnerabilities: Vec<DetectedVulnerability>,
    #[serde(default, deserialize_with = "null_as_default")]
    secrets: Vec<Secret>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Package {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    pkg_name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    licenses: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DetectedVulnerability {
    #[serde(default, rename = "VulnerabilityID")]
    vulnerability_id: Option<String>,
    #[serde(default)]
    pkg_name: Option<String>,
    #[serde(default)]
    installed_version: Option<String>,
    #[serde(default)]
    fixed_version: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "CweIDs", deserialize_with = "null_as_default")]
    cwe_ids: Vec<String>,
    #[serde(default, rename = "CVSS", deserialize_with = "null_as_default")]
    cvss: HashMap<String, Cvss>,
}

#[derive(Debug, Deserialize)]
struct Cvss {
    #[serde(default, rename = "V3Score")]
    v3_score: Option<serde_json::Number>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Secret {
    #[serde(default, rename = "RuleID")]
    rule_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    start_line: Option<u32>,
    #[serde(default)]
    end_line: Option<u32>,
    #[serde(default, rename = "Match")]
    matched: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn parse_report(raw: &str, tool: &str) -> Result<Report, ScanEngineError> {
    serde_json::from_str(raw).map_err(|e| ScanEngineError::Normalization {
        tool: tool.to_owned(),
        reason: e.to_string(),
    })
}

/// 빈 문자열은 값이 없는 것으로 취급합니다.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// `--list-all-pkgs` 리포트를 SBOM 컴포넌트로 변환합니다.
///
/// 위험도는 항상 `low`, 타입은 항상 `direct`입니다.
pub fn parse_sbom(raw: &str) -> Result<Vec<NewSbomComponent>, ScanEngineError> {
    let report = parse_report(raw, "sbom")?;

    let mut components = Vec::new();
    for result in report.results {
        let ecosystem = non_empty(result.result_type).map(|t| canonical_ecosystem(&t));
        for package in result.packages {
            let name = non_empty(package.name)
                .or_else(|| non_empty(package.pkg_name))
                .unwrap_or_else(|| UNKNOWN.to_owned());
            let licenses: Vec<String> = package
                .licenses
                .into_iter()
                .filter(|l| !l.trim().is_empty())
                .collect();

            components.push(NewSbomComponent {
                name,
                version: non_empty(package.version).unwrap_or_else(|| UNKNOWN.to_owned()),
                license: (!licenses.is_empty()).then(|| licenses.join(", ")),
                component_type: ComponentType::Direct,
                ecosystem: ecosystem.clone(),
                risk_level: Severity::Low,
            });
        }
    }
    Ok(components)
}

/// 취약점 리포트를 `sca` 발견 항목으로 변환합니다.
pub fn parse_vulnerabilities(raw: &str) -> Result<Vec<NewVulnerability>, ScanEngineError> {
    let report = parse_report(raw, "vulnerability")?;

    let mut findings = Vec::new();
    for result in report.results {
        let target = non_empty(result.target);
        for vuln in result.vulnerabilities {
            let severity = vuln
                .severity
                .as_deref()
                .and_then(Severity::from_str_loose)
                .unwrap_or(Severity::Low);
            let vulnerability_id = non_empty(vuln.vulnerability_id);
            let title = non_empty(vuln.title)
                .or_else(|| vulnerability_id.clone())
                .unwrap_or_else(|| "Unknown Vulnerability".to_owned());
            let cwe_ids: Vec<String> = vuln
                .cwe_ids
                .into_iter()
                .filter(|c| !c.trim().is_empty())
                .collect();

            findings.push(NewVulnerability {
                description: non_empty(vuln.description),
                component: non_empty(vuln.pkg_name),
                version: non_empty(vuln.installed_version),
                cve: vulnerability_id,
                cvss_score: cvss_score(&vuln.cvss),
                file_path: target.clone(),
                cwe: (!cwe_ids.is_empty()).then(|| cwe_ids.join(", ")),
                fix_available: non_empty(vuln.fixed_version).is_some(),
                ..NewVulnerability::new(FindingType::Sca, severity, title)
            });
        }
    }
    Ok(findings)
}

/// 시크릿 리포트를 `sast` 발견 항목으로 변환합니다.
///
/// 심각도는 항상 `high`, CWE는 항상 [`HARDCODED_CREDENTIALS_CWE`]입니다.
pub fn parse_secrets(raw: &str) -> Result<Vec<NewVulnerability>, ScanEngineError> {
    let report = parse_report(raw, "secret")?;

    let mut findings = Vec::new();
    for result in report.results {
        let target = non_empty(result.target);
        for secret in result.secrets {
            let title = match (non_empty(secret.rule_id), non_empty(secret.title)) {
                (Some(rule), Some(title)) => format!("{rule}: {title}"),
                (Some(only), None) | (None, Some(only)) => only,
                (None, None) => "Secret".to_owned(),
            };
            let description = match non_empty(secret.matched) {
                Some(matched) => format!("Secret detected: {matched}"),
                None => "Secret detected".to_owned(),
            };

            findings.push(NewVulnerability {
                description: Some(description),
                file_path: target.clone(),
                line_number: secret.start_line,
                end_line_number: secret.end_line,
                cwe: Some(HARDCODED_CREDENTIALS_CWE.to_owned()),
                fix_available: false,
                ..NewVulnerability::new(FindingType::Sast, Severity::High, title)
            });
        }
    }
    Ok(findings)
}

fn cvss_score(cvss: &HashMap<String, Cvss>) -> Option<String> {
    CVSS_SOURCES.iter().find_map(|source| {
        cvss.get(*source)
            .and_then(|entry| entry.v3_score.as_ref())
            .map(ToString::to_string)
    })
}
