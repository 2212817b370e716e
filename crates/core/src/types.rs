//! 도메인 타입 -- 스캔, 취약점, SBOM 컴포넌트
//!
//! 모든 크레이트가 공유하는 데이터 구조를 정의합니다.
//! 직렬화 형식은 외부 API와 동일하게 camelCase 필드명을 사용합니다.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 스캔 식별자 (저장소가 1부터 순차 할당)
pub type ScanId = u64;

/// 생성 직후 진행률
pub const PROGRESS_CREATED: u8 = 0;

/// 완료 시 진행률
pub const PROGRESS_COMPLETE: u8 = 100;

/// 심각도 레벨
///
/// `Ord` 구현으로 심각도 비교가 가능합니다 (`Low < Medium < High < Critical`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// 낮은 심각도
    #[default]
    Low,
    /// 중간 심각도
    Medium,
    /// 높은 심각도
    High,
    /// 치명적
    Critical,
}

impl Severity {
    /// 문자열에서 심각도를 파싱합니다.
    ///
    /// 대소문자를 구분하지 않습니다. 네 단계 밖의 값은 `None`입니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "moderate" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    /// 직렬화 형식과 동일한 소문자 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 취약점 발견 유형
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingType {
    /// 의존성 취약점 (Software Composition Analysis)
    #[default]
    Sca,
    /// 소스 코드 정적 분석 결과
    Sast,
}

impl FindingType {
    /// 직렬화 형식과 동일한 소문자 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sca => "sca",
            Self::Sast => "sast",
        }
    }
}

impl fmt::Display for FindingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 스캔 상태
///
/// `uploading → scanning → completed | failed` 순서로만 전이합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// 레코드 생성 직후
    Uploading,
    /// 압축 해제 및 도구 실행 중
    Scanning,
    /// 정상 완료
    Completed,
    /// 실패
    Failed,
}

impl ScanStatus {
    /// 종료 상태 여부
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// `self`에서 `next`로의 전이가 허용되는지 확인합니다.
    ///
    /// `scanning → scanning`은 진행률 갱신을 위해 허용됩니다.
    pub fn can_transition_to(&self, next: ScanStatus) -> bool {
        matches!(
            (self, next),
            (Self::Uploading, Self::Scanning)
                | (Self::Scanning, Self::Scanning)
                | (Self::Scanning, Self::Completed)
                | (Self::Uploading, Self::Failed)
                | (Self::Scanning, Self::Failed)
        )
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uploading => f.write_str("uploading"),
            Self::Scanning => f.write_str("scanning"),
            Self::Completed => f.write_str("completed"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// 의존성 관계 유형
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentType {
    /// 직접 의존성
    #[default]
    Direct,
    /// 전이 의존성
    Transitive,
}

/// 업로드 한 건에 대한 스캔 레코드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scan {
    /// 스캔 ID
    pub id: ScanId,
    /// 업로드된 원본 파일명
    pub filename: String,
    /// 현재 상태
    pub status: ScanStatus,
    /// 진행률 (0-100)
    pub progress: u8,
    /// 생성 시각
    pub created_at: DateTime<Utc>,
    /// 완료 시각 (`completed` 상태에서만 설정)
    pub completed_at: Option<DateTime<Utc>>,
}

impl fmt::Display for Scan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scan #{} {} [{} {}%]",
            self.id, self.filename, self.status, self.progress
        )
    }
}

/// 정규화기가 만들어 내는 취약점 (저장 전)
///
/// ID와 스캔 ID는 저장소가 부여합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVulnerability {
    #[serde(rename = "type")]
    pub finding_type: FindingType,
    pub severity: Severity,
    pub title: String,
    pub description: Option<String>,
    pub component: Option<String>,
    pub version: Option<String>,
    pub cve: Option<String>,
    /// 소스마다 정밀도가 달라 문자열로 보관
    pub cvss_score: Option<String>,
    pub file_path: Option<String>,
    pub line_number: Option<u32>,
    pub end_line_number: Option<u32>,
    pub cwe: Option<String>,
    pub fix_available: bool,
    pub code_snippet: Option<String>,
}

impl NewVulnerability {
    /// 유형, 심각도, 제목만 채운 취약점을 만듭니다.
    pub fn new(finding_type: FindingType, severity: Severity, title: impl Into<String>) -> Self {
        Self {
            finding_type,
            severity,
            title: title.into(),
            ..Self::default()
        }
    }
}

/// 저장된 취약점 레코드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vulnerability {
    pub id: u64,
    pub scan_id: ScanId,
    #[serde(rename = "type")]
    pub finding_type: FindingType,
    pub severity: Severity,
    pub title: String,
    pub description: Option<String>,
    pub component: Option<String>,
    pub version: Option<String>,
    pub cve: Option<String>,
    pub cvss_score: Option<String>,
    pub file_path: Option<String>,
    pub line_number: Option<u32>,
    pub end_line_number: Option<u32>,
    pub cwe: Option<String>,
    pub fix_available: bool,
    pub code_snippet: Option<String>,
}

impl Vulnerability {
    /// 저장소가 부여한 ID로 레코드를 완성합니다.
    pub fn from_new(id: u64, scan_id: ScanId, new: NewVulnerability) -> Self {
        Self {
            id,
            scan_id,
            finding_type: new.finding_type,
            severity: new.severity,
            title: new.title,
            description: new.description,
            component: new.component,
            version: new.version,
            cve: new.cve,
            cvss_score: new.cvss_score,
            file_path: new.file_path,
            line_number: new.line_number,
            end_line_number: new.end_line_number,
            cwe: new.cwe,
            fix_available: new.fix_available,
            code_snippet: new.code_snippet,
        }
    }
}

impl fmt::Display for Vulnerability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.severity, self.title, self.finding_type)
    }
}

/// 정규화기가 만들어 내는 SBOM 컴포넌트 (저장 전)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSbomComponent {
    pub name: String,
    pub version: String,
    /// 여러 라이선스는 `", "`로 연결
    pub license: Option<String>,
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    /// 정규화된 레지스트리 이름 (npm, pypi, ...)
    pub ecosystem: Option<String>,
    pub risk_level: Severity,
}

/// 저장된 SBOM 컴포넌트 레코드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SbomComponent {
    pub id: u64,
    pub scan_id: ScanId,
    pub name: String,
    pub version: String,
    pub license: Option<String>,
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    pub ecosystem: Option<String>,
    pub risk_level: Severity,
}

impl SbomComponent {
    /// 저장소가 부여한 ID로 레코드를 완성합니다.
    pub fn from_new(id: u64, scan_id: ScanId, new: NewSbomComponent) -> Self {
        Self {
            id,
            scan_id,
            name: new.name,
            version: new.version,
            license: new.license,
            component_type: new.component_type,
            ecosystem: new.ecosystem,
            risk_level: new.risk_level,
        }
    }
}

impl fmt::Display for SbomComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// 심각도별 취약점 수와 컴포넌트 수
///
/// 저장하지 않고 결과 조회 때마다 새로 계산합니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub dependencies: usize,
}

impl ScanSummary {
    /// 취약점과 컴포넌트 목록에서 요약을 계산합니다.
    pub fn compute(vulnerabilities: &[Vulnerability], components: &[SbomComponent]) -> Self {
        let mut summary = Self {
            dependencies: components.len(),
            ..Self::default()
        };
        for vuln in vulnerabilities {
            match vuln.severity {
                Severity::Critical => summary.critical += 1,
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
                Severity::Low => summary.low += 1,
            }
        }
        summary
    }

    /// 전체 취약점 수
    pub fn total_vulnerabilities(&self) -> usize {
        self.critical + self.high + self.medium + self.low
    }
}

/// 스캔 레코드, 요약, 엔티티 목록을 묶은 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResults {
    pub scan: Scan,
    pub summary: ScanSummary,
    pub vulnerabilities: Vec<Vulnerability>,
    pub sbom_components: Vec<SbomComponent>,
}

impl ScanResults {
    /// 주어진 심각도 이상인 취약점이 있는지 확인합니다.
    pub fn has_findings_at_or_above(&self, threshold: Severity) -> bool {
        self.vulnerabilities.iter().any(|v| v.severity >= threshold)
    }
}

/// 상태 폴링 응답
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStatusView {
    pub id: ScanId,
    pub status: ScanStatus,
    pub progress: u8,
    pub filename: String,
}

impl From<&Scan> for ScanStatusView {
    fn from(scan: &Scan) -> Self {
        Self {
            id: scan.id,
            status: scan.status,
            progress: scan.progress,
            filename: scan.filename.clone(),
        }
    }
}

/// 내보내기 보고서 -- 결과에 생성 시각을 덧붙인 형태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    #[serde(flatten)]
    pub results: ScanResults,
    pub generated_at: DateTime<Utc>,
}

impl ScanReport {
    pub fn new(results: ScanResults, generated_at: DateTime<Utc>) -> Self {
        Self {
            results,
            generated_at,
        }
    }
}
