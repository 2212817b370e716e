//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 크레이트는 이 상수를 사용하여 `metrics::counter!()`, `metrics::histogram!()`
//! 매크로를 호출합니다. 레코더가 설치되지 않은 프로세스에서는 아무 동작도 하지 않습니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `codewarden_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(codewarden_core::metrics::SCANS_STARTED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 도구 레이블 키 (sbom, vulnerability, static_analysis, secret)
pub const LABEL_TOOL: &str = "tool";

/// 결과 레이블 키 (success, failure, timeout)
pub const LABEL_RESULT: &str = "result";

/// 발견 유형 레이블 키 (sca, sast)
pub const LABEL_FINDING_TYPE: &str = "type";

// ─── 스캔 수명 주기 메트릭 ──────────────────────────────────────────

/// 시작된 스캔 수 (counter)
pub const SCANS_STARTED_TOTAL: &str = "codewarden_scans_started_total";

/// 완료된 스캔 수 (counter)
pub const SCANS_COMPLETED_TOTAL: &str = "codewarden_scans_completed_total";

/// 실패한 스캔 수 (counter)
pub const SCANS_FAILED_TOTAL: &str = "codewarden_scans_failed_total";

/// 스캔 소요 시간 (histogram, 초)
pub const SCAN_DURATION_SECONDS: &str = "codewarden_scan_duration_seconds";

// ─── 도구 및 정규화 메트릭 ──────────────────────────────────────────

/// 도구 실행 수 (counter, labels: tool, result)
pub const TOOL_EXECUTIONS_TOTAL: &str = "codewarden_tool_executions_total";

/// 정규화 실패로 버려진 도구 출력 수 (counter, label: tool)
pub const NORMALIZATION_ERRORS_TOTAL: &str = "codewarden_normalization_errors_total";

/// 저장된 취약점 수 (counter, label: type)
pub const FINDINGS_TOTAL: &str = "codewarden_findings_total";

/// 저장된 SBOM 컴포넌트 수 (counter)
pub const SBOM_COMPONENTS_TOTAL: &str = "codewarden_sbom_components_total";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 스캔 소요 시간 히스토그램 버킷 (초)
///
/// 1s ~ 30m 범위 (외부 도구 실행 시간이 지배적)
pub const SCAN_DURATION_BUCKETS: [f64; 9] = [
    1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0,
];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!(SCANS_STARTED_TOTAL, "Total number of scans started");
    describe_counter!(
        SCANS_COMPLETED_TOTAL,
        "Total number of scans that reached the completed state"
    );
    describe_counter!(
        SCANS_FAILED_TOTAL,
        "Total number of scans that reached the failed state"
    );
    describe_histogram!(
        SCAN_DURATION_SECONDS,
        "Wall-clock duration of a scan from extraction to terminal state"
    );
    describe_counter!(
        TOOL_EXECUTIONS_TOTAL,
        "External tool executions by tool and result"
    );
    describe_counter!(
        NORMALIZATION_ERRORS_TOTAL,
        "Tool outputs discarded because they could not be parsed"
    );
    describe_counter!(FINDINGS_TOTAL, "Vulnerability records stored, by type");
    describe_counter!(SBOM_COMPONENTS_TOTAL, "SBOM component records stored");
}
