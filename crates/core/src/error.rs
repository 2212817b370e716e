//! 에러 타입 -- 도메인별 에러 정의

use crate::types::{ScanId, ScanStatus};

/// Codewarden 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum CodewardenError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 스캔 저장소 에러
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// 스캔 실행 에러
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 스캔 저장소 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// 존재하지 않는 스캔 ID
    #[error("scan not found: {0}")]
    ScanNotFound(ScanId),

    /// 허용되지 않는 상태 전이 또는 진행률 감소
    #[error("invalid transition for scan {id}: {from} -> {to} ({reason})")]
    InvalidTransition {
        id: ScanId,
        from: ScanStatus,
        to: ScanStatus,
        reason: String,
    },

    /// 이미 종료된 스캔에 엔티티 추가 시도
    #[error("scan {id} is already {status}")]
    ScanFinalized { id: ScanId, status: ScanStatus },
}

/// 스캔 실행 에러
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// 압축 해제 실패
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// 외부 도구 실행 실패
    #[error("tool execution failed: {0}")]
    ToolExecution(String),

    /// 도구 출력 정규화 실패
    #[error("normalization failed: {0}")]
    Normalization(String),

    /// 도구 실행 시간 초과
    #[error("timed out: {0}")]
    Timeout(String),

    /// 스캔 취소
    #[error("cancelled: {0}")]
    Cancelled(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display_includes_transition() {
        let err = StoreError::InvalidTransition {
            id: 3,
            from: ScanStatus::Completed,
            to: ScanStatus::Scanning,
            reason: "scan already terminal".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("completed -> scanning"));
        assert!(msg.contains("scan 3"));
    }

    #[test]
    fn store_error_converts_to_top_level() {
        let err: CodewardenError = StoreError::ScanNotFound(42).into();
        assert!(matches!(err, CodewardenError::Store(StoreError::ScanNotFound(42))));
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::InvalidValue {
            field: "scanner.tool_timeout_secs".to_owned(),
            reason: "too large".to_owned(),
        };
        assert!(err.to_string().contains("scanner.tool_timeout_secs"));
    }

    #[test]
    fn scan_error_converts_to_top_level() {
        let err: CodewardenError = ScanError::Extraction("bad zip".to_owned()).into();
        assert!(matches!(err, CodewardenError::Scan(ScanError::Extraction(_))));
    }
}
