//! 스캔 엔진 에러 타입
//!
//! [`ScanEngineError`]는 스캔 엔진 내에서 발생할 수 있는 모든 에러를 나타냅니다.
//! `From<ScanEngineError> for CodewardenError` 구현을 통해 `?` 연산자로
//! 상위 에러 타입으로 전파됩니다.
//!
//! # 에러 카테고리
//!
//! - **압축 해제**: `Extraction` (스캔 실패로 이어짐)
//! - **도구 실행**: `ToolExecution`, `ToolTimeout` (스캔 실패로 이어짐)
//! - **정규화**: `Normalization` (해당 단계만 결과 없음으로 처리)
//! - **저장소**: `Store`
//! - **설정**: `Config`
//! - **파일 I/O**: `Io`
//! - **취소 및 태스크**: `Cancelled`, `Task`

use codewarden_core::error::{CodewardenError, ConfigError, ScanError, StoreError};

/// 스캔 엔진 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ScanEngineError {
    /// 아카이브가 손상되었거나 제한을 넘음
    #[error("extraction error: {path}: {reason}")]
    Extraction {
        /// 아카이브 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 도구를 실행할 수 없거나 허용되지 않은 종료 코드로 끝남
    ///
    /// 실행 파일이 없을 때도 이 변형을 사용하며, 이때 `exit_code`는 `None`입니다.
    #[error("tool execution error: {tool} (exit code: {}): {stderr}", display_exit_code(.exit_code))]
    ToolExecution {
        /// 도구 이름
        tool: String,
        /// 종료 코드 (시그널 종료 또는 실행 실패 시 `None`)
        exit_code: Option<i32>,
        /// 캡처한 표준 에러 출력
        stderr: String,
    },

    /// 도구 실행 시간 초과
    #[error("tool timed out: {tool} after {timeout_secs}s")]
    ToolTimeout {
        /// 도구 이름
        tool: String,
        /// 제한 시간 (초)
        timeout_secs: u64,
    },

    /// 도구 출력 정규화 실패
    #[error("normalization error: {tool}: {reason}")]
    Normalization {
        /// 도구 이름
        tool: String,
        /// 실패 사유
        reason: String,
    },

    /// 저장소 에러
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 파일 I/O 에러
    #[error("io error: {path}: {source}")]
    Io {
        /// 관련 파일 경로
        path: String,
        /// 원본 I/O 에러
        source: std::io::Error,
    },

    /// 스캔 취소 (종료 요청 또는 형제 단계 실패)
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// 백그라운드 태스크 실패
    #[error("task error: {0}")]
    Task(String),
}

fn display_exit_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "none".to_owned(), |c| c.to_string())
}

impl ScanEngineError {
    /// 스캔 전체를 실패시키는 에러인지 여부
    ///
    /// 정규화 에러만 단계 내부에서 복구됩니다.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Normalization { .. })
    }
}

impl From<ScanEngineError> for CodewardenError {
    fn from(err: ScanEngineError) -> Self {
        match err {
            ScanEngineError::Extraction { path, reason } => {
                CodewardenError::Scan(ScanError::Extraction(format!("{path}: {reason}")))
            }
            err @ ScanEngineError::ToolExecution { .. } => {
                CodewardenError::Scan(ScanError::ToolExecution(err.to_string()))
            }
            err @ ScanEngineError::ToolTimeout { .. } => {
                CodewardenError::Scan(ScanError::Timeout(err.to_string()))
            }
            ScanEngineError::Normalization { tool, reason } => {
                CodewardenError::Scan(ScanError::Normalization(format!("{tool}: {reason}")))
            }
            ScanEngineError::Store(e) => CodewardenError::Store(e),
            ScanEngineError::Config { field, reason } => {
                CodewardenError::Config(ConfigError::InvalidValue { field, reason })
            }
            ScanEngineError::Io { path: _, source } => CodewardenError::Io(source),
            ScanEngineError::Cancelled(msg) => CodewardenError::Scan(ScanError::Cancelled(msg)),
            ScanEngineError::Task(msg) => CodewardenError::Scan(ScanError::ToolExecution(msg)),
        }
    }
}
