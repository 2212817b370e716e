//! 스캔 엔진 설정
//!
//! [`ScanEngineConfig`]는 core의 [`CodewardenConfig`]에서
//! 작업 디렉토리와 스캐너 섹션을 모아 엔진이 쓰는 형태로 변환합니다.
//!
//! # 사용 예시
//!
//! ```
//! use codewarden_scan_engine::{ScanEngineConfig, ScanEngineConfigBuilder};
//!
//! let config = ScanEngineConfig::default();
//! config.validate().unwrap();
//!
//! let config = ScanEngineConfigBuilder::new()
//!     .semgrep_config("p/ci")
//!     .tool_timeout_secs(120)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.tool_timeout().map(|t| t.as_secs()), Some(120));
//! ```

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use codewarden_core::config::{CodewardenConfig, MAX_TOOL_TIMEOUT_SECS, ScannerConfig};

use crate::error::ScanEngineError;

/// 경로 문자열 최대 길이
const MAX_PATH_LEN: usize = 4096;

/// 스캔 엔진 설정
#[derive(Debug, Clone)]
pub struct ScanEngineConfig {
    /// 스캔별 작업 디렉토리(`scan_<id>`)를 만드는 상위 디렉토리
    pub work_dir: PathBuf,
    /// trivy 실행 파일
    pub trivy_path: String,
    /// semgrep 실행 파일
    pub semgrep_path: String,
    /// semgrep 규칙셋
    pub semgrep_config: String,
    /// 도구 1회 실행 제한 시간 (초, 0이면 무제한)
    pub tool_timeout_secs: u64,
    /// 시크릿 스캔 단계 실행 여부
    pub secret_scan: bool,
    /// 아카이브 최대 엔트리 수
    pub max_archive_entries: usize,
    /// 엔트리 최대 압축 해제 크기 (바이트)
    pub max_entry_size: u64,
    /// 아카이브 전체 최대 압축 해제 크기 (바이트)
    pub max_total_size: u64,
}

impl Default for ScanEngineConfig {
    fn default() -> Self {
        Self::from_core(&CodewardenConfig::default())
    }
}

impl ScanEngineConfig {
    /// core 설정에서 엔진 설정을 생성합니다.
    pub fn from_core(core: &CodewardenConfig) -> Self {
        let ScannerConfig {
            trivy_path,
            semgrep_path,
            semgrep_config,
            tool_timeout_secs,
            secret_scan,
            max_archive_entries,
            max_entry_size,
            max_total_size,
        } = core.scanner.clone();

        Self {
            work_dir: PathBuf::from(&core.general.work_dir),
            trivy_path,
            semgrep_path,
            semgrep_config,
            tool_timeout_secs,
            secret_scan,
            max_archive_entries,
            max_entry_size,
            max_total_size,
        }
    }

    /// 도구 제한 시간. 0이면 `None`
    pub fn tool_timeout(&self) -> Option<Duration> {
        (self.tool_timeout_secs > 0).then(|| Duration::from_secs(self.tool_timeout_secs))
    }

    /// 업로드 보관 디렉토리 (`<work_dir>/uploads`)
    pub fn uploads_dir(&self) -> PathBuf {
        self.work_dir.join("uploads")
    }

    /// 설정 값의 유효성을 검증합니다.
    ///
    /// # 검증 규칙
    ///
    /// - `work_dir`: 비어있지 않고 `..` 컴포넌트가 없어야 함
    /// - 도구 경로와 semgrep 규칙셋: 비어있으면 안 됨
    /// - `tool_timeout_secs`: 0-86400
    /// - `max_archive_entries`, `max_entry_size`, `max_total_size`: 1 이상
    pub fn validate(&self) -> Result<(), ScanEngineError> {
        let work_dir = self.work_dir.as_os_str();
        if work_dir.is_empty() {
            return Err(config_error("work_dir", "must not be empty"));
        }
        if work_dir.len() > MAX_PATH_LEN {
            return Err(config_error(
                "work_dir",
                &format!("exceeds maximum length {MAX_PATH_LEN}"),
            ));
        }
        if has_parent_component(&self.work_dir) {
            return Err(config_error(
                "work_dir",
                "contains path traversal pattern '..'",
            ));
        }

        for (field, value) in [
            ("trivy_path", &self.trivy_path),
            ("semgrep_path", &self.semgrep_path),
            ("semgrep_config", &self.semgrep_config),
        ] {
            if value.trim().is_empty() {
                return Err(config_error(field, "must not be empty"));
            }
        }

        if self.tool_timeout_secs > MAX_TOOL_TIMEOUT_SECS {
            return Err(config_error(
                "tool_timeout_secs",
                &format!("must be 0 (no timeout) or 1-{MAX_TOOL_TIMEOUT_SECS}"),
            ));
        }

        if self.max_archive_entries == 0 {
            return Err(config_error("max_archive_entries", "must be greater than 0"));
        }

        if self.max_entry_size == 0 {
            return Err(config_error("max_entry_size", "must be greater than 0"));
        }

        if self.max_total_size == 0 {
            return Err(config_error("max_total_size", "must be greater than 0"));
        }

        Ok(())
    }
}

fn has_parent_component(path: &Path) -> bool {
    path.components().any(|c| c == Component::ParentDir)
}

fn config_error(field: &str, reason: &str) -> ScanEngineError {
    ScanEngineError::Config {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
}

/// [`ScanEngineConfig`] 빌더
///
/// 빌드 시 유효성 검증을 수행합니다.
#[derive(Default)]
pub struct ScanEngineConfigBuilder {
    config: ScanEngineConfig,
}

impl ScanEngineConfigBuilder {
    /// 기본값을 가진 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 작업 디렉토리를 설정합니다.
    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = dir.into();
        self
    }

    /// trivy 실행 파일 경로를 설정합니다.
    pub fn trivy_path(mut self, path: impl Into<String>) -> Self {
        self.config.trivy_path = path.into();
        self
    }

    /// semgrep 실행 파일 경로를 설정합니다.
    pub fn semgrep_path(mut self, path: impl Into<String>) -> Self {
        self.config.semgrep_path = path.into();
        self
    }

    /// semgrep 규칙셋을 설정합니다.
    pub fn semgrep_config(mut self, ruleset: impl Into<String>) -> Self {
        self.config.semgrep_config = ruleset.into();
        self
    }

    /// 도구 제한 시간(초)을 설정합니다.
    pub fn tool_timeout_secs(mut self, secs: u64) -> Self {
        self.config.tool_timeout_secs = secs;
        self
    }

    /// 시크릿 스캔 단계 실행 여부를 설정합니다.
    pub fn secret_scan(mut self, enabled: bool) -> Self {
        self.config.secret_scan = enabled;
        self
    }

    /// 아카이브 최대 엔트리 수를 설정합니다.
    pub fn max_archive_entries(mut self, max: usize) -> Self {
        self.config.max_archive_entries = max;
        self
    }

    /// 엔트리 최대 크기(바이트)를 설정합니다.
    pub fn max_entry_size(mut self, max: u64) -> Self {
        self.config.max_entry_size = max;
        self
    }

    /// 아카이브 전체 최대 압축 해제 크기(바이트)를 설정합니다.
    pub fn max_total_size(mut self, max: u64) -> Self {
        self.config.max_total_size = max;
        self
    }

    /// 설정을 검증하고 빌드합니다.
    ///
    /// # Errors
    ///
    /// 유효성 검증 실패 시 `ScanEngineError::Config` 반환
    pub fn build(self) -> Result<ScanEngineConfig, ScanEngineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
