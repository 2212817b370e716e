//! 설정 관리 -- codewarden.toml 파싱 및 런타임 설정
//!
//! [`CodewardenConfig`]는 모든 크레이트의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`CODEWARDEN_SCANNER_TRIVY_PATH=/opt/bin/trivy` 형식)
//! 3. 설정 파일 (`codewarden.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), codewarden_core::error::CodewardenError> {
//! use codewarden_core::config::CodewardenConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = CodewardenConfig::load("codewarden.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = CodewardenConfig::parse("[scanner]\nsemgrep_config = \"p/ci\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CodewardenError, ConfigError};

/// 도구 타임아웃 상한 (24시간)
pub const MAX_TOOL_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Codewarden 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodewardenConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 스캐너 설정
    #[serde(default)]
    pub scanner: ScannerConfig,
}

impl CodewardenConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, CodewardenError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, CodewardenError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CodewardenError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                CodewardenError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, CodewardenError> {
        toml::from_str(toml_str).map_err(|e| {
            CodewardenError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `CODEWARDEN_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "CODEWARDEN_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "CODEWARDEN_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.work_dir, "CODEWARDEN_GENERAL_WORK_DIR");

        // Scanner
        override_string(&mut self.scanner.trivy_path, "CODEWARDEN_SCANNER_TRIVY_PATH");
        override_string(
            &mut self.scanner.semgrep_path,
            "CODEWARDEN_SCANNER_SEMGREP_PATH",
        );
        override_string(
            &mut self.scanner.semgrep_config,
            "CODEWARDEN_SCANNER_SEMGREP_CONFIG",
        );
        override_u64(
            &mut self.scanner.tool_timeout_secs,
            "CODEWARDEN_SCANNER_TOOL_TIMEOUT_SECS",
        );
        override_bool(&mut self.scanner.secret_scan, "CODEWARDEN_SCANNER_SECRET_SCAN");
        override_usize(
            &mut self.scanner.max_archive_entries,
            "CODEWARDEN_SCANNER_MAX_ARCHIVE_ENTRIES",
        );
        override_u64(
            &mut self.scanner.max_entry_size,
            "CODEWARDEN_SCANNER_MAX_ENTRY_SIZE",
        );
        override_u64(
            &mut self.scanner.max_total_size,
            "CODEWARDEN_SCANNER_MAX_TOTAL_SIZE",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), CodewardenError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.general.work_dir.trim().is_empty() {
            return Err(invalid("general.work_dir", "must not be empty".to_owned()));
        }

        if self.general.work_dir.contains("..") {
            return Err(invalid(
                "general.work_dir",
                "path traversal detected: must not contain '..'".to_owned(),
            ));
        }

        for (field, value) in [
            ("scanner.trivy_path", &self.scanner.trivy_path),
            ("scanner.semgrep_path", &self.scanner.semgrep_path),
            ("scanner.semgrep_config", &self.scanner.semgrep_config),
        ] {
            if value.trim().is_empty() {
                return Err(invalid(field, "must not be empty".to_owned()));
            }
        }

        if self.scanner.tool_timeout_secs > MAX_TOOL_TIMEOUT_SECS {
            return Err(invalid(
                "scanner.tool_timeout_secs",
                format!("must be at most {MAX_TOOL_TIMEOUT_SECS} (0 disables the timeout)"),
            ));
        }

        if self.scanner.max_archive_entries == 0 {
            return Err(invalid(
                "scanner.max_archive_entries",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.scanner.max_entry_size == 0 {
            return Err(invalid(
                "scanner.max_entry_size",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.scanner.max_total_size == 0 {
            return Err(invalid(
                "scanner.max_total_size",
                "must be greater than 0".to_owned(),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> CodewardenError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 업로드 보관 및 압축 해제에 쓰는 작업 디렉토리
    pub work_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            work_dir: std::env::temp_dir()
                .join("codewarden")
                .display()
                .to_string(),
        }
    }
}

/// 스캐너 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// trivy 실행 파일 경로
    pub trivy_path: String,
    /// semgrep 실행 파일 경로
    pub semgrep_path: String,
    /// semgrep 규칙셋 (`auto`, `p/ci`, 로컬 경로 등)
    pub semgrep_config: String,
    /// 도구 1회 실행 제한 시간 (초, 0이면 무제한)
    pub tool_timeout_secs: u64,
    /// 시크릿 스캔 단계 실행 여부
    pub secret_scan: bool,
    /// 아카이브 최대 엔트리 수
    pub max_archive_entries: usize,
    /// 엔트리 1개의 최대 압축 해제 크기 (바이트)
    pub max_entry_size: u64,
    /// 아카이브 전체의 최대 압축 해제 크기 (바이트)
    pub max_total_size: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            trivy_path: "trivy".to_owned(),
            semgrep_path: "semgrep".to_owned(),
            semgrep_config: "p/default".to_owned(),
            tool_timeout_secs: 600,
            secret_scan: true,
            max_archive_entries: 100_000,
            max_entry_size: 512 * 1024 * 1024, // 512MB
            max_total_size: 4 * 1024 * 1024 * 1024, // 4GB
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
