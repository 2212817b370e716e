//! codewarden.toml 통합 설정 테스트
//!
//! - codewarden.toml.example 파싱 테스트
//! - 파일 로딩 테스트
//! - 환경변수 우선순위 테스트

use std::io::Write;

use codewarden_core::config::CodewardenConfig;
use codewarden_core::error::{CodewardenError, ConfigError};

// =============================================================================
// codewarden.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_and_validates() {
    let content = include_str!("../../../codewarden.toml.example");
    let config = CodewardenConfig::parse(content).expect("example config should parse");
    config
        .validate()
        .expect("example config should pass validation");

    assert_eq!(config.general.work_dir, "/var/tmp/codewarden");
}

#[test]
fn example_config_matches_code_defaults() {
    let content = include_str!("../../../codewarden.toml.example");
    let from_file = CodewardenConfig::parse(content).expect("should parse");
    let from_code = CodewardenConfig::default();

    assert_eq!(from_file.general.log_level, from_code.general.log_level);
    assert_eq!(from_file.general.log_format, from_code.general.log_format);

    assert_eq!(from_file.scanner.trivy_path, from_code.scanner.trivy_path);
    assert_eq!(from_file.scanner.semgrep_path, from_code.scanner.semgrep_path);
    assert_eq!(
        from_file.scanner.semgrep_config,
        from_code.scanner.semgrep_config
    );
    assert_eq!(
        from_file.scanner.tool_timeout_secs,
        from_code.scanner.tool_timeout_secs
    );
    assert_eq!(from_file.scanner.secret_scan, from_code.scanner.secret_scan);
    assert_eq!(
        from_file.scanner.max_archive_entries,
        from_code.scanner.max_archive_entries
    );
    assert_eq!(
        from_file.scanner.max_entry_size,
        from_code.scanner.max_entry_size
    );
}

// =============================================================================
// 파일 로딩 테스트
// =============================================================================

#[tokio::test]
async fn from_file_reads_partial_config() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "[scanner]\nsemgrep_config = \"p/owasp-top-ten\"").expect("write");

    let config = CodewardenConfig::from_file(file.path())
        .await
        .expect("should load");
    assert_eq!(config.scanner.semgrep_config, "p/owasp-top-ten");
    assert_eq!(config.scanner.trivy_path, "trivy");
}

#[tokio::test]
async fn from_file_rejects_invalid_values() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "[general]\nlog_format = \"xml\"").expect("write");

    let err = CodewardenConfig::from_file(file.path()).await.unwrap_err();
    assert!(matches!(
        err,
        CodewardenError::Config(ConfigError::InvalidValue { .. })
    ));
}

#[tokio::test]
async fn from_file_reports_parse_failure() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "[scanner\ntrivy_path = ").expect("write");

    let err = CodewardenConfig::from_file(file.path()).await.unwrap_err();
    assert!(matches!(
        err,
        CodewardenError::Config(ConfigError::ParseFailed { .. })
    ));
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

fn with_env<T>(key: &str, value: &str, f: impl FnOnce() -> T) -> T {
    let original = std::env::var(key).ok();
    // SAFETY: 테스트는 serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var(key, value);
    }

    let result = f();

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var(key, val),
            None => std::env::remove_var(key),
        }
    }
    result
}

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let toml = r#"
[scanner]
trivy_path = "/usr/bin/trivy"
"#;
    let result = with_env("CODEWARDEN_SCANNER_TRIVY_PATH", "/opt/trivy/bin/trivy", || {
        let mut config = CodewardenConfig::parse(toml).expect("should parse");
        config.apply_env_overrides();
        config.scanner.trivy_path
    });
    assert_eq!(result, "/opt/trivy/bin/trivy");
}

#[test]
#[serial_test::serial]
fn env_override_numeric_and_bool_fields() {
    let timeout = with_env("CODEWARDEN_SCANNER_TOOL_TIMEOUT_SECS", "45", || {
        let mut config = CodewardenConfig::parse("").expect("should parse");
        config.apply_env_overrides();
        config.scanner.tool_timeout_secs
    });
    assert_eq!(timeout, 45);

    let secret_scan = with_env("CODEWARDEN_SCANNER_SECRET_SCAN", "false", || {
        let mut config = CodewardenConfig::parse("").expect("should parse");
        config.apply_env_overrides();
        config.scanner.secret_scan
    });
    assert!(!secret_scan);
}

#[test]
#[serial_test::serial]
fn env_override_with_unparseable_value_keeps_file_value() {
    let toml = r#"
[scanner]
tool_timeout_secs = 120
"#;
    let timeout = with_env("CODEWARDEN_SCANNER_TOOL_TIMEOUT_SECS", "soon", || {
        let mut config = CodewardenConfig::parse(toml).expect("should parse");
        config.apply_env_overrides();
        config.scanner.tool_timeout_secs
    });
    assert_eq!(timeout, 120);
}

#[tokio::test]
#[serial_test::serial]
async fn load_applies_env_then_validates() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "[general]\nlog_level = \"debug\"").expect("write");

    let original = std::env::var("CODEWARDEN_GENERAL_LOG_LEVEL").ok();
    // SAFETY: 테스트는 serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("CODEWARDEN_GENERAL_LOG_LEVEL", "loud");
    }

    let result = CodewardenConfig::load(file.path()).await;

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("CODEWARDEN_GENERAL_LOG_LEVEL", val),
            None => std::env::remove_var("CODEWARDEN_GENERAL_LOG_LEVEL"),
        }
    }

    let err = result.unwrap_err();
    assert!(err.to_string().contains("log_level"));
}
