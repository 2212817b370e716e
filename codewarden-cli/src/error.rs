//! CLI-specific error types and exit code mapping

use codewarden_core::error::CodewardenError;
use codewarden_core::{ScanId, Severity};
use codewarden_scan_engine::ScanEngineError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// One or more configured scanner binaries could not be executed.
    #[error("tools unavailable: {0}")]
    ToolsUnavailable(String),

    /// The scan reached the `failed` state.
    #[error("scan {0} failed (see log output for the cause)")]
    ScanFailed(ScanId),

    /// The scan completed but reported findings at or above the `--fail-on` threshold.
    #[error("found {count} finding(s) at or above {threshold}")]
    ThresholdExceeded { threshold: Severity, count: usize },

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from codewarden-core.
    #[error("{0}")]
    Core(#[from] CodewardenError),

    /// Scan engine error (builder validation, staging).
    #[error("scan engine error: {0}")]
    Engine(#[from] ScanEngineError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                                   |
    /// |------|-------------------------------------------|
    /// | 0    | Success                                   |
    /// | 1    | General / command error                   |
    /// | 2    | Configuration error                       |
    /// | 3    | Scanner binaries unavailable              |
    /// | 4    | Scan failed                               |
    /// | 5    | Findings at or above `--fail-on`          |
    /// | 10   | IO error                                  |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Core(CodewardenError::Config(_)) => 2,
            Self::Engine(ScanEngineError::Config { .. }) => 2,
            Self::ToolsUnavailable(_) => 3,
            Self::ScanFailed(_) => 4,
            Self::ThresholdExceeded { .. } => 5,
            Self::Io(_) => 10,
            Self::JsonSerialize(_) | Self::Command(_) | Self::Core(_) | Self::Engine(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codewarden_core::error::ConfigError;

    #[test]
    fn test_exit_code_config_error() {
        let err = CliError::Config("test error".to_owned());
        assert_eq!(err.exit_code(), 2, "config error should return exit code 2");
    }

    #[test]
    fn test_exit_code_wrapped_core_config_error() {
        let err = CliError::from(CodewardenError::Config(ConfigError::ParseFailed {
            reason: "bad toml".to_owned(),
        }));
        assert_eq!(err.exit_code(), 2, "core config error should map to 2");
    }

    #[test]
    fn test_exit_code_engine_config_error() {
        let err = CliError::from(ScanEngineError::Config {
            field: "work_dir".to_owned(),
            reason: "must not be empty".to_owned(),
        });
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_tools_unavailable() {
        let err = CliError::ToolsUnavailable("semgrep".to_owned());
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_scan_failed() {
        let err = CliError::ScanFailed(7);
        assert_eq!(err.exit_code(), 4);
        assert!(err.to_string().contains("scan 7 failed"));
    }

    #[test]
    fn test_exit_code_threshold_exceeded() {
        let err = CliError::ThresholdExceeded {
            threshold: Severity::High,
            count: 3,
        };
        assert_eq!(err.exit_code(), 5);
        assert_eq!(err.to_string(), "found 3 finding(s) at or above high");
    }

    #[test]
    fn test_exit_code_io_error() {
        let err = CliError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(err.exit_code(), 10);
    }

    #[test]
    fn test_exit_code_command_and_engine_errors() {
        assert_eq!(CliError::Command("x".to_owned()).exit_code(), 1);
        assert_eq!(
            CliError::from(ScanEngineError::Task("join".to_owned())).exit_code(),
            1
        );
    }
}
