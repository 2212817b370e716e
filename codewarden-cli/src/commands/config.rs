//! `codewarden config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::commands::load_config;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Sections accepted by `config show`.
pub const SECTIONS: [&str; 2] = ["general", "scanner"];

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: Option<&Path>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, writer).await,
        ConfigAction::Show { section } => execute_show(config_path, section, writer).await,
    }
}

/// Execute the config validate subcommand.
///
/// Attempts to load and validate the configuration, reporting any errors.
///
/// # Errors
///
/// Returns `CliError::Config` if validation fails (invalid values, parse errors, missing file).
async fn execute_validate(config_path: Option<&Path>, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = ?config_path, "validating configuration");

    let report = match load_config(config_path).await {
        Ok(loaded) => ConfigValidationReport {
            source: loaded.source,
            valid: true,
            errors: Vec::new(),
        },
        Err(e) => ConfigValidationReport {
            source: config_path
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| crate::cli::DEFAULT_CONFIG_PATH.to_owned()),
            valid: false,
            errors: vec![e.to_string()],
        },
    };

    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }

    Ok(())
}

/// Execute the config show subcommand.
///
/// Loads and displays the effective configuration (file + env overrides + defaults).
///
/// # Errors
///
/// Returns a config error if loading fails or `CliError::Command` if the section name is unknown.
async fn execute_show(
    config_path: Option<&Path>,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let loaded = load_config(config_path).await?;
    info!(source = %loaded.source, "showing configuration");

    let (config_toml, config) = match section.as_deref() {
        None => section_view(&loaded.config)?,
        Some("general") => section_view(&loaded.config.general)?,
        Some("scanner") => section_view(&loaded.config.scanner)?,
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section '{}' (expected one of: {})",
                other,
                SECTIONS.join(", ")
            )));
        }
    };

    let report = ConfigReport {
        source: loaded.source,
        section,
        config,
        config_toml,
    };

    writer.render(&report)
}

fn section_view<T: Serialize>(value: &T) -> Result<(String, serde_json::Value), CliError> {
    let config_toml = toml::to_string_pretty(value)
        .map_err(|e| CliError::Command(format!("failed to serialize configuration: {e}")))?;
    Ok((config_toml, serde_json::to_value(value)?))
}

/// Configuration display report.
#[derive(Serialize)]
pub struct ConfigReport {
    /// Configuration file path (or the built-in defaults label)
    pub source: String,
    /// Section filter (if any)
    pub section: Option<String>,
    /// Effective configuration as structured JSON
    pub config: serde_json::Value,
    /// Serialized TOML configuration
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if let Some(ref section) = self.section {
            let section_label = format!("[{}]", section);
            writeln!(
                w,
                "Configuration {} (source: {})",
                section_label.bold(),
                self.source
            )?;
        } else {
            writeln!(w, "Configuration (source: {})", self.source.bold())?;
        }

        writeln!(w)?;
        write!(w, "{}", self.config_toml)?;

        Ok(())
    }
}

/// Configuration validation report.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    /// Configuration file path
    pub source: String,
    /// Whether the configuration is valid
    pub valid: bool,
    /// Validation error messages (empty if valid)
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;

        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(report: &impl Render) -> String {
        colored::control::set_override(false);
        let mut buffer = Vec::new();
        report
            .render_text(&mut buffer)
            .expect("text rendering should succeed");
        String::from_utf8(buffer).expect("valid UTF-8")
    }

    #[test]
    fn test_config_report_render_text_full_config() {
        let report = ConfigReport {
            source: "codewarden.toml".to_owned(),
            section: None,
            config: serde_json::json!({}),
            config_toml: "[general]\nlog_level = \"info\"\n".to_owned(),
        };

        let output = render(&report);
        assert!(output.contains("Configuration (source: codewarden.toml)"));
        assert!(output.contains("log_level"), "should contain config content");
    }

    #[test]
    fn test_config_report_render_text_specific_section() {
        let report = ConfigReport {
            source: "/etc/codewarden.toml".to_owned(),
            section: Some("scanner".to_owned()),
            config: serde_json::json!({}),
            config_toml: "trivy_path = \"trivy\"\n".to_owned(),
        };

        let output = render(&report);
        assert!(output.contains("[scanner]"), "should show section name");
        assert!(output.contains("trivy_path"), "should show config content");
    }

    #[test]
    fn test_config_report_json_serialization() {
        let report = ConfigReport {
            source: "codewarden.toml".to_owned(),
            section: Some("scanner".to_owned()),
            config: serde_json::json!({ "secret_scan": true }),
            config_toml: "secret_scan = true".to_owned(),
        };

        let parsed = serde_json::to_value(&report).expect("JSON serialization should succeed");
        assert_eq!(parsed["source"].as_str(), Some("codewarden.toml"));
        assert_eq!(parsed["section"].as_str(), Some("scanner"));
        assert_eq!(parsed["config"]["secret_scan"].as_bool(), Some(true));
        assert!(
            parsed.get("config_toml").is_none(),
            "config_toml should be skipped"
        );
    }

    #[test]
    fn test_config_validation_report_valid() {
        let report = ConfigValidationReport {
            source: "codewarden.toml".to_owned(),
            valid: true,
            errors: Vec::new(),
        };
        let output = render(&report);
        assert!(output.contains("VALID"));
        assert!(!output.contains("Error:"));
    }

    #[test]
    fn test_config_validation_report_invalid_lists_errors() {
        let report = ConfigValidationReport {
            source: "bad.toml".to_owned(),
            valid: false,
            errors: vec!["invalid config value for 'general.log_level'".to_owned()],
        };
        let output = render(&report);
        assert!(output.contains("INVALID"));
        assert!(output.contains("Error: invalid config value for 'general.log_level'"));
    }

    #[tokio::test]
    async fn test_execute_show_rejects_unknown_section() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("codewarden.toml");
        std::fs::write(&path, "").expect("write config");

        let writer = OutputWriter::new(crate::cli::OutputFormat::Json);
        let err = execute_show(Some(&path), Some("ebpf".to_owned()), &writer)
            .await
            .expect_err("unknown section should fail");
        assert!(err.to_string().contains("unknown section 'ebpf'"));
        assert_eq!(err.exit_code(), 1);
    }
}
