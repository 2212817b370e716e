//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use codewarden_core::Severity;

/// Default configuration file, used only when it exists in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "codewarden.toml";

/// Codewarden -- run trivy and semgrep against a source archive and report the findings.
///
/// Use `codewarden <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "codewarden", version, about, long_about = None)]
pub struct Cli {
    /// Path to the codewarden.toml configuration file.
    ///
    /// When omitted, `./codewarden.toml` is used if present, otherwise built-in defaults.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a ZIP archive with every configured tool.
    Scan(ScanArgs),

    /// Manage configuration.
    Config(ConfigArgs),

    /// Check that the configured scanner binaries can be executed.
    Tools,
}

// ---- scan ----

/// Stage an archive, run the scan to completion and render the results.
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// ZIP archive to scan. The file itself is never modified or deleted.
    pub archive: PathBuf,

    /// Display name recorded on the scan (default: the archive's file name).
    #[arg(long)]
    pub name: Option<String>,

    /// Also write the JSON report to this file.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Exit with code 5 when a finding at or above this severity exists
    /// (low, medium, high, critical).
    #[arg(long, value_parser = parse_severity)]
    pub fail_on: Option<Severity>,

    /// Status polling interval in milliseconds.
    #[arg(long, default_value_t = 250, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval_ms: u64,
}

fn parse_severity(s: &str) -> Result<Severity, String> {
    Severity::from_str_loose(s).ok_or_else(|| {
        format!("invalid severity: {s} (expected: low, medium, high, critical)")
    })
}

// ---- config ----

/// Manage codewarden configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, scanner).
        section: Option<String>,
    },
}
