//! `codewarden tools` command handler

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use codewarden_core::config::CodewardenConfig;
use codewarden_scan_engine::{
    ProcessToolRunner, ScanEngineConfig, ToolAdapter, ToolKind, ToolRunner, ToolSpec,
};

use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Upper bound for a single `--version` probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// One probe per binary: trivy drives three stages, semgrep one.
const PROBES: [(&str, ToolKind); 2] = [
    ("trivy", ToolKind::Sbom),
    ("semgrep", ToolKind::StaticAnalysis),
];

/// Execute the `tools` command.
pub async fn execute(config: &CodewardenConfig, writer: &OutputWriter) -> Result<(), CliError> {
    let engine_config = ScanEngineConfig::from_core(config);
    let report = probe_tools(&engine_config, Arc::new(ProcessToolRunner::new())).await;

    writer.render(&report)?;

    let missing: Vec<&str> = report
        .tools
        .iter()
        .filter(|t| !t.available)
        .map(|t| t.name.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(CliError::ToolsUnavailable(missing.join(", ")));
    }
    Ok(())
}

/// Run every configured scanner with `--version` through `runner`.
pub async fn probe_tools<R: ToolRunner>(config: &ScanEngineConfig, runner: Arc<R>) -> ToolsReport {
    let mut tools = Vec::with_capacity(PROBES.len());
    for (name, kind) in PROBES {
        let spec = ToolSpec::version_probe(kind, config);
        let program = spec.program.clone();
        let adapter = ToolAdapter::new(spec, Arc::clone(&runner), Some(PROBE_TIMEOUT));

        let status = match adapter.run(None).await {
            Ok(output) => {
                let version = first_line(&output.stdout_text());
                info!(tool = name, program = %program, version = ?version, "tool available");
                ToolStatus {
                    name: name.to_owned(),
                    program,
                    available: true,
                    version,
                    error: None,
                }
            }
            Err(e) => ToolStatus {
                name: name.to_owned(),
                program,
                available: false,
                version: None,
                error: Some(e.to_string()),
            },
        };
        tools.push(status);
    }
    ToolsReport { tools }
}

fn first_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_owned)
}

/// Availability of every configured scanner binary.
#[derive(Debug, Serialize)]
pub struct ToolsReport {
    pub tools: Vec<ToolStatus>,
}

#[derive(Debug, Serialize)]
pub struct ToolStatus {
    pub name: String,
    pub program: String,
    pub available: bool,
    pub version: Option<String>,
    pub error: Option<String>,
}

impl Render for ToolsReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "{:<10} {:<12} {:<24} Version", "Tool", "Status", "Program")?;
        writeln!(w, "{}", "-".repeat(70))?;
        for tool in &self.tools {
            let status = if tool.available {
                format!("{:<12}", "available").green()
            } else {
                format!("{:<12}", "missing").red().bold()
            };
            writeln!(
                w,
                "{:<10} {} {:<24} {}",
                tool.name,
                status,
                tool.program,
                tool.version.as_deref().unwrap_or("-")
            )?;
            if let Some(ref error) = tool.error {
                writeln!(w, "  {}", error.red())?;
            }
        }
        Ok(())
    }
}
