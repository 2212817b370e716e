//! `codewarden scan` command handler
//!
//! Plays the upload collaborator for local use: the archive is copied into
//! `<work_dir>/uploads` (the orchestrator deletes its staged copy when the scan
//! ends), the scan is started in the background and its status polled until
//! it reaches a terminal state.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use codewarden_core::config::CodewardenConfig;
use codewarden_core::{
    MemoryScanStore, ScanId, ScanReport, ScanStatus, ScanStatusView, ScanStore, Severity,
    Vulnerability,
};
use codewarden_scan_engine::{
    ProcessToolRunner, ScanEngineConfig, ScanOrchestrator, ScanOrchestratorBuilder, ToolRunner,
};

use crate::cli::ScanArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Fallback display name when the archive path has no file name.
const DEFAULT_FILENAME: &str = "archive.zip";

/// Shown for a component whose ecosystem or license the SBOM did not report.
const UNKNOWN_FIELD: &str = "unknown";

/// Execute the `scan` command.
pub async fn execute(
    args: ScanArgs,
    config: &CodewardenConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let engine_config = ScanEngineConfig::from_core(config);
    let orchestrator = ScanOrchestratorBuilder::new()
        .config(engine_config)
        .runner(Arc::new(ProcessToolRunner::new()))
        .store(Arc::new(MemoryScanStore::new()))
        .build()?;

    let filename = display_name(&args.archive, args.name.as_deref());
    let staged = stage_archive(&args.archive, &orchestrator.config().uploads_dir()).await?;

    let scan_id = orchestrator.start_scan(staged, &filename);
    info!(scan_id, filename = %filename, "scan started");

    let interval = Duration::from_millis(args.poll_interval_ms);
    let status = tokio::select! {
        status = wait_for_terminal(&orchestrator, scan_id, interval) => status?,
        _ = tokio::signal::ctrl_c() => {
            warn!(scan_id, "interrupted, cancelling scan");
            orchestrator.shutdown().await;
            wait_for_terminal(&orchestrator, scan_id, interval).await?
        }
    };
    orchestrator.shutdown().await;

    if status.status != ScanStatus::Completed {
        return Err(CliError::ScanFailed(scan_id));
    }

    let results = orchestrator
        .results(scan_id)
        .ok_or_else(|| CliError::Command(format!("results for scan {scan_id} are missing")))?;
    let report = ScanReport::new(results, Utc::now());

    if let Some(ref path) = args.export {
        export_report(&report, path).await?;
    }

    writer.render(&report)?;

    if let Some(threshold) = args.fail_on {
        let count = count_at_or_above(&report.results.vulnerabilities, threshold);
        if count > 0 {
            return Err(CliError::ThresholdExceeded { threshold, count });
        }
    }

    Ok(())
}

/// Name recorded on the scan: `--name`, else the archive's file name.
fn display_name(archive: &Path, name: Option<&str>) -> String {
    match name {
        Some(name) if !name.trim().is_empty() => name.to_owned(),
        _ => archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_FILENAME.to_owned()),
    }
}

/// Copy the user's archive into `uploads` under a unique name.
async fn stage_archive(archive: &Path, uploads: &Path) -> Result<PathBuf, CliError> {
    let metadata = tokio::fs::metadata(archive).await.map_err(|e| {
        CliError::Command(format!("cannot read archive {}: {e}", archive.display()))
    })?;
    if !metadata.is_file() {
        return Err(CliError::Command(format!(
            "{} is not a regular file",
            archive.display()
        )));
    }

    tokio::fs::create_dir_all(uploads).await?;
    let staged = uploads.join(format!(
        "upload_{}_{}.zip",
        std::process::id(),
        Utc::now().timestamp_micros()
    ));
    tokio::fs::copy(archive, &staged).await?;
    info!(
        source = %archive.display(),
        staged = %staged.display(),
        bytes = metadata.len(),
        "archive staged"
    );
    Ok(staged)
}

async fn wait_for_terminal<R: ToolRunner, S: ScanStore>(
    orchestrator: &ScanOrchestrator<R, S>,
    scan_id: ScanId,
    interval: Duration,
) -> Result<ScanStatusView, CliError> {
    let mut last_progress = None;
    loop {
        let view = orchestrator
            .status(scan_id)
            .ok_or_else(|| CliError::Command(format!("scan {scan_id} not found")))?;
        if last_progress != Some(view.progress) {
            info!(scan_id, status = %view.status, progress = view.progress, "scan progress");
            last_progress = Some(view.progress);
        }
        if view.status.is_terminal() {
            return Ok(view);
        }
        tokio::time::sleep(interval).await;
    }
}

async fn export_report(report: &ScanReport, path: &Path) -> Result<(), CliError> {
    let json = serde_json::to_vec_pretty(report)?;
    tokio::fs::write(path, json).await?;
    info!(path = %path.display(), "report exported");
    Ok(())
}

fn count_at_or_above(vulnerabilities: &[Vulnerability], threshold: Severity) -> usize {
    vulnerabilities
        .iter()
        .filter(|v| v.severity >= threshold)
        .count()
}

fn location(vuln: &Vulnerability) -> String {
    match (&vuln.file_path, vuln.line_number) {
        (Some(path), Some(line)) => format!("{path}:{line}"),
        (Some(path), None) => path.clone(),
        (None, _) => match (&vuln.component, &vuln.version) {
            (Some(component), Some(version)) => format!("{component}@{version}"),
            (Some(component), None) => component.clone(),
            _ => "-".to_owned(),
        },
    }
}

impl Render for ScanReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let scan = &self.results.scan;
        let summary = &self.results.summary;

        writeln!(w, "Scan #{}: {}", scan.id, scan.filename.bold())?;
        writeln!(w, "Status: {}", scan.status.to_string().green().bold())?;
        if let Some(completed_at) = scan.completed_at {
            writeln!(w, "Completed: {}", completed_at.to_rfc3339())?;
        }
        writeln!(w, "Dependencies: {}", summary.dependencies)?;
        writeln!(w)?;

        let total = summary.total_vulnerabilities();
        let counts = format!(
            "{} total (C:{} H:{} M:{} L:{})",
            total, summary.critical, summary.high, summary.medium, summary.low
        );
        if total > 0 {
            writeln!(w, "Findings: {}", counts.red().bold())?;
        } else {
            writeln!(w, "Findings: {}", counts.green().bold())?;
        }
        writeln!(w)?;

        if self.results.vulnerabilities.is_empty() {
            writeln!(w, "{}", "No findings.".green())?;
        } else {
            writeln!(
                w,
                "{:<10} {:<5} {:<18} {:<32} Title",
                "Severity", "Type", "CVE", "Location"
            )?;
            writeln!(w, "{}", "-".repeat(90))?;

            let mut findings: Vec<&Vulnerability> = self.results.vulnerabilities.iter().collect();
            findings.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.id.cmp(&b.id)));

            for v in findings {
                let label = format!("{:<10}", v.severity.as_str());
                let severity_colored = match v.severity {
                    Severity::Critical => label.red().bold(),
                    Severity::High => label.red(),
                    Severity::Medium => label.yellow(),
                    Severity::Low => label.normal(),
                };
                writeln!(
                    w,
                    "{} {:<5} {:<18} {:<32} {}",
                    severity_colored,
                    v.finding_type.as_str(),
                    v.cve.as_deref().unwrap_or("-"),
                    location(v),
                    v.title
                )?;
                if let Some(ref snippet) = v.code_snippet {
                    for line in snippet.lines() {
                        writeln!(w, "      {}", line.dimmed())?;
                    }
                }
            }
        }

        if !self.results.sbom_components.is_empty() {
            writeln!(w)?;
            writeln!(
                w,
                "{:<32} {:<16} {:<12} License",
                "Component", "Version", "Ecosystem"
            )?;
            writeln!(w, "{}", "-".repeat(80))?;
            for c in &self.results.sbom_components {
                writeln!(
                    w,
                    "{:<32} {:<16} {:<12} {}",
                    c.name,
                    c.version,
                    c.ecosystem.as_deref().unwrap_or(UNKNOWN_FIELD),
                    c.license.as_deref().unwrap_or(UNKNOWN_FIELD)
                )?;
            }
        }

        Ok(())
    }
}
