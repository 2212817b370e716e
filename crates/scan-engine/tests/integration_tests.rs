//! End-to-end tests for the scan orchestrator using a scripted tool runner.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use zip::write::SimpleFileOptions;

use codewarden_core::store::{MemoryScanStore, ScanStore};
use codewarden_core::types::{FindingType, ScanStatus, Severity};
use codewarden_scan_engine::{
    ScanEngineConfigBuilder, ScanEngineError, ScanOrchestrator, ScanOrchestratorBuilder,
    ScanOutcome, ToolKind, ToolOutput, ToolRunner,
};

fn fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    fs::read_to_string(path).unwrap()
}

/// What a scripted tool does when invoked.
#[derive(Clone)]
enum Script {
    Exit(i32, String),
    Missing,
    Hang,
}

/// A [`ToolRunner`] that answers each tool role from a script.
struct ScriptedRunner {
    scripts: HashMap<ToolKind, Script>,
    calls: Mutex<Vec<(ToolKind, Vec<String>)>>,
}

impl ScriptedRunner {
    fn new() -> Self {
        let mut scripts = HashMap::new();
        scripts.insert(ToolKind::Sbom, Script::Exit(0, fixture("trivy_sbom.json")));
        scripts.insert(
            ToolKind::Vulnerability,
            Script::Exit(0, fixture("trivy_vuln.json")),
        );
        // semgrep exits 1 when it reports findings
        scripts.insert(
            ToolKind::StaticAnalysis,
            Script::Exit(1, fixture("semgrep.json")),
        );
        scripts.insert(ToolKind::Secret, Script::Exit(0, fixture("trivy_secret.json")));
        Self {
            scripts,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn with(mut self, kind: ToolKind, script: Script) -> Self {
        self.scripts.insert(kind, script);
        self
    }

    fn called_kinds(&self) -> Vec<ToolKind> {
        self.calls.lock().unwrap().iter().map(|(k, _)| *k).collect()
    }

    fn classify(program: &str, args: &[String]) -> ToolKind {
        if program.contains("semgrep") {
            ToolKind::StaticAnalysis
        } else if args.iter().any(|a| a == "--list-all-pkgs") {
            ToolKind::Sbom
        } else if args.iter().any(|a| a == "secret") {
            ToolKind::Secret
        } else {
            ToolKind::Vulnerability
        }
    }
}

impl ToolRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<ToolOutput, ScanEngineError> {
        let kind = Self::classify(program, args);
        self.calls.lock().unwrap().push((kind, args.to_vec()));
        let script = self
            .scripts
            .get(&kind)
            .cloned()
            .unwrap_or(Script::Exit(0, String::new()));

        match script {
            Script::Exit(code, stdout) => Ok(ToolOutput {
                exit_code: Some(code),
                stdout: Bytes::from(stdout),
                stderr: Bytes::from_static(b"scripted stderr"),
            }),
            Script::Missing => Err(ScanEngineError::ToolExecution {
                tool: program.to_owned(),
                exit_code: None,
                stderr: format!("failed to execute '{program}': No such file or directory"),
            }),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(ToolOutput::default())
            }
        }
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    work_dir: PathBuf,
    runner: Arc<ScriptedRunner>,
    orchestrator: ScanOrchestrator<ScriptedRunner, MemoryScanStore>,
}

impl Harness {
    fn new(runner: ScriptedRunner) -> Self {
        Self::with_config(runner, |b| b)
    }

    fn with_config(
        runner: ScriptedRunner,
        configure: impl FnOnce(ScanEngineConfigBuilder) -> ScanEngineConfigBuilder,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let work_dir = dir.path().join("work");
        let config = configure(ScanEngineConfigBuilder::new().work_dir(&work_dir))
            .build()
            .unwrap();
        let runner = Arc::new(runner);
        let orchestrator = ScanOrchestratorBuilder::new()
            .config(config)
            .runner(Arc::clone(&runner))
            .store(Arc::new(MemoryScanStore::new()))
            .build()
            .unwrap();
        Self {
            _dir: dir,
            work_dir,
            runner,
            orchestrator,
        }
    }

    /// Writes a small project archive into the uploads directory.
    fn upload(&self, name: &str) -> PathBuf {
        let uploads = self.work_dir.join("uploads");
        fs::create_dir_all(&uploads).unwrap();
        let path = uploads.join(name);
        write_zip(
            &path,
            &[
                ("package-lock.json", "{\"lockfileVersion\":3}\n"),
                (
                    "src/db.js",
                    "const { Client } = require('pg');\nconst client = new Client();\n\nfunction find(id) {\n  return client.query('SELECT * FROM users WHERE id = ' + id);\n}\n",
                ),
                ("config/settings.py", "DEBUG = True\nAWS_ACCESS_KEY_ID = \"AKIA\"\n"),
            ],
        );
        path
    }

    /// Extraction directories of `scan_id` still present under the work dir.
    fn scan_dirs(&self, scan_id: u64) -> Vec<PathBuf> {
        let prefix = format!("scan_{scan_id}_");
        fs::read_dir(&self.work_dir)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|e| e.file_name().to_string_lossy().starts_with(&prefix))
                    .map(|e| e.path())
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn run(&self, archive: &Path) -> (u64, ScanOutcome) {
        let scan = self.orchestrator.store().create_scan("project.zip");
        let outcome = self.orchestrator.run_scan(scan.id, archive).await;
        (scan.id, outcome)
    }
}

fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    let file = fs::File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    for (name, content) in entries {
        writer
            .start_file(name.to_string(), SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

async fn wait_for_terminal(
    orchestrator: &ScanOrchestrator<ScriptedRunner, MemoryScanStore>,
    scan_id: u64,
) -> Vec<u8> {
    let mut observed = Vec::new();
    for _ in 0..500 {
        let status = orchestrator.status(scan_id).unwrap();
        if observed.last() != Some(&status.progress) {
            observed.push(status.progress);
        }
        if status.status.is_terminal() {
            return observed;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("scan {scan_id} did not finish, progress so far: {observed:?}");
}

#[tokio::test]
async fn test_full_scan_normalizes_every_tool() {
    let harness = Harness::new(ScriptedRunner::new());
    let archive = harness.upload("project.zip");

    let (scan_id, outcome) = harness.run(&archive).await;
    assert_eq!(outcome, ScanOutcome::Completed);

    let results = harness.orchestrator.results(scan_id).unwrap();
    assert_eq!(results.scan.status, ScanStatus::Completed);
    assert_eq!(results.scan.progress, 100);
    assert!(results.scan.completed_at.is_some());

    // SBOM
    assert_eq!(results.sbom_components.len(), 1);
    let component = &results.sbom_components[0];
    assert_eq!(component.name, "left-pad");
    assert_eq!(component.version, "1.0.0");
    assert_eq!(component.ecosystem.as_deref(), Some("npm"));
    assert_eq!(component.risk_level, Severity::Low);

    // dependency vulnerability
    let sca: Vec<_> = results
        .vulnerabilities
        .iter()
        .filter(|v| v.finding_type == FindingType::Sca)
        .collect();
    assert_eq!(sca.len(), 1);
    assert_eq!(sca[0].severity, Severity::High);
    assert_eq!(sca[0].cve.as_deref(), Some("CVE-2021-1234"));
    assert_eq!(sca[0].cvss_score.as_deref(), Some("7.5"));
    assert!(!sca[0].fix_available);

    // static analysis: one with a snippet, one pointing at a file that does not exist
    let sqli = results
        .vulnerabilities
        .iter()
        .find(|v| v.title.contains("SQL"))
        .unwrap();
    assert_eq!(sqli.severity, Severity::High);
    assert_eq!(sqli.file_path.as_deref(), Some("src/db.js"));
    let snippet = sqli.code_snippet.as_deref().unwrap();
    assert!(snippet.contains("> 5 |   return client.query('SELECT * FROM users WHERE id = ' + id);"));
    assert!(snippet.contains("  4 | function find(id) {"));
    assert!(!snippet.contains("new Client()"));

    let traversal = results
        .vulnerabilities
        .iter()
        .find(|v| v.line_number == Some(50))
        .unwrap();
    assert_eq!(traversal.severity, Severity::Medium);
    assert_eq!(traversal.cve.as_deref(), Some("CVE-2019-10744"));
    assert!(traversal.code_snippet.is_none());

    // secret
    let secret = results
        .vulnerabilities
        .iter()
        .find(|v| v.cwe.as_deref() == Some("CWE-798"))
        .unwrap();
    assert_eq!(secret.finding_type, FindingType::Sast);
    assert_eq!(secret.title, "aws-access-key-id: AWS Access Key ID");
    assert_eq!(secret.line_number, Some(2));

    // summary matches stored records
    assert_eq!(results.summary.high, 3);
    assert_eq!(results.summary.medium, 1);
    assert_eq!(results.summary.low, 0);
    assert_eq!(results.summary.critical, 0);
    assert_eq!(results.summary.dependencies, 1);
    assert_eq!(results.summary.total_vulnerabilities(), 4);
}

#[tokio::test]
async fn test_cleanup_after_completion() {
    let harness = Harness::new(ScriptedRunner::new());
    let archive = harness.upload("project.zip");

    let (scan_id, outcome) = harness.run(&archive).await;
    assert!(outcome.is_completed());
    assert!(harness.scan_dirs(scan_id).is_empty());
    assert!(!archive.exists());
}

#[tokio::test]
async fn test_tools_receive_extraction_root() {
    let harness = Harness::new(ScriptedRunner::new());
    let archive = harness.upload("project.zip");

    let (scan_id, _) = harness.run(&archive).await;
    let prefix = harness
        .work_dir
        .join(format!("scan_{scan_id}_"))
        .to_string_lossy()
        .into_owned();
    let calls = harness.runner.calls.lock().unwrap();
    assert_eq!(calls.len(), 4);
    let root = calls[0].1.last().unwrap().clone();
    assert!(root.starts_with(&prefix), "{root}");
    for (kind, args) in calls.iter() {
        assert_eq!(args.last(), Some(&root), "{kind}");
    }
}

#[tokio::test]
async fn test_stale_scan_directory_is_not_scanned() {
    let leftover_report = r#"{"results":[{"check_id":"js.eval","path":"leftover.js","start":{"line":1},"end":{"line":1},"extra":{"message":"Avoid eval","severity":"WARNING","metadata":{}}}],"errors":[]}"#;
    let runner = ScriptedRunner::new().with(
        ToolKind::StaticAnalysis,
        Script::Exit(1, leftover_report.to_owned()),
    );
    let harness = Harness::new(runner);
    // left behind by another process whose first scan also had id 1
    let stale = harness.work_dir.join("scan_1");
    fs::create_dir_all(&stale).unwrap();
    fs::write(stale.join("leftover.js"), "OTHER PROJECT SECRET\n").unwrap();
    let archive = harness.upload("project.zip");

    let (scan_id, outcome) = harness.run(&archive).await;
    assert_eq!(scan_id, 1);
    assert!(outcome.is_completed());

    let stale_root = stale.to_string_lossy().into_owned();
    assert!(
        harness
            .runner
            .calls
            .lock()
            .unwrap()
            .iter()
            .all(|(_, args)| args.last() != Some(&stale_root))
    );

    let results = harness.orchestrator.results(scan_id).unwrap();
    let finding = results
        .vulnerabilities
        .iter()
        .find(|v| v.file_path.as_deref() == Some("leftover.js"))
        .unwrap();
    assert!(finding.code_snippet.is_none());
    assert!(
        results
            .vulnerabilities
            .iter()
            .filter_map(|v| v.code_snippet.as_deref())
            .all(|snippet| !snippet.contains("OTHER PROJECT SECRET"))
    );

    // the other run's tree is neither read nor deleted
    assert!(stale.join("leftover.js").exists());
    assert!(harness.scan_dirs(scan_id).is_empty());
}

#[tokio::test]
async fn test_rejected_exit_code_fails_scan() {
    let runner = ScriptedRunner::new().with(ToolKind::Vulnerability, Script::Exit(3, String::new()));
    let harness = Harness::new(runner);
    let archive = harness.upload("project.zip");

    let (scan_id, outcome) = harness.run(&archive).await;
    match &outcome {
        ScanOutcome::Failed { reason } => {
            assert!(reason.contains("vulnerability"));
            assert!(reason.contains("exit code: 3"));
        }
        ScanOutcome::Completed => panic!("scan must fail"),
    }

    let scan = harness.orchestrator.store().get_scan(scan_id).unwrap();
    assert_eq!(scan.status, ScanStatus::Failed);
    assert_eq!(scan.progress, 0);
    assert!(scan.completed_at.is_none());
    assert!(harness.scan_dirs(scan_id).is_empty());
    assert!(!archive.exists());
}

#[tokio::test]
async fn test_missing_binary_fails_scan() {
    let runner = ScriptedRunner::new().with(ToolKind::Sbom, Script::Missing);
    let harness = Harness::new(runner);
    let archive = harness.upload("project.zip");

    let (_, outcome) = harness.run(&archive).await;
    match outcome {
        ScanOutcome::Failed { reason } => assert!(reason.contains("exit code: none")),
        ScanOutcome::Completed => panic!("scan must fail"),
    }
}

#[tokio::test]
async fn test_first_failure_aborts_hanging_siblings() {
    let runner = ScriptedRunner::new()
        .with(ToolKind::StaticAnalysis, Script::Hang)
        .with(ToolKind::Vulnerability, Script::Exit(3, String::new()));
    let harness = Harness::with_config(runner, |b| b.tool_timeout_secs(0));
    let archive = harness.upload("project.zip");

    let (scan_id, outcome) = tokio::time::timeout(Duration::from_secs(10), harness.run(&archive))
        .await
        .expect("failing stage must not wait for hanging siblings");
    assert!(!outcome.is_completed());
    assert_eq!(
        harness.orchestrator.status(scan_id).unwrap().status,
        ScanStatus::Failed
    );
}

#[tokio::test]
async fn test_tool_timeout_fails_scan() {
    let runner = ScriptedRunner::new().with(ToolKind::StaticAnalysis, Script::Hang);
    let harness = Harness::with_config(runner, |b| b.tool_timeout_secs(1));
    let archive = harness.upload("project.zip");

    let (scan_id, outcome) = harness.run(&archive).await;
    match outcome {
        ScanOutcome::Failed { reason } => assert!(reason.contains("timed out")),
        ScanOutcome::Completed => panic!("scan must fail"),
    }
    assert!(harness.scan_dirs(scan_id).is_empty());
}

#[tokio::test]
async fn test_malformed_output_degrades_to_no_findings() {
    let runner = ScriptedRunner::new()
        .with(ToolKind::Sbom, Script::Exit(0, "FATAL db error".to_owned()))
        .with(ToolKind::StaticAnalysis, Script::Exit(0, String::new()));
    let harness = Harness::new(runner);
    let archive = harness.upload("project.zip");

    let (scan_id, outcome) = harness.run(&archive).await;
    assert!(outcome.is_completed());

    let results = harness.orchestrator.results(scan_id).unwrap();
    assert!(results.sbom_components.is_empty());
    assert_eq!(results.summary.dependencies, 0);
    assert!(
        results
            .vulnerabilities
            .iter()
            .all(|v| v.file_path.as_deref() != Some("src/db.js"))
    );
}

#[tokio::test]
async fn test_corrupt_archive_fails_and_cleans_up() {
    let harness = Harness::new(ScriptedRunner::new());
    let uploads = harness.work_dir.join("uploads");
    fs::create_dir_all(&uploads).unwrap();
    let archive = uploads.join("broken.zip");
    fs::write(&archive, b"PK but not really").unwrap();

    let (scan_id, outcome) = harness.run(&archive).await;
    match outcome {
        ScanOutcome::Failed { reason } => assert!(reason.contains("extraction")),
        ScanOutcome::Completed => panic!("scan must fail"),
    }
    assert!(harness.runner.called_kinds().is_empty());
    assert!(!archive.exists());
    assert_eq!(
        harness.orchestrator.status(scan_id).unwrap().progress,
        0
    );
}

#[tokio::test]
async fn test_secret_stage_can_be_disabled() {
    let harness = Harness::with_config(ScriptedRunner::new(), |b| b.secret_scan(false));
    let archive = harness.upload("project.zip");

    let (scan_id, outcome) = harness.run(&archive).await;
    assert!(outcome.is_completed());
    assert!(!harness.runner.called_kinds().contains(&ToolKind::Secret));

    let results = harness.orchestrator.results(scan_id).unwrap();
    assert!(
        results
            .vulnerabilities
            .iter()
            .all(|v| v.cwe.as_deref() != Some("CWE-798"))
    );
}

#[tokio::test]
async fn test_start_scan_progress_is_monotonic() {
    let harness = Harness::new(ScriptedRunner::new());
    let archive = harness.upload("project.zip");

    let scan_id = harness.orchestrator.start_scan(&archive, "project.zip");
    let status = harness.orchestrator.status(scan_id).unwrap();
    assert_eq!(status.filename, "project.zip");

    let observed = wait_for_terminal(&harness.orchestrator, scan_id).await;
    assert!(observed.windows(2).all(|w| w[0] <= w[1]), "{observed:?}");
    assert_eq!(observed.last(), Some(&100));
    assert_eq!(
        harness.orchestrator.status(scan_id).unwrap().status,
        ScanStatus::Completed
    );
}

#[tokio::test]
async fn test_concurrent_scans_are_isolated() {
    let harness = Harness::new(ScriptedRunner::new());
    let mut ids = Vec::new();
    for i in 0..3 {
        let archive = harness.upload(&format!("project-{i}.zip"));
        ids.push(harness.orchestrator.start_scan(&archive, &format!("project-{i}.zip")));
    }

    for id in &ids {
        wait_for_terminal(&harness.orchestrator, *id).await;
        let results = harness.orchestrator.results(*id).unwrap();
        assert_eq!(results.scan.status, ScanStatus::Completed);
        assert_eq!(results.sbom_components.len(), 1);
        assert_eq!(results.vulnerabilities.len(), 4);
        assert!(results.vulnerabilities.iter().all(|v| v.scan_id == *id));
    }
    assert_eq!(harness.orchestrator.store().scan_count(), 3);
}

#[tokio::test]
async fn test_shutdown_cancels_in_flight_scan() {
    let runner = ScriptedRunner::new().with(ToolKind::StaticAnalysis, Script::Hang);
    let harness = Harness::with_config(runner, |b| b.tool_timeout_secs(0));
    let archive = harness.upload("project.zip");

    let scan_id = harness.orchestrator.start_scan(&archive, "project.zip");
    // wait until the tools are running
    for _ in 0..500 {
        if harness.orchestrator.status(scan_id).unwrap().progress >= 25 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    tokio::time::timeout(Duration::from_secs(10), harness.orchestrator.shutdown())
        .await
        .expect("shutdown must not wait for hanging tools");

    let status = harness.orchestrator.status(scan_id).unwrap();
    assert_eq!(status.status, ScanStatus::Failed);
    assert_eq!(status.progress, 0);
    assert!(harness.scan_dirs(scan_id).is_empty());
    assert!(!archive.exists());
    assert_eq!(harness.orchestrator.in_flight(), 0);
}
