//! 스캔 오케스트레이터 -- 스캔 한 건의 전체 흐름 관리
//!
//! [`ScanOrchestrator`]는 압축 해제, 도구 실행, 정규화, 저장을 순서대로 조율하고
//! 스캔 상태와 진행률을 저장소에 기록합니다.
//!
//! # 상태와 진행률
//!
//! ```text
//! uploading(0) ──> scanning(10) ──extract──> scanning(25) ──stages──> scanning(90) ──> completed(100)
//!      │                │                         │                        │
//!      └────────────────┴─────────────────────────┴────────────────────────┴──> failed(0)
//! ```
//!
//! # 단계 실행
//!
//! 도구+정규화 단계(SBOM, 취약점, 정적 분석, 시크릿)는 `JoinSet`에서 동시에 실행됩니다.
//! 한 단계라도 실패하면 나머지 단계를 즉시 중단(`abort_all`)하고 스캔을 실패로 기록합니다.
//! 중단된 단계의 자식 프로세스는 `kill_on_drop`으로 종료됩니다.
//!
//! # 정리
//!
//! [`ScanWorkspace`]가 압축 해제 디렉토리와 원본 아카이브를 소유하며,
//! 스캔이 어떤 경로로 끝나든 상태를 종료 상태로 기록하기 전에 둘 다 삭제합니다.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use codewarden_core::metrics as m;
use codewarden_core::store::ScanStore;
use codewarden_core::types::{ScanId, ScanResults, ScanStatus, ScanStatusView};

use crate::config::ScanEngineConfig;
use crate::error::ScanEngineError;
use crate::extract::ArchiveExtractor;
use crate::normalize::{Normalized, normalize_lenient};
use crate::tool::{ToolAdapter, ToolKind, ToolRunner, ToolSpec};

/// `scanning` 전이 직후 진행률
pub const PROGRESS_SCANNING: u8 = 10;

/// 압축 해제 완료 후 진행률
pub const PROGRESS_EXTRACTED: u8 = 25;

/// 모든 단계 완료 후 진행률
pub const PROGRESS_ANALYZED: u8 = 90;

/// 스캔 한 건의 최종 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// 모든 단계 성공, 상태 `completed`
    Completed,
    /// 상태 `failed`
    Failed {
        /// 실패 사유
        reason: String,
    },
}

impl ScanOutcome {
    /// 완료 여부
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// 스캔별 임시 파일 소유자
///
/// 압축 해제 디렉토리와 업로드된 아카이브를 삭제합니다.
/// 삭제 실패는 로그만 남기고 전파하지 않습니다.
/// [`release`](Self::release)를 호출하지 않고 drop되면 동기식으로 정리합니다.
#[derive(Debug)]
pub struct ScanWorkspace {
    scan_id: ScanId,
    root: Option<PathBuf>,
    archive: PathBuf,
    released: bool,
}

impl ScanWorkspace {
    /// 아카이브 `archive`를 소유하는 가드를 만듭니다. 압축 해제 루트는 아직 없습니다.
    pub fn new(scan_id: ScanId, archive: PathBuf) -> Self {
        Self {
            scan_id,
            root: None,
            archive,
            released: false,
        }
    }

    /// `work_dir` 아래에 이 스캔 전용 압축 해제 디렉토리를 새로 만듭니다.
    ///
    /// 디렉토리 이름은 `scan_<id>_<무작위 접미사>`입니다. 저장소 id는 프로세스마다
    /// 1부터 시작하므로, 다른 실행이 남긴 디렉토리를 재사용하지 않도록 항상 비어 있는
    /// 새 디렉토리를 원자적으로 생성합니다.
    pub fn create_root(&mut self, work_dir: &Path) -> Result<&Path, ScanEngineError> {
        let io_error = |source| ScanEngineError::Io {
            path: work_dir.display().to_string(),
            source,
        };
        std::fs::create_dir_all(work_dir).map_err(io_error)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("scan_{}_", self.scan_id))
            .tempdir_in(work_dir)
            .map_err(io_error)?;
        let root = dir.keep();
        debug!(scan_id = self.scan_id, path = %root.display(), "extraction directory created");
        Ok(self.root.insert(root).as_path())
    }

    /// 압축 해제 루트 ([`create_root`](Self::create_root) 이전에는 `None`)
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// 업로드된 아카이브
    pub fn archive(&self) -> &Path {
        &self.archive
    }

    /// 블로킹 풀에서 임시 파일을 삭제합니다.
    pub async fn release(mut self) {
        self.released = true;
        let scan_id = self.scan_id;
        let root = self.root.take();
        let archive = std::mem::take(&mut self.archive);
        if let Err(e) = tokio::task::spawn_blocking(move || {
            remove_artifacts(scan_id, root.as_deref(), &archive)
        })
        .await
        {
            error!(scan_id, error = %e, "cleanup task failed");
        }
    }
}

impl Drop for ScanWorkspace {
    fn drop(&mut self) {
        if !self.released {
            remove_artifacts(self.scan_id, self.root.as_deref(), &self.archive);
        }
    }
}

fn remove_artifacts(scan_id: ScanId, root: Option<&Path>, archive: &Path) {
    if let Some(root) = root {
        match std::fs::remove_dir_all(root) {
            Ok(()) => debug!(scan_id, path = %root.display(), "extraction directory removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                scan_id,
                path = %root.display(),
                error = %e,
                "failed to remove extraction directory"
            ),
        }
    }
    match std::fs::remove_file(archive) {
        Ok(()) => debug!(scan_id, path = %archive.display(), "archive removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            scan_id,
            path = %archive.display(),
            error = %e,
            "failed to remove archive"
        ),
    }
}

struct Shared<R, S> {
    config: ScanEngineConfig,
    runner: Arc<R>,
    store: Arc<S>,
    extractor: ArchiveExtractor,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

/// 스캔 오케스트레이터
///
/// 저장소와 도구 실행기는 주입받습니다. 복제 비용이 낮으며
/// 모든 복제본이 같은 저장소와 종료 토큰을 공유합니다.
pub struct ScanOrchestrator<R, S> {
    shared: Arc<Shared<R, S>>,
}

impl<R, S> Clone for ScanOrchestrator<R, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R: ToolRunner, S: ScanStore> ScanOrchestrator<R, S> {
    /// 엔진 설정
    pub fn config(&self) -> &ScanEngineConfig {
        &self.shared.config
    }

    /// 주입된 저장소
    pub fn store(&self) -> &Arc<S> {
        &self.shared.store
    }

    /// 스캔 레코드를 만들고 백그라운드에서 스캔을 시작합니다.
    ///
    /// 레코드는 반환 전에 `uploading` 상태로 생성됩니다. 호출자는 완료를 기다리지 않고
    /// [`status`](Self::status)로 진행 상황을 조회합니다.
    pub fn start_scan(&self, archive: impl Into<PathBuf>, filename: &str) -> ScanId {
        let scan = self.shared.store.create_scan(filename);
        let archive = archive.into();
        info!(scan_id = scan.id, filename, archive = %archive.display(), "scan created");

        let orchestrator = self.clone();
        self.shared.tracker.spawn(async move {
            orchestrator.run_scan(scan.id, archive).await;
        });
        scan.id
    }

    /// 이미 생성된 스캔을 끝까지 실행하고 결과를 반환합니다.
    ///
    /// 어떤 경로로 끝나든 작업 디렉토리와 아카이브를 삭제한 뒤
    /// 상태를 `completed` 또는 `failed`로 기록합니다.
    pub async fn run_scan(&self, scan_id: ScanId, archive: impl Into<PathBuf>) -> ScanOutcome {
        let started = Instant::now();
        counter!(m::SCANS_STARTED_TOTAL).increment(1);

        let mut workspace = ScanWorkspace::new(scan_id, archive.into());

        let result = tokio::select! {
            biased;
            _ = self.shared.shutdown.cancelled() => {
                Err(ScanEngineError::Cancelled("orchestrator is shutting down".to_owned()))
            }
            result = self.execute(scan_id, &mut workspace) => result,
        };

        workspace.release().await;

        let outcome = match result.and_then(|()| self.complete(scan_id)) {
            Ok(()) => {
                counter!(m::SCANS_COMPLETED_TOTAL).increment(1);
                info!(
                    scan_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "scan completed"
                );
                ScanOutcome::Completed
            }
            Err(e) => self.fail(scan_id, &e),
        };
        histogram!(m::SCAN_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        outcome
    }

    /// 스캔 상태를 조회합니다.
    pub fn status(&self, scan_id: ScanId) -> Option<ScanStatusView> {
        self.shared
            .store
            .get_scan(scan_id)
            .map(|scan| ScanStatusView::from(&scan))
    }

    /// 스캔 결과를 조회합니다.
    ///
    /// 상태와 무관하게 저장된 내용을 반환합니다. `completed`가 아닌 스캔의 결과를
    /// 거부하는 것은 호출자의 책임입니다.
    pub fn results(&self, scan_id: ScanId) -> Option<ScanResults> {
        self.shared.store.get_scan_results(scan_id)
    }

    /// 진행 중인 모든 스캔을 취소하고 끝날 때까지 기다립니다.
    ///
    /// 취소된 스캔은 `failed`로 기록되고 임시 파일이 정리됩니다.
    pub async fn shutdown(&self) {
        info!(in_flight = self.shared.tracker.len(), "shutting down scan orchestrator");
        self.shared.shutdown.cancel();
        self.shared.tracker.close();
        self.shared.tracker.wait().await;
    }

    /// 실행 중인 스캔 태스크 수
    pub fn in_flight(&self) -> usize {
        self.shared.tracker.len()
    }

    async fn execute(
        &self,
        scan_id: ScanId,
        workspace: &mut ScanWorkspace,
    ) -> Result<(), ScanEngineError> {
        let store = &self.shared.store;

        store.update_scan_status(scan_id, ScanStatus::Scanning, PROGRESS_SCANNING)?;
        info!(scan_id, progress = PROGRESS_SCANNING, "scan started");

        let root = workspace
            .create_root(&self.shared.config.work_dir)?
            .to_path_buf();
        let summary = self
            .shared
            .extractor
            .extract(workspace.archive(), &root)
            .await?;
        store.update_scan_status(scan_id, ScanStatus::Scanning, PROGRESS_EXTRACTED)?;
        info!(
            scan_id,
            files = summary.files,
            bytes = summary.bytes,
            skipped = summary.skipped,
            progress = PROGRESS_EXTRACTED,
            "archive extracted"
        );

        self.run_stages(scan_id, &root).await?;
        store.update_scan_status(scan_id, ScanStatus::Scanning, PROGRESS_ANALYZED)?;
        info!(scan_id, progress = PROGRESS_ANALYZED, "all stages finished");
        Ok(())
    }

    /// 활성화된 단계를 동시에 실행합니다. 첫 실패에서 나머지를 중단합니다.
    async fn run_stages(&self, scan_id: ScanId, root: &Path) -> Result<(), ScanEngineError> {
        let mut stages = JoinSet::new();
        for kind in self.enabled_stages() {
            let adapter = ToolAdapter::new(
                ToolSpec::for_kind(kind, &self.shared.config),
                Arc::clone(&self.shared.runner),
                self.shared.config.tool_timeout(),
            );
            let store = Arc::clone(&self.shared.store);
            let root = root.to_path_buf();
            stages.spawn(run_stage(scan_id, adapter, store, root));
        }

        while let Some(joined) = stages.join_next().await {
            let result = joined
                .map_err(|e| ScanEngineError::Task(format!("stage task failed: {e}")))
                .and_then(|stage| stage);
            if let Err(e) = result {
                warn!(
                    scan_id,
                    error = %e,
                    remaining = stages.len(),
                    "stage failed, aborting remaining stages"
                );
                stages.abort_all();
                return Err(e);
            }
        }
        Ok(())
    }

    fn enabled_stages(&self) -> Vec<ToolKind> {
        ToolKind::ALL
            .into_iter()
            .filter(|kind| *kind != ToolKind::Secret || self.shared.config.secret_scan)
            .collect()
    }

    fn complete(&self, scan_id: ScanId) -> Result<(), ScanEngineError> {
        self.shared.store.complete_scan(scan_id)?;
        Ok(())
    }

    fn fail(&self, scan_id: ScanId, err: &ScanEngineError) -> ScanOutcome {
        counter!(m::SCANS_FAILED_TOTAL).increment(1);
        error!(scan_id, error = %err, "scan failed");
        if let Err(e) = self.shared.store.fail_scan(scan_id) {
            error!(scan_id, error = %e, "failed to record scan failure");
        }
        ScanOutcome::Failed {
            reason: err.to_string(),
        }
    }
}

/// 도구 하나를 실행하고 결과를 정규화해 저장합니다.
async fn run_stage<R: ToolRunner, S: ScanStore>(
    scan_id: ScanId,
    adapter: ToolAdapter<R>,
    store: Arc<S>,
    root: PathBuf,
) -> Result<(), ScanEngineError> {
    let kind = adapter.kind();
    let output = adapter.run(Some(&root)).await?;

    let raw = output.stdout_text();
    let normalized = tokio::task::spawn_blocking(move || normalize_lenient(kind, &raw, &root))
        .await
        .map_err(|e| ScanEngineError::Task(format!("spawn_blocking failed: {e}")))?;

    let stored = match normalized {
        Normalized::Components(components) => {
            let count = store.create_sbom_components(scan_id, components)?;
            counter!(m::SBOM_COMPONENTS_TOTAL).increment(count as u64);
            count
        }
        Normalized::Findings(findings) => {
            for finding in &findings {
                counter!(m::FINDINGS_TOTAL, m::LABEL_FINDING_TYPE => finding.finding_type.as_str())
                    .increment(1);
            }
            store.create_vulnerabilities(scan_id, findings)?
        }
    };

    info!(scan_id, tool = %kind, stored, "stage finished");
    Ok(())
}

/// [`ScanOrchestrator`] 빌더
///
/// 설정은 빌드 시 검증됩니다. 도구 실행기와 저장소는 필수입니다.
pub struct ScanOrchestratorBuilder<R, S> {
    config: ScanEngineConfig,
    runner: Option<Arc<R>>,
    store: Option<Arc<S>>,
    shutdown: Option<CancellationToken>,
}

impl<R: ToolRunner, S: ScanStore> ScanOrchestratorBuilder<R, S> {
    /// 기본 설정을 가진 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: ScanEngineConfig::default(),
            runner: None,
            store: None,
            shutdown: None,
        }
    }

    /// 엔진 설정을 지정합니다.
    pub fn config(mut self, config: ScanEngineConfig) -> Self {
        self.config = config;
        self
    }

    /// 도구 실행기를 지정합니다.
    pub fn runner(mut self, runner: Arc<R>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// 저장소를 지정합니다.
    pub fn store(mut self, store: Arc<S>) -> Self {
        self.store = Some(store);
        self
    }

    /// 외부 종료 토큰을 연결합니다.
    ///
    /// 지정하지 않으면 새 토큰을 생성합니다. 지정한 토큰이 취소되면
    /// [`ScanOrchestrator::shutdown`]과 같이 진행 중인 스캔이 취소됩니다.
    pub fn shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// 오케스트레이터를 빌드합니다.
    ///
    /// # Errors
    ///
    /// 설정 검증 실패, 실행기나 저장소 누락 시 `ScanEngineError::Config`
    pub fn build(self) -> Result<ScanOrchestrator<R, S>, ScanEngineError> {
        self.config.validate()?;
        let runner = self.runner.ok_or_else(|| ScanEngineError::Config {
            field: "runner".to_owned(),
            reason: "tool runner is required".to_owned(),
        })?;
        let store = self.store.ok_or_else(|| ScanEngineError::Config {
            field: "store".to_owned(),
            reason: "scan store is required".to_owned(),
        })?;

        let extractor = ArchiveExtractor::from_config(&self.config);
        Ok(ScanOrchestrator {
            shared: Arc::new(Shared {
                config: self.config,
                runner,
                store,
                extractor,
                shutdown: self.shutdown.unwrap_or_default(),
                tracker: TaskTracker::new(),
            }),
        })
    }
}

impl<R: ToolRunner, S: ScanStore> Default for ScanOrchestratorBuilder<R, S> {
    fn default() -> Self {
        Self::new()
    }
}
