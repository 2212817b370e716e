//! # codewarden-scan-engine
//!
//! 업로드된 소스 아카이브를 외부 보안 스캐너(trivy, semgrep)로 분석하고
//! 결과를 공통 취약점/SBOM 모델로 정규화하는 스캔 엔진입니다.
//!
//! # Module Structure
//!
//! - [`error`]: 도메인 에러 타입 (`ScanEngineError`)
//! - [`config`]: 엔진 설정 (`ScanEngineConfig`, 빌더)
//! - [`extract`]: ZIP 압축 해제 (`ArchiveExtractor`)
//! - [`tool`]: 도구 실행 (`ToolRunner` trait, `ProcessToolRunner`, `ToolSpec`, `ToolAdapter`)
//! - [`normalize`]: 도구 출력 정규화 (trivy, semgrep, 생태계 이름, 코드 스니펫)
//! - [`orchestrator`]: 스캔 오케스트레이터 (`ScanOrchestrator`, `ScanOrchestratorBuilder`)
//!
//! # Architecture
//!
//! ```text
//! start_scan(archive, filename)
//!        │
//!        ▼
//!  ArchiveExtractor ──> <work_dir>/scan_<id>_<random>/
//!        │
//!        ├──────────────┬──────────────────┬───────────────────┐   (JoinSet)
//!        ▼              ▼                  ▼                   ▼
//!   trivy (sbom)   trivy (vuln)    semgrep (sast)     trivy (secret)
//!        │              │                  │                   │
//!   parse_sbom   parse_vulnerabilities  parse_findings    parse_secrets
//!        │              │                  │ + snippet         │
//!        └──────────────┴────────┬─────────┴───────────────────┘
//!                                ▼
//!                           ScanStore  ──> status() / results()
//! ```
//!
//! # 사용 예시
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use codewarden_core::MemoryScanStore;
//! use codewarden_scan_engine::{ProcessToolRunner, ScanEngineConfig, ScanOrchestratorBuilder};
//!
//! # async fn example() -> Result<(), codewarden_scan_engine::ScanEngineError> {
//! let orchestrator = ScanOrchestratorBuilder::new()
//!     .config(ScanEngineConfig::default())
//!     .runner(Arc::new(ProcessToolRunner::new()))
//!     .store(Arc::new(MemoryScanStore::new()))
//!     .build()?;
//!
//! let scan_id = orchestrator.start_scan("/var/tmp/codewarden/uploads/app.zip", "app.zip");
//! let status = orchestrator.status(scan_id);
//! # let _ = status;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod orchestrator;
pub mod tool;

// --- Public API Re-exports ---

// Orchestrator
pub use orchestrator::{
    PROGRESS_ANALYZED, PROGRESS_EXTRACTED, PROGRESS_SCANNING, ScanOrchestrator,
    ScanOrchestratorBuilder, ScanOutcome, ScanWorkspace,
};

// Configuration
pub use config::{ScanEngineConfig, ScanEngineConfigBuilder};

// Error
pub use error::ScanEngineError;

// Extraction
pub use extract::{ArchiveExtractor, ExtractionSummary};

// Tools
pub use tool::{ProcessToolRunner, ToolAdapter, ToolKind, ToolOutput, ToolRunner, ToolSpec};

// Normalization
pub use normalize::{Normalized, canonical_ecosystem, normalize, normalize_lenient};
