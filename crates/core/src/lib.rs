//! # codewarden-core
//!
//! Codewarden의 공통 기반 크레이트입니다.
//! 모든 크레이트가 공유하는 도메인 타입, 에러, 설정, 메트릭 이름,
//! 그리고 스캔 저장소를 정의합니다.
//!
//! # 모듈 구조
//!
//! - [`types`]: 도메인 타입 (`Scan`, `Vulnerability`, `SbomComponent`, `ScanSummary`, `ScanResults`)
//! - [`store`]: 스캔 저장소 (`ScanStore` trait, `MemoryScanStore`)
//! - [`error`]: 에러 계층 (`CodewardenError`, `StoreError`, `ConfigError`, `ScanError`)
//! - [`config`]: `codewarden.toml` 파싱과 환경변수 오버라이드 (`CodewardenConfig`)
//! - [`metrics`]: 메트릭 이름 상수
//!
//! # 의존 방향
//!
//! ```text
//! codewarden-cli ──> codewarden-scan-engine ──> codewarden-core
//!        └──────────────────────────────────────────┘
//! ```
//!
//! 다른 크레이트는 서로를 직접 참조하지 않고 이 크레이트의 타입으로만 통신합니다.

pub mod config;
pub mod error;
pub mod metrics;
pub mod store;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{CodewardenError, ConfigError, ScanError, StoreError};

// 설정
pub use config::{CodewardenConfig, GeneralConfig, ScannerConfig};

// 저장소
pub use store::{MemoryScanStore, ScanStore};

// 도메인 타입
pub use types::{
    ComponentType, FindingType, NewSbomComponent, NewVulnerability, SbomComponent, Scan, ScanId,
    ScanReport, ScanResults, ScanStatus, ScanStatusView, ScanSummary, Severity, Vulnerability,
};
