//! 스캔 저장소 -- 스캔, 취약점, SBOM 컴포넌트 레코드 보관
//!
//! [`ScanStore`]는 저장소 구현이 따라야 하는 인터페이스이고,
//! [`MemoryScanStore`]는 프로세스 내 메모리에 보관하는 기본 구현입니다.
//!
//! 저장소는 오케스트레이터와 조회 핸들러에 명시적으로 주입됩니다.
//! 전역 인스턴스는 없습니다.
//!
//! # 불변 조건
//! - 상태는 `uploading → scanning → completed | failed` 순서로만 전이합니다.
//! - `progress == 100`과 `completed_at.is_some()`은 `completed` 상태와 동치입니다.
//! - `scanning` 동안 진행률은 감소하지 않습니다.
//! - 종료된 스캔에는 엔티티를 추가할 수 없습니다.
//! - 엔티티 ID는 종류별 카운터로 1부터 할당되며 재사용되지 않습니다.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use crate::error::StoreError;
use crate::types::{
    NewSbomComponent, NewVulnerability, PROGRESS_COMPLETE, PROGRESS_CREATED, SbomComponent, Scan,
    ScanId, ScanResults, ScanStatus, ScanSummary, Vulnerability,
};

/// 스캔 저장소 인터페이스
///
/// 모든 연산은 동기식입니다. 여러 스캔 단계가 동시에 엔티티를 추가할 수 있으므로
/// 구현은 동시 쓰기에 안전해야 합니다.
pub trait ScanStore: Send + Sync + 'static {
    /// `uploading` 상태, 진행률 0으로 스캔 레코드를 생성합니다.
    fn create_scan(&self, filename: &str) -> Scan;

    /// 스캔 레코드를 조회합니다.
    fn get_scan(&self, id: ScanId) -> Option<Scan>;

    /// 상태와 진행률을 갱신합니다.
    ///
    /// `completed`로 전이하면 진행률은 100, 완료 시각은 현재 시각이 됩니다.
    /// `failed`로 전이하면 진행률은 0이 됩니다.
    fn update_scan_status(
        &self,
        id: ScanId,
        status: ScanStatus,
        progress: u8,
    ) -> Result<Scan, StoreError>;

    /// 스캔을 완료 처리합니다.
    fn complete_scan(&self, id: ScanId) -> Result<Scan, StoreError> {
        self.update_scan_status(id, ScanStatus::Completed, PROGRESS_COMPLETE)
    }

    /// 스캔을 실패 처리합니다.
    fn fail_scan(&self, id: ScanId) -> Result<Scan, StoreError> {
        self.update_scan_status(id, ScanStatus::Failed, PROGRESS_CREATED)
    }

    /// 취약점 레코드를 추가합니다.
    fn create_vulnerability(
        &self,
        scan_id: ScanId,
        vulnerability: NewVulnerability,
    ) -> Result<Vulnerability, StoreError>;

    /// SBOM 컴포넌트 레코드를 추가합니다.
    fn create_sbom_component(
        &self,
        scan_id: ScanId,
        component: NewSbomComponent,
    ) -> Result<SbomComponent, StoreError>;

    /// 여러 취약점을 추가하고 추가된 개수를 반환합니다.
    fn create_vulnerabilities(
        &self,
        scan_id: ScanId,
        vulnerabilities: Vec<NewVulnerability>,
    ) -> Result<usize, StoreError> {
        let count = vulnerabilities.len();
        for vulnerability in vulnerabilities {
            self.create_vulnerability(scan_id, vulnerability)?;
        }
        Ok(count)
    }

    /// 여러 SBOM 컴포넌트를 추가하고 추가된 개수를 반환합니다.
    fn create_sbom_components(
        &self,
        scan_id: ScanId,
        components: Vec<NewSbomComponent>,
    ) -> Result<usize, StoreError> {
        let count = components.len();
        for component in components {
            self.create_sbom_component(scan_id, component)?;
        }
        Ok(count)
    }

    /// 스캔에 속한 취약점을 ID 순서로 반환합니다.
    fn vulnerabilities_by_scan(&self, scan_id: ScanId) -> Vec<Vulnerability>;

    /// 스캔에 속한 SBOM 컴포넌트를 ID 순서로 반환합니다.
    fn sbom_components_by_scan(&self, scan_id: ScanId) -> Vec<SbomComponent>;

    /// 스캔, 요약, 엔티티 목록을 묶어 반환합니다. 요약은 매번 새로 계산합니다.
    fn get_scan_results(&self, id: ScanId) -> Option<ScanResults> {
        let scan = self.get_scan(id)?;
        let vulnerabilities = self.vulnerabilities_by_scan(id);
        let sbom_components = self.sbom_components_by_scan(id);
        let summary = ScanSummary::compute(&vulnerabilities, &sbom_components);
        Some(ScanResults {
            scan,
            summary,
            vulnerabilities,
            sbom_components,
        })
    }

    /// 저장된 스캔 수
    fn scan_count(&self) -> usize;
}

#[derive(Debug, Default)]
struct Inner {
    scans: BTreeMap<ScanId, Scan>,
    vulnerabilities: BTreeMap<u64, Vulnerability>,
    sbom_components: BTreeMap<u64, SbomComponent>,
    last_scan_id: u64,
    last_vulnerability_id: u64,
    last_component_id: u64,
}

impl Inner {
    /// 엔티티 추가가 가능한 스캔인지 확인합니다.
    fn ensure_open(&self, scan_id: ScanId) -> Result<(), StoreError> {
        let scan = self
            .scans
            .get(&scan_id)
            .ok_or(StoreError::ScanNotFound(scan_id))?;
        if scan.status.is_terminal() {
            return Err(StoreError::ScanFinalized {
                id: scan_id,
                status: scan.status,
            });
        }
        Ok(())
    }

    fn insert_vulnerability(&mut self, scan_id: ScanId, new: NewVulnerability) -> Vulnerability {
        self.last_vulnerability_id += 1;
        let record = Vulnerability::from_new(self.last_vulnerability_id, scan_id, new);
        self.vulnerabilities.insert(record.id, record.clone());
        record
    }

    fn insert_component(&mut self, scan_id: ScanId, new: NewSbomComponent) -> SbomComponent {
        self.last_component_id += 1;
        let record = SbomComponent::from_new(self.last_component_id, scan_id, new);
        self.sbom_components.insert(record.id, record.clone());
        record
    }
}

/// 메모리 기반 스캔 저장소
///
/// 내구성은 없습니다. 프로세스가 종료되면 모든 레코드가 사라집니다.
#[derive(Debug, Default)]
pub struct MemoryScanStore {
    inner: RwLock<Inner>,
}

impl MemoryScanStore {
    /// 빈 저장소를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    // 패닉한 작성자가 남긴 상태도 맵 자체는 일관되므로 그대로 사용합니다.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ScanStore for MemoryScanStore {
    fn create_scan(&self, filename: &str) -> Scan {
        let mut inner = self.write();
        inner.last_scan_id += 1;
        let scan = Scan {
            id: inner.last_scan_id,
            filename: filename.to_owned(),
            status: ScanStatus::Uploading,
            progress: PROGRESS_CREATED,
            created_at: Utc::now(),
            completed_at: None,
        };
        inner.scans.insert(scan.id, scan.clone());
        scan
    }

    fn get_scan(&self, id: ScanId) -> Option<Scan> {
        self.read().scans.get(&id).cloned()
    }

    fn update_scan_status(
        &self,
        id: ScanId,
        status: ScanStatus,
        progress: u8,
    ) -> Result<Scan, StoreError> {
        let mut inner = self.write();
        let scan = inner
            .scans
            .get_mut(&id)
            .ok_or(StoreError::ScanNotFound(id))?;

        let from = scan.status;
        let reject = |reason: &str| StoreError::InvalidTransition {
            id,
            from,
            to: status,
            reason: reason.to_owned(),
        };

        if !from.can_transition_to(status) {
            return Err(reject("transition not allowed"));
        }

        match status {
            ScanStatus::Scanning => {
                if progress >= PROGRESS_COMPLETE {
                    return Err(reject("progress 100 is reserved for completed scans"));
                }
                if progress < scan.progress {
                    return Err(reject("progress must not decrease"));
                }
                scan.progress = progress;
            }
            ScanStatus::Completed => {
                scan.progress = PROGRESS_COMPLETE;
                scan.completed_at = Some(Utc::now());
            }
            ScanStatus::Failed => {
                scan.progress = PROGRESS_CREATED;
                scan.completed_at = None;
            }
            ScanStatus::Uploading => {}
        }
        scan.status = status;
        Ok(scan.clone())
    }

    fn create_vulnerability(
        &self,
        scan_id: ScanId,
        vulnerability: NewVulnerability,
    ) -> Result<Vulnerability, StoreError> {
        let mut inner = self.write();
        inner.ensure_open(scan_id)?;
        Ok(inner.insert_vulnerability(scan_id, vulnerability))
    }

    fn create_sbom_component(
        &self,
        scan_id: ScanId,
        component: NewSbomComponent,
    ) -> Result<SbomComponent, StoreError> {
        let mut inner = self.write();
        inner.ensure_open(scan_id)?;
        Ok(inner.insert_component(scan_id, component))
    }

    // 배치 추가는 하나의 쓰기 잠금 안에서 수행되어 부분 적용이 없습니다.
    fn create_vulnerabilities(
        &self,
        scan_id: ScanId,
        vulnerabilities: Vec<NewVulnerability>,
    ) -> Result<usize, StoreError> {
        let mut inner = self.write();
        inner.ensure_open(scan_id)?;
        let count = vulnerabilities.len();
        for vulnerability in vulnerabilities {
            inner.insert_vulnerability(scan_id, vulnerability);
        }
        Ok(count)
    }

    fn create_sbom_components(
        &self,
        scan_id: ScanId,
        components: Vec<NewSbomComponent>,
    ) -> Result<usize, StoreError> {
        let mut inner = self.write();
        inner.ensure_open(scan_id)?;
        let count = components.len();
        for component in components {
            inner.insert_component(scan_id, component);
        }
        Ok(count)
    }

    fn vulnerabilities_by_scan(&self, scan_id: ScanId) -> Vec<Vulnerability> {
        self.read()
            .vulnerabilities
            .values()
            .filter(|v| v.scan_id == scan_id)
            .cloned()
            .collect()
    }

    fn sbom_components_by_scan(&self, scan_id: ScanId) -> Vec<SbomComponent> {
        self.read()
            .sbom_components
            .values()
            .filter(|c| c.scan_id == scan_id)
            .cloned()
            .collect()
    }

    fn get_scan_results(&self, id: ScanId) -> Option<ScanResults> {
        // 하나의 읽기 잠금으로 스캔과 엔티티를 같은 시점에서 읽습니다.
        let inner = self.read();
        let scan = inner.scans.get(&id)?.clone();
        let vulnerabilities: Vec<Vulnerability> = inner
            .vulnerabilities
            .values()
            .filter(|v| v.scan_id == id)
            .cloned()
            .collect();
        let sbom_components: Vec<SbomComponent> = inner
            .sbom_components
            .values()
            .filter(|c| c.scan_id == id)
            .cloned()
            .collect();
        let summary = ScanSummary::compute(&vulnerabilities, &sbom_components);
        Some(ScanResults {
            scan,
            summary,
            vulnerabilities,
            sbom_components,
        })
    }

    fn scan_count(&self) -> usize {
        self.read().scans.len()
    }
}
