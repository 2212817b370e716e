//! 아카이브 압축 해제
//!
//! [`ArchiveExtractor`]는 업로드된 ZIP 아카이브를 대상 디렉토리에 풀어 놓습니다.
//! 비즈니스 로직은 없고 파일시스템 작업만 수행합니다.
//!
//! # 보안 제한
//!
//! - 대상 디렉토리 밖을 가리키는 엔트리(`../`, 절대 경로)는 건너뜁니다 (Zip Slip 방지).
//! - 엔트리 수가 `max_entries`를 넘으면 실패합니다.
//! - 압축 해제 크기가 `max_entry_size`를 넘는 엔트리가 있으면 실패합니다 (zip bomb 방지).
//! - 기록한 총량이 `max_total_size`를 넘으면 실패합니다.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::ScanEngineConfig;
use crate::error::ScanEngineError;

/// 압축 해제 결과 통계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionSummary {
    /// 생성된 파일 수
    pub files: usize,
    /// 생성된 디렉토리 수
    pub directories: usize,
    /// 기록한 총 바이트 수
    pub bytes: u64,
    /// 안전하지 않은 경로로 건너뛴 엔트리 수
    pub skipped: usize,
}

/// ZIP 아카이브 압축 해제기
#[derive(Debug, Clone)]
pub struct ArchiveExtractor {
    max_entries: usize,
    max_entry_size: u64,
    max_total_size: u64,
}

impl ArchiveExtractor {
    /// 제한값을 지정하여 생성합니다.
    pub fn new(max_entries: usize, max_entry_size: u64, max_total_size: u64) -> Self {
        Self {
            max_entries,
            max_entry_size,
            max_total_size,
        }
    }

    /// 엔진 설정의 제한값으로 생성합니다.
    pub fn from_config(config: &ScanEngineConfig) -> Self {
        Self::new(
            config.max_archive_entries,
            config.max_entry_size,
            config.max_total_size,
        )
    }

    /// 아카이브를 `dest`에 풉니다. `dest`가 없으면 생성합니다.
    ///
    /// 블로킹 I/O는 `spawn_blocking`에서 수행합니다.
    pub async fn extract(
        &self,
        archive: &Path,
        dest: &Path,
    ) -> Result<ExtractionSummary, ScanEngineError> {
        let extractor = self.clone();
        let archive = archive.to_path_buf();
        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || extractor.extract_blocking(&archive, &dest))
            .await
            .map_err(|e| ScanEngineError::Task(format!("spawn_blocking failed: {e}")))?
    }

    /// 동기식 압축 해제
    ///
    /// `tokio::task::spawn_blocking` 내에서 호출되어야 합니다.
    pub fn extract_blocking(
        &self,
        archive: &Path,
        dest: &Path,
    ) -> Result<ExtractionSummary, ScanEngineError> {
        let archive_display = archive.display().to_string();
        let fail = |reason: String| ScanEngineError::Extraction {
            path: archive_display.clone(),
            reason,
        };

        let file = fs::File::open(archive).map_err(|e| fail(format!("cannot open archive: {e}")))?;
        let mut zip = zip::ZipArchive::new(file).map_err(|e| fail(e.to_string()))?;

        if zip.len() > self.max_entries {
            return Err(fail(format!(
                "too many entries: {} (max: {})",
                zip.len(),
                self.max_entries
            )));
        }

        fs::create_dir_all(dest).map_err(|e| io_error(dest, e))?;

        let mut summary = ExtractionSummary::default();
        for index in 0..zip.len() {
            let mut entry = zip.by_index(index).map_err(|e| fail(e.to_string()))?;

            let Some(relative) = entry.enclosed_name() else {
                warn!(
                    archive = %archive_display,
                    entry = entry.name(),
                    "skipping archive entry outside the extraction root"
                );
                summary.skipped += 1;
                continue;
            };
            let out_path: PathBuf = dest.join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&out_path).map_err(|e| io_error(&out_path, e))?;
                summary.directories += 1;
                continue;
            }

            if entry.size() > self.max_entry_size {
                return Err(fail(format!(
                    "entry '{}' too large: {} bytes (max: {})",
                    entry.name(),
                    entry.size(),
                    self.max_entry_size
                )));
            }

            let remaining = self.max_total_size.saturating_sub(summary.bytes);
            let total_exceeded = || {
                fail(format!(
                    "archive exceeds {} bytes when decompressed",
                    self.max_total_size
                ))
            };
            if entry.size() > remaining {
                return Err(total_exceeded());
            }

            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
            }

            let mut out_file = fs::File::create(&out_path).map_err(|e| io_error(&out_path, e))?;
            // 선언된 크기를 믿지 않고 실제 기록량도 제한합니다.
            let limit = self.max_entry_size.min(remaining);
            let mut limited = (&mut entry).take(limit.saturating_add(1));
            let written = copy_entry(&mut limited, &mut out_file)
                .map_err(|e| fail(format!("failed to extract '{}': {e}", out_path.display())))?;
            if written > self.max_entry_size {
                return Err(fail(format!(
                    "entry '{}' exceeds {} bytes when decompressed",
                    out_path.display(),
                    self.max_entry_size
                )));
            }
            if written > remaining {
                return Err(total_exceeded());
            }

            summary.files += 1;
            summary.bytes = summary.bytes.saturating_add(written);
        }

        debug!(
            archive = %archive_display,
            files = summary.files,
            directories = summary.directories,
            bytes = summary.bytes,
            skipped = summary.skipped,
            "archive extracted"
        );
        Ok(summary)
    }
}

fn copy_entry(reader: &mut impl Read, writer: &mut impl Write) -> std::io::Result<u64> {
    let written = std::io::copy(reader, writer)?;
    writer.flush()?;
    Ok(written)
}

fn io_error(path: &Path, source: std::io::Error) -> ScanEngineError {
    ScanEngineError::Io {
        path: path.display().to_string(),
        source,
    }
}
