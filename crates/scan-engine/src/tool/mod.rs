//! 외부 스캐너 실행
//!
//! 각 스캐너는 별도 코드가 아니라 [`ToolSpec`] 설정(실행 파일, 인자, 허용 종료 코드)으로 표현되고,
//! 실제 프로세스 실행은 [`ToolRunner`] trait 하나로 추상화됩니다.
//!
//! ```text
//!   ToolSpec (kind, program, args, accepted exit codes)
//!        │
//!        ▼
//!   ToolAdapter ── timeout, exit-code policy, metrics
//!        │
//!        ▼
//!   ToolRunner (trait)
//!     │        │
//!     ▼        ▼
//!  Process   test doubles
//! ```

pub mod process;

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use metrics::counter;
use tracing::{debug, info, warn};

use codewarden_core::metrics as m;

use crate::config::ScanEngineConfig;
use crate::error::ScanEngineError;

pub use process::ProcessToolRunner;

/// 에러 메시지에 담는 stderr 최대 길이 (바이트)
const MAX_STDERR_LEN: usize = 4096;

/// 스캐너 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    /// 패키지 목록 (SBOM)
    Sbom,
    /// 의존성 취약점
    Vulnerability,
    /// 소스 코드 정적 분석
    StaticAnalysis,
    /// 하드코딩된 시크릿 탐지
    Secret,
}

impl ToolKind {
    /// 모든 역할 (실행 순서와 무관)
    pub const ALL: [ToolKind; 4] = [
        ToolKind::Sbom,
        ToolKind::Vulnerability,
        ToolKind::StaticAnalysis,
        ToolKind::Secret,
    ];

    /// 로그와 메트릭 레이블에 쓰는 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sbom => "sbom",
            Self::Vulnerability => "vulnerability",
            Self::StaticAnalysis => "static_analysis",
            Self::Secret => "secret",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 프로세스 실행 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// 종료 코드 (시그널로 종료되면 `None`)
    pub exit_code: Option<i32>,
    /// 표준 출력
    pub stdout: Bytes,
    /// 표준 에러
    pub stderr: Bytes,
}

impl ToolOutput {
    /// 표준 출력을 UTF-8 텍스트로 변환합니다 (잘못된 바이트는 대체 문자).
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// 표준 에러를 UTF-8 텍스트로 변환합니다.
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// 외부 프로그램 실행 인터페이스
///
/// 실행 파일이 없거나 실행할 수 없으면 `ScanEngineError::ToolExecution`
/// (`exit_code: None`)을 반환해야 합니다. 0이 아닌 종료 코드는 에러가 아니며,
/// 허용 여부는 [`ToolAdapter`]가 판단합니다.
///
/// 반환된 future가 drop되면 자식 프로세스도 종료되어야 합니다.
pub trait ToolRunner: Send + Sync + 'static {
    /// 프로그램을 실행하고 종료 코드와 출력을 수집합니다.
    fn run(
        &self,
        program: &str,
        args: &[String],
    ) -> impl Future<Output = Result<ToolOutput, ScanEngineError>> + Send;
}

/// 스캐너 호출 명세
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    /// 역할
    pub kind: ToolKind,
    /// 실행 파일
    pub program: String,
    /// 고정 인자 (스캔 대상 경로는 마지막에 추가됨)
    pub args: Vec<String>,
    /// 성공으로 간주하는 종료 코드
    pub accepted_exit_codes: Vec<i32>,
}

/// semgrep 레지스트리에서 규칙을 자동 선택하는 설정 값
pub const SEMGREP_AUTO_CONFIG: &str = "auto";

impl ToolSpec {
    /// 역할에 맞는 기본 호출 명세를 만듭니다.
    ///
    /// semgrep은 발견 항목이 있을 때 1, 부분 오류가 있을 때 2로 종료하므로
    /// `{0, 1, 2}`를 허용합니다. trivy는 `{0}`만 허용합니다.
    pub fn for_kind(kind: ToolKind, config: &ScanEngineConfig) -> Self {
        let trivy = |extra: &[&str]| {
            let mut args = vec!["fs", "--format", "json"];
            args.extend_from_slice(extra);
            args.push("--quiet");
            Self {
                kind,
                program: config.trivy_path.clone(),
                args: args.into_iter().map(str::to_owned).collect(),
                accepted_exit_codes: vec![0],
            }
        };

        match kind {
            ToolKind::Sbom => trivy(&["--list-all-pkgs"]),
            ToolKind::Vulnerability => trivy(&["--scanners", "vuln"]),
            ToolKind::Secret => trivy(&["--scanners", "secret"]),
            ToolKind::StaticAnalysis => {
                let mut args = vec!["scan", "--json", "--quiet"];
                // semgrep은 metrics가 꺼져 있으면 `auto` 설정을 만들지 못하고 2로 종료합니다.
                if config.semgrep_config != SEMGREP_AUTO_CONFIG {
                    args.push("--metrics=off");
                }
                args.extend_from_slice(&["--config", config.semgrep_config.as_str()]);
                Self {
                    kind,
                    program: config.semgrep_path.clone(),
                    args: args.into_iter().map(str::to_owned).collect(),
                    accepted_exit_codes: vec![0, 1, 2],
                }
            }
        }
    }

    /// `--version` 호출로 실행 가능 여부를 확인하는 명세
    pub fn version_probe(kind: ToolKind, config: &ScanEngineConfig) -> Self {
        let program = match kind {
            ToolKind::StaticAnalysis => config.semgrep_path.clone(),
            _ => config.trivy_path.clone(),
        };
        Self {
            kind,
            program,
            args: vec!["--version".to_owned()],
            accepted_exit_codes: vec![0],
        }
    }

    /// 종료 코드가 허용 집합에 있는지 확인합니다. 시그널 종료는 항상 거부됩니다.
    pub fn accepts(&self, exit_code: Option<i32>) -> bool {
        exit_code.is_some_and(|code| self.accepted_exit_codes.contains(&code))
    }

    /// 스캔 대상 경로를 덧붙인 전체 인자
    pub fn command_args(&self, root: Option<&Path>) -> Vec<String> {
        let mut args = self.args.clone();
        if let Some(root) = root {
            args.push(root.to_string_lossy().into_owned());
        }
        args
    }
}

/// 하나의 스캐너를 실행하는 어댑터
///
/// 제한 시간과 종료 코드 정책을 적용합니다. 저장소에는 접근하지 않습니다.
pub struct ToolAdapter<R> {
    spec: ToolSpec,
    runner: Arc<R>,
    timeout: Option<Duration>,
}

impl<R: ToolRunner> ToolAdapter<R> {
    /// 어댑터를 생성합니다. `timeout`이 `None`이면 무제한입니다.
    pub fn new(spec: ToolSpec, runner: Arc<R>, timeout: Option<Duration>) -> Self {
        Self {
            spec,
            runner,
            timeout,
        }
    }

    /// 역할
    pub fn kind(&self) -> ToolKind {
        self.spec.kind
    }

    /// 호출 명세
    pub fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    /// `root`를 대상으로 스캐너를 실행합니다.
    ///
    /// 허용된 종료 코드일 때만 출력을 반환합니다.
    pub async fn run(&self, root: Option<&Path>) -> Result<ToolOutput, ScanEngineError> {
        let kind = self.spec.kind;
        let args = self.spec.command_args(root);
        info!(tool = %kind, program = %self.spec.program, "running tool");

        let result = match self.timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, self.runner.run(&self.spec.program, &args)).await
                {
                    Ok(result) => result,
                    Err(_) => {
                        record_execution(kind, "timeout");
                        warn!(tool = %kind, timeout_secs = limit.as_secs(), "tool timed out");
                        return Err(ScanEngineError::ToolTimeout {
                            tool: kind.as_str().to_owned(),
                            timeout_secs: limit.as_secs(),
                        });
                    }
                }
            }
            None => self.runner.run(&self.spec.program, &args).await,
        };

        let output = result.map_err(|e| {
            record_execution(kind, "failure");
            relabel(kind, e)
        })?;

        if !self.spec.accepts(output.exit_code) {
            record_execution(kind, "failure");
            let stderr = truncate_stderr(&output.stderr_text());
            warn!(
                tool = %kind,
                exit_code = ?output.exit_code,
                stderr = %stderr,
                "tool exited with a rejected exit code"
            );
            return Err(ScanEngineError::ToolExecution {
                tool: kind.as_str().to_owned(),
                exit_code: output.exit_code,
                stderr,
            });
        }

        record_execution(kind, "success");
        debug!(
            tool = %kind,
            exit_code = ?output.exit_code,
            stdout_bytes = output.stdout.len(),
            "tool finished"
        );
        Ok(output)
    }
}

fn record_execution(kind: ToolKind, result: &'static str) {
    counter!(
        m::TOOL_EXECUTIONS_TOTAL,
        m::LABEL_TOOL => kind.as_str(),
        m::LABEL_RESULT => result
    )
    .increment(1);
}

/// 실행기 에러에 실행 파일 이름 대신 역할 이름을 붙입니다.
fn relabel(kind: ToolKind, err: ScanEngineError) -> ScanEngineError {
    match err {
        ScanEngineError::ToolExecution {
            exit_code, stderr, ..
        } => ScanEngineError::ToolExecution {
            tool: kind.as_str().to_owned(),
            exit_code,
            stderr,
        },
        other => other,
    }
}

fn truncate_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.len() <= MAX_STDERR_LEN {
        return trimmed.to_owned();
    }
    let mut end = MAX_STDERR_LEN;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}
