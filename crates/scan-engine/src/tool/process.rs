//! 프로세스 기반 [`ToolRunner`] 구현

use std::process::Stdio;

use bytes::Bytes;
use tokio::process::Command;
use tracing::debug;

use super::{ToolOutput, ToolRunner};
use crate::error::ScanEngineError;

/// `tokio::process`로 외부 프로그램을 실행하는 실행기
///
/// 표준 입력은 닫고 표준 출력과 에러를 모두 수집합니다.
/// 실행 중인 future가 drop되면 자식 프로세스를 종료합니다 (`kill_on_drop`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessToolRunner;

impl ProcessToolRunner {
    /// 새 실행기를 생성합니다.
    pub fn new() -> Self {
        Self
    }
}

impl ToolRunner for ProcessToolRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<ToolOutput, ScanEngineError> {
        debug!(program, ?args, "spawning process");

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ScanEngineError::ToolExecution {
                tool: program.to_owned(),
                exit_code: None,
                stderr: format!("failed to execute '{program}': {e}"),
            })?;

        Ok(ToolOutput {
            exit_code: output.status.code(),
            stdout: Bytes::from(output.stdout),
            stderr: Bytes::from(output.stderr),
        })
    }
}
