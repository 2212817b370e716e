//! 소스 코드 스니펫 추출
//!
//! 정적 분석 발견 항목의 위치 주변 코드를 잘라 보여 줍니다.
//!
//! ```text
//!     48 | fn handler(req: Request) {
//!     49 |     let id = req.param("id");
//! >   50 |     let q = format!("SELECT * FROM t WHERE id = {id}");
//!     51 |     db.query(&q)
//!     52 | }
//! ```
//!
//! 추출은 최선 노력 방식입니다. 파일을 읽을 수 없거나 범위가 맞지 않으면
//! 에러 대신 `None`을 반환합니다.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

/// 지적된 범위 앞뒤로 보여 줄 줄 수
pub const CONTEXT_LINES: u32 = 2;

/// 지적된 줄 표시
const MARKER: char = '>';

/// 압축 해제 루트 아래의 파일에서 스니펫을 추출합니다.
///
/// `file_path`는 루트 기준 상대 경로이거나 루트 내부의 절대 경로입니다.
/// 루트 밖으로 해석되는 경로, 읽을 수 없는 파일, 파일 길이를 넘는 시작 줄은
/// 모두 `None`입니다.
pub fn extract_snippet(
    root: &Path,
    file_path: &str,
    start_line: u32,
    end_line: Option<u32>,
) -> Option<String> {
    let path = resolve_within(root, file_path)?;
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "snippet source unreadable");
            return None;
        }
    };
    render_snippet(&String::from_utf8_lossy(&bytes), start_line, end_line)
}

/// 텍스트에서 `[start, end]` 범위와 앞뒤 문맥을 렌더링합니다.
///
/// 줄 번호는 1부터 시작합니다. `end_line`이 없거나 `start_line`보다 작으면
/// `start_line` 한 줄만 지적된 것으로 봅니다.
pub fn render_snippet(text: &str, start_line: u32, end_line: Option<u32>) -> Option<String> {
    if start_line == 0 {
        return None;
    }
    let lines: Vec<&str> = text.lines().collect();
    let total = u32::try_from(lines.len()).unwrap_or(u32::MAX);
    if start_line > total {
        return None;
    }

    let end = end_line.unwrap_or(start_line).max(start_line);
    let first = start_line.saturating_sub(CONTEXT_LINES).max(1);
    let last = end.saturating_add(CONTEXT_LINES).min(total);
    let width = last.to_string().len();

    let rendered: Vec<String> = (first..=last)
        .map(|lineno| {
            let marker = if (start_line..=end).contains(&lineno) {
                MARKER
            } else {
                ' '
            };
            let text = lines[(lineno - 1) as usize];
            format!("{marker} {lineno:>width$} | {text}")
        })
        .collect();
    Some(rendered.join("\n"))
}

/// 절대 경로가 루트 아래에 있으면 루트 기준 상대 경로로 바꿉니다.
///
/// 루트 밖이거나 상대 경로이면 원래 값을 그대로 돌려줍니다.
pub fn relative_to_root(root: &Path, file_path: &str) -> String {
    let path = Path::new(file_path);
    if !path.is_absolute() {
        return file_path.to_owned();
    }
    if let Ok(rel) = path.strip_prefix(root) {
        return rel.to_string_lossy().into_owned();
    }
    // 임시 디렉토리가 심볼릭 링크일 때 (macOS /var → /private/var)
    root.canonicalize()
        .ok()
        .and_then(|canonical| {
            path.strip_prefix(&canonical)
                .ok()
                .map(|rel| rel.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| file_path.to_owned())
}

fn resolve_within(root: &Path, file_path: &str) -> Option<PathBuf> {
    let root = root.canonicalize().ok()?;
    let candidate = Path::new(file_path);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };
    let resolved = joined.canonicalize().ok()?;
    if !resolved.starts_with(&root) {
        debug!(path = %resolved.display(), "snippet path escapes extraction root");
        return None;
    }
    resolved.is_file().then_some(resolved)
}
