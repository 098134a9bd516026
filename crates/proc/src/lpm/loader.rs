//! 프리픽스 파일 로더
//!
//! # 파일 형식
//! ```text
//! # 주석
//! 10.0.0.0/8 {"asn": -1, "owner": "me"}
//! 2001:db8::/32 {"asn": 64496}
//! ```
//!
//! 각 줄은 `<프리픽스><공백><JSON 객체>`입니다. JSON 객체의 키가 메타데이터 키가 되며,
//! 줄에 적힌 프리픽스 문자열이 `prefix` 키로 추가됩니다.
//! 파싱할 수 없는 줄은 경고 로그를 남기고 건너뜁니다.

use std::path::Path;

use evpipe_core::value::{Fields, Value, fields_from_json};

use super::tree::{Prefix, PrefixTree};
use crate::error::ProcError;

/// 메타데이터에 자동으로 추가되는 키
pub const PREFIX_KEY: &str = "prefix";

/// 프리픽스 파일 최대 크기
const MAX_PREFIX_FILE_SIZE: u64 = 256 * 1024 * 1024; // 256MB

/// 적재 결과: 새 트리와 통계
#[derive(Debug)]
pub struct PrefixTable {
    /// 새로 만든 트리
    pub tree: PrefixTree<Fields>,
    /// 삽입된 프리픽스 수
    pub loaded: usize,
    /// 건너뛴 줄 수 (파싱 실패, 중복)
    pub skipped: usize,
}

/// 프리픽스 파일 내용을 파싱해 새 트리를 만듭니다.
///
/// 줄 단위 실패는 건너뛰므로 이 함수는 실패하지 않습니다.
pub fn parse_prefix_file(content: &str) -> PrefixTable {
    let mut tree = PrefixTree::new();
    let mut loaded = 0;
    let mut skipped = 0;

    for (index, raw) in content.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match parse_line(line) {
            Ok((prefix, meta)) => {
                if tree.insert(prefix, meta) {
                    loaded += 1;
                } else {
                    tracing::warn!(line = line_no, %prefix, "duplicate prefix, keeping first entry");
                    skipped += 1;
                }
            }
            Err(reason) => {
                tracing::warn!(line = line_no, reason = %reason, "skipping malformed prefix line");
                skipped += 1;
            }
        }
    }

    PrefixTable {
        tree,
        loaded,
        skipped,
    }
}

fn parse_line(line: &str) -> Result<(Prefix, Fields), String> {
    let (token, meta) = line
        .split_once(' ')
        .ok_or_else(|| "missing metadata after prefix".to_owned())?;

    let prefix: Prefix = token.parse().map_err(|e: ProcError| e.to_string())?;

    let meta: serde_json::Map<String, serde_json::Value> = serde_json::from_str(meta.trim())
        .map_err(|e| format!("unable to parse prefix metadata: {e}"))?;

    let mut fields = fields_from_json(meta);
    fields.insert(PREFIX_KEY.to_owned(), Value::Text(token.to_owned()));
    Ok((prefix, fields))
}

/// 파일 크기를 확인합니다.
fn check_size(path: &Path, len: u64) -> Result<(), ProcError> {
    if len > MAX_PREFIX_FILE_SIZE {
        return Err(ProcError::PrefixLoad {
            path: path.display().to_string(),
            reason: format!("file too large: {len} bytes (max {MAX_PREFIX_FILE_SIZE})"),
        });
    }
    Ok(())
}

fn load_error(path: &Path, e: std::io::Error) -> ProcError {
    ProcError::PrefixLoad {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

/// 파일을 동기적으로 읽어 트리를 만듭니다. 스테이지 생성 시점에 사용합니다.
pub fn load_prefix_file(path: &Path) -> Result<PrefixTable, ProcError> {
    let metadata = std::fs::metadata(path).map_err(|e| load_error(path, e))?;
    check_size(path, metadata.len())?;
    let content = std::fs::read_to_string(path).map_err(|e| load_error(path, e))?;
    Ok(parse_prefix_file(&content))
}

/// 파일을 비동기로 읽어 트리를 만듭니다. 실행 중 재적재에 사용합니다.
pub async fn load_prefix_file_async(path: &Path) -> Result<PrefixTable, ProcError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| load_error(path, e))?;
    check_size(path, metadata.len())?;
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| load_error(path, e))?;
    Ok(parse_prefix_file(&content))
}
