// src/record.rs
//! 파일 레코드 정의
//!
//! 저장 단위인 `FileRecord`: 라인 배열과 생성/수정 타임스탬프.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 파일 데이터
///
/// 호출자에게 반환된 레코드는 값 타입입니다. 변경은 항상 새 레코드를
/// 만들어 같은 경로에 다시 저장합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub content: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl FileRecord {
    /// 새 파일 레코드 (`created_at == modified_at == now`)
    pub fn new(text: &str) -> Self {
        let now = Utc::now();
        Self {
            content: split_lines(text),
            created_at: now,
            modified_at: now,
        }
    }

    pub fn from_parts(
        content: Vec<String>,
        created_at: DateTime<Utc>,
        modified_at: DateTime<Utc>,
    ) -> Self {
        Self { content, created_at, modified_at }
    }

    /// 내용을 바꾼 새 레코드. `created_at`은 유지되고
    /// `modified_at`은 `created_at`보다 앞서지 않습니다.
    pub fn revised(&self, text: &str) -> Self {
        Self {
            content: split_lines(text),
            created_at: self.created_at,
            modified_at: Utc::now().max(self.created_at),
        }
    }

    pub fn as_text(&self) -> String {
        self.content.join("\n")
    }

    pub fn line_count(&self) -> usize {
        self.content.len()
    }
}

/// 텍스트를 라인 배열로 분리
///
/// `\n`으로 나누고 각 라인 끝의 `\r`은 제거합니다. 마지막 종결자 뒤의 빈 라인을
/// 유지하므로 `"x\n"`은 `["x", ""]`가 되어 [`FileRecord::as_text`]로 원문이
/// 복원됩니다. 빈 텍스트는 빈 배열입니다.
pub fn split_lines(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect()
}
