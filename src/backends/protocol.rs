// src/backends/protocol.rs
//! Backend 프로토콜 정의
//!
//! 호스트 에이전트 프레임워크가 소비하는 연산 집합입니다. 모든 연산은
//! async가 기본형이며, 동기 호출은 [`BlockingBackend`](super::BlockingBackend)가
//! 같은 구현을 감싸서 제공합니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::search::LineMatcher;
use super::transfer::{self, FileDownloadResponse, FileUploadResponse};
use crate::error::BackendError;

/// 파일 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    pub is_dir: bool,
    /// 라인 수
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

impl FileInfo {
    pub fn file(path: &str, size: usize, modified_at: DateTime<Utc>) -> Self {
        Self {
            path: path.to_string(),
            is_dir: false,
            size: Some(size),
            modified_at: Some(modified_at),
        }
    }

    pub fn dir(path: &str) -> Self {
        Self { path: path.to_string(), is_dir: true, size: None, modified_at: None }
    }
}

/// Grep 검색 결과 (라인 번호는 1부터)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrepMatch {
    pub path: String,
    pub line: usize,
    pub text: String,
}

impl GrepMatch {
    pub fn new(path: &str, line: usize, text: &str) -> Self {
        Self { path: path.to_string(), line, text: text.to_string() }
    }
}

/// 읽기 결과: 원시 라인과 위치 메타데이터
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadResult {
    pub path: String,
    /// 선택된 라인 (종결자 없음)
    pub lines: Vec<String>,
    /// 첫 라인의 0 기반 인덱스
    pub offset: usize,
    pub total_lines: usize,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl ReadResult {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// cat -n 스타일 (`{line_number}\t{line}`)
    pub fn numbered(&self) -> String {
        self.lines
            .iter()
            .enumerate()
            .map(|(i, line)| format!("{}\t{}", self.offset + i + 1, line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// 쓰기 작업 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteResult {
    pub path: String,
}

/// 편집 작업 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditResult {
    pub path: String,
    pub occurrences: usize,
}

/// Backend 프로토콜
///
/// 모든 백엔드 구현체가 준수해야 하는 인터페이스입니다.
/// 경로 인자는 구현체가 정규화하며, 결과에는 정규화된 경로가 담깁니다.
#[async_trait]
pub trait Backend: Send + Sync {
    /// 경로 하위의 모든 파일 (재귀, 경로 사전순)
    async fn ls_info(&self, path: &str) -> Result<Vec<FileInfo>, BackendError>;

    /// 디렉토리 내용 나열 (직계 자식만, 하위 디렉토리는 `/`로 끝나는 항목)
    async fn ls(&self, path: &str) -> Result<Vec<FileInfo>, BackendError> {
        let dir = super::path_utils::normalize_path(path)?;
        let entries = self.ls_info(&dir).await?;
        Ok(super::search::directory_view(&entries, &dir))
    }

    /// 파일 읽기. `offset`은 0 기반 시작 라인, `limit`은 라인 수 (None = 끝까지).
    /// 범위를 벗어난 offset은 빈 결과를 반환합니다.
    async fn read(
        &self,
        path: &str,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<ReadResult, BackendError>;

    /// 파일 쓰기 (새 파일 생성). 이미 존재하면 `AlreadyExists`
    async fn write(&self, path: &str, content: &str) -> Result<WriteResult, BackendError>;

    /// 파일 편집 (문자열 교체)
    async fn edit(
        &self,
        path: &str,
        old_string: &str,
        new_string: &str,
        replace_all: bool,
    ) -> Result<EditResult, BackendError>;

    /// Glob 패턴 검색. 패턴은 `path` 기준 상대 경로에 매칭됩니다.
    async fn glob_info(&self, pattern: &str, path: &str) -> Result<Vec<FileInfo>, BackendError>;

    /// 라인 단위 검색. 결과는 경로, 라인 번호 순.
    async fn grep(
        &self,
        matcher: &LineMatcher,
        path: Option<&str>,
        glob_filter: Option<&str>,
    ) -> Result<Vec<GrepMatch>, BackendError>;

    /// 리터럴 문자열 검색 (정규식 메타문자도 그대로 매칭)
    async fn grep_raw(
        &self,
        pattern: &str,
        path: Option<&str>,
        glob_filter: Option<&str>,
    ) -> Result<Vec<GrepMatch>, BackendError> {
        self.grep(&LineMatcher::literal(pattern), path, glob_filter).await
    }

    /// 정규식 검색
    async fn grep_regex(
        &self,
        pattern: &str,
        path: Option<&str>,
        glob_filter: Option<&str>,
    ) -> Result<Vec<GrepMatch>, BackendError> {
        let matcher = LineMatcher::regex(pattern)?;
        self.grep(&matcher, path, glob_filter).await
    }

    /// 파일 존재 여부 확인
    async fn exists(&self, path: &str) -> Result<bool, BackendError>;

    /// 파일 삭제
    async fn delete(&self, path: &str) -> Result<(), BackendError>;

    /// 바이트 페이로드를 파일별로 업로드. 한 파일의 실패가 배치를 중단하지 않음
    async fn upload_files(&self, files: Vec<(String, Vec<u8>)>) -> Vec<FileUploadResponse> {
        transfer::upload_files(self, files).await
    }

    /// 파일별로 다운로드. 없는 경로는 해당 항목만 `NotFound`
    async fn download_files(&self, paths: Vec<String>) -> Vec<FileDownloadResponse> {
        transfer::download_files(self, paths).await
    }
}
