// src/backends/store.rs
//! 엔진 독립 연산 로직
//!
//! 각 엔진은 [`RecordStore`]만 구현합니다: 레코드 조회, 배타적 생성
//! (`try_create`), 덮어쓰기, 삭제, 나열. 읽기/쓰기/편집/검색 의미는
//! [`RecordBackend`]에서 한 번만 구현되어 엔진 간 동작이 같습니다.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::path_utils::{is_under_path, normalize_file_path, normalize_path};
use super::protocol::{Backend, EditResult, FileInfo, GrepMatch, ReadResult, WriteResult};
use super::replace::{LiteralReplacer, ReplaceError, StringReplacer};
use super::search::{self, GlobMatcher, LineMatcher};
use crate::error::BackendError;
use crate::record::FileRecord;

/// 배타적 생성 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// 같은 경로에 레코드가 이미 있음
    Conflict,
}

/// 나열 항목: 내용 없이 메타데이터만
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub path: String,
    pub line_count: usize,
    pub modified_at: DateTime<Utc>,
}

impl From<&StoredEntry> for FileInfo {
    fn from(entry: &StoredEntry) -> Self {
        FileInfo::file(&entry.path, entry.line_count, entry.modified_at)
    }
}

/// 엔진 기능 인터페이스
///
/// 경로 인자는 항상 정규화된 가상 경로입니다. 키 변환은 구현체 몫입니다.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// 로그용 엔진 이름
    fn engine(&self) -> &'static str;

    async fn fetch(&self, path: &str) -> Result<Option<FileRecord>, BackendError>;

    /// 경로가 비어 있을 때만 생성. 동시에 같은 새 경로로 생성하는 호출 중
    /// 정확히 하나만 `Created`를 받아야 함
    async fn try_create(&self, path: &str, record: &FileRecord) -> Result<CreateOutcome, BackendError>;

    /// 기존 레코드 교체 (마지막 저장이 이김)
    async fn persist(&self, path: &str, record: &FileRecord) -> Result<(), BackendError>;

    /// 삭제. 레코드가 있었으면 `true`
    async fn remove(&self, path: &str) -> Result<bool, BackendError>;

    /// `dir` 접두사 아래의 항목 (디렉토리 경계 확인 전의 원시 접두사 매칭이어도 됨)
    async fn list(&self, dir: &str) -> Result<Vec<StoredEntry>, BackendError>;

    /// `dir` 접두사 아래의 전체 레코드
    async fn scan(&self, dir: &str) -> Result<Vec<(String, FileRecord)>, BackendError>;
}

/// [`RecordStore`] 위에 [`Backend`] 연산을 구현하는 공통 백엔드
pub struct RecordBackend<S> {
    store: S,
    replacer: Arc<dyn StringReplacer>,
}

impl<S: RecordStore> RecordBackend<S> {
    pub fn from_store(store: S) -> Self {
        Self {
            store,
            replacer: Arc::new(LiteralReplacer),
        }
    }

    /// 편집에 사용할 교체 함수 지정 (빌더 패턴)
    pub fn with_replacer(mut self, replacer: Arc<dyn StringReplacer>) -> Self {
        self.replacer = replacer;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn entries_under(&self, dir: &str) -> Result<Vec<FileInfo>, BackendError> {
        let mut results: Vec<FileInfo> = self.store
            .list(dir)
            .await?
            .iter()
            .filter(|entry| is_under_path(&entry.path, dir))
            .map(FileInfo::from)
            .collect();

        results.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(results)
    }
}

#[async_trait]
impl<S: RecordStore> Backend for RecordBackend<S> {
    async fn ls_info(&self, path: &str) -> Result<Vec<FileInfo>, BackendError> {
        let dir = normalize_path(path)?;
        debug!(engine = self.store.engine(), path = %dir, "ls_info");
        self.entries_under(&dir).await
    }

    async fn read(
        &self,
        path: &str,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<ReadResult, BackendError> {
        let path = normalize_file_path(path)?;
        debug!(engine = self.store.engine(), path = %path, offset, ?limit, "read");

        let record = self.store
            .fetch(&path)
            .await?
            .ok_or_else(|| BackendError::NotFound(path.clone()))?;

        let total_lines = record.line_count();
        let lines: Vec<String> = record.content
            .into_iter()
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .collect();

        Ok(ReadResult {
            path,
            lines,
            offset,
            total_lines,
            created_at: record.created_at,
            modified_at: record.modified_at,
        })
    }

    async fn write(&self, path: &str, content: &str) -> Result<WriteResult, BackendError> {
        let path = normalize_file_path(path)?;
        let record = FileRecord::new(content);
        debug!(engine = self.store.engine(), path = %path, lines = record.line_count(), "write");

        match self.store.try_create(&path, &record).await? {
            CreateOutcome::Created => Ok(WriteResult { path }),
            CreateOutcome::Conflict => Err(BackendError::AlreadyExists(path)),
        }
    }

    async fn edit(
        &self,
        path: &str,
        old_string: &str,
        new_string: &str,
        replace_all: bool,
    ) -> Result<EditResult, BackendError> {
        let path = normalize_file_path(path)?;
        debug!(engine = self.store.engine(), path = %path, replace_all, "edit");

        let record = self.store
            .fetch(&path)
            .await?
            .ok_or_else(|| BackendError::NotFound(path.clone()))?;

        let replacement = self.replacer
            .replace(&record.as_text(), old_string, new_string, replace_all)
            .map_err(|e| match e {
                ReplaceError::NoMatch => BackendError::NoMatch {
                    path: path.clone(),
                    old: old_string.to_string(),
                },
                ReplaceError::Ambiguous(occurrences) => BackendError::AmbiguousMatch {
                    path: path.clone(),
                    occurrences,
                },
            })?;

        let updated = record.revised(&replacement.content);
        self.store.persist(&path, &updated).await?;

        Ok(EditResult { path, occurrences: replacement.occurrences })
    }

    async fn glob_info(&self, pattern: &str, path: &str) -> Result<Vec<FileInfo>, BackendError> {
        let base = normalize_path(path)?;
        debug!(engine = self.store.engine(), pattern, base = %base, "glob_info");

        let entries = self.entries_under(&base).await?;
        search::glob_entries(entries, pattern, &base)
    }

    async fn grep(
        &self,
        matcher: &LineMatcher,
        path: Option<&str>,
        glob_filter: Option<&str>,
    ) -> Result<Vec<GrepMatch>, BackendError> {
        let base = normalize_path(path.unwrap_or("/"))?;
        let filter = glob_filter.map(GlobMatcher::filter).transpose()?;
        debug!(engine = self.store.engine(), base = %base, ?glob_filter, "grep");

        let records = self.store.scan(&base).await?;
        Ok(search::grep_records(&records, matcher, &base, filter.as_ref()))
    }

    async fn exists(&self, path: &str) -> Result<bool, BackendError> {
        let path = normalize_file_path(path)?;
        Ok(self.store.fetch(&path).await?.is_some())
    }

    async fn delete(&self, path: &str) -> Result<(), BackendError> {
        let path = normalize_file_path(path)?;
        debug!(engine = self.store.engine(), path = %path, "delete");

        if !self.store.remove(&path).await? {
            warn!(engine = self.store.engine(), path = %path, "delete of missing file");
            return Err(BackendError::NotFound(path));
        }
        Ok(())
    }
}
