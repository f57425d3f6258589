// src/backends/memory.rs
//! 인메모리 백엔드 구현
//!
//! **Note:** `tokio::sync::RwLock` 사용 (async 안전성). 생성은 쓰기 락 안에서
//! 존재 확인과 삽입을 함께 수행하므로 배타적입니다.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::store::{CreateOutcome, RecordBackend, RecordStore, StoredEntry};
use crate::error::BackendError;
use crate::record::FileRecord;

/// 인메모리 레코드 저장소
#[derive(Default)]
pub struct MemoryStore {
    files: RwLock<BTreeMap<String, FileRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn engine(&self) -> &'static str {
        "memory"
    }

    async fn fetch(&self, path: &str) -> Result<Option<FileRecord>, BackendError> {
        Ok(self.files.read().await.get(path).cloned())
    }

    async fn try_create(&self, path: &str, record: &FileRecord) -> Result<CreateOutcome, BackendError> {
        let mut files = self.files.write().await;
        if files.contains_key(path) {
            return Ok(CreateOutcome::Conflict);
        }
        files.insert(path.to_string(), record.clone());
        Ok(CreateOutcome::Created)
    }

    async fn persist(&self, path: &str, record: &FileRecord) -> Result<(), BackendError> {
        self.files.write().await.insert(path.to_string(), record.clone());
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<bool, BackendError> {
        Ok(self.files.write().await.remove(path).is_some())
    }

    async fn list(&self, dir: &str) -> Result<Vec<StoredEntry>, BackendError> {
        let files = self.files.read().await;
        Ok(files
            .range(dir.to_string()..)
            .take_while(|(path, _)| path.starts_with(dir))
            .map(|(path, record)| StoredEntry {
                path: path.clone(),
                line_count: record.line_count(),
                modified_at: record.modified_at,
            })
            .collect())
    }

    async fn scan(&self, dir: &str) -> Result<Vec<(String, FileRecord)>, BackendError> {
        let files = self.files.read().await;
        Ok(files
            .range(dir.to_string()..)
            .take_while(|(path, _)| path.starts_with(dir))
            .map(|(path, record)| (path.clone(), record.clone()))
            .collect())
    }
}

/// 인메모리 백엔드
pub type MemoryBackend = RecordBackend<MemoryStore>;

impl RecordBackend<MemoryStore> {
    pub fn new() -> Self {
        Self::from_store(MemoryStore::new())
    }
}

impl Default for RecordBackend<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}
