// src/backends/blocking.rs
//! 동기 호출 어댑터
//!
//! async 구현 하나를 전용 tokio 런타임 위에서 실행해 동기 API를 제공합니다.
//! 연산 의미는 async 형태와 완전히 같습니다.
//!
//! 이미 async 런타임 안에서 동기 메서드를 부르면 교착 대신
//! [`BackendError::BlockingInAsyncContext`]를 반환합니다.

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::{Handle, Runtime};

use super::protocol::{Backend, EditResult, FileInfo, GrepMatch, ReadResult, WriteResult};
use super::transfer::{FileDownloadResponse, FileUploadResponse};
use crate::error::BackendError;

/// 동기 백엔드 래퍼
pub struct BlockingBackend<B> {
    inner: Arc<B>,
    runtime: Arc<Runtime>,
}

impl<B> Clone for BlockingBackend<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            runtime: Arc::clone(&self.runtime),
        }
    }
}

impl<B: Backend> BlockingBackend<B> {
    /// 새 멀티스레드 런타임으로 감쌈
    pub fn new(inner: B) -> Result<Self, BackendError> {
        Ok(Self::from_runtime(Arc::new(inner), Arc::new(new_runtime()?)))
    }

    /// 런타임 컨텍스트 안에서 백엔드를 생성 (풀 유지 작업을 띄우는 엔진용)
    ///
    /// ```ignore
    /// let backend = BlockingBackend::build(|| PostgresBackend::new(&config))?;
    /// backend.run(|b| b.initialize())?;
    /// ```
    pub fn build<F>(make: F) -> Result<Self, BackendError>
    where
        F: FnOnce() -> Result<B, BackendError>,
    {
        let runtime = new_runtime()?;
        let inner = {
            let _guard = runtime.enter();
            make()?
        };
        Ok(Self::from_runtime(Arc::new(inner), Arc::new(runtime)))
    }

    pub fn from_runtime(inner: Arc<B>, runtime: Arc<Runtime>) -> Self {
        Self { inner, runtime }
    }

    /// 임의의 async 연산을 동기로 실행 (`initialize`, `close` 등)
    pub fn run<'a, T, F, Fut>(&'a self, f: F) -> Result<T, BackendError>
    where
        F: FnOnce(&'a B) -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        self.block_on(f(self.inner.as_ref()))?
    }

    fn block_on<F: Future>(&self, future: F) -> Result<F::Output, BackendError> {
        if Handle::try_current().is_ok() {
            return Err(BackendError::BlockingInAsyncContext);
        }
        Ok(self.runtime.block_on(future))
    }

    pub fn ls_info(&self, path: &str) -> Result<Vec<FileInfo>, BackendError> {
        self.block_on(self.inner.ls_info(path))?
    }

    pub fn ls(&self, path: &str) -> Result<Vec<FileInfo>, BackendError> {
        self.block_on(self.inner.ls(path))?
    }

    pub fn read(&self, path: &str, offset: usize, limit: Option<usize>) -> Result<ReadResult, BackendError> {
        self.block_on(self.inner.read(path, offset, limit))?
    }

    pub fn write(&self, path: &str, content: &str) -> Result<WriteResult, BackendError> {
        self.block_on(self.inner.write(path, content))?
    }

    pub fn edit(
        &self,
        path: &str,
        old_string: &str,
        new_string: &str,
        replace_all: bool,
    ) -> Result<EditResult, BackendError> {
        self.block_on(self.inner.edit(path, old_string, new_string, replace_all))?
    }

    pub fn glob_info(&self, pattern: &str, path: &str) -> Result<Vec<FileInfo>, BackendError> {
        self.block_on(self.inner.glob_info(pattern, path))?
    }

    pub fn grep_raw(
        &self,
        pattern: &str,
        path: Option<&str>,
        glob_filter: Option<&str>,
    ) -> Result<Vec<GrepMatch>, BackendError> {
        self.block_on(self.inner.grep_raw(pattern, path, glob_filter))?
    }

    pub fn grep_regex(
        &self,
        pattern: &str,
        path: Option<&str>,
        glob_filter: Option<&str>,
    ) -> Result<Vec<GrepMatch>, BackendError> {
        self.block_on(self.inner.grep_regex(pattern, path, glob_filter))?
    }

    pub fn exists(&self, path: &str) -> Result<bool, BackendError> {
        self.block_on(self.inner.exists(path))?
    }

    pub fn delete(&self, path: &str) -> Result<(), BackendError> {
        self.block_on(self.inner.delete(path))?
    }

    pub fn upload_files(&self, files: Vec<(String, Vec<u8>)>) -> Result<Vec<FileUploadResponse>, BackendError> {
        self.block_on(self.inner.upload_files(files))
    }

    pub fn download_files(&self, paths: Vec<String>) -> Result<Vec<FileDownloadResponse>, BackendError> {
        self.block_on(self.inner.download_files(paths))
    }
}

fn new_runtime() -> Result<Runtime, BackendError> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("vfs-blocking")
        .build()
        .map_err(|e| BackendError::Runtime(e.to_string()))
}
