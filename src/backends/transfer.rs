// src/backends/transfer.rs
//! 벌크 업로드/다운로드
//!
//! read/write 위에 구축됩니다. 파일마다 독립적으로 성공하거나 실패하며,
//! 결과 순서는 입력 순서와 같습니다.

use futures::future::join_all;
use tracing::debug;

use super::protocol::Backend;
use crate::error::BackendError;

/// 파일별 업로드 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUploadResponse {
    pub path: String,
    pub error: Option<BackendError>,
}

impl FileUploadResponse {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// 파일별 다운로드 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDownloadResponse {
    pub path: String,
    pub content: Option<Vec<u8>>,
    pub error: Option<BackendError>,
}

impl FileDownloadResponse {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

pub async fn upload_files<B>(backend: &B, files: Vec<(String, Vec<u8>)>) -> Vec<FileUploadResponse>
where
    B: Backend + ?Sized,
{
    debug!(count = files.len(), "upload_files");

    join_all(files.into_iter().map(|(path, bytes)| async move {
        let result = match String::from_utf8(bytes) {
            Ok(text) => backend.write(&path, &text).await.map(|_| ()),
            Err(_) => Err(BackendError::InvalidEncoding(path.clone())),
        };
        FileUploadResponse { path, error: result.err() }
    }))
    .await
}

pub async fn download_files<B>(backend: &B, paths: Vec<String>) -> Vec<FileDownloadResponse>
where
    B: Backend + ?Sized,
{
    debug!(count = paths.len(), "download_files");

    join_all(paths.into_iter().map(|path| async move {
        match backend.read(&path, 0, None).await {
            Ok(read) => FileDownloadResponse {
                path,
                content: Some(read.text().into_bytes()),
                error: None,
            },
            Err(e) => FileDownloadResponse { path, content: None, error: Some(e) },
        }
    }))
    .await
}
