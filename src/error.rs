// src/error.rs
//! 에러 타입 정의
//!
//! 모든 엔진(S3, PostgreSQL, 인메모리)이 동일한 에러 종류를 보고하도록
//! 엔진 고유 에러는 이 타입으로 경계에서 변환됩니다.

use thiserror::Error;

/// 백엔드 작업 에러
///
/// 페이로드는 문자열만 담아 `Clone`이 가능합니다. 벌크 전송 결과가
/// 파일별로 에러를 보관하기 때문입니다.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Cannot write to {0} because it already exists. Read and then make an edit, or write to a new path.")]
    AlreadyExists(String),

    #[error("String '{old}' not found in {path}")]
    NoMatch { path: String, old: String },

    #[error("String found {occurrences} times in {path}. Use replace_all=true or provide more context.")]
    AmbiguousMatch { path: String, occurrences: usize },

    #[error("Corrupt record at {path}: {reason}")]
    CorruptRecord { path: String, reason: String },

    #[error("Connection error: {message}")]
    Connection { message: String },

    #[error("Backend not initialized; call initialize() before any file operation")]
    NotInitialized,

    #[error("Backend is closed")]
    Closed,

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Path traversal not allowed: {0}")]
    PathTraversal(String),

    #[error("Pattern error: {0}")]
    Pattern(String),

    #[error("Content of {0} is not valid UTF-8")]
    InvalidEncoding(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Blocking call issued from inside an async runtime; await the async form instead")]
    BlockingInAsyncContext,

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl BackendError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into() }
    }

    pub fn corrupt(path: &str, reason: impl Into<String>) -> Self {
        Self::CorruptRecord { path: path.to_string(), reason: reason.into() }
    }

    /// 호출자나 상위 계층이 재시도해 볼 만한 에러인지 여부.
    /// 이 계층은 스스로 재시도하지 않습니다.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::NotFound("/test.txt".to_string());
        assert!(err.to_string().contains("/test.txt"));

        let err = BackendError::AlreadyExists("/a.txt".to_string());
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_only_connection_errors_are_retryable() {
        assert!(BackendError::connection("reset by peer").is_retryable());
        assert!(!BackendError::Closed.is_retryable());
        assert!(!BackendError::NotFound("/x".into()).is_retryable());
        assert!(!BackendError::corrupt("/x", "bad json").is_retryable());
    }
}
