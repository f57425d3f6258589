//! deepagents-backends: DeepAgents 가상 파일시스템용 원격 스토리지 백엔드
//!
//! 에이전트가 보는 파일시스템(`ls`, `read`, `write`, `edit`, `glob`, `grep`)을
//! S3 호환 객체 저장소나 PostgreSQL 테이블 위에 구현합니다.
//! 두 엔진은 같은 에러 종류, 라인 의미, 결과 순서를 보장합니다.
//!
//! - S3: 파일 하나 = JSON 객체 하나 (`{prefix}/{path}`)
//! - PostgreSQL: 파일 하나 = 행 하나 (경로가 기본 키)
//! - Memory: 테스트와 로컬 실행용
//!
//! # Example
//!
//! ```rust,ignore
//! use deepagents_backends::{Backend, S3Backend, S3Config};
//!
//! let backend = S3Backend::new(
//!     &S3Config::new("agent-files")
//!         .with_prefix("proj1")
//!         .with_endpoint("http://localhost:9000")
//!         .with_credentials("minio", "minio123"),
//! )?;
//!
//! backend.write("/notes.md", "# Notes\n- first").await?;
//! let read = backend.read("/notes.md", 0, None).await?;
//! println!("{}", read.numbered());
//! ```

pub mod error;
pub mod record;
pub mod codec;
pub mod config;
pub mod backends;

// Re-exports for convenience
pub use error::BackendError;
pub use record::FileRecord;
pub use config::{PostgresConfig, S3Config, SslMode};
pub use backends::{
    Backend, FileInfo, GrepMatch, ReadResult, WriteResult, EditResult,
    LineMatcher, StringReplacer, LiteralReplacer,
    RecordBackend, RecordStore,
    FileUploadResponse, FileDownloadResponse,
    MemoryBackend, CompositeBackend, BlockingBackend,
};

#[cfg(feature = "s3")]
pub use backends::{S3Backend, S3Store};

#[cfg(feature = "postgres")]
pub use backends::{PostgresBackend, PostgresStore};
