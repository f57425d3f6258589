// src/backends/mod.rs
//! 스토리지 백엔드
//!
//! 모든 엔진은 [`RecordStore`]를 구현하고 [`RecordBackend`]가 그 위에
//! [`Backend`] 연산을 제공합니다.

pub mod protocol;
pub mod path_utils;
pub mod search;
pub mod replace;
pub mod store;
pub mod transfer;
pub mod memory;
pub mod composite;
pub mod blocking;

#[cfg(feature = "s3")]
pub mod s3;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use protocol::{Backend, FileInfo, GrepMatch, ReadResult, WriteResult, EditResult};
pub use search::{GlobMatcher, LineMatcher};
pub use replace::{LiteralReplacer, Replacement, ReplaceError, StringReplacer};
pub use store::{CreateOutcome, RecordBackend, RecordStore, StoredEntry};
pub use transfer::{FileDownloadResponse, FileUploadResponse};
pub use memory::{MemoryBackend, MemoryStore};
pub use composite::{CompositeBackend, Route};
pub use blocking::BlockingBackend;

#[cfg(feature = "s3")]
pub use s3::{S3Backend, S3Store};

#[cfg(feature = "postgres")]
pub use postgres::{PostgresBackend, PostgresStore};
