// src/backends/postgres.rs
//! PostgreSQL 엔진
//!
//! 파일 하나가 행 하나입니다. 가상 경로가 기본 키이며, 쓰기 1회 보장은
//! 기본 키 제약에 맡깁니다 (INSERT 시도 후 unique violation -> 충돌).
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS "public"."agent_files" (
//!     path TEXT PRIMARY KEY,
//!     content JSONB NOT NULL,
//!     created_at TIMESTAMPTZ NOT NULL,
//!     modified_at TIMESTAMPTZ NOT NULL
//! );
//! CREATE INDEX IF NOT EXISTS "agent_files_path_prefix_idx"
//!     ON "public"."agent_files" (path text_pattern_ops);
//! ```
//!
//! # Lifecycle
//!
//! `new` -> `initialize` -> (파일 연산) -> `close`.
//! 초기화 전 연산은 `NotInitialized`, 종료 후 연산은 `Closed`로 실패합니다.
//!
//! ```ignore
//! let backend = PostgresBackend::new(&PostgresConfig::from_env()?)?;
//! backend.initialize().await?;
//! backend.write("/notes.md", "# Notes").await?;
//! backend.close().await;
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::types::Json;
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::store::{CreateOutcome, RecordBackend, RecordStore, StoredEntry};
use crate::codec;
use crate::config::{PostgresConfig, SslMode};
use crate::error::BackendError;
use crate::record::FileRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Ready,
    Closed,
}

/// PostgreSQL 레코드 저장소
pub struct PostgresStore {
    pool: PgPool,
    table: String,
    index: String,
    state: RwLock<Lifecycle>,
}

impl PostgresStore {
    /// 지연 연결 풀 생성. 첫 쿼리 전까지 연결하지 않습니다.
    ///
    /// 풀 유지 작업이 생성되므로 tokio 런타임 컨텍스트 안에서 호출해야 합니다.
    pub fn new(config: &PostgresConfig) -> Result<Self, BackendError> {
        config.validate()?;

        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .password(&config.password)
            .ssl_mode(ssl_mode(config.ssl_mode));

        let pool = PgPoolOptions::new()
            .min_connections(config.min_pool_size)
            .max_connections(config.max_pool_size)
            .acquire_timeout(config.acquire_timeout)
            .connect_lazy_with(options);

        Ok(Self {
            pool,
            table: config.qualified_table(),
            index: format!("\"{}_path_prefix_idx\"", config.table),
            state: RwLock::new(Lifecycle::Created),
        })
    }

    /// 스키마 생성. 여러 번 호출해도 안전
    pub async fn initialize(&self) -> Result<(), BackendError> {
        let mut state = self.state.write().await;
        match *state {
            Lifecycle::Ready => return Ok(()),
            Lifecycle::Closed => return Err(BackendError::Closed),
            Lifecycle::Created => {}
        }

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                path TEXT PRIMARY KEY,
                content JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                modified_at TIMESTAMPTZ NOT NULL
            )
            "#,
            self.table
        ))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} (path text_pattern_ops)",
            self.index, self.table
        ))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        *state = Lifecycle::Ready;
        info!(table = %self.table, "postgres backend initialized");
        Ok(())
    }

    /// 풀 종료. 진행 중인 연산이 연결을 반납할 때까지 대기합니다.
    pub async fn close(&self) {
        let mut state = self.state.write().await;
        if *state == Lifecycle::Closed {
            return;
        }
        *state = Lifecycle::Closed;
        drop(state);

        self.pool.close().await;
        info!(table = %self.table, "postgres backend closed");
    }

    pub async fn is_ready(&self) -> bool {
        *self.state.read().await == Lifecycle::Ready
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    async fn ensure_ready(&self) -> Result<(), BackendError> {
        match *self.state.read().await {
            Lifecycle::Ready => Ok(()),
            Lifecycle::Created => Err(BackendError::NotInitialized),
            Lifecycle::Closed => Err(BackendError::Closed),
        }
    }
}

#[async_trait]
impl RecordStore for PostgresStore {
    fn engine(&self) -> &'static str {
        "postgres"
    }

    async fn fetch(&self, path: &str) -> Result<Option<FileRecord>, BackendError> {
        self.ensure_ready().await?;

        let row: Option<(Value, DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(&format!(
            "SELECT content, created_at, modified_at FROM {} WHERE path = $1",
            self.table
        ))
        .bind(path)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(|(content, created_at, modified_at)| {
            codec::decode_row(path, &content, created_at, modified_at)
                .inspect_err(|e| warn!(path, error = %e, "corrupt row"))
        })
        .transpose()
    }

    async fn try_create(&self, path: &str, record: &FileRecord) -> Result<CreateOutcome, BackendError> {
        self.ensure_ready().await?;

        let result = sqlx::query(&format!(
            "INSERT INTO {} (path, content, created_at, modified_at) VALUES ($1, $2, $3, $4)",
            self.table
        ))
        .bind(path)
        .bind(Json(&record.content))
        .bind(record.created_at)
        .bind(record.modified_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(CreateOutcome::Created),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                debug!(path, "insert hit primary key");
                Ok(CreateOutcome::Conflict)
            }
            Err(e) => Err(map_sqlx_error(e)),
        }
    }

    async fn persist(&self, path: &str, record: &FileRecord) -> Result<(), BackendError> {
        self.ensure_ready().await?;

        let result = sqlx::query(&format!(
            "UPDATE {} SET content = $2, modified_at = $3 WHERE path = $1",
            self.table
        ))
        .bind(path)
        .bind(Json(&record.content))
        .bind(record.modified_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        // 읽은 뒤 다른 호출자가 삭제한 경우
        if result.rows_affected() == 0 {
            warn!(path, "row vanished before update");
            return Err(BackendError::NotFound(path.to_string()));
        }
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<bool, BackendError> {
        self.ensure_ready().await?;

        let result = sqlx::query(&format!("DELETE FROM {} WHERE path = $1", self.table))
            .bind(path)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, dir: &str) -> Result<Vec<StoredEntry>, BackendError> {
        Ok(self
            .scan(dir)
            .await?
            .into_iter()
            .map(|(path, record)| StoredEntry {
                line_count: record.line_count(),
                modified_at: record.modified_at,
                path,
            })
            .collect())
    }

    async fn scan(&self, dir: &str) -> Result<Vec<(String, FileRecord)>, BackendError> {
        self.ensure_ready().await?;

        let rows: Vec<(String, Value, DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(&format!(
            r#"
            SELECT path, content, created_at, modified_at
            FROM {}
            WHERE path LIKE $1 ESCAPE '\'
            ORDER BY path
            "#,
            self.table
        ))
        .bind(like_prefix(dir))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(decode_rows(rows))
    }
}

/// PostgreSQL 백엔드
pub type PostgresBackend = RecordBackend<PostgresStore>;

impl RecordBackend<PostgresStore> {
    /// 지연 풀로 생성. 파일 연산 전에 [`initialize`](Self::initialize) 필요
    pub fn new(config: &PostgresConfig) -> Result<Self, BackendError> {
        Ok(Self::from_store(PostgresStore::new(config)?))
    }

    /// 생성 후 바로 초기화
    pub async fn connect(config: &PostgresConfig) -> Result<Self, BackendError> {
        let backend = Self::new(config)?;
        backend.initialize().await?;
        Ok(backend)
    }

    pub async fn initialize(&self) -> Result<(), BackendError> {
        self.store().initialize().await
    }

    pub async fn close(&self) {
        self.store().close().await
    }
}

/// 나열용 행 디코딩. 손상된 행은 경고 후 건너뜀
fn decode_rows(rows: Vec<(String, Value, DateTime<Utc>, DateTime<Utc>)>) -> Vec<(String, FileRecord)> {
    rows.into_iter()
        .filter_map(|(path, content, created_at, modified_at)| {
            match codec::decode_row(&path, &content, created_at, modified_at) {
                Ok(record) => Some((path, record)),
                Err(e) => {
                    warn!(path = %path, error = %e, "skipping corrupt row");
                    None
                }
            }
        })
        .collect()
}

fn ssl_mode(mode: SslMode) -> PgSslMode {
    match mode {
        SslMode::Disable => PgSslMode::Disable,
        SslMode::Allow => PgSslMode::Allow,
        SslMode::Prefer => PgSslMode::Prefer,
        SslMode::Require => PgSslMode::Require,
        SslMode::VerifyCa => PgSslMode::VerifyCa,
        SslMode::VerifyFull => PgSslMode::VerifyFull,
    }
}

/// 디렉토리 접두사 LIKE 패턴 (`%`, `_`, `\` 이스케이프)
fn like_prefix(dir: &str) -> String {
    let mut pattern = String::with_capacity(dir.len() + 1);
    for c in dir.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn map_sqlx_error(err: sqlx::Error) -> BackendError {
    match err {
        sqlx::Error::PoolClosed => BackendError::Closed,
        sqlx::Error::PoolTimedOut => BackendError::connection("timed out acquiring a pooled connection"),
        other => BackendError::connection(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_prefix_escapes_wildcards() {
        assert_eq!(like_prefix("/"), "/%");
        assert_eq!(like_prefix("/my_dir"), "/my\\_dir%");
        assert_eq!(like_prefix("/100%"), "/100\\%%");
    }

    #[test]
    fn test_corrupt_rows_are_skipped_in_listings() {
        let now = Utc::now();
        let rows = vec![
            ("/bad.txt".to_string(), serde_json::json!(["ok", 7]), now, now),
            ("/good.txt".to_string(), serde_json::json!(["a", "b"]), now, now),
            ("/odd.txt".to_string(), serde_json::json!("not a list"), now, now),
        ];

        let decoded = decode_rows(rows);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].0, "/good.txt");
        assert_eq!(decoded[0].1.line_count(), 2);
    }

    #[test]
    fn test_pool_errors_are_classified() {
        assert_eq!(map_sqlx_error(sqlx::Error::PoolClosed), BackendError::Closed);
        assert!(map_sqlx_error(sqlx::Error::PoolTimedOut).is_retryable());
    }

    #[tokio::test]
    async fn test_operations_before_initialize_fail() {
        let store = PostgresStore::new(&PostgresConfig::new()).unwrap();

        assert!(!store.is_ready().await);
        assert_eq!(store.fetch("/a.txt").await.unwrap_err(), BackendError::NotInitialized);
        assert_eq!(store.list("/").await.unwrap_err(), BackendError::NotInitialized);
    }

    #[tokio::test]
    async fn test_operations_after_close_fail() {
        let store = PostgresStore::new(&PostgresConfig::new()).unwrap();
        store.close().await;
        store.close().await;

        assert_eq!(store.initialize().await.unwrap_err(), BackendError::Closed);
        assert_eq!(store.remove("/a.txt").await.unwrap_err(), BackendError::Closed);
    }

    #[test]
    fn test_new_rejects_invalid_table_name() {
        let config = PostgresConfig::new().with_table("public", "files\"; --");
        assert!(matches!(PostgresStore::new(&config), Err(BackendError::Config(_))));
    }
}
