//! Backend Configuration Module
//!
//! 백엔드 연결 설정. 설정 값은 외부(설정 로더, 환경 변수)에서 주어지며
//! 이 크레이트는 검증과 소비만 담당합니다.
//!
//! # Environment Variables
//!
//! | Variable | Purpose | Default |
//! |----------|---------|---------|
//! | `S3_BUCKET` | Bucket name | (required) |
//! | `S3_PREFIX` | Key prefix segment | empty |
//! | `S3_ENDPOINT_URL` | Custom endpoint (MinIO, etc.) | AWS |
//! | `S3_REGION` / `AWS_REGION` | Region | `us-east-1` |
//! | `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` / `AWS_SESSION_TOKEN` | Static credentials | default chain |
//! | `S3_USE_SSL` | TLS for scheme-less endpoints | `true` |
//! | `S3_FORCE_PATH_STYLE` | Path-style addressing | on with custom endpoint |
//! | `S3_CONDITIONAL_WRITES` | Use `If-None-Match` for write-once | `true` |
//! | `POSTGRES_HOST` / `POSTGRES_PORT` | Server address | `localhost` / `5432` |
//! | `POSTGRES_DB` / `POSTGRES_USER` / `POSTGRES_PASSWORD` | Login | `deepagents` / `postgres` / empty |
//! | `POSTGRES_SCHEMA` / `POSTGRES_TABLE` | Table location | `public` / `agent_files` |
//! | `POSTGRES_SSLMODE` | libpq-style SSL mode | `prefer` |
//! | `POSTGRES_MIN_POOL_SIZE` / `POSTGRES_MAX_POOL_SIZE` | Pool bounds | `1` / `10` |
//! | `POSTGRES_ACQUIRE_TIMEOUT` | Pool acquire timeout (humantime) | `30s` |

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// S3 호환 객체 저장소 설정
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    pub bucket: String,
    /// 모든 키 앞에 붙는 접두사 세그먼트
    pub prefix: String,
    pub region: String,
    pub endpoint_url: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    /// 스킴 없는 엔드포인트에 `https://`(true) 또는 `http://`(false)
    pub use_ssl: bool,
    /// None이면 사용자 지정 엔드포인트일 때만 path-style
    pub force_path_style: Option<bool>,
    /// `If-None-Match: *` 조건부 PUT 사용 여부.
    /// false면 HEAD 후 PUT (최선 노력, 경쟁 구간 존재)
    pub conditional_writes: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            prefix: String::new(),
            region: "us-east-1".to_string(),
            endpoint_url: None,
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            use_ssl: true,
            force_path_style: None,
            conditional_writes: true,
        }
    }
}

impl S3Config {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self { bucket: bucket.into(), ..Self::default() }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    pub fn with_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.access_key_id = Some(access_key_id.into());
        self.secret_access_key = Some(secret_access_key.into());
        self
    }

    pub fn with_ssl(mut self, use_ssl: bool) -> Self {
        self.use_ssl = use_ssl;
        self
    }

    pub fn with_conditional_writes(mut self, enabled: bool) -> Self {
        self.conditional_writes = enabled;
        self
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BackendError> {
        let mut config = Self::default();

        config.bucket = std::env::var("S3_BUCKET")
            .map_err(|_| BackendError::Config("S3_BUCKET is not set".to_string()))?;

        if let Ok(prefix) = std::env::var("S3_PREFIX") {
            config.prefix = prefix;
        }

        if let Ok(region) = std::env::var("S3_REGION").or_else(|_| std::env::var("AWS_REGION")) {
            config.region = region;
        }

        config.endpoint_url = std::env::var("S3_ENDPOINT_URL").ok();
        config.access_key_id = std::env::var("AWS_ACCESS_KEY_ID").ok();
        config.secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY").ok();
        config.session_token = std::env::var("AWS_SESSION_TOKEN").ok();

        if let Some(use_ssl) = env_parse::<bool>("S3_USE_SSL")? {
            config.use_ssl = use_ssl;
        }
        config.force_path_style = env_parse::<bool>("S3_FORCE_PATH_STYLE")?;
        if let Some(conditional) = env_parse::<bool>("S3_CONDITIONAL_WRITES")? {
            config.conditional_writes = conditional;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BackendError> {
        if self.bucket.trim().is_empty() {
            return Err(BackendError::Config("bucket must not be empty".to_string()));
        }
        if self.region.trim().is_empty() {
            return Err(BackendError::Config("region must not be empty".to_string()));
        }
        if self.access_key_id.is_some() != self.secret_access_key.is_some() {
            return Err(BackendError::Config(
                "access_key_id and secret_access_key must be set together".to_string(),
            ));
        }
        Ok(())
    }

    /// 스킴이 보정된 엔드포인트
    pub fn endpoint(&self) -> Option<String> {
        self.endpoint_url.as_ref().map(|url| {
            if url.contains("://") {
                url.clone()
            } else {
                let scheme = if self.use_ssl { "https" } else { "http" };
                format!("{}://{}", scheme, url)
            }
        })
    }

    pub fn path_style(&self) -> bool {
        self.force_path_style.unwrap_or(self.endpoint_url.is_some())
    }

    pub fn has_static_credentials(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &self.secret_access_key.as_ref().map(|_| "<redacted>"))
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("use_ssl", &self.use_ssl)
            .field("force_path_style", &self.force_path_style)
            .field("conditional_writes", &self.conditional_writes)
            .finish()
    }
}

/// libpq 스타일 SSL 모드
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    Disable,
    Allow,
    #[default]
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

impl FromStr for SslMode {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "disable" => Ok(Self::Disable),
            "allow" => Ok(Self::Allow),
            "prefer" => Ok(Self::Prefer),
            "require" => Ok(Self::Require),
            "verify-ca" => Ok(Self::VerifyCa),
            "verify-full" => Ok(Self::VerifyFull),
            other => Err(BackendError::Config(format!("unknown sslmode: {}", other))),
        }
    }
}

/// PostgreSQL 설정
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub schema: String,
    pub table: String,
    pub ssl_mode: SslMode,
    pub min_pool_size: u32,
    pub max_pool_size: u32,
    /// 풀에서 연결을 얻기까지 기다리는 최대 시간
    #[serde(with = "humantime_serde")]
    pub acquire_timeout: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "deepagents".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            schema: "public".to_string(),
            table: "agent_files".to_string(),
            ssl_mode: SslMode::default(),
            min_pool_size: 1,
            max_pool_size: 10,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

impl PostgresConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_login(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    pub fn with_table(mut self, schema: impl Into<String>, table: impl Into<String>) -> Self {
        self.schema = schema.into();
        self.table = table.into();
        self
    }

    pub fn with_ssl_mode(mut self, ssl_mode: SslMode) -> Self {
        self.ssl_mode = ssl_mode;
        self
    }

    pub fn with_pool_size(mut self, min: u32, max: u32) -> Self {
        self.min_pool_size = min;
        self.max_pool_size = max;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BackendError> {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("POSTGRES_HOST") {
            config.host = host;
        }
        if let Some(port) = env_parse::<u16>("POSTGRES_PORT")? {
            config.port = port;
        }
        if let Ok(database) = std::env::var("POSTGRES_DB") {
            config.database = database;
        }
        if let Ok(user) = std::env::var("POSTGRES_USER") {
            config.user = user;
        }
        if let Ok(password) = std::env::var("POSTGRES_PASSWORD") {
            config.password = password;
        }
        if let Ok(schema) = std::env::var("POSTGRES_SCHEMA") {
            config.schema = schema;
        }
        if let Ok(table) = std::env::var("POSTGRES_TABLE") {
            config.table = table;
        }
        if let Some(ssl_mode) = env_parse::<SslMode>("POSTGRES_SSLMODE")? {
            config.ssl_mode = ssl_mode;
        }
        if let Some(min) = env_parse::<u32>("POSTGRES_MIN_POOL_SIZE")? {
            config.min_pool_size = min;
        }
        if let Some(max) = env_parse::<u32>("POSTGRES_MAX_POOL_SIZE")? {
            config.max_pool_size = max;
        }
        if let Ok(raw) = std::env::var("POSTGRES_ACQUIRE_TIMEOUT") {
            config.acquire_timeout = humantime_serde::re::humantime::parse_duration(&raw)
                .map_err(|e| BackendError::Config(format!("POSTGRES_ACQUIRE_TIMEOUT: {}", e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BackendError> {
        validate_identifier("schema", &self.schema)?;
        validate_identifier("table", &self.table)?;

        if self.max_pool_size == 0 {
            return Err(BackendError::Config("max_pool_size must be at least 1".to_string()));
        }
        if self.min_pool_size > self.max_pool_size {
            return Err(BackendError::Config(format!(
                "min_pool_size ({}) exceeds max_pool_size ({})",
                self.min_pool_size, self.max_pool_size
            )));
        }
        Ok(())
    }

    /// 따옴표로 감싼 `"schema"."table"`
    pub fn qualified_table(&self) -> String {
        format!("\"{}\".\"{}\"", self.schema, self.table)
    }
}

impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("schema", &self.schema)
            .field("table", &self.table)
            .field("ssl_mode", &self.ssl_mode)
            .field("min_pool_size", &self.min_pool_size)
            .field("max_pool_size", &self.max_pool_size)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

/// SQL 식별자: 영문자/밑줄로 시작, 영숫자/밑줄만, 최대 63자
fn validate_identifier(kind: &str, value: &str) -> Result<(), BackendError> {
    let mut chars = value.chars();
    let valid_start = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid_start || !valid_rest || value.len() > 63 {
        return Err(BackendError::Config(format!("invalid {} name: {:?}", kind, value)));
    }
    Ok(())
}

fn env_parse<T>(key: &str) -> Result<Option<T>, BackendError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| BackendError::Config(format!("{}: {}", key, e))),
        Err(_) => Ok(None),
    }
}
