// src/backends/s3.rs
//! S3 호환 객체 저장소 엔진
//!
//! 파일 하나가 객체 하나입니다. 키는 `{prefix}/{relative path}`,
//! 본문은 JSON 레코드(`codec`)입니다.
//!
//! 배타적 생성은 `If-None-Match: *` 조건부 PUT에 의존합니다. 이를 지원하지 않는
//! 저장소에서는 `conditional_writes = false`로 HEAD 후 PUT을 사용할 수 있지만,
//! 이 경우 동시 생성 사이에 경쟁 구간이 남습니다.
//!
//! SDK 재시도는 비활성화되어 있습니다. 재시도 정책은 호출자 몫입니다.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info, warn};

use super::path_utils::PathMapper;
use super::store::{CreateOutcome, RecordBackend, RecordStore, StoredEntry};
use crate::codec;
use crate::config::S3Config;
use crate::error::BackendError;
use crate::record::FileRecord;

/// 나열/검색 시 동시에 가져오는 객체 수
const FETCH_CONCURRENCY: usize = 16;

const CREDENTIALS_PROVIDER: &str = "deepagents-backends";

/// S3 레코드 저장소
pub struct S3Store {
    client: S3Client,
    bucket: String,
    mapper: PathMapper,
    conditional_writes: bool,
}

impl S3Store {
    /// 정적 자격 증명으로 동기 생성. 네트워크 I/O 없음
    pub fn new(config: &S3Config) -> Result<Self, BackendError> {
        config.validate()?;

        let (Some(access_key_id), Some(secret_access_key)) =
            (&config.access_key_id, &config.secret_access_key)
        else {
            return Err(BackendError::Config(
                "static credentials required; use S3Store::connect for the default credential chain"
                    .to_string(),
            ));
        };

        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            config.session_token.clone(),
            None,
            CREDENTIALS_PROVIDER,
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(config.path_style())
            .retry_config(RetryConfig::disabled());

        if let Some(endpoint) = config.endpoint() {
            builder = builder.endpoint_url(endpoint);
        }

        info!(bucket = %config.bucket, prefix = %config.prefix, "s3 client built with static credentials");
        Ok(Self::from_client(S3Client::from_conf(builder.build()), config))
    }

    /// AWS 기본 자격 증명 체인(환경 변수, 프로필, IMDS 등)으로 생성
    pub async fn connect(config: &S3Config) -> Result<Self, BackendError> {
        config.validate()?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(access_key_id), Some(secret_access_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key_id,
                secret_access_key,
                config.session_token.clone(),
                None,
                CREDENTIALS_PROVIDER,
            ));
        }

        let sdk_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.path_style())
            .retry_config(RetryConfig::disabled());

        if let Some(endpoint) = config.endpoint() {
            builder = builder.endpoint_url(endpoint);
        }

        info!(bucket = %config.bucket, prefix = %config.prefix, "s3 client built from default chain");
        Ok(Self::from_client(S3Client::from_conf(builder.build()), config))
    }

    /// 미리 구성된 클라이언트로 생성 (테스트용)
    pub fn from_client(client: S3Client, config: &S3Config) -> Self {
        Self {
            client,
            bucket: config.bucket.clone(),
            mapper: PathMapper::prefixed(&config.prefix),
            conditional_writes: config.conditional_writes,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn mapper(&self) -> &PathMapper {
        &self.mapper
    }

    async fn put(&self, key: &str, record: &FileRecord) -> Result<(), BackendError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("application/json")
            .body(ByteStream::from(codec::encode(record)))
            .send()
            .await
            .map_err(|err| BackendError::connection(DisplayErrorContext(&err).to_string()))?;
        Ok(())
    }

    async fn head(&self, key: &str) -> Result<bool, BackendError> {
        match self.client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(BackendError::connection(DisplayErrorContext(&service_err).to_string()))
                }
            }
        }
    }

    /// 접두사 아래의 모든 키를 페이지 끝까지 수집해 가상 경로로 변환
    async fn list_paths(&self, dir: &str) -> Result<Vec<String>, BackendError> {
        let prefix = self.mapper.list_prefix(dir);
        let mut paths = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket).prefix(&prefix);

            if let Some(ref token) = continuation_token {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|err| BackendError::connection(DisplayErrorContext(&err).to_string()))?;

            paths.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|object| object.key())
                    .filter_map(|key| self.mapper.from_key(key)),
            );

            match (response.is_truncated(), response.next_continuation_token()) {
                (Some(true), Some(token)) => continuation_token = Some(token.to_string()),
                _ => break,
            }
        }

        debug!(bucket = %self.bucket, prefix = %prefix, count = paths.len(), "listed objects");
        Ok(paths)
    }

    /// 나열된 경로의 레코드를 동시에 가져옴. 그 사이 삭제된 객체와
    /// 디코딩할 수 없는 객체는 건너뜀
    async fn fetch_all(&self, dir: &str) -> Result<Vec<(String, FileRecord)>, BackendError> {
        let paths = self.list_paths(dir).await?;

        let records: Vec<Option<(String, FileRecord)>> = stream::iter(paths)
            .map(|path| async move {
                match self.fetch(&path).await {
                    Ok(record) => Ok(record.map(|record| (path, record))),
                    // fetch에서 이미 경고를 남김
                    Err(BackendError::CorruptRecord { .. }) => Ok(None),
                    Err(e) => Err(e),
                }
            })
            .buffer_unordered(FETCH_CONCURRENCY)
            .try_collect()
            .await?;

        Ok(records.into_iter().flatten().collect())
    }
}

#[async_trait]
impl RecordStore for S3Store {
    fn engine(&self) -> &'static str {
        "s3"
    }

    async fn fetch(&self, path: &str) -> Result<Option<FileRecord>, BackendError> {
        let key = self.mapper.to_key(path);

        let response = match self.client.get_object().bucket(&self.bucket).key(&key).send().await {
            Ok(response) => response,
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    return Ok(None);
                }
                return Err(BackendError::connection(DisplayErrorContext(&service_err).to_string()));
            }
        };

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| BackendError::connection(e.to_string()))?
            .into_bytes();

        codec::decode(path, &bytes)
            .map(Some)
            .inspect_err(|e| warn!(bucket = %self.bucket, key = %key, error = %e, "corrupt object"))
    }

    async fn try_create(&self, path: &str, record: &FileRecord) -> Result<CreateOutcome, BackendError> {
        let key = self.mapper.to_key(path);

        if !self.conditional_writes {
            if self.head(&key).await? {
                return Ok(CreateOutcome::Conflict);
            }
            self.put(&key, record).await?;
            return Ok(CreateOutcome::Created);
        }

        let result = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .if_none_match("*")
            .content_type("application/json")
            .body(ByteStream::from(codec::encode(record)))
            .send()
            .await;

        match result {
            Ok(_) => Ok(CreateOutcome::Created),
            Err(err) => {
                let status = err.raw_response().map(|response| response.status().as_u16());
                let precondition_failed = matches!(status, Some(409) | Some(412))
                    || matches!(err.code(), Some("PreconditionFailed") | Some("ConditionalRequestConflict"));

                if precondition_failed {
                    debug!(bucket = %self.bucket, key = %key, ?status, "conditional put rejected");
                    Ok(CreateOutcome::Conflict)
                } else {
                    Err(BackendError::connection(DisplayErrorContext(&err).to_string()))
                }
            }
        }
    }

    async fn persist(&self, path: &str, record: &FileRecord) -> Result<(), BackendError> {
        self.put(&self.mapper.to_key(path), record).await
    }

    async fn remove(&self, path: &str) -> Result<bool, BackendError> {
        let key = self.mapper.to_key(path);

        // DeleteObject는 없는 키에도 성공하므로 존재 여부는 HEAD로 확인
        if !self.head(&key).await? {
            return Ok(false);
        }

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|err| BackendError::connection(DisplayErrorContext(&err).to_string()))?;
        Ok(true)
    }

    async fn list(&self, dir: &str) -> Result<Vec<StoredEntry>, BackendError> {
        // 줄 수는 본문에만 있으므로 객체를 모두 가져옴
        Ok(self
            .fetch_all(dir)
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
        self.fetch_all(dir).await
    }
}

/// S3 백엔드
pub type S3Backend = RecordBackend<S3Store>;

impl RecordBackend<S3Store> {
    /// 정적 자격 증명으로 동기 생성
    pub fn new(config: &S3Config) -> Result<Self, BackendError> {
        Ok(Self::from_store(S3Store::new(config)?))
    }

    /// 기본 자격 증명 체인으로 생성
    pub async fn connect(config: &S3Config) -> Result<Self, BackendError> {
        Ok(Self::from_store(S3Store::connect(config).await?))
    }

    pub fn from_client(client: S3Client, config: &S3Config) -> Self {
        Self::from_store(S3Store::from_client(client, config))
    }
}
