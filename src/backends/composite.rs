// src/backends/composite.rs
//! 복합 백엔드 - 경로 기반 라우팅
//!
//! 경로 접두사로 요청을 다른 백엔드에 보냅니다. 예를 들어 `/memories`는
//! PostgreSQL, 나머지는 S3에 저장할 수 있습니다. 라우트 백엔드는 접두사를
//! 뗀 경로를 받고, 결과 경로에는 접두사가 다시 붙습니다.

use async_trait::async_trait;
use std::sync::Arc;

use super::path_utils::{is_under_path, normalize_path, relative_to};
use super::protocol::{Backend, EditResult, FileInfo, GrepMatch, ReadResult, WriteResult};
use super::search::{self, GlobMatcher, LineMatcher};
use crate::error::BackendError;

/// 라우트 설정
pub struct Route {
    /// 정규화된 접두사 (`/memories`)
    pub prefix: String,
    pub backend: Arc<dyn Backend>,
}

/// 복합 백엔드
pub struct CompositeBackend {
    default: Arc<dyn Backend>,
    routes: Vec<Route>,
}

impl CompositeBackend {
    pub fn new(default: Arc<dyn Backend>) -> Self {
        Self {
            default,
            routes: Vec::new(),
        }
    }

    /// 라우트 추가 (빌더 패턴). 루트(`/`)는 라우트가 될 수 없음
    pub fn with_route(mut self, prefix: &str, backend: Arc<dyn Backend>) -> Result<Self, BackendError> {
        let prefix = normalize_path(prefix)?;
        if prefix == "/" {
            return Err(BackendError::InvalidPath(prefix));
        }

        self.routes.retain(|route| route.prefix != prefix);
        self.routes.push(Route { prefix, backend });
        // 가장 긴 접두사 먼저
        self.routes.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Ok(self)
    }

    /// 경로에 맞는 라우트와 접두사를 뗀 경로
    fn route_for(&self, path: &str) -> Option<(&Route, String)> {
        self.routes
            .iter()
            .find(|route| is_under_path(path, &route.prefix))
            .map(|route| {
                let stripped = &path[route.prefix.len()..];
                let stripped = if stripped.is_empty() { "/" } else { stripped };
                (route, stripped.to_string())
            })
    }

    /// 경로를 담당하는 백엔드 (라우트가 없으면 기본 백엔드)
    fn resolve(&self, path: &str) -> Target<'_> {
        match self.route_for(path) {
            Some((route, stripped)) => Target {
                backend: route.backend.as_ref(),
                prefix: Some(route.prefix.as_str()),
                path: stripped,
            },
            None => Target {
                backend: self.default.as_ref(),
                prefix: None,
                path: path.to_string(),
            },
        }
    }

    /// `owner` 결과 중 더 깊은 라우트에 가려진 경로인지
    fn is_shadowed(&self, path: &str, owner: Option<&str>) -> bool {
        self.routes.iter().any(|route| {
            owner.map_or(true, |prefix| route.prefix.len() > prefix.len())
                && is_under_path(path, &route.prefix)
        })
    }

    /// 기준 경로 아래에 마운트된 라우트들 (담당 라우트 자신은 제외)
    fn nested_routes<'a>(&'a self, base: &'a str, owner: Option<&'a str>) -> impl Iterator<Item = &'a Route> + 'a {
        self.routes
            .iter()
            .filter(move |route| Some(route.prefix.as_str()) != owner && is_under_path(&route.prefix, base))
    }
}

struct Target<'a> {
    backend: &'a dyn Backend,
    prefix: Option<&'a str>,
    path: String,
}

impl Target<'_> {
    fn restore(&self, path: &str) -> String {
        match self.prefix {
            Some(prefix) => restore_prefix(prefix, path),
            None => path.to_string(),
        }
    }

    fn restore_error(&self, err: BackendError, path: &str) -> BackendError {
        match self.prefix {
            Some(_) => restore_error(err, path),
            None => err,
        }
    }
}

/// 라우트 백엔드 결과 경로에 접두사 복원
fn restore_prefix(prefix: &str, path: &str) -> String {
    if path == "/" {
        prefix.to_string()
    } else {
        format!("{}{}", prefix, path)
    }
}

#[async_trait]
impl Backend for CompositeBackend {
    async fn ls_info(&self, path: &str) -> Result<Vec<FileInfo>, BackendError> {
        let path = normalize_path(path)?;
        let target = self.resolve(&path);

        let mut results: Vec<FileInfo> = target.backend
            .ls_info(&target.path)
            .await?
            .into_iter()
            .map(|mut info| {
                info.path = target.restore(&info.path);
                info
            })
            .filter(|info| !self.is_shadowed(&info.path, target.prefix))
            .collect();

        for route in self.nested_routes(&path, target.prefix) {
            let route_results = route.backend.ls_info("/").await?;
            results.extend(
                route_results
                    .into_iter()
                    .map(|mut info| {
                        info.path = restore_prefix(&route.prefix, &info.path);
                        info
                    })
                    .filter(|info| !self.is_shadowed(&info.path, Some(route.prefix.as_str()))),
            );
        }

        results.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(results)
    }

    async fn read(
        &self,
        path: &str,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<ReadResult, BackendError> {
        let path = normalize_path(path)?;
        let target = self.resolve(&path);

        let mut result = target.backend
            .read(&target.path, offset, limit)
            .await
            .map_err(|e| target.restore_error(e, &path))?;
        result.path = path;
        Ok(result)
    }

    async fn write(&self, path: &str, content: &str) -> Result<WriteResult, BackendError> {
        let path = normalize_path(path)?;
        let target = self.resolve(&path);

        target.backend
            .write(&target.path, content)
            .await
            .map_err(|e| target.restore_error(e, &path))?;
        Ok(WriteResult { path })
    }

    async fn edit(
        &self,
        path: &str,
        old_string: &str,
        new_string: &str,
        replace_all: bool,
    ) -> Result<EditResult, BackendError> {
        let path = normalize_path(path)?;
        let target = self.resolve(&path);

        let result = target.backend
            .edit(&target.path, old_string, new_string, replace_all)
            .await
            .map_err(|e| target.restore_error(e, &path))?;
        Ok(EditResult { path, occurrences: result.occurrences })
    }

    async fn glob_info(&self, pattern: &str, path: &str) -> Result<Vec<FileInfo>, BackendError> {
        let base = normalize_path(path)?;

        // 담당 백엔드와 하위 라우트를 모두 집계한 뒤 기준 경로에 대해 매칭
        let entries = self.ls_info(&base).await?;
        search::glob_entries(entries, pattern, &base)
    }

    async fn grep(
        &self,
        matcher: &LineMatcher,
        path: Option<&str>,
        glob_filter: Option<&str>,
    ) -> Result<Vec<GrepMatch>, BackendError> {
        let base = normalize_path(path.unwrap_or("/"))?;
        let target = self.resolve(&base);

        let mut all_results: Vec<GrepMatch> = target.backend
            .grep(matcher, Some(target.path.as_str()), glob_filter)
            .await?
            .into_iter()
            .map(|mut m| {
                m.path = target.restore(&m.path);
                m
            })
            .filter(|m| !self.is_shadowed(&m.path, target.prefix))
            .collect();

        // 하위 라우트 결과의 파일 필터는 검색 기준 경로에 대한 상대 경로로 적용
        let filter = glob_filter.map(GlobMatcher::filter).transpose()?;
        for route in self.nested_routes(&base, target.prefix) {
            let route_results = route.backend.grep(matcher, Some("/"), None).await?;
            all_results.extend(
                route_results
                    .into_iter()
                    .map(|mut m| {
                        m.path = restore_prefix(&route.prefix, &m.path);
                        m
                    })
                    .filter(|m| !self.is_shadowed(&m.path, Some(route.prefix.as_str())))
                    .filter(|m| filter.as_ref().map_or(true, |g| g.matches(relative_to(&m.path, &base)))),
            );
        }

        all_results.sort_by(|a, b| a.path.cmp(&b.path).then(a.line.cmp(&b.line)));
        Ok(all_results)
    }

    async fn exists(&self, path: &str) -> Result<bool, BackendError> {
        let path = normalize_path(path)?;
        let target = self.resolve(&path);

        target.backend
            .exists(&target.path)
            .await
            .map_err(|e| target.restore_error(e, &path))
    }

    async fn delete(&self, path: &str) -> Result<(), BackendError> {
        let path = normalize_path(path)?;
        let target = self.resolve(&path);

        target.backend
            .delete(&target.path)
            .await
            .map_err(|e| target.restore_error(e, &path))
    }
}

/// 라우트 백엔드 에러의 경로를 호출자가 준 경로로 되돌림
fn restore_error(err: BackendError, path: &str) -> BackendError {
    let path = path.to_string();
    match err {
        BackendError::NotFound(_) => BackendError::NotFound(path),
        BackendError::AlreadyExists(_) => BackendError::AlreadyExists(path),
        BackendError::InvalidPath(_) => BackendError::InvalidPath(path),
        BackendError::NoMatch { old, .. } => BackendError::NoMatch { path, old },
        BackendError::AmbiguousMatch { occurrences, .. } => BackendError::AmbiguousMatch { path, occurrences },
        BackendError::CorruptRecord { reason, .. } => BackendError::CorruptRecord { path, reason },
        other => other,
    }
}
