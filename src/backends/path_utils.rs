// src/backends/path_utils.rs
//! 경로 정규화 및 키 매핑 유틸리티
//!
//! 모든 백엔드에서 일관된 경로 처리를 위한 헬퍼 함수들
//!
//! # Path Model
//!
//! - Virtual paths are normalized once at the operation boundary: a leading `/`
//!   is added and a single trailing `/` is dropped. Nothing else is rewritten;
//!   two paths name the same file iff their normalized forms are equal strings.
//! - `..` and `~` are rejected as traversal. Empty and `.` segments are
//!   rejected as invalid rather than collapsed.
//! - [`PathMapper`] turns a normalized virtual path into an engine key and
//!   back. It is injective on normalized paths.

use crate::error::BackendError;

/// 경로 정규화
/// - 앞에 `/` 추가
/// - 후행 슬래시 하나 제거 (루트 제외)
/// - `..` 세그먼트와 `~` 시작은 차단
/// - 빈 세그먼트(`//`)와 `.` 세그먼트는 `InvalidPath`
pub fn normalize_path(path: &str) -> Result<String, BackendError> {
    if path.split('/').any(|segment| segment == "..") || path.starts_with('~') {
        return Err(BackendError::PathTraversal(path.to_string()));
    }

    if path.chars().any(char::is_control) {
        return Err(BackendError::InvalidPath(path.to_string()));
    }

    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);

    if trimmed.is_empty() {
        return Ok("/".to_string());
    }

    if trimmed.split('/').any(|segment| segment.is_empty() || segment == ".") {
        return Err(BackendError::InvalidPath(path.to_string()));
    }

    Ok(format!("/{}", trimmed))
}

/// 파일 경로 정규화 (루트는 파일이 될 수 없음)
pub fn normalize_file_path(path: &str) -> Result<String, BackendError> {
    let normalized = normalize_path(path)?;
    if normalized == "/" {
        return Err(BackendError::InvalidPath(path.to_string()));
    }
    Ok(normalized)
}

/// 경로가 base_path 하위에 있는지 확인
/// `/dir`은 `/dir2`와 매칭되지 않음 (정확한 디렉토리 경계 확인)
pub fn is_under_path(path: &str, base_path: &str) -> bool {
    let normalized_base = base_path.trim_end_matches('/');

    if normalized_base.is_empty() {
        return true;  // 루트는 모든 경로 포함
    }

    if path == normalized_base {
        return true;
    }

    path.strip_prefix(normalized_base)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// base_path 기준 상대 경로 (앞의 `/` 없음)
pub fn relative_to<'a>(path: &'a str, base_path: &str) -> &'a str {
    let normalized_base = base_path.trim_end_matches('/');
    path.strip_prefix(normalized_base)
        .unwrap_or(path)
        .trim_start_matches('/')
}

/// 가상 경로 <-> 엔진 키 매핑
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathMapper {
    /// 객체 저장소: 설정된 접두사 세그먼트를 앞에 붙임
    /// (`/a/b.txt` + `proj1` -> `proj1/a/b.txt`)
    Prefixed(String),
    /// 관계형: 가상 경로 자체가 기본 키
    Identity,
}

impl PathMapper {
    /// 접두사 매퍼. 앞뒤 슬래시는 제거되고, 빈 접두사는 버킷 루트를 뜻함
    pub fn prefixed(prefix: &str) -> Self {
        Self::Prefixed(prefix.trim_matches('/').to_string())
    }

    /// 정규화된 가상 경로 -> 엔진 키
    pub fn to_key(&self, path: &str) -> String {
        match self {
            Self::Identity => path.to_string(),
            Self::Prefixed(prefix) => {
                let relative = path.trim_start_matches('/');
                if prefix.is_empty() {
                    relative.to_string()
                } else {
                    format!("{}/{}", prefix, relative)
                }
            }
        }
    }

    /// 엔진 키 -> 가상 경로. 이 매퍼가 만들 수 없는 키는 `None`
    pub fn from_key(&self, key: &str) -> Option<String> {
        match self {
            Self::Identity => Some(key.to_string()),
            Self::Prefixed(prefix) => {
                let relative = if prefix.is_empty() {
                    key
                } else {
                    key.strip_prefix(prefix.as_str())?.strip_prefix('/')?
                };

                // 디렉토리 마커 객체나 정규화될 수 없는 키는 파일이 아님
                if relative
                    .split('/')
                    .any(|segment| segment.is_empty() || segment == "." || segment == "..")
                {
                    return None;
                }
                Some(format!("/{}", relative))
            }
        }
    }

    /// 디렉토리 하위 키를 나열하기 위한 원시 키 접두사.
    /// 디렉토리 경계 확인은 호출 측에서 `is_under_path`로 수행
    pub fn list_prefix(&self, dir: &str) -> String {
        if dir == "/" {
            return match self {
                Self::Identity => "/".to_string(),
                Self::Prefixed(prefix) if prefix.is_empty() => String::new(),
                Self::Prefixed(prefix) => format!("{}/", prefix),
            };
        }
        self.to_key(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_basic() {
        assert_eq!(normalize_path("/test.txt").unwrap(), "/test.txt");
        assert_eq!(normalize_path("test.txt").unwrap(), "/test.txt");
        assert_eq!(normalize_path("/dir/file.txt").unwrap(), "/dir/file.txt");
        assert_eq!(normalize_path("").unwrap(), "/");
    }

    #[test]
    fn test_normalize_path_rejects_empty_segments() {
        assert!(matches!(normalize_path("/dir//file.txt"), Err(BackendError::InvalidPath(_))));
        assert!(matches!(normalize_path("//dir/file.txt"), Err(BackendError::InvalidPath(_))));
        assert!(matches!(normalize_path("/dir//"), Err(BackendError::InvalidPath(_))));
    }

    #[test]
    fn test_normalize_path_trailing_slash() {
        assert_eq!(normalize_path("/dir/").unwrap(), "/dir");
        assert_eq!(normalize_path("/").unwrap(), "/");
    }

    #[test]
    fn test_normalize_path_traversal_attack() {
        assert!(normalize_path("../etc/passwd").is_err());
        assert!(normalize_path("/dir/../etc/passwd").is_err());
        assert!(normalize_path("~/.ssh/id_rsa").is_err());
        // ".." 가 세그먼트가 아니면 허용
        assert_eq!(normalize_path("/notes..txt").unwrap(), "/notes..txt");
    }

    #[test]
    fn test_normalize_path_rejects_dot_segments() {
        assert!(matches!(normalize_path("/./file.txt"), Err(BackendError::InvalidPath(_))));
        assert!(matches!(normalize_path("/dir/./sub/file.txt"), Err(BackendError::InvalidPath(_))));
        assert!(matches!(normalize_path("/dir/."), Err(BackendError::InvalidPath(_))));
        // 점으로 시작하는 이름은 허용
        assert_eq!(normalize_path("/.env").unwrap(), "/.env");
    }

    #[test]
    fn test_normalize_file_path_rejects_root() {
        assert!(matches!(normalize_file_path("/"), Err(BackendError::InvalidPath(_))));
        assert!(matches!(normalize_file_path(""), Err(BackendError::InvalidPath(_))));
    }

    #[test]
    fn test_is_under_path() {
        assert!(is_under_path("/dir/file.txt", "/dir"));
        assert!(is_under_path("/dir/sub/file.txt", "/dir/"));
        assert!(is_under_path("/dir", "/dir"));
        assert!(is_under_path("/anything", "/"));

        assert!(!is_under_path("/dir2/file.txt", "/dir"));
        assert!(!is_under_path("/directory/file.txt", "/dir"));
    }

    #[test]
    fn test_relative_to() {
        assert_eq!(relative_to("/src/a.py", "/src"), "a.py");
        assert_eq!(relative_to("/src/sub/b.py", "/"), "src/sub/b.py");
    }

    #[test]
    fn test_prefixed_mapper() {
        let mapper = PathMapper::prefixed("proj1");
        assert_eq!(mapper.to_key("/a/b.txt"), "proj1/a/b.txt");
        assert_eq!(mapper.from_key("proj1/a/b.txt").as_deref(), Some("/a/b.txt"));
        assert_eq!(mapper.list_prefix("/"), "proj1/");
        assert_eq!(mapper.list_prefix("/src"), "proj1/src");

        // 다른 접두사나 디렉토리 마커는 매핑되지 않음
        assert_eq!(mapper.from_key("proj10/a.txt"), None);
        assert_eq!(mapper.from_key("proj1/dir/"), None);
        assert_eq!(mapper.from_key("proj1/a//b.txt"), None);
        assert_eq!(mapper.from_key("proj1/./b.txt"), None);
    }

    #[test]
    fn test_prefixed_mapper_trims_slashes_and_empty_prefix() {
        assert_eq!(PathMapper::prefixed("/proj1/").to_key("/x"), "proj1/x");

        let root = PathMapper::prefixed("");
        assert_eq!(root.to_key("/a/b.txt"), "a/b.txt");
        assert_eq!(root.from_key("a/b.txt").as_deref(), Some("/a/b.txt"));
        assert_eq!(root.list_prefix("/"), "");
    }

    #[test]
    fn test_identity_mapper() {
        let mapper = PathMapper::Identity;
        assert_eq!(mapper.to_key("/a/b.txt"), "/a/b.txt");
        assert_eq!(mapper.from_key("/a/b.txt").as_deref(), Some("/a/b.txt"));
        assert_eq!(mapper.list_prefix("/"), "/");
    }

    #[test]
    fn test_mapper_left_inverse() {
        let mapper = PathMapper::prefixed("ws");
        for path in ["/a", "/a/b", "/deep/ly/nested/file.rs", "/with space.txt"] {
            assert_eq!(mapper.from_key(&mapper.to_key(path)).as_deref(), Some(path));
        }
    }
}
