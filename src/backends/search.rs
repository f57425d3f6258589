// src/backends/search.rs
//! Glob/Grep 검색 엔진
//!
//! 엔진과 무관하게 동작합니다. 백엔드는 경로 목록과 레코드를 나열만 하고,
//! 와일드카드 해석은 항상 여기서 수행합니다 (키 접두사 질의와 glob 의미가
//! 다르기 때문).

use std::collections::BTreeSet;

use glob::{MatchOptions, Pattern};
use regex::Regex;

use super::path_utils::{is_under_path, relative_to};
use super::protocol::{FileInfo, GrepMatch};
use crate::error::BackendError;
use crate::record::FileRecord;

const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    // `*`, `?`는 `/`를 넘지 않고, `**`만 디렉토리를 가로지름
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// 셸 스타일 glob 매처
#[derive(Debug, Clone)]
pub struct GlobMatcher {
    pattern: Pattern,
    /// `/`가 없는 패턴은 파일 이름에만 매칭 (grep 필터용)
    name_only: bool,
}

impl GlobMatcher {
    pub fn new(pattern: &str) -> Result<Self, BackendError> {
        let trimmed = pattern.trim_start_matches('/');
        let compiled = Pattern::new(trimmed)
            .map_err(|e| BackendError::Pattern(format!("{}: {}", pattern, e)))?;
        Ok(Self { pattern: compiled, name_only: false })
    }

    /// grep 파일 필터: `*.py`는 어느 깊이의 파일 이름이든 매칭
    pub fn filter(pattern: &str) -> Result<Self, BackendError> {
        let mut matcher = Self::new(pattern)?;
        matcher.name_only = !pattern.contains('/');
        Ok(matcher)
    }

    /// `relative`는 검색 기준 경로에 대한 상대 경로 (앞의 `/` 없음)
    pub fn matches(&self, relative: &str) -> bool {
        let subject = if self.name_only {
            relative.rsplit('/').next().unwrap_or(relative)
        } else {
            relative
        };
        self.pattern.matches_with(subject, GLOB_OPTIONS)
    }
}

/// 라인 매처
#[derive(Debug, Clone)]
pub enum LineMatcher {
    Literal(String),
    Regex(Regex),
}

impl LineMatcher {
    pub fn literal(pattern: &str) -> Self {
        Self::Literal(pattern.to_string())
    }

    pub fn regex(pattern: &str) -> Result<Self, BackendError> {
        Regex::new(pattern)
            .map(Self::Regex)
            .map_err(|e| BackendError::Pattern(e.to_string()))
    }

    pub fn is_match(&self, line: &str) -> bool {
        match self {
            Self::Literal(needle) => line.contains(needle.as_str()),
            Self::Regex(re) => re.is_match(line),
        }
    }
}

/// 파일 목록에서 glob 매칭 (base 하위만, 경로 사전순)
pub fn glob_entries(
    entries: Vec<FileInfo>,
    pattern: &str,
    base: &str,
) -> Result<Vec<FileInfo>, BackendError> {
    let matcher = GlobMatcher::new(pattern)?;

    let mut results: Vec<FileInfo> = entries
        .into_iter()
        .filter(|info| !info.is_dir && is_under_path(&info.path, base))
        .filter(|info| matcher.matches(relative_to(&info.path, base)))
        .collect();

    results.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(results)
}

/// 레코드 라인 스캔. 결과는 경로, 라인 번호 순
pub fn grep_records(
    records: &[(String, FileRecord)],
    matcher: &LineMatcher,
    base: &str,
    glob_filter: Option<&GlobMatcher>,
) -> Vec<GrepMatch> {
    let mut ordered: Vec<&(String, FileRecord)> = records
        .iter()
        .filter(|(path, _)| is_under_path(path, base))
        .filter(|(path, _)| glob_filter.map_or(true, |g| g.matches(relative_to(path, base))))
        .collect();
    ordered.sort_by(|a, b| a.0.cmp(&b.0));

    let mut results = Vec::new();
    for (path, record) in ordered {
        for (line_num, line) in record.content.iter().enumerate() {
            if matcher.is_match(line) {
                results.push(GrepMatch::new(path, line_num + 1, line));
            }
        }
    }
    results
}

/// 재귀 목록을 디렉토리 뷰로 접기
pub fn directory_view(entries: &[FileInfo], dir: &str) -> Vec<FileInfo> {
    let base = dir.trim_end_matches('/');
    let mut dirs_seen = BTreeSet::new();
    let mut results = Vec::new();

    for info in entries {
        if info.path == base || !is_under_path(&info.path, dir) {
            continue;
        }

        let relative = relative_to(&info.path, dir);
        match relative.split_once('/') {
            Some((sub_dir, _)) => {
                let dir_path = format!("{}/{}/", base, sub_dir);
                if dirs_seen.insert(dir_path.clone()) {
                    results.push(FileInfo::dir(&dir_path));
                }
            }
            None => results.push(info.clone()),
        }
    }

    results.sort_by(|a, b| a.path.cmp(&b.path));
    results
}
