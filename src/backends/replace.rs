// src/backends/replace.rs
//! 편집용 문자열 교체
//!
//! 백엔드는 교체 알고리즘을 직접 구현하지 않고 주입된 [`StringReplacer`]에
//! 위임합니다. 기본 구현은 리터럴 교체입니다.

use thiserror::Error;

/// 교체 전제 조건 위반
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplaceError {
    #[error("string not found")]
    NoMatch,

    #[error("string found {0} times")]
    Ambiguous(usize),
}

/// 교체 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub content: String,
    pub occurrences: usize,
}

/// 순수 함수 형태의 교체기: 같은 입력에 같은 결과
pub trait StringReplacer: Send + Sync {
    fn replace(
        &self,
        content: &str,
        old: &str,
        new: &str,
        replace_all: bool,
    ) -> Result<Replacement, ReplaceError>;
}

/// 리터럴 문자열 교체
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralReplacer;

impl StringReplacer for LiteralReplacer {
    fn replace(
        &self,
        content: &str,
        old: &str,
        new: &str,
        replace_all: bool,
    ) -> Result<Replacement, ReplaceError> {
        let occurrences = if old.is_empty() { 0 } else { content.matches(old).count() };

        if occurrences == 0 {
            return Err(ReplaceError::NoMatch);
        }

        if !replace_all && occurrences > 1 {
            return Err(ReplaceError::Ambiguous(occurrences));
        }

        let content = if replace_all {
            content.replace(old, new)
        } else {
            content.replacen(old, new, 1)
        };

        Ok(Replacement { content, occurrences })
    }
}

/// 함수 포인터/클로저도 교체기로 사용 가능
impl<F> StringReplacer for F
where
    F: Fn(&str, &str, &str, bool) -> Result<Replacement, ReplaceError> + Send + Sync,
{
    fn replace(
        &self,
        content: &str,
        old: &str,
        new: &str,
        replace_all: bool,
    ) -> Result<Replacement, ReplaceError> {
        self(content, old, new, replace_all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_replacement() {
        let result = LiteralReplacer.replace("Hello World", "World", "Rust", false).unwrap();
        assert_eq!(result.content, "Hello Rust");
        assert_eq!(result.occurrences, 1);
    }

    #[test]
    fn test_ambiguous_without_replace_all() {
        let err = LiteralReplacer.replace("foo bar foo", "foo", "baz", false).unwrap_err();
        assert_eq!(err, ReplaceError::Ambiguous(2));
    }

    #[test]
    fn test_replace_all() {
        let result = LiteralReplacer.replace("foo bar foo", "foo", "baz", true).unwrap();
        assert_eq!(result.content, "baz bar baz");
        assert_eq!(result.occurrences, 2);
    }

    #[test]
    fn test_no_match() {
        assert_eq!(LiteralReplacer.replace("abc", "xyz", "", false), Err(ReplaceError::NoMatch));
        assert_eq!(LiteralReplacer.replace("abc", "", "x", true), Err(ReplaceError::NoMatch));
    }

    #[test]
    fn test_multiline_replacement() {
        let result = LiteralReplacer.replace("a\nb\nc", "b\nc", "B", false).unwrap();
        assert_eq!(result.content, "a\nB");
    }
}
