//! Operation semantics shared by every engine, exercised on the in-memory engine.

use std::sync::Arc;

use deepagents_backends::backends::replace::{ReplaceError, Replacement};
use deepagents_backends::{Backend, BackendError, BlockingBackend, CompositeBackend, MemoryBackend};

static_assertions::assert_impl_all!(MemoryBackend: Send, Sync);
static_assertions::assert_impl_all!(CompositeBackend: Send, Sync);
static_assertions::assert_impl_all!(BlockingBackend<MemoryBackend>: Send, Sync);
static_assertions::assert_obj_safe!(Backend);

#[cfg(feature = "s3")]
static_assertions::assert_impl_all!(deepagents_backends::S3Backend: Send, Sync);

#[cfg(feature = "postgres")]
static_assertions::assert_impl_all!(deepagents_backends::PostgresBackend: Send, Sync);

#[tokio::test]
async fn write_then_read_returns_exact_content() {
    let backend = MemoryBackend::new();
    let content = "line one\nline two\n\nline four";

    backend.write("/docs/a.md", content).await.unwrap();

    let read = backend.read("/docs/a.md", 0, None).await.unwrap();
    assert_eq!(read.text(), content);
    assert_eq!(read.total_lines, 4);
    assert!(read.modified_at >= read.created_at);
}

#[tokio::test]
async fn second_write_fails_and_keeps_original() {
    let backend = MemoryBackend::new();
    backend.write("/a.txt", "original").await.unwrap();

    let err = backend.write("/a.txt", "replacement").await.unwrap_err();
    assert_eq!(err, BackendError::AlreadyExists("/a.txt".into()));
    assert_eq!(backend.read("/a.txt", 0, None).await.unwrap().text(), "original");
}

#[tokio::test]
async fn edit_preconditions() {
    let backend = MemoryBackend::new();
    backend.write("/a.txt", "alpha beta\ngamma beta").await.unwrap();

    let err = backend.edit("/a.txt", "beta", "B", false).await.unwrap_err();
    assert!(matches!(err, BackendError::AmbiguousMatch { occurrences: 2, .. }));

    let err = backend.edit("/a.txt", "delta", "D", false).await.unwrap_err();
    assert!(matches!(err, BackendError::NoMatch { .. }));

    // 실패한 편집은 내용을 바꾸지 않음
    assert_eq!(backend.read("/a.txt", 0, None).await.unwrap().text(), "alpha beta\ngamma beta");

    let result = backend.edit("/a.txt", "alpha", "ALPHA", false).await.unwrap();
    assert_eq!(result.occurrences, 1);
    assert_eq!(backend.read("/a.txt", 0, None).await.unwrap().text(), "ALPHA beta\ngamma beta");

    let result = backend.edit("/a.txt", "beta", "B", true).await.unwrap();
    assert_eq!(result.occurrences, 2);
    assert_eq!(backend.read("/a.txt", 0, None).await.unwrap().text(), "ALPHA B\ngamma B");
}

#[tokio::test]
async fn edit_keeps_created_at_and_advances_modified_at() {
    let backend = MemoryBackend::new();
    backend.write("/a.txt", "v1").await.unwrap();
    let before = backend.read("/a.txt", 0, None).await.unwrap();

    backend.edit("/a.txt", "v1", "v2", false).await.unwrap();
    let after = backend.read("/a.txt", 0, None).await.unwrap();

    assert_eq!(after.created_at, before.created_at);
    assert!(after.modified_at >= before.modified_at);
}

#[tokio::test]
async fn edit_missing_file_is_not_found() {
    let backend = MemoryBackend::new();
    let err = backend.edit("/missing.txt", "a", "b", false).await.unwrap_err();
    assert_eq!(err, BackendError::NotFound("/missing.txt".into()));
}

#[tokio::test]
async fn read_window_reports_total_lines() {
    let backend = MemoryBackend::new();
    backend.write("/five.txt", "l0\nl1\nl2\nl3\nl4").await.unwrap();

    let read = backend.read("/five.txt", 2, Some(1)).await.unwrap();
    assert_eq!(read.lines, vec!["l2"]);
    assert_eq!(read.total_lines, 5);
    assert_eq!(read.numbered(), "3\tl2");

    let past_end = backend.read("/five.txt", 10, None).await.unwrap();
    assert!(past_end.lines.is_empty());
    assert_eq!(past_end.total_lines, 5);
}

#[tokio::test]
async fn read_missing_file_is_not_found() {
    let backend = MemoryBackend::new();
    assert!(backend.read("/nope.txt", 0, None).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn glob_matches_relative_paths() {
    let backend = MemoryBackend::new();
    backend.write("/src/a.py", "").await.unwrap();
    backend.write("/src/sub/b.py", "").await.unwrap();
    backend.write("/src/a.txt", "").await.unwrap();

    let results = backend.glob_info("**/*.py", "/").await.unwrap();
    let paths: Vec<&str> = results.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["/src/a.py", "/src/sub/b.py"]);

    // 기준 경로 상대 매칭: `*`는 디렉토리를 넘지 않음
    let results = backend.glob_info("*.py", "/src").await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].path, "/src/a.py");
}

#[tokio::test]
async fn grep_reports_one_based_lines_in_order() {
    let backend = MemoryBackend::new();
    backend.write("/b.txt", "TODO: later\nTODO: also").await.unwrap();
    backend.write("/a.txt", "TODO: x\ndone").await.unwrap();

    let matches = backend.grep_raw("TODO", None, None).await.unwrap();
    let found: Vec<(&str, usize, &str)> = matches
        .iter()
        .map(|m| (m.path.as_str(), m.line, m.text.as_str()))
        .collect();

    assert_eq!(
        found,
        vec![
            ("/a.txt", 1, "TODO: x"),
            ("/b.txt", 1, "TODO: later"),
            ("/b.txt", 2, "TODO: also"),
        ]
    );
}

#[tokio::test]
async fn grep_raw_is_literal_and_grep_regex_is_not() {
    let backend = MemoryBackend::new();
    backend.write("/code.rs", "let a = b.len();\nlet c = bxlen;").await.unwrap();

    let literal = backend.grep_raw("b.len", None, None).await.unwrap();
    assert_eq!(literal.len(), 1);

    let regex = backend.grep_regex("b.len", None, None).await.unwrap();
    assert_eq!(regex.len(), 2);

    let err = backend.grep_regex("(unclosed", None, None).await.unwrap_err();
    assert!(matches!(err, BackendError::Pattern(_)));
}

#[tokio::test]
async fn grep_glob_filter_and_base_path() {
    let backend = MemoryBackend::new();
    backend.write("/src/main.py", "import os").await.unwrap();
    backend.write("/src/deep/util.py", "import sys").await.unwrap();
    backend.write("/src/notes.md", "import nothing").await.unwrap();
    backend.write("/other/x.py", "import re").await.unwrap();

    let matches = backend.grep_raw("import", Some("/src"), Some("*.py")).await.unwrap();
    let paths: Vec<&str> = matches.iter().map(|m| m.path.as_str()).collect();
    assert_eq!(paths, vec!["/src/deep/util.py", "/src/main.py"]);
}

#[tokio::test]
async fn concurrent_writes_to_same_path_have_one_winner() {
    let backend = Arc::new(MemoryBackend::new());

    let mut handles = Vec::new();
    for i in 0..8 {
        let backend = backend.clone();
        handles.push(tokio::spawn(async move {
            backend.write("/race.txt", &format!("writer {}", i)).await
        }));
    }

    let mut created = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(BackendError::AlreadyExists(_)) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(conflicts, 7);
}

#[tokio::test]
async fn bulk_download_isolates_failures() {
    let backend = MemoryBackend::new();
    backend.write("/p1.txt", "hello\nworld").await.unwrap();

    let responses = backend
        .download_files(vec!["/p1.txt".into(), "/missing.txt".into()])
        .await;

    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].path, "/p1.txt");
    assert_eq!(responses[0].content.as_deref(), Some(b"hello\nworld".as_slice()));
    assert!(responses[0].is_ok());
    assert_eq!(responses[1].path, "/missing.txt");
    assert_eq!(responses[1].error, Some(BackendError::NotFound("/missing.txt".into())));
}

#[tokio::test]
async fn trailing_newline_is_preserved() {
    let backend = MemoryBackend::new();
    backend.write("/notes.md", "# Notes\nfirst\n").await.unwrap();

    let read = backend.read("/notes.md", 0, None).await.unwrap();
    assert_eq!(read.text(), "# Notes\nfirst\n");
    assert_eq!(read.total_lines, 3);

    backend.edit("/notes.md", "first", "second", false).await.unwrap();
    assert_eq!(backend.read("/notes.md", 0, None).await.unwrap().text(), "# Notes\nsecond\n");

    let payload = b"# Utility functions\n".to_vec();
    let uploaded = backend.upload_files(vec![("/utils.py".into(), payload.clone())]).await;
    assert!(uploaded[0].is_ok());

    let downloaded = backend.download_files(vec!["/utils.py".into()]).await;
    assert_eq!(downloaded[0].content.as_deref(), Some(payload.as_slice()));
}

#[tokio::test]
async fn bulk_upload_isolates_failures() {
    let backend = MemoryBackend::new();
    backend.write("/taken.txt", "x").await.unwrap();

    let responses = backend
        .upload_files(vec![
            ("/new.txt".into(), b"fresh".to_vec()),
            ("/taken.txt".into(), b"again".to_vec()),
            ("/binary.bin".into(), vec![0xff, 0xfe]),
        ])
        .await;

    assert!(responses[0].is_ok());
    assert_eq!(responses[1].error, Some(BackendError::AlreadyExists("/taken.txt".into())));
    assert_eq!(responses[2].error, Some(BackendError::InvalidEncoding("/binary.bin".into())));
    assert_eq!(backend.read("/new.txt", 0, None).await.unwrap().text(), "fresh");
    assert!(!backend.exists("/binary.bin").await.unwrap());
}

#[tokio::test]
async fn paths_are_normalized() {
    let backend = MemoryBackend::new();
    backend.write("hello.txt", "hi").await.unwrap();

    assert!(backend.exists("/hello.txt").await.unwrap());
    assert!(backend.exists("/hello.txt/").await.unwrap());
    assert!(matches!(backend.exists("/dir//hello.txt").await, Err(BackendError::InvalidPath(_))));
    assert!(matches!(backend.write("/./x.txt", "x").await, Err(BackendError::InvalidPath(_))));
    assert_eq!(backend.ls_info("/").await.unwrap()[0].path, "/hello.txt");

    let err = backend.read("/../etc/passwd", 0, None).await.unwrap_err();
    assert!(matches!(err, BackendError::PathTraversal(_)));
}

#[tokio::test]
async fn ls_shows_immediate_children() {
    let backend = MemoryBackend::new();
    backend.write("/a.txt", "a").await.unwrap();
    backend.write("/dir/b.txt", "b").await.unwrap();
    backend.write("/dir/sub/c.txt", "c").await.unwrap();
    backend.write("/dirty.txt", "d").await.unwrap();

    let root = backend.ls("/").await.unwrap();
    let paths: Vec<(&str, bool)> = root.iter().map(|f| (f.path.as_str(), f.is_dir)).collect();
    assert_eq!(paths, vec![("/a.txt", false), ("/dir/", true), ("/dirty.txt", false)]);

    let dir = backend.ls("/dir").await.unwrap();
    let paths: Vec<&str> = dir.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["/dir/b.txt", "/dir/sub/"]);
}

#[tokio::test]
async fn custom_replacer_is_used_for_edits() {
    let shouting = |content: &str, old: &str, new: &str, _all: bool| -> Result<Replacement, ReplaceError> {
        if !content.contains(old) {
            return Err(ReplaceError::NoMatch);
        }
        Ok(Replacement { content: content.replace(old, &new.to_uppercase()), occurrences: 1 })
    };

    let backend = MemoryBackend::new().with_replacer(Arc::new(shouting));
    backend.write("/a.txt", "hello world").await.unwrap();
    backend.edit("/a.txt", "world", "there", false).await.unwrap();

    assert_eq!(backend.read("/a.txt", 0, None).await.unwrap().text(), "hello THERE");
}

#[tokio::test]
async fn composite_routes_by_prefix() {
    let default = Arc::new(MemoryBackend::new());
    let memories = Arc::new(MemoryBackend::new());
    let composite = CompositeBackend::new(default.clone())
        .with_route("/memories", memories.clone())
        .unwrap();

    composite.write("/memories/todo.md", "TODO: ship").await.unwrap();
    composite.write("/scratch.md", "TODO: draft").await.unwrap();

    let matches = composite.grep_raw("TODO", None, Some("*.md")).await.unwrap();
    let paths: Vec<&str> = matches.iter().map(|m| m.path.as_str()).collect();
    assert_eq!(paths, vec!["/memories/todo.md", "/scratch.md"]);

    composite.delete("/memories/todo.md").await.unwrap();
    assert!(!memories.exists("/todo.md").await.unwrap());
}
