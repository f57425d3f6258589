// src/codec.rs
//! FileRecord 직렬화
//!
//! 저장 형식 (두 엔진 공통, 외부 도구가 직접 확인할 수 있는 계약):
//!
//! ```json
//! {"content": ["line 1", "line 2"], "created_at": "2024-01-01T00:00:00+00:00", "modified_at": "..."}
//! ```
//!
//! - S3: 객체 본문이 위 JSON 문서
//! - PostgreSQL: `content` 컬럼(JSONB 배열) + `created_at`/`modified_at` 컬럼

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::error::BackendError;
use crate::record::FileRecord;

/// 레코드를 JSON 바이트로 인코딩. 항상 성공합니다.
pub fn encode(record: &FileRecord) -> Vec<u8> {
    json!({
        "content": record.content,
        "created_at": record.created_at.to_rfc3339(),
        "modified_at": record.modified_at.to_rfc3339(),
    })
    .to_string()
    .into_bytes()
}

/// JSON 바이트를 레코드로 디코딩
pub fn decode(path: &str, bytes: &[u8]) -> Result<FileRecord, BackendError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| BackendError::corrupt(path, format!("invalid JSON: {}", e)))?;

    let object = value
        .as_object()
        .ok_or_else(|| BackendError::corrupt(path, "payload is not a JSON object"))?;

    let content = object
        .get("content")
        .ok_or_else(|| BackendError::corrupt(path, "missing 'content' field"))?;

    let created_at = timestamp_field(path, object.get("created_at"), "created_at")?;
    let modified_at = timestamp_field(path, object.get("modified_at"), "modified_at")?;

    decode_row(path, content, created_at, modified_at)
}

/// 관계형 행(컬럼별 값)을 레코드로 디코딩
pub fn decode_row(
    path: &str,
    content: &Value,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
) -> Result<FileRecord, BackendError> {
    let lines = decode_content(path, content)?;

    if modified_at < created_at {
        return Err(BackendError::corrupt(path, "modified_at precedes created_at"));
    }

    Ok(FileRecord::from_parts(lines, created_at, modified_at))
}

/// `content` 값은 문자열 배열이어야 함
pub fn decode_content(path: &str, content: &Value) -> Result<Vec<String>, BackendError> {
    let items = content
        .as_array()
        .ok_or_else(|| BackendError::corrupt(path, "'content' is not an array"))?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_str()
                .map(String::from)
                .ok_or_else(|| BackendError::corrupt(path, format!("content[{}] is not a string", i)))
        })
        .collect()
}

fn timestamp_field(
    path: &str,
    value: Option<&Value>,
    field: &str,
) -> Result<DateTime<Utc>, BackendError> {
    let raw = value
        .and_then(Value::as_str)
        .ok_or_else(|| BackendError::corrupt(path, format!("missing '{}' timestamp", field)))?;

    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| BackendError::corrupt(path, format!("invalid '{}': {}", field, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_corrupt(result: Result<FileRecord, BackendError>) -> bool {
        matches!(result, Err(BackendError::CorruptRecord { .. }))
    }

    #[test]
    fn test_encode_decode() {
        let record = FileRecord::new("first\nsecond");
        let bytes = encode(&record);

        let decoded = decode("/a.txt", &bytes).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_encoded_shape_is_inspectable() {
        let record = FileRecord::new("x");
        let value: Value = serde_json::from_slice(&encode(&record)).unwrap();

        assert_eq!(value["content"], json!(["x"]));
        assert!(value["created_at"].is_string());
        assert!(value["modified_at"].is_string());
    }

    #[test]
    fn test_decode_rejects_bad_shapes() {
        let ts = "2024-01-01T00:00:00+00:00";

        assert!(is_corrupt(decode("/a", b"not json")));
        assert!(is_corrupt(decode("/a", b"[1, 2]")));
        assert!(is_corrupt(decode(
            "/a",
            json!({"created_at": ts, "modified_at": ts}).to_string().as_bytes()
        )));
        assert!(is_corrupt(decode(
            "/a",
            json!({"content": "text", "created_at": ts, "modified_at": ts}).to_string().as_bytes()
        )));
        assert!(is_corrupt(decode(
            "/a",
            json!({"content": ["ok", 3], "created_at": ts, "modified_at": ts}).to_string().as_bytes()
        )));
        assert!(is_corrupt(decode(
            "/a",
            json!({"content": [], "created_at": "yesterday", "modified_at": ts}).to_string().as_bytes()
        )));
    }

    #[test]
    fn test_decode_rejects_time_going_backwards() {
        let payload = json!({
            "content": [],
            "created_at": "2024-02-01T00:00:00+00:00",
            "modified_at": "2024-01-01T00:00:00+00:00",
        });
        assert!(is_corrupt(decode("/a", payload.to_string().as_bytes())));
    }

    #[test]
    fn test_decode_row() {
        let now = Utc::now();
        let record = decode_row("/a", &json!(["l1", "l2"]), now, now).unwrap();
        assert_eq!(record.content, vec!["l1", "l2"]);

        let err = decode_row("/a", &json!({"content": []}), now, now).unwrap_err();
        assert!(matches!(err, BackendError::CorruptRecord { ref path, .. } if path == "/a"));
    }
}
