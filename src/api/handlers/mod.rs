pub mod analytics;
pub mod health;
pub mod kv7;
pub mod logs;
pub mod sql;

use axum::Json;
use chrono::{DateTime, NaiveDateTime};
use serde_json::{json, Value};

use crate::api::middleware::AppError;
use crate::models::Source;

/// Query-string value with blanks treated as absent.
pub(crate) fn present(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Integer parameter that falls back to the default when malformed.
pub(crate) fn lenient_int(raw: &Option<String>) -> Option<i64> {
    present(raw).and_then(|s| s.parse().ok())
}

/// Integer parameter that rejects malformed input.
pub(crate) fn strict_int(name: &str, raw: &Option<String>) -> Result<Option<i64>, AppError> {
    present(raw)
        .map(|s| {
            s.parse()
                .map_err(|_| AppError::Validation(format!("Invalid {}: {}", name, s)))
        })
        .transpose()
}

pub(crate) fn strict_rfc3339(name: &str, raw: &Option<String>) -> Result<Option<NaiveDateTime>, AppError> {
    present(raw)
        .map(|s| {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.naive_utc())
                .map_err(|_| AppError::Validation(format!("Invalid {} format, expected RFC3339: {}", name, s)))
        })
        .transpose()
}

pub(crate) fn lenient_rfc3339(raw: &Option<String>) -> Option<NaiveDateTime> {
    present(raw)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.naive_utc())
}

/// `"true"` or `"1"`.
pub(crate) fn truthy(raw: &Option<String>) -> bool {
    matches!(present(raw), Some("true") | Some("1"))
}

/// Attach the provenance keys every data response carries.
pub(crate) fn sourced(mut body: Value, source: Source) -> Json<Value> {
    if let Value::Object(map) = &mut body {
        map.insert("source".to_string(), json!(source));
        map.insert("mock".to_string(), json!(source.is_mock()));
    }
    Json(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    #[test]
    fn test_int_parsing() {
        assert_eq!(lenient_int(&some("25")), Some(25));
        assert_eq!(lenient_int(&some("abc")), None);
        assert_eq!(lenient_int(&some("  ")), None);
        assert_eq!(strict_int("limit", &some("7")).unwrap(), Some(7));
        assert_eq!(strict_int("limit", &None).unwrap(), None);
        assert!(matches!(strict_int("limit", &some("x")), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_rfc3339_parsing() {
        let parsed = strict_rfc3339("start_time", &some("2024-05-01T10:00:00+02:00")).unwrap().unwrap();
        assert_eq!(parsed.to_string(), "2024-05-01 08:00:00");
        tokio_test::assert_err!(strict_rfc3339("start_time", &some("2024-05-01 10:00")));
        tokio_test::assert_ok!(strict_rfc3339("end_time", &None));
        assert_eq!(lenient_rfc3339(&some("yesterday")), None);
    }

    #[test]
    fn test_truthy() {
        assert!(truthy(&some("true")));
        assert!(truthy(&some("1")));
        assert!(!truthy(&some("yes")));
        assert!(!truthy(&None));
    }

    #[test]
    fn test_sourced_adds_provenance() {
        let Json(body) = sourced(json!({"success": true}), Source::Mock);
        assert_eq!(body["source"], "mock");
        assert_eq!(body["mock"], true);
    }
}
