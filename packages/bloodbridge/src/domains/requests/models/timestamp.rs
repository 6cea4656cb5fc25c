use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

/// Read a stored timestamp: RFC 3339 text or epoch milliseconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rfc3339_and_millis_agree() {
        let text = parse_timestamp(&json!("2024-06-01T10:00:00+05:30")).unwrap();
        let millis = parse_timestamp(&json!(text.timestamp_millis())).unwrap();
        assert_eq!(text, millis);
    }

    #[test]
    fn test_garbage_is_none() {
        assert!(parse_timestamp(&json!("tomorrow")).is_none());
        assert!(parse_timestamp(&json!(null)).is_none());
        assert!(parse_timestamp(&json!(true)).is_none());
    }
}
