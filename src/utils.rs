use chrono::Utc;
use serde_json::Value;

/// Wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Follow a path of object keys. Any non-object along the way yields `None`.
pub fn value_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |v, key| v.as_object()?.get(*key))
}

/// Interpret a JSON value as a positive millisecond timestamp.
///
/// Floats are truncated; strings, zero and negatives are not timestamps.
pub fn positive_millis(value: &Value) -> Option<i64> {
    let n = value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))?;
    (n > 0).then_some(n)
}

/// A string value with at least one non-whitespace character.
pub fn non_blank_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.trim().is_empty())
}

/// Loose truthiness: `true`, non-zero numbers, non-empty strings, arrays and
/// objects.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Cheaply pull a record's last-updated time without decoding the rest.
pub fn extract_last_updated(record: &Value) -> Option<i64> {
    ["lastUpdatedAt", "updatedAt", "lastUpdated"]
        .iter()
        .find_map(|k| record.get(*k).and_then(positive_millis))
}
