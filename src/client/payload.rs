use serde_json::Value;

/// Whether a successful response carries no data.
///
/// The backend answers `{}` (or an empty list) both while its aggregates are
/// still warming up and when there is genuinely nothing to show. `null`, `{}`,
/// `[]` and an object whose `response_key` holds an empty list or object all
/// count as empty.
pub fn is_ambiguous_empty(value: &Value, response_key: Option<&str>) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) if map.is_empty() => true,
        Value::Object(map) => match response_key.and_then(|k| map.get(k)) {
            Some(Value::Array(items)) => items.is_empty(),
            Some(Value::Object(inner)) => inner.is_empty(),
            Some(Value::Null) => true,
            _ => false,
        },
        _ => false,
    }
}
