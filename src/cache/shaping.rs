use axum::body::Bytes;
use serde_json::Value;

/// Drops object fields whose value is `null` or `""`, at any depth.
///
/// Key order and array order are preserved, and array elements are never
/// dropped. Objects left empty by pruning stay in place. Applying it twice
/// gives the same result as applying it once.
pub fn remove_empty_fields(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !is_empty_field(v))
                .map(|(k, v)| (k, remove_empty_fields(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(remove_empty_fields).collect()),
        other => other,
    }
}

fn is_empty_field(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Parses a JSON body, prunes it and serializes it back.
pub fn shape_json_body(body: &[u8]) -> Result<Bytes, serde_json::Error> {
    let value: Value = serde_json::from_slice(body)?;
    let shaped = serde_json::to_vec(&remove_empty_fields(value))?;
    Ok(Bytes::from(shaped))
}
