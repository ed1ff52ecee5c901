//! Conversion between plain JSON and Firestore's typed value encoding.

use crate::store::StoreError;
use serde_json::{json, Map, Number, Value};

pub fn encode(value: &Value) -> Value {
    match value {
        Value::Null => json!({"nullValue": null}),
        Value::Bool(b) => json!({"booleanValue": b}),
        Value::Number(n) => match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => json!({"integerValue": i.to_string()}),
            (None, Some(u)) => json!({"integerValue": u.to_string()}),
            _ => json!({"doubleValue": n}),
        },
        Value::String(s) => json!({"stringValue": s}),
        Value::Array(items) => {
            json!({"arrayValue": {"values": items.iter().map(encode).collect::<Vec<_>>()}})
        }
        Value::Object(map) => json!({"mapValue": {"fields": encode_fields(map)}}),
    }
}

pub fn encode_fields(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter().map(|(k, v)| (k.clone(), encode(v))).collect()
}

pub fn timestamp(at: chrono::DateTime<chrono::Utc>) -> Value {
    json!({"timestampValue": at.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)})
}

/// Timestamps decode to their RFC 3339 string.
pub fn decode(value: &Value) -> Result<Value, StoreError> {
    let Some((kind, inner)) = value.as_object().and_then(|o| o.iter().next()) else {
        return Err(StoreError::Codec(format!("not a typed value: {value}")));
    };
    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" | "doubleValue" | "stringValue" | "timestampValue" | "referenceValue" => {
            Ok(inner.clone())
        }
        "integerValue" => {
            let n = match inner {
                Value::String(s) => s
                    .parse::<i64>()
                    .map_err(|e| StoreError::Codec(format!("integerValue {s:?}: {e}")))?,
                Value::Number(n) => n
                    .as_i64()
                    .ok_or_else(|| StoreError::Codec(format!("integerValue {n}")))?,
                other => return Err(StoreError::Codec(format!("integerValue {other}"))),
            };
            Ok(Value::Number(Number::from(n)))
        }
        "arrayValue" => match inner.get("values") {
            Some(Value::Array(items)) => items
                .iter()
                .map(decode)
                .collect::<Result<_, _>>()
                .map(Value::Array),
            _ => Ok(Value::Array(Vec::new())),
        },
        "mapValue" => match inner.get("fields") {
            Some(Value::Object(fields)) => decode_fields(fields).map(Value::Object),
            _ => Ok(Value::Object(Map::new())),
        },
        other => Err(StoreError::Codec(format!("unsupported value type {other}"))),
    }
}

pub fn decode_fields(fields: &Map<String, Value>) -> Result<Map<String, Value>, StoreError> {
    fields
        .iter()
        .map(|(k, v)| decode(v).map(|d| (k.clone(), d)))
        .collect()
}
