//! Typed value encoding used by the hosted document REST API
//!
//! The REST API wraps every field in a single-key object naming its type
//! (`{"stringValue": "x"}`, `{"integerValue": "3"}`, ...). Integers travel
//! as decimal strings.

use serde_json::{json, Map, Value};

use crate::documents::Fields;
use crate::{Error, Result};

/// Encode a plain JSON value
pub fn encode(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!({ "integerValue": i.to_string() })
            } else if let Some(u) = n.as_u64() {
                json!({ "integerValue": u.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64() })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(fields) => json!({ "mapValue": { "fields": encode_fields(fields) } }),
    }
}

/// Encode a field map
pub fn encode_fields(fields: &Fields) -> Map<String, Value> {
    fields.iter().map(|(k, v)| (k.clone(), encode(v))).collect()
}

/// Decode a typed value back to plain JSON
pub fn decode(value: &Value) -> Result<Value> {
    let object = value
        .as_object()
        .filter(|o| o.len() == 1)
        .ok_or_else(|| malformed(value))?;

    let (kind, inner) = object.iter().next().ok_or_else(|| malformed(value))?;

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" | "doubleValue" => Ok(inner.clone()),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => Ok(inner.clone()),
        "integerValue" => match inner {
            Value::String(s) => s
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| malformed(value)),
            Value::Number(_) => Ok(inner.clone()),
            _ => Err(malformed(value)),
        },
        "arrayValue" => {
            let values = match inner.get("values") {
                Some(Value::Array(values)) => values.iter().map(decode).collect::<Result<_>>()?,
                Some(_) => return Err(malformed(value)),
                None => Vec::new(),
            };
            Ok(Value::Array(values))
        }
        "mapValue" => {
            let fields = match inner.get("fields") {
                Some(Value::Object(fields)) => decode_fields(fields)?,
                Some(_) => return Err(malformed(value)),
                None => Fields::new(),
            };
            Ok(Value::Object(fields))
        }
        _ => Err(malformed(value)),
    }
}

/// Decode a typed field map
pub fn decode_fields(fields: &Map<String, Value>) -> Result<Fields> {
    fields
        .iter()
        .map(|(k, v)| decode(v).map(|decoded| (k.clone(), decoded)))
        .collect()
}

fn malformed(value: &Value) -> Error {
    Error::Json(serde::de::Error::custom(format!("malformed typed value: {}", value)))
}
