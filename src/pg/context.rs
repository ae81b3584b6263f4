//! Caller-supplied conversion between application types and [`Value`].
//!
//! There is no ambient conversion state: every call that needs one takes a
//! context explicitly, see [`Connection::execute_in`](super::Connection::execute_in).

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::{Map, Number, Value as JsonValue};

use super::result::Row;
use super::types::Value;
use crate::error::EncodingError;

/// Converts parameters into [`Value`]s and decoded rows into records.
pub trait ValueContext {
    type Param;
    type Record;

    fn to_value(&self, param: &Self::Param) -> Result<Value, EncodingError>;

    fn to_record(&self, row: Row) -> Result<Self::Record, EncodingError>;
}

/// Bridges `serde_json` values.
///
/// Parameters: JSON integers bind as `int8`, other numbers as `float8`,
/// arrays as arrays and objects as `jsonb`. Rows become JSON objects; byte
/// strings are rendered as base64 and non-finite floats as strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonContext;

impl ValueContext for JsonContext {
    type Param = JsonValue;
    type Record = Map<String, JsonValue>;

    fn to_value(&self, param: &JsonValue) -> Result<Value, EncodingError> {
        Ok(Value::from_json(param.clone()))
    }

    fn to_record(&self, row: Row) -> Result<Map<String, JsonValue>, EncodingError> {
        Ok(row
            .into_iter()
            .map(|(name, value)| (name, to_json(value)))
            .collect())
    }
}

fn to_json(value: Value) -> JsonValue {
    let float = |v: f64| {
        Number::from_f64(v)
            .map(JsonValue::Number)
            .unwrap_or_else(|| JsonValue::String(non_finite(v).to_string()))
    };

    match value {
        Value::Null => JsonValue::Null,
        Value::Bool(v) => JsonValue::Bool(v),
        Value::Int2(v) => JsonValue::from(v),
        Value::Int4(v) => JsonValue::from(v),
        Value::Int8(v) => JsonValue::from(v),
        Value::Float4(v) => float(f64::from(v)),
        Value::Float8(v) => float(v),
        Value::String(v) => JsonValue::String(v),
        Value::Bytes(v) => JsonValue::String(BASE64.encode(v)),
        Value::Array(items) => JsonValue::Array(items.into_iter().map(to_json).collect()),
        Value::Object(members) => JsonValue::Object(
            members
                .into_iter()
                .map(|(k, v)| (k, to_json(v)))
                .collect(),
        ),
    }
}

fn non_finite(v: f64) -> &'static str {
    if v.is_nan() {
        "NaN"
    } else if v > 0.0 {
        "Infinity"
    } else {
        "-Infinity"
    }
}
