//! PostgreSQL type encoding and decoding.
//!
//! This module provides the binary format encoding/decoding for the values
//! that can be bound as parameters or read back from result cells.
//! Reference: https://www.postgresql.org/docs/current/protocol-overview.html#PROTOCOL-FORMAT-CODES

use std::collections::BTreeMap;
use std::fmt;

use bytes::{BufMut, BytesMut};
use serde_json::Value as JsonValue;

use super::array;
use super::configuration::Configuration;
use crate::error::EncodingError;

// ============================================================================
// Type OIDs
// ============================================================================

/// PostgreSQL type object identifiers (OIDs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid(pub u32);

impl Oid {
    /// Lets the server infer the parameter type.
    pub const UNSPECIFIED: Oid = Oid(0);

    pub const BOOL: Oid = Oid(16);
    pub const BYTEA: Oid = Oid(17);
    pub const CHAR: Oid = Oid(18);
    pub const NAME: Oid = Oid(19);
    pub const INT8: Oid = Oid(20);
    pub const INT2: Oid = Oid(21);
    pub const INT4: Oid = Oid(23);
    pub const TEXT: Oid = Oid(25);
    pub const OID_TYPE: Oid = Oid(26);
    pub const JSON: Oid = Oid(114);
    pub const FLOAT4: Oid = Oid(700);
    pub const FLOAT8: Oid = Oid(701);
    pub const BPCHAR: Oid = Oid(1042);
    pub const VARCHAR: Oid = Oid(1043);
    pub const DATE: Oid = Oid(1082);
    pub const TIME: Oid = Oid(1083);
    pub const TIMESTAMP: Oid = Oid(1114);
    pub const TIMESTAMPTZ: Oid = Oid(1184);
    pub const TIMETZ: Oid = Oid(1266);
    pub const NUMERIC: Oid = Oid(1700);
    pub const UUID: Oid = Oid(2950);
    pub const JSONB: Oid = Oid(3802);

    pub const JSON_ARRAY: Oid = Oid(199);
    pub const BOOL_ARRAY: Oid = Oid(1000);
    pub const BYTEA_ARRAY: Oid = Oid(1001);
    pub const CHAR_ARRAY: Oid = Oid(1002);
    pub const NAME_ARRAY: Oid = Oid(1003);
    pub const INT2_ARRAY: Oid = Oid(1005);
    pub const INT4_ARRAY: Oid = Oid(1007);
    pub const TEXT_ARRAY: Oid = Oid(1009);
    pub const BPCHAR_ARRAY: Oid = Oid(1014);
    pub const VARCHAR_ARRAY: Oid = Oid(1015);
    pub const INT8_ARRAY: Oid = Oid(1016);
    pub const FLOAT4_ARRAY: Oid = Oid(1021);
    pub const FLOAT8_ARRAY: Oid = Oid(1022);
    pub const OID_ARRAY: Oid = Oid(1028);
    pub const TIMESTAMP_ARRAY: Oid = Oid(1115);
    pub const DATE_ARRAY: Oid = Oid(1182);
    pub const TIME_ARRAY: Oid = Oid(1183);
    pub const TIMESTAMPTZ_ARRAY: Oid = Oid(1185);
    pub const NUMERIC_ARRAY: Oid = Oid(1231);
    pub const TIMETZ_ARRAY: Oid = Oid(1270);
    pub const UUID_ARRAY: Oid = Oid(2951);
    pub const JSONB_ARRAY: Oid = Oid(3807);

    /// (element, array) pairs for the built-in array types.
    const ARRAY_TYPES: [(Oid, Oid); 22] = [
        (Oid::BOOL, Oid::BOOL_ARRAY),
        (Oid::BYTEA, Oid::BYTEA_ARRAY),
        (Oid::CHAR, Oid::CHAR_ARRAY),
        (Oid::NAME, Oid::NAME_ARRAY),
        (Oid::INT2, Oid::INT2_ARRAY),
        (Oid::INT4, Oid::INT4_ARRAY),
        (Oid::INT8, Oid::INT8_ARRAY),
        (Oid::TEXT, Oid::TEXT_ARRAY),
        (Oid::BPCHAR, Oid::BPCHAR_ARRAY),
        (Oid::VARCHAR, Oid::VARCHAR_ARRAY),
        (Oid::FLOAT4, Oid::FLOAT4_ARRAY),
        (Oid::FLOAT8, Oid::FLOAT8_ARRAY),
        (Oid::OID_TYPE, Oid::OID_ARRAY),
        (Oid::JSON, Oid::JSON_ARRAY),
        (Oid::JSONB, Oid::JSONB_ARRAY),
        (Oid::DATE, Oid::DATE_ARRAY),
        (Oid::TIME, Oid::TIME_ARRAY),
        (Oid::TIMETZ, Oid::TIMETZ_ARRAY),
        (Oid::TIMESTAMP, Oid::TIMESTAMP_ARRAY),
        (Oid::TIMESTAMPTZ, Oid::TIMESTAMPTZ_ARRAY),
        (Oid::NUMERIC, Oid::NUMERIC_ARRAY),
        (Oid::UUID, Oid::UUID_ARRAY),
    ];

    /// Get the raw value
    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Check if this is a text-like type
    pub fn is_text_like(self) -> bool {
        matches!(
            self,
            Oid::TEXT | Oid::VARCHAR | Oid::BPCHAR | Oid::NAME
        )
    }

    /// The array type whose elements are of this type.
    pub fn array_of(self) -> Option<Oid> {
        Self::ARRAY_TYPES
            .iter()
            .find(|(element, _)| *element == self)
            .map(|(_, array)| *array)
    }

    /// The element type, if this is a known array type.
    pub fn element_of(self) -> Option<Oid> {
        Self::ARRAY_TYPES
            .iter()
            .find(|(_, array)| *array == self)
            .map(|(element, _)| *element)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Values
// ============================================================================

/// A value that can be bound as a parameter or decoded from a result cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int2(i16),
    Int4(i32),
    Int8(i64),
    Float4(f32),
    Float8(f64),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

/// Seconds between 1970-01-01 and the server's 2000-01-01 epoch.
const POSTGRES_EPOCH_UNIX_SECS: i64 = 946_684_800;
const POSTGRES_EPOCH_UNIX_MICROS: i64 = POSTGRES_EPOCH_UNIX_SECS * 1_000_000;
const POSTGRES_EPOCH_UNIX_DAYS: i32 = 10_957;

/// The only jsonb binary format version.
const JSONB_VERSION: u8 = 1;

impl Value {
    /// Check if this value is NULL
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The oid sent to the server alongside this value's bytes.
    ///
    /// Arrays report the array type of their first non-null element, falling
    /// back to `text[]`; a mixed array still fails later in
    /// [`encode_binary`](Self::encode_binary).
    pub fn type_oid(&self) -> Oid {
        match self {
            Value::Null => Oid::UNSPECIFIED,
            Value::Bool(_) => Oid::BOOL,
            Value::Int2(_) => Oid::INT2,
            Value::Int4(_) => Oid::INT4,
            Value::Int8(_) => Oid::INT8,
            Value::Float4(_) => Oid::FLOAT4,
            Value::Float8(_) => Oid::FLOAT8,
            Value::String(_) => Oid::TEXT,
            Value::Bytes(_) => Oid::BYTEA,
            Value::Array(items) => array::array_type(items),
            Value::Object(_) => Oid::JSONB,
        }
    }

    /// Append this value's binary representation to `buf`.
    ///
    /// `Null` writes nothing; callers signal it through the length field.
    pub fn encode_binary(&self, buf: &mut BytesMut) -> Result<(), EncodingError> {
        match self {
            Value::Null => {}
            Value::Bool(v) => buf.put_u8(u8::from(*v)),
            Value::Int2(v) => buf.put_i16(*v),
            Value::Int4(v) => buf.put_i32(*v),
            Value::Int8(v) => buf.put_i64(*v),
            Value::Float4(v) => buf.put_f32(*v),
            Value::Float8(v) => buf.put_f64(*v),
            Value::String(v) => buf.put_slice(v.as_bytes()),
            Value::Bytes(v) => buf.put_slice(v),
            Value::Array(items) => array::encode(items, buf)?,
            Value::Object(_) => {
                let json = serde_json::to_vec(&self.to_json()?)
                    .map_err(|e| EncodingError::UnsupportedComposite(e.to_string()))?;
                buf.put_u8(JSONB_VERSION);
                buf.put_slice(&json);
            }
        }
        Ok(())
    }

    /// Decode a non-null cell from binary format.
    ///
    /// Date/time types depend on `config`; unrecognised oids degrade to a
    /// `String` (or `Bytes` when the payload is not UTF-8).
    pub fn decode_binary(
        oid: Oid,
        data: &[u8],
        config: &Configuration,
    ) -> Result<Self, EncodingError> {
        match oid {
            Oid::BOOL => {
                let [b] = fixed::<1>(oid, data)?;
                Ok(Value::Bool(b != 0))
            }
            Oid::INT2 => Ok(Value::Int2(i16::from_be_bytes(fixed(oid, data)?))),
            Oid::INT4 => Ok(Value::Int4(i32::from_be_bytes(fixed(oid, data)?))),
            Oid::INT8 => Ok(Value::Int8(i64::from_be_bytes(fixed(oid, data)?))),
            Oid::OID_TYPE => Ok(Value::Int8(i64::from(u32::from_be_bytes(fixed(
                oid, data,
            )?)))),
            Oid::FLOAT4 => Ok(Value::Float4(f32::from_be_bytes(fixed(oid, data)?))),
            Oid::FLOAT8 => Ok(Value::Float8(f64::from_be_bytes(fixed(oid, data)?))),
            _ if oid.is_text_like() => decode_text(oid, data).map(Value::String),
            Oid::BYTEA => Ok(Value::Bytes(data.to_vec())),
            Oid::UUID => uuid::Uuid::from_slice(data)
                .map(|u| Value::String(u.hyphenated().to_string()))
                .map_err(|e| EncodingError::invalid(oid, e.to_string())),
            Oid::JSON => decode_json(oid, data),
            Oid::JSONB => match data.split_first() {
                Some((&JSONB_VERSION, json)) => decode_json(oid, json),
                Some((version, _)) => Err(EncodingError::invalid(
                    oid,
                    format!("unsupported jsonb version {}", version),
                )),
                None => Err(EncodingError::invalid(oid, "empty jsonb payload")),
            },
            Oid::NUMERIC => decode_numeric(oid, data).map(Value::String),
            Oid::DATE => {
                let days = i32::from_be_bytes(fixed(oid, data)?);
                Ok(Value::Int4(match days {
                    // +/-infinity
                    i32::MAX | i32::MIN => days,
                    _ => days.saturating_add(POSTGRES_EPOCH_UNIX_DAYS),
                }))
            }
            Oid::TIMESTAMP | Oid::TIMESTAMPTZ => decode_timestamp(oid, data, config),
            Oid::TIME => decode_time(oid, data, config),
            Oid::TIMETZ => {
                // time of day followed by a 4-byte zone offset
                if data.len() != 12 {
                    return Err(EncodingError::invalid(
                        oid,
                        format!("expected 12 bytes, got {}", data.len()),
                    ));
                }
                decode_time(oid, &data[..8], config)
            }
            _ if oid.element_of().is_some() => array::decode(oid, data, config),
            _ => Ok(match std::str::from_utf8(data) {
                Ok(s) => Value::String(s.to_owned()),
                Err(_) => Value::Bytes(data.to_vec()),
            }),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Any integer width, widened.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int2(v) => Some(i64::from(*v)),
            Value::Int4(v) => Some(i64::from(*v)),
            Value::Int8(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float4(v) => Some(f64::from(*v)),
            Value::Float8(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(v) => Some(v),
            _ => None,
        }
    }

    /// Strict JSON form used for jsonb parameters.
    ///
    /// Only widths the jsonb decoder produces are accepted, so an object
    /// decodes back to exactly what was encoded.
    fn to_json(&self) -> Result<JsonValue, EncodingError> {
        let float = |v: f64| {
            serde_json::Number::from_f64(v)
                .map(JsonValue::Number)
                .ok_or_else(|| {
                    EncodingError::UnsupportedComposite(format!(
                        "{} has no JSON representation",
                        v
                    ))
                })
        };

        match self {
            Value::Null => Ok(JsonValue::Null),
            Value::Bool(v) => Ok(JsonValue::Bool(*v)),
            // jsonb numbers come back as int8 or float8 only
            Value::Int2(_) | Value::Int4(_) | Value::Float4(_) => {
                Err(EncodingError::UnsupportedComposite(
                    "object numbers must be Int8 or Float8".to_string(),
                ))
            }
            Value::Int8(v) => Ok(JsonValue::from(*v)),
            Value::Float8(v) => float(*v),
            Value::String(v) => Ok(JsonValue::String(v.clone())),
            Value::Bytes(_) => Err(EncodingError::UnsupportedComposite(
                "byte strings cannot be stored inside an object".to_string(),
            )),
            Value::Array(items) => items
                .iter()
                .map(Value::to_json)
                .collect::<Result<Vec<_>, _>>()
                .map(JsonValue::Array),
            Value::Object(members) => members
                .iter()
                .map(|(k, v)| Ok((k.clone(), v.to_json()?)))
                .collect::<Result<serde_json::Map<_, _>, _>>()
                .map(JsonValue::Object),
        }
    }

    /// JSON integers become `Int8`, every other number `Float8`.
    pub(crate) fn from_json(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(v) => Value::Bool(v),
            JsonValue::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => Value::Int8(i),
                (None, Some(f)) => Value::Float8(f),
                (None, None) => Value::String(n.to_string()),
            },
            JsonValue::String(v) => Value::String(v),
            JsonValue::Array(items) => Value::Array(items.into_iter().map(Value::from_json).collect()),
            JsonValue::Object(members) => Value::Object(
                members
                    .into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

// ============================================================================
// Conversions
// ============================================================================

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i16 => Int2,
    i32 => Int4,
    i64 => Int8,
    f32 => Float4,
    f64 => Float8,
    String => String,
    &str => String,
    Vec<u8> => Bytes,
    &[u8] => Bytes,
    Vec<Value> => Array,
    BTreeMap<String, Value> => Object,
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

// ============================================================================
// Decoding helpers
// ============================================================================

fn fixed<const N: usize>(oid: Oid, data: &[u8]) -> Result<[u8; N], EncodingError> {
    data.try_into().map_err(|_| {
        EncodingError::invalid(oid, format!("expected {} bytes, got {}", N, data.len()))
    })
}

fn decode_text(oid: Oid, data: &[u8]) -> Result<String, EncodingError> {
    String::from_utf8(data.to_vec())
        .map_err(|e| EncodingError::invalid(oid, format!("invalid UTF-8: {}", e)))
}

fn decode_json(oid: Oid, data: &[u8]) -> Result<Value, EncodingError> {
    serde_json::from_slice(data)
        .map(Value::from_json)
        .map_err(|e| EncodingError::invalid(oid, format!("invalid JSON: {}", e)))
}

/// Integer datetimes carry microseconds, floating ones carry seconds; both
/// are shifted from the 2000-01-01 epoch to the Unix epoch.
fn decode_timestamp(oid: Oid, data: &[u8], config: &Configuration) -> Result<Value, EncodingError> {
    let raw = fixed::<8>(oid, data)?;
    if config.has_integer_datetimes {
        let micros = i64::from_be_bytes(raw);
        Ok(Value::Int8(match micros {
            // +/-infinity
            i64::MAX | i64::MIN => micros,
            _ => micros.saturating_add(POSTGRES_EPOCH_UNIX_MICROS),
        }))
    } else {
        Ok(Value::Float8(
            f64::from_be_bytes(raw) + POSTGRES_EPOCH_UNIX_SECS as f64,
        ))
    }
}

fn decode_time(oid: Oid, data: &[u8], config: &Configuration) -> Result<Value, EncodingError> {
    let raw = fixed::<8>(oid, data)?;
    if config.has_integer_datetimes {
        Ok(Value::Int8(i64::from_be_bytes(raw)))
    } else {
        Ok(Value::Float8(f64::from_be_bytes(raw)))
    }
}

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// Render a binary numeric as exact decimal text.
///
/// Layout: ndigits, weight, sign, dscale (all 16-bit), then `ndigits`
/// base-10000 digits, the first of which has weight `weight`.
fn decode_numeric(oid: Oid, data: &[u8]) -> Result<String, EncodingError> {
    use std::fmt::Write;

    if data.len() < 8 {
        return Err(EncodingError::invalid(oid, "truncated numeric header"));
    }
    let word = |i: usize| u16::from_be_bytes([data[i], data[i + 1]]);
    let ndigits = usize::from(word(0));
    let weight = i64::from(word(2) as i16);
    let sign = word(4);
    let dscale = usize::from(word(6));

    if data.len() != 8 + ndigits * 2 {
        return Err(EncodingError::invalid(
            oid,
            format!("expected {} digit bytes, got {}", ndigits * 2, data.len() - 8),
        ));
    }
    let digits: Vec<u16> = (0..ndigits).map(|i| word(8 + i * 2)).collect();
    if digits.iter().any(|d| *d > 9999) {
        return Err(EncodingError::invalid(oid, "numeric digit out of range"));
    }
    let digit = |index: i64| -> u16 {
        usize::try_from(index)
            .ok()
            .and_then(|i| digits.get(i).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    match sign {
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_PINF => return Ok("Infinity".to_string()),
        NUMERIC_NINF => return Ok("-Infinity".to_string()),
        NUMERIC_NEG => out.push('-'),
        NUMERIC_POS => {}
        other => {
            return Err(EncodingError::invalid(
                oid,
                format!("unknown numeric sign 0x{:04X}", other),
            ))
        }
    }

    if weight < 0 {
        out.push('0');
    } else {
        for index in 0..=weight {
            // writing to a String cannot fail
            let _ = if index == 0 {
                write!(out, "{}", digit(index))
            } else {
                write!(out, "{:04}", digit(index))
            };
        }
    }

    if dscale > 0 {
        let mut fraction = String::with_capacity(dscale + 4);
        let mut index = weight + 1;
        while fraction.len() < dscale {
            let _ = write!(fraction, "{:04}", digit(index));
            index += 1;
        }
        fraction.truncate(dscale);
        out.push('.');
        out.push_str(&fraction);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTEGER: Configuration = Configuration {
        has_integer_datetimes: true,
    };
    const FLOATING: Configuration = Configuration {
        has_integer_datetimes: false,
    };

    fn encode(value: &Value) -> Vec<u8> {
        let mut buf = BytesMut::new();
        value.encode_binary(&mut buf).unwrap();
        buf.to_vec()
    }

    fn numeric(weight: i16, sign: u16, dscale: u16, digits: &[u16]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u16(digits.len() as u16);
        buf.put_i16(weight);
        buf.put_u16(sign);
        buf.put_u16(dscale);
        for d in digits {
            buf.put_u16(*d);
        }
        buf.to_vec()
    }

    #[test]
    fn test_oid_classification() {
        assert!(Oid::TEXT.is_text_like());
        assert!(Oid::VARCHAR.is_text_like());
        assert!(!Oid::INT4.is_text_like());

        assert_eq!(Oid::INT4.array_of(), Some(Oid::INT4_ARRAY));
        assert_eq!(Oid::TEXT_ARRAY.element_of(), Some(Oid::TEXT));
        assert_eq!(Oid::INT4.element_of(), None);
    }

    #[test]
    fn test_int4_roundtrip() {
        let original = Value::Int4(12345);
        let decoded = Value::decode_binary(Oid::INT4, &encode(&original), &INTEGER).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_object_roundtrip_through_jsonb() {
        let mut members = BTreeMap::new();
        members.insert("id".to_string(), Value::Int8(7));
        members.insert("tags".to_string(), Value::Array(vec!["a".into(), Value::Null]));
        members.insert("score".to_string(), Value::Float8(0.5));
        let original = Value::Object(members);

        let encoded = encode(&original);
        assert_eq!(encoded[0], JSONB_VERSION);
        assert_eq!(original.type_oid(), Oid::JSONB);
        let decoded = Value::decode_binary(Oid::JSONB, &encoded, &INTEGER).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_object_rejects_narrow_numbers() {
        for member in [
            Value::Int2(7),
            Value::Int4(7),
            Value::Float4(0.5),
            Value::Array(vec![Value::Int4(1)]),
        ] {
            let mut members = BTreeMap::new();
            members.insert("n".to_string(), member);
            let err = Value::Object(members)
                .encode_binary(&mut BytesMut::new())
                .unwrap_err();
            assert!(matches!(err, EncodingError::UnsupportedComposite(_)));
        }
    }

    #[test]
    fn test_object_rejects_bytes() {
        let mut members = BTreeMap::new();
        members.insert("blob".to_string(), Value::Bytes(vec![1, 2]));
        let err = Value::Object(members)
            .encode_binary(&mut BytesMut::new())
            .unwrap_err();
        assert!(matches!(err, EncodingError::UnsupportedComposite(_)));
    }

    #[test]
    fn test_wrong_width_is_invalid() {
        let err = Value::decode_binary(Oid::INT4, &[0, 1], &INTEGER).unwrap_err();
        assert_eq!(err, EncodingError::invalid(Oid::INT4, "expected 4 bytes, got 2"));
    }

    #[test]
    fn test_unknown_oid_falls_back() {
        // inet
        let text = Value::decode_binary(Oid(869), b"10.0.0.1", &INTEGER).unwrap();
        assert_eq!(text, Value::String("10.0.0.1".to_string()));

        let raw = Value::decode_binary(Oid(869), &[0xff, 0x00, 0xfe], &INTEGER).unwrap();
        assert_eq!(raw, Value::Bytes(vec![0xff, 0x00, 0xfe]));
    }

    #[test]
    fn test_char_is_a_single_raw_byte() {
        assert!(!Oid::CHAR.is_text_like());
        assert_eq!(
            Value::decode_binary(Oid::CHAR, b"r", &INTEGER).unwrap(),
            Value::String("r".to_string())
        );
        assert_eq!(
            Value::decode_binary(Oid::CHAR, &[0xe9], &INTEGER).unwrap(),
            Value::Bytes(vec![0xe9])
        );
    }

    #[test]
    fn test_timestamp_depends_on_datetime_representation() {
        // one day after 2000-01-01 in each representation
        let micros = (86_400i64 * 1_000_000).to_be_bytes();
        assert_eq!(
            Value::decode_binary(Oid::TIMESTAMP, &micros, &INTEGER).unwrap(),
            Value::Int8((946_684_800 + 86_400) * 1_000_000)
        );

        let seconds = 86_400f64.to_be_bytes();
        assert_eq!(
            Value::decode_binary(Oid::TIMESTAMPTZ, &seconds, &FLOATING).unwrap(),
            Value::Float8(946_684_800.0 + 86_400.0)
        );

        // identical bytes, different readings
        let as_int = Value::decode_binary(Oid::TIMESTAMP, &micros, &INTEGER).unwrap();
        let as_float = Value::decode_binary(Oid::TIMESTAMP, &micros, &FLOATING).unwrap();
        assert_ne!(as_int.as_f64(), as_float.as_f64());
        assert!(as_int.as_i64().is_some());
        assert!(as_float.as_f64().is_some());
    }

    #[test]
    fn test_infinite_timestamp_is_preserved() {
        let decoded = Value::decode_binary(Oid::TIMESTAMP, &i64::MAX.to_be_bytes(), &INTEGER);
        assert_eq!(decoded.unwrap(), Value::Int8(i64::MAX));
    }

    #[test]
    fn test_date_and_time() {
        let date = Value::decode_binary(Oid::DATE, &0i32.to_be_bytes(), &INTEGER).unwrap();
        assert_eq!(date, Value::Int4(10_957));

        let noon = 43_200_000_000i64.to_be_bytes();
        assert_eq!(
            Value::decode_binary(Oid::TIME, &noon, &INTEGER).unwrap(),
            Value::Int8(43_200_000_000)
        );

        let mut timetz = 43_200.5f64.to_be_bytes().to_vec();
        timetz.extend_from_slice(&(-3600i32).to_be_bytes());
        assert_eq!(
            Value::decode_binary(Oid::TIMETZ, &timetz, &FLOATING).unwrap(),
            Value::Float8(43_200.5)
        );
    }

    #[test]
    fn test_numeric_rendering() {
        let cases: [(Vec<u8>, &str); 6] = [
            (numeric(0, NUMERIC_POS, 2, &[123, 4500]), "123.45"),
            (numeric(1, NUMERIC_NEG, 0, &[1, 0]), "-10000"),
            (numeric(-1, NUMERIC_POS, 4, &[5]), "0.0005"),
            (numeric(-2, NUMERIC_POS, 8, &[12]), "0.00000012"),
            (numeric(0, NUMERIC_POS, 0, &[]), "0"),
            (numeric(0, NUMERIC_NAN, 0, &[]), "NaN"),
        ];

        for (data, expected) in cases {
            assert_eq!(
                Value::decode_binary(Oid::NUMERIC, &data, &INTEGER).unwrap(),
                Value::String(expected.to_string())
            );
        }
    }

    #[test]
    fn test_uuid_decoding() {
        let bytes: [u8; 16] = [
            0x55, 0x0e, 0x84, 0x00, 0xe2, 0x9b, 0x41, 0xd4, 0xa7, 0x16, 0x44, 0x66, 0x55, 0x44,
            0x00, 0x00,
        ];
        assert_eq!(
            Value::decode_binary(Oid::UUID, &bytes, &INTEGER).unwrap(),
            Value::String("550e8400-e29b-41d4-a716-446655440000".to_string())
        );
    }

    #[test]
    fn test_from_conversions() {
        assert_eq!(Value::from(42i32), Value::Int4(42));
        assert_eq!(Value::from("hi"), Value::String("hi".to_string()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(1.5f64)), Value::Float8(1.5));
    }
}
