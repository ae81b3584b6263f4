//! Binary array layout.
//!
//! ```text
//! int32 ndim | int32 has_null | uint32 element oid
//! ndim x (int32 size | int32 lower bound)
//! elements, row-major: int32 length (-1 = NULL) | bytes
//! ```
//!
//! Parameters are always one-dimensional; results may nest.

use bytes::{Buf, BufMut, BytesMut};

use super::configuration::Configuration;
use super::types::{Oid, Value};
use crate::error::EncodingError;

/// Server-side limit on array dimensions.
const MAX_DIMENSIONS: i32 = 6;

/// Element type shared by every non-null item.
fn element_oid(items: &[Value]) -> Result<Oid, EncodingError> {
    let mut element: Option<Oid> = None;

    for item in items {
        let oid = match item {
            Value::Null => continue,
            Value::Array(_) => {
                return Err(EncodingError::UnsupportedComposite(
                    "nested arrays cannot be bound as parameters".to_string(),
                ))
            }
            other => other.type_oid(),
        };

        match element {
            None => element = Some(oid),
            Some(existing) if existing == oid => {}
            Some(existing) => {
                return Err(EncodingError::UnsupportedComposite(format!(
                    "array mixes element types {} and {}",
                    existing, oid
                )))
            }
        }
    }

    // empty or all-null arrays need some element type
    Ok(element.unwrap_or(Oid::TEXT))
}

pub(crate) fn array_type(items: &[Value]) -> Oid {
    element_oid(items)
        .ok()
        .and_then(Oid::array_of)
        .unwrap_or(Oid::TEXT_ARRAY)
}

pub(crate) fn encode(items: &[Value], buf: &mut BytesMut) -> Result<(), EncodingError> {
    let element = element_oid(items)?;
    let len = i32::try_from(items.len()).map_err(|_| EncodingError::ValueTooLarge(items.len()))?;

    buf.put_i32(if items.is_empty() { 0 } else { 1 });
    buf.put_i32(i32::from(items.iter().any(Value::is_null)));
    buf.put_u32(element.as_u32());
    if !items.is_empty() {
        buf.put_i32(len);
        buf.put_i32(1);
    }

    for item in items {
        if item.is_null() {
            buf.put_i32(-1);
            continue;
        }

        // Reserve the length prefix and patch it once the element is written.
        let start = buf.len();
        buf.put_i32(0);
        item.encode_binary(buf)?;
        let written = buf.len() - start - 4;
        let written = i32::try_from(written).map_err(|_| EncodingError::ValueTooLarge(written))?;
        buf[start..start + 4].copy_from_slice(&written.to_be_bytes());
    }

    Ok(())
}

pub(crate) fn decode(oid: Oid, data: &[u8], config: &Configuration) -> Result<Value, EncodingError> {
    let mut buf = data;

    let ndim = read_i32(oid, &mut buf)?;
    let _has_null = read_i32(oid, &mut buf)?;
    let element = Oid(read_i32(oid, &mut buf)? as u32);

    if !(0..=MAX_DIMENSIONS).contains(&ndim) {
        return Err(EncodingError::invalid(
            oid,
            format!("invalid number of dimensions: {}", ndim),
        ));
    }
    if ndim == 0 {
        return Ok(Value::Array(Vec::new()));
    }

    let mut dims = Vec::with_capacity(ndim as usize);
    for _ in 0..ndim {
        let size = read_i32(oid, &mut buf)?;
        let _lower_bound = read_i32(oid, &mut buf)?;
        let size = usize::try_from(size)
            .map_err(|_| EncodingError::invalid(oid, format!("negative dimension {}", size)))?;
        dims.push(size);
    }

    // A zero dimension holds no elements at all.
    if dims.contains(&0) {
        return Ok(Value::Array(Vec::new()));
    }
    // Every element costs at least its 4-byte length prefix.
    let fits = dims
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .is_some_and(|elements| elements <= buf.remaining() / 4);
    if !fits {
        return Err(EncodingError::invalid(
            oid,
            format!(
                "dimensions {:?} exceed the {} bytes of element data",
                dims,
                buf.remaining()
            ),
        ));
    }

    let value = decode_dimension(oid, element, &dims, &mut buf, config)?;
    if buf.has_remaining() {
        return Err(EncodingError::invalid(
            oid,
            format!("{} trailing bytes after array elements", buf.remaining()),
        ));
    }
    Ok(value)
}

fn decode_dimension(
    oid: Oid,
    element: Oid,
    dims: &[usize],
    buf: &mut &[u8],
    config: &Configuration,
) -> Result<Value, EncodingError> {
    let Some((&len, inner)) = dims.split_first() else {
        return Ok(Value::Array(Vec::new()));
    };

    // Every element costs at least its length prefix.
    let mut items = Vec::with_capacity(len.min(buf.remaining() / 4));
    for _ in 0..len {
        if !inner.is_empty() {
            items.push(decode_dimension(oid, element, inner, buf, config)?);
            continue;
        }

        let size = read_i32(oid, buf)?;
        if size < 0 {
            items.push(Value::Null);
            continue;
        }
        let size = size as usize;
        if buf.remaining() < size {
            return Err(EncodingError::invalid(oid, "truncated array element"));
        }
        let current: &[u8] = *buf;
        let (cell, rest) = current.split_at(size);
        items.push(Value::decode_binary(element, cell, config)?);
        *buf = rest;
    }

    Ok(Value::Array(items))
}

fn read_i32(oid: Oid, buf: &mut &[u8]) -> Result<i32, EncodingError> {
    if buf.remaining() < 4 {
        return Err(EncodingError::invalid(oid, "truncated array header"));
    }
    Ok(buf.get_i32())
}
