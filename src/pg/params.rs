//! Parameter encoding.
//!
//! Turns a parameter list into the four parallel arrays an out-of-line
//! execute needs: type oids, payloads, payload lengths and format codes.

use bytes::{Bytes, BytesMut};
use smallvec::SmallVec;

use super::protocol::Format;
use super::types::{Oid, Value};
use crate::error::EncodingError;

/// Parameter lists this short are kept inline.
const INLINE_PARAMS: usize = 8;

/// Encoded parameters, one entry per value in every array.
///
/// Nulls have no payload, length 0 and oid 0 so the server infers their type.
/// Every format code is binary.
#[derive(Debug, Clone, Default)]
pub struct EncodedParams {
    types: SmallVec<[Oid; INLINE_PARAMS]>,
    values: SmallVec<[Option<Bytes>; INLINE_PARAMS]>,
    lengths: SmallVec<[i32; INLINE_PARAMS]>,
    formats: SmallVec<[Format; INLINE_PARAMS]>,
}

impl EncodedParams {
    pub fn encode(params: &[Value]) -> Result<Self, EncodingError> {
        let mut encoded = Self::default();
        // Payloads are split off one shared buffer.
        let mut buf = BytesMut::new();

        for param in params {
            let payload = if param.is_null() {
                None
            } else {
                param.encode_binary(&mut buf)?;
                Some(buf.split().freeze())
            };
            let len = payload.as_ref().map_or(0, Bytes::len);
            let len = i32::try_from(len).map_err(|_| EncodingError::ValueTooLarge(len))?;

            encoded.types.push(param.type_oid());
            encoded.values.push(payload);
            encoded.lengths.push(len);
            encoded.formats.push(Format::Binary);
        }

        Ok(encoded)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn types(&self) -> &[Oid] {
        &self.types
    }

    pub fn values(&self) -> &[Option<Bytes>] {
        &self.values
    }

    pub fn lengths(&self) -> &[i32] {
        &self.lengths
    }

    pub fn formats(&self) -> &[Format] {
        &self.formats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parallel_arrays() {
        let params = [
            Value::Int4(42),
            Value::Null,
            Value::String("héllo".to_string()),
            Value::Bytes(vec![0, 0xff]),
        ];
        let encoded = EncodedParams::encode(&params).unwrap();

        assert_eq!(encoded.len(), 4);
        assert_eq!(
            encoded.types(),
            &[Oid::INT4, Oid::UNSPECIFIED, Oid::TEXT, Oid::BYTEA]
        );
        assert_eq!(encoded.lengths(), &[4, 0, 6, 2]);
        assert!(encoded.formats().iter().all(|f| *f == Format::Binary));

        assert_eq!(encoded.values()[0].as_deref(), Some(&42i32.to_be_bytes()[..]));
        assert_eq!(encoded.values()[1], None);
        // no trailing terminator
        assert_eq!(encoded.values()[2].as_deref(), Some("héllo".as_bytes()));
    }

    #[test]
    fn test_empty_string_is_not_null() {
        let encoded = EncodedParams::encode(&[Value::String(String::new())]).unwrap();
        assert_eq!(encoded.values()[0].as_deref(), Some(&[][..]));
        assert_eq!(encoded.lengths(), &[0]);
        assert_eq!(encoded.types(), &[Oid::TEXT]);
    }

    #[test]
    fn test_unsupported_composite_fails_whole_list() {
        let params = [
            Value::Int4(1),
            Value::Array(vec![Value::Bool(true), Value::String("x".to_string())]),
        ];
        assert!(matches!(
            EncodedParams::encode(&params),
            Err(EncodingError::UnsupportedComposite(_))
        ));
    }
}
