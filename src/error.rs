//! Error types for the connection layer.
//!
//! Every operation on [`Connection`](crate::Connection) reports one of three
//! families: connection lifecycle, query execution, or value encoding.

use thiserror::Error;

use crate::pg::types::Oid;

/// Failures of the connection lifecycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("cannot establish connection: {0}")]
    CannotEstablish(String),

    #[error("connection is not established")]
    NotConnected,

    #[error("connection is already closed")]
    AlreadyClosed,
}

/// Failures reported while executing a statement.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("no query text supplied")]
    EmptyQuery,

    #[error("invalid SQL: {0}")]
    InvalidSql(String),
}

/// Failures converting between [`Value`](crate::Value) and the binary format.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("unsupported composite value: {0}")]
    UnsupportedComposite(String),

    #[error("invalid binary value for oid {oid}: {reason}")]
    InvalidValue { oid: Oid, reason: String },

    #[error("value of {0} bytes exceeds the protocol length limit")]
    ValueTooLarge(usize),
}

impl EncodingError {
    pub(crate) fn invalid(oid: Oid, reason: impl Into<String>) -> Self {
        EncodingError::InvalidValue {
            oid,
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_server_text() {
        let err = Error::from(QueryError::InvalidSql(
            "ERROR: syntax error at or near \"SELEC\" (42601)".to_string(),
        ));
        assert!(err.to_string().contains("syntax error"));

        let err = ConnectionError::CannotEstablish("Connection refused".to_string());
        assert_eq!(
            err.to_string(),
            "cannot establish connection: Connection refused"
        );
    }

    #[test]
    fn test_invalid_value_names_oid() {
        let err = EncodingError::invalid(Oid::INT4, "expected 4 bytes, got 2");
        assert_eq!(
            err.to_string(),
            "invalid binary value for oid 23: expected 4 bytes, got 2"
        );
    }
}
