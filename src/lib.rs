//! pgconn - a blocking PostgreSQL connection core.
//!
//! Encodes typed parameters into the binary wire format, runs one statement
//! per call, and decodes the returned rows back into [`Value`]s.
//!
//! ```no_run
//! use pgconn::{ConnInfo, Connection, Value};
//!
//! let mut conn = Connection::connect(&ConnInfo::basic("localhost", 5432, "app", "app", "secret"))?;
//! let rows = conn.execute("SELECT $1::int4 AS answer", &[Value::Int4(42)])?;
//! assert_eq!(rows[0].get("answer"), Some(&Value::Int4(42)));
//! conn.close()?;
//! # Ok::<(), pgconn::Error>(())
//! ```

mod error;
pub mod pg;

pub use error::{ConnectionError, EncodingError, Error, QueryError, Result};
pub use pg::{
    ConnInfo, ConnStatus, Configuration, Connect, Connection, ExecStatus, JsonContext, Oid,
    ResultHandle, Row, Transport, Value, ValueContext, WireTransport,
};
