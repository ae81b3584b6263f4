//! Blocking PostgreSQL client core.
//!
//! This module provides a single-connection client that:
//! - Sends every parameter in binary format
//! - Requests every result column in binary format
//! - Caches server settings that change decoding, once per connection
//!
//! Architecture:
//! - `connection`: Connection lifecycle and the execute pipeline
//! - `transport`: The protocol client seam the connection drives
//! - `wire`: Native transport over TCP
//! - `protocol`: Low-level wire protocol encoding/decoding
//! - `auth`: MD5 and SCRAM-SHA-256 password authentication
//! - `conninfo`: Connection specifications and connection-string parsing
//! - `types`: Value model and per-oid binary codecs
//! - `array`: Binary array layout
//! - `params`: Parameter encoder
//! - `result`: Result decoder and rows
//! - `configuration`: Cached server settings
//! - `context`: Caller-supplied value conversion

pub mod array;
pub mod auth;
pub mod configuration;
pub mod connection;
pub mod conninfo;
pub mod context;
pub mod error;
pub mod params;
pub mod protocol;
pub mod result;
pub mod transport;
pub mod types;
pub mod wire;


pub use configuration::Configuration;
pub use connection::Connection;
pub use conninfo::{ConnInfo, WireConfig};
pub use context::{JsonContext, ValueContext};
pub use error::{PgError, PgResult};
pub use params::EncodedParams;
pub use protocol::Format;
pub use result::{decode_rows, Row};
pub use transport::{ConnStatus, Connect, ExecStatus, ResultHandle, Transport};
pub use types::{Oid, Value};
pub use wire::{WireResult, WireTransport};
