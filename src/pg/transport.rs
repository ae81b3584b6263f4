//! The protocol client a [`Connection`](super::Connection) drives.
//!
//! These traits mirror the primitives of a blocking PostgreSQL client
//! library: open, status, parameter status, parameterized execute, reset and
//! finish on the connection handle, plus status, error text and cell access
//! on the result handle. [`WireTransport`](super::wire::WireTransport) is the
//! native implementation; tests substitute scripted ones.

use super::params::EncodedParams;
use super::protocol::Format;
use super::types::Oid;

/// Status of the underlying connection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnStatus {
    Ok,
    Bad,
}

/// Outcome of one statement, as reported on its result handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    /// The statement returned a row description (possibly zero rows).
    TuplesOk,
    /// The statement completed without returning rows.
    CommandOk,
    /// The server received an empty statement.
    EmptyQuery,
    NonFatalError,
    FatalError,
    Unknown,
}

/// An opaque handle to one statement's result. Dropping it releases it.
pub trait ResultHandle {
    fn status(&self) -> ExecStatus;

    /// Error text for failed statements, empty otherwise.
    fn error_message(&self) -> String;

    fn row_count(&self) -> usize;

    fn column_count(&self) -> usize;

    fn column_name(&self, column: usize) -> &str;

    fn column_type(&self, column: usize) -> Oid;

    /// Raw cell payload; `None` is the server's null marker.
    fn cell(&self, row: usize, column: usize) -> Option<&[u8]>;
}

/// A connection handle to the server.
///
/// Handles are exclusively owned: there is no `Clone`, and [`finish`](Self::finish)
/// consumes the handle so it can be released only once.
pub trait Transport {
    type Result: ResultHandle;

    fn status(&self) -> ConnStatus;

    /// Most recent error reported on the handle.
    fn error_message(&self) -> Option<String>;

    /// A run-time parameter reported by the server (e.g. `integer_datetimes`).
    fn parameter_status(&self, key: &str) -> Option<String>;

    /// Execute one statement with out-of-line parameters.
    ///
    /// Failures are reported through the returned handle's status.
    fn exec_params(
        &mut self,
        query: &str,
        params: &EncodedParams,
        result_format: Format,
    ) -> Self::Result;

    /// Close and re-open the connection with the same settings.
    fn reset(&mut self);

    /// Release the handle.
    fn finish(self);
}

/// A transport that can be opened from a connection string.
pub trait Connect: Transport + Sized {
    /// Blocking connect. Never fails outright: a failed attempt yields a
    /// handle whose status is [`ConnStatus::Bad`].
    fn open(conninfo: &str) -> Self;
}
