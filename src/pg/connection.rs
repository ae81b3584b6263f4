//! The connection abstraction callers work with.
//!
//! A [`Connection`] exclusively owns one transport handle. It gates every
//! statement on the handle's status, encodes parameters, interprets the
//! result status, and decodes rows with the connection's cached
//! [`Configuration`].

use std::fmt;

use once_cell::unsync::OnceCell;

use super::configuration::Configuration;
use super::conninfo::ConnInfo;
use super::context::ValueContext;
use super::params::EncodedParams;
use super::protocol::Format;
use super::result::{decode_rows, Row};
use super::transport::{ConnStatus, Connect, ExecStatus, ResultHandle, Transport};
use super::types::Value;
use super::wire::WireTransport;
use crate::error::{ConnectionError, Error, QueryError};

/// A single blocking database connection.
///
/// Not `Clone`: the handle is released exactly once, by [`close`](Self::close)
/// or on drop. Calls must be serialized by the caller; the connection is not
/// `Sync`.
pub struct Connection<T: Transport = WireTransport> {
    /// `None` once closed
    transport: Option<T>,
    configuration: OnceCell<Configuration>,
}

impl Connection<WireTransport> {
    /// Connect with the native wire transport.
    pub fn connect(info: &ConnInfo) -> Result<Self, ConnectionError> {
        Self::connect_with(info)
    }
}

impl<T: Connect> Connection<T> {
    /// Connect with any transport that can open itself from a connection string.
    pub fn connect_with(info: &ConnInfo) -> Result<Self, ConnectionError> {
        tracing::debug!("opening connection");
        Self::from_transport(T::open(&info.to_conninfo()))
    }
}

impl<T: Transport> Connection<T> {
    /// Adopt an opened transport. A transport that is not `Ok` is released
    /// and its error reported.
    pub fn from_transport(transport: T) -> Result<Self, ConnectionError> {
        if transport.status() != ConnStatus::Ok {
            let message = transport
                .error_message()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "connection status is bad".to_string());
            transport.finish();
            tracing::debug!(error = %message, "connection failed");
            return Err(ConnectionError::CannotEstablish(message));
        }

        Ok(Self {
            transport: Some(transport),
            configuration: OnceCell::new(),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnStatus::Ok
    }

    /// Raw handle status; a closed connection reports `Bad`.
    pub fn status(&self) -> ConnStatus {
        self.transport
            .as_ref()
            .map_or(ConnStatus::Bad, Transport::status)
    }

    /// Re-establish the connection on the same handle.
    ///
    /// The cached [`Configuration`] survives the reset even if the server's
    /// settings changed.
    pub fn reset(&mut self) -> Result<(), ConnectionError> {
        let transport = match self.transport.as_mut() {
            Some(t) if t.status() == ConnStatus::Ok => t,
            _ => return Err(ConnectionError::NotConnected),
        };

        tracing::debug!("resetting connection");
        transport.reset();
        if transport.status() != ConnStatus::Ok {
            let error = transport.error_message().unwrap_or_default();
            tracing::warn!(error = %error, "reconnect after reset failed");
        }
        Ok(())
    }

    /// Release the handle.
    ///
    /// Fails with `AlreadyClosed` if the connection is not connected,
    /// including a second close.
    pub fn close(&mut self) -> Result<(), ConnectionError> {
        if !self.is_connected() {
            return Err(ConnectionError::AlreadyClosed);
        }
        if let Some(transport) = self.transport.take() {
            transport.finish();
        }
        tracing::debug!("connection closed");
        Ok(())
    }

    /// Most recent error reported by the handle, or an empty string.
    pub fn last_error(&self) -> String {
        self.transport
            .as_ref()
            .and_then(Transport::error_message)
            .unwrap_or_default()
    }

    /// Server settings used for decoding, resolved on first use.
    pub fn configuration(&self) -> Result<Configuration, ConnectionError> {
        self.configuration
            .get_or_try_init(|| {
                self.transport
                    .as_ref()
                    .map(Configuration::load)
                    .ok_or(ConnectionError::NotConnected)
            })
            .copied()
    }

    /// The configuration if it has already been resolved.
    pub fn cached_configuration(&self) -> Option<Configuration> {
        self.configuration.get().copied()
    }

    /// Run one parameterized statement and decode its rows.
    ///
    /// Parameters and results both travel in binary format. Statements that
    /// return no rows yield an empty vector.
    pub fn execute(&mut self, query: &str, params: &[Value]) -> Result<Vec<Row>, Error> {
        if query.is_empty() {
            return Err(QueryError::EmptyQuery.into());
        }
        let transport = self
            .transport
            .as_mut()
            .ok_or(ConnectionError::NotConnected)?;

        let encoded = EncodedParams::encode(params)?;
        tracing::debug!(params = encoded.len(), "executing statement");

        // dropped on every return path below
        let result = transport.exec_params(query, &encoded, Format::Binary);

        match result.status() {
            ExecStatus::TuplesOk => {
                let config = *self
                    .configuration
                    .get_or_init(|| Configuration::load(&*transport));
                let rows = decode_rows(&result, &config)?;
                tracing::trace!(rows = rows.len(), "decoded result");
                Ok(rows)
            }
            ExecStatus::CommandOk | ExecStatus::EmptyQuery => Ok(Vec::new()),
            status @ (ExecStatus::NonFatalError | ExecStatus::FatalError | ExecStatus::Unknown) => {
                let message = result.error_message();
                tracing::debug!(?status, error = %message, "statement failed");
                Err(QueryError::InvalidSql(message).into())
            }
        }
    }

    /// Like [`execute`](Self::execute), converting parameters and rows
    /// through the caller's `context`.
    pub fn execute_in<C: ValueContext>(
        &mut self,
        context: &C,
        query: &str,
        params: &[C::Param],
    ) -> Result<Vec<C::Record>, Error> {
        if query.is_empty() {
            return Err(QueryError::EmptyQuery.into());
        }
        let values = params
            .iter()
            .map(|p| context.to_value(p))
            .collect::<Result<Vec<_>, _>>()?;

        self.execute(query, &values)?
            .into_iter()
            .map(|row| context.to_record(row).map_err(Error::from))
            .collect()
    }
}

impl<T: Transport> Drop for Connection<T> {
    fn drop(&mut self) {
        if let Some(transport) = self.transport.take() {
            // Nothing to report from an implicit close.
            transport.finish();
            tracing::debug!("connection released on drop");
        }
    }
}

impl<T: Transport> fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("status", &self.status())
            .field("configuration", &self.cached_configuration())
            .finish()
    }
}
