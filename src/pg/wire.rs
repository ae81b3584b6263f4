//! Blocking protocol v3 client over TCP.
//!
//! Each statement is one unnamed Parse/Bind/Describe/Execute/Sync round-trip
//! whose response is buffered into a [`WireResult`]. TLS, Unix-domain sockets
//! and cancellation are not supported.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use bytes::{Bytes, BytesMut};

use super::auth::{md5_password, AuthError, ScramClient, SCRAM_SHA_256};
use super::conninfo::WireConfig;
use super::error::{PgError, PgResult};
use super::params::EncodedParams;
use super::protocol::*;
use super::transport::{ConnStatus, Connect, ExecStatus, ResultHandle, Transport};
use super::types::Oid;

const READ_CHUNK: usize = 8192;

/// Native [`Transport`] speaking the wire protocol directly.
pub struct WireTransport {
    /// `None` when the connection string itself was invalid
    config: Option<WireConfig>,
    stream: Option<TcpStream>,
    read_buffer: BytesMut,
    /// Server parameters (e.g., server_version, integer_datetimes)
    parameters: HashMap<String, String>,
    transaction_status: TransactionStatus,
    backend_pid: i32,
    last_error: Option<String>,
}

impl WireTransport {
    fn new(config: Option<WireConfig>) -> Self {
        Self {
            config,
            stream: None,
            read_buffer: BytesMut::with_capacity(READ_CHUNK),
            parameters: HashMap::new(),
            transaction_status: TransactionStatus::Idle,
            backend_pid: 0,
            last_error: None,
        }
    }

    /// Connect with an already-parsed configuration.
    pub fn connect_config(config: WireConfig) -> Self {
        let mut transport = Self::new(Some(config));
        transport.establish();
        transport
    }

    pub fn config(&self) -> Option<&WireConfig> {
        self.config.as_ref()
    }

    pub fn transaction_status(&self) -> TransactionStatus {
        self.transaction_status
    }

    pub fn backend_pid(&self) -> i32 {
        self.backend_pid
    }

    /// Open the socket and run startup; failures leave the transport `Bad`.
    fn establish(&mut self) {
        let Some(config) = self.config.clone() else {
            return;
        };

        let outcome = open_socket(&config).and_then(|stream| {
            self.stream = Some(stream);
            self.startup(&config)
        });

        match outcome {
            Ok(()) => {
                self.last_error = None;
                tracing::debug!(
                    host = %config.host,
                    port = config.port,
                    dbname = %config.dbname,
                    user = %config.user,
                    backend_pid = self.backend_pid,
                    "connected"
                );
            }
            Err(e) => self.mark_bad(e.to_string()),
        }
    }

    fn startup(&mut self, config: &WireConfig) -> PgResult<()> {
        let mut options = vec![("client_encoding", config.client_encoding.as_str())];
        if let Some(name) = &config.application_name {
            options.push(("application_name", name.as_str()));
        }
        self.send_message(&StartupMessage {
            user: &config.user,
            database: &config.dbname,
            options,
        })?;

        loop {
            match self.next_message()? {
                BackendMessage::AuthenticationOk => {}
                BackendMessage::AuthenticationCleartextPassword => {
                    let password = required_password(config)?;
                    self.send_message(&PasswordMessage { password })?;
                }
                BackendMessage::AuthenticationMD5Password { salt } => {
                    let hash = md5_password(&config.user, required_password(config)?, &salt);
                    self.send_message(&PasswordMessage { password: &hash })?;
                }
                BackendMessage::AuthenticationSASL { mechanisms } => {
                    self.authenticate_scram(config, &mechanisms)?;
                }
                BackendMessage::BackendKeyData { process_id, .. } => {
                    self.backend_pid = process_id;
                }
                BackendMessage::ReadyForQuery { status } => {
                    self.transaction_status = status;
                    return Ok(());
                }
                BackendMessage::ErrorResponse { fields } => {
                    return Err(PgError::from_fields(&fields));
                }
                other => {
                    return Err(PgError::Protocol(format!(
                        "unexpected message during startup: {:?}",
                        other
                    )))
                }
            }
        }
    }

    fn authenticate_scram(&mut self, config: &WireConfig, mechanisms: &[String]) -> PgResult<()> {
        if !mechanisms.iter().any(|m| m == SCRAM_SHA_256) {
            return Err(AuthError::UnsupportedMechanism(mechanisms.join(", ")).into());
        }

        let mut scram = ScramClient::new(required_password(config)?);
        self.send_message(&SaslInitialResponseMessage {
            mechanism: SCRAM_SHA_256,
            data: &scram.client_first_message(),
        })?;

        loop {
            match self.next_message()? {
                BackendMessage::AuthenticationSASLContinue { data } => {
                    let client_final = scram.process_server_first(&data)?;
                    self.send_message(&SaslResponseMessage {
                        data: &client_final,
                    })?;
                }
                BackendMessage::AuthenticationSASLFinal { data } => {
                    scram.verify_server_final(&data)?;
                    return Ok(());
                }
                BackendMessage::ErrorResponse { fields } => {
                    return Err(PgError::from_fields(&fields));
                }
                other => {
                    return Err(PgError::Protocol(format!(
                        "unexpected message during SASL exchange: {:?}",
                        other
                    )))
                }
            }
        }
    }

    /// Send one extended-query cycle and buffer everything up to ReadyForQuery.
    fn round_trip(
        &mut self,
        query: &str,
        params: &EncodedParams,
        result_format: Format,
    ) -> PgResult<WireResult> {
        let mut buf = BytesMut::new();
        ParseMessage {
            name: "",
            query,
            param_types: params.types(),
        }
        .encode_into(&mut buf);
        BindMessage {
            portal: "",
            statement: "",
            params,
            result_format,
        }
        .encode_into(&mut buf);
        DescribeMessage {
            kind: b'P',
            name: "",
        }
        .encode_into(&mut buf);
        ExecuteMessage {
            portal: "",
            max_rows: 0,
        }
        .encode_into(&mut buf);
        SyncMessage.encode_into(&mut buf);
        self.write_all(&buf)?;

        let mut result = WireResult::new(ExecStatus::Unknown);
        let mut server_error = None;

        loop {
            match self.next_message()? {
                BackendMessage::ParseComplete
                | BackendMessage::BindComplete
                | BackendMessage::NoData
                | BackendMessage::PortalSuspended => {}
                BackendMessage::RowDescription { fields } => {
                    result.columns = fields;
                    result.status = ExecStatus::TuplesOk;
                }
                BackendMessage::DataRow { values } => result.rows.push(values),
                BackendMessage::CommandComplete { tag } => {
                    if result.status != ExecStatus::TuplesOk {
                        result.status = ExecStatus::CommandOk;
                    }
                    result.command_tag = tag;
                }
                BackendMessage::EmptyQueryResponse => result.status = ExecStatus::EmptyQuery,
                BackendMessage::ErrorResponse { fields } => {
                    // keep draining until ReadyForQuery
                    server_error = Some(PgError::from_fields(&fields));
                }
                BackendMessage::ReadyForQuery { status } => {
                    self.transaction_status = status;
                    break;
                }
                other => {
                    return Err(PgError::Protocol(format!(
                        "unexpected message during query: {:?}",
                        other
                    )))
                }
            }
        }

        match server_error {
            Some(e) => Ok(WireResult::failed(e.to_string())),
            None => Ok(result),
        }
    }

    fn send_message<M: FrontendMessage>(&mut self, msg: &M) -> PgResult<()> {
        self.write_all(&msg.encode())
    }

    fn write_all(&mut self, buf: &[u8]) -> PgResult<()> {
        let stream = self.stream.as_mut().ok_or(PgError::ConnectionClosed)?;
        stream.write_all(buf)?;
        stream.flush()?;
        Ok(())
    }

    /// Next message that is not asynchronous chatter.
    fn next_message(&mut self) -> PgResult<BackendMessage> {
        loop {
            match self.receive_message()? {
                BackendMessage::ParameterStatus { name, value } => {
                    tracing::trace!(parameter = %name, value = %value, "parameter status");
                    self.parameters.insert(name, value);
                }
                BackendMessage::NoticeResponse { fields } => {
                    tracing::warn!(
                        severity = fields.get(&b'S').map(String::as_str).unwrap_or_default(),
                        message = fields.get(&b'M').map(String::as_str).unwrap_or_default(),
                        "server notice"
                    );
                }
                BackendMessage::NotificationResponse { channel, .. } => {
                    tracing::trace!(channel = %channel, "ignoring notification");
                }
                msg => return Ok(msg),
            }
        }
    }

    fn receive_message(&mut self) -> PgResult<BackendMessage> {
        loop {
            if let Some(total) = frame_len(&self.read_buffer)? {
                if self.read_buffer.len() >= total {
                    tracing::trace!(
                        tag = %(self.read_buffer[0] as char),
                        len = total,
                        "received message"
                    );
                    let mut frame = self.read_buffer.split_to(total).freeze();
                    return BackendMessage::decode(&mut frame);
                }
            }

            let stream = self.stream.as_mut().ok_or(PgError::ConnectionClosed)?;
            let mut chunk = [0u8; READ_CHUNK];
            let n = match stream.read(&mut chunk) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if n == 0 {
                return Err(PgError::ConnectionClosed);
            }
            self.read_buffer.extend_from_slice(&chunk[..n]);
        }
    }

    fn mark_bad(&mut self, message: String) {
        tracing::debug!(error = %message, "connection marked bad");
        self.stream = None;
        self.read_buffer.clear();
        self.last_error = Some(message);
    }

    /// Best-effort Terminate; the socket is dropped either way.
    fn terminate(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let mut buf = BytesMut::new();
            TerminateMessage.encode_into(&mut buf);
            if let Err(e) = stream.write_all(&buf).and_then(|_| stream.flush()) {
                tracing::warn!(error = %e, "terminate not delivered");
            }
        }
        self.read_buffer.clear();
    }
}

impl Transport for WireTransport {
    type Result = WireResult;

    fn status(&self) -> ConnStatus {
        if self.stream.is_some() {
            ConnStatus::Ok
        } else {
            ConnStatus::Bad
        }
    }

    fn error_message(&self) -> Option<String> {
        self.last_error.clone()
    }

    fn parameter_status(&self, key: &str) -> Option<String> {
        self.parameters.get(key).cloned()
    }

    fn exec_params(
        &mut self,
        query: &str,
        params: &EncodedParams,
        result_format: Format,
    ) -> WireResult {
        if self.stream.is_none() {
            return WireResult::failed(
                self.last_error
                    .clone()
                    .unwrap_or_else(|| "no connection to the server".to_string()),
            );
        }
        if params.len() > usize::from(u16::MAX) {
            return WireResult::failed(format!(
                "number of parameters must be between 0 and {}",
                u16::MAX
            ));
        }

        match self.round_trip(query, params, result_format) {
            Ok(result) => result,
            Err(e) => {
                let message = e.to_string();
                self.mark_bad(message.clone());
                WireResult::failed(message)
            }
        }
    }

    fn reset(&mut self) {
        tracing::debug!("resetting connection");
        self.terminate();
        self.parameters.clear();
        self.transaction_status = TransactionStatus::Idle;
        self.establish();
    }

    fn finish(mut self) {
        self.terminate();
    }
}

impl Connect for WireTransport {
    fn open(conninfo: &str) -> Self {
        match WireConfig::parse(conninfo) {
            Ok(config) => Self::connect_config(config),
            Err(e) => {
                let mut transport = Self::new(None);
                transport.mark_bad(e.to_string());
                transport
            }
        }
    }
}

impl Drop for WireTransport {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// A fully buffered statement result.
#[derive(Debug)]
pub struct WireResult {
    status: ExecStatus,
    error_message: String,
    columns: Vec<FieldDescription>,
    rows: Vec<Vec<Option<Bytes>>>,
    command_tag: String,
}

impl WireResult {
    fn new(status: ExecStatus) -> Self {
        Self {
            status,
            error_message: String::new(),
            columns: Vec::new(),
            rows: Vec::new(),
            command_tag: String::new(),
        }
    }

    fn failed(message: String) -> Self {
        Self {
            error_message: message,
            ..Self::new(ExecStatus::FatalError)
        }
    }

    /// e.g. `SELECT 5` or `INSERT 0 1`
    pub fn command_tag(&self) -> &str {
        &self.command_tag
    }
}

impl ResultHandle for WireResult {
    fn status(&self) -> ExecStatus {
        self.status
    }

    fn error_message(&self) -> String {
        self.error_message.clone()
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column_name(&self, column: usize) -> &str {
        self.columns.get(column).map_or("", |f| f.name.as_str())
    }

    fn column_type(&self, column: usize) -> Oid {
        self.columns
            .get(column)
            .map_or(Oid::UNSPECIFIED, |f| f.type_oid)
    }

    fn cell(&self, row: usize, column: usize) -> Option<&[u8]> {
        self.rows.get(row)?.get(column)?.as_deref()
    }
}

fn required_password(config: &WireConfig) -> Result<&str, AuthError> {
    config.password.as_deref().ok_or(AuthError::PasswordRequired)
}

/// Try every address the host resolves to, in order.
fn open_socket(config: &WireConfig) -> PgResult<TcpStream> {
    let (host, port) = config.address();
    let addrs = (host, port).to_socket_addrs().map_err(|e| {
        PgError::Io(io::Error::new(
            e.kind(),
            format!("could not translate host name \"{}\" to address: {}", host, e),
        ))
    })?;

    let mut last_error = None;
    for addr in addrs {
        let attempt = match config.connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(e) => {
                tracing::trace!(%addr, error = %e, "connect attempt failed");
                last_error = Some(io::Error::new(
                    e.kind(),
                    format!("connection to server at {} failed: {}", addr, e),
                ));
            }
        }
    }

    Err(PgError::Io(last_error.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("could not translate host name \"{}\" to address", host),
        )
    })))
}
