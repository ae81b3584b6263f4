//! PostgreSQL wire protocol message encoding and decoding.
//!
//! Only the subset a single-statement extended-query client needs: startup
//! and authentication, Parse/Bind/Describe/Execute/Sync, and Terminate.
//! Reference: https://www.postgresql.org/docs/current/protocol-message-formats.html

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::HashMap;

use super::error::{PgError, PgResult};
use super::params::EncodedParams;
use super::types::Oid;

// ============================================================================
// Protocol Constants
// ============================================================================

/// PostgreSQL protocol version 3.0
pub const PROTOCOL_VERSION: i32 = 196608; // (3 << 16) | 0

/// Backend messages larger than this are treated as a corrupt stream.
pub const MAX_MESSAGE_LEN: usize = 1 << 30;

/// Format codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i16)]
pub enum Format {
    Text = 0,
    Binary = 1,
}

impl Format {
    fn from_code(code: i16) -> Self {
        if code == 0 {
            Format::Text
        } else {
            Format::Binary
        }
    }
}

/// Transaction status indicators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Idle (not in a transaction block)
    Idle,
    /// In a transaction block
    InTransaction,
    /// In a failed transaction block
    Failed,
}

impl From<u8> for TransactionStatus {
    fn from(b: u8) -> Self {
        match b {
            b'T' => TransactionStatus::InTransaction,
            b'E' => TransactionStatus::Failed,
            _ => TransactionStatus::Idle,
        }
    }
}

// ============================================================================
// Frontend (Client -> Server) Messages
// ============================================================================

/// Trait for encoding frontend messages
pub trait FrontendMessage {
    /// Append the encoded message to `buf`.
    fn encode_into(&self, buf: &mut BytesMut);

    fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf);
        buf
    }
}

/// Write a tagged message, back-filling its length once the body is known.
fn put_message(buf: &mut BytesMut, tag: u8, body: impl FnOnce(&mut BytesMut)) {
    buf.put_u8(tag);
    let start = buf.len();
    buf.put_i32(0);
    body(buf);
    let len = (buf.len() - start) as i32;
    buf[start..start + 4].copy_from_slice(&len.to_be_bytes());
}

fn put_cstring(buf: &mut BytesMut, s: &str) {
    buf.put_slice(s.as_bytes());
    buf.put_u8(0);
}

/// Startup message sent at connection start
#[derive(Debug, Clone)]
pub struct StartupMessage<'a> {
    pub user: &'a str,
    pub database: &'a str,
    pub options: Vec<(&'a str, &'a str)>,
}

impl FrontendMessage for StartupMessage<'_> {
    fn encode_into(&self, buf: &mut BytesMut) {
        // Untagged: length then protocol version
        let start = buf.len();
        buf.put_i32(0);
        buf.put_i32(PROTOCOL_VERSION);

        put_cstring(buf, "user");
        put_cstring(buf, self.user);
        put_cstring(buf, "database");
        put_cstring(buf, self.database);
        for (key, value) in &self.options {
            put_cstring(buf, key);
            put_cstring(buf, value);
        }
        buf.put_u8(0);

        let len = (buf.len() - start) as i32;
        buf[start..start + 4].copy_from_slice(&len.to_be_bytes());
    }
}

/// Password message (for MD5 or plaintext auth)
#[derive(Debug, Clone)]
pub struct PasswordMessage<'a> {
    pub password: &'a str,
}

impl FrontendMessage for PasswordMessage<'_> {
    fn encode_into(&self, buf: &mut BytesMut) {
        put_message(buf, b'p', |body| put_cstring(body, self.password));
    }
}

/// SASL Initial Response message ('p') - First SCRAM message
#[derive(Debug, Clone)]
pub struct SaslInitialResponseMessage<'a> {
    /// SASL mechanism name (e.g., "SCRAM-SHA-256")
    pub mechanism: &'a str,
    pub data: &'a [u8],
}

impl FrontendMessage for SaslInitialResponseMessage<'_> {
    fn encode_into(&self, buf: &mut BytesMut) {
        put_message(buf, b'p', |body| {
            put_cstring(body, self.mechanism);
            body.put_i32(self.data.len() as i32);
            body.put_slice(self.data);
        });
    }
}

/// SASL Response message ('p') - Subsequent SCRAM messages
#[derive(Debug, Clone)]
pub struct SaslResponseMessage<'a> {
    pub data: &'a [u8],
}

impl FrontendMessage for SaslResponseMessage<'_> {
    fn encode_into(&self, buf: &mut BytesMut) {
        put_message(buf, b'p', |body| body.put_slice(self.data));
    }
}

/// Parse message ('P') - Creates a prepared statement
#[derive(Debug, Clone)]
pub struct ParseMessage<'a> {
    /// Empty for the unnamed statement
    pub name: &'a str,
    pub query: &'a str,
    pub param_types: &'a [Oid],
}

impl FrontendMessage for ParseMessage<'_> {
    fn encode_into(&self, buf: &mut BytesMut) {
        put_message(buf, b'P', |body| {
            put_cstring(body, self.name);
            put_cstring(body, self.query);
            body.put_u16(self.param_types.len() as u16);
            for oid in self.param_types {
                body.put_u32(oid.as_u32());
            }
        });
    }
}

/// Bind message ('B') - Binds parameters to a prepared statement
#[derive(Debug, Clone)]
pub struct BindMessage<'a> {
    pub portal: &'a str,
    pub statement: &'a str,
    pub params: &'a EncodedParams,
    /// Applied to every result column
    pub result_format: Format,
}

impl FrontendMessage for BindMessage<'_> {
    fn encode_into(&self, buf: &mut BytesMut) {
        put_message(buf, b'B', |body| {
            put_cstring(body, self.portal);
            put_cstring(body, self.statement);

            body.put_u16(self.params.formats().len() as u16);
            for format in self.params.formats() {
                body.put_i16(*format as i16);
            }

            body.put_u16(self.params.len() as u16);
            for (value, len) in self.params.values().iter().zip(self.params.lengths()) {
                match value {
                    Some(data) => {
                        body.put_i32(*len);
                        body.put_slice(data);
                    }
                    None => body.put_i32(-1),
                }
            }

            body.put_i16(1);
            body.put_i16(self.result_format as i16);
        });
    }
}

/// Describe message ('D') - Request description of statement or portal
#[derive(Debug, Clone)]
pub struct DescribeMessage<'a> {
    /// 'S' for statement, 'P' for portal
    pub kind: u8,
    pub name: &'a str,
}

impl FrontendMessage for DescribeMessage<'_> {
    fn encode_into(&self, buf: &mut BytesMut) {
        put_message(buf, b'D', |body| {
            body.put_u8(self.kind);
            put_cstring(body, self.name);
        });
    }
}

/// Execute message ('E') - Executes a bound portal
#[derive(Debug, Clone)]
pub struct ExecuteMessage<'a> {
    pub portal: &'a str,
    /// 0 = no limit
    pub max_rows: i32,
}

impl FrontendMessage for ExecuteMessage<'_> {
    fn encode_into(&self, buf: &mut BytesMut) {
        put_message(buf, b'E', |body| {
            put_cstring(body, self.portal);
            body.put_i32(self.max_rows);
        });
    }
}

/// Sync message ('S') - Marks end of an extended query
#[derive(Debug, Clone, Copy)]
pub struct SyncMessage;

impl FrontendMessage for SyncMessage {
    fn encode_into(&self, buf: &mut BytesMut) {
        put_message(buf, b'S', |_| {});
    }
}

/// Terminate message ('X') - Close the connection
#[derive(Debug, Clone, Copy)]
pub struct TerminateMessage;

impl FrontendMessage for TerminateMessage {
    fn encode_into(&self, buf: &mut BytesMut) {
        put_message(buf, b'X', |_| {});
    }
}

// ============================================================================
// Backend (Server -> Client) Messages
// ============================================================================

/// Field description in a RowDescription message
#[derive(Debug, Clone)]
pub struct FieldDescription {
    pub name: String,
    pub table_oid: u32,
    pub column_attr: i16,
    pub type_oid: Oid,
    pub type_size: i16,
    pub type_modifier: i32,
    pub format: Format,
}

/// Backend message types
#[derive(Debug, Clone)]
pub enum BackendMessage {
    // Authentication
    AuthenticationOk,
    AuthenticationCleartextPassword,
    AuthenticationMD5Password { salt: [u8; 4] },
    AuthenticationSASL { mechanisms: Vec<String> },
    AuthenticationSASLContinue { data: Bytes },
    AuthenticationSASLFinal { data: Bytes },

    // Query responses
    RowDescription { fields: Vec<FieldDescription> },
    DataRow { values: Vec<Option<Bytes>> },
    CommandComplete { tag: String },
    EmptyQueryResponse,

    // Extended query protocol
    ParseComplete,
    BindComplete,
    NoData,
    PortalSuspended,

    // Status
    ReadyForQuery { status: TransactionStatus },
    ParameterStatus { name: String, value: String },
    BackendKeyData { process_id: i32, secret_key: i32 },

    // Errors and notices
    ErrorResponse { fields: HashMap<u8, String> },
    NoticeResponse { fields: HashMap<u8, String> },

    NotificationResponse {
        process_id: i32,
        channel: String,
        payload: String,
    },
}

/// Total size of the message starting at `buf`, once its header is buffered.
pub fn frame_len(buf: &[u8]) -> PgResult<Option<usize>> {
    if buf.len() < 5 {
        return Ok(None);
    }
    let len = i32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
    match usize::try_from(len) {
        Ok(len) if (4..=MAX_MESSAGE_LEN).contains(&len) => Ok(Some(1 + len)),
        _ => Err(PgError::Protocol(format!(
            "invalid length {} for message type {}",
            len, buf[0] as char
        ))),
    }
}

impl BackendMessage {
    /// Decode a backend message from bytes.
    ///
    /// The input buffer should start with the message type byte.
    pub fn decode(buf: &mut Bytes) -> PgResult<Self> {
        let total = frame_len(&buf[..])?
            .ok_or_else(|| PgError::Protocol("Incomplete message header".to_string()))?;
        if buf.remaining() < total {
            return Err(PgError::Protocol("Incomplete message body".to_string()));
        }

        let msg_type = buf.get_u8();
        buf.advance(4);
        let mut body = buf.split_to(total - 5);

        match msg_type {
            b'R' => Self::decode_auth(body),
            b'T' => Self::decode_row_description(body),
            b'D' => Self::decode_data_row(body),
            b'C' => Ok(BackendMessage::CommandComplete {
                tag: read_cstring(&mut body)?,
            }),
            b'Z' => Ok(BackendMessage::ReadyForQuery {
                status: TransactionStatus::from(get_u8(&mut body)?),
            }),
            b'E' => Ok(BackendMessage::ErrorResponse {
                fields: read_error_fields(body)?,
            }),
            b'N' => Ok(BackendMessage::NoticeResponse {
                fields: read_error_fields(body)?,
            }),
            b'S' => {
                let name = read_cstring(&mut body)?;
                let value = read_cstring(&mut body)?;
                Ok(BackendMessage::ParameterStatus { name, value })
            }
            b'K' => Ok(BackendMessage::BackendKeyData {
                process_id: get_i32(&mut body)?,
                secret_key: get_i32(&mut body)?,
            }),
            b'A' => Ok(BackendMessage::NotificationResponse {
                process_id: get_i32(&mut body)?,
                channel: read_cstring(&mut body)?,
                payload: read_cstring(&mut body)?,
            }),
            b'1' => Ok(BackendMessage::ParseComplete),
            b'2' => Ok(BackendMessage::BindComplete),
            b'I' => Ok(BackendMessage::EmptyQueryResponse),
            b'n' => Ok(BackendMessage::NoData),
            b's' => Ok(BackendMessage::PortalSuspended),
            _ => Err(PgError::Protocol(format!(
                "Unknown message type: {}",
                msg_type as char
            ))),
        }
    }

    fn decode_auth(mut body: Bytes) -> PgResult<Self> {
        let auth_type = get_i32(&mut body)?;

        match auth_type {
            0 => Ok(BackendMessage::AuthenticationOk),
            3 => Ok(BackendMessage::AuthenticationCleartextPassword),
            5 => {
                let mut salt = [0u8; 4];
                take(&mut body, 4)?.copy_to_slice(&mut salt);
                Ok(BackendMessage::AuthenticationMD5Password { salt })
            }
            10 => {
                let mut mechanisms = Vec::new();
                while body.has_remaining() {
                    let mech = read_cstring(&mut body)?;
                    if mech.is_empty() {
                        break;
                    }
                    mechanisms.push(mech);
                }
                Ok(BackendMessage::AuthenticationSASL { mechanisms })
            }
            11 => Ok(BackendMessage::AuthenticationSASLContinue { data: body }),
            12 => Ok(BackendMessage::AuthenticationSASLFinal { data: body }),
            _ => Err(PgError::Auth(format!(
                "unsupported authentication method {}",
                auth_type
            ))),
        }
    }

    fn decode_row_description(mut body: Bytes) -> PgResult<Self> {
        let num_fields = get_i16(&mut body)?.max(0) as usize;
        let mut fields = Vec::with_capacity(num_fields);

        for _ in 0..num_fields {
            let name = read_cstring(&mut body)?;
            let mut fixed = take(&mut body, 18)?;
            fields.push(FieldDescription {
                name,
                table_oid: fixed.get_u32(),
                column_attr: fixed.get_i16(),
                type_oid: Oid(fixed.get_u32()),
                type_size: fixed.get_i16(),
                type_modifier: fixed.get_i32(),
                format: Format::from_code(fixed.get_i16()),
            });
        }

        Ok(BackendMessage::RowDescription { fields })
    }

    fn decode_data_row(mut body: Bytes) -> PgResult<Self> {
        let num_cols = get_i16(&mut body)?.max(0) as usize;
        let mut values = Vec::with_capacity(num_cols);

        for _ in 0..num_cols {
            let len = get_i32(&mut body)?;
            if len < 0 {
                values.push(None);
            } else {
                values.push(Some(take(&mut body, len as usize)?));
            }
        }

        Ok(BackendMessage::DataRow { values })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn take(buf: &mut Bytes, n: usize) -> PgResult<Bytes> {
    if buf.remaining() < n {
        return Err(PgError::Protocol(format!(
            "message truncated: wanted {} bytes, {} left",
            n,
            buf.remaining()
        )));
    }
    Ok(buf.split_to(n))
}

fn get_u8(buf: &mut Bytes) -> PgResult<u8> {
    Ok(take(buf, 1)?.get_u8())
}

fn get_i16(buf: &mut Bytes) -> PgResult<i16> {
    Ok(take(buf, 2)?.get_i16())
}

fn get_i32(buf: &mut Bytes) -> PgResult<i32> {
    Ok(take(buf, 4)?.get_i32())
}

/// Read a null-terminated string from the buffer.
/// Tries direct UTF-8 first, falls back to lossy only if invalid.
fn read_cstring(buf: &mut Bytes) -> PgResult<String> {
    let end = buf
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| PgError::Protocol("Missing null terminator in string".to_string()))?;

    let s = std::str::from_utf8(&buf[..end])
        .map(|s| s.to_owned())
        .unwrap_or_else(|_| String::from_utf8_lossy(&buf[..end]).into_owned());

    buf.advance(end + 1);
    Ok(s)
}

/// Read error/notice response fields
fn read_error_fields(mut body: Bytes) -> PgResult<HashMap<u8, String>> {
    let mut fields = HashMap::new();

    while body.has_remaining() {
        let field_type = body.get_u8();
        if field_type == 0 {
            break;
        }
        let value = read_cstring(&mut body)?;
        fields.insert(field_type, value);
    }

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pg::types::Value;

    fn frame(tag: u8, body: &[u8]) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_u8(tag);
        buf.put_i32(body.len() as i32 + 4);
        buf.put_slice(body);
        buf.freeze()
    }

    #[test]
    fn test_startup_message_structure() {
        let msg = StartupMessage {
            user: "test",
            database: "testdb",
            options: vec![("client_encoding", "UTF8")],
        };

        let encoded = msg.encode();

        let len = i32::from_be_bytes([encoded[0], encoded[1], encoded[2], encoded[3]]);
        assert_eq!(len as usize, encoded.len());
        assert_eq!(&encoded[4..8], &PROTOCOL_VERSION.to_be_bytes());
        assert_eq!(
            &encoded[8..],
            b"user\0test\0database\0testdb\0client_encoding\0UTF8\0\0"
        );
    }

    #[test]
    fn test_bind_message_structure() {
        let params = EncodedParams::encode(&[Value::Int2(7), Value::Null]).unwrap();
        let msg = BindMessage {
            portal: "",
            statement: "",
            params: &params,
            result_format: Format::Binary,
        };

        let encoded = msg.encode();
        assert_eq!(encoded[0], b'B');

        let len = i32::from_be_bytes([encoded[1], encoded[2], encoded[3], encoded[4]]);
        assert_eq!(len as usize, encoded.len() - 1);

        let body = &encoded[5..];
        #[rustfmt::skip]
        let expected: &[u8] = &[
            0, 0,                   // portal, statement
            0, 2, 0, 1, 0, 1,       // two binary format codes
            0, 2,                   // two values
            0, 0, 0, 2, 0, 7,       // int2 7
            0xff, 0xff, 0xff, 0xff, // null
            0, 1, 0, 1,             // binary results
        ];
        assert_eq!(body, expected);
    }

    #[test]
    fn test_decode_data_row_with_null() {
        let mut body = Vec::new();
        body.extend_from_slice(&2i16.to_be_bytes());
        body.extend_from_slice(&(-1i32).to_be_bytes());
        body.extend_from_slice(&3i32.to_be_bytes());
        body.extend_from_slice(b"abc");

        let msg = BackendMessage::decode(&mut frame(b'D', &body)).unwrap();
        match msg {
            BackendMessage::DataRow { values } => {
                assert_eq!(values.len(), 2);
                assert!(values[0].is_none());
                assert_eq!(values[1].as_deref(), Some(&b"abc"[..]));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_overrunning_cell() {
        let mut body = Vec::new();
        body.extend_from_slice(&1i16.to_be_bytes());
        body.extend_from_slice(&100i32.to_be_bytes());
        body.extend_from_slice(b"short");

        assert!(matches!(
            BackendMessage::decode(&mut frame(b'D', &body)),
            Err(PgError::Protocol(_))
        ));
    }

    #[test]
    fn test_decode_error_response() {
        let body = b"SERROR\0C42601\0Msyntax error at or near \"SELEC\"\0\0";
        match BackendMessage::decode(&mut frame(b'E', body)).unwrap() {
            BackendMessage::ErrorResponse { fields } => {
                assert_eq!(fields[&b'C'], "42601");
                assert_eq!(fields[&b'M'], "syntax error at or near \"SELEC\"");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_frame_len() {
        assert_eq!(frame_len(b"Z\0\0").unwrap(), None);
        assert_eq!(frame_len(&frame(b'Z', b"I")).unwrap(), Some(6));
        assert!(frame_len(&[b'Z', 0, 0, 0, 2]).is_err());
    }
}
