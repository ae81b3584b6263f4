//! Password authentication: MD5 and SCRAM-SHA-256.
//!
//! SCRAM follows RFC 5802 and RFC 7677 without channel binding.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::error::PgError;

type HmacSha256 = Hmac<Sha256>;

pub const SCRAM_SHA_256: &str = "SCRAM-SHA-256";

/// Authentication failures detected on the client side.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("server requested a password but none was supplied")]
    PasswordRequired,

    #[error("server offered no supported SASL mechanism: {0}")]
    UnsupportedMechanism(String),

    #[error("invalid SCRAM server message: {0}")]
    InvalidServerMessage(&'static str),

    #[error("server nonce does not extend the client nonce")]
    NonceMismatch,

    #[error("server signature verification failed")]
    ServerSignatureMismatch,

    #[error("SCRAM messages arrived out of order")]
    InvalidState,
}

impl From<AuthError> for PgError {
    fn from(e: AuthError) -> Self {
        PgError::Auth(e.to_string())
    }
}

/// `"md5" + md5(hex(md5(password + user)) + salt)`
pub fn md5_password(user: &str, password: &str, salt: &[u8; 4]) -> String {
    let inner = md5::compute(format!("{}{}", password, user));
    let mut outer = format!("{:x}", inner).into_bytes();
    outer.extend_from_slice(salt);
    format!("md5{:x}", md5::compute(&outer))
}

/// SCRAM-SHA-256 client state machine.
pub struct ScramClient {
    password: String,
    client_nonce: String,
    /// Set once the server-first message has been processed
    verifier: Option<ServerVerifier>,
}

struct ServerVerifier {
    salted_password: [u8; 32],
    auth_message: String,
}

impl ScramClient {
    pub fn new(password: &str) -> Self {
        // 18 random bytes encode to 24 base64 characters
        let nonce_bytes: [u8; 18] = rand::thread_rng().gen();
        Self::with_nonce(password, BASE64.encode(nonce_bytes))
    }

    fn with_nonce(password: &str, client_nonce: String) -> Self {
        Self {
            password: password.to_string(),
            client_nonce,
            verifier: None,
        }
    }

    /// The server takes the user from the startup message, so `n=` stays
    /// empty and user names never need SASL escaping.
    fn client_first_bare(&self) -> String {
        format!("n=,r={}", self.client_nonce)
    }

    /// `n,,n=,r=<client-nonce>`
    pub fn client_first_message(&self) -> Vec<u8> {
        format!("n,,{}", self.client_first_bare()).into_bytes()
    }

    /// Consume `r=<nonce>,s=<salt>,i=<iterations>` and produce the client-final message.
    pub fn process_server_first(&mut self, server_msg: &[u8]) -> Result<Vec<u8>, AuthError> {
        let server_first = std::str::from_utf8(server_msg)
            .map_err(|_| AuthError::InvalidServerMessage("not UTF-8"))?;

        let mut nonce = None;
        let mut salt = None;
        let mut iterations = None;

        for part in server_first.split(',') {
            if let Some(value) = part.strip_prefix("r=") {
                nonce = Some(value);
            } else if let Some(value) = part.strip_prefix("s=") {
                salt = Some(
                    BASE64
                        .decode(value)
                        .map_err(|_| AuthError::InvalidServerMessage("salt is not base64"))?,
                );
            } else if let Some(value) = part.strip_prefix("i=") {
                iterations = value.parse::<u32>().ok().filter(|i| *i > 0);
                if iterations.is_none() {
                    return Err(AuthError::InvalidServerMessage("invalid iteration count"));
                }
            }
        }

        let combined_nonce = nonce.ok_or(AuthError::InvalidServerMessage("missing nonce"))?;
        let salt = salt.ok_or(AuthError::InvalidServerMessage("missing salt"))?;
        let iterations =
            iterations.ok_or(AuthError::InvalidServerMessage("missing iteration count"))?;

        if combined_nonce.len() <= self.client_nonce.len()
            || !combined_nonce.starts_with(&self.client_nonce)
        {
            return Err(AuthError::NonceMismatch);
        }

        let salted_password = hi(&self.password, &salt, iterations)?;
        let client_key = hmac_sha256(&salted_password, b"Client Key")?;
        let stored_key = sha256(&client_key);

        // c=biws is base64("n,,")
        let client_final_without_proof = format!("c=biws,r={}", combined_nonce);
        let auth_message = format!(
            "{},{},{}",
            self.client_first_bare(),
            server_first,
            client_final_without_proof
        );

        let client_signature = hmac_sha256(&stored_key, auth_message.as_bytes())?;
        let client_proof = xor_bytes(&client_key, &client_signature);

        self.verifier = Some(ServerVerifier {
            salted_password,
            auth_message,
        });

        Ok(format!(
            "{},p={}",
            client_final_without_proof,
            BASE64.encode(client_proof)
        )
        .into_bytes())
    }

    /// Check `v=<server-signature>` against the expected signature.
    pub fn verify_server_final(&self, server_msg: &[u8]) -> Result<(), AuthError> {
        let verifier = self.verifier.as_ref().ok_or(AuthError::InvalidState)?;

        let server_final = std::str::from_utf8(server_msg)
            .map_err(|_| AuthError::InvalidServerMessage("not UTF-8"))?;
        let signature = server_final
            .strip_prefix("v=")
            .ok_or(AuthError::InvalidServerMessage("missing server signature"))?;
        let signature = BASE64
            .decode(signature.trim_end())
            .map_err(|_| AuthError::InvalidServerMessage("signature is not base64"))?;

        let server_key = hmac_sha256(&verifier.salted_password, b"Server Key")?;
        let expected = hmac_sha256(&server_key, verifier.auth_message.as_bytes())?;

        if signature != expected {
            return Err(AuthError::ServerSignatureMismatch);
        }
        Ok(())
    }
}

/// Hi() from RFC 5802: PBKDF2 with HMAC-SHA-256.
fn hi(password: &str, salt: &[u8], iterations: u32) -> Result<[u8; 32], AuthError> {
    let mut output = [0u8; 32];
    pbkdf2::pbkdf2::<HmacSha256>(password.as_bytes(), salt, iterations, &mut output)
        .map_err(|_| AuthError::InvalidState)?;
    Ok(output)
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; 32], AuthError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| AuthError::InvalidState)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

fn xor_bytes(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let mut result = [0u8; 32];
    for (out, (x, y)) in result.iter_mut().zip(a.iter().zip(b)) {
        *out = x ^ y;
    }
    result
}
