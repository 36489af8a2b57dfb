//! Error taxonomy.
//!
//! Startup failures are fatal for the process. Everything else is scoped to a
//! single connection: the listener logs it, drops the connection and keeps
//! serving.

use std::path::PathBuf;

use thiserror::Error;

use crate::crypto::{MAX_KEY_BLOB_LEN, RECORD_IV_LEN};

/// Configuration or key material could not be loaded. Terminates the process
/// before any connection is accepted.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config file {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("could not parse RSA private key: {0}")]
    InvalidPrivateKey(String),

    #[error("could not parse certificate: {0}")]
    InvalidCertificate(String),

    #[error("RSA modulus of {0} bytes is outside the supported range")]
    UnsupportedKeySize(usize),

    #[error("leaf certificate public key does not match the private key")]
    CertificateKeyMismatch,

    #[error("could not bind {address}: {source}")]
    Bind {
        address: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Handshake failure for one connection.
///
/// There is deliberately no variant for a session key blob that fails to
/// decrypt: that case yields a random key and the handshake carries on.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("peer did not acknowledge the root certificate with \"ok\"")]
    AckMismatch,

    #[error("session key blob is larger than {max} bytes", max = MAX_KEY_BLOB_LEN)]
    KeyBlobTooLarge,

    #[error("handshake step deadline expired")]
    Timeout,

    #[error("peer disconnected during handshake: {0}")]
    Disconnected(#[source] std::io::Error),
}

/// Failure while reading, decoding or writing one Record.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record of {0} bytes is shorter than the {iv} byte IV", iv = RECORD_IV_LEN)]
    TooShort(usize),

    #[error("record deadline expired")]
    Timeout,

    #[error("peer disconnected: {0}")]
    Disconnected(#[source] std::io::Error),
}

/// Opaque failure from an application callback.
#[derive(Debug, Error)]
#[error("application handler failed: {0}")]
pub struct ApplicationError(#[source] Box<dyn std::error::Error + Send + Sync>);

impl ApplicationError {
    pub fn new<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self(error.into())
    }
}

/// Everything that can end a connection worker early.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("record exchange failed: {0}")]
    Record(#[from] RecordError),

    #[error(transparent)]
    Application(#[from] ApplicationError),
}

/// Client-side failures when talking to a server.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("server did not send a certificate")]
    MissingCertificate,

    #[error("server did not acknowledge the session key")]
    KeyNotAcknowledged,

    #[error("could not use the leaf certificate: {0}")]
    InvalidCertificate(String),

    #[error("could not encrypt the session key: {0}")]
    Encryption(#[from] rsa::Error),

    #[error("deadline expired")]
    Timeout,

    #[error("connection failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Record(#[from] RecordError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_include_limits() {
        assert_eq!(
            RecordError::TooShort(3).to_string(),
            "record of 3 bytes is shorter than the 16 byte IV"
        );
        assert_eq!(
            HandshakeError::KeyBlobTooLarge.to_string(),
            "session key blob is larger than 1024 bytes"
        );
    }
}
