//! Client half of the protocol, used by the `send` subcommand and by tests.
//!
//! The presented certificates are accepted as-is; the leaf certificate is
//! only used as the carrier of the server's RSA public key.

use log::debug;

use crate::async_stream::AsyncStream;
use crate::crypto::{SessionKey, decrypt_record, encrypt_record, encrypt_session_key, leaf_public_key};
use crate::error::{ClientError, RecordError};
use crate::handshake::ACK_TOKEN;
use crate::util::{DeadlineError, Timeouts, read_with_deadline, unexpected_eof, write_with_deadline};

const CERTIFICATE_READ_BUFFER_LEN: usize = 16384;
const RECORD_READ_BUFFER_LEN: usize = 65536;

/// An established session on the client side.
#[derive(Debug)]
pub struct ClientSession<S> {
    stream: S,
    key: SessionKey,
    timeouts: Timeouts,
    root_certificate: Vec<u8>,
    leaf_certificate: Vec<u8>,
}

/// Runs the client side of the handshake over `stream`.
pub async fn connect<S>(mut stream: S, timeouts: Timeouts) -> Result<ClientSession<S>, ClientError>
where
    S: AsyncStream,
{
    let root_certificate = read_certificate(&mut stream, timeouts).await?;
    write(&mut stream, ACK_TOKEN, timeouts).await?;

    let leaf_certificate = read_certificate(&mut stream, timeouts).await?;
    let public_key = leaf_public_key(&leaf_certificate)
        .map_err(|e| ClientError::InvalidCertificate(e.to_string()))?;

    let key = SessionKey::random();
    let blob = encrypt_session_key(&key, &public_key)?;
    write(&mut stream, &blob, timeouts).await?;

    let mut ack = [0u8; 5];
    let n = read(&mut stream, &mut ack, timeouts).await?;
    if &ack[..n] != ACK_TOKEN {
        return Err(ClientError::KeyNotAcknowledged);
    }
    debug!("client handshake complete");

    Ok(ClientSession {
        stream,
        key,
        timeouts,
        root_certificate,
        leaf_certificate,
    })
}

async fn read_certificate<S>(stream: &mut S, timeouts: Timeouts) -> Result<Vec<u8>, ClientError>
where
    S: AsyncStream,
{
    let mut buf = vec![0u8; CERTIFICATE_READ_BUFFER_LEN];
    let n = read(stream, &mut buf, timeouts).await?;
    if n == 0 {
        return Err(ClientError::MissingCertificate);
    }
    buf.truncate(n);
    Ok(buf)
}

async fn read<S>(stream: &mut S, buf: &mut [u8], timeouts: Timeouts) -> Result<usize, ClientError>
where
    S: AsyncStream,
{
    read_with_deadline(stream, buf, timeouts.read)
        .await
        .map_err(|e| match e {
            DeadlineError::Elapsed => ClientError::Timeout,
            DeadlineError::Io(e) => ClientError::Io(e),
        })
}

async fn write<S>(stream: &mut S, data: &[u8], timeouts: Timeouts) -> Result<(), ClientError>
where
    S: AsyncStream,
{
    write_with_deadline(stream, data, timeouts.write)
        .await
        .map_err(|e| match e {
            DeadlineError::Elapsed => ClientError::Timeout,
            DeadlineError::Io(e) => ClientError::Io(e),
        })
}

/// One request and one response with the plaintext variant of the server.
pub async fn exchange_plain<S>(
    stream: &mut S,
    message: &[u8],
    timeouts: Timeouts,
) -> Result<Vec<u8>, ClientError>
where
    S: AsyncStream,
{
    write(stream, message, timeouts).await?;
    let mut buf = vec![0u8; RECORD_READ_BUFFER_LEN];
    let n = read(stream, &mut buf, timeouts).await?;
    if n == 0 {
        return Err(ClientError::Io(unexpected_eof("waiting for a reply")));
    }
    buf.truncate(n);
    Ok(buf)
}

impl<S> ClientSession<S>
where
    S: AsyncStream,
{
    pub fn root_certificate(&self) -> &[u8] {
        &self.root_certificate
    }

    pub fn leaf_certificate(&self) -> &[u8] {
        &self.leaf_certificate
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Sends one message as one Record.
    pub async fn send_record(&mut self, message: &[u8]) -> Result<(), RecordError> {
        let record = encrypt_record(&self.key, message);
        self.send_raw(&record).await
    }

    /// Writes bytes as they are, bypassing the record layer.
    pub async fn send_raw(&mut self, data: &[u8]) -> Result<(), RecordError> {
        write_with_deadline(&mut self.stream, data, self.timeouts.write)
            .await
            .map_err(|e| match e {
                DeadlineError::Elapsed => RecordError::Timeout,
                DeadlineError::Io(e) => RecordError::Disconnected(e),
            })
    }

    /// Reads one Record and returns its plaintext.
    pub async fn receive_record(&mut self) -> Result<Vec<u8>, RecordError> {
        let mut buf = vec![0u8; RECORD_READ_BUFFER_LEN];
        let n = read_with_deadline(&mut self.stream, &mut buf, self.timeouts.read)
            .await
            .map_err(|e| match e {
                DeadlineError::Elapsed => RecordError::Timeout,
                DeadlineError::Io(e) => RecordError::Disconnected(e),
            })?;
        if n == 0 {
            return Err(RecordError::Disconnected(unexpected_eof(
                "waiting for a record",
            )));
        }
        decrypt_record(&self.key, &buf[..n])
    }

    /// Sends one message and waits for the reply.
    pub async fn exchange(&mut self, message: &[u8]) -> Result<Vec<u8>, RecordError> {
        self.send_record(message).await?;
        self.receive_record().await
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

    use super::*;
    use crate::bundle::test_fixtures::{LEAF_PEM, ROOT_PEM};

    #[tokio::test]
    async fn test_client_rejects_missing_ack() {
        let (client_stream, mut server) = duplex(16384);
        let client_task =
            tokio::spawn(async move { connect(client_stream, Timeouts::default()).await });

        server.write_all(ROOT_PEM.as_bytes()).await.unwrap();
        let mut buf = [0u8; 5];
        let n = server.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ok");

        server.write_all(LEAF_PEM.as_bytes()).await.unwrap();
        let mut blob = vec![0u8; 1024];
        let n = server.read(&mut blob).await.unwrap();
        assert_eq!(n, 256);

        server.write_all(b"no").await.unwrap();
        let result = client_task.await.unwrap();
        assert!(matches!(result, Err(ClientError::KeyNotAcknowledged)));
    }

    #[tokio::test]
    async fn test_client_rejects_non_certificate_leaf() {
        let (client_stream, mut server) = duplex(16384);
        let client_task =
            tokio::spawn(async move { connect(client_stream, Timeouts::default()).await });

        server.write_all(ROOT_PEM.as_bytes()).await.unwrap();
        let mut buf = [0u8; 5];
        server.read(&mut buf).await.unwrap();
        server.write_all(b"garbage").await.unwrap();

        let result = client_task.await.unwrap();
        assert!(matches!(result, Err(ClientError::InvalidCertificate(_))));
    }

    #[tokio::test]
    async fn test_client_reports_closed_server() {
        let (client_stream, server) = duplex(16384);
        drop(server);
        let result = connect(client_stream, Timeouts::default()).await;
        assert!(matches!(result, Err(ClientError::MissingCertificate)));
    }
}
