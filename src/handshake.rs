//! Server side of the five step handshake.
//!
//! ```text
//! 1. server -> client   root certificate
//! 2. client -> server   "ok"                      (read buffer of 5 bytes)
//! 3. server -> client   leaf certificate
//! 4. client -> server   RSA encrypted session key (at most 1024 bytes)
//! 5. server -> client   "ok"
//! ```
//!
//! Each step is exactly one transport read or write, each bounded by its own
//! deadline. The step 5 acknowledgement is sent whether or not the key blob
//! decrypted to anything meaningful.

use std::sync::Arc;

use log::{debug, error};

use crate::async_stream::AsyncStream;
use crate::bundle::CertificateBundle;
use crate::crypto::{MAX_KEY_BLOB_LEN, SessionKey, decrypt_session_key};
use crate::error::HandshakeError;
use crate::util::{DeadlineError, Timeouts, read_with_deadline, unexpected_eof, write_with_deadline};

pub const ACK_TOKEN: &[u8; 2] = b"ok";

const ACK_READ_BUFFER_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    RootSent,
    RootAcked,
    LeafSent,
    KeyReceived,
    Established,
    Failed,
}

/// Drives the handshake for one connection.
pub struct HandshakeCoordinator {
    bundle: Arc<CertificateBundle>,
    timeouts: Timeouts,
    state: SessionState,
}

impl HandshakeCoordinator {
    pub fn new(bundle: Arc<CertificateBundle>, timeouts: Timeouts) -> Self {
        Self {
            bundle,
            timeouts,
            state: SessionState::Init,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs all five steps. On error the coordinator is left in
    /// [`SessionState::Failed`] and nothing more has been written.
    pub async fn run<S>(&mut self, stream: &mut S) -> Result<SessionKey, HandshakeError>
    where
        S: AsyncStream + ?Sized,
    {
        debug_assert_eq!(self.state, SessionState::Init);

        match self.run_steps(stream).await {
            Ok(key) => Ok(key),
            Err(e) => {
                debug!("handshake failed in state {:?}: {e}", self.state);
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    async fn run_steps<S>(&mut self, stream: &mut S) -> Result<SessionKey, HandshakeError>
    where
        S: AsyncStream + ?Sized,
    {
        self.send(stream, self.bundle.root_certificate()).await?;
        self.transition(SessionState::RootSent);

        self.receive_ack(stream).await?;
        self.transition(SessionState::RootAcked);

        self.send(stream, self.bundle.leaf_certificate()).await?;
        self.transition(SessionState::LeafSent);

        let blob = self.receive_key_blob(stream).await?;
        self.transition(SessionState::KeyReceived);

        let key = self.decrypt_key_blob(blob).await;
        self.send(stream, ACK_TOKEN).await?;
        self.transition(SessionState::Established);

        Ok(key)
    }

    // Runs on the blocking pool; the private key operation is CPU bound.
    async fn decrypt_key_blob(&self, blob: Vec<u8>) -> SessionKey {
        let bundle = self.bundle.clone();
        let task =
            tokio::task::spawn_blocking(move || decrypt_session_key(&blob, bundle.private_key()));
        match task.await {
            Ok(key) => key,
            Err(e) => {
                error!("session key decryption task failed: {e}");
                SessionKey::random()
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!("handshake {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    async fn send<S>(&self, stream: &mut S, data: &[u8]) -> Result<(), HandshakeError>
    where
        S: AsyncStream + ?Sized,
    {
        write_with_deadline(stream, data, self.timeouts.write)
            .await
            .map_err(|e| match e {
                DeadlineError::Elapsed => HandshakeError::Timeout,
                DeadlineError::Io(e) => HandshakeError::Disconnected(e),
            })
    }

    // Exactly "ok", nothing more and nothing less. A short read or an I/O
    // error is an ack mismatch as well; only the deadline is reported apart.
    async fn receive_ack<S>(&self, stream: &mut S) -> Result<(), HandshakeError>
    where
        S: AsyncStream + ?Sized,
    {
        let mut buf = [0u8; ACK_READ_BUFFER_LEN];
        match read_with_deadline(stream, &mut buf, self.timeouts.read).await {
            Ok(n) if &buf[..n] == ACK_TOKEN => Ok(()),
            Ok(_) | Err(DeadlineError::Io(_)) => Err(HandshakeError::AckMismatch),
            Err(DeadlineError::Elapsed) => Err(HandshakeError::Timeout),
        }
    }

    async fn receive_key_blob<S>(&self, stream: &mut S) -> Result<Vec<u8>, HandshakeError>
    where
        S: AsyncStream + ?Sized,
    {
        // One spare byte tells an oversized blob apart from a maximal one.
        let mut buf = vec![0u8; MAX_KEY_BLOB_LEN + 1];
        let n = read_with_deadline(stream, &mut buf, self.timeouts.read)
            .await
            .map_err(|e| match e {
                DeadlineError::Elapsed => HandshakeError::Timeout,
                DeadlineError::Io(e) => HandshakeError::Disconnected(e),
            })?;

        if n == 0 {
            return Err(HandshakeError::Disconnected(unexpected_eof(
                "waiting for the session key",
            )));
        }
        if n > MAX_KEY_BLOB_LEN {
            return Err(HandshakeError::KeyBlobTooLarge);
        }

        buf.truncate(n);
        Ok(buf)
    }
}
