//! Owns one accepted connection from the handshake to close.

use std::sync::Arc;

use log::debug;
use tokio::io::AsyncWriteExt;

use crate::app_handler::ApplicationHandler;
use crate::async_stream::AsyncStream;
use crate::bundle::CertificateBundle;
use crate::config::ExchangeMode;
use crate::crypto::{SessionKey, decrypt_record, encrypt_record};
use crate::error::{RecordError, WorkerError};
use crate::handshake::HandshakeCoordinator;
use crate::util::{DeadlineError, Timeouts, read_with_deadline, unexpected_eof, write_with_deadline};

pub const DEFAULT_RECORD_BUFFER_SIZE: usize = 8192;

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub timeouts: Timeouts,
    pub exchange_mode: ExchangeMode,
    pub record_buffer_size: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            timeouts: Timeouts::default(),
            exchange_mode: ExchangeMode::Single,
            record_buffer_size: DEFAULT_RECORD_BUFFER_SIZE,
        }
    }
}

/// Shared by every connection; each call to [`ConnectionWorker::run`]
/// serves one connection.
///
/// A worker built without a certificate bundle speaks the plaintext variant:
/// no handshake, and messages go to the handler exactly as read.
#[derive(Debug, Clone)]
pub struct ConnectionWorker {
    bundle: Option<Arc<CertificateBundle>>,
    handler: Arc<dyn ApplicationHandler>,
    settings: WorkerSettings,
}

impl ConnectionWorker {
    pub fn new(
        bundle: Arc<CertificateBundle>,
        handler: Arc<dyn ApplicationHandler>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            bundle: Some(bundle),
            handler,
            settings,
        }
    }

    pub fn new_plain(handler: Arc<dyn ApplicationHandler>, settings: WorkerSettings) -> Self {
        Self {
            bundle: None,
            handler,
            settings,
        }
    }

    /// Serves one connection and returns the number of completed message
    /// exchanges. The stream is owned here and dropped, closing it, on every
    /// return path.
    pub async fn run<S>(&self, mut stream: S) -> Result<usize, WorkerError>
    where
        S: AsyncStream,
    {
        let result = self.serve(&mut stream).await;
        if result.is_ok() {
            let _ = stream.shutdown().await;
        }
        result
    }

    async fn serve<S>(&self, stream: &mut S) -> Result<usize, WorkerError>
    where
        S: AsyncStream,
    {
        let key = match &self.bundle {
            Some(bundle) => {
                let key = HandshakeCoordinator::new(bundle.clone(), self.settings.timeouts)
                    .run(stream)
                    .await?;
                debug!("handshake established");
                Some(key)
            }
            None => None,
        };

        let mut exchanges = 0usize;
        loop {
            let Some(message) = self.read_message(stream).await? else {
                // Only an orderly close between messages ends a continuous
                // session successfully.
                if self.settings.exchange_mode == ExchangeMode::Continuous && exchanges > 0 {
                    debug!("peer closed after {exchanges} exchanges");
                    return Ok(exchanges);
                }
                return Err(RecordError::Disconnected(unexpected_eof("waiting for a record")).into());
            };

            self.exchange(stream, key.as_ref(), &message).await?;
            exchanges += 1;

            if self.settings.exchange_mode == ExchangeMode::Single {
                return Ok(exchanges);
            }
        }
    }

    async fn exchange<S>(
        &self,
        stream: &mut S,
        key: Option<&SessionKey>,
        message: &[u8],
    ) -> Result<(), WorkerError>
    where
        S: AsyncStream,
    {
        let response = match key {
            Some(key) => {
                let plaintext = decrypt_record(key, message)?;
                let response = self.handler.handle_message(&plaintext).await?;
                encrypt_record(key, &response)
            }
            None => self.handler.handle_message(message).await?,
        };

        write_with_deadline(stream, &response, self.settings.timeouts.write)
            .await
            .map_err(record_error)?;
        Ok(())
    }

    /// One transport read. `None` means the peer closed its side cleanly.
    async fn read_message<S>(&self, stream: &mut S) -> Result<Option<Vec<u8>>, RecordError>
    where
        S: AsyncStream,
    {
        let mut buf = vec![0u8; self.settings.record_buffer_size];
        let n = read_with_deadline(stream, &mut buf, self.settings.timeouts.read)
            .await
            .map_err(record_error)?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(buf))
    }
}

fn record_error(e: DeadlineError) -> RecordError {
    match e {
        DeadlineError::Elapsed => RecordError::Timeout,
        DeadlineError::Io(e) => RecordError::Disconnected(e),
    }
}
