use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

/// Outcome of a deadline-bounded transport operation that did not succeed.
#[derive(Debug)]
pub enum DeadlineError {
    Elapsed,
    Io(std::io::Error),
}

/// Deadlines applied to every individual read and write on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub read: Duration,
    pub write: Duration,
}

impl Timeouts {
    pub const DEFAULT_SECS: u64 = 10;
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            read: Duration::from_secs(Self::DEFAULT_SECS),
            write: Duration::from_secs(Self::DEFAULT_SECS),
        }
    }
}

/// One read call, bounded by `deadline`. Returns the number of bytes read,
/// zero meaning the peer closed its side.
pub async fn read_with_deadline<S>(
    stream: &mut S,
    buf: &mut [u8],
    deadline: Duration,
) -> Result<usize, DeadlineError>
where
    S: AsyncRead + Unpin + ?Sized,
{
    match timeout(deadline, stream.read(buf)).await {
        Ok(Ok(n)) => Ok(n),
        Ok(Err(e)) => Err(DeadlineError::Io(e)),
        Err(_elapsed) => Err(DeadlineError::Elapsed),
    }
}

/// Writes and flushes all of `data`, bounded by `deadline`.
pub async fn write_with_deadline<S>(
    stream: &mut S,
    data: &[u8],
    deadline: Duration,
) -> Result<(), DeadlineError>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    let write_future = async {
        stream.write_all(data).await?;
        stream.flush().await
    };
    match timeout(deadline, write_future).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(DeadlineError::Io(e)),
        Err(_elapsed) => Err(DeadlineError::Elapsed),
    }
}

pub fn unexpected_eof(what: &str) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        format!("connection closed while {what}"),
    )
}
