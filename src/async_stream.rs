use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio::net::TcpStream;

#[cfg(target_family = "unix")]
use tokio::net::UnixStream;

/// A bidirectional byte stream a connection worker can own.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl AsyncStream for TcpStream {}

#[cfg(target_family = "unix")]
impl AsyncStream for UnixStream {}

impl AsyncStream for DuplexStream {}

impl<T: ?Sized + AsyncStream + Unpin> AsyncStream for Box<T> {}
impl<T: ?Sized + AsyncStream + Unpin> AsyncStream for &mut T {}
