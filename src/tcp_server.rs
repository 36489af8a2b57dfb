use std::net::SocketAddr;

use log::{debug, error, info};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::connection_worker::ConnectionWorker;
use crate::error::StartupError;

async fn run_tcp_server(listener: TcpListener, worker: ConnectionWorker) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(v) => v,
            Err(e) => {
                error!("Accept failed: {e:?}");
                continue;
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            error!("Failed to set TCP nodelay: {e}");
        }

        let worker = worker.clone();
        tokio::spawn(async move {
            match worker.run(stream).await {
                Ok(exchanges) => debug!(
                    "{}:{} finished successfully after {exchanges} exchanges",
                    addr.ip(),
                    addr.port()
                ),
                Err(e) => error!("{}:{} finished with error: {:?}", addr.ip(), addr.port(), e),
            }
        });
    }
}

/// Binds `bind_address` and serves every accepted connection on its own task.
///
/// Returns the bound address, which differs from `bind_address` when port 0
/// was requested, and the handle of the accept loop.
pub async fn start_tcp_server(
    bind_address: SocketAddr,
    worker: ConnectionWorker,
) -> Result<(SocketAddr, JoinHandle<()>), StartupError> {
    let bind_error = |source: std::io::Error| StartupError::Bind {
        address: bind_address,
        source,
    };
    let listener = TcpListener::bind(bind_address).await.map_err(bind_error)?;
    let local_addr = listener.local_addr().map_err(bind_error)?;
    info!("Listening on {local_addr}");

    Ok((local_addr, tokio::spawn(run_tcp_server(listener, worker))))
}
