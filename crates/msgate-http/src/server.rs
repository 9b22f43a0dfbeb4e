//! HTTP/1.1 server for the send API
//!
//! Accept loop on a `TcpListener`, one spawned task per connection, stopped
//! through a `CancellationToken`. In-flight connections finish on their own
//! after shutdown. Failed `accept()` calls are logged and retried.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::gateway::Gateway;

/// Listening HTTP server backed by a [`Gateway`]
pub struct HttpServer {
    gateway: Arc<Gateway>,
    listener: TcpListener,
    addr: SocketAddr,
}

impl HttpServer {
    /// Binds the listening socket
    ///
    /// # Arguments
    /// * `gateway` - Request handler shared by all connections
    /// * `bind` - Address to bind, e.g. `"127.0.0.1:8080"`; port 0 picks a free port
    pub async fn bind(gateway: Arc<Gateway>, bind: &str) -> anyhow::Result<Self> {
        let addr: SocketAddr = bind.parse()?;
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        Ok(Self {
            gateway,
            listener,
            addr,
        })
    }

    /// Address actually bound
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serves connections until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        info!(
            addr = %self.addr,
            messages_path = self.gateway.messages_path(),
            "HTTP server listening"
        );

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    let (stream, peer) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            let backoff = accept_backoff(&e);
                            warn!(error = %e, backoff_ms = backoff.as_millis() as u64, "Failed to accept connection");
                            tokio::time::sleep(backoff).await;
                            continue;
                        }
                    };
                    let io = TokioIo::new(stream);
                    let gateway = Arc::clone(&self.gateway);

                    tokio::spawn(async move {
                        let service = service_fn(move |req| {
                            let gateway = Arc::clone(&gateway);
                            async move { Ok::<_, hyper::Error>(gateway.handle(req).await) }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            debug!(peer = %peer, error = %e, "HTTP connection closed with error");
                        }
                    });
                }
                _ = shutdown.cancelled() => {
                    info!("HTTP server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Pause before the next `accept()` after `e`
///
/// Errors tied to a single peer are retried at once. Anything else, such as
/// running out of file descriptors, waits so the loop does not spin.
fn accept_backoff(e: &io::Error) -> Duration {
    match e.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::Interrupted
        | io::ErrorKind::WouldBlock => Duration::ZERO,
        _ => Duration::from_millis(100),
    }
}
