//! The gossip RPC listener.
//!
//! Plain TCP with newline-delimited JSON frames. Each accepted connection
//! gets its own task; a semaphore bounds how many requests are handled at
//! once (concurrent rounds and multiple inbound edges can all arrive
//! together). A connection may carry several request lines; the distributor
//! reuses one connection per push.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Semaphore, mpsc};
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info, warn};

use flood_proto::{Request, Response};

use crate::error::{NodeError, Result};
use crate::handler::GossipHandler;

/// Handle for requesting server shutdown.
pub type ShutdownSender = mpsc::Sender<()>;

/// The long-running gossip service for one instance.
pub struct GossipServer {
    handler: Arc<GossipHandler>,
    limiter: Arc<Semaphore>,
    shutdown_tx: Option<ShutdownSender>,
}

impl GossipServer {
    /// Wrap a handler with an inbound concurrency bound.
    #[must_use]
    pub fn new(handler: Arc<GossipHandler>, max_inflight: usize) -> Self {
        Self {
            handler,
            limiter: Arc::new(Semaphore::new(max_inflight.max(1))),
            shutdown_tx: None,
        }
    }

    /// A sender that stops the accept loop when signalled. Available once
    /// [`serve`](Self::serve) has started.
    #[must_use]
    pub fn shutdown_handle(&self) -> Option<ShutdownSender> {
        self.shutdown_tx.clone()
    }

    /// Bind the configured listen address.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::Bind`] if the address is unavailable.
    pub async fn bind(addr: std::net::SocketAddr) -> Result<TcpListener> {
        TcpListener::bind(addr)
            .await
            .map_err(|e| NodeError::Bind(addr, e))
    }

    /// Accept connections until shut down.
    ///
    /// # Errors
    ///
    /// Currently only fails on listener-level I/O errors surfaced by accept;
    /// per-connection failures are logged and absorbed.
    pub async fn serve(&mut self, listener: TcpListener) -> Result<()> {
        let local = listener.local_addr()?;
        info!(addr = %local, advertised = %self.handler.advertised_addr(), "gossip node listening");

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        self.shutdown_tx = Some(shutdown_tx);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            debug!(peer = %peer, "accepted connection");
                            let handler = self.handler.clone();
                            let limiter = self.limiter.clone();
                            tokio::spawn(async move {
                                handle_connection(stream, handler, limiter).await;
                            });
                        }
                        Err(e) => {
                            warn!(error = %e, "failed to accept connection");
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }
}

async fn handle_connection(
    stream: TcpStream,
    handler: Arc<GossipHandler>,
    limiter: Arc<Semaphore>,
) {
    let mut framed = Framed::new(stream, LinesCodec::new());

    while let Some(next) = framed.next().await {
        let line = match next {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "dropping connection on framing error");
                return;
            }
        };

        let response = match Request::from_json(&line) {
            Ok(request) => {
                // Bounded worker pool: hold a permit for the whole handling
                // of this request, including fan-out.
                let Ok(permit) = limiter.acquire().await else {
                    return;
                };
                let response = handler.handle(request).await;
                drop(permit);
                response
            }
            Err(e) => {
                warn!(error = %e, "malformed request frame");
                Response::Error {
                    details: e.to_string(),
                }
            }
        };

        let encoded = match response.to_json() {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(error = %e, "failed to encode response");
                return;
            }
        };
        if let Err(e) = framed.send(encoded).await {
            debug!(error = %e, "peer went away before response was sent");
            return;
        }
    }
}
