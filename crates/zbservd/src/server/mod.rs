//! WebSocket server for overlay clients.
//!
//! ```text
//! ┌─────────────────┐
//! │  DaemonServer   │
//! │  TcpListener    │
//! └───────┬─────────┘
//!         │ accept() + upgrade on /ws
//!         ▼
//! ┌─────────────────┐     ┌────────────────────┐
//! │ConnectionHandler│────▶│ CountdownScheduler │──┐
//! │   (per client)  │     └────────────────────┘  │ updates
//! │                 │◀────── RegistryHandle       │ (broadcast)
//! │                 │◀────────────────────────────┘
//! └─────────────────┘
//! ```
//!
//! The countdowns are shared between clients. Closing a connection only
//! drops that client's registry subscription and update receiver.

mod connection;

pub use connection::{ConnectionError, ConnectionHandler};

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{broadcast, Semaphore};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use zbserv_protocol::ResourceUpdate;

use crate::control::PlaybackControl;
use crate::registry::RegistryHandle;
use crate::scheduler::CountdownScheduler;

/// Default listen address of the overlay endpoint.
pub const DEFAULT_ADDR: &str = "127.0.0.1:45456";

/// Only path that is upgraded to a WebSocket.
pub const WS_PATH: &str = "/ws";

/// Maximum number of concurrent overlay clients.
pub const MAX_CLIENTS: usize = 16;

/// Capacity of the scheduler update fan-out.
pub const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Accepts overlay connections and hands each to a [`ConnectionHandler`].
pub struct DaemonServer {
    addr: String,
    scheduler: CountdownScheduler,
    registry: RegistryHandle,
    updates: broadcast::Sender<ResourceUpdate>,
    control: Arc<dyn PlaybackControl>,
    cancel_token: CancellationToken,
    connection_counter: AtomicU64,
}

impl DaemonServer {
    /// `updates` must be the sender the scheduler publishes into.
    pub fn new(
        addr: impl Into<String>,
        scheduler: CountdownScheduler,
        registry: RegistryHandle,
        updates: broadcast::Sender<ResourceUpdate>,
        control: Arc<dyn PlaybackControl>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            addr: addr.into(),
            scheduler,
            registry,
            updates,
            control,
            cancel_token,
            connection_counter: AtomicU64::new(0),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Binds and serves until the cancellation token fires.
    pub async fn run(&self) -> Result<(), ServerError> {
        let (listener, _) = self.bind().await?;
        self.serve(listener).await;
        Ok(())
    }

    /// Binds the listener and returns it with the resolved local address.
    pub async fn bind(&self) -> Result<(TcpListener, SocketAddr), ServerError> {
        let bind_err = |e: io::Error| ServerError::Bind {
            addr: self.addr.clone(),
            error: e.to_string(),
        };

        let listener = TcpListener::bind(&self.addr).await.map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;

        info!(addr = %local_addr, path = WS_PATH, max_clients = MAX_CLIENTS, "Overlay server listening");
        Ok((listener, local_addr))
    }

    /// Accept loop on a pre-bound listener.
    pub async fn serve(&self, listener: TcpListener) {
        let semaphore = Arc::new(Semaphore::new(MAX_CLIENTS));

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let Ok(permit) = Arc::clone(&semaphore).try_acquire_owned() else {
                                warn!(peer = %peer, max = MAX_CLIENTS, "Client limit reached, dropping connection");
                                drop(stream);
                                continue;
                            };
                            let conn_num = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            debug!(peer = %peer, conn_num, "TCP connection accepted");

                            let handler = ConnectionHandler::new(
                                format!("client-{conn_num}"),
                                self.scheduler.clone(),
                                self.registry.clone(),
                                self.updates.subscribe(),
                                Arc::clone(&self.control),
                                self.cancel_token.child_token(),
                            );

                            tokio::spawn(async move {
                                let _permit = permit;
                                match tokio_tungstenite::accept_hdr_async(stream, check_path).await {
                                    Ok(ws_stream) => handler.run(ws_stream).await,
                                    Err(e) => debug!(peer = %peer, error = %e, "WebSocket handshake failed"),
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }

        info!("Overlay server stopped");
    }
}

/// Upgrades only requests for [`WS_PATH`]; everything else gets a 404.
fn check_path(request: &Request, response: Response) -> Result<Response, ErrorResponse> {
    if request.uri().path() == WS_PATH {
        return Ok(response);
    }

    debug!(path = request.uri().path(), "Rejecting upgrade on unknown path");
    let mut not_found = ErrorResponse::new(Some("Not Found".to_string()));
    *not_found.status_mut() = StatusCode::NOT_FOUND;
    Err(not_found)
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: String, error: String },
}
