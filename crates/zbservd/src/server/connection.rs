//! Per-client session: seeds countdowns, relays updates, reacts to game exits.
//!
//! Each client connection gets its own `ConnectionHandler` that:
//! - Subscribes to scheduler updates before anything is published
//! - Starts every configured domain once to seed the overlay
//! - Registers with the lifecycle registry and restarts a domain whenever
//!   its game process stops
//! - Forwards inbound text commands to the playback-control collaborator

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zbserv_core::LifecycleEvent;
use zbserv_protocol::{ControlCommand, ResourceUpdate};

use crate::control::PlaybackControl;
use crate::registry::{RegistryError, RegistryHandle, Subscription};
use crate::scheduler::{CountdownScheduler, StartOutcome};

/// Connection handler for a single overlay client.
pub struct ConnectionHandler {
    client_id: String,
    scheduler: CountdownScheduler,
    registry: RegistryHandle,
    updates: broadcast::Receiver<ResourceUpdate>,
    control: Arc<dyn PlaybackControl>,
    cancel_token: CancellationToken,
}

impl ConnectionHandler {
    /// `updates` must already be subscribed so the seed snapshots reach it.
    pub fn new(
        client_id: impl Into<String>,
        scheduler: CountdownScheduler,
        registry: RegistryHandle,
        updates: broadcast::Receiver<ResourceUpdate>,
        control: Arc<dyn PlaybackControl>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            scheduler,
            registry,
            updates,
            control,
            cancel_token,
        }
    }

    /// Serves the connection until the client leaves or shutdown is requested.
    pub async fn run<S>(mut self, ws_stream: WebSocketStream<S>)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        info!(client_id = %self.client_id, "Client connected");

        self.seed().await;

        let mut subscription = match self.registry.register().await {
            Ok(subscription) => Some(subscription),
            Err(e) => {
                warn!(client_id = %self.client_id, error = %e, "Lifecycle events unavailable");
                None
            }
        };

        let result = self.serve(ws_stream, subscription.as_mut()).await;

        if let Some(subscription) = subscription.as_mut() {
            self.registry.unregister(subscription).await;
        }

        match result {
            Ok(()) => info!(client_id = %self.client_id, "Client disconnected"),
            Err(e) => info!(client_id = %self.client_id, error = %e, "Client disconnected with error"),
        }
    }

    /// Starts every configured domain once. Failures are logged and skipped.
    async fn seed(&self) {
        for domain in self.scheduler.domains() {
            match self.scheduler.start(domain).await {
                Ok(outcome) => {
                    debug!(client_id = %self.client_id, domain = %domain, ?outcome, "Seeded domain");
                }
                Err(e) => {
                    warn!(client_id = %self.client_id, domain = %domain, error = %e, "Failed to seed domain");
                }
            }
        }
    }

    async fn serve<S>(
        &mut self,
        ws_stream: WebSocketStream<S>,
        mut subscription: Option<&mut Subscription>,
    ) -> Result<(), ConnectionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (mut ws_tx, mut ws_rx) = ws_stream.split();

        loop {
            let lifecycle = async {
                match subscription.as_deref_mut() {
                    Some(subscription) => subscription.recv().await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    return Ok(());
                }

                event = lifecycle => {
                    match event {
                        Some(event) => self.on_lifecycle(event),
                        None => {
                            debug!(client_id = %self.client_id, "Lifecycle subscription closed");
                            subscription = None;
                        }
                    }
                }

                update = self.updates.recv() => {
                    match update {
                        Ok(update) => {
                            ws_tx.send(Message::Text(update.to_json()?)).await?;
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(client_id = %self.client_id, skipped, "Client lagging behind updates");
                        }
                        Err(RecvError::Closed) => return Ok(()),
                    }
                }

                msg = ws_rx.next() => {
                    let msg = match msg {
                        Some(Ok(msg)) => msg,
                        Some(Err(e)) => return Err(e.into()),
                        None => return Ok(()),
                    };

                    match msg {
                        Message::Text(text) => self.on_command(&text),
                        Message::Ping(data) => ws_tx.send(Message::Pong(data)).await?,
                        Message::Close(_) => return Ok(()),
                        Message::Binary(_) | Message::Pong(_) | Message::Frame(_) => {}
                    }
                }
            }
        }
    }

    /// Restarts the countdown for a tracked game that just exited.
    ///
    /// The restart runs in its own task so the mailbox keeps draining while
    /// the fetch is in flight.
    fn on_lifecycle(&self, event: LifecycleEvent) {
        if !event.is_stopped() {
            debug!(client_id = %self.client_id, process = %event.process_name, "Game started");
            return;
        }

        let Some(domain) = self.scheduler.domain_for_process(&event.process_name) else {
            return;
        };

        info!(client_id = %self.client_id, domain = %domain, pid = event.pid, "Game exited, refreshing");
        let scheduler = self.scheduler.clone();
        let client_id = self.client_id.clone();
        tokio::spawn(async move {
            match scheduler.start(domain).await {
                Ok(StartOutcome::Discarded) => {
                    debug!(client_id = %client_id, domain = %domain, "Refresh superseded");
                }
                Ok(outcome) => {
                    debug!(client_id = %client_id, domain = %domain, ?outcome, "Refresh complete");
                }
                Err(e) => {
                    warn!(client_id = %client_id, domain = %domain, error = %e, "Refresh failed");
                }
            }
        });
    }

    fn on_command(&self, text: &str) {
        match ControlCommand::parse(text) {
            Some(command) => self.control.dispatch(&command),
            None => debug!(client_id = %self.client_id, len = text.len(), "Ignoring blank command frame"),
        }
    }
}

/// Errors that end a client connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("Failed to encode update: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}
