//! Start/stop watch loops feeding the subscriber registry.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use zbserv_core::{LifecycleEvent, LifecycleKind, ProcessFilter};

use super::source::ProcessEventSource;
use crate::registry::RegistryHandle;

/// Bound on how long a watch loop blocks before re-checking for shutdown.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(1);

/// Events buffered between the watch threads and the broadcaster.
const EVENT_BUFFER: usize = 16;

/// Watches tracked executables and broadcasts their lifecycle events.
pub struct LifecycleMonitor {
    source: Arc<dyn ProcessEventSource>,
    filter: ProcessFilter,
    registry: RegistryHandle,
    wait_timeout: Duration,
    cancel_token: CancellationToken,
}

impl LifecycleMonitor {
    pub fn new(
        source: Arc<dyn ProcessEventSource>,
        filter: ProcessFilter,
        registry: RegistryHandle,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            source,
            filter,
            registry,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            cancel_token,
        }
    }

    #[must_use]
    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    /// Requests both watch loops to exit. Safe to call more than once.
    pub fn stop(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Runs until [`stop`](Self::stop) is called.
    ///
    /// Events from both loops are broadcast in the order they reach the
    /// monitor; a broadcast completes before the next event is taken. A
    /// loop that fails to subscribe or whose stream ends is logged and
    /// retired without affecting the other.
    pub async fn run(&self) {
        info!(
            names = ?self.filter.names(),
            wait_timeout_ms = crate::saturating_millis(self.wait_timeout),
            "Lifecycle monitor starting"
        );

        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
        let mut watchers = Vec::with_capacity(2);
        for kind in [LifecycleKind::Started, LifecycleKind::Stopped] {
            match self.spawn_watcher(kind, tx.clone()) {
                Ok(handle) => watchers.push(handle),
                Err(e) => error!(kind = %kind, error = %e, "Failed to spawn watch thread"),
            }
        }
        drop(tx);

        loop {
            tokio::select! {
                biased;

                _ = self.cancel_token.cancelled() => break,

                maybe_event = rx.recv() => {
                    let Some(event) = maybe_event else {
                        warn!("All lifecycle watch loops have exited");
                        self.cancel_token.cancelled().await;
                        break;
                    };

                    tokio::select! {
                        _ = self.cancel_token.cancelled() => break,
                        result = self.registry.broadcast(event.clone()) => match result {
                            Ok(delivered) => debug!(
                                process = %event.process_name,
                                kind = %event.kind,
                                delivered,
                                "Lifecycle event dispatched"
                            ),
                            Err(e) => warn!(error = %e, "Failed to broadcast lifecycle event"),
                        },
                    }
                }
            }
        }

        // Unblocks any watcher parked in blocking_send.
        drop(rx);
        let joined = tokio::task::spawn_blocking(move || {
            for handle in watchers {
                let _ = handle.join();
            }
        })
        .await;
        if joined.is_err() {
            warn!("Failed to join lifecycle watch threads");
        }

        info!("Lifecycle monitor stopped");
    }

    fn spawn_watcher(
        &self,
        kind: LifecycleKind,
        tx: mpsc::Sender<LifecycleEvent>,
    ) -> std::io::Result<JoinHandle<()>> {
        let source = Arc::clone(&self.source);
        let filter = self.filter.clone();
        let cancel_token = self.cancel_token.clone();
        let wait_timeout = self.wait_timeout;

        std::thread::Builder::new()
            .name(format!("lifecycle-{kind}"))
            .spawn(move || {
                watch_loop(
                    source.as_ref(),
                    kind,
                    &filter,
                    wait_timeout,
                    &cancel_token,
                    &tx,
                )
            })
    }
}

/// Body of one watch thread.
fn watch_loop(
    source: &dyn ProcessEventSource,
    kind: LifecycleKind,
    filter: &ProcessFilter,
    wait_timeout: Duration,
    cancel_token: &CancellationToken,
    tx: &mpsc::Sender<LifecycleEvent>,
) {
    let mut subscription = match source.subscribe(kind, filter) {
        Ok(subscription) => subscription,
        Err(e) => {
            error!(kind = %kind, error = %e, "Failed to subscribe to process events");
            return;
        }
    };
    debug!(kind = %kind, "Watch loop started");

    while !cancel_token.is_cancelled() {
        match subscription.next_event(wait_timeout) {
            Ok(Some(raw)) => {
                let event = LifecycleEvent::from_raw(raw, kind);
                debug!(process = %event.process_name, pid = event.pid, kind = %kind, "Process event");
                if tx.blocking_send(event).is_err() {
                    break;
                }
            }
            Ok(None) => continue,
            Err(e) => {
                error!(kind = %kind, error = %e, "Process event stream failed");
                break;
            }
        }
    }

    debug!(kind = %kind, "Watch loop exited");
}
