//! Broadcast delivery task - hands events to subscriber mailboxes.
//!
//! The actor snapshots the active mailboxes for each broadcast and queues
//! the snapshot here. Deliveries run one at a time in queue order, so every
//! subscriber sees events in broadcast order, while the actor stays free to
//! register and unregister while a delivery waits on a full mailbox.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};
use zbserv_core::LifecycleEvent;

use super::commands::SubscriptionId;

/// One broadcast, bound to the mailboxes active when it was accepted.
#[derive(Debug)]
pub struct Delivery {
    pub(super) event: LifecycleEvent,
    pub(super) targets: Vec<(SubscriptionId, mpsc::Sender<LifecycleEvent>)>,
    pub(super) respond_to: oneshot::Sender<usize>,
}

impl Delivery {
    /// Hands the event to every target, waiting on full mailboxes.
    ///
    /// Closed mailboxes are skipped. Returns the number that accepted it.
    async fn deliver(&self) -> usize {
        let mut delivered = 0;
        for (id, mailbox) in &self.targets {
            match mailbox.send(self.event.clone()).await {
                Ok(()) => delivered += 1,
                Err(_) => debug!(subscription = %id, "Skipped closed subscription"),
            }
        }

        debug!(
            process = %self.event.process_name,
            kind = %self.event.kind,
            delivered,
            "Lifecycle event broadcast"
        );
        delivered
    }
}

/// Runs deliveries in order until the actor drops its queue sender.
pub async fn run_deliveries(mut receiver: mpsc::UnboundedReceiver<Delivery>) {
    while let Some(delivery) = receiver.recv().await {
        let delivered = delivery.deliver().await;
        let _ = delivery.respond_to.send(delivered);
    }
    info!("Broadcast delivery stopped");
}
