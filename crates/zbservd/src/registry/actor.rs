//! Registry actor - owns the subscriber set and processes commands.

use std::collections::BTreeMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use zbserv_core::LifecycleEvent;

use super::commands::{RegistryCommand, SubscriptionId};
use super::delivery::Delivery;
use super::handle::Subscription;

/// Capacity of each subscription's mailbox.
pub const MAILBOX_CAPACITY: usize = 1;

/// The registry actor - single owner of the subscriber set.
///
/// Commands are processed sequentially and none of them waits on a
/// consumer. A broadcast only snapshots the current mailboxes and queues
/// the snapshot for the delivery task, so a subscriber registered after
/// that point does not see the event and never waits for it either.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Queue feeding the delivery task
    deliveries: mpsc::UnboundedSender<Delivery>,

    /// Active mailboxes, keyed by subscription id (ordered for stable fan-out)
    subscribers: BTreeMap<SubscriptionId, mpsc::Sender<LifecycleEvent>>,

    /// Next subscription id to hand out
    next_id: u64,
}

impl RegistryActor {
    pub fn new(
        receiver: mpsc::Receiver<RegistryCommand>,
        deliveries: mpsc::UnboundedSender<Delivery>,
    ) -> Self {
        Self {
            receiver,
            deliveries,
            subscribers: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Runs the actor event loop until all handles are dropped.
    pub async fn run(mut self) {
        info!("Subscriber registry starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(
            subscribers = self.subscribers.len(),
            "Subscriber registry stopped"
        );
    }

    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Register { respond_to } => {
                let subscription = self.handle_register();
                let id = subscription.id();
                if respond_to.send(subscription).is_err() {
                    // Caller went away before receiving it.
                    self.subscribers.remove(&id);
                }
            }
            RegistryCommand::Unregister { id } => {
                self.handle_unregister(id);
            }
            RegistryCommand::Broadcast { event, respond_to } => {
                self.handle_broadcast(event, respond_to);
            }
            RegistryCommand::SubscriberCount { respond_to } => {
                let _ = respond_to.send(self.subscribers.len());
            }
        }
    }

    fn handle_register(&mut self) -> Subscription {
        let id = SubscriptionId::new(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);

        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        self.subscribers.insert(id, tx);

        debug!(
            subscription = %id,
            total = self.subscribers.len(),
            "Subscription registered"
        );
        Subscription::new(id, rx)
    }

    fn handle_unregister(&mut self, id: SubscriptionId) {
        if self.subscribers.remove(&id).is_some() {
            debug!(
                subscription = %id,
                total = self.subscribers.len(),
                "Subscription unregistered"
            );
        }
    }

    /// Queues `event` for every open mailbox.
    ///
    /// Mailboxes whose subscription was dropped are pruned first.
    fn handle_broadcast(&mut self, event: LifecycleEvent, respond_to: oneshot::Sender<usize>) {
        self.subscribers.retain(|id, mailbox| {
            let open = !mailbox.is_closed();
            if !open {
                debug!(subscription = %id, "Pruned closed subscription");
            }
            open
        });

        let targets = self
            .subscribers
            .iter()
            .map(|(id, mailbox)| (*id, mailbox.clone()))
            .collect();
        let delivery = Delivery {
            event,
            targets,
            respond_to,
        };
        // Dropping the rejected delivery closes `respond_to` for the caller.
        if self.deliveries.send(delivery).is_err() {
            warn!("Broadcast delivery task is gone");
        }
    }
}
