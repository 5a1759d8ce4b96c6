//! Client interface for interacting with the RegistryActor.

use tokio::sync::{mpsc, oneshot};
use zbserv_core::LifecycleEvent;

use super::commands::{RegistryCommand, RegistryError, SubscriptionId};

/// Handle for interacting with the registry actor.
///
/// Cheap to clone; every clone talks to the same actor.
#[derive(Clone)]
pub struct RegistryHandle {
    sender: mpsc::Sender<RegistryCommand>,
}

impl RegistryHandle {
    pub fn new(sender: mpsc::Sender<RegistryCommand>) -> Self {
        Self { sender }
    }

    /// Registers a new subscription.
    ///
    /// The subscription only sees events broadcast after this returns.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn register(&self) -> Result<Subscription, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Register { respond_to: tx })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Unregisters a subscription and closes its mailbox.
    ///
    /// The mailbox is closed before the actor is told, so a broadcast
    /// currently waiting on this mailbox is released immediately. Events
    /// already in the mailbox can still be drained with
    /// [`Subscription::recv`]; after that it yields `None`.
    pub async fn unregister(&self, subscription: &mut Subscription) {
        subscription.close();
        // Actor gone means the set is gone too.
        let _ = self
            .sender
            .send(RegistryCommand::Unregister {
                id: subscription.id(),
            })
            .await;
    }

    /// Broadcasts an event to every registered subscription.
    ///
    /// Returns the number of subscriptions that received it.
    pub async fn broadcast(&self, event: LifecycleEvent) -> Result<usize, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Broadcast {
                event,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Returns the number of active subscriptions, or 0 if the actor is gone.
    pub async fn subscriber_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::SubscriberCount { respond_to: tx })
            .await
            .is_err()
        {
            return 0;
        }

        rx.await.unwrap_or_default()
    }

    /// Returns `true` while the command channel is open.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

/// A registered delivery endpoint for lifecycle events.
///
/// Owned by whoever registered it. Dropping it without unregistering is
/// allowed; the actor prunes it on the next broadcast.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    receiver: mpsc::Receiver<LifecycleEvent>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, receiver: mpsc::Receiver<LifecycleEvent>) -> Self {
        Self { id, receiver }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Waits for the next delivered event.
    ///
    /// Returns `None` once the subscription is closed and drained, or the
    /// registry has shut down.
    pub async fn recv(&mut self) -> Option<LifecycleEvent> {
        self.receiver.recv().await
    }

    /// Takes a pending event without waiting.
    pub fn try_recv(&mut self) -> Option<LifecycleEvent> {
        self.receiver.try_recv().ok()
    }

    fn close(&mut self) {
        self.receiver.close();
    }
}
