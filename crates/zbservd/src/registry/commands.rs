//! Registry actor commands and errors.

use std::fmt;

use thiserror::Error;
use tokio::sync::oneshot;
use zbserv_core::LifecycleEvent;

use super::handle::Subscription;

/// Identity of one registered subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Commands sent to the registry actor.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Create a mailbox and add it to the active set.
    Register {
        respond_to: oneshot::Sender<Subscription>,
    },

    /// Remove a subscription from the active set.
    ///
    /// Fire-and-forget; unknown ids are ignored.
    Unregister { id: SubscriptionId },

    /// Deliver an event to every active subscription.
    ///
    /// Responds with the number of mailboxes that accepted the event.
    Broadcast {
        event: LifecycleEvent,
        respond_to: oneshot::Sender<usize>,
    },

    /// Number of active subscriptions.
    SubscriberCount { respond_to: oneshot::Sender<usize> },
}

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The actor has shut down.
    #[error("registry channel closed")]
    ChannelClosed,
}
