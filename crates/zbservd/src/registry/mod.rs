//! Subscriber registry using Actor pattern.
//!
//! Decouples the lifecycle monitor (one producer) from any number of
//! connection handlers (consumers). Register, unregister and broadcast are
//! serialized as commands through a single owning task, so the subscriber
//! set is never exposed to callers.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐ Broadcast ┌───────────────┐ snapshot ┌──────────────┐ mailbox (1) ┌──────────────┐
//! │ LifecycleMonitor │──────────▶│ RegistryActor │─────────▶│ delivery task│────────────▶│ Subscription │
//! └──────────────────┘           │ id -> Sender  │          │ (in order)   │────────────▶│ Subscription │
//!                                └───────────────┘          └──────────────┘             └──────────────┘
//!                                        ▲
//!                                        │ Register / Unregister
//!                                 ConnectionHandler
//! ```
//!
//! Every subscription has a single-slot mailbox. The actor answers a
//! broadcast by snapshotting the open mailboxes and queueing the snapshot
//! for a separate delivery task. That task hands the event to each mailbox
//! in turn and waits while one is full, so a slow consumer applies
//! backpressure to the monitor rather than losing lifecycle events. The
//! actor itself never waits on a consumer, so registration stays prompt.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()` or `.expect()` in production code
//! - Channel operations handle closure gracefully

use tokio::sync::mpsc;

mod actor;
mod commands;
mod delivery;
mod handle;

pub use actor::{RegistryActor, MAILBOX_CAPACITY};
pub use commands::{RegistryCommand, RegistryError, SubscriptionId};
pub use delivery::{run_deliveries, Delivery};
pub use handle::{RegistryHandle, Subscription};

/// Command channel buffer size
const COMMAND_BUFFER: usize = 64;

/// Spawn the registry actor and return a handle for interaction.
///
/// The actor runs until every handle has been dropped; the delivery task
/// follows once the queued broadcasts are done.
///
/// # Example
///
/// ```no_run
/// use zbservd::registry::spawn_registry;
///
/// #[tokio::main]
/// async fn main() {
///     let registry = spawn_registry();
///     let mut subscription = registry.register().await.unwrap();
///     // ... subscription.recv().await ...
///     registry.unregister(&mut subscription).await;
/// }
/// ```
pub fn spawn_registry() -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

    // Each broadcaster awaits its delivery, so the queue never outgrows
    // the number of concurrent broadcasters.
    let (delivery_tx, delivery_rx) = mpsc::unbounded_channel();

    let actor = RegistryActor::new(cmd_rx, delivery_tx);
    tokio::spawn(run_deliveries(delivery_rx));
    tokio::spawn(actor.run());

    RegistryHandle::new(cmd_tx)
}
