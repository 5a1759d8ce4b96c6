//! Where published snapshots go.

use tokio::sync::broadcast;
use zbserv_core::PublishError;
use zbserv_protocol::ResourceUpdate;

/// Destination for scheduler updates.
///
/// `publish` is called while the scheduler's state lock is held, so it
/// must not block.
pub trait UpdateSink: Send + Sync {
    fn publish(&self, update: ResourceUpdate) -> Result<(), PublishError>;
}

/// Fan-out to every connected client; fails once no receiver is left.
impl UpdateSink for broadcast::Sender<ResourceUpdate> {
    fn publish(&self, update: ResourceUpdate) -> Result<(), PublishError> {
        self.send(update).map(|_| ()).map_err(|_| PublishError::Closed)
    }
}
