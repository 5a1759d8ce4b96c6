//! Abstraction over OS process start/stop notifications.

use std::time::Duration;

use zbserv_core::{LifecycleKind, ProcessFilter, RawProcessEvent, SubscriptionError};

/// Something that can report process starts and stops.
///
/// Implementations are shared between watch threads, but each
/// subscription stays on the thread that opened it.
pub trait ProcessEventSource: Send + Sync {
    /// Opens a stream of `kind` notifications for processes matching `filter`.
    ///
    /// # Errors
    ///
    /// - `SubscriptionError::Unavailable` if the mechanism cannot be used
    fn subscribe(
        &self,
        kind: LifecycleKind,
        filter: &ProcessFilter,
    ) -> Result<Box<dyn ProcessSubscription>, SubscriptionError>;
}

/// An open notification stream.
///
/// Not `Send`: a subscription is polled only by the thread that created it.
pub trait ProcessSubscription {
    /// Blocks for up to `timeout` waiting for the next notification.
    ///
    /// Returns `Ok(None)` when the timeout elapses with nothing to report.
    ///
    /// # Errors
    ///
    /// - `SubscriptionError::StreamEnded` if the stream can no longer yield events
    fn next_event(&mut self, timeout: Duration)
        -> Result<Option<RawProcessEvent>, SubscriptionError>;
}
