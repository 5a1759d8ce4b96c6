//! Playback-control collaborator for inbound overlay commands.

use tracing::info;
use zbserv_protocol::ControlCommand;

/// Receives command tokens sent by overlay clients.
///
/// Commands never touch the monitor or the scheduler.
pub trait PlaybackControl: Send + Sync {
    fn dispatch(&self, command: &ControlCommand);
}

/// Records commands in the log and does nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPlaybackControl;

impl PlaybackControl for LogPlaybackControl {
    fn dispatch(&self, command: &ControlCommand) {
        info!(command = %command, "Playback command received");
    }
}
