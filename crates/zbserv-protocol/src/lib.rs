//! zbserv Protocol - Messages exchanged with the desktop overlay
//!
//! The overlay connects over a WebSocket and receives one JSON text frame
//! per published resource update. It may send plain text command tokens
//! back, which the daemon forwards to its playback-control collaborator.

pub mod message;

pub use message::{ControlCommand, ResourceUpdate};
