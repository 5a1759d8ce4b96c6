//! zbserv Daemon - lifecycle monitor, countdown scheduler and overlay server
//!
//! This crate provides the moving parts of the zbserv daemon:
//! - `lifecycle` - Watch loops reporting game process starts and stops
//! - `registry` - Subscriber registry actor fanning lifecycle events out
//! - `scheduler` - Per-domain countdowns with cancellable ticking runs
//! - `server` - WebSocket server and per-connection session coordination
//! - `config` - TOML configuration and credential resolution
//! - `control` - Collaborator for inbound overlay commands
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  events   ┌──────────────────┐
//! │ LifecycleMonitor │──────────▶│  RegistryActor   │
//! │ (2 OS threads)   │           │ (subscriber set) │
//! └──────────────────┘           └────────┬─────────┘
//!                                         │ mailbox (1 slot)
//!                                         ▼
//! ┌──────────────────┐  start()  ┌──────────────────┐
//! │CountdownScheduler│◀──────────│ConnectionHandler │
//! │ (runs per domain)│           │  (per client)    │
//! └────────┬─────────┘           └────────▲─────────┘
//!          │ publish                      │ ResourceUpdate
//!          ▼                              │
//!  broadcast::Sender ─────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Lock poisoning is recovered, channel closure is handled

use std::time::Duration;

pub mod config;
pub mod control;
pub mod lifecycle;
pub mod registry;
pub mod scheduler;
pub mod server;

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
