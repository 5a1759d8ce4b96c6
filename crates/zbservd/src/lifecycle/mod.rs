//! Process lifecycle monitoring.
//!
//! ```text
//! ┌──────────────────┐   Started  ┌────────────────┐
//! │ ProcessEvent     │──thread───▶│                │  broadcast  ┌──────────┐
//! │ Source           │   Stopped  │ LifecycleMonitor│───────────▶│ Registry │
//! │ (sysinfo poller) │──thread───▶│                │             └──────────┘
//! └──────────────────┘            └────────────────┘
//! ```
//!
//! Each watch loop runs on its own OS thread because a source's blocking
//! wait must stay on the thread that opened the subscription. Events are
//! funneled into the async runtime and broadcast one at a time.

mod monitor;
mod source;
mod sysinfo_source;

pub use monitor::{LifecycleMonitor, DEFAULT_WAIT_TIMEOUT};
pub use source::{ProcessEventSource, ProcessSubscription};
pub use sysinfo_source::{SysinfoEventSource, DEFAULT_POLL_INTERVAL};
