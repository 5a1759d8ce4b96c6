//! zbserv Core - Shared types for stamina countdown tracking
//!
//! This crate provides the domain types shared between the daemon
//! (zbservd), the wire protocol, and resource providers.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod domain;
pub mod error;
pub mod lifecycle;
pub mod provider;
pub mod snapshot;

// Re-exports for convenience
pub use domain::{Domain, DomainConfig};
pub use error::{FetchError, PublishError, SubscriptionError};
pub use lifecycle::{LifecycleEvent, LifecycleKind, ProcessFilter, RawProcessEvent};
pub use provider::ResourceProvider;
pub use snapshot::ResourceSnapshot;
