//! The resource provider seam.

use async_trait::async_trait;

use crate::{DomainConfig, FetchError, ResourceSnapshot};

/// Source of authoritative resource readings.
///
/// Implementations must not retry internally; a failed fetch is reported
/// and the caller decides what to do.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// Fetches a fresh snapshot for `config.domain`.
    async fn fetch(&self, config: &DomainConfig) -> Result<ResourceSnapshot, FetchError>;
}
