//! Point-in-time resource readings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Domain;

/// A resource reading taken from the provider at one instant.
///
/// Snapshots are values: a tick produces a new snapshot via
/// [`ResourceSnapshot::ticked`] rather than mutating the old one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub domain: Domain,
    pub current: u32,
    pub max: u32,
    /// Regeneration period of one unit.
    pub recover_interval: Duration,
    /// Unix timestamp (seconds) at which the provider expects `current == max`.
    pub fully_recovered_epoch: i64,
}

impl ResourceSnapshot {
    pub fn new(
        domain: Domain,
        current: u32,
        max: u32,
        recover_interval: Duration,
        fully_recovered_epoch: i64,
    ) -> Self {
        Self {
            domain,
            current,
            max,
            recover_interval,
            fully_recovered_epoch,
        }
    }

    /// Returns true once no further regeneration can happen.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.current >= self.max
    }

    /// Returns the snapshot after one simulated regeneration unit.
    ///
    /// `current` never exceeds `max`; a full snapshot is returned unchanged.
    #[must_use]
    pub fn ticked(&self) -> Self {
        let mut next = self.clone();
        if !next.is_full() {
            next.current = next.current.saturating_add(1).min(next.max);
        }
        next
    }

    /// Delay before the first local tick: `fully_recovered_epoch mod recover_interval`.
    ///
    /// Computed in milliseconds so sub-second intervals behave. A zero
    /// interval yields a zero delay.
    pub fn alignment_delay(&self) -> Duration {
        let period_ms = i64::try_from(self.recover_interval.as_millis()).unwrap_or(i64::MAX);
        if period_ms == 0 {
            return Duration::ZERO;
        }
        let epoch_ms = self.fully_recovered_epoch.saturating_mul(1000);
        // rem_euclid keeps the remainder non-negative for pre-1970 or bogus epochs.
        let rem = epoch_ms.rem_euclid(period_ms);
        Duration::from_millis(u64::try_from(rem).unwrap_or(0))
    }
}
