//! The ticking task behind one scheduler run.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use zbserv_core::Domain;

use super::{Inner, TickStep};

/// Identity of one active run: its generation plus the token that cancels it.
#[derive(Debug, Clone)]
pub struct RunHandle {
    generation: u64,
    token: CancellationToken,
}

impl RunHandle {
    pub(super) fn new(generation: u64, token: CancellationToken) -> Self {
        Self { generation, token }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(super) fn cancel(&self) {
        self.token.cancel();
    }

    pub(super) fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

/// Sleeps for `delay`, then ticks every `period` until superseded, cancelled
/// or full.
pub(super) async fn tick_loop(
    inner: Arc<Inner>,
    domain: Domain,
    generation: u64,
    token: CancellationToken,
    delay: Duration,
    period: Duration,
) {
    trace!(
        domain = %domain,
        generation,
        delay_ms = crate::saturating_millis(delay),
        "Run waiting for alignment"
    );

    tokio::select! {
        biased;
        _ = token.cancelled() => {
            debug!(domain = %domain, generation, "Run cancelled before first tick");
            return;
        }
        _ = sleep(delay) => {}
    }

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(domain = %domain, generation, "Run cancelled");
                return;
            }
            _ = ticker.tick() => {}
        }

        match inner.apply_tick(domain, generation) {
            TickStep::Continue => {}
            TickStep::Finished => return,
        }
    }
}
