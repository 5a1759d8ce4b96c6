//! Per-domain countdown scheduler.
//!
//! `start(domain)` is the only mutation entry point. It fetches a fresh
//! snapshot, cancels whatever run the domain had, installs and publishes
//! the snapshot, and spawns a ticking task that simulates regeneration
//! until the resource is full or the run is superseded.
//!
//! ```text
//!  start(D) ──fetch──▶ install ──publish──▶ UpdateSink
//!                        │
//!                        ├─ cancel previous RunHandle
//!                        └─ spawn tick_loop(generation N)
//!                                 │ every recover_interval
//!                                 └─ generation still N? ── +1, publish
//! ```
//!
//! All domain state sits behind one lock. The lock is never held across a
//! fetch or a sleep.

mod run;
mod sink;

pub use run::RunHandle;
pub use sink::UpdateSink;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zbserv_core::{
    Domain, DomainConfig, FetchError, PublishError, ResourceProvider, ResourceSnapshot,
};
use zbserv_protocol::ResourceUpdate;

/// Errors returned by [`CountdownScheduler::start`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("domain {0} is not configured")]
    UnknownDomain(Domain),

    /// The fetch failed; existing state for the domain is untouched.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// What a successful `start` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Snapshot installed and a run with this generation is ticking.
    Scheduled { generation: u64 },
    /// Snapshot installed; already full (or not regenerating), nothing scheduled.
    Complete,
    /// A later `start` for the domain installed first; this result was dropped.
    Discarded,
    /// Snapshot installed but could not be published; nothing scheduled.
    SinkClosed,
}

/// Countdown scheduler shared by every connection.
///
/// Cloning is cheap and every clone drives the same state.
#[derive(Clone)]
pub struct CountdownScheduler {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    provider: Arc<dyn ResourceProvider>,
    sink: Arc<dyn UpdateSink>,
    configs: HashMap<Domain, DomainConfig>,
    state: Mutex<SchedulerState>,
    root_token: CancellationToken,
}

#[derive(Default)]
struct SchedulerState {
    slots: HashMap<Domain, DomainSlot>,
    next_generation: u64,
    next_request: u64,
}

#[derive(Default)]
struct DomainSlot {
    snapshot: Option<ResourceSnapshot>,
    run: Option<RunHandle>,
    /// Request number of the fetch whose snapshot is installed.
    installed_request: u64,
}

/// Result of one tick, as seen by the tick loop.
pub(crate) enum TickStep {
    Continue,
    Finished,
}

impl CountdownScheduler {
    pub fn new(
        provider: Arc<dyn ResourceProvider>,
        sink: Arc<dyn UpdateSink>,
        configs: impl IntoIterator<Item = DomainConfig>,
    ) -> Self {
        let configs = configs
            .into_iter()
            .map(|config| (config.domain, config))
            .collect();

        Self {
            inner: Arc::new(Inner {
                provider,
                sink,
                configs,
                state: Mutex::new(SchedulerState::default()),
                root_token: CancellationToken::new(),
            }),
        }
    }

    /// Fetches, installs and publishes a fresh snapshot for `domain`, then
    /// (re)starts its countdown.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::UnknownDomain` if `domain` has no config
    /// - `SchedulerError::Fetch` if the provider failed; any running
    ///   countdown for the domain keeps going
    pub async fn start(&self, domain: Domain) -> Result<StartOutcome, SchedulerError> {
        let config = self
            .inner
            .configs
            .get(&domain)
            .ok_or(SchedulerError::UnknownDomain(domain))?;

        let request = {
            let mut state = self.inner.lock_state();
            state.next_request += 1;
            state.next_request
        };

        let snapshot = match self.inner.provider.fetch(config).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(domain = %domain, request, error = %e, "Fetch failed, keeping current state");
                return Err(e.into());
            }
        };

        Ok(self.install(domain, request, snapshot))
    }

    /// Cancels the current run and installs `snapshot`, unless a later
    /// request already installed one.
    fn install(&self, domain: Domain, request: u64, snapshot: ResourceSnapshot) -> StartOutcome {
        let mut guard = self.inner.lock_state();
        let state = &mut *guard;
        let slot = state.slots.entry(domain).or_default();

        if slot.installed_request > request {
            debug!(
                domain = %domain,
                request,
                installed = slot.installed_request,
                "Discarding stale fetch result"
            );
            return StartOutcome::Discarded;
        }

        if let Some(previous) = slot.run.take() {
            previous.cancel();
            debug!(domain = %domain, generation = previous.generation(), "Superseded run");
        }

        slot.installed_request = request;
        slot.snapshot = Some(snapshot.clone());

        info!(
            domain = %domain,
            current = snapshot.current,
            max = snapshot.max,
            fully_recovered_epoch = snapshot.fully_recovered_epoch,
            "Snapshot installed"
        );

        if let Err(e) = self.inner.sink.publish(ResourceUpdate::from(&snapshot)) {
            warn!(domain = %domain, error = %e, "Failed to publish snapshot");
            return StartOutcome::SinkClosed;
        }

        if snapshot.is_full() || snapshot.recover_interval.is_zero() {
            return StartOutcome::Complete;
        }

        state.next_generation += 1;
        let generation = state.next_generation;
        let handle = RunHandle::new(generation, self.inner.root_token.child_token());
        let token = handle.token();
        slot.run = Some(handle);

        let delay = snapshot.alignment_delay();
        debug!(
            domain = %domain,
            generation,
            delay_ms = crate::saturating_millis(delay),
            "Run scheduled"
        );

        tokio::spawn(run::tick_loop(
            Arc::clone(&self.inner),
            domain,
            generation,
            token,
            delay,
            snapshot.recover_interval,
        ));

        StartOutcome::Scheduled { generation }
    }

    /// Current installed snapshot for `domain`.
    pub fn snapshot(&self, domain: Domain) -> Option<ResourceSnapshot> {
        self.inner
            .lock_state()
            .slots
            .get(&domain)
            .and_then(|slot| slot.snapshot.clone())
    }

    /// Generation of the run currently ticking `domain`, if any.
    pub fn active_generation(&self, domain: Domain) -> Option<u64> {
        self.inner
            .lock_state()
            .slots
            .get(&domain)
            .and_then(|slot| slot.run.as_ref())
            .map(RunHandle::generation)
    }

    /// Configured domains in seeding order.
    pub fn domains(&self) -> Vec<Domain> {
        Domain::ALL
            .into_iter()
            .filter(|domain| self.inner.configs.contains_key(domain))
            .collect()
    }

    /// Domain whose game executable is `process_name`.
    pub fn domain_for_process(&self, process_name: &str) -> Option<Domain> {
        self.domains().into_iter().find(|domain| {
            self.inner
                .configs
                .get(domain)
                .is_some_and(|config| config.matches_process(process_name))
        })
    }

    /// Cancels every run. Later `start` calls still work but their runs
    /// are cancelled immediately.
    pub fn shutdown(&self) {
        self.inner.root_token.cancel();
        let mut state = self.inner.lock_state();
        for slot in state.slots.values_mut() {
            slot.run = None;
        }
        info!("Countdown scheduler shut down");
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies one tick for `generation`, publishing the result.
    pub(crate) fn apply_tick(&self, domain: Domain, generation: u64) -> TickStep {
        let mut state = self.lock_state();
        let Some(slot) = state.slots.get_mut(&domain) else {
            return TickStep::Finished;
        };

        let is_current = slot
            .run
            .as_ref()
            .is_some_and(|run| run.generation() == generation && !run.is_cancelled());
        if !is_current {
            debug!(domain = %domain, generation, "Run superseded, exiting");
            return TickStep::Finished;
        }

        let Some(next) = slot.snapshot.as_ref().map(ResourceSnapshot::ticked) else {
            slot.run = None;
            return TickStep::Finished;
        };
        slot.snapshot = Some(next.clone());

        debug!(
            domain = %domain,
            generation,
            current = next.current,
            max = next.max,
            "Tick"
        );

        if let Err(e) = self.sink.publish(ResourceUpdate::from(&next)) {
            match e {
                PublishError::Closed => debug!(domain = %domain, generation, "Sink closed, ending run"),
                PublishError::Encode(_) => warn!(domain = %domain, error = %e, "Failed to publish tick"),
            }
            slot.run = None;
            return TickStep::Finished;
        }

        if next.is_full() {
            info!(domain = %domain, generation, max = next.max, "Resource full, run complete");
            slot.run = None;
            return TickStep::Finished;
        }

        TickStep::Continue
    }
}
