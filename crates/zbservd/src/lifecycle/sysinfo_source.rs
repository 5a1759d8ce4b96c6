//! Polling process event source backed by `sysinfo`.
//!
//! Each subscription keeps the set of matching processes seen on the previous
//! refresh and reports the difference. Processes already running when the
//! subscription opens form the baseline and are not reported as started.
//!
//! Processes are identified by PID together with their start time, so a
//! PID reused between two refreshes still reads as one stop and one start.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use sysinfo::{ProcessesToUpdate, System};
use tracing::debug;
use zbserv_core::{LifecycleKind, ProcessFilter, RawProcessEvent, SubscriptionError};

use super::source::{ProcessEventSource, ProcessSubscription};

/// PID plus process start time (seconds since the epoch).
type ProcessKey = (u32, u64);

/// How often the process table is refreshed.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Process event source that diffs periodic process table snapshots.
#[derive(Debug, Clone)]
pub struct SysinfoEventSource {
    poll_interval: Duration,
}

impl SysinfoEventSource {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }
}

impl Default for SysinfoEventSource {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl ProcessEventSource for SysinfoEventSource {
    fn subscribe(
        &self,
        kind: LifecycleKind,
        filter: &ProcessFilter,
    ) -> Result<Box<dyn ProcessSubscription>, SubscriptionError> {
        if filter.is_empty() {
            return Err(SubscriptionError::Unavailable(
                "process filter names no executables".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(SubscriptionError::Unavailable(
                "poll interval must be positive".to_string(),
            ));
        }
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(SubscriptionError::Unavailable(
                "process enumeration is not supported on this platform".to_string(),
            ));
        }

        let mut subscription = SysinfoSubscription {
            system: System::new(),
            kind,
            filter: filter.clone(),
            poll_interval: self.poll_interval,
            known: HashMap::new(),
            pending: VecDeque::new(),
            last_poll: None,
        };
        subscription.known = subscription.scan();

        debug!(
            kind = %kind,
            names = ?filter.names(),
            baseline = subscription.known.len(),
            "Process subscription opened"
        );
        Ok(Box::new(subscription))
    }
}

struct SysinfoSubscription {
    system: System,
    kind: LifecycleKind,
    filter: ProcessFilter,
    poll_interval: Duration,
    /// Matching processes seen on the last refresh.
    known: HashMap<ProcessKey, String>,
    pending: VecDeque<RawProcessEvent>,
    last_poll: Option<Instant>,
}

impl SysinfoSubscription {
    fn scan(&mut self) -> HashMap<ProcessKey, String> {
        self.system.refresh_processes(ProcessesToUpdate::All, true);
        self.last_poll = Some(Instant::now());

        self.system
            .processes()
            .iter()
            .filter_map(|(pid, process)| {
                let name = process.name().to_string_lossy();
                self.filter.matches(&name).then(|| {
                    let key = (pid.as_u32(), process.start_time());
                    (key, name.into_owned())
                })
            })
            .collect()
    }

    fn poll(&mut self) {
        let current = self.scan();
        let events = diff(&self.known, &current, self.kind);
        self.pending.extend(events);
        self.known = current;
    }
}

impl ProcessSubscription for SysinfoSubscription {
    fn next_event(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<RawProcessEvent>, SubscriptionError> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }

            let now = Instant::now();
            let next_poll = self
                .last_poll
                .map(|at| at + self.poll_interval)
                .unwrap_or(now);

            if next_poll <= now {
                self.poll();
                continue;
            }
            if now >= deadline {
                return Ok(None);
            }

            std::thread::sleep(next_poll.min(deadline) - now);
        }
    }
}

/// Events implied by moving from `before` to `after` for one kind.
fn diff(
    before: &HashMap<ProcessKey, String>,
    after: &HashMap<ProcessKey, String>,
    kind: LifecycleKind,
) -> Vec<RawProcessEvent> {
    let (from, to) = match kind {
        LifecycleKind::Started => (before, after),
        LifecycleKind::Stopped => (after, before),
    };

    let mut events: Vec<RawProcessEvent> = to
        .iter()
        .filter(|(key, _)| !from.contains_key(key))
        .map(|((pid, _), name)| RawProcessEvent::new(name.clone(), *pid))
        .collect();
    events.sort_by_key(|e| e.pid);
    events
}
