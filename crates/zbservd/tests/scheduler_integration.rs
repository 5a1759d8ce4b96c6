//! Integration tests for the countdown scheduler.
//!
//! Timer-driven properties run on a paused clock (`start_paused = true`),
//! so sleeping in a test advances time deterministically.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use zbserv_core::{
    Domain, DomainConfig, FetchError, PublishError, ResourceProvider, ResourceSnapshot,
};
use zbserv_protocol::ResourceUpdate;
use zbservd::scheduler::{CountdownScheduler, SchedulerError, StartOutcome, UpdateSink};

// ============================================================================
// Test Helpers
// ============================================================================

const DOMAIN: Domain = Domain::StarRail;

/// One scripted provider answer, returned after `delay`.
struct Scripted {
    result: Result<ResourceSnapshot, FetchError>,
    delay: Duration,
}

/// Provider that answers from a queue, in call order.
#[derive(Default)]
struct ScriptedProvider {
    script: Mutex<VecDeque<Scripted>>,
}

impl ScriptedProvider {
    fn push(&self, result: Result<ResourceSnapshot, FetchError>, delay: Duration) {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted { result, delay });
    }

    fn push_snapshot(&self, snapshot: ResourceSnapshot) {
        self.push(Ok(snapshot), Duration::ZERO);
    }
}

#[async_trait]
impl ResourceProvider for ScriptedProvider {
    async fn fetch(&self, _config: &DomainConfig) -> Result<ResourceSnapshot, FetchError> {
        let next = self.script.lock().unwrap().pop_front();
        let Some(scripted) = next else {
            return Err(FetchError::Http("script exhausted".to_string()));
        };
        sleep(scripted.delay).await;
        scripted.result
    }
}

/// Sink that records every update, optionally refusing after a budget.
#[derive(Default)]
struct RecordingSink {
    updates: Mutex<Vec<ResourceUpdate>>,
    accept_limit: Mutex<Option<usize>>,
}

impl RecordingSink {
    fn currents(&self) -> Vec<u32> {
        self.updates.lock().unwrap().iter().map(|u| u.current).collect()
    }

    fn close_after(&self, accepted: usize) {
        *self.accept_limit.lock().unwrap() = Some(accepted);
    }

    fn reopen(&self) {
        *self.accept_limit.lock().unwrap() = None;
    }
}

impl UpdateSink for RecordingSink {
    fn publish(&self, update: ResourceUpdate) -> Result<(), PublishError> {
        let mut updates = self.updates.lock().unwrap();
        if let Some(limit) = *self.accept_limit.lock().unwrap() {
            if updates.len() >= limit {
                return Err(PublishError::Closed);
            }
        }
        updates.push(update);
        Ok(())
    }
}

fn snapshot(current: u32, max: u32, interval_secs: u64, epoch: i64) -> ResourceSnapshot {
    ResourceSnapshot::new(DOMAIN, current, max, Duration::from_secs(interval_secs), epoch)
}

fn setup() -> (CountdownScheduler, Arc<ScriptedProvider>, Arc<RecordingSink>) {
    let provider = Arc::new(ScriptedProvider::default());
    let sink = Arc::new(RecordingSink::default());
    let scheduler = CountdownScheduler::new(
        provider.clone(),
        sink.clone(),
        [DomainConfig::new(DOMAIN), DomainConfig::new(Domain::Zzz)],
    );
    (scheduler, provider, sink)
}

// ============================================================================
// Terminal Convergence
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_terminal_convergence_single_tick() {
    let (scheduler, provider, sink) = setup();
    provider.push_snapshot(snapshot(0, 1, 1, 1_700_000_000));

    let outcome = scheduler.start(DOMAIN).await.unwrap();
    assert_eq!(outcome, StartOutcome::Scheduled { generation: 1 });
    assert_eq!(sink.currents(), vec![0]);

    sleep(Duration::from_millis(1500)).await;
    assert_eq!(sink.currents(), vec![0, 1]);
    assert_eq!(scheduler.active_generation(DOMAIN), None);

    sleep(Duration::from_secs(30)).await;
    assert_eq!(sink.currents(), vec![0, 1], "no ticks after reaching max");
    assert_eq!(scheduler.snapshot(DOMAIN).unwrap().current, 1);
}

#[tokio::test(start_paused = true)]
async fn test_first_tick_waits_for_alignment_delay() {
    let (scheduler, provider, sink) = setup();
    // 100 s past a 360 s boundary.
    provider.push_snapshot(snapshot(10, 240, 360, 360 * 1000 + 100));

    scheduler.start(DOMAIN).await.unwrap();

    sleep(Duration::from_secs(459)).await;
    assert_eq!(sink.currents(), vec![10]);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(sink.currents(), vec![10, 11]);

    sleep(Duration::from_secs(360)).await;
    assert_eq!(sink.currents(), vec![10, 11, 12]);
}

#[tokio::test(start_paused = true)]
async fn test_full_snapshot_never_ticks() {
    let (scheduler, provider, sink) = setup();
    provider.push_snapshot(snapshot(240, 240, 1, 0));

    assert_eq!(scheduler.start(DOMAIN).await, Ok(StartOutcome::Complete));
    sleep(Duration::from_secs(10)).await;
    assert_eq!(sink.currents(), vec![240]);
}

// ============================================================================
// Supersession & Single Writer
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_supersession_only_latest_lineage_publishes() {
    let (scheduler, provider, sink) = setup();
    // Both runs wait 5 s before their first 10 s period.
    provider.push_snapshot(snapshot(0, 10, 10, 5));
    provider.push_snapshot(snapshot(3, 10, 10, 5));

    let first = scheduler.start(DOMAIN).await.unwrap();
    let second = scheduler.start(DOMAIN).await.unwrap();
    assert_eq!(first, StartOutcome::Scheduled { generation: 1 });
    assert_eq!(second, StartOutcome::Scheduled { generation: 2 });

    sleep(Duration::from_secs(100)).await;
    assert_eq!(sink.currents(), vec![0, 3, 4, 5, 6, 7, 8, 9, 10]);
    assert_eq!(scheduler.active_generation(DOMAIN), None);
}

#[tokio::test(start_paused = true)]
async fn test_single_writer_across_restarts() {
    let (scheduler, provider, sink) = setup();
    provider.push_snapshot(snapshot(0, 100, 10, 0));
    provider.push_snapshot(snapshot(5, 100, 10, 0));

    scheduler.start(DOMAIN).await.unwrap();
    sleep(Duration::from_secs(25)).await;
    assert_eq!(sink.currents(), vec![0, 1, 2]);

    scheduler.start(DOMAIN).await.unwrap();
    sleep(Duration::from_secs(25)).await;

    // The first run would have published 3 at t=30 had it survived.
    assert_eq!(sink.currents(), vec![0, 1, 2, 5, 6, 7]);
    assert_eq!(scheduler.active_generation(DOMAIN), Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_stale_fetch_is_discarded() {
    let (scheduler, provider, sink) = setup();
    provider.push(Ok(snapshot(0, 10, 10, 0)), Duration::from_secs(5));
    provider.push(Ok(snapshot(7, 10, 10, 0)), Duration::from_secs(1));

    let slow = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.start(DOMAIN).await }
    });
    sleep(Duration::from_millis(1)).await;
    let fast = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.start(DOMAIN).await }
    });

    assert_eq!(
        fast.await.unwrap(),
        Ok(StartOutcome::Scheduled { generation: 1 })
    );
    assert_eq!(slow.await.unwrap(), Ok(StartOutcome::Discarded));

    assert_eq!(sink.currents(), vec![7]);
    assert_eq!(scheduler.snapshot(DOMAIN).unwrap().current, 7);
    assert_eq!(scheduler.active_generation(DOMAIN), Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_domains_tick_independently() {
    let (scheduler, provider, sink) = setup();
    provider.push_snapshot(snapshot(0, 2, 10, 0));
    provider.push_snapshot(ResourceSnapshot::new(
        Domain::Zzz,
        0,
        2,
        Duration::from_secs(10),
        0,
    ));

    scheduler.start(DOMAIN).await.unwrap();
    scheduler.start(Domain::Zzz).await.unwrap();
    sleep(Duration::from_secs(30)).await;

    assert_eq!(scheduler.snapshot(DOMAIN).unwrap().current, 2);
    assert_eq!(scheduler.snapshot(Domain::Zzz).unwrap().current, 2);
    assert_eq!(sink.currents().len(), 6);
}

// ============================================================================
// Failure Isolation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_fetch_failure_leaves_running_countdown_alone() {
    let (scheduler, provider, sink) = setup();
    provider.push_snapshot(snapshot(0, 3, 10, 0));
    provider.push(
        Err(FetchError::Status {
            domain: DOMAIN,
            status: 503,
        }),
        Duration::ZERO,
    );

    scheduler.start(DOMAIN).await.unwrap();
    sleep(Duration::from_secs(15)).await;

    let result = scheduler.start(DOMAIN).await;
    assert!(matches!(result, Err(SchedulerError::Fetch(FetchError::Status { .. }))));
    assert_eq!(scheduler.active_generation(DOMAIN), Some(1));

    sleep(Duration::from_secs(30)).await;
    assert_eq!(sink.currents(), vec![0, 1, 2, 3]);
    assert_eq!(scheduler.snapshot(DOMAIN).unwrap().current, 3);
}

#[tokio::test]
async fn test_unknown_domain_is_rejected_without_fetch() {
    let (scheduler, provider, sink) = setup();
    provider.push_snapshot(snapshot(0, 3, 10, 0));

    let result = scheduler.start(Domain::Genshin).await;
    assert_eq!(result, Err(SchedulerError::UnknownDomain(Domain::Genshin)));
    assert!(sink.currents().is_empty());
    assert_eq!(provider.script.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_closed_sink_ends_run_but_not_domain() {
    let (scheduler, provider, sink) = setup();
    provider.push_snapshot(snapshot(0, 10, 10, 0));
    provider.push_snapshot(snapshot(4, 10, 10, 0));

    scheduler.start(DOMAIN).await.unwrap();
    sink.close_after(2);
    sleep(Duration::from_secs(35)).await;

    assert_eq!(sink.currents(), vec![0, 1]);
    assert_eq!(scheduler.active_generation(DOMAIN), None);

    sink.reopen();
    let outcome = scheduler.start(DOMAIN).await.unwrap();
    assert_eq!(outcome, StartOutcome::Scheduled { generation: 2 });
    assert_eq!(sink.currents(), vec![0, 1, 4]);
}

#[tokio::test(start_paused = true)]
async fn test_publish_failure_on_install_schedules_nothing() {
    let (scheduler, provider, sink) = setup();
    provider.push_snapshot(snapshot(0, 10, 10, 0));
    sink.close_after(0);

    assert_eq!(scheduler.start(DOMAIN).await, Ok(StartOutcome::SinkClosed));
    assert_eq!(scheduler.active_generation(DOMAIN), None);
    assert_eq!(scheduler.snapshot(DOMAIN).unwrap().current, 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_all_runs() {
    let (scheduler, provider, sink) = setup();
    provider.push_snapshot(snapshot(0, 10, 10, 0));

    scheduler.start(DOMAIN).await.unwrap();
    sleep(Duration::from_secs(15)).await;
    scheduler.shutdown();
    sleep(Duration::from_secs(60)).await;

    assert_eq!(sink.currents(), vec![0, 1]);
}
