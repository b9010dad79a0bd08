use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::time::sleep;

use tasksync_core::{Clock, FixedClock, Task, TaskStatus};
use tasksync_scoring::ScoringEngine;
use tasksync_store::{ListQuery, MemoryStore, RemoteTaskStore, StoreError, TaskPage, TaskPatch};

use super::*;
use crate::error::ListenerError;
use crate::source::StaticTaskSource;

const DB: &str = "db-sched";

/// Memory store whose list calls take five (virtual) seconds.
struct SlowStore {
    inner: MemoryStore,
    lists: AtomicUsize,
}

#[async_trait]
impl RemoteTaskStore for SlowStore {
    fn name(&self) -> &str {
        "slow"
    }

    async fn list(&self, database_id: &str, query: &ListQuery) -> Result<TaskPage, StoreError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        sleep(Duration::from_secs(5)).await;
        self.inner.list(database_id, query).await
    }

    async fn create(&self, database_id: &str, task: &Task) -> Result<String, StoreError> {
        self.inner.create(database_id, task).await
    }

    async fn update(&self, remote_id: &str, patch: &TaskPatch) -> Result<bool, StoreError> {
        self.inner.update(remote_id, patch).await
    }
}

fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap()))
}

fn scheduler_with(store: Arc<dyn RemoteTaskStore>, clock: Arc<FixedClock>, local: Vec<Task>) -> SyncScheduler {
    SyncScheduler::new(ReconciliationEngine::new(
        store,
        Arc::new(StaticTaskSource::new(local)),
        ScoringEngine::new(clock.clone()),
        clock,
    ))
}

fn scheduler() -> (SyncScheduler, Arc<MemoryStore>) {
    let clock = clock();
    let store = Arc::new(MemoryStore::new(clock.clone()));
    let local = vec![Task::draft("Write changelog", clock.now())];
    (scheduler_with(store.clone(), clock, local), store)
}

struct Recorder {
    calls: Arc<AtomicUsize>,
    saw_completed_status: Arc<AtomicUsize>,
}

#[async_trait]
impl SyncListener for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    async fn on_sync(&self, event: &SyncEvent) -> Result<(), ListenerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if event.result.success {
            self.saw_completed_status.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

struct Refusing;

#[async_trait]
impl SyncListener for Refusing {
    fn name(&self) -> &str {
        "refusing"
    }

    async fn on_sync(&self, _event: &SyncEvent) -> Result<(), ListenerError> {
        Err(ListenerError::Failed("no thanks".into()))
    }
}

#[tokio::test]
async fn initial_status_is_inactive() {
    let (scheduler, _) = scheduler();
    let status = scheduler.status();
    assert!(!status.is_active);
    assert!(status.last_sync_at.is_none());
    assert_eq!(status.sync_interval_minutes, 15);
    assert_eq!(status.phase, SyncPhase::Idle);
}

#[tokio::test]
async fn force_sync_updates_status_and_notifies() {
    let (scheduler, store) = scheduler();
    let calls = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicUsize::new(0));
    scheduler.subscribe(Arc::new(Refusing));
    scheduler.subscribe(Arc::new(Recorder {
        calls: calls.clone(),
        saw_completed_status: completed.clone(),
    }));

    let result = scheduler.force_sync(&SyncConfig::new(DB), None).await.unwrap();
    assert_eq!(result.tasks_created, 1);
    assert!(result.success);
    assert_eq!(store.tasks(DB).len(), 1);

    let status = scheduler.status();
    assert_eq!(status.successful_syncs, 1);
    assert_eq!(status.failed_syncs, 0);
    assert!(status.last_sync_at.is_some());
    // Not scheduled, so nothing is due.
    assert!(status.next_sync_at.is_none());
    assert_eq!(status.phase, SyncPhase::Idle);

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(completed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn configuration_error_fails_fast() {
    let (scheduler, store) = scheduler();

    let err = scheduler
        .force_sync(&SyncConfig::new(""), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Configuration(_)));

    let response = scheduler.start_sync(SyncConfig::new(""), SyncOptions::default());
    assert!(!response.success);
    assert!(!scheduler.status().is_active);
    assert!(!scheduler.is_running());
    assert_eq!(store.calls().list, 0);
}

#[tokio::test]
async fn failed_cycle_counts_as_failed_sync() {
    let (scheduler, store) = scheduler();
    store.fail_on_title("Write changelog");

    let result = scheduler.force_sync(&SyncConfig::new(DB), None).await.unwrap();
    assert!(!result.success);
    assert_eq!(result.errors.len(), 1);

    let status = scheduler.status();
    assert_eq!(status.failed_syncs, 1);
    assert_eq!(status.errors, result.errors);
    assert_eq!(status.phase, SyncPhase::Error);
}

#[tokio::test(start_paused = true)]
async fn timer_runs_immediately_then_every_interval() {
    let (scheduler, store) = scheduler();
    let opts = SyncOptions {
        sync_interval_minutes: 15,
        ..SyncOptions::default()
    };

    let response = scheduler.start_sync(SyncConfig::new(DB), opts);
    assert!(response.success);
    assert!(scheduler.status().is_active);

    sleep(Duration::from_secs(1)).await;
    assert_eq!(scheduler.status().successful_syncs, 1);
    assert_eq!(store.tasks(DB).len(), 1);

    sleep(Duration::from_secs(15 * 60)).await;
    let status = scheduler.status();
    assert_eq!(status.successful_syncs, 2);
    assert_eq!(
        status.next_sync_at.unwrap() - status.last_sync_at.unwrap(),
        chrono::Duration::minutes(15)
    );
    // Second cycle found the task already there.
    assert_eq!(store.tasks(DB).len(), 1);
    assert_eq!(status.last_result.unwrap().tasks_created, 0);
}

#[tokio::test(start_paused = true)]
async fn stop_prevents_future_ticks() {
    let (scheduler, _) = scheduler();
    scheduler.start_sync(SyncConfig::new(DB), SyncOptions::default());
    sleep(Duration::from_secs(1)).await;

    let response = scheduler.stop_sync();
    assert!(response.success);
    let status = scheduler.status();
    assert!(!status.is_active);
    assert!(status.next_sync_at.is_none());

    sleep(Duration::from_secs(3 * 60 * 60)).await;
    assert_eq!(scheduler.status().successful_syncs, 1);

    assert_eq!(scheduler.stop_sync().message, "Sync is not running");
}

#[tokio::test(start_paused = true)]
async fn restart_replaces_the_timer() {
    let (scheduler, _) = scheduler();
    scheduler.start_sync(SyncConfig::new(DB), SyncOptions::default());
    sleep(Duration::from_secs(1)).await;
    scheduler.start_sync(SyncConfig::new(DB), SyncOptions::default());
    sleep(Duration::from_secs(1)).await;
    assert_eq!(scheduler.status().successful_syncs, 2);

    // Only the second timer is left: one tick at 15m + 1s, none at 15m.
    sleep(Duration::from_secs(15 * 60)).await;
    assert_eq!(scheduler.status().successful_syncs, 3);
}

#[tokio::test(start_paused = true)]
async fn overlapping_force_sync_is_rejected() {
    let clock = clock();
    let store = Arc::new(SlowStore {
        inner: MemoryStore::new(clock.clone()),
        lists: AtomicUsize::new(0),
    });
    let scheduler = Arc::new(scheduler_with(store.clone(), clock.clone(), vec![]));

    let first = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.force_sync(&SyncConfig::new(DB), None).await })
    };
    sleep(Duration::from_secs(1)).await;
    assert_eq!(scheduler.status().phase, SyncPhase::Syncing);

    let second = scheduler.force_sync(&SyncConfig::new(DB), None).await;
    assert!(matches!(second, Err(SyncError::CycleInProgress)));

    let first = first.await.unwrap().unwrap();
    assert!(first.success);
    assert_eq!(scheduler.status().successful_syncs, 1);
    assert_eq!(store.lists.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn tick_during_forced_cycle_is_skipped() {
    let clock = clock();
    let store = Arc::new(SlowStore {
        inner: MemoryStore::new(clock.clone()),
        lists: AtomicUsize::new(0),
    });
    let scheduler = Arc::new(scheduler_with(store.clone(), clock.clone(), vec![]));

    let forced = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.force_sync(&SyncConfig::new(DB), None).await })
    };
    sleep(Duration::from_secs(1)).await;

    // The timer's immediate tick lands while the forced cycle holds the guard.
    scheduler.start_sync(SyncConfig::new(DB), SyncOptions::default());
    forced.await.unwrap().unwrap();
    sleep(Duration::from_secs(10)).await;

    assert_eq!(scheduler.status().successful_syncs, 1);
    assert_eq!(store.lists.load(Ordering::SeqCst), 1);
    scheduler.stop_sync();
}

#[tokio::test(start_paused = true)]
async fn stop_lets_in_flight_cycle_finish() {
    let clock = clock();
    let store = Arc::new(SlowStore {
        inner: MemoryStore::new(clock.clone()),
        lists: AtomicUsize::new(0),
    });
    let local = vec![Task::draft("Rotate keys", clock.now()).with_status(TaskStatus::InProgress)];
    let scheduler = scheduler_with(store.clone(), clock.clone(), local);

    scheduler.start_sync(SyncConfig::new(DB), SyncOptions::default());
    sleep(Duration::from_secs(1)).await;
    assert_eq!(scheduler.status().phase, SyncPhase::Syncing);

    scheduler.stop_sync();
    // Remaining list (4s) plus the post-create refresh (5s).
    sleep(Duration::from_secs(20)).await;

    let status = scheduler.status();
    assert_eq!(status.successful_syncs, 1);
    assert!(!status.is_active);
    assert!(status.next_sync_at.is_none());
    assert_eq!(store.inner.tasks(DB).len(), 1);
}

#[tokio::test]
async fn reset_status_zeroes_counters() {
    let (scheduler, _) = scheduler();
    scheduler.force_sync(&SyncConfig::new(DB), None).await.unwrap();
    scheduler.reset_status();

    let status = scheduler.status();
    assert_eq!(status.successful_syncs, 0);
    assert!(status.last_sync_at.is_none());
    assert!(status.errors.is_empty());
}

#[tokio::test]
async fn start_without_runtime_context_is_reported() {
    let (scheduler, _) = scheduler();
    let response = std::thread::spawn(move || {
        scheduler.start_sync(SyncConfig::new(DB), SyncOptions::default())
    })
    .join()
    .unwrap();
    assert!(!response.success);
}
