//! End-to-end reconciliation scenarios against the in-memory store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use tasksync_core::{Clock, FixedClock, Task, TaskPriority, TaskStatus};
use tasksync_scoring::ScoringEngine;
use tasksync_store::{MemoryStore, RemoteTaskStore, TaskPatch};
use tasksync_sync::{
    ConflictResolution, IdMap, ListenerError, ReconciliationEngine, StaticTaskSource,
    SyncConfig, SyncEvent, SyncListener, SyncOptions, SyncScheduler,
};

const DB: &str = "db-tasks";

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 9, 14, 9, 0, 0).unwrap()
}

fn local_tasks() -> Vec<Task> {
    let now = t0();
    vec![
        Task::draft("Set up CI", now)
            .with_id("l-1")
            .with_priority(TaskPriority::High)
            .with_tags(["infra"]),
        Task::draft("Write onboarding guide", now)
            .with_id("l-2")
            .with_priority(TaskPriority::Medium)
            .with_description("prerequisite for hiring"),
        Task::draft("Fix checkout bug", now)
            .with_id("l-3")
            .with_priority(TaskPriority::Urgent)
            .with_due_date(NaiveDate::from_ymd_opt(2026, 9, 15).unwrap())
            .with_tags(["revenue", "user-facing"]),
        Task::draft("Plan offsite", now)
            .with_id("l-4")
            .with_priority(TaskPriority::Low)
            .with_estimated_hours(3.0),
        Task::draft("Audit dependencies", now)
            .with_id("l-5")
            .with_priority(TaskPriority::Medium)
            .with_status(TaskStatus::Blocked),
    ]
}

struct Harness {
    clock: Arc<FixedClock>,
    store: Arc<MemoryStore>,
}

impl Harness {
    fn new() -> Self {
        let clock = Arc::new(FixedClock::new(t0()));
        let store = Arc::new(MemoryStore::new(clock.clone()));
        Self { clock, store }
    }

    fn engine(&self, local: Vec<Task>) -> ReconciliationEngine {
        ReconciliationEngine::new(
            self.store.clone(),
            Arc::new(StaticTaskSource::new(local)),
            ScoringEngine::new(self.clock.clone()),
            self.clock.clone(),
        )
    }

    /// Seed remote copies of `tasks` with identical watched fields.
    fn seed(&self, tasks: &[Task]) {
        for task in tasks {
            let mut copy = task.clone();
            copy.id = None;
            self.store.insert(DB, copy);
        }
    }
}

fn options(policy: ConflictResolution) -> SyncOptions {
    SyncOptions {
        conflict_resolution: policy,
        ..SyncOptions::default()
    }
}

#[tokio::test]
async fn three_existing_two_new() {
    let h = Harness::new();
    let local = local_tasks();
    h.seed(&local[..3]);

    let engine = h.engine(local);
    let outcome = engine
        .run_cycle(&SyncConfig::new(DB), &SyncOptions::default(), None)
        .await
        .unwrap();

    assert_eq!(outcome.result.tasks_created, 2);
    assert_eq!(outcome.result.tasks_updated, 0);
    assert_eq!(outcome.result.tasks_deleted, 0);
    assert!(outcome.result.success);
    assert_eq!(h.store.tasks(DB).len(), 5);
    assert_eq!(outcome.remote_tasks.len(), 5);
    assert_eq!(h.store.calls().update, 0);
}

#[tokio::test]
async fn second_cycle_is_a_noop() {
    for policy in [
        ConflictResolution::LocalWins,
        ConflictResolution::RemoteWins,
        ConflictResolution::Merge,
    ] {
        let h = Harness::new();
        let engine = h.engine(local_tasks());
        let config = SyncConfig::new(DB);
        let opts = options(policy);

        let first = engine.run_cycle(&config, &opts, None).await.unwrap();
        assert_eq!(first.result.tasks_created, 5, "{policy}");

        h.clock.advance(Duration::minutes(15));
        let second = engine
            .run_cycle(&config, &opts, Some(first.result.finished_at))
            .await
            .unwrap();
        assert_eq!(second.result.tasks_created, 0, "{policy}");
        assert_eq!(second.result.tasks_updated, 0, "{policy}");
        assert!(second.result.success, "{policy}");
    }
}

#[tokio::test]
async fn local_wins_overwrites_remote_edits() {
    let h = Harness::new();
    let local = local_tasks();
    h.seed(&local);

    // Someone edits every watched field remotely, later than the local copy.
    let target = h
        .store
        .tasks(DB)
        .into_iter()
        .find(|t| t.title == "Set up CI")
        .unwrap();
    let remote_id = target.remote_id.clone().unwrap();
    h.clock.advance(Duration::hours(1));
    h.store
        .update(
            &remote_id,
            &TaskPatch {
                status: Some(TaskStatus::Done),
                priority: Some(Some(TaskPriority::Low)),
                description: Some("remote text".into()),
                due_date: Some(NaiveDate::from_ymd_opt(2027, 1, 1)),
                estimated_hours: Some(Some(40.0)),
                tags: Some(vec!["other".into()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let engine = h.engine(local.clone());
    let outcome = engine
        .run_cycle(&SyncConfig::new(DB), &options(ConflictResolution::LocalWins), None)
        .await
        .unwrap();
    assert_eq!(outcome.result.tasks_updated, 1);

    let row = h.store.get(&remote_id).unwrap();
    let original = &local[0];
    assert_eq!(row.status, original.status);
    assert_eq!(row.priority, original.priority);
    assert_eq!(row.description, original.description);
    assert_eq!(row.due_date, original.due_date);
    assert_eq!(row.estimated_hours, original.estimated_hours);
    assert_eq!(row.tags, original.tags);
}

#[tokio::test]
async fn remote_wins_never_writes() {
    let h = Harness::new();
    let mut local = local_tasks();
    h.seed(&local);
    local[0].status = TaskStatus::Review;
    local[0].updated_at = t0() + Duration::days(1);

    let engine = h.engine(local);
    let outcome = engine
        .run_cycle(&SyncConfig::new(DB), &options(ConflictResolution::RemoteWins), None)
        .await
        .unwrap();
    assert_eq!(outcome.result.tasks_updated, 0);
    assert_eq!(h.store.calls().update, 0);
}

#[tokio::test]
async fn merge_takes_the_newer_side() {
    let h = Harness::new();
    let mut local = local_tasks();
    h.seed(&local);

    // Newer locally: pushed.
    local[0].status = TaskStatus::InProgress;
    local[0].updated_at = t0() + Duration::hours(2);
    // Older locally: remote kept.
    local[1].status = TaskStatus::Done;
    local[1].updated_at = t0() - Duration::hours(2);

    let engine = h.engine(local);
    let outcome = engine
        .run_cycle(&SyncConfig::new(DB), &options(ConflictResolution::Merge), None)
        .await
        .unwrap();
    assert_eq!(outcome.result.tasks_updated, 1);

    let rows = h.store.tasks(DB);
    let ci = rows.iter().find(|t| t.title == "Set up CI").unwrap();
    let guide = rows.iter().find(|t| t.title == "Write onboarding guide").unwrap();
    assert_eq!(ci.status, TaskStatus::InProgress);
    assert_eq!(guide.status, TaskStatus::Todo);
}

#[tokio::test]
async fn one_failing_task_does_not_abort_the_batch() {
    let h = Harness::new();
    h.store.fail_on_title("Fix checkout bug");

    let engine = h.engine(local_tasks());
    let outcome = engine
        .run_cycle(&SyncConfig::new(DB), &SyncOptions::default(), None)
        .await
        .unwrap();

    assert_eq!(outcome.result.tasks_created, 4);
    assert_eq!(outcome.result.errors.len(), 1);
    assert!(outcome.result.errors[0].contains("Fix checkout bug"));
    assert!(!outcome.result.success);
    assert!(outcome.result.report.contains("completed with errors"));
}

#[tokio::test]
async fn id_map_is_persisted_between_runs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("id-map.json");
    let h = Harness::new();

    let engine = h.engine(local_tasks()).with_id_map(IdMap::load(&path).unwrap());
    engine
        .run_cycle(&SyncConfig::new(DB), &SyncOptions::default(), None)
        .await
        .unwrap();

    let reloaded = IdMap::load(&path).unwrap();
    assert_eq!(reloaded.len(), 5);

    // Renamed locally: matched through the map, not duplicated.
    let mut renamed = local_tasks();
    renamed[3].title = "Plan team offsite".into();
    let engine = h.engine(renamed).with_id_map(reloaded);
    let outcome = engine
        .run_cycle(&SyncConfig::new(DB), &SyncOptions::default(), None)
        .await
        .unwrap();
    assert_eq!(outcome.result.tasks_created, 0);
    assert_eq!(h.store.tasks(DB).len(), 5);
}

struct Exploding;

#[async_trait]
impl SyncListener for Exploding {
    fn name(&self) -> &str {
        "exploding"
    }

    async fn on_sync(&self, _event: &SyncEvent) -> Result<(), ListenerError> {
        panic!("listener bug");
    }
}

struct Collecting {
    calls: Arc<AtomicUsize>,
    remote_seen: Arc<AtomicUsize>,
    pulls_seen: Arc<AtomicUsize>,
}

#[async_trait]
impl SyncListener for Collecting {
    fn name(&self) -> &str {
        "collecting"
    }

    async fn on_sync(&self, event: &SyncEvent) -> Result<(), ListenerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.remote_seen.store(event.remote_tasks.len(), Ordering::SeqCst);
        self.pulls_seen.store(event.pull_candidates.len(), Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn listeners_get_remote_tasks_and_pull_candidates() {
    let h = Harness::new();
    let scheduler = SyncScheduler::new(h.engine(local_tasks()));
    let calls = Arc::new(AtomicUsize::new(0));
    let remote_seen = Arc::new(AtomicUsize::new(0));
    let pulls_seen = Arc::new(AtomicUsize::new(0));
    scheduler.subscribe(Arc::new(Exploding));
    scheduler.subscribe(Arc::new(Collecting {
        calls: calls.clone(),
        remote_seen: remote_seen.clone(),
        pulls_seen: pulls_seen.clone(),
    }));
    let config = SyncConfig::new(DB);

    let first = scheduler.force_sync(&config, None).await.unwrap();
    assert!(first.success);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(remote_seen.load(Ordering::SeqCst), 5);
    assert_eq!(pulls_seen.load(Ordering::SeqCst), 0);

    // A remote-only task appears after the first sync.
    h.clock.advance(Duration::minutes(5));
    h.store.insert(DB, Task::draft("Added in the workspace", h.clock.now()));
    h.clock.advance(Duration::minutes(5));

    let second = scheduler.force_sync(&config, None).await.unwrap();
    assert!(second.success);
    assert_eq!(second.tasks_created, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(remote_seen.load(Ordering::SeqCst), 6);
    assert_eq!(pulls_seen.load(Ordering::SeqCst), 1);
    assert_eq!(scheduler.status().successful_syncs, 2);
}
