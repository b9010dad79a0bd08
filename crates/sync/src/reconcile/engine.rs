//! [`ReconciliationEngine`]: one full diff-and-patch cycle.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use tasksync_core::{SharedClock, Task};
use tasksync_scoring::ScoringEngine;
use tasksync_store::{ListQuery, RemoteTaskStore, TaskPatch};

use super::conflict::resolve_patch;
use super::diff::diff_fields;
use crate::error::SyncError;
use crate::idmap::IdMap;
use crate::options::{ConflictResolution, SyncConfig, SyncOptions};
use crate::report::{sync_report, SyncCounts};
use crate::source::LocalTaskSource;
use crate::status::SyncResult;

/// Remote calls in flight at once within a cycle.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Everything a cycle produced.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub result: SyncResult,
    /// Remote task list after this cycle's writes.
    pub remote_tasks: Vec<Task>,
    /// Remote tasks edited since the previous cycle.
    pub pull_candidates: Vec<Task>,
}

enum Action {
    Create {
        local_id: Option<String>,
        task: Task,
    },
    Update {
        title: String,
        remote_id: String,
        patch: TaskPatch,
    },
}

enum ActionOutcome {
    Created {
        local_id: Option<String>,
        remote_id: String,
    },
    Updated,
    Failed(String),
}

struct Plan {
    actions: Vec<Action>,
    unchanged: usize,
}

/// Remote tasks indexed by id and by title.
struct RemoteIndex<'a> {
    by_id: HashMap<&'a str, usize>,
    by_title: HashMap<&'a str, Vec<usize>>,
}

impl<'a> RemoteIndex<'a> {
    fn build(remote: &'a [Task]) -> Self {
        let mut by_id = HashMap::new();
        let mut by_title: HashMap<&str, Vec<usize>> = HashMap::new();
        for (idx, task) in remote.iter().enumerate() {
            if let Some(id) = task.remote_id.as_deref() {
                by_id.insert(id, idx);
            }
            by_title.entry(task.title.as_str()).or_default().push(idx);
        }
        Self { by_id, by_title }
    }
}

/// Diffs the local task set against the remote store and writes the
/// resulting creates and patches.
pub struct ReconciliationEngine {
    store: Arc<dyn RemoteTaskStore>,
    source: Arc<dyn LocalTaskSource>,
    scoring: ScoringEngine,
    clock: SharedClock,
    id_map: Mutex<IdMap>,
    max_concurrency: usize,
}

impl ReconciliationEngine {
    pub fn new(
        store: Arc<dyn RemoteTaskStore>,
        source: Arc<dyn LocalTaskSource>,
        scoring: ScoringEngine,
        clock: SharedClock,
    ) -> Self {
        Self {
            store,
            source,
            scoring,
            clock,
            id_map: Mutex::new(IdMap::in_memory()),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn with_id_map(mut self, id_map: IdMap) -> Self {
        self.id_map = Mutex::new(id_map);
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn RemoteTaskStore> {
        &self.store
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Snapshot of the identity map.
    pub fn id_map(&self) -> IdMap {
        self.lock_id_map().clone()
    }

    fn lock_id_map(&self) -> MutexGuard<'_, IdMap> {
        self.id_map.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one cycle.
    ///
    /// Only a configuration problem returns `Err`; remote and source
    /// failures are collected into the result's error list.
    pub async fn run_cycle(
        &self,
        config: &SyncConfig,
        options: &SyncOptions,
        last_sync_at: Option<DateTime<Utc>>,
    ) -> Result<CycleOutcome, SyncError> {
        config.validate()?;
        let database_id = config.database_id.as_str();
        let started_at = self.clock.now();
        let mut errors = Vec::new();

        debug!(
            database_id,
            store = self.store.name(),
            source = self.source.name(),
            policy = %options.conflict_resolution,
            "sync cycle started"
        );

        let listing = match self.store.list_all(database_id, &ListQuery::default()).await {
            Ok(listing) => listing,
            Err(e) => {
                warn!(database_id, error = %e, "failed to list remote tasks");
                errors.push(format!("Failed to list remote tasks: {e}"));
                return Ok(self.finish(started_at, SyncCounts::default(), errors, Vec::new(), Vec::new()));
            }
        };

        let remote = listing.tasks;
        // Unreadable rows are skipped, and local tasks mapped to them are left alone.
        let mut unreadable = HashSet::new();
        for row in listing.rejected {
            errors.push(format!(
                "Skipped unreadable remote task {}: {}",
                row.remote_id, row.reason
            ));
            unreadable.insert(row.remote_id);
        }

        let local = match self.source.load().await {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!(source = self.source.name(), error = %e, "failed to load local tasks");
                errors.push(format!("Failed to load local tasks from {}: {e}", self.source.name()));
                return Ok(self.finish(started_at, SyncCounts::default(), errors, remote, Vec::new()));
            }
        };

        let pull_candidates: Vec<Task> = match (options.bidirectional_sync, last_sync_at) {
            (true, Some(since)) => remote
                .iter()
                .filter(|t| t.updated_at > since)
                .cloned()
                .collect(),
            _ => Vec::new(),
        };

        let local = if options.auto_score {
            self.score_local(local).await
        } else {
            local
        };

        let plan = self.plan(&local, &remote, &unreadable, options.conflict_resolution);
        let outcomes: Vec<ActionOutcome> = stream::iter(plan.actions)
            .map(|action| self.execute(database_id, action))
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let mut counts = SyncCounts {
            unchanged: plan.unchanged,
            pull_candidates: pull_candidates.len(),
            ..SyncCounts::default()
        };
        let mut created = Vec::new();
        for outcome in outcomes {
            match outcome {
                ActionOutcome::Created { local_id, remote_id } => {
                    counts.created += 1;
                    if let Some(local_id) = local_id {
                        created.push((local_id, remote_id));
                    }
                }
                ActionOutcome::Updated => counts.updated += 1,
                ActionOutcome::Failed(message) => errors.push(message),
            }
        }
        if let Err(e) = self.record_ids(created).await {
            warn!(error = %e, "failed to save id map");
            errors.push(format!("Failed to save id map: {e}"));
        }

        let remote_tasks = if counts.created + counts.updated > 0 {
            match self.store.list_all(database_id, &ListQuery::default()).await {
                Ok(listing) => listing.tasks,
                Err(e) => {
                    warn!(database_id, error = %e, "failed to refresh remote tasks");
                    errors.push(format!("Failed to refresh remote tasks: {e}"));
                    remote
                }
            }
        } else {
            remote
        };

        Ok(self.finish(started_at, counts, errors, remote_tasks, pull_candidates))
    }

    /// Attach scores to local tasks; tasks without a priority take the classified one.
    async fn score_local(&self, tasks: Vec<Task>) -> Vec<Task> {
        let mut scored = Vec::with_capacity(tasks.len());
        for mut task in tasks {
            let evaluation = self.scoring.evaluate(&task).await;
            if task.priority.is_none() {
                task.priority = Some(evaluation.priority);
            }
            task.apply_score(evaluation.scores, evaluation.reason);
            scored.push(task);
        }
        scored
    }

    fn plan(
        &self,
        local: &[Task],
        remote: &[Task],
        unreadable: &HashSet<String>,
        policy: ConflictResolution,
    ) -> Plan {
        let index = RemoteIndex::build(remote);
        let mut claimed = vec![false; remote.len()];
        let mut id_map = self.lock_id_map();
        let mut plan = Plan {
            actions: Vec::new(),
            unchanged: 0,
        };

        for task in local {
            let known = task
                .remote_id
                .as_deref()
                .or_else(|| task.id.as_deref().and_then(|id| id_map.get(id)));
            if let Some(remote_id) = known.filter(|id| unreadable.contains(*id)) {
                debug!(task = %task.title, remote_id, "remote counterpart unreadable, skipping");
                continue;
            }

            let Some(idx) = find_match(task, remote, &index, &claimed, &mut id_map) else {
                plan.actions.push(Action::Create {
                    local_id: task.id.clone(),
                    task: task.clone(),
                });
                continue;
            };
            claimed[idx] = true;
            let counterpart = &remote[idx];

            let fields = diff_fields(task, counterpart);
            let patch = resolve_patch(policy, task, counterpart, &fields);
            if patch.is_empty() {
                if !fields.is_empty() {
                    debug!(task = %task.title, %policy, "remote values kept");
                }
                plan.unchanged += 1;
                continue;
            }

            match counterpart.remote_id.clone() {
                Some(remote_id) => plan.actions.push(Action::Update {
                    title: task.title.clone(),
                    remote_id,
                    patch,
                }),
                None => warn!(task = %task.title, "matched remote task has no id, skipping"),
            }
        }

        plan
    }

    /// Record created ids and persist the map. The file is written after
    /// the lock is released.
    async fn record_ids(&self, created: Vec<(String, String)>) -> Result<(), SyncError> {
        let pending = {
            let mut id_map = self.lock_id_map();
            for (local_id, remote_id) in created {
                id_map.insert(local_id, remote_id);
            }
            id_map.pending_write()?
        };
        let Some(pending) = pending else {
            self.lock_id_map().mark_saved();
            return Ok(());
        };
        pending.write().await?;
        self.lock_id_map().mark_saved();
        Ok(())
    }

    async fn execute(&self, database_id: &str, action: Action) -> ActionOutcome {
        match action {
            Action::Create { local_id, task } => match self.store.create(database_id, &task).await {
                Ok(remote_id) => {
                    debug!(task = %task.title, %remote_id, "created remote task");
                    ActionOutcome::Created { local_id, remote_id }
                }
                Err(e) => {
                    warn!(task = %task.title, error = %e, "failed to create remote task");
                    ActionOutcome::Failed(format!("Failed to create task \"{}\": {e}", task.title))
                }
            },
            Action::Update {
                title,
                remote_id,
                patch,
            } => match self.store.update(&remote_id, &patch).await {
                Ok(true) => {
                    debug!(task = %title, %remote_id, fields = ?patch.touched_fields(), "updated remote task");
                    ActionOutcome::Updated
                }
                Ok(false) => ActionOutcome::Failed(format!(
                    "Update of task \"{title}\" was not acknowledged"
                )),
                Err(e) => {
                    warn!(task = %title, %remote_id, error = %e, "failed to update remote task");
                    ActionOutcome::Failed(format!("Failed to update task \"{title}\": {e}"))
                }
            },
        }
    }

    fn finish(
        &self,
        started_at: DateTime<Utc>,
        counts: SyncCounts,
        errors: Vec<String>,
        remote_tasks: Vec<Task>,
        pull_candidates: Vec<Task>,
    ) -> CycleOutcome {
        let finished_at = self.clock.now();
        let report = sync_report(counts, &errors, started_at, finished_at);
        let result = SyncResult {
            tasks_created: counts.created,
            tasks_updated: counts.updated,
            tasks_deleted: 0,
            success: errors.is_empty(),
            errors,
            report,
            started_at,
            finished_at,
        };

        info!(
            created = result.tasks_created,
            updated = result.tasks_updated,
            unchanged = counts.unchanged,
            errors = result.errors.len(),
            "sync cycle finished"
        );

        CycleOutcome {
            result,
            remote_tasks,
            pull_candidates,
        }
    }
}

/// Find the remote counterpart of a local task.
///
/// Order: the task's own remote id, the id map, then the first unclaimed
/// remote task with the same title. Any match is recorded in the id map.
fn find_match(
    task: &Task,
    remote: &[Task],
    index: &RemoteIndex<'_>,
    claimed: &[bool],
    id_map: &mut IdMap,
) -> Option<usize> {
    let known = task
        .remote_id
        .clone()
        .or_else(|| task.id.as_deref().and_then(|id| id_map.get(id)).map(str::to_string));

    let mut found = None;
    if let Some(remote_id) = known.as_deref() {
        match index.by_id.get(remote_id) {
            Some(&idx) if !claimed[idx] => found = Some(idx),
            Some(_) => warn!(task = %task.title, remote_id, "remote task already claimed this cycle"),
            None => debug!(task = %task.title, remote_id, "known remote task not listed, matching by title"),
        }
    }

    if found.is_none() {
        let candidates = index.by_title.get(task.title.as_str())?;
        if candidates.len() > 1 {
            warn!(
                task = %task.title,
                count = candidates.len(),
                "duplicate remote titles, matching the first unclaimed"
            );
        }
        found = candidates.iter().copied().find(|&idx| !claimed[idx]);
    }

    let idx = found?;
    if let (Some(local_id), Some(remote_id)) = (&task.id, &remote[idx].remote_id) {
        id_map.insert(local_id.clone(), remote_id.clone());
    }
    Some(idx)
}
