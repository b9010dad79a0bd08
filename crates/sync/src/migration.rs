//! One-shot bulk onboarding of tasks into the remote store, and rescoring
//! of tasks already there.

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tasksync_core::{ScoredTask, Task};
use tasksync_scoring::ScoringEngine;
use tasksync_store::{ListQuery, RemoteTaskStore, TaskPatch};

use crate::error::SyncError;
use crate::reconcile::DEFAULT_MAX_CONCURRENCY;
use crate::report::{migration_report, MigrationCounts};

/// Tasks listed in the report ranking by default.
pub const DEFAULT_TOP_N: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationOptions {
    pub database_id: String,
    /// Log intended creations without writing anything.
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

impl MigrationOptions {
    pub fn new(database_id: impl Into<String>) -> Self {
        Self {
            database_id: database_id.into(),
            dry_run: false,
            top_n: DEFAULT_TOP_N,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    pub total_tasks: usize,
    pub successful_migrations: usize,
    pub failed_migrations: usize,
    /// Every task with its evaluation, highest total first.
    pub scored_tasks: Vec<ScoredTask>,
    pub errors: Vec<String>,
    pub report: String,
    pub dry_run: bool,
}

impl MigrationResult {
    fn build(
        title: &str,
        scored_tasks: Vec<ScoredTask>,
        successful: usize,
        errors: Vec<String>,
        dry_run: bool,
        top_n: usize,
    ) -> Self {
        let counts = MigrationCounts {
            total: scored_tasks.len(),
            successful,
            failed: scored_tasks.len().saturating_sub(successful),
            dry_run,
        };
        let report = migration_report(title, counts, &scored_tasks, &errors, top_n);
        Self {
            total_tasks: counts.total,
            successful_migrations: counts.successful,
            failed_migrations: counts.failed,
            scored_tasks,
            errors,
            report,
            dry_run,
        }
    }
}

/// Scores tasks and writes them (or their scores) to the remote store.
pub struct MigrationService {
    store: Arc<dyn RemoteTaskStore>,
    scoring: ScoringEngine,
    max_concurrency: usize,
}

impl MigrationService {
    pub fn new(store: Arc<dyn RemoteTaskStore>, scoring: ScoringEngine) -> Self {
        Self {
            store,
            scoring,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Score `drafts` and create them remotely, highest score first.
    ///
    /// Drafts whose title already exists in the target database are skipped
    /// and counted as migrated, so a rerun after partial failure does not
    /// duplicate rows. A dry run makes no remote calls and counts every
    /// draft as migrated.
    pub async fn migrate_tasks(
        &self,
        drafts: &[Task],
        options: &MigrationOptions,
    ) -> Result<MigrationResult, SyncError> {
        if options.database_id.trim().is_empty() {
            return Err(SyncError::Configuration(
                "target database id is required for migration".into(),
            ));
        }

        let scored = self.scoring.evaluate_all(drafts).await;
        let mut successful = 0;
        let mut errors = Vec::new();

        let mut existing = if options.dry_run {
            HashMap::new()
        } else {
            match self.existing_titles(&options.database_id).await {
                Ok(titles) => titles,
                Err(e) => {
                    warn!(database_id = %options.database_id, error = %e, "failed to list target database");
                    return Ok(MigrationResult::build(
                        "Migration report",
                        scored,
                        0,
                        vec![format!("Failed to list target database: {e}")],
                        false,
                        options.top_n,
                    ));
                }
            }
        };

        for entry in &scored {
            let task = entry.clone().into_scored_task();
            if let Some(remaining) = existing.get_mut(task.title.as_str()).filter(|n| **n > 0) {
                *remaining -= 1;
                info!(task = %task.title, "already in target database, skipping");
                successful += 1;
                continue;
            }
            if options.dry_run {
                info!(
                    task = %task.title,
                    score = entry.total(),
                    priority = %entry.priority,
                    "[dry run] would create task"
                );
                successful += 1;
                continue;
            }

            match self.store.create(&options.database_id, &task).await {
                Ok(remote_id) => {
                    info!(task = %task.title, %remote_id, score = entry.total(), "migrated task");
                    successful += 1;
                }
                Err(e) => {
                    warn!(task = %task.title, error = %e, "failed to migrate task");
                    errors.push(format!("Failed to migrate task \"{}\": {e}", task.title));
                }
            }
        }

        let result = MigrationResult::build(
            "Migration report",
            scored,
            successful,
            errors,
            options.dry_run,
            options.top_n,
        );
        info!(
            total = result.total_tasks,
            successful = result.successful_migrations,
            failed = result.failed_migrations,
            dry_run = options.dry_run,
            "migration finished"
        );
        Ok(result)
    }

    /// Remote titles in `database_id` with their row counts.
    async fn existing_titles(&self, database_id: &str) -> Result<HashMap<String, usize>, SyncError> {
        let listing = self.store.list_all(database_id, &ListQuery::default()).await?;
        let mut titles = HashMap::new();
        for task in listing.tasks {
            *titles.entry(task.title).or_insert(0) += 1;
        }
        Ok(titles)
    }

    /// Rescore every task in a remote database, writing only score,
    /// priority and reason. Tasks whose evaluation is unchanged are skipped.
    pub async fn update_tasks_with_scores(
        &self,
        database_id: &str,
    ) -> Result<MigrationResult, SyncError> {
        if database_id.trim().is_empty() {
            return Err(SyncError::Configuration(
                "database id is required for rescoring".into(),
            ));
        }

        let listing = match self.store.list_all(database_id, &ListQuery::default()).await {
            Ok(listing) => listing,
            Err(e) => {
                warn!(database_id, error = %e, "failed to list tasks for rescoring");
                return Ok(MigrationResult::build(
                    "Rescore report",
                    Vec::new(),
                    0,
                    vec![format!("Failed to list remote tasks: {e}")],
                    false,
                    DEFAULT_TOP_N,
                ));
            }
        };

        let scored = self.scoring.evaluate_all(&listing.tasks).await;
        let outcomes: Vec<Result<(), String>> = stream::iter(scored.iter())
            .map(|entry| self.write_scores(entry))
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let mut errors: Vec<String> = outcomes.into_iter().filter_map(Result::err).collect();
        let successful = scored.len() - errors.len();
        errors.extend(listing.rejected.iter().map(|row| {
            format!("Skipped unreadable remote task {}: {}", row.remote_id, row.reason)
        }));
        let result = MigrationResult::build(
            "Rescore report",
            scored,
            successful,
            errors,
            false,
            DEFAULT_TOP_N,
        );
        info!(
            database_id,
            total = result.total_tasks,
            failed = result.failed_migrations,
            "rescoring finished"
        );
        Ok(result)
    }

    async fn write_scores(&self, entry: &ScoredTask) -> Result<(), String> {
        let task = &entry.task;
        let unchanged = task.priority == Some(entry.priority)
            && task.rubric_scores == Some(entry.scores)
            && task.priority_reason.as_deref() == Some(entry.reason.as_str());
        if unchanged {
            return Ok(());
        }

        let Some(remote_id) = task.remote_id.as_deref() else {
            return Err(format!("Task \"{}\" has no remote id", task.title));
        };
        let patch = TaskPatch::scores(entry.scores, entry.priority, entry.reason.clone());
        match self.store.update(remote_id, &patch).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(format!("Rescore of task \"{}\" was not acknowledged", task.title)),
            Err(e) => {
                warn!(task = %task.title, remote_id, error = %e, "failed to write scores");
                Err(format!("Failed to rescore task \"{}\": {e}", task.title))
            }
        }
    }
}
