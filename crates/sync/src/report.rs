//! Human-readable reports for sync cycles and migrations.

use std::fmt::Write;

use chrono::{DateTime, Utc};

use tasksync_core::ScoredTask;

/// Counts a sync report is built from.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncCounts {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub pull_candidates: usize,
}

pub fn sync_report(
    counts: SyncCounts,
    errors: &[String],
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    let elapsed_ms = (finished_at - started_at).num_milliseconds().max(0);
    let outcome = if errors.is_empty() {
        "success"
    } else {
        "completed with errors"
    };

    let _ = writeln!(out, "Sync report ({})", finished_at.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out, "  Outcome:          {outcome}");
    let _ = writeln!(out, "  Created:          {}", counts.created);
    let _ = writeln!(out, "  Updated:          {}", counts.updated);
    let _ = writeln!(out, "  Deleted:          {}", counts.deleted);
    let _ = writeln!(out, "  Unchanged:        {}", counts.unchanged);
    let _ = writeln!(out, "  Pull candidates:  {}", counts.pull_candidates);
    let _ = writeln!(out, "  Errors:           {}", errors.len());
    let _ = writeln!(out, "  Duration:         {elapsed_ms} ms");
    if !errors.is_empty() {
        let _ = writeln!(out, "Errors:");
        for e in errors {
            let _ = writeln!(out, "  - {e}");
        }
    }
    out
}

/// Counts a migration report is built from.
#[derive(Debug, Clone, Copy, Default)]
pub struct MigrationCounts {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub dry_run: bool,
}

impl MigrationCounts {
    /// Percentage of successful migrations, 0 when there was nothing to migrate.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.successful as f64 / self.total as f64 * 100.0
    }
}

pub fn migration_report(
    title: &str,
    counts: MigrationCounts,
    scored: &[ScoredTask],
    errors: &[String],
    top_n: usize,
) -> String {
    let mut out = String::new();
    let mode = if counts.dry_run { " [dry run]" } else { "" };

    let _ = writeln!(out, "{title}{mode}");
    let _ = writeln!(out, "  Total tasks:   {}", counts.total);
    let _ = writeln!(out, "  Successful:    {}", counts.successful);
    let _ = writeln!(out, "  Failed:        {}", counts.failed);
    let _ = writeln!(out, "  Success rate:  {:.1}%", counts.success_rate());

    if !scored.is_empty() && top_n > 0 {
        let _ = writeln!(out, "Top {} by score:", top_n.min(scored.len()));
        for (rank, task) in scored.iter().take(top_n).enumerate() {
            let _ = writeln!(
                out,
                "  {}. [{:>5.2}] {:<7} {} ({})",
                rank + 1,
                task.total(),
                task.priority,
                task.task.title,
                task.reason
            );
        }
    }

    if !errors.is_empty() {
        let _ = writeln!(out, "Errors:");
        for e in errors {
            let _ = writeln!(out, "  - {e}");
        }
    }

    let _ = writeln!(out, "Next steps:");
    if counts.dry_run {
        let _ = writeln!(out, "  - Review the ranking above, then rerun without --dry-run to create the tasks.");
    } else if counts.failed > 0 {
        let _ = writeln!(out, "  - Fix the errors above and rerun; drafts whose title is already in the database are skipped, not duplicated.");
    } else {
        let _ = writeln!(out, "  - Start the scheduler to keep local and remote tasks reconciled.");
    }
    let _ = writeln!(out, "  - Work the highest-scoring tasks first; rescore periodically as due dates approach.");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasksync_core::{RubricScores, ScoreSource, Task, TaskPriority};

    #[test]
    fn sync_report_lists_errors() {
        let now = Utc::now();
        let report = sync_report(
            SyncCounts {
                created: 2,
                ..Default::default()
            },
            &["create 'x' failed".to_string()],
            now,
            now,
        );
        assert!(report.contains("Created:          2"));
        assert!(report.contains("completed with errors"));
        assert!(report.contains("- create 'x' failed"));
    }

    #[test]
    fn migration_report_ranks_top_tasks() {
        let scored: Vec<ScoredTask> = ["first", "second", "third"]
            .iter()
            .map(|title| ScoredTask {
                task: Task::draft(*title, Utc::now()),
                scores: RubricScores::new(5.0, 5.0, 5.0, 3.0),
                priority: TaskPriority::Medium,
                reason: "Score: 4.8/10".into(),
                source: ScoreSource::Deterministic,
            })
            .collect();
        let counts = MigrationCounts {
            total: 3,
            successful: 3,
            failed: 0,
            dry_run: true,
        };

        let report = migration_report("Migration report", counts, &scored, &[], 2);
        assert!(report.contains("[dry run]"));
        assert!(report.contains("Success rate:  100.0%"));
        assert!(report.contains("Top 2 by score:"));
        assert!(report.contains("1. [ 4.80] medium  first"));
        assert!(!report.contains("third"));
    }

    #[test]
    fn success_rate_of_nothing_is_zero() {
        assert_eq!(MigrationCounts::default().success_rate(), 0.0);
    }
}
