//! Post-cycle listeners.
//!
//! Every registered listener receives the cycle's result, the final remote
//! task list and any pull-back candidates. A listener that errors or panics
//! is logged and skipped; the rest are still notified.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{info, warn};

use tasksync_core::Task;

use crate::error::ListenerError;
use crate::status::SyncResult;

/// What listeners see after a cycle.
#[derive(Debug, Clone)]
pub struct SyncEvent {
    pub result: SyncResult,
    pub remote_tasks: Vec<Task>,
    /// Remote tasks edited since the previous cycle (bidirectional sync only).
    /// Applying them locally is the listener's business.
    pub pull_candidates: Vec<Task>,
}

#[async_trait]
pub trait SyncListener: Send + Sync {
    fn name(&self) -> &str;

    async fn on_sync(&self, event: &SyncEvent) -> Result<(), ListenerError>;
}

/// Delivery counts for one notification round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifyReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Notify each listener in order, isolating failures.
pub async fn notify_all(listeners: &[Arc<dyn SyncListener>], event: &SyncEvent) -> NotifyReport {
    let mut report = NotifyReport::default();

    for listener in listeners {
        let outcome = AssertUnwindSafe(listener.on_sync(event)).catch_unwind().await;
        let error = match outcome {
            Ok(Ok(())) => {
                report.delivered += 1;
                continue;
            }
            Ok(Err(e)) => e,
            Err(_) => ListenerError::Panicked,
        };
        report.failed += 1;
        warn!(listener = listener.name(), error = %error, "sync listener failed");
    }

    report
}

/// Logs a cycle summary and each pull-back candidate.
#[derive(Debug, Default)]
pub struct LoggingListener;

#[async_trait]
impl SyncListener for LoggingListener {
    fn name(&self) -> &str {
        "logging"
    }

    async fn on_sync(&self, event: &SyncEvent) -> Result<(), ListenerError> {
        info!(
            remote_tasks = event.remote_tasks.len(),
            pull_candidates = event.pull_candidates.len(),
            success = event.result.success,
            "sync cycle observed"
        );
        for task in &event.pull_candidates {
            info!(
                remote_id = task.remote_id.as_deref().unwrap_or("-"),
                title = %task.title,
                updated_at = %task.updated_at,
                "remote task changed since last sync"
            );
        }
        Ok(())
    }
}
