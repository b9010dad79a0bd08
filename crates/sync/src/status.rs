//! Per-cycle results and the cumulative scheduler status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Output of one reconciliation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    pub tasks_created: usize,
    pub tasks_updated: usize,
    /// Always 0: deletion is not propagated.
    pub tasks_deleted: usize,
    pub errors: Vec<String>,
    pub report: String,
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Lifecycle phase of the reconciliation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    #[default]
    Idle,
    Syncing,
    Error,
}

/// Counts from the most recent cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub tasks_created: usize,
    pub tasks_updated: usize,
    pub tasks_deleted: usize,
    pub error_count: usize,
    pub success: bool,
}

impl From<&SyncResult> for CycleSummary {
    fn from(result: &SyncResult) -> Self {
        Self {
            tasks_created: result.tasks_created,
            tasks_updated: result.tasks_updated,
            tasks_deleted: result.tasks_deleted,
            error_count: result.errors.len(),
            success: result.success,
        }
    }
}

/// Scheduler-owned status, updated as a whole at the end of every cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub is_active: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub next_sync_at: Option<DateTime<Utc>>,
    pub sync_interval_minutes: u64,
    pub successful_syncs: u64,
    pub failed_syncs: u64,
    /// Errors of the last completed cycle.
    pub errors: Vec<String>,
    pub phase: SyncPhase,
    pub last_result: Option<CycleSummary>,
}

impl SyncStatus {
    pub fn new(sync_interval_minutes: u64) -> Self {
        Self {
            is_active: false,
            last_sync_at: None,
            next_sync_at: None,
            sync_interval_minutes,
            successful_syncs: 0,
            failed_syncs: 0,
            errors: Vec::new(),
            phase: SyncPhase::Idle,
            last_result: None,
        }
    }

    /// Fold a finished cycle into the status.
    pub(crate) fn record(&mut self, result: &SyncResult, interval: chrono::Duration) {
        let now = result.finished_at;
        if result.success {
            self.successful_syncs += 1;
            self.phase = SyncPhase::Idle;
        } else {
            self.failed_syncs += 1;
            self.phase = SyncPhase::Error;
        }
        self.last_sync_at = Some(now);
        self.next_sync_at = now.checked_add_signed(interval);
        self.errors = result.errors.clone();
        self.last_result = Some(CycleSummary::from(result));
    }

    /// Zero the counters and history, keeping the timer state.
    pub(crate) fn reset(&mut self) {
        *self = Self {
            is_active: self.is_active,
            next_sync_at: self.next_sync_at,
            sync_interval_minutes: self.sync_interval_minutes,
            ..Self::new(self.sync_interval_minutes)
        };
    }
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self::new(crate::options::DEFAULT_INTERVAL_MINUTES)
    }
}
