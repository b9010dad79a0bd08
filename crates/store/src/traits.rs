//! Remote task store trait.

use async_trait::async_trait;
use tracing::warn;

use tasksync_core::Task;

use crate::error::StoreError;
use crate::patch::TaskPatch;
use crate::query::{ListQuery, TaskPage};

/// Upper bound on pages fetched by [`RemoteTaskStore::list_all`].
const MAX_PAGES: usize = 1_000;

/// Trait for remote workspace task stores.
///
/// Every call returns `Result<_, StoreError>`; callers treat an `Err` as a
/// recoverable per-item failure. A row that cannot be decoded is reported
/// in [`TaskPage::rejected`] rather than failing the whole list. Timeouts
/// are the implementation's concern.
#[async_trait]
pub trait RemoteTaskStore: Send + Sync {
    /// Human-readable backend name (e.g., "notion", "memory").
    fn name(&self) -> &str;

    /// Fetch one page of tasks from a database.
    async fn list(&self, database_id: &str, query: &ListQuery) -> Result<TaskPage, StoreError>;

    /// Create a task and return its remote id.
    async fn create(&self, database_id: &str, task: &Task) -> Result<String, StoreError>;

    /// Apply a partial update. Returns whether the store acknowledged it.
    async fn update(&self, remote_id: &str, patch: &TaskPatch) -> Result<bool, StoreError>;

    /// Fetch every page, following cursors until exhausted. The returned
    /// page holds every decoded task and every rejected row.
    async fn list_all(&self, database_id: &str, query: &ListQuery) -> Result<TaskPage, StoreError> {
        let mut query = query.clone();
        query.cursor = None;
        let mut all = TaskPage::default();

        for _ in 0..MAX_PAGES {
            let page = self.list(database_id, &query).await?;
            all.tasks.extend(page.tasks);
            all.rejected.extend(page.rejected);
            match page.next_cursor {
                Some(next) if query.cursor.as_deref() != Some(next.as_str()) => {
                    query.cursor = Some(next);
                }
                Some(_) => {
                    warn!(database_id, store = self.name(), "cursor did not advance, stopping");
                    break;
                }
                None => return Ok(all),
            }
        }

        Ok(all)
    }
}
