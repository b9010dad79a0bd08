//! In-process [`RemoteTaskStore`] used by tests and offline runs.
//!
//! Rows round-trip through the property schema on every write, so the
//! memory store rejects the same malformed tasks the remote one would.
//! Seeded rows that would not decode are listed as rejected.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use tasksync_core::{SharedClock, Task};

use crate::error::StoreError;
use crate::patch::TaskPatch;
use crate::query::{ListQuery, RejectedRow, TaskPage};
use crate::schema::{task_from_properties, task_to_properties};
use crate::traits::RemoteTaskStore;

/// Number of calls observed per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list: usize,
    pub create: usize,
    pub update: usize,
}

#[derive(Default)]
struct Counters {
    list: AtomicUsize,
    create: AtomicUsize,
    update: AtomicUsize,
}

/// A remote store held entirely in memory.
pub struct MemoryStore {
    /// database id → rows in insertion order.
    databases: Mutex<HashMap<String, Vec<Task>>>,
    clock: SharedClock,
    next_id: AtomicUsize,
    counters: Counters,
    failing_titles: Mutex<HashSet<String>>,
    fail_list: AtomicBool,
}

impl MemoryStore {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            databases: Mutex::new(HashMap::new()),
            clock,
            next_id: AtomicUsize::new(1),
            counters: Counters::default(),
            failing_titles: Mutex::new(HashSet::new()),
            fail_list: AtomicBool::new(false),
        }
    }

    fn databases(&self) -> MutexGuard<'_, HashMap<String, Vec<Task>>> {
        self.databases.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn allocate_id(&self) -> String {
        format!("mem-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Seed a row directly, keeping its timestamps. Returns the remote id.
    pub fn insert(&self, database_id: &str, mut task: Task) -> String {
        let id = task.remote_id.clone().unwrap_or_else(|| self.allocate_id());
        task.id = None;
        task.remote_id = Some(id.clone());
        self.databases()
            .entry(database_id.to_string())
            .or_default()
            .push(task);
        id
    }

    /// Snapshot of a row by remote id.
    pub fn get(&self, remote_id: &str) -> Option<Task> {
        self.databases()
            .values()
            .flat_map(|rows| rows.iter())
            .find(|t| t.remote_id.as_deref() == Some(remote_id))
            .cloned()
    }

    /// Snapshot of every row in a database.
    pub fn tasks(&self, database_id: &str) -> Vec<Task> {
        self.databases()
            .get(database_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Make create/update calls for tasks with this title fail.
    pub fn fail_on_title(&self, title: &str) {
        self.failing_titles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(title.to_string());
    }

    /// Make list calls fail.
    pub fn set_fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            list: self.counters.list.load(Ordering::SeqCst),
            create: self.counters.create.load(Ordering::SeqCst),
            update: self.counters.update.load(Ordering::SeqCst),
        }
    }

    fn is_failing(&self, title: &str) -> bool {
        self.failing_titles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(title)
    }
}

#[async_trait]
impl RemoteTaskStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list(&self, database_id: &str, query: &ListQuery) -> Result<TaskPage, StoreError> {
        self.counters.list.fetch_add(1, Ordering::SeqCst);
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected(format!("list of '{database_id}' failed")));
        }

        let rows = self.tasks(database_id);
        let offset = match &query.cursor {
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|_| StoreError::Parse(format!("bad cursor '{cursor}'")))?,
            None => 0,
        };
        let size = query.resolved_page_size() as usize;
        let end = (offset + size).min(rows.len());
        let next_cursor = (end < rows.len()).then(|| end.to_string());

        let mut page = TaskPage {
            next_cursor,
            ..TaskPage::default()
        };
        for row in rows.get(offset..end).unwrap_or_default() {
            match row.validate() {
                Ok(()) => page.tasks.push(row.clone()),
                Err(e) => page.rejected.push(RejectedRow {
                    remote_id: row.remote_id.clone().unwrap_or_default(),
                    reason: e.to_string(),
                }),
            }
        }
        Ok(page)
    }

    async fn create(&self, database_id: &str, task: &Task) -> Result<String, StoreError> {
        self.counters.create.fetch_add(1, Ordering::SeqCst);
        if self.is_failing(&task.title) {
            return Err(StoreError::Rejected(format!("create '{}' failed", task.title)));
        }

        let id = self.allocate_id();
        let now = self.clock.now();
        let row = task_from_properties(&id, &task_to_properties(task), now, now)?;
        self.databases()
            .entry(database_id.to_string())
            .or_default()
            .push(row);
        debug!(database_id, remote_id = %id, title = %task.title, "memory store created task");
        Ok(id)
    }

    async fn update(&self, remote_id: &str, patch: &TaskPatch) -> Result<bool, StoreError> {
        self.counters.update.fetch_add(1, Ordering::SeqCst);
        let now = self.clock.now();

        let mut databases = self.databases();
        let row = databases
            .values_mut()
            .flat_map(|rows| rows.iter_mut())
            .find(|t| t.remote_id.as_deref() == Some(remote_id))
            .ok_or_else(|| StoreError::NotFound(remote_id.to_string()))?;

        if self.is_failing(&row.title) {
            return Err(StoreError::Rejected(format!("update '{}' failed", row.title)));
        }

        patch.apply_to(row);
        row.updated_at = now;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use tasksync_core::{SystemClock, TaskStatus};


    fn store() -> MemoryStore {
        MemoryStore::new(Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn create_then_list() {
        let store = store();
        let id = store
            .create("db", &Task::draft("Write tests", Utc::now()).with_id("local-7"))
            .await
            .unwrap();

        let page = store.list("db", &ListQuery::default()).await.unwrap();
        assert_eq!(page.tasks.len(), 1);
        assert_eq!(page.tasks[0].remote_id.as_deref(), Some(id.as_str()));
        assert_eq!(page.tasks[0].id, None);
        assert!(page.next_cursor.is_none());
        assert_eq!(store.calls(), CallCounts { list: 1, create: 1, update: 0 });
    }

    #[tokio::test]
    async fn create_rejects_empty_title() {
        let store = store();
        let err = store.create("db", &Task::draft("", Utc::now())).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidProperty { .. }));
        assert!(store.tasks("db").is_empty());
    }

    #[tokio::test]
    async fn list_all_follows_cursors() {
        let store = store();
        for i in 0..7 {
            store.insert("db", Task::draft(format!("task {i}"), Utc::now()));
        }

        let query = ListQuery::default().with_page_size(3);
        let first = store.list("db", &query).await.unwrap();
        assert_eq!(first.tasks.len(), 3);
        assert_eq!(first.tasks[0].title, "task 0");
        assert_eq!(first.next_cursor.as_deref(), Some("3"));

        let all = store.list_all("db", &query).await.unwrap();
        assert_eq!(all.tasks.len(), 7);
        assert!(all.next_cursor.is_none());
        assert_eq!(store.calls().list, 4);
    }

    #[tokio::test]
    async fn seeded_invalid_row_is_rejected() {
        let store = store();
        store.insert("db", Task::draft("a", Utc::now()));
        let bad = store.insert("db", Task::draft("  ", Utc::now()));

        let page = store.list("db", &ListQuery::default()).await.unwrap();
        assert_eq!(page.tasks.len(), 1);
        assert_eq!(page.rejected.len(), 1);
        assert_eq!(page.rejected[0].remote_id, bad);
    }

    #[tokio::test]
    async fn update_patches_and_bumps_timestamp() {
        let store = store();
        let mut seeded = Task::draft("a", Utc::now());
        seeded.updated_at = Utc::now() - chrono::Duration::days(2);
        let id = store.insert("db", seeded.clone());

        let patch = TaskPatch {
            status: Some(TaskStatus::Review),
            ..TaskPatch::default()
        };
        assert!(store.update(&id, &patch).await.unwrap());

        let row = store.get(&id).unwrap();
        assert_eq!(row.status, TaskStatus::Review);
        assert!(row.updated_at > seeded.updated_at);

        let missing = store.update("nope", &patch).await.unwrap_err();
        assert!(matches!(missing, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn injected_failures() {
        let store = store();
        store.fail_on_title("flaky");
        assert!(store.create("db", &Task::draft("flaky", Utc::now())).await.is_err());

        store.set_fail_list(true);
        assert!(store.list("db", &ListQuery::default()).await.is_err());
    }
}
