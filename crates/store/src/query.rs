//! List queries and cursor paging.

use serde::{Deserialize, Serialize};

use tasksync_core::Task;

/// Maximum rows a single list call may return.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Parameters of a single list call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    /// Opaque continuation token from a previous [`TaskPage`].
    pub cursor: Option<String>,
    pub page_size: Option<u32>,
}

impl ListQuery {
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Effective page size, clamped to `1..=MAX_PAGE_SIZE`.
    pub fn resolved_page_size(&self) -> u32 {
        self.page_size.unwrap_or(MAX_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }
}

/// A remote row that could not be decoded into a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedRow {
    pub remote_id: String,
    pub reason: String,
}

/// One page of list results, or every page merged by
/// [`RemoteTaskStore::list_all`](crate::RemoteTaskStore::list_all).
///
/// Unreadable rows are reported in `rejected` instead of failing the page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPage {
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub rejected: Vec<RejectedRow>,
    /// Present when more rows are available.
    pub next_cursor: Option<String>,
}
