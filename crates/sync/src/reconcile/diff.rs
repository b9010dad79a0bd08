//! Field-level comparison of a local task against its remote counterpart.

use std::fmt;

use serde::{Deserialize, Serialize};

use tasksync_core::{canonical_tags, Task};

/// Fields reconciliation compares and may overwrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchedField {
    Status,
    Priority,
    Description,
    DueDate,
    EstimatedHours,
    Tags,
}

impl WatchedField {
    pub const ALL: [WatchedField; 6] = [
        WatchedField::Status,
        WatchedField::Priority,
        WatchedField::Description,
        WatchedField::DueDate,
        WatchedField::EstimatedHours,
        WatchedField::Tags,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WatchedField::Status => "status",
            WatchedField::Priority => "priority",
            WatchedField::Description => "description",
            WatchedField::DueDate => "due_date",
            WatchedField::EstimatedHours => "estimated_hours",
            WatchedField::Tags => "tags",
        }
    }

    /// Whether `local` and `remote` disagree on this field.
    pub fn differs(&self, local: &Task, remote: &Task) -> bool {
        match self {
            WatchedField::Status => local.status != remote.status,
            WatchedField::Priority => local.priority != remote.priority,
            WatchedField::Description => local.description != remote.description,
            WatchedField::DueDate => local.due_date != remote.due_date,
            WatchedField::EstimatedHours => local.estimated_hours != remote.estimated_hours,
            WatchedField::Tags => canonical_tags(&local.tags) != canonical_tags(&remote.tags),
        }
    }
}

impl fmt::Display for WatchedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Watched fields on which the two tasks differ, in declaration order.
pub fn diff_fields(local: &Task, remote: &Task) -> Vec<WatchedField> {
    WatchedField::ALL
        .into_iter()
        .filter(|field| field.differs(local, remote))
        .collect()
}
