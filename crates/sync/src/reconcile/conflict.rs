//! Turning a field diff into an outbound patch under a conflict policy.

use tasksync_core::Task;
use tasksync_store::TaskPatch;

use super::diff::WatchedField;
use crate::options::ConflictResolution;

/// Patch for the remote task given the differing `fields`.
///
/// An empty patch means nothing should be written.
pub fn resolve_patch(
    policy: ConflictResolution,
    local: &Task,
    remote: &Task,
    fields: &[WatchedField],
) -> TaskPatch {
    match policy {
        ConflictResolution::LocalWins => local_values(local, fields),
        ConflictResolution::RemoteWins => TaskPatch::default(),
        // Ties go to the remote side.
        ConflictResolution::Merge if local.updated_at > remote.updated_at => {
            local_values(local, fields)
        }
        ConflictResolution::Merge => TaskPatch::default(),
    }
}

fn local_values(local: &Task, fields: &[WatchedField]) -> TaskPatch {
    let mut patch = TaskPatch::default();
    for field in fields {
        match field {
            WatchedField::Status => patch.status = Some(local.status),
            WatchedField::Priority => patch.priority = Some(local.priority),
            WatchedField::Description => patch.description = Some(local.description.clone()),
            WatchedField::DueDate => patch.due_date = Some(local.due_date),
            WatchedField::EstimatedHours => patch.estimated_hours = Some(local.estimated_hours),
            WatchedField::Tags => patch.tags = Some(local.tags.clone()),
        }
    }
    patch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::diff::diff_fields;
    use chrono::{Duration, Utc};
    use tasksync_core::{TaskPriority, TaskStatus};

    fn pair(local_newer: bool) -> (Task, Task) {
        let now = Utc::now();
        let mut local = Task::draft("a", now)
            .with_status(TaskStatus::Review)
            .with_priority(TaskPriority::Urgent);
        let mut remote = Task::draft("a", now).with_tags(["stale"]);
        if local_newer {
            local.updated_at = now + Duration::minutes(5);
        } else {
            remote.updated_at = now + Duration::minutes(5);
        }
        (local, remote)
    }

    #[test]
    fn local_wins_overwrites_every_difference() {
        let (local, mut remote) = pair(false);
        let fields = diff_fields(&local, &remote);
        let patch = resolve_patch(ConflictResolution::LocalWins, &local, &remote, &fields);

        patch.apply_to(&mut remote);
        assert!(diff_fields(&local, &remote).is_empty());
    }

    #[test]
    fn remote_wins_is_a_noop() {
        let (local, remote) = pair(true);
        let fields = diff_fields(&local, &remote);
        assert!(resolve_patch(ConflictResolution::RemoteWins, &local, &remote, &fields).is_empty());
    }

    #[test]
    fn merge_follows_newer_side() {
        let (local, remote) = pair(true);
        let fields = diff_fields(&local, &remote);
        let patch = resolve_patch(ConflictResolution::Merge, &local, &remote, &fields);
        assert_eq!(patch.status, Some(TaskStatus::Review));
        assert_eq!(patch.priority, Some(Some(TaskPriority::Urgent)));
        assert_eq!(patch.tags, Some(vec![]));
        assert!(patch.description.is_none());

        let (local, remote) = pair(false);
        let fields = diff_fields(&local, &remote);
        assert!(resolve_patch(ConflictResolution::Merge, &local, &remote, &fields).is_empty());
    }

    #[test]
    fn merge_tie_keeps_remote() {
        let now = Utc::now();
        let local = Task::draft("a", now).with_status(TaskStatus::Done);
        let remote = Task::draft("a", now);
        let fields = diff_fields(&local, &remote);
        assert!(resolve_patch(ConflictResolution::Merge, &local, &remote, &fields).is_empty());
    }
}
