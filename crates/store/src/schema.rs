//! Task ↔ property mapping for the remote tasks database.
//!
//! Decoding validates property kinds and select option names at the store
//! boundary so the rest of the system only ever sees well-formed [`Task`]s.

use chrono::{DateTime, Utc};

use tasksync_core::{RubricScores, Task, TaskPriority, TaskStatus};

use crate::error::StoreError;
use crate::patch::TaskPatch;
use crate::property::{PropertyKind, PropertyMap, PropertyValue};

pub const NAME: &str = "Name";
pub const DESCRIPTION: &str = "Description";
pub const STATUS: &str = "Status";
pub const PRIORITY: &str = "Priority";
pub const DUE_DATE: &str = "Due Date";
pub const ESTIMATED_HOURS: &str = "Estimated Hours";
pub const ACTUAL_HOURS: &str = "Actual Hours";
pub const TAGS: &str = "Tags";
pub const PROJECT: &str = "Project";
pub const URGENCY: &str = "Urgency";
pub const IMPACT: &str = "Impact";
pub const EFFORT: &str = "Effort";
pub const DEPENDENCIES: &str = "Dependencies";
pub const SCORE: &str = "Score";
pub const PRIORITY_REASON: &str = "Priority Reason";

/// Expected kind of every known column.
pub const COLUMNS: &[(&str, PropertyKind)] = &[
    (NAME, PropertyKind::Title),
    (DESCRIPTION, PropertyKind::RichText),
    (STATUS, PropertyKind::Select),
    (PRIORITY, PropertyKind::Select),
    (DUE_DATE, PropertyKind::Date),
    (ESTIMATED_HOURS, PropertyKind::Number),
    (ACTUAL_HOURS, PropertyKind::Number),
    (TAGS, PropertyKind::MultiSelect),
    (PROJECT, PropertyKind::Relation),
    (URGENCY, PropertyKind::Number),
    (IMPACT, PropertyKind::Number),
    (EFFORT, PropertyKind::Number),
    (DEPENDENCIES, PropertyKind::Number),
    (SCORE, PropertyKind::Number),
    (PRIORITY_REASON, PropertyKind::RichText),
];

pub fn expected_kind(property: &str) -> Option<PropertyKind> {
    COLUMNS
        .iter()
        .find(|(name, _)| *name == property)
        .map(|(_, kind)| *kind)
}

// ── Select option labels ──────────────────────────────────────

pub fn status_label(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Todo => "To Do",
        TaskStatus::InProgress => "In Progress",
        TaskStatus::Review => "Review",
        TaskStatus::Done => "Done",
        TaskStatus::Blocked => "Blocked",
    }
}

pub fn parse_status_label(label: &str) -> Option<TaskStatus> {
    TaskStatus::ALL
        .into_iter()
        .find(|s| status_label(*s).eq_ignore_ascii_case(label))
}

pub fn priority_label(priority: TaskPriority) -> &'static str {
    match priority {
        TaskPriority::Low => "Low",
        TaskPriority::Medium => "Medium",
        TaskPriority::High => "High",
        TaskPriority::Urgent => "Urgent",
    }
}

pub fn parse_priority_label(label: &str) -> Option<TaskPriority> {
    TaskPriority::ALL
        .into_iter()
        .find(|p| priority_label(*p).eq_ignore_ascii_case(label))
}

// ── Encoding ──────────────────────────────────────────────────

fn insert_scores(props: &mut PropertyMap, scores: &RubricScores) {
    props.insert(URGENCY.into(), PropertyValue::Number(Some(scores.urgency())));
    props.insert(IMPACT.into(), PropertyValue::Number(Some(scores.impact())));
    props.insert(EFFORT.into(), PropertyValue::Number(Some(scores.effort())));
    props.insert(
        DEPENDENCIES.into(),
        PropertyValue::Number(Some(scores.dependencies())),
    );
    props.insert(SCORE.into(), PropertyValue::Number(Some(scores.total())));
}

/// Properties for creating a remote row from a task.
pub fn task_to_properties(task: &Task) -> PropertyMap {
    let mut props = PropertyMap::new();
    props.insert(NAME.into(), PropertyValue::Title(task.title.clone()));
    props.insert(
        DESCRIPTION.into(),
        PropertyValue::RichText(task.description.clone()),
    );
    props.insert(
        STATUS.into(),
        PropertyValue::Select(Some(status_label(task.status).to_string())),
    );
    props.insert(
        PRIORITY.into(),
        PropertyValue::Select(task.priority.map(|p| priority_label(p).to_string())),
    );
    props.insert(DUE_DATE.into(), PropertyValue::Date(task.due_date));
    props.insert(
        ESTIMATED_HOURS.into(),
        PropertyValue::Number(task.estimated_hours),
    );
    props.insert(ACTUAL_HOURS.into(), PropertyValue::Number(task.actual_hours));
    props.insert(TAGS.into(), PropertyValue::MultiSelect(task.tags.clone()));
    if let Some(project) = &task.project_id {
        props.insert(PROJECT.into(), PropertyValue::Relation(vec![project.clone()]));
    }
    if let Some(scores) = &task.rubric_scores {
        insert_scores(&mut props, scores);
    }
    if let Some(reason) = &task.priority_reason {
        props.insert(PRIORITY_REASON.into(), PropertyValue::RichText(reason.clone()));
    }
    props
}

/// Properties written by a partial update.
pub fn patch_to_properties(patch: &TaskPatch) -> PropertyMap {
    let mut props = PropertyMap::new();
    if let Some(status) = patch.status {
        props.insert(
            STATUS.into(),
            PropertyValue::Select(Some(status_label(status).to_string())),
        );
    }
    if let Some(priority) = patch.priority {
        props.insert(
            PRIORITY.into(),
            PropertyValue::Select(priority.map(|p| priority_label(p).to_string())),
        );
    }
    if let Some(description) = &patch.description {
        props.insert(DESCRIPTION.into(), PropertyValue::RichText(description.clone()));
    }
    if let Some(due) = patch.due_date {
        props.insert(DUE_DATE.into(), PropertyValue::Date(due));
    }
    if let Some(hours) = patch.estimated_hours {
        props.insert(ESTIMATED_HOURS.into(), PropertyValue::Number(hours));
    }
    if let Some(tags) = &patch.tags {
        props.insert(TAGS.into(), PropertyValue::MultiSelect(tags.clone()));
    }
    if let Some(scores) = &patch.rubric_scores {
        insert_scores(&mut props, scores);
    }
    if let Some(reason) = &patch.priority_reason {
        props.insert(PRIORITY_REASON.into(), PropertyValue::RichText(reason.clone()));
    }
    props
}

// ── Decoding ──────────────────────────────────────────────────

/// Check every known property carries its expected kind. Unknown columns are ignored.
pub fn validate_properties(props: &PropertyMap) -> Result<(), StoreError> {
    for (name, value) in props {
        if let Some(expected) = expected_kind(name) {
            if value.kind() != expected {
                return Err(StoreError::invalid(
                    name,
                    format!("expected {expected}, found {}", value.kind()),
                ));
            }
        }
    }
    Ok(())
}

fn number(props: &PropertyMap, name: &str) -> Option<f64> {
    match props.get(name) {
        Some(PropertyValue::Number(n)) => *n,
        _ => None,
    }
}

fn text(props: &PropertyMap, name: &str) -> Option<String> {
    match props.get(name) {
        Some(PropertyValue::RichText(s)) | Some(PropertyValue::Title(s)) => Some(s.clone()),
        _ => None,
    }
}

fn select(props: &PropertyMap, name: &str) -> Option<String> {
    match props.get(name) {
        Some(PropertyValue::Select(s)) => s.clone(),
        _ => None,
    }
}

/// Build a task from a remote row.
///
/// The returned task has no local id; `remote_id` is set to the row id.
pub fn task_from_properties(
    remote_id: &str,
    props: &PropertyMap,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
) -> Result<Task, StoreError> {
    validate_properties(props)?;

    let title = text(props, NAME)
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| StoreError::invalid(NAME, "missing or empty title"))?;

    let status = match select(props, STATUS) {
        Some(label) => parse_status_label(&label)
            .ok_or_else(|| StoreError::invalid(STATUS, format!("unknown option '{label}'")))?,
        None => TaskStatus::default(),
    };

    let priority = match select(props, PRIORITY) {
        Some(label) => Some(
            parse_priority_label(&label)
                .ok_or_else(|| StoreError::invalid(PRIORITY, format!("unknown option '{label}'")))?,
        ),
        None => None,
    };

    let due_date = match props.get(DUE_DATE) {
        Some(PropertyValue::Date(d)) => *d,
        _ => None,
    };

    let tags = match props.get(TAGS) {
        Some(PropertyValue::MultiSelect(tags)) => tags.clone(),
        _ => Vec::new(),
    };

    let project_id = match props.get(PROJECT) {
        Some(PropertyValue::Relation(ids)) => ids.first().cloned(),
        _ => None,
    };

    let rubric_scores = match (
        number(props, URGENCY),
        number(props, IMPACT),
        number(props, EFFORT),
        number(props, DEPENDENCIES),
    ) {
        (Some(u), Some(i), Some(e), Some(d)) => Some(RubricScores::new(u, i, e, d)),
        _ => None,
    };

    Ok(Task {
        id: None,
        title,
        description: text(props, DESCRIPTION).unwrap_or_default(),
        status,
        priority,
        due_date,
        estimated_hours: number(props, ESTIMATED_HOURS),
        actual_hours: number(props, ACTUAL_HOURS),
        tags,
        remote_id: Some(remote_id.to_string()),
        project_id,
        created_at,
        updated_at,
        rubric_scores,
        priority_reason: text(props, PRIORITY_REASON).filter(|r| !r.is_empty()),
    })
}
