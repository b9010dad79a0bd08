//! Partial task updates.

use chrono::NaiveDate;
use serde::Serialize;

use tasksync_core::{RubricScores, Task, TaskPriority, TaskStatus};

/// A partial update to a remote task. `None` leaves the field untouched;
/// `Some(None)` on nullable fields clears the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Option<TaskPriority>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rubric_scores: Option<RubricScores>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_reason: Option<String>,
}

impl TaskPatch {
    /// A patch that only rewrites scoring output.
    pub fn scores(scores: RubricScores, priority: TaskPriority, reason: impl Into<String>) -> Self {
        Self {
            priority: Some(Some(priority)),
            rubric_scores: Some(scores),
            priority_reason: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.touched_fields().is_empty()
    }

    /// Names of the fields this patch writes, for logging.
    pub fn touched_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.status.is_some() {
            fields.push("status");
        }
        if self.priority.is_some() {
            fields.push("priority");
        }
        if self.description.is_some() {
            fields.push("description");
        }
        if self.due_date.is_some() {
            fields.push("due_date");
        }
        if self.estimated_hours.is_some() {
            fields.push("estimated_hours");
        }
        if self.tags.is_some() {
            fields.push("tags");
        }
        if self.rubric_scores.is_some() {
            fields.push("rubric_scores");
        }
        if self.priority_reason.is_some() {
            fields.push("priority_reason");
        }
        fields
    }

    /// Apply the patch to an in-memory task.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(due) = self.due_date {
            task.due_date = due;
        }
        if let Some(hours) = self.estimated_hours {
            task.estimated_hours = hours;
        }
        if let Some(tags) = &self.tags {
            task.tags = tags.clone();
        }
        if let Some(scores) = self.rubric_scores {
            task.rubric_scores = Some(scores);
        }
        if let Some(reason) = &self.priority_reason {
            task.priority_reason = Some(reason.clone());
        }
    }
}
