//! Task data model shared by the scoring, store and sync crates.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

// ── Enumerations ──────────────────────────────────────────────

/// Workflow state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Review,
    Done,
    Blocked,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::Review,
        TaskStatus::Done,
        TaskStatus::Blocked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Review => "review",
            TaskStatus::Done => "done",
            TaskStatus::Blocked => "blocked",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::UnknownVariant {
                kind: "status",
                value: s.to_string(),
            })
    }
}

/// Priority label. Ordered from least to most pressing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub const ALL: [TaskPriority; 4] = [
        TaskPriority::Low,
        TaskPriority::Medium,
        TaskPriority::High,
        TaskPriority::Urgent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Urgent => "urgent",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskPriority::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| CoreError::UnknownVariant {
                kind: "priority",
                value: s.to_string(),
            })
    }
}

// ── Rubric scores ─────────────────────────────────────────────

pub const URGENCY_WEIGHT: f64 = 0.3;
pub const IMPACT_WEIGHT: f64 = 0.4;
pub const EFFORT_WEIGHT: f64 = 0.2;
pub const DEPENDENCIES_WEIGHT: f64 = 0.1;

const SCORE_MIN: f64 = 0.0;
const SCORE_MAX: f64 = 10.0;

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Per-dimension rubric evaluation, each dimension in [0, 10].
///
/// Only the four dimensions are stored; [`RubricScores::total`] is derived
/// on every call and is also emitted when serializing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RubricScores {
    urgency: f64,
    impact: f64,
    effort: f64,
    dependencies: f64,
}

#[derive(Deserialize)]
struct RubricInput {
    urgency: f64,
    impact: f64,
    effort: f64,
    dependencies: f64,
}

impl<'de> Deserialize<'de> for RubricScores {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RubricInput::deserialize(deserializer)?;
        Ok(RubricScores::new(
            raw.urgency,
            raw.impact,
            raw.effort,
            raw.dependencies,
        ))
    }
}

impl RubricScores {
    /// Build scores, clamping each dimension into [0, 10]. NaN becomes 0.
    pub fn new(urgency: f64, impact: f64, effort: f64, dependencies: f64) -> Self {
        Self {
            urgency: clamp_score(urgency),
            impact: clamp_score(impact),
            effort: clamp_score(effort),
            dependencies: clamp_score(dependencies),
        }
    }

    pub fn urgency(&self) -> f64 {
        self.urgency
    }

    pub fn impact(&self) -> f64 {
        self.impact
    }

    pub fn effort(&self) -> f64 {
        self.effort
    }

    pub fn dependencies(&self) -> f64 {
        self.dependencies
    }

    /// Weighted sum of the four dimensions, rounded to 2 decimals.
    pub fn total(&self) -> f64 {
        round2(
            URGENCY_WEIGHT * self.urgency
                + IMPACT_WEIGHT * self.impact
                + EFFORT_WEIGHT * self.effort
                + DEPENDENCIES_WEIGHT * self.dependencies,
        )
    }
}

fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        SCORE_MIN
    } else {
        value.clamp(SCORE_MIN, SCORE_MAX)
    }
}

impl Serialize for RubricScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("RubricScores", 5)?;
        s.serialize_field("urgency", &self.urgency)?;
        s.serialize_field("impact", &self.impact)?;
        s.serialize_field("effort", &self.effort)?;
        s.serialize_field("dependencies", &self.dependencies)?;
        s.serialize_field("total", &self.total())?;
        s.end()
    }
}

// ── Task ──────────────────────────────────────────────────────

/// A work item, either a local draft or a record read from the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Local identifier (absent for drafts that were never persisted locally).
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    #[serde(default)]
    pub actual_hours: Option<f64>,
    /// Order is irrelevant; compare with [`canonical_tags`].
    #[serde(default)]
    pub tags: Vec<String>,
    /// Identifier in the remote workspace store.
    #[serde(default)]
    pub remote_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub rubric_scores: Option<RubricScores>,
    #[serde(default)]
    pub priority_reason: Option<String>,
}

impl Task {
    /// A minimal draft with the given title, timestamped `now`.
    pub fn draft(title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: String::new(),
            status: TaskStatus::Todo,
            priority: None,
            due_date: None,
            estimated_hours: None,
            actual_hours: None,
            tags: Vec::new(),
            remote_id: None,
            project_id: None,
            created_at: now,
            updated_at: now,
            rubric_scores: None,
            priority_reason: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_due_date(mut self, due: NaiveDate) -> Self {
        self.due_date = Some(due);
        self
    }

    pub fn with_estimated_hours(mut self, hours: f64) -> Self {
        self.estimated_hours = Some(hours);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Check the invariants every stored task must satisfy.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.title.trim().is_empty() {
            return Err(CoreError::InvalidTask("title must not be empty".into()));
        }
        for (name, hours) in [
            ("estimated_hours", self.estimated_hours),
            ("actual_hours", self.actual_hours),
        ] {
            if let Some(h) = hours {
                if !h.is_finite() || h < 0.0 {
                    return Err(CoreError::InvalidTask(format!(
                        "{name} must be a non-negative number, got {h}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Attach scoring output to this task.
    pub fn apply_score(&mut self, scores: RubricScores, reason: impl Into<String>) {
        self.rubric_scores = Some(scores);
        self.priority_reason = Some(reason.into());
    }
}

/// Sorted, de-duplicated, trimmed tag list used for order-insensitive comparison.
pub fn canonical_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

// ── Scored task ───────────────────────────────────────────────

/// Where a set of rubric scores came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum ScoreSource {
    Deterministic,
    Provider(String),
}

/// A task together with its evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredTask {
    pub task: Task,
    pub scores: RubricScores,
    pub priority: TaskPriority,
    pub reason: String,
    pub source: ScoreSource,
}

impl ScoredTask {
    pub fn total(&self) -> f64 {
        self.scores.total()
    }

    /// The task with scores, classified priority and reason written onto it.
    pub fn into_scored_task(self) -> Task {
        let mut task = self.task;
        task.priority = Some(self.priority);
        task.apply_score(self.scores, self.reason);
        task
    }
}
