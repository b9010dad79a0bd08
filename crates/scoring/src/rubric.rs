//! The deterministic scoring rubric.
//!
//! Four dimensions, each in [0, 10]:
//! - Urgency: days until the due date
//! - Impact: declared priority, boosted by impactful tags
//! - Effort: inverse of the estimated hours bucket
//! - Dependencies: blocked tasks score lower, blockers score higher
//!
//! Every function here is pure; "today" is passed in so results never
//! depend on when the process happens to run.

use chrono::NaiveDate;

use tasksync_core::{RubricScores, Task, TaskPriority, TaskStatus};

/// Tags containing any of these (case-insensitive) raise impact.
pub const IMPACT_KEYWORDS: &[&str] = &[
    "critical",
    "user-facing",
    "revenue",
    "security",
    "performance",
];

/// Description phrases marking a task other work is waiting on.
pub const BLOCKING_KEYWORDS: &[&str] = &["blocks", "required for", "prerequisite", "dependency"];

const DEFAULT_SCORE: f64 = 5.0;
const IMPACT_TAG_BONUS: f64 = 2.0;
const DEPENDENCIES_BASE: f64 = 3.0;
const DEPENDENCIES_BLOCKED: f64 = 2.0;
const DEPENDENCIES_BLOCKER_BONUS: f64 = 4.0;
const MAX_SCORE: f64 = 10.0;

/// Score a task against the rubric as of `today`.
pub fn score_task(task: &Task, today: NaiveDate) -> RubricScores {
    RubricScores::new(
        urgency_score(task.due_date, today),
        impact_score(task.priority, &task.tags),
        effort_score(task.estimated_hours),
        dependencies_score(task.status, &task.description),
    )
}

/// Urgency from days until due. Due today counts as overdue.
pub fn urgency_score(due_date: Option<NaiveDate>, today: NaiveDate) -> f64 {
    let Some(due) = due_date else {
        return DEFAULT_SCORE;
    };
    let days = (due - today).num_days();
    match days {
        d if d <= 0 => 10.0,
        1 => 9.0,
        2..=3 => 7.0,
        4..=7 => 5.0,
        _ => 3.0,
    }
}

/// Impact from declared priority plus a capped bonus for impactful tags.
pub fn impact_score(priority: Option<TaskPriority>, tags: &[String]) -> f64 {
    let base = match priority {
        Some(TaskPriority::Urgent) => 9.0,
        Some(TaskPriority::High) => 7.0,
        Some(TaskPriority::Medium) => 5.0,
        Some(TaskPriority::Low) => 3.0,
        None => DEFAULT_SCORE,
    };

    if has_impactful_tag(tags) {
        (base + IMPACT_TAG_BONUS).min(MAX_SCORE)
    } else {
        base
    }
}

fn has_impactful_tag(tags: &[String]) -> bool {
    tags.iter().any(|tag| {
        let tag = tag.to_lowercase();
        IMPACT_KEYWORDS.iter().any(|kw| tag.contains(kw))
    })
}

/// Effort score: smaller estimates score higher.
pub fn effort_score(estimated_hours: Option<f64>) -> f64 {
    match estimated_hours {
        None => DEFAULT_SCORE,
        Some(h) if h <= 1.0 => 9.0,
        Some(h) if h <= 4.0 => 7.0,
        Some(h) if h <= 8.0 => 5.0,
        Some(h) if h <= 16.0 => 3.0,
        Some(_) => 1.0,
    }
}

/// Dependencies score: blocked tasks drop, tasks that unblock others rise.
pub fn dependencies_score(status: TaskStatus, description: &str) -> f64 {
    if status == TaskStatus::Blocked {
        return DEPENDENCIES_BLOCKED;
    }

    let description = description.to_lowercase();
    if BLOCKING_KEYWORDS.iter().any(|kw| description.contains(kw)) {
        (DEPENDENCIES_BASE + DEPENDENCIES_BLOCKER_BONUS).min(MAX_SCORE)
    } else {
        DEPENDENCIES_BASE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 12).unwrap()
    }

    #[test]
    fn urgency_buckets() {
        let t = today();
        assert_eq!(urgency_score(None, t), 5.0);
        assert_eq!(urgency_score(Some(t - Duration::days(3)), t), 10.0);
        assert_eq!(urgency_score(Some(t), t), 10.0);
        assert_eq!(urgency_score(Some(t + Duration::days(1)), t), 9.0);
        assert_eq!(urgency_score(Some(t + Duration::days(3)), t), 7.0);
        assert_eq!(urgency_score(Some(t + Duration::days(7)), t), 5.0);
        assert_eq!(urgency_score(Some(t + Duration::days(8)), t), 3.0);
    }

    #[test]
    fn impact_from_priority_and_tags() {
        assert_eq!(impact_score(None, &[]), 5.0);
        assert_eq!(impact_score(Some(TaskPriority::Low), &[]), 3.0);
        assert_eq!(impact_score(Some(TaskPriority::High), &[]), 7.0);

        let tags = vec!["Customer-Revenue".to_string()];
        assert_eq!(impact_score(Some(TaskPriority::High), &tags), 9.0);

        // Bonus is capped at 10.
        let tags = vec!["SECURITY".to_string(), "critical".to_string()];
        assert_eq!(impact_score(Some(TaskPriority::Urgent), &tags), 10.0);
    }

    #[test]
    fn effort_buckets() {
        assert_eq!(effort_score(None), 5.0);
        assert_eq!(effort_score(Some(0.5)), 9.0);
        assert_eq!(effort_score(Some(1.0)), 9.0);
        assert_eq!(effort_score(Some(4.0)), 7.0);
        assert_eq!(effort_score(Some(8.0)), 5.0);
        assert_eq!(effort_score(Some(16.0)), 3.0);
        assert_eq!(effort_score(Some(40.0)), 1.0);
    }

    #[test]
    fn dependencies_rules() {
        assert_eq!(dependencies_score(TaskStatus::Todo, ""), 3.0);
        assert_eq!(
            dependencies_score(TaskStatus::Todo, "Prerequisite for the billing rollout"),
            7.0
        );
        // Blocked wins over blocker keywords.
        assert_eq!(
            dependencies_score(TaskStatus::Blocked, "This blocks the release"),
            2.0
        );
    }

    #[test]
    fn scenario_due_today_security_quick_fix() {
        let t = today();
        let task = Task::draft("Patch auth bypass", Utc::now())
            .with_due_date(t)
            .with_priority(TaskPriority::Urgent)
            .with_tags(["security"])
            .with_estimated_hours(0.5);

        let scores = score_task(&task, t);
        assert_eq!(scores.urgency(), 10.0);
        assert_eq!(scores.impact(), 10.0);
        assert_eq!(scores.effort(), 9.0);
        assert_eq!(scores.dependencies(), 3.0);
        assert_eq!(scores.total(), 9.1);
    }

    #[test]
    fn scenario_blocked_without_details() {
        let task = Task::draft("Wait on vendor", Utc::now()).with_status(TaskStatus::Blocked);
        let scores = score_task(&task, today());
        assert_eq!(scores.urgency(), 5.0);
        assert_eq!(scores.impact(), 5.0);
        assert_eq!(scores.effort(), 5.0);
        assert_eq!(scores.dependencies(), 2.0);
        assert_eq!(scores.total(), 4.7);
    }

    #[test]
    fn scoring_is_pure_and_bounded() {
        let t = today();
        let priorities = [
            None,
            Some(TaskPriority::Low),
            Some(TaskPriority::Medium),
            Some(TaskPriority::High),
            Some(TaskPriority::Urgent),
        ];
        let hours = [None, Some(0.0), Some(2.0), Some(6.0), Some(12.0), Some(100.0)];
        let dues = [None, Some(t - Duration::days(10)), Some(t + Duration::days(2)), Some(t + Duration::days(30))];

        for priority in priorities {
            for h in hours {
                for due in dues {
                    let mut task = Task::draft("t", Utc::now())
                        .with_tags(["performance"])
                        .with_description("blocks deploy");
                    task.priority = priority;
                    task.estimated_hours = h;
                    task.due_date = due;

                    let a = score_task(&task, t);
                    let b = score_task(&task, t);
                    assert_eq!(a, b);

                    let total = a.total();
                    assert!((0.0..=10.0).contains(&total));
                    let expected = 0.3 * a.urgency()
                        + 0.4 * a.impact()
                        + 0.2 * a.effort()
                        + 0.1 * a.dependencies();
                    assert!((total - expected).abs() <= 0.005 + 1e-9);
                }
            }
        }
    }
}
