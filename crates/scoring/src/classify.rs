//! Priority classification and human-readable justification.

use tasksync_core::{RubricScores, TaskPriority};

/// Lower bounds (inclusive) for each priority label.
pub const URGENT_THRESHOLD: f64 = 8.0;
pub const HIGH_THRESHOLD: f64 = 6.5;
pub const MEDIUM_THRESHOLD: f64 = 4.0;

const STRONG_SIGNAL: f64 = 8.0;
const STRONG_DEPENDENCY_SIGNAL: f64 = 7.0;
const MODERATE_SIGNAL: f64 = 6.0;

/// Map a total score to a priority label.
pub fn classify_priority(total: f64) -> TaskPriority {
    if total >= URGENT_THRESHOLD {
        TaskPriority::Urgent
    } else if total >= HIGH_THRESHOLD {
        TaskPriority::High
    } else if total >= MEDIUM_THRESHOLD {
        TaskPriority::Medium
    } else {
        TaskPriority::Low
    }
}

/// Explain which dimensions drove the score.
///
/// Strong signals are reported first; if none qualify, moderate ones are;
/// otherwise the reason is just the total.
pub fn priority_reason(scores: &RubricScores) -> String {
    let strong = collect_signals(
        scores,
        STRONG_SIGNAL,
        STRONG_DEPENDENCY_SIGNAL,
        ["high urgency", "high impact", "high effort score", "blocks other tasks"],
    );
    if !strong.is_empty() {
        return capitalize(&strong.join(", "));
    }

    let moderate = collect_signals(
        scores,
        MODERATE_SIGNAL,
        MODERATE_SIGNAL,
        [
            "moderate urgency",
            "moderate impact",
            "moderate effort score",
            "moderate dependencies",
        ],
    );
    if !moderate.is_empty() {
        return capitalize(&moderate.join(", "));
    }

    format!("Score: {}/10", scores.total())
}

fn collect_signals(
    scores: &RubricScores,
    threshold: f64,
    dependency_threshold: f64,
    labels: [&'static str; 4],
) -> Vec<&'static str> {
    let checks = [
        scores.urgency() >= threshold,
        scores.impact() >= threshold,
        scores.effort() >= threshold,
        scores.dependencies() >= dependency_threshold,
    ];
    checks
        .into_iter()
        .zip(labels)
        .filter_map(|(hit, label)| hit.then_some(label))
        .collect()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
