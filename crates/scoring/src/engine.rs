//! [`ScoringEngine`] — the entry point callers use to score tasks.

use std::cmp::Ordering;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, warn};

use tasksync_core::{Clock, ScoreSource, ScoredTask, SharedClock, SystemClock, Task, RubricScores};

use crate::classify::{classify_priority, priority_reason};
use crate::provider::ScoringProvider;
use crate::rubric::score_task;

/// Scores tasks with the deterministic rubric, optionally preferring an
/// external [`ScoringProvider`].
///
/// The synchronous methods ([`score_task`](Self::score_task),
/// [`score_tasks`](Self::score_tasks)) are pure with respect to the clock
/// and never touch the provider. The async [`evaluate`](Self::evaluate)
/// family tries the provider first and falls back on any error.
#[derive(Clone)]
pub struct ScoringEngine {
    provider: Option<Arc<dyn ScoringProvider>>,
    clock: SharedClock,
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl ScoringEngine {
    /// Rubric-only engine.
    pub fn new(clock: SharedClock) -> Self {
        Self {
            provider: None,
            clock,
        }
    }

    /// Prefer `provider`, falling back to the rubric when it errors.
    pub fn with_provider(mut self, provider: Arc<dyn ScoringProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn provider_name(&self) -> Option<&str> {
        self.provider.as_deref().map(|p| p.name())
    }

    /// Deterministic rubric scores for one task.
    pub fn score_task(&self, task: &Task) -> RubricScores {
        score_task(task, self.clock.today())
    }

    /// Rubric scores, classified priority and reason for one task.
    pub fn score(&self, task: &Task) -> ScoredTask {
        let scores = self.score_task(task);
        build_scored(task.clone(), scores, String::new(), ScoreSource::Deterministic)
    }

    /// Score every task and return them sorted by total, highest first.
    ///
    /// Ties keep input order.
    pub fn score_tasks(&self, tasks: &[Task]) -> Vec<ScoredTask> {
        let today = self.clock.today();
        let mut scored: Vec<ScoredTask> = tasks
            .par_iter()
            .map(|task| {
                let scores = score_task(task, today);
                build_scored(task.clone(), scores, String::new(), ScoreSource::Deterministic)
            })
            .collect();
        sort_by_total_desc(&mut scored);
        scored
    }

    /// Evaluate one task, preferring the provider when configured.
    pub async fn evaluate(&self, task: &Task) -> ScoredTask {
        if let Some(provider) = &self.provider {
            match provider.evaluate(task).await {
                Ok(eval) => {
                    debug!(task = %task.title, provider = provider.name(), "provider scored task");
                    return build_scored(
                        task.clone(),
                        eval.scores,
                        eval.reason,
                        ScoreSource::Provider(provider.name().to_string()),
                    );
                }
                Err(e) => {
                    warn!(
                        task = %task.title,
                        provider = provider.name(),
                        error = %e,
                        "scoring provider failed, using rubric"
                    );
                }
            }
        }
        self.score(task)
    }

    /// Evaluate every task and return them sorted by total, highest first.
    pub async fn evaluate_all(&self, tasks: &[Task]) -> Vec<ScoredTask> {
        if self.provider.is_none() {
            return self.score_tasks(tasks);
        }
        let mut scored = Vec::with_capacity(tasks.len());
        for task in tasks {
            scored.push(self.evaluate(task).await);
        }
        sort_by_total_desc(&mut scored);
        scored
    }
}

fn build_scored(task: Task, scores: RubricScores, reason: String, source: ScoreSource) -> ScoredTask {
    let reason = if reason.is_empty() {
        priority_reason(&scores)
    } else {
        reason
    };
    ScoredTask {
        task,
        priority: classify_priority(scores.total()),
        scores,
        reason,
        source,
    }
}

fn sort_by_total_desc(scored: &mut [ScoredTask]) {
    scored.sort_by(|a, b| b.total().partial_cmp(&a.total()).unwrap_or(Ordering::Equal));
}
