use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tasksync_core::{RubricScores, Task};

/// Rubric output produced by an external evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEvaluation {
    pub scores: RubricScores,
    /// Provider-written justification. Empty means "derive it locally".
    #[serde(default)]
    pub reason: String,
}

/// Trait for external scoring providers — each backend implements this.
///
/// Providers must honor the same contract as the deterministic rubric:
/// every dimension in [0, 10]. The engine never surfaces provider errors;
/// it logs them and scores with the rubric instead.
#[async_trait]
pub trait ScoringProvider: Send + Sync {
    /// Human-readable name for logging and [`tasksync_core::ScoreSource`].
    fn name(&self) -> &str;

    /// Evaluate one task.
    async fn evaluate(&self, task: &Task) -> Result<ProviderEvaluation, ScoringProviderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ScoringProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} — {body}")]
    ApiError { status: u16, body: String },
    #[error("failed to parse response: {0}")]
    ParseError(String),
    #[error("score out of range: {dimension} = {value}")]
    OutOfRange { dimension: String, value: f64 },
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}
