use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use tasksync_core::{RubricScores, Task};

use crate::provider::{ProviderEvaluation, ScoringProvider, ScoringProviderError};

const SYSTEM_PROMPT: &str = "You rate work items for prioritisation. \
Reply with a single JSON object and nothing else: \
{\"urgency\": n, \"impact\": n, \"effort\": n, \"dependencies\": n, \"reason\": \"...\"}. \
Every n is a number from 0 to 10. Effort is inverse: quick tasks score high.";

/// Scores tasks by asking a local Ollama model.
pub struct OllamaScoringProvider {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl OllamaScoringProvider {
    pub fn new(url: String, model: String, timeout: Duration) -> Result<Self, ScoringProviderError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url, model })
    }

    fn user_prompt(task: &Task) -> String {
        json!({
            "title": task.title,
            "description": task.description,
            "status": task.status,
            "priority": task.priority,
            "due_date": task.due_date,
            "estimated_hours": task.estimated_hours,
            "tags": task.tags,
        })
        .to_string()
    }
}

/// Parse the model's reply into validated rubric scores.
///
/// Models sometimes wrap JSON in prose or code fences, so the outermost
/// `{...}` span is extracted before parsing.
pub(crate) fn parse_evaluation(content: &str) -> Result<ProviderEvaluation, ScoringProviderError> {
    let start = content
        .find('{')
        .ok_or_else(|| ScoringProviderError::ParseError("no JSON object in reply".into()))?;
    let end = content
        .rfind('}')
        .filter(|&end| end > start)
        .ok_or_else(|| ScoringProviderError::ParseError("unterminated JSON object".into()))?;

    let value: serde_json::Value = serde_json::from_str(&content[start..=end])
        .map_err(|e| ScoringProviderError::ParseError(e.to_string()))?;

    let dimension = |name: &str| -> Result<f64, ScoringProviderError> {
        let v = value[name].as_f64().ok_or_else(|| {
            ScoringProviderError::ParseError(format!("missing numeric field '{name}'"))
        })?;
        if !(0.0..=10.0).contains(&v) {
            return Err(ScoringProviderError::OutOfRange {
                dimension: name.to_string(),
                value: v,
            });
        }
        Ok(v)
    };

    let scores = RubricScores::new(
        dimension("urgency")?,
        dimension("impact")?,
        dimension("effort")?,
        dimension("dependencies")?,
    );
    let reason = value["reason"].as_str().unwrap_or_default().trim().to_string();

    Ok(ProviderEvaluation { scores, reason })
}

#[async_trait]
impl ScoringProvider for OllamaScoringProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn evaluate(&self, task: &Task) -> Result<ProviderEvaluation, ScoringProviderError> {
        let url = format!("{}/api/chat", self.url.trim_end_matches('/'));

        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": Self::user_prompt(task) },
            ],
            "stream": false,
            "format": "json",
            "options": { "temperature": 0.0 },
        });

        debug!(task = %task.title, "Ollama scoring request to {}", url);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(ScoringProviderError::ApiError { status, body });
        }

        let resp: serde_json::Value = response.json().await?;
        let content = resp["message"]["content"]
            .as_str()
            .ok_or_else(|| ScoringProviderError::ParseError("missing message.content".into()))?;

        parse_evaluation(content)
    }
}
