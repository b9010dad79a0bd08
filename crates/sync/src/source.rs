//! Local task sources: where draft and managed tasks come from.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use tasksync_core::{SharedClock, Task};

use crate::error::SourceError;

/// Yields the local task set for a cycle or a migration.
#[async_trait]
pub trait LocalTaskSource: Send + Sync {
    fn name(&self) -> &str;

    async fn load(&self) -> Result<Vec<Task>, SourceError>;
}

/// A fixed task list, e.g. a seed list compiled into the caller.
#[derive(Debug, Clone, Default)]
pub struct StaticTaskSource {
    tasks: Vec<Task>,
}

impl StaticTaskSource {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }
}

#[async_trait]
impl LocalTaskSource for StaticTaskSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn load(&self) -> Result<Vec<Task>, SourceError> {
        Ok(self.tasks.clone())
    }
}

/// Reads a JSON array of tasks from disk.
///
/// Entries missing an `id`, `created_at` or `updated_at` are completed
/// (a v4 UUID, the clock's now) and the file is rewritten once so later
/// loads see stable identities and timestamps. A [`read_only`] source
/// completes entries in memory and never writes.
///
/// [`read_only`]: JsonFileSource::read_only
pub struct JsonFileSource {
    path: PathBuf,
    clock: SharedClock,
    write_back: bool,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>, clock: SharedClock) -> Self {
        Self {
            path: path.into(),
            clock,
            write_back: true,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.write_back = false;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse_error(&self, source: serde_json::Error) -> SourceError {
        SourceError::Parse {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl LocalTaskSource for JsonFileSource {
    fn name(&self) -> &str {
        "json-file"
    }

    async fn load(&self) -> Result<Vec<Task>, SourceError> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let entries: Vec<Value> = serde_json::from_str(&raw).map_err(|e| self.parse_error(e))?;

        let now = self.clock.now();
        let mut completed = 0usize;
        let mut tasks = Vec::with_capacity(entries.len());

        for mut entry in entries {
            if let Some(obj) = entry.as_object_mut() {
                let mut touched = false;
                if obj.get("id").map_or(true, Value::is_null) {
                    obj.insert("id".into(), Value::String(uuid::Uuid::new_v4().to_string()));
                    touched = true;
                }
                for key in ["created_at", "updated_at"] {
                    if obj.get(key).map_or(true, Value::is_null) {
                        obj.insert(key.into(), serde_json::to_value(now).map_err(|e| self.parse_error(e))?);
                        touched = true;
                    }
                }
                if touched {
                    completed += 1;
                }
            }

            let task: Task = serde_json::from_value(entry).map_err(|e| self.parse_error(e))?;
            task.validate().map_err(|e| SourceError::InvalidTask {
                title: task.title.clone(),
                reason: e.to_string(),
            })?;
            tasks.push(task);
        }

        if completed > 0 && self.write_back {
            let body = serde_json::to_string_pretty(&tasks).map_err(|e| self.parse_error(e))?;
            tokio::fs::write(&self.path, body).await?;
            info!(path = %self.path.display(), completed, "assigned ids to local tasks");
        }

        debug!(path = %self.path.display(), count = tasks.len(), "loaded local tasks");
        Ok(tasks)
    }
}
