//! Sync configuration, per-run options and operation responses.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use tasksync_core::config::{NotionConfig, SyncSettings};

use crate::error::SyncError;

/// Default minutes between scheduled cycles.
pub const DEFAULT_INTERVAL_MINUTES: u64 = 15;
/// Longest accepted interval (one week).
pub const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

/// Which side wins when a watched field differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictResolution {
    /// Every differing watched field is overwritten with the local value.
    LocalWins,
    /// No outbound overwrite is produced.
    RemoteWins,
    /// The side with the more recent `updated_at` contributes its values.
    #[default]
    Merge,
}

impl ConflictResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictResolution::LocalWins => "local-wins",
            ConflictResolution::RemoteWins => "remote-wins",
            ConflictResolution::Merge => "merge",
        }
    }
}

impl fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictResolution {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "local-wins" => Ok(ConflictResolution::LocalWins),
            "remote-wins" => Ok(ConflictResolution::RemoteWins),
            "merge" => Ok(ConflictResolution::Merge),
            other => Err(SyncError::Configuration(format!(
                "unknown conflict resolution '{other}' (expected local-wins, remote-wins or merge)"
            ))),
        }
    }
}

/// Where to sync to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Remote tasks database identifier. Required.
    pub database_id: String,
}

impl SyncConfig {
    pub fn new(database_id: impl Into<String>) -> Self {
        Self {
            database_id: database_id.into(),
        }
    }

    pub fn from_notion(notion: &NotionConfig) -> Self {
        Self::new(notion.tasks_database_id.clone().unwrap_or_default())
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.database_id.trim().is_empty() {
            return Err(SyncError::Configuration(
                "remote tasks database id is required".into(),
            ));
        }
        Ok(())
    }
}

/// How to sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    pub sync_interval_minutes: u64,
    pub auto_score: bool,
    pub bidirectional_sync: bool,
    pub conflict_resolution: ConflictResolution,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            sync_interval_minutes: DEFAULT_INTERVAL_MINUTES,
            auto_score: true,
            bidirectional_sync: true,
            conflict_resolution: ConflictResolution::Merge,
        }
    }
}

impl SyncOptions {
    pub fn from_settings(settings: &SyncSettings) -> Result<Self, SyncError> {
        let options = Self {
            sync_interval_minutes: settings.interval_minutes,
            auto_score: settings.auto_score,
            bidirectional_sync: settings.bidirectional,
            conflict_resolution: settings.conflict_resolution.parse()?,
        };
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if !(1..=MAX_INTERVAL_MINUTES).contains(&self.sync_interval_minutes) {
            return Err(SyncError::Configuration(format!(
                "sync interval must be between 1 and {MAX_INTERVAL_MINUTES} minutes, got {}",
                self.sync_interval_minutes
            )));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.bounded_minutes() * 60)
    }

    pub fn interval_chrono(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.bounded_minutes() as i64)
    }

    fn bounded_minutes(&self) -> u64 {
        self.sync_interval_minutes.clamp(1, MAX_INTERVAL_MINUTES)
    }
}

/// Outcome of a lifecycle operation (`start_sync`, `stop_sync`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResponse {
    pub success: bool,
    pub message: String,
}

impl OperationResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
