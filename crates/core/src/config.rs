use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key).as_deref() {
        Some("1") | Some("true") | Some("yes") => true,
        Some("0") | Some("false") | Some("no") => false,
        _ => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub notion: NotionConfig,
    pub sync: SyncSettings,
    pub scoring: ScoringSettings,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `TASKSYNC_PROFILE`. When set (e.g. `STAGING`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("TASKSYNC_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            notion: NotionConfig::from_env_profiled(p),
            sync: SyncSettings::from_env_profiled(p),
            scoring: ScoringSettings::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  notion:   base_url={}, tasks_db={}, token={}",
            self.notion.base_url,
            self.notion.tasks_database_id.as_deref().unwrap_or("(none)"),
            if self.notion.is_configured() { "set" } else { "missing" },
        );
        tracing::info!(
            "  sync:     interval={}m, auto_score={}, bidirectional={}, conflict={}",
            self.sync.interval_minutes,
            self.sync.auto_score,
            self.sync.bidirectional,
            self.sync.conflict_resolution,
        );
        tracing::info!(
            "  scoring:  provider={}, model={}",
            self.scoring.provider,
            self.scoring.model
        );
    }

    /// Return a redacted view safe for API responses (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "notion": {
                "base_url": self.notion.base_url,
                "version": self.notion.api_version,
                "tasks_database_id": self.notion.tasks_database_id,
                "projects_database_id": self.notion.projects_database_id,
                "configured": self.notion.is_configured(),
            },
            "sync": {
                "interval_minutes": self.sync.interval_minutes,
                "auto_score": self.sync.auto_score,
                "bidirectional": self.sync.bidirectional,
                "conflict_resolution": self.sync.conflict_resolution,
                "id_map_path": self.sync.id_map_path,
                "max_concurrency": self.sync.max_concurrency,
            },
            "scoring": {
                "provider": self.scoring.provider,
                "url": self.scoring.url,
                "model": self.scoring.model,
            },
        })
    }
}

// ── Notion workspace ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionConfig {
    pub api_token: Option<String>,
    pub base_url: String,
    pub api_version: String,
    pub tasks_database_id: Option<String>,
    pub projects_database_id: Option<String>,
}

impl NotionConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            api_token: profiled_env_opt(p, "NOTION_API_TOKEN"),
            base_url: profiled_env_or(p, "NOTION_BASE_URL", "https://api.notion.com"),
            api_version: profiled_env_or(p, "NOTION_VERSION", "2022-06-28"),
            tasks_database_id: profiled_env_opt(p, "NOTION_TASKS_DATABASE_ID"),
            projects_database_id: profiled_env_opt(p, "NOTION_PROJECTS_DATABASE_ID"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_token.is_some()
    }
}

// ── Sync ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    pub interval_minutes: u64,
    pub auto_score: bool,
    pub bidirectional: bool,
    /// "local-wins", "remote-wins" or "merge".
    pub conflict_resolution: String,
    pub id_map_path: PathBuf,
    pub max_concurrency: usize,
}

impl SyncSettings {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            interval_minutes: profiled_env_u64(p, "SYNC_INTERVAL_MINUTES", 15),
            auto_score: profiled_env_bool(p, "SYNC_AUTO_SCORE", true),
            bidirectional: profiled_env_bool(p, "SYNC_BIDIRECTIONAL", true),
            conflict_resolution: profiled_env_or(p, "SYNC_CONFLICT_RESOLUTION", "merge"),
            id_map_path: PathBuf::from(profiled_env_or(p, "SYNC_ID_MAP_PATH", "data/id-map.json")),
            max_concurrency: profiled_env_u64(p, "SYNC_MAX_CONCURRENCY", 4).max(1) as usize,
        }
    }
}

// ── Scoring provider ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringSettings {
    /// "local" (deterministic rubric only) or "ollama".
    pub provider: String,
    pub url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl ScoringSettings {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            provider: profiled_env_or(p, "SCORING_PROVIDER", "local"),
            url: profiled_env_or(p, "SCORING_URL", "http://localhost:11434"),
            model: profiled_env_or(p, "SCORING_MODEL", "llama3.1"),
            timeout_secs: profiled_env_u64(p, "SCORING_TIMEOUT_SECS", 20),
        }
    }

    /// Whether an external provider is configured. Only "local" and
    /// "ollama" are recognised; anything else is a configuration error.
    pub fn uses_provider(&self) -> Result<bool, CoreError> {
        match self.provider.trim().to_ascii_lowercase().as_str() {
            "local" | "" => Ok(false),
            "ollama" => Ok(true),
            other => Err(CoreError::Config(format!(
                "unknown SCORING_PROVIDER '{other}', expected 'local' or 'ollama'"
            ))),
        }
    }
}
