//! Sync error types.

use std::path::PathBuf;

use thiserror::Error;

use tasksync_store::StoreError;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Required configuration is missing or malformed. Raised before any I/O.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("a sync cycle is already in progress")]
    CycleInProgress,

    #[error("local source error: {0}")]
    Source(#[from] SourceError),

    #[error("remote store error: {0}")]
    Store(#[from] StoreError),

    #[error("id map {path}: {reason}")]
    IdMap { path: PathBuf, reason: String },
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid task '{title}': {reason}")]
    InvalidTask { title: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("listener failed: {0}")]
    Failed(String),

    #[error("listener panicked")]
    Panicked,
}
