//! Persisted local-id → remote-id mapping.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SyncError;

#[derive(Debug, Default, Serialize, Deserialize)]
struct IdMapFile {
    entries: BTreeMap<String, String>,
}

/// A serialized id map waiting to be written to disk.
#[derive(Debug)]
pub struct PendingWrite {
    path: PathBuf,
    body: String,
}

impl PendingWrite {
    pub async fn write(&self) -> Result<(), SyncError> {
        let io_err = |e: std::io::Error| SyncError::IdMap {
            path: self.path.clone(),
            reason: e.to_string(),
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        tokio::fs::write(&self.path, &self.body).await.map_err(io_err)?;
        debug!(path = %self.path.display(), "saved id map");
        Ok(())
    }
}

/// Maps local task ids to the remote ids they were created as or matched to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdMap {
    entries: BTreeMap<String, String>,
    path: Option<PathBuf>,
    dirty: bool,
}

impl IdMap {
    /// An unpersisted map.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load from `path`. A missing file yields an empty map bound to that path.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, SyncError> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => {
                let file: IdMapFile = serde_json::from_str(&raw).map_err(|e| SyncError::IdMap {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
                file.entries
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(SyncError::IdMap {
                    path,
                    reason: e.to_string(),
                })
            }
        };
        debug!(path = %path.display(), entries = entries.len(), "loaded id map");
        Ok(Self {
            entries,
            path: Some(path),
            dirty: false,
        })
    }

    /// Serialized contents to persist, when the map is bound to a path and
    /// has changed. The map stays dirty until [`IdMap::mark_saved`].
    pub fn pending_write(&self) -> Result<Option<PendingWrite>, SyncError> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        if !self.dirty {
            return Ok(None);
        }
        let body = serde_json::to_string_pretty(&IdMapFile {
            entries: self.entries.clone(),
        })
        .map_err(|e| SyncError::IdMap {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        Ok(Some(PendingWrite {
            path: path.clone(),
            body,
        }))
    }

    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    /// Write to the bound path if anything changed since the last load/save.
    pub async fn save(&mut self) -> Result<(), SyncError> {
        if let Some(pending) = self.pending_write()? {
            pending.write().await?;
        }
        self.mark_saved();
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, local_id: &str) -> Option<&str> {
        self.entries.get(local_id).map(String::as_str)
    }

    /// Record a mapping. Returns true if it changed the map.
    pub fn insert(&mut self, local_id: impl Into<String>, remote_id: impl Into<String>) -> bool {
        let remote_id = remote_id.into();
        let local_id = local_id.into();
        if self.entries.get(&local_id) == Some(&remote_id) {
            return false;
        }
        self.entries.insert(local_id, remote_id);
        self.dirty = true;
        true
    }

    pub fn remove(&mut self, local_id: &str) -> Option<String> {
        let removed = self.entries.remove(local_id);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let map = IdMap::load(dir.path().join("ids.json")).unwrap();
        assert!(map.is_empty());
        assert!(!map.is_dirty());
    }

    #[tokio::test]
    async fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ids.json");

        let mut map = IdMap::load(&path).unwrap();
        assert!(map.insert("local-1", "remote-1"));
        assert!(!map.insert("local-1", "remote-1"));
        assert!(map.is_dirty());
        map.save().await.unwrap();
        assert!(!map.is_dirty());

        let reloaded = IdMap::load(&path).unwrap();
        assert_eq!(reloaded.get("local-1"), Some("remote-1"));
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.json");
        std::fs::write(&path, "[1, 2").unwrap();
        assert!(matches!(IdMap::load(&path), Err(SyncError::IdMap { .. })));
    }

    #[tokio::test]
    async fn in_memory_save_is_noop() {
        let mut map = IdMap::in_memory();
        map.insert("a", "b");
        assert!(map.pending_write().unwrap().is_none());
        map.save().await.unwrap();
        assert!(!map.is_dirty());
        assert_eq!(map.remove("a").as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn pending_write_keeps_map_dirty_until_marked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.json");
        let mut map = IdMap::load(&path).unwrap();
        map.insert("local-1", "remote-1");

        let pending = map.pending_write().unwrap().unwrap();
        assert!(map.is_dirty());
        pending.write().await.unwrap();
        map.mark_saved();
        assert!(map.pending_write().unwrap().is_none());

        assert_eq!(IdMap::load(&path).unwrap().get("local-1"), Some("remote-1"));
    }
}
